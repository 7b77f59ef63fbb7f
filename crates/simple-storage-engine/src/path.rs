//! Storage-relative paths.
//!
//! A [`StoragePath`] is the normalized form of a slash-delimited path inside a
//! storage volume: an ordered list of non-empty, trimmed segments. Paths are
//! parsed once and then passed around as values, so every operation sees the
//! same segmentation.

use relative_path::RelativePathBuf;
use std::fmt;

pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoragePath {
    segments: Vec<String>,
}

impl StoragePath {
    /// The empty path, which resolves to the storage root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalize a raw path.
    ///
    /// Splits on `/`, trims ASCII control characters and spaces from each
    /// segment and drops the segments that end up empty, so `" a//b / "`
    /// becomes `["a", "b"]`. Never fails.
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split(SEPARATOR)
            .map(trim_segment)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Every segment but the last, `None` for the root.
    pub fn parent(&self) -> Option<StoragePath> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    /// Append the segments of `child` (itself normalized first).
    pub fn join(&self, child: &str) -> StoragePath {
        let mut segments = self.segments.clone();
        segments.extend(Self::parse(child).segments);
        Self { segments }
    }

    pub fn to_relative_path_buf(&self) -> RelativePathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<&str> for StoragePath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

fn trim_segment(segment: &str) -> &str {
    segment.trim_matches(|c: char| c <= ' ')
}

/// The file name a raw path ends with: whatever follows the last `/`, trimmed.
///
/// Unlike [`StoragePath::file_name`] this does not skip trailing separators,
/// so `"a/b/"` has an empty file name.
pub fn raw_file_name(raw: &str) -> &str {
    let last = raw.rsplit(SEPARATOR).next().unwrap_or(raw);
    trim_segment(last)
}
