//! Best-effort space accounting.
//!
//! The plain functions report `0` for anything they cannot determine, so
//! callers cannot tell "full" from "unknown". Use [`StorageAccess::try_space`]
//! when the difference matters.

use crate::access::StorageAccess;
use crate::error::AccessError;
use crate::store::{FsStats, StoreError, local::disk_stats};
use crate::uri::is_primary;
use std::fs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceInfo {
    pub capacity: u64,
    pub free: u64,
}

impl SpaceInfo {
    pub fn used(&self) -> u64 {
        self.capacity.saturating_sub(self.free)
    }
}

impl From<FsStats> for SpaceInfo {
    fn from(stats: FsStats) -> Self {
        let capacity = stats.blocks.saturating_mul(stats.block_size);
        let free = stats
            .available_blocks
            .saturating_mul(stats.block_size)
            .min(capacity);
        Self { capacity, free }
    }
}

impl StorageAccess {
    /// Capacity and free bytes of the volume behind `storage_id`, measured
    /// in one snapshot.
    pub fn try_space(&self, storage_id: &str) -> Result<SpaceInfo, AccessError> {
        if is_primary(storage_id) {
            let measured = match self.app_directory() {
                Some(app_directory) => {
                    fs::create_dir_all(app_directory).map_err(StoreError::from)?;
                    app_directory
                }
                None => self.primary_store().root_path(),
            };
            return Ok(disk_stats(measured)?.into());
        }

        let root = self.try_resolve_root(storage_id)?;
        Ok(root.store().stat_fs()?.into())
    }

    /// Like [`Self::try_space`], with every failure reported as zero space.
    pub fn space(&self, storage_id: &str) -> SpaceInfo {
        self.try_space(storage_id).unwrap_or_else(|e| {
            log::warn!("Could not measure space of storage {storage_id}: {e}");
            SpaceInfo::default()
        })
    }

    pub fn free_space(&self, storage_id: &str) -> u64 {
        self.space(storage_id).free
    }

    pub fn used_space(&self, storage_id: &str) -> u64 {
        self.space(storage_id).used()
    }

    pub fn capacity(&self, storage_id: &str) -> u64 {
        self.space(storage_id).capacity
    }
}
