//! Storage identifiers, tree URIs and MIME defaults.

/// Storage id of the device's primary (internal) storage.
pub const PRIMARY: &str = "primary";

/// Authority of the platform's external storage documents provider.
pub const EXTERNAL_STORAGE_AUTHORITY: &str = "com.android.externalstorage.documents";

pub const MIME_TYPE_UNKNOWN: &str = "*/*";

pub const MIME_TYPE_BINARY_FILE: &str = "application/octet-stream";

pub fn is_primary(storage_id: &str) -> bool {
    storage_id == PRIMARY
}

/// Build the permission-scoped tree URI for a storage volume.
///
/// `tree_uri(EXTERNAL_STORAGE_AUTHORITY, "6881-2249", "")` gives
/// `content://com.android.externalstorage.documents/tree/6881-2249%3A`.
pub fn tree_uri(authority: &str, storage_id: &str, path: &str) -> String {
    let document = format!("{storage_id}:{path}");
    format!("content://{authority}/tree/{}", encode_component(&document))
}

/// Characters the platform's URI encoder leaves literal but `urlencoding`
/// escapes.
const LITERAL_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Percent-encode one URI component the way Android's `Uri.encode` does:
/// alphanumerics and `_-!.~'()*` stay literal.
pub fn encode_component(component: &str) -> String {
    let mut encoded = urlencoding::encode(component).into_owned();
    for (escaped, literal) in LITERAL_MARKS {
        encoded = encoded.replace(escaped, literal);
    }
    encoded
}

/// Resolve an optional MIME type to the one handed to the store.
pub fn mime_type_or_default(mime_type: Option<&str>) -> &str {
    match mime_type {
        Some(mime) if !mime.trim().is_empty() => mime,
        _ => MIME_TYPE_UNKNOWN,
    }
}

/// Extract the (percent-decoded) file name from a URL.
///
/// Returns the URL unchanged when it is not valid percent-encoded UTF-8.
pub fn file_name_from_url(url: &str) -> String {
    match urlencoding::decode(url) {
        Ok(decoded) => decoded
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string(),
        Err(_) => url.to_string(),
    }
}
