//! Marker and staging key derivation.
//!
//! The idempotency convention is existence-of-a-derived-key: an input at
//! `source/dir/file` is considered handled once either
//! `destination/good/source/dir/file` or `destination/bad/source/dir/file`
//! exists. Staging artifacts mirror the same path under `batch/`.

/// Key of the success marker for `key`.
pub fn good_key(destination: &str, key: &str) -> String {
    format!("{}/good/{}", destination, key)
}

/// Key of the failure marker for `key`.
pub fn bad_key(destination: &str, key: &str) -> String {
    format!("{}/bad/{}", destination, key)
}

/// Key of the transient staging artifact for `key`.
pub fn batch_key(destination: &str, key: &str) -> String {
    format!("{}/batch/{}", destination, key)
}

/// Object-store URI of a staging artifact, as referenced by COPY.
pub fn staging_uri(bucket: &str, batch_key: &str) -> String {
    format!("s3://{}/{}", bucket, batch_key)
}

/// True when `key` sits under an archive sub-prefix, which is never a
/// source of new input.
pub fn in_archive(key: &str) -> bool {
    key.to_ascii_lowercase().contains("/archive")
}
