use std::io;

use arbor_core::{CanonicalPath, NormalizedPath};
use sha2::{Digest, Sha256};

use crate::watch::WatcherHandle;

/// Everything the coordinator needs from its embedding host.
///
/// The trait is intentionally small so it can be implemented for different
/// backends (the local OS filesystem, the deterministic in-memory host used
/// by tests, future remote hosts).
pub trait ServerHost: Send + Sync {
    fn file_exists(&self, path: &NormalizedPath) -> bool;

    /// Reads the file contents as UTF-8 text.
    fn read_file(&self, path: &NormalizedPath) -> io::Result<String>;

    /// Size in bytes, or an error when the file does not exist.
    fn file_size(&self, path: &NormalizedPath) -> io::Result<u64>;

    fn current_directory(&self) -> NormalizedPath;

    fn use_case_sensitive_file_names(&self) -> bool;

    /// Stable content hash, used for scrubbed telemetry identifiers.
    fn create_hash(&self, data: &str) -> String {
        sha256_hex(data)
    }

    /// Begin watching a single file. The returned handle owns the watch.
    fn watch_file(&self, path: &NormalizedPath) -> WatcherHandle;

    /// Begin watching a directory, optionally recursively.
    fn watch_directory(&self, path: &NormalizedPath, recursive: bool) -> WatcherHandle;

    /// Fold a path to the key form under this host's case sensitivity.
    fn canonical(&self, path: &NormalizedPath) -> CanonicalPath {
        path.canonicalize(self.use_case_sensitive_file_names())
    }
}

/// Lowercase-hex SHA-256, the workspace-wide hashing convention.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}
