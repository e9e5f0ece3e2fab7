//! Disk Backend Module
//!
//! One file per key, named by the SHA-1 of the key. Each record is an
//! 8-byte little-endian expiry header (Unix milliseconds) followed by the
//! JSON payload.
//!
//! Writes go to a temporary file in the cache directory and are renamed over
//! the target, so readers never observe a half-written record. Readers take
//! a shared advisory lock on the file they open; writers and the pruner are
//! serialized by an in-process mutex.
//!
//! Two keys whose digests collide share one file and overwrite each other.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::expiry::current_timestamp_ms;
use crate::cache::{CacheBackend, Expiry};
use crate::error::{CacheError, Result, StorageFault};
use crate::fingerprint::sha1_hex;

/// Suffix carried by in-flight temporary files
pub const TX_SUFFIX: &str = ".__cache_tx";

/// Mode applied to every record file
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

const HEADER_LEN: usize = 8;

// == Disk Backend ==
/// Filesystem-backed cache with heuristic pruning.
#[derive(Debug)]
pub struct DiskBackend {
    /// Cache directory
    dir: PathBuf,
    /// File count above which a prune pass runs
    threshold: usize,
    /// Default expiry in seconds
    default_expire: u64,
    /// Serializes writes and prune passes
    write_lock: Mutex<()>,
}

impl DiskBackend {
    // == Constructor ==
    /// Opens (and creates if needed) a cache directory.
    pub fn new(dir: impl Into<PathBuf>, threshold: usize, default_expire: u64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| CacheError::unavailable("disk", format!("{}: {}", dir.display(), e)))?;

        Ok(Self {
            dir,
            threshold,
            default_expire,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(sha1_hex(key.as_bytes()))
    }

    /// Lists record files, skipping in-flight temporaries.
    fn list_records(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(TX_SUFFIX) {
                continue;
            }
            records.push(entry.path());
        }
        Ok(records)
    }

    // == Prune ==
    /// Best-effort pass; any failure abandons the rest of it.
    fn prune(&self) {
        if let Err(err) = self.prune_pass() {
            debug!(error = %err, "disk prune pass aborted");
        }
    }

    /// Once over the threshold, deletes expired records plus every third
    /// listed record, so a cache whose entries are always renewed still
    /// stays bounded.
    fn prune_pass(&self) -> std::result::Result<(), StorageFault> {
        let records = self.list_records()?;
        if records.len() <= self.threshold {
            return Ok(());
        }

        let now = current_timestamp_ms();
        let mut removed = 0usize;
        for (i, path) in records.iter().enumerate() {
            let expires_at = read_header(path)?;
            if expires_at <= now || i % 3 == 0 {
                remove_quietly(path);
                removed += 1;
            }
        }
        debug!(listed = records.len(), removed, "pruned disk cache");
        Ok(())
    }

    fn write_record(
        &self,
        path: &Path,
        expires_at: u64,
        value: &Value,
    ) -> std::result::Result<(), StorageFault> {
        let mut tmp = tempfile::Builder::new()
            .suffix(TX_SUFFIX)
            .tempfile_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writer.write_all(&expires_at.to_le_bytes())?;
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }
        set_private_mode(tmp.path())?;
        tmp.persist(path)?;
        Ok(())
    }
}

impl CacheBackend for DiskBackend {
    fn kind(&self) -> &'static str {
        "disk"
    }

    // == Get ==
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        match read_record(&path, current_timestamp_ms()) {
            Ok(value) => value,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "disk cache miss");
                None
            }
        }
    }

    // == Set ==
    fn set(&self, key: &str, value: Value, expiry: Expiry) {
        let path = self.path_for(key);
        let expires_at = expiry.deadline_ms(self.default_expire, current_timestamp_ms());

        let _guard = self.write_lock.lock();
        self.prune();
        if let Err(err) = self.write_record(&path, expires_at, &value) {
            warn!(path = %path.display(), error = %err, "dropped disk cache write");
        }
    }

    // == Clear ==
    fn clear(&self, key: Option<&str>) {
        let _guard = self.write_lock.lock();
        match key {
            Some(key) => remove_quietly(&self.path_for(key)),
            None => match self.list_records() {
                Ok(records) => records.iter().for_each(|p| remove_quietly(p)),
                Err(err) => warn!(error = %err, "could not list disk cache for clear"),
            },
        }
    }

    fn len_hint(&self) -> Option<usize> {
        self.list_records().ok().map(|records| records.len())
    }
}

// == Record I/O ==
fn open_locked(path: &Path) -> std::io::Result<File> {
    let file = File::open(path)?;
    FileExt::lock_shared(&file)?;
    Ok(file)
}

fn read_expiry(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    Ok(u64::from_le_bytes(header))
}

/// Reads only the expiry header of a record.
fn read_header(path: &Path) -> std::result::Result<u64, StorageFault> {
    let mut file = open_locked(path)?;
    Ok(read_expiry(&mut file)?)
}

/// Reads a full record; `Ok(None)` when it has expired.
fn read_record(path: &Path, now: u64) -> std::result::Result<Option<Value>, StorageFault> {
    let file = open_locked(path)?;
    let mut reader = BufReader::new(file);
    let expires_at = read_expiry(&mut reader)?;
    if expires_at < now {
        return Ok(None);
    }
    Ok(Some(serde_json::from_reader(reader)?))
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %err, "could not remove cache file");
        }
    }
}

#[cfg(unix)]
fn set_private_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
fn set_private_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn backend(threshold: usize) -> (TempDir, DiskBackend) {
        let dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(dir.path().join("cache"), threshold, 300).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_new_creates_directory() {
        let (_dir, backend) = backend(10);
        assert!(backend.dir().is_dir());
        assert_eq!(backend.len_hint(), Some(0));
    }

    #[test]
    fn test_filename_is_hex_digest() {
        let (_dir, backend) = backend(10);
        let path = backend.path_for("some key");
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert_eq!(name.len(), 40);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(path, backend.path_for("some key"));
    }

    #[test]
    fn test_set_and_get() {
        let (_dir, backend) = backend(10);

        backend.set("key1", json!({"a": [1, 2, 3], "b": "x"}), Expiry::Default);
        assert_eq!(backend.get("key1"), Some(json!({"a": [1, 2, 3], "b": "x"})));
        assert_eq!(backend.len_hint(), Some(1));
    }

    #[test]
    fn test_get_missing() {
        let (_dir, backend) = backend(10);
        assert_eq!(backend.get("nope"), None);
    }

    #[test]
    fn test_overwrite() {
        let (_dir, backend) = backend(10);

        backend.set("key1", json!(1), Expiry::Default);
        backend.set("key1", json!(2), Expiry::Default);

        assert_eq!(backend.get("key1"), Some(json!(2)));
        assert_eq!(backend.len_hint(), Some(1));
    }

    #[test]
    fn test_expired_record_is_a_miss() {
        let (_dir, backend) = backend(10);

        backend.set("key1", json!("v"), Expiry::Seconds(1));
        assert!(backend.get("key1").is_some());

        sleep(Duration::from_millis(1100));
        assert_eq!(backend.get("key1"), None);
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let (_dir, backend) = backend(10);

        // Valid header, garbage payload
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{not json");
        fs::write(backend.path_for("bad"), bytes).unwrap();
        assert_eq!(backend.get("bad"), None);

        // Truncated header
        fs::write(backend.path_for("short"), b"abc").unwrap();
        assert_eq!(backend.get("short"), None);
    }

    #[test]
    fn test_interrupted_write_leaves_prior_value() {
        let (_dir, backend) = backend(10);

        backend.set("key1", json!("old"), Expiry::Default);

        // A temporary that never got renamed
        let stray = backend.dir().join(format!("abandoned{}", TX_SUFFIX));
        fs::write(&stray, b"partial").unwrap();

        assert_eq!(backend.get("key1"), Some(json!("old")));
        assert_eq!(backend.len_hint(), Some(1));

        backend.clear(None);
        assert!(stray.exists());
        assert_eq!(backend.get("key1"), None);
    }

    #[test]
    fn test_clear_single_key() {
        let (_dir, backend) = backend(10);

        backend.set("key1", json!(1), Expiry::Default);
        backend.set("key2", json!(2), Expiry::Default);
        backend.clear(Some("key1"));
        backend.clear(Some("never-set"));

        assert_eq!(backend.get("key1"), None);
        assert_eq!(backend.get("key2"), Some(json!(2)));
    }

    #[test]
    fn test_prune_keeps_growth_bounded() {
        let (_dir, backend) = backend(3);

        for i in 0..30 {
            backend.set(&format!("key{}", i), json!(i), Expiry::Default);
            let count = backend.len_hint().unwrap();
            assert!(count <= 4, "{} files exceed bound", count);
        }
        // The most recent write always survives
        assert_eq!(backend.get("key29"), Some(json!(29)));
    }

    #[test]
    fn test_prune_removes_expired_records() {
        let (_dir, backend) = backend(2);

        backend.set("a", json!(1), Expiry::Seconds(0));
        backend.set("b", json!(2), Expiry::Seconds(0));
        backend.set("c", json!(3), Expiry::Seconds(0));
        sleep(Duration::from_millis(20));
        backend.set("d", json!(4), Expiry::Default);

        assert_eq!(backend.len_hint(), Some(1));
        assert_eq!(backend.get("d"), Some(json!(4)));
    }

    #[cfg(unix)]
    #[test]
    fn test_record_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, backend) = backend(10);
        backend.set("key1", json!(1), Expiry::Default);

        let mode = fs::metadata(backend.path_for("key1")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
