//! On-disk FIFO of serialized batches, bounded by a total byte quota.
//!
//! Entries are named `batch-<unix-secs>-<hex-token>.json` so that
//! lexicographic and mtime orderings both reflect creation order (spec §3).
//! Writes go to a temp file and are renamed into place so a reader never
//! observes a partially-written batch file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

use crate::event::Batch;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("spool I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spool entry is corrupt and was removed: {path}")]
    Corrupt { path: PathBuf },
}

pub struct SpoolStore {
    dir: PathBuf,
}

impl SpoolStore {
    /// Creates the spool directory if missing. The only startup failure
    /// that is fatal for the whole process is this one (spec §7).
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn total_bytes(&self) -> u64 {
        fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }

    /// Writes a batch to a new spool file unless doing so would exceed the
    /// byte quota; quota is checked before writing (invariant I3).
    pub fn write(&self, batch: &Batch, max_bytes: u64) -> Result<bool, SpoolError> {
        if batch.is_empty() {
            return Ok(false);
        }
        let current = self.total_bytes();
        if current > max_bytes {
            tracing::warn!(current, max_bytes, "spool quota exceeded; dropping batch");
            return Ok(false);
        }

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let token = Uuid::new_v4().simple().to_string();
        let final_path = self.dir.join(format!("batch-{secs}-{token}.json"));
        let tmp_path = self.dir.join(format!(".batch-{secs}-{token}.json.tmp"));

        let mut f = File::create(&tmp_path)?;
        serde_json::to_writer(&mut f, batch).map_err(std::io::Error::from)?;
        f.flush()?;
        fs::rename(&tmp_path, &final_path)?;

        tracing::info!(path = %final_path.display(), events = batch.len(), "spooled batch");
        Ok(true)
    }

    /// Enumerates spool files ordered by mtime ascending.
    pub fn list_oldest_first(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries: Vec<(PathBuf, SystemTime)> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                let mtime = meta.modified().ok()?;
                Some((e.path(), mtime))
            })
            .collect();
        entries.sort_by_key(|(_, mtime)| *mtime);
        Ok(entries.into_iter().map(|(p, _)| p).collect())
    }

    /// Deserializes a spool file; on parse failure the file is deleted (it
    /// is corrupt) and `Corrupt` is reported.
    pub fn read(&self, path: &Path) -> Result<Batch, SpoolError> {
        let text = fs::read_to_string(path)?;
        match serde_json::from_str::<Batch>(&text) {
            Ok(batch) => Ok(batch),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt spool entry; removing");
                let _ = fs::remove_file(path);
                Err(SpoolError::Corrupt { path: path.to_path_buf() })
            }
        }
    }

    /// Removes a spool file after a successful replay.
    pub fn delete(&self, path: &Path) -> std::io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CollectorIdentity, Meta};

    fn batch_of(n: usize) -> Batch {
        Batch::new(
            (0..n)
                .map(|i| crate::event::Event {
                    client_uuid: Uuid::new_v4(),
                    ts: 0,
                    source: "/var/log/a.log".into(),
                    msg: format!("line-{i}"),
                    meta: Meta { ip: None, user: None },
                    collector: CollectorIdentity { host: "h".into() },
                })
                .collect(),
        )
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(dir.path()).unwrap();
        let batch = batch_of(3);
        assert!(store.write(&batch, u64::MAX).unwrap());

        let files = store.list_oldest_first().unwrap();
        assert_eq!(files.len(), 1);
        let read_back = store.read(&files[0]).unwrap();
        assert_eq!(read_back.len(), 3);
    }

    #[test]
    fn write_skips_when_quota_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(dir.path()).unwrap();
        store.write(&batch_of(50), u64::MAX).unwrap();
        let before = store.list_oldest_first().unwrap().len();

        // Quota already below current usage -> the next write must be skipped.
        let wrote = store.write(&batch_of(1), 1).unwrap();
        assert!(!wrote);
        assert_eq!(store.list_oldest_first().unwrap().len(), before);
    }

    #[test]
    fn read_deletes_corrupt_file_and_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(dir.path()).unwrap();
        let bad = dir.path().join("batch-1-deadbeef.json");
        fs::write(&bad, b"{not valid json").unwrap();

        let err = store.read(&bad).unwrap_err();
        assert!(matches!(err, SpoolError::Corrupt { .. }));
        assert!(!bad.exists());
    }

    #[test]
    fn list_oldest_first_orders_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(dir.path()).unwrap();
        store.write(&batch_of(1), u64::MAX).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        store.write(&batch_of(1), u64::MAX).unwrap();

        let files = store.list_oldest_first().unwrap();
        assert_eq!(files.len(), 2);
        let first_mtime = fs::metadata(&files[0]).unwrap().modified().unwrap();
        let second_mtime = fs::metadata(&files[1]).unwrap().modified().unwrap();
        assert!(first_mtime <= second_mtime);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(dir.path()).unwrap();
        store.write(&batch_of(1), u64::MAX).unwrap();
        let files = store.list_oldest_first().unwrap();
        store.delete(&files[0]).unwrap();
        store.delete(&files[0]).unwrap(); // already gone; still Ok
    }

    #[test]
    fn empty_batch_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpoolStore::new(dir.path()).unwrap();
        assert!(!store.write(&Batch::default(), u64::MAX).unwrap());
        assert!(store.list_oldest_first().unwrap().is_empty());
    }
}
