//! Rotation-safe file follower. Owns exactly one configured path and
//! produces a lazy sequence of whole lines into the shared buffer, surviving
//! inode change (rotation), truncation, and temporary disappearance.
//!
//! Implemented as an interval-polling loop over `std::fs::File`, matching
//! the explicit intervals in spec §4.B rather than an OS file-watcher -
//! watch-based designs are a different architecture than the one specified.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::annotate::annotate;
use crate::buffer::SharedBuffer;
use crate::shutdown::ShutdownToken;

const WAIT_FOR_APPEAR_INTERVAL: Duration = Duration::from_secs(2);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);
const ROTATION_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Per-path tailing state: open handle, last-observed inode, read position.
/// Mutated only by its owning follower thread.
struct OpenFile {
    reader: BufReader<File>,
    inode: u64,
    position: u64,
    /// Bytes of the current, not-yet-newline-terminated line. Raw bytes
    /// rather than a `String`: a line isn't required to be valid UTF-8, and
    /// decoding happens lossily once it's complete (see `annotate`'s
    /// decoding policy). `read_until` appends rather than overwrites, so
    /// holding a partial fragment here across polls lets it grow until a
    /// newline arrives instead of being silently dropped on the next read.
    pending: Vec<u8>,
}

pub struct Follower {
    path: PathBuf,
    hostname: String,
    buffer: std::sync::Arc<SharedBuffer>,
    shutdown: ShutdownToken,
}

impl Follower {
    pub fn new(
        path: PathBuf,
        hostname: String,
        buffer: std::sync::Arc<SharedBuffer>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self { path, hostname, buffer, shutdown }
    }

    /// Runs until the shutdown token is observed. Never returns an error -
    /// every failure category in §7 is logged and retried, matching "the
    /// follower never terminates on transient error".
    pub fn run(&self) {
        tracing::info!(path = %self.path.display(), "starting follower");

        let mut open = match self.wait_and_open() {
            Some(open) => open,
            None => {
                tracing::info!(path = %self.path.display(), "follower stopping before first open");
                return;
            }
        };

        while !self.shutdown.is_shutting_down() {
            match open.reader.read_until(b'\n', &mut open.pending) {
                Ok(0) => {
                    // EOF: sleep, then probe for rotation/truncation.
                    thread::sleep(IDLE_POLL_INTERVAL);
                    if let Some(new_open) = self.probe_rotation(&open) {
                        open = new_open;
                    }
                }
                Ok(n) => {
                    open.position += n as u64;
                    if open.pending.ends_with(b"\n") {
                        // Invalid UTF-8 is replaced rather than rejected
                        // (default decoding policy, spec §4.A); the
                        // replaced form is what gets annotated and shipped.
                        let line = String::from_utf8_lossy(&open.pending);
                        let trimmed = line.trim_end_matches(['\n', '\r']);
                        let event = annotate(trimmed, &path_str(&self.path), SystemTime::now(), &self.hostname);
                        self.buffer.enqueue(event);
                        open.pending.clear();
                    } else {
                        // No newline terminator yet: keep what was read in
                        // `pending` so the next poll extends it rather than
                        // emitting (or losing) a partial line. If rotation
                        // happens before it completes, it is lost when the
                        // new OpenFile starts with an empty pending buffer
                        // (§4.B partial-line policy).
                        thread::sleep(IDLE_POLL_INTERVAL);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "follower read error; retrying");
                    thread::sleep(IDLE_POLL_INTERVAL);
                }
            }
        }

        tracing::info!(path = %self.path.display(), "follower stopped");
    }

    /// Waits for the file to appear (if necessary), opens it, seeks to EOF,
    /// and records its inode. Returns `None` only if shutdown was observed
    /// while waiting.
    fn wait_and_open(&self) -> Option<OpenFile> {
        loop {
            if self.shutdown.is_shutting_down() {
                return None;
            }
            match File::open(&self.path) {
                Ok(mut file) => {
                    use std::io::{Seek, SeekFrom};
                    let inode = file.metadata().map(|m| m.ino()).unwrap_or(0);
                    if let Err(e) = file.seek(SeekFrom::End(0)) {
                        tracing::warn!(path = %self.path.display(), error = %e, "failed to seek to EOF; retrying");
                        thread::sleep(ROTATION_RETRY_BACKOFF);
                        continue;
                    }
                    let position = file.metadata().map(|m| m.size()).unwrap_or(0);
                    return Some(OpenFile { reader: BufReader::new(file), inode, position, pending: Vec::new() });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    thread::sleep(WAIT_FOR_APPEAR_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to open file; retrying");
                    thread::sleep(WAIT_FOR_APPEAR_INTERVAL);
                }
            }
        }
    }

    /// After an empty read, checks whether the path now refers to a
    /// different inode (rotation) or has shrunk under the current inode
    /// (truncation). Returns the reopened state on either, `None` if
    /// nothing changed (stay on the current handle).
    fn probe_rotation(&self, current: &OpenFile) -> Option<OpenFile> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Rotator gap between rename and recreate: back off, keep
                // the recorded inode, retry without reopening.
                thread::sleep(ROTATION_RETRY_BACKOFF);
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "stat failed during rotation probe");
                thread::sleep(ROTATION_RETRY_BACKOFF);
                return None;
            }
        };

        if metadata.ino() != current.inode {
            tracing::info!(path = %self.path.display(), "rotation detected; reopening at BOF");
            return self.reopen_at(0);
        }

        if metadata.size() < current.position {
            tracing::info!(path = %self.path.display(), "truncation detected; resetting read position");
            return self.reopen_at(0);
        }

        None
    }

    fn reopen_at(&self, position: u64) -> Option<OpenFile> {
        use std::io::{Seek, SeekFrom};
        match File::open(&self.path) {
            Ok(mut file) => {
                let inode = file.metadata().map(|m| m.ino()).unwrap_or(0);
                if let Err(e) = file.seek(SeekFrom::Start(position)) {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to seek after reopen; retaining old handle");
                    thread::sleep(ROTATION_RETRY_BACKOFF);
                    return None;
                }
                Some(OpenFile { reader: BufReader::new(file), inode, position, pending: Vec::new() })
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to reopen after rotation; retaining old handle");
                thread::sleep(ROTATION_RETRY_BACKOFF);
                None
            }
        }
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
