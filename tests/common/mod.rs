//! Shared harness for end-to-end tests: a temp spool dir, a mock ingest
//! endpoint, and helpers to drive a [`Follower`]/[`Flusher`] pair the same
//! way `main.rs` wires them together.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log_collector::buffer::SharedBuffer;
use log_collector::flusher::Flusher;
use log_collector::follower::Follower;
use log_collector::shutdown::ShutdownToken;
use log_collector::spool::SpoolStore;
use log_collector::transport::IngestClient;

pub struct TestEnv {
    pub _dir: tempfile::TempDir,
    pub log_path: PathBuf,
    pub spool: Arc<SpoolStore>,
    pub buffer: Arc<SharedBuffer>,
    pub shutdown: ShutdownToken,
    follower_handle: Option<thread::JoinHandle<()>>,
    flusher_handle: Option<thread::JoinHandle<()>>,
}

impl TestEnv {
    /// Spawns one follower over a fresh empty log file and one flusher
    /// pointed at `ingest_url`, mirroring the wiring in `main()`.
    pub fn start(ingest_url: &str, batch_size: usize, flush_interval_secs: f64, max_spool_bytes: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, b"").unwrap();
        let spool_dir = dir.path().join("spool");

        let spool = Arc::new(SpoolStore::new(&spool_dir).unwrap());
        let buffer = Arc::new(SharedBuffer::new(batch_size));
        let shutdown = ShutdownToken::new();

        let client = IngestClient::new(
            ingest_url.to_string(),
            None,
            Duration::from_secs(3),
            Duration::from_secs(5),
        )
        .unwrap();

        let flusher = Flusher::new(
            buffer.clone(),
            spool.clone(),
            client,
            batch_size,
            flush_interval_secs,
            max_spool_bytes,
            shutdown.clone(),
        );
        let flusher_handle = thread::spawn(move || flusher.run());

        let follower = Follower::new(log_path.clone(), "test-host".into(), buffer.clone(), shutdown.clone());
        let follower_handle = thread::spawn(move || follower.run());

        Self {
            _dir: dir,
            log_path,
            spool,
            buffer,
            shutdown,
            follower_handle: Some(follower_handle),
            flusher_handle: Some(flusher_handle),
        }
    }

    pub fn append_line(&self, line: &str) {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(&self.log_path).unwrap();
        writeln!(f, "{line}").unwrap();
    }

    pub fn stop(mut self) {
        self.shutdown.trigger();
        if let Some(h) = self.follower_handle.take() {
            h.join().unwrap();
        }
        if let Some(h) = self.flusher_handle.take() {
            h.join().unwrap();
        }
    }
}
