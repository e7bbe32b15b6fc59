//! Single long-lived worker driving the size/time flush policy, transport,
//! and spool replay. Spool-drain always runs ahead of a fresh live send so
//! that, when connectivity returns, older spooled batches are sent first
//! (bounded reordering, spec §4.E).

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::buffer::SharedBuffer;
use crate::shutdown::ShutdownToken;
use crate::spool::SpoolStore;
use crate::transport::IngestClient;

const TICK_INTERVAL: Duration = Duration::from_millis(500);
const SPOOL_DRAIN_PERIOD: Duration = Duration::from_secs(30);

pub struct Flusher {
    buffer: Arc<SharedBuffer>,
    spool: Arc<SpoolStore>,
    client: IngestClient,
    batch_size: usize,
    flush_interval_secs: f64,
    max_spool_bytes: u64,
    shutdown: ShutdownToken,
}

impl Flusher {
    pub fn new(
        buffer: Arc<SharedBuffer>,
        spool: Arc<SpoolStore>,
        client: IngestClient,
        batch_size: usize,
        flush_interval_secs: f64,
        max_spool_bytes: u64,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            buffer,
            spool,
            client,
            batch_size,
            flush_interval_secs,
            max_spool_bytes,
            shutdown,
        }
    }

    pub fn run(&self) {
        tracing::info!("starting flusher");
        let mut next_periodic_drain = Instant::now() + SPOOL_DRAIN_PERIOD;

        while !self.shutdown.is_shutting_down() {
            let now = Instant::now();

            if let Some(batch) = self.buffer.drain_if_ready(self.batch_size, self.flush_interval_secs, now) {
                // Order spool ahead of the fresh batch.
                self.drain_once();
                match self.client.send(&batch) {
                    Ok(()) => tracing::info!(events = batch.len(), "sent batch"),
                    Err(e) => {
                        tracing::warn!(error = %e, events = batch.len(), "send failed; spooling batch");
                        if let Err(spool_err) = self.spool.write(&batch, self.max_spool_bytes) {
                            tracing::warn!(error = %spool_err, "failed to spool batch");
                        }
                    }
                }
                // Opportunistically drain again after a successful send.
                self.drain_once();
            }

            if now >= next_periodic_drain {
                self.drain_once();
                next_periodic_drain = now + SPOOL_DRAIN_PERIOD;
            }

            thread::sleep(TICK_INTERVAL);
        }

        tracing::info!("flusher shutting down; performing final drain");
        let final_batch = self.buffer.drain_all();
        if !final_batch.is_empty() {
            self.drain_once();
            if let Err(e) = self.client.send(&final_batch) {
                tracing::warn!(error = %e, "final send failed; spooling batch");
                if let Err(spool_err) = self.spool.write(&final_batch, self.max_spool_bytes) {
                    tracing::warn!(error = %spool_err, "failed to spool final batch");
                }
            }
        }
        self.drain_once();
        tracing::info!("flusher stopped");
    }

    /// Iterates spool entries oldest-first: read and POST each. On success,
    /// delete and continue. On transport failure, stop (preserve order,
    /// avoid hammering a down endpoint). On corruption, delete and continue.
    fn drain_once(&self) {
        let files = match self.spool.list_oldest_first() {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list spool directory");
                return;
            }
        };

        for path in files {
            let batch = match self.spool.read(&path) {
                Ok(batch) => batch,
                Err(crate::spool::SpoolError::Corrupt { .. }) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read spool entry");
                    continue;
                }
            };

            match self.client.send(&batch) {
                Ok(()) => {
                    if let Err(e) = self.spool.delete(&path) {
                        tracing::warn!(error = %e, path = %path.display(), "failed to delete replayed spool entry");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "spool replay send failed; stopping drain");
                    return;
                }
            }
        }
    }
}
