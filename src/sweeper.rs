//! Retention sweeper: periodic deletion of expired stored files.
//!
//! Every `sweep_interval` the sweeper lists the regular files in the upload
//! and output directories and deletes those whose modification time is more
//! than `retention` in the past. It runs independently of any request.
//!
//! ## No locking
//!
//! The sweeper and the dispatcher share the directories without any
//! coordination. The only thing protecting a file a conversion is still
//! reading or writing is its age: a fresh file is never older than the
//! retention window. This holds as long as conversions finish well inside
//! `retention` (24 h by default against a 300 s tool timeout); it is a timing
//! assumption, not a guarantee.
//!
//! A file that cannot be stat'ed or removed is logged and counted, and the
//! sweep moves on to the next file. A second sweep right after the first finds nothing to do.

use crate::config::ConverterConfig;
use crate::outcome::{Origin, StoredFile, SweepReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delete every regular file in `dirs` older than `retention` at `now`.
pub async fn sweep_once(
    dirs: &[(PathBuf, Origin)],
    retention: Duration,
    now: SystemTime,
) -> SweepReport {
    let mut report = SweepReport::default();
    for (dir, origin) in dirs {
        let files = match StoredFile::scan_counting(dir, *origin).await {
            Ok((files, unreadable)) => {
                report.failed += unreadable;
                files
            }
            Err(e) => {
                warn!("Cleanup error: cannot list {}: {}", dir.display(), e);
                report.failed += 1;
                continue;
            }
        };

        for file in files {
            report.scanned += 1;
            if !is_expired(&file, retention, now) {
                continue;
            }
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => {
                    report.deleted += 1;
                    info!("Deleted old {:?} file: {}", file.origin, file.path.display());
                }
                // Already gone, e.g. a concurrent sweep.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    report.failed += 1;
                    warn!("Cleanup error: cannot delete {}: {}", file.path.display(), e);
                }
            }
        }
    }
    report
}

/// True when `now - created_at` exceeds `retention`.
///
/// Files with a modification time in the future are never expired.
pub fn is_expired(file: &StoredFile, retention: Duration, now: SystemTime) -> bool {
    now.duration_since(file.created_at)
        .map(|age| age > retention)
        .unwrap_or(false)
}

/// The upload and output directories, labelled with their origin.
pub fn storage_targets(config: &ConverterConfig) -> [(PathBuf, Origin); 2] {
    [
        (config.upload_dir.clone(), Origin::Upload),
        (config.output_dir.clone(), Origin::Output),
    ]
}

/// Handle to the background sweep task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Ask the task to stop after the current sweep.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop the task and wait for it to exit.
    pub async fn join(mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the periodic sweep on the current runtime.
///
/// The first sweep happens one `sweep_interval` after start.
pub fn spawn(config: Arc<ConverterConfig>) -> SweeperHandle {
    let (tx, mut rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let period = config.sweep_interval;
        let dirs = storage_targets(&config);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            "Retention sweeper started (every {}s, retention {}s)",
            period.as_secs(),
            config.retention.as_secs()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Running file cleanup task");
                    let report = sweep_once(&dirs, config.retention, SystemTime::now()).await;
                    info!(
                        scanned = report.scanned,
                        deleted = report.deleted,
                        failed = report.failed,
                        "File cleanup finished"
                    );
                }
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Retention sweeper shutting down");
    });

    SweeperHandle {
        shutdown: tx,
        handle: Some(handle),
    }
}
