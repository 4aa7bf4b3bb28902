use crate::config::ConverterConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// What a sweep target holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Regular files; subdirectories are left alone
    Files,
    /// Per-invocation office profile directories, removed whole
    Profiles,
}

/// Periodically deletes staged and converted files older than the retention
/// window, along with office profiles a crashed or killed run left behind
pub struct Janitor {
    targets: Vec<(PathBuf, Target)>,
    retention: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Janitor {
    pub fn new(config: &ConverterConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            targets: vec![
                (config.staging_dir.clone(), Target::Files),
                (config.output_dir.clone(), Target::Files),
                (config.office_profile_dir.clone(), Target::Profiles),
            ],
            retention: config.retention(),
            interval: config.janitor_interval(),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Janitor started (every {}s, retention {}s)",
            self.interval.as_secs(),
            self.retention.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Janitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Delete every regular file and stale office profile older than the
    /// retention window
    pub async fn sweep(&self) -> SweepReport {
        tracing::info!("🧹 Sweeping old conversion files...");
        let mut report = SweepReport::default();
        let now = SystemTime::now();

        for (dir, target) in &self.targets {
            self.sweep_dir(dir, *target, now, &mut report).await;
        }

        tracing::info!(
            "✅ Sweep completed: {} scanned, {} removed, {} failed",
            report.scanned,
            report.removed,
            report.failed
        );
        report
    }

    async fn sweep_dir(&self, dir: &Path, target: Target, now: SystemTime, report: &mut SweepReport) {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                tracing::error!("Cannot read {}: {}", dir.display(), e);
                report.failed += 1;
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Cannot list {}: {}", dir.display(), e);
                    report.failed += 1;
                    break;
                }
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", path.display(), e);
                    report.failed += 1;
                    continue;
                }
            };
            let wanted = match target {
                Target::Files => metadata.is_file(),
                Target::Profiles => {
                    metadata.is_dir()
                        && entry.file_name().to_string_lossy().starts_with("profile-")
                }
            };
            if !wanted {
                continue;
            }
            report.scanned += 1;

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= self.retention {
                continue;
            }

            let removal = match target {
                Target::Files => tokio::fs::remove_file(&path).await,
                Target::Profiles => tokio::fs::remove_dir_all(&path).await,
            };
            match removal {
                Ok(()) => {
                    tracing::info!("Cleaned up old entry: {}", path.display());
                    report.removed += 1;
                }
                // Already removed by its request's own cleanup
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!("Error cleaning up {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
    }
}
