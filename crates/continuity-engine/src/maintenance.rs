use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use continuity_core::{Message, Role};

use crate::state::StateRegistry;

const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_INTER_BATCH_SLEEP_MS: u64 = 100;

#[derive(Debug, Default, Serialize)]
pub struct MaintenanceReport {
    pub run_number: u64,
    pub indexed: usize,
    pub pruned: usize,
    pub archive_stats: Vec<serde_json::Value>,
    pub errors: Vec<String>,
}

/// Background sweep that catches every agent's archive up in the index and
/// prunes expired days. Runs on an interval timer and serializes its own
/// concurrent runs, per §5 — it never overlaps itself.
pub struct MaintenanceService {
    interval_secs: u64,
    inter_batch_sleep_ms: u64,
    retention_days: i64,
    run_number: std::sync::atomic::AtomicU64,
}

impl Default for MaintenanceService {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            inter_batch_sleep_ms: DEFAULT_INTER_BATCH_SLEEP_MS,
            retention_days: 365,
            run_number: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl MaintenanceService {
    pub fn new(interval_secs: u64, inter_batch_sleep_ms: u64, retention_days: i64) -> Self {
        Self { interval_secs, inter_batch_sleep_ms, retention_days, run_number: std::sync::atomic::AtomicU64::new(0) }
    }

    /// One sweep across every known agent. Errors on a single day or a
    /// single agent are logged and skipped; they never abort the rest.
    pub async fn run_once(&self, registry: &StateRegistry) -> MaintenanceReport {
        let run_number = self.run_number.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        let mut report = MaintenanceReport { run_number, ..Default::default() };

        for state in registry.agents() {
            let indexer = match state.indexer().await {
                Ok(i) => i,
                Err(e) => {
                    report.errors.push(format!("{}: indexer unavailable: {e}", state.agent_id));
                    continue;
                }
            };

            let log = match state.ensure_storage().await {
                Ok(storage) => storage.load_index_log(),
                Err(e) => {
                    report.errors.push(format!("{}: storage unavailable: {e}", state.agent_id));
                    continue;
                }
            };

            let dates = match state.archiver.get_unindexed_dates(&log.dates) {
                Ok(d) => d,
                Err(e) => {
                    report.errors.push(format!("{}: failed listing unindexed dates: {e}", state.agent_id));
                    continue;
                }
            };

            for date in dates {
                let conversation = match state.archiver.get_conversation(&date) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(agent = %state.agent_id, date, error = %e, "skipping unreadable archive day");
                        report.errors.push(format!("{}: {date}: {e}", state.agent_id));
                        continue;
                    }
                };
                let messages: Vec<Message> = conversation
                    .into_iter()
                    .map(|m| {
                        let role = match m.sender {
                            continuity_archive::Sender::User => Role::User,
                            continuity_archive::Sender::Agent => Role::Assistant,
                        };
                        Message::new(role, m.text)
                    })
                    .collect();

                match indexer.index_day(&date, &messages).await {
                    Ok(n) => report.indexed += n,
                    Err(e) => {
                        warn!(agent = %state.agent_id, date, error = %e, "index_day failed during maintenance");
                        report.errors.push(format!("{}: {date}: {e}", state.agent_id));
                    }
                }

                tokio::time::sleep(Duration::from_millis(self.inter_batch_sleep_ms)).await;
            }

            match state.archiver.prune_old(self.retention_days) {
                Ok(n) => report.pruned += n,
                Err(e) => report.errors.push(format!("{}: prune failed: {e}", state.agent_id)),
            }

            if let Ok(stats) = state.archiver.get_stats() {
                report.archive_stats.push(serde_json::json!({
                    "agentId": state.agent_id.as_str(),
                    "totalDays": stats.total_days,
                    "totalMessages": stats.total_messages,
                }));
            }
        }

        info!(run = run_number, indexed = report.indexed, pruned = report.pruned, errors = report.errors.len(), "maintenance sweep complete");
        report
    }

    /// Polls on `interval_secs` until `shutdown` broadcasts `true`. Uses a
    /// `tokio::select!` over the timer and the shutdown channel so the
    /// periodic timer never blocks process exit.
    pub async fn run(self, registry: std::sync::Arc<StateRegistry>, mut shutdown: watch::Receiver<bool>) {
        info!("maintenance service started");
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_once(&registry).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("maintenance service shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuity_core::config::ContinuityConfig;

    #[tokio::test]
    async fn empty_registry_produces_empty_report() {
        let registry = StateRegistry::new(std::env::temp_dir().join("continuity-maintenance-test"), ContinuityConfig::default());
        let service = MaintenanceService::default();
        let report = service.run_once(&registry).await;
        assert_eq!(report.indexed, 0);
        assert_eq!(report.pruned, 0);
        assert!(report.errors.is_empty());
    }
}
