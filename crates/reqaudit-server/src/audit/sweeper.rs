//! Retention sweeper
//!
//! Deletes log records older than the configured retention on a cron
//! schedule. Each record is deleted independently, so one failure never stops
//! the rest of a sweep, and a failed sweep never stops the schedule.

use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use futures::{stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

use super::{
    models::{fields, LogRecordSpec},
    retention::RetentionSettings,
};
use crate::store::{ExtensionClient, ListOptions, Query, Sort, StoreResult};

/// Daily at midnight
pub const DEFAULT_SCHEDULE: &str = "0 0 0 * * * *";

const DELETE_CONCURRENCY: usize = 8;

/// Soft-deleted records older than this are removed physically
const RECLAIM_GRACE_HOURS: i64 = 1;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Invalid timezone '{0}'")]
    InvalidTimezone(String),
}

/// Cron expression evaluated in a fixed timezone
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
}

impl SweepSchedule {
    /// Accepts the 5-field Unix form as well as the 6/7-field form with seconds
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        let expanded = match expression.split_whitespace().count() {
            5 => format!("0 {expression} *"),
            _ => expression.to_string(),
        };

        let schedule = Schedule::from_str(&expanded).map_err(|e| ScheduleError::InvalidExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        let timezone: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            timezone,
        })
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

impl fmt::Display for SweepSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.expression, self.timezone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub cutoff: DateTime<Utc>,
    pub matched: usize,
    pub deleted: usize,
    pub failed: usize,
    pub reclaimed: u64,
}

pub struct RetentionSweeper {
    client: ExtensionClient,
    settings: RetentionSettings,
    schedule: SweepSchedule,
}

impl RetentionSweeper {
    pub fn new(client: ExtensionClient, schedule: SweepSchedule) -> Self {
        Self {
            settings: RetentionSettings::new(client.clone()),
            client,
            schedule,
        }
    }

    pub fn schedule(&self) -> &SweepSchedule {
        &self.schedule
    }

    pub async fn sweep_once(&self) -> StoreResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Delete every live record with `accessTime` before `now - days`.
    ///
    /// A window reaching past the earliest representable time expires nothing.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> StoreResult<SweepReport> {
        let days = self.settings.days().await?;
        let cutoff = Duration::try_days(i64::from(days)).and_then(|window| now.checked_sub_signed(window));

        let expired = match cutoff {
            Some(cutoff) => {
                let options =
                    ListOptions::filter(Query::not_deleted().and(Query::before(fields::ACCESS_TIME, &cutoff)));
                self.client
                    .list_all::<LogRecordSpec>(&options, &Sort::unsorted())
                    .await?
            },
            None => {
                warn!(days, "Retention window exceeds the supported date range, nothing expires");
                Vec::new()
            },
        };
        let cutoff = cutoff.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let matched = expired.len();

        let outcomes: Vec<bool> = stream::iter(expired)
            .map(|record| {
                let client = self.client.clone();
                async move {
                    match client.delete::<LogRecordSpec>(record.name()).await {
                        Ok(_) => true,
                        Err(e) => {
                            error!(record_id = %record.name(), error = %e, "Failed to delete expired log record");
                            false
                        },
                    }
                }
            })
            .buffer_unordered(DELETE_CONCURRENCY)
            .collect()
            .await;

        let deleted = outcomes.iter().filter(|ok| **ok).count();

        let reclaimed = match now.checked_sub_signed(Duration::hours(RECLAIM_GRACE_HOURS)) {
            Some(reclaim_before) => match self.client.reclaim::<LogRecordSpec>(reclaim_before).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "Failed to reclaim deleted log records");
                    0
                },
            },
            None => 0,
        };

        Ok(SweepReport {
            cutoff,
            matched,
            deleted,
            failed: matched - deleted,
            reclaimed,
        })
    }

    /// Run sweeps on schedule until `shutdown` fires
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(schedule = %self.schedule, "Retention sweeper started");

            loop {
                let now = Utc::now();
                let Some(next) = self.schedule.next_after(now) else {
                    warn!(schedule = %self.schedule, "Schedule has no upcoming run, sweeper stopping");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        match self.sweep_once().await {
                            Ok(report) => info!(
                                cutoff = %report.cutoff,
                                matched = report.matched,
                                deleted = report.deleted,
                                failed = report.failed,
                                reclaimed = report.reclaimed,
                                "Retention sweep finished"
                            ),
                            Err(e) => error!(error = %e, "Retention sweep failed"),
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Retention sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::models::{LogRecord, VISITOR},
        store::{Document, DocumentStore, ListResult, MemoryStore, PageRequest, StoreError},
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn record(id: &str, access_time: DateTime<Utc>) -> LogRecord {
        LogRecordSpec {
            id: id.to_string(),
            username: VISITOR.to_string(),
            client_ip: "127.0.0.1".to_string(),
            path: "/api/test".to_string(),
            method: "GET".to_string(),
            access_time,
            request_headers: "{}".to_string(),
            request_body: String::new(),
            request_params: BTreeMap::new(),
            response_headers: "{}".to_string(),
            response_body: String::new(),
            response_status: "200".to_string(),
        }
        .into_record()
    }

    fn schedule() -> SweepSchedule {
        SweepSchedule::parse(DEFAULT_SCHEDULE, "UTC").unwrap()
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        client.create(record("old", now - Duration::days(8))).await.unwrap();
        client.create(record("recent", now - Duration::days(6))).await.unwrap();

        let sweeper = RetentionSweeper::new(client.clone(), schedule());
        let report = sweeper.sweep_at(now).await.unwrap();

        assert_eq!(report.cutoff, now - Duration::days(7));
        assert_eq!(report.matched, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);

        let old = client.fetch::<LogRecordSpec>("old").await.unwrap().unwrap();
        let recent = client.fetch::<LogRecordSpec>("recent").await.unwrap().unwrap();
        assert!(old.is_deleted());
        assert!(!recent.is_deleted());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        client.create(record("old", now - Duration::days(8))).await.unwrap();

        let sweeper = RetentionSweeper::new(client, schedule());
        assert_eq!(sweeper.sweep_at(now).await.unwrap().deleted, 1);

        let rerun = sweeper.sweep_at(now).await.unwrap();
        assert_eq!(rerun.matched, 0);
        assert_eq!(rerun.deleted, 0);
    }

    #[tokio::test]
    async fn test_sweep_uses_configured_days() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        client.create(record("two-days", now - Duration::days(2))).await.unwrap();
        RetentionSettings::new(client.clone()).set_days(1).await.unwrap();

        let sweeper = RetentionSweeper::new(client, schedule());
        let report = sweeper.sweep_at(now).await.unwrap();
        assert_eq!(report.cutoff, now - Duration::days(1));
        assert_eq!(report.deleted, 1);
    }

    #[tokio::test]
    async fn test_sweep_with_huge_window_expires_nothing() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        client.create(record("ancient", now - Duration::days(365 * 200))).await.unwrap();
        RetentionSettings::new(client.clone()).set_days(1_000_000_000).await.unwrap();

        let sweeper = RetentionSweeper::new(client.clone(), schedule());
        let report = sweeper.sweep_at(now).await.unwrap();

        assert_eq!(report.cutoff, DateTime::<Utc>::MIN_UTC);
        assert_eq!(report.matched, 0);
        assert_eq!(report.deleted, 0);
        assert!(!client.fetch::<LogRecordSpec>("ancient").await.unwrap().unwrap().is_deleted());

        // the widest stored value
        RetentionSettings::new(client.clone()).set_days(u32::MAX).await.unwrap();
        assert_eq!(sweeper.sweep_at(now).await.unwrap().matched, 0);
    }

    /// Memory store whose deletes fail for one name
    struct FailingDelete {
        inner: MemoryStore,
        poisoned: &'static str,
    }

    #[async_trait]
    impl DocumentStore for FailingDelete {
        async fn list(&self, kind: &str, options: &ListOptions, sort: &Sort) -> StoreResult<Vec<Document>> {
            self.inner.list(kind, options, sort).await
        }

        async fn list_page(
            &self,
            kind: &str,
            options: &ListOptions,
            page: &PageRequest,
        ) -> StoreResult<ListResult<Document>> {
            self.inner.list_page(kind, options, page).await
        }

        async fn fetch(&self, kind: &str, name: &str) -> StoreResult<Option<Document>> {
            self.inner.fetch(kind, name).await
        }

        async fn create(&self, document: Document) -> StoreResult<Document> {
            self.inner.create(document).await
        }

        async fn update(&self, document: Document) -> StoreResult<Document> {
            self.inner.update(document).await
        }

        async fn delete(&self, kind: &str, name: &str) -> StoreResult<Document> {
            if name == self.poisoned {
                return Err(StoreError::Unavailable("disk on fire".to_string()));
            }
            self.inner.delete(kind, name).await
        }

        async fn reclaim(&self, kind: &str, deleted_before: DateTime<Utc>) -> StoreResult<u64> {
            self.inner.reclaim(kind, deleted_before).await
        }
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failures() {
        let store = Arc::new(FailingDelete {
            inner: MemoryStore::new(),
            poisoned: "b",
        });
        let client = ExtensionClient::new(store);
        let now = Utc::now();
        for id in ["a", "b", "c"] {
            client.create(record(id, now - Duration::days(30))).await.unwrap();
        }

        let sweeper = RetentionSweeper::new(client.clone(), schedule());
        let report = sweeper.sweep_at(now).await.unwrap();

        assert_eq!(report.matched, 3);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 1);
        assert!(!client.fetch::<LogRecordSpec>("b").await.unwrap().unwrap().is_deleted());
    }

    #[test]
    fn test_schedule_next_run() {
        let after = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();

        let daily = schedule();
        assert_eq!(daily.next_after(after), Some(Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap()));

        let unix = SweepSchedule::parse("30 2 * * *", "UTC").unwrap();
        assert_eq!(unix.next_after(after), Some(Utc.with_ymd_and_hms(2026, 10, 18, 2, 30, 0).unwrap()));

        // midnight in Tokyo is 15:00 UTC the previous day
        let tokyo = SweepSchedule::parse(DEFAULT_SCHEDULE, "Asia/Tokyo").unwrap();
        assert_eq!(tokyo.next_after(after), Some(Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap()));
    }

    #[test]
    fn test_schedule_rejects_bad_input() {
        assert!(matches!(
            SweepSchedule::parse("not a cron", "UTC"),
            Err(ScheduleError::InvalidExpression { .. })
        ));
        assert!(matches!(
            SweepSchedule::parse(DEFAULT_SCHEDULE, "Mars/Olympus"),
            Err(ScheduleError::InvalidTimezone(_))
        ));
    }

    #[tokio::test]
    async fn test_start_stops_on_shutdown() {
        let client = ExtensionClient::new(Arc::new(MemoryStore::new()));
        let sweeper = Arc::new(RetentionSweeper::new(client, schedule()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = sweeper.start(shutdown_rx);
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
