//! Read-only aggregates over the store, consumed by dashboards and notifications.

use crate::{
    classify::HealthRecord,
    data::Table,
    posting::{Posting, Source},
    store::{posting_from_row, Store},
    utils, TrackerError,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::Row;

pub const DEFAULT_RECENT_DAYS: i64 = 30;
pub const DEFAULT_TOP_INSTITUTIONS: u32 = 10;

/// A store without postings this recent is considered stale.
pub const FRESH_POSTING_DAYS: i64 = 7;
pub const MONITORING_MAX_AGE_HOURS: i64 = 24;
pub const MIN_ACCESSIBLE_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: Source,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstitutionCount {
    pub institution: String,
    pub count: u32,
}

/// Covers every monitored url regardless of `last_checked`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total: u32,
    pub accessible: u32,
    pub avg_response_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheck {
    fn new<S: Into<String>>(status: HealthStatus, message: S) -> Self {
        HealthCheck {
            status,
            message: message.into(),
        }
    }

    fn failed(err: TrackerError) -> Self {
        HealthCheck::new(HealthStatus::Unhealthy, err.to_string())
    }
}

/// Overall status is healthy when every check passes, degraded when one fails and
/// unhealthy otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub database: HealthCheck,
    pub data_freshness: HealthCheck,
    pub websites: HealthCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_postings: u32,
    pub recent_postings: u32,
    pub recent_window_days: i64,
    pub by_source: Vec<SourceCount>,
    pub by_institution: Vec<InstitutionCount>,
    pub websites: HealthSummary,
}

impl Store {
    pub async fn total_postings(&self) -> Result<u32, TrackerError> {
        Ok(self.postings.count().await?)
    }

    pub async fn count_by_source(&self) -> Result<Vec<SourceCount>, TrackerError> {
        let query = format!(
            "SELECT source, COUNT(*) AS count FROM {} GROUP BY source ORDER BY count DESC, source",
            self.postings.get_name()
        );
        let mut counts = vec![];
        for row in sqlx::query(&query).fetch_all(&self.pool).await? {
            let source: Option<String> = row.try_get("source")?;
            counts.push(SourceCount {
                source: source
                    .as_deref()
                    .map_or(Source::Other, |s| s.parse().unwrap_or(Source::Other)),
                count: row.try_get("count")?,
            });
        }
        Ok(counts)
    }

    /// Most frequent institutions first. Ties are ordered by name.
    pub async fn count_by_institution(
        &self,
        top_n: u32,
    ) -> Result<Vec<InstitutionCount>, TrackerError> {
        let query = format!(
            "SELECT institution, COUNT(*) AS count FROM {}
             GROUP BY institution ORDER BY count DESC, institution LIMIT ?",
            self.postings.get_name()
        );
        let mut counts = vec![];
        for row in sqlx::query(&query)
            .bind(top_n)
            .fetch_all(&self.pool)
            .await?
        {
            counts.push(InstitutionCount {
                institution: row.try_get("institution")?,
                count: row.try_get("count")?,
            });
        }
        Ok(counts)
    }

    /// Postings whose `posted_date` falls within the last `window_days` days, today included.
    /// A window reaching past the calendar's start counts every posting.
    pub async fn count_recent(&self, window_days: i64) -> Result<u32, TrackerError> {
        let Some(since) = days_before(utils::today(), window_days) else {
            return self.total_postings().await;
        };
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE posted_date >= ?",
            self.postings.get_name()
        );
        Ok(sqlx::query(&query)
            .bind(since)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?)
    }

    /// Newest `posted_date` first, then in insertion order.
    pub async fn recent_postings(&self, limit: u32) -> Result<Vec<Posting>, TrackerError> {
        let query = format!(
            "SELECT * FROM {} ORDER BY posted_date DESC, id LIMIT ?",
            self.postings.get_name()
        );
        let mut postings = vec![];
        let mut rows = sqlx::query(&query).bind(limit).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            postings.push(posting_from_row(&row)?);
        }
        Ok(postings)
    }

    pub async fn health_summary(&self) -> Result<HealthSummary, TrackerError> {
        let query = format!(
            "SELECT
                COUNT(*) AS total,
                COUNT(CASE WHEN accessible = 1 THEN 1 END) AS accessible,
                AVG(response_time) AS avg_response_time
             FROM {}",
            self.health.get_name()
        );
        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(HealthSummary {
            total: row.try_get("total")?,
            accessible: row.try_get("accessible")?,
            avg_response_time: row.try_get("avg_response_time")?,
        })
    }

    /// Monitored urls not checked within `max_age`, for callers that do not trust old rows.
    pub async fn stale_health_count(&self, max_age: Duration) -> Result<usize, TrackerError> {
        let Some(cutoff) = utils::get_now().checked_sub_signed(max_age) else {
            return Ok(0);
        };
        Ok(self
            .health_records()
            .await?
            .iter()
            .filter(|r| r.last_checked < cutoff)
            .count())
    }

    pub async fn summary(&self, top_n: u32, window_days: i64) -> Result<Summary, TrackerError> {
        Ok(Summary {
            total_postings: self.total_postings().await?,
            recent_postings: self.count_recent(window_days).await?,
            recent_window_days: window_days,
            by_source: self.count_by_source().await?,
            by_institution: self.count_by_institution(top_n).await?,
            websites: self.health_summary().await?,
        })
    }

    /// Rolls the store up into one status. A check that errors counts as unhealthy.
    pub async fn system_health(&self) -> SystemHealth {
        let database = self.check_tables().await.unwrap_or_else(HealthCheck::failed);
        let data_freshness = self
            .check_freshness()
            .await
            .unwrap_or_else(HealthCheck::failed);
        let websites = self
            .check_websites()
            .await
            .unwrap_or_else(HealthCheck::failed);

        let failing = [&database, &data_freshness, &websites]
            .iter()
            .filter(|c| c.status != HealthStatus::Healthy)
            .count();
        let overall = match failing {
            0 => HealthStatus::Healthy,
            1 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        };

        SystemHealth {
            overall,
            checked_at: utils::get_now(),
            database,
            data_freshness,
            websites,
        }
    }

    async fn check_tables(&self) -> Result<HealthCheck, TrackerError> {
        let mut missing = vec![];
        for table in [self.postings.get_name(), self.health.get_name()] {
            if !utils::is_table_exists(&self.pool, table).await? {
                missing.push(table);
            }
        }
        if !missing.is_empty() {
            return Ok(HealthCheck::new(
                HealthStatus::Unhealthy,
                format!("Missing tables: {}", missing.join(", ")),
            ));
        }
        Ok(HealthCheck::new(
            HealthStatus::Healthy,
            format!(
                "Database operational with {} opportunities",
                self.total_postings().await?
            ),
        ))
    }

    async fn check_freshness(&self) -> Result<HealthCheck, TrackerError> {
        if self.count_recent(FRESH_POSTING_DAYS).await? == 0 {
            return Ok(HealthCheck::new(
                HealthStatus::Degraded,
                format!("No new opportunities in the last {} days", FRESH_POSTING_DAYS),
            ));
        }
        if self.recently_checked().await?.is_empty() {
            return Ok(HealthCheck::new(
                HealthStatus::Degraded,
                "Website monitoring data is stale",
            ));
        }
        Ok(HealthCheck::new(
            HealthStatus::Healthy,
            "Data is fresh and up-to-date",
        ))
    }

    async fn check_websites(&self) -> Result<HealthCheck, TrackerError> {
        let records = self.recently_checked().await?;
        if records.is_empty() {
            return Ok(HealthCheck::new(
                HealthStatus::Unhealthy,
                "No website monitoring data available",
            ));
        }

        let accessible = records.iter().filter(|r| r.accessible).count();
        let ratio = accessible as f64 / records.len() as f64;
        if ratio < MIN_ACCESSIBLE_RATIO {
            return Ok(HealthCheck::new(
                HealthStatus::Degraded,
                format!("Only {:.1}% of websites accessible", ratio * 100.0),
            ));
        }

        let times = records
            .iter()
            .filter_map(|r| r.response_time)
            .collect::<Vec<_>>();
        let avg = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        Ok(HealthCheck::new(
            HealthStatus::Healthy,
            format!(
                "{:.1}% websites accessible, avg response: {:.1}s",
                ratio * 100.0,
                avg
            ),
        ))
    }

    async fn recently_checked(&self) -> Result<Vec<HealthRecord>, TrackerError> {
        let cutoff = utils::get_now() - Duration::hours(MONITORING_MAX_AGE_HOURS);
        Ok(self
            .health_records()
            .await?
            .into_iter()
            .filter(|r| r.last_checked >= cutoff)
            .collect())
    }
}

fn days_before(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::try_days(days)?)
}
