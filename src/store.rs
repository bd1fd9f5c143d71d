use crate::{
    classify::HealthRecord,
    data::{is_unique_violation, Table},
    posting::{Posting, Source},
    utils, TrackerError,
};
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use std::path::Path;
use tracing::{debug, info};

pub const POSTINGS_TABLE: &str = "job_opportunities";
pub const HEALTH_TABLE: &str = "website_monitoring";

pub struct PostingTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for PostingTable {
    type Record<'a> = &'a Posting;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if utils::is_table_exists(self.get_pool(), &self.name).await? {
            debug!("Use table {}", self.name);
        } else {
            debug!("Create table {}", self.name);
            let query = format!(
                r#"
                    CREATE TABLE {} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        title TEXT NOT NULL,
                        institution TEXT NOT NULL,
                        location TEXT,
                        application_deadline TEXT,
                        posted_date TEXT,
                        description TEXT,
                        requirements TEXT,
                        contact_info TEXT,
                        url TEXT UNIQUE,
                        source TEXT,
                        created_at TEXT DEFAULT CURRENT_TIMESTAMP
                    )
                "#,
                &self.name
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }
        Ok(())
    }

    async fn upsert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error> {
        let requirements = serde_json::to_string(&record.requirements)
            .map_err(|e| sqlx::Error::Protocol(format!("requirements of {}: {}", record.url, e)))?;
        let query = format!(
            r#"INSERT INTO {} (
                title,
                institution,
                location,
                application_deadline,
                posted_date,
                description,
                requirements,
                contact_info,
                url,
                source) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                institution = excluded.institution,
                location = excluded.location,
                application_deadline = excluded.application_deadline,
                posted_date = excluded.posted_date,
                description = excluded.description,
                requirements = excluded.requirements,
                contact_info = excluded.contact_info,
                source = excluded.source"#,
            self.name
        );
        sqlx::query(&query)
            .bind(record.title.as_str())
            .bind(record.institution.as_str())
            .bind(record.location.as_deref())
            .bind(record.application_deadline)
            .bind(record.posted_date)
            .bind(record.description.as_str())
            .bind(requirements)
            .bind(record.contact_info.as_str())
            .bind(record.url.trim())
            .bind(record.source.as_str())
            .execute(self.get_pool())
            .await?;
        Ok(())
    }
}

pub struct HealthTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for HealthTable {
    type Record<'a> = &'a HealthRecord;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if utils::is_table_exists(self.get_pool(), &self.name).await? {
            debug!("Use table {}", self.name);
        } else {
            debug!("Create table {}", self.name);
            let query = format!(
                r#"
                    CREATE TABLE {} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        url TEXT UNIQUE,
                        accessible BOOLEAN,
                        response_time REAL,
                        status_code INTEGER,
                        has_job_section BOOLEAN,
                        last_checked TEXT
                    )
                "#,
                &self.name
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }
        Ok(())
    }

    async fn upsert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error> {
        let query = format!(
            r#"INSERT INTO {} (
                url,
                accessible,
                response_time,
                status_code,
                has_job_section,
                last_checked) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                accessible = excluded.accessible,
                response_time = excluded.response_time,
                status_code = excluded.status_code,
                has_job_section = excluded.has_job_section,
                last_checked = excluded.last_checked"#,
            self.name
        );
        sqlx::query(&query)
            .bind(record.url.trim())
            .bind(record.accessible)
            .bind(record.response_time)
            .bind(record.status_code.map(i64::from))
            .bind(record.has_job_section)
            .bind(record.last_checked)
            .execute(self.get_pool())
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub written: usize,
    /// Rows dropped on a uniqueness conflict other than url.
    pub skipped: usize,
}

pub struct Store {
    pub postings: PostingTable,
    pub health: HealthTable,
    pub(crate) pool: SqlitePool,
}

impl Store {
    /// Opens (creating if needed) the database file. A single connection serves every
    /// call, matching the one-operation-at-a-time scan.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Store, TrackerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opt)
            .await?;
        let store = Store {
            postings: PostingTable {
                name: POSTINGS_TABLE.to_string(),
                pool: pool.clone(),
            },
            health: HealthTable {
                name: HEALTH_TABLE.to_string(),
                pool: pool.clone(),
            },
            pool,
        };

        store.postings.create().await?;
        store.health.create().await?;

        Ok(store)
    }

    /// Rows are written one by one; a failure midway leaves earlier rows in place.
    pub async fn upsert_postings(&self, postings: &[Posting]) -> Result<UpsertSummary, TrackerError> {
        let mut summary = UpsertSummary::default();
        for posting in postings {
            match self.postings.upsert(posting).await {
                Ok(()) => summary.written += 1,
                Err(e) if is_unique_violation(&e) => {
                    info!("Opportunity already exists: {}", posting.title);
                    summary.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(summary)
    }

    pub async fn upsert_health(&self, record: &HealthRecord) -> Result<(), TrackerError> {
        match self.health.upsert(record).await {
            Err(e) if is_unique_violation(&e) => {
                info!("Health record already exists: {}", record.url);
                Ok(())
            }
            res => Ok(res?),
        }
    }

    pub async fn get_posting<S: AsRef<str>>(&self, url: S) -> Result<Option<Posting>, TrackerError> {
        let query = format!("SELECT * FROM {} WHERE url = ?", self.postings.get_name());
        match sqlx::query(&query)
            .bind(url.as_ref().trim())
            .fetch_optional(&self.pool)
            .await?
        {
            Some(row) => Ok(Some(posting_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn postings(&self) -> Result<Vec<Posting>, TrackerError> {
        let query = format!("SELECT * FROM {} ORDER BY id", self.postings.get_name());
        let mut postings = vec![];
        let mut rows = sqlx::query(&query).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            postings.push(posting_from_row(&row)?);
        }
        Ok(postings)
    }

    /// Fastest first; records without a response time sort first, as SQLite orders NULLs.
    pub async fn health_records(&self) -> Result<Vec<HealthRecord>, TrackerError> {
        let query = format!(
            "SELECT * FROM {} ORDER BY response_time, url",
            self.health.get_name()
        );
        let mut records = vec![];
        let mut rows = sqlx::query(&query).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            records.push(health_from_row(&row)?);
        }
        Ok(records)
    }
}

pub(crate) fn posting_from_row(row: &SqliteRow) -> Result<Posting, TrackerError> {
    let requirements: Option<String> = row.try_get("requirements")?;
    let requirements = match requirements.as_deref() {
        Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
        _ => vec![],
    };
    let source: Option<String> = row.try_get("source")?;

    Ok(Posting {
        title: row.try_get("title")?,
        institution: row.try_get("institution")?,
        location: row.try_get("location")?,
        application_deadline: row.try_get("application_deadline")?,
        posted_date: row.try_get("posted_date")?,
        description: row
            .try_get::<Option<String>, _>("description")?
            .unwrap_or_default(),
        requirements,
        contact_info: row
            .try_get::<Option<String>, _>("contact_info")?
            .unwrap_or_default(),
        url: row.try_get("url")?,
        source: source
            .as_deref()
            .map_or(Source::Other, |s| s.parse().unwrap_or(Source::Other)),
    })
}

fn health_from_row(row: &SqliteRow) -> Result<HealthRecord, TrackerError> {
    let status_code: Option<i64> = row.try_get("status_code")?;
    Ok(HealthRecord {
        url: row.try_get("url")?,
        accessible: row.try_get("accessible")?,
        response_time: row.try_get("response_time")?,
        status_code: status_code.and_then(|c| u16::try_from(c).ok()),
        has_job_section: row.try_get("has_job_section")?,
        last_checked: row.try_get("last_checked")?,
    })
}
