use scraper::Html;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

pub mod classify;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod links;
pub mod posting;
pub mod report;
pub mod store;

mod data;
mod error;
mod utils;

pub use classify::{classify, HealthRecord};
pub use config::{Config, MonitoredSite, StrategyConfig};
pub use data::Table;
pub use error::TrackerError;
pub use fetch::{Fetch, FetchFailure, FetchOutcome, HttpFetcher, Page};
pub use links::find_candidate_links;
pub use posting::{Posting, Source};
pub use store::Store;

use config::LinkedInConfig;
use extract::{apply_job_details, build_extractor, search_url, LinkedInSearchExtractor};
use fetch::Throttle;

/// Turns one fetched page into posting candidates.
pub trait Extractor {
    fn name(&self) -> &'static str;

    fn extract(&self, doc: &Html, page_url: &Url, institution: &str) -> Vec<Posting>;

    /// Malformed input yields no postings rather than an error.
    fn extract_postings(&self, page_html: &str, page_url: &str, institution: &str) -> Vec<Posting> {
        let page_url = match Url::parse(page_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("[{}] Cannot parse page url {}: {}", self.name(), page_url, e);
                return vec![];
            }
        };
        let doc = Html::parse_document(page_html);
        self.extract(&doc, &page_url, institution)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub sites_checked: usize,
    pub sites_accessible: usize,
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    pub postings_found: usize,
    pub postings_written: usize,
    pub postings_skipped: usize,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} sites accessible, {} pages fetched ({} failed), {} postings found, {} written, {} skipped",
            self.sites_accessible,
            self.sites_checked,
            self.pages_fetched,
            self.fetch_failures,
            self.postings_found,
            self.postings_written,
            self.postings_skipped
        )
    }
}

/// One sequential pass. Every outbound request goes through the same throttle.
pub struct Scan<'a, F: Fetch> {
    fetcher: &'a F,
    store: &'a Store,
    throttle: Throttle,
    report: ScanReport,
}

impl<'a, F: Fetch + Sync> Scan<'a, F> {
    pub fn new(fetcher: &'a F, store: &'a Store, config: &Config) -> Self {
        Scan {
            fetcher,
            store,
            throttle: Throttle::new(config.http.delay()),
            report: ScanReport::default(),
        }
    }

    pub fn finish(self) -> ScanReport {
        self.report
    }

    async fn fetch(&mut self, url: &str) -> FetchOutcome {
        self.throttle.wait().await;
        self.report.pages_fetched += 1;
        let outcome = self.fetcher.fetch(url).await;
        if let Err(e) = &outcome {
            warn!("{}", e);
            self.report.fetch_failures += 1;
        }
        outcome
    }

    /// Only 200 responses are worth extracting from.
    async fn fetch_ok(&mut self, url: &str) -> Option<Page> {
        match self.fetch(url).await {
            Ok(page) if page.is_ok() => Some(page),
            Ok(page) => {
                debug!("Skip {}: status {}", url, page.status_code);
                None
            }
            Err(_) => None,
        }
    }

    /// Records a health observation for the site and returns the page when accessible.
    pub async fn check_site(&mut self, site: &MonitoredSite) -> Result<Option<Page>, TrackerError> {
        info!("Testing {}...", site.name);
        let outcome = self.fetch(&site.url).await;
        let record = classify(&outcome);
        self.store.upsert_health(&record).await?;
        self.report.sites_checked += 1;

        match outcome {
            Ok(page) if record.accessible => {
                self.report.sites_accessible += 1;
                Ok(Some(page))
            }
            Ok(page) => {
                warn!("{} answered with status {}", site.url, page.status_code);
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    pub async fn scan_site(&mut self, site: &MonitoredSite) -> Result<(), TrackerError> {
        let extractor = build_extractor(&site.strategy, site.location.as_deref())?;
        let Some(page) = self.check_site(site).await? else {
            return Ok(());
        };

        let postings = match site.strategy {
            StrategyConfig::AnchorKeyword => {
                let job_pages = find_candidate_links(&page.url, &page.body);
                debug!("{} candidate job pages on {}", job_pages.len(), site.url);
                let mut postings = vec![];
                for job_page in job_pages {
                    if let Some(page) = self.fetch_ok(&job_page).await {
                        postings.extend(extractor.extract_postings(&page.body, &page.url, &site.name));
                    }
                }
                postings
            }
            StrategyConfig::PatternId { .. } => {
                extractor.extract_postings(&page.body, &page.url, &site.name)
            }
        };

        self.persist(&site.name, postings).await
    }

    pub async fn scan_linkedin(&mut self, linkedin: &LinkedInConfig) -> Result<(), TrackerError> {
        info!("Scraping LinkedIn jobs...");
        for keyword in &linkedin.keywords {
            let url = search_url(keyword, &linkedin.location)?;
            let Some(page) = self.fetch_ok(url.as_str()).await else {
                continue;
            };
            let mut postings =
                LinkedInSearchExtractor.extract_postings(&page.body, &page.url, "LinkedIn");

            if linkedin.fetch_details {
                for posting in postings.iter_mut() {
                    if let Some(detail) = self.fetch_ok(&posting.url).await {
                        if !apply_job_details(posting, &detail.body) {
                            debug!("No description block on {}", posting.url);
                        }
                    }
                }
            }

            self.persist(&format!("LinkedIn: {}", keyword), postings)
                .await?;
        }
        Ok(())
    }

    async fn persist(&mut self, label: &str, postings: Vec<Posting>) -> Result<(), TrackerError> {
        let summary = self.store.upsert_postings(&postings).await?;
        self.report.postings_found += postings.len();
        self.report.postings_written += summary.written;
        self.report.postings_skipped += summary.skipped;
        info!(
            "[{}] Found {} opportunities, {} written",
            label,
            postings.len(),
            summary.written
        );
        Ok(())
    }
}

/// Each site is checked, extracted and persisted before the next one; LinkedIn searches
/// run last when enabled. An unreachable site is logged and skipped. Only store and
/// config errors abort, leaving the rows already written in place.
pub async fn run_scan<F: Fetch + Sync>(
    fetcher: &F,
    store: &Store,
    config: &Config,
) -> Result<ScanReport, TrackerError> {
    info!("Starting full scan of {} sites...", config.sites.len());
    let mut scan = Scan::new(fetcher, store, config);

    for site in &config.sites {
        scan.scan_site(site).await?;
    }
    if config.linkedin.enabled {
        scan.scan_linkedin(&config.linkedin).await?;
    }

    let report = scan.finish();
    info!("Full scan completed: {}", report);
    Ok(report)
}

pub async fn run_health_check<F: Fetch + Sync>(
    fetcher: &F,
    store: &Store,
    config: &Config,
) -> Result<ScanReport, TrackerError> {
    info!("Testing website accessibility...");
    let mut scan = Scan::new(fetcher, store, config);
    for site in &config.sites {
        scan.check_site(site).await?;
    }
    Ok(scan.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{fresh_store, remove_store};
    use pretty_assertions::assert_eq;
    use std::{collections::HashMap, fs};

    /// Serves canned pages; any other url fails like an unreachable host.
    struct StubFetcher {
        pages: HashMap<String, (u16, String)>,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, u16, &str)]) -> Self {
            StubFetcher {
                pages: pages
                    .iter()
                    .map(|(url, status, body)| (url.to_string(), (*status, body.to_string())))
                    .collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl Fetch for StubFetcher {
        async fn fetch(&self, url: &str) -> FetchOutcome {
            match self.pages.get(url) {
                Some((status_code, body)) => Ok(Page {
                    url: url.to_string(),
                    status_code: *status_code,
                    body: body.clone(),
                    elapsed_seconds: 0.25,
                }),
                None => Err(FetchFailure::Connect {
                    url: url.to_string(),
                    reason: "dns error".to_string(),
                }),
            }
        }
    }

    fn test_config() -> Config {
        let mut config: Config = toml::from_str(
            r#"
            [http]
            delay_ms = 0

            [linkedin]
            enabled = false

            [[sites]]
            name = "Example University"
            url = "https://example.edu/"

            [[sites]]
            name = "Paul Scherrer Institute"
            url = "https://www.psi.ch/en/hr/job-opportunities"
            location = "Switzerland"
            strategy = { kind = "pattern_id" }

            [[sites]]
            name = "Gone University"
            url = "https://gone.edu/"

            [[sites]]
            name = "Broken University"
            url = "https://broken.edu/"
            "#,
        )
        .unwrap();
        config.database = String::new();
        config
    }

    fn stub() -> StubFetcher {
        let career = fs::read_to_string("tests/htmls/career_page.html").expect("Invalid file url");
        let institute =
            fs::read_to_string("tests/htmls/institute_jobs.html").expect("Invalid file url");
        let linkedin =
            fs::read_to_string("tests/htmls/linkedin_search.html").expect("Invalid file url");
        let detail = fs::read_to_string("tests/htmls/linkedin_job.html").expect("Invalid file url");

        let search = search_url("Medical Physics PhD", "").unwrap();
        let mut fetcher = StubFetcher::new(&[
            (
                "https://example.edu/",
                200,
                r#"<h1>Example University</h1>
                   <a href="/jobs/">Jobs at Example</a>
                   <a href="/about">About</a>
                   <a href="https://elsewhere.edu/careers">Careers (dead link)</a>"#,
            ),
            ("https://www.psi.ch/en/hr/job-opportunities", 200, institute.as_str()),
            ("https://broken.edu/", 503, "<p>Job board under maintenance</p>"),
            (
                "https://ch.linkedin.com/jobs/view/phd-position-in-medical-physics-3901",
                200,
                detail.as_str(),
            ),
        ]);
        fetcher
            .pages
            .insert("https://example.edu/jobs/".to_string(), (200, career));
        fetcher
            .pages
            .insert(search.to_string(), (200, linkedin));
        fetcher
    }

    #[tokio::test]
    async fn full_scan() {
        let store = fresh_store("test_scan_full").await;
        let config = test_config();

        let report = run_scan(&stub(), &store, &config).await.unwrap();
        assert_eq!(
            report,
            ScanReport {
                sites_checked: 4,
                sites_accessible: 2,
                // 4 site pages plus the two job pages linked from example.edu
                pages_fetched: 6,
                fetch_failures: 2,
                postings_found: 6,
                postings_written: 6,
                postings_skipped: 0,
            }
        );
        // Same url found twice on the career page; kept once.
        assert_eq!(store.total_postings().await.unwrap(), 5);

        let health = store.health_records().await.unwrap();
        assert_eq!(health.len(), 4);
        let gone = health.iter().find(|h| h.url == "https://gone.edu/").unwrap();
        assert!(!gone.accessible);
        assert_eq!(gone.response_time, None);
        let broken = health.iter().find(|h| h.url == "https://broken.edu/").unwrap();
        assert!(!broken.accessible);
        assert_eq!(broken.status_code, Some(503));
        let example = health.iter().find(|h| h.url == "https://example.edu/").unwrap();
        assert!(example.accessible && example.has_job_section);

        let psi = store
            .get_posting("https://www.psi.ch/en/hr/job-opportunities/12345")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(psi.institution, "Paul Scherrer Institute");
        assert_eq!(psi.location.as_deref(), Some("Switzerland"));

        remove_store("test_scan_full").await;
    }

    #[tokio::test]
    async fn scan_twice_is_idempotent() {
        let store = fresh_store("test_scan_twice").await;
        let mut config = test_config();
        config.linkedin.enabled = true;
        config.linkedin.keywords = vec!["Medical Physics PhD".to_string()];

        let fetcher = stub();
        run_scan(&fetcher, &store, &config).await.unwrap();
        let postings = store.total_postings().await.unwrap();
        let health = store.health.count().await.unwrap();

        run_scan(&fetcher, &store, &config).await.unwrap();
        assert_eq!(store.total_postings().await.unwrap(), postings);
        assert_eq!(store.health.count().await.unwrap(), health);

        let linkedin = store
            .get_posting("https://ch.linkedin.com/jobs/view/phd-position-in-medical-physics-3901")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linkedin.source, Source::Linkedin);
        assert_eq!(linkedin.institution, "University Hospital Zurich");
        assert!(!linkedin.requirements.is_empty());

        remove_store("test_scan_twice").await;
    }

    #[tokio::test]
    async fn health_check_only() {
        let store = fresh_store("test_scan_health").await;
        let report = run_health_check(&stub(), &store, &test_config())
            .await
            .unwrap();
        assert_eq!(report.sites_checked, 4);
        assert_eq!(report.sites_accessible, 2);
        assert_eq!(store.total_postings().await.unwrap(), 0);
        assert_eq!(store.health.count().await.unwrap(), 4);

        remove_store("test_scan_health").await;
    }

    #[tokio::test]
    async fn bad_pattern_aborts_before_fetching() {
        let store = fresh_store("test_scan_pattern").await;
        let mut config = test_config();
        config.sites[0].strategy = StrategyConfig::PatternId {
            pattern: "(".to_string(),
        };

        let err = run_scan(&stub(), &store, &config).await.unwrap_err();
        assert!(matches!(err, TrackerError::PatternError(_)));
        assert_eq!(store.health.count().await.unwrap(), 0);

        remove_store("test_scan_pattern").await;
    }
}
