use crate::{fetch::FetchOutcome, utils};
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};

pub const JOB_SECTION_TERMS: [&str; 7] = [
    "job", "career", "position", "opening", "vacancy", "phd", "postdoc",
];

/// One monitoring observation. `url` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub url: String,
    pub accessible: bool,
    pub response_time: Option<f64>,
    pub status_code: Option<u16>,
    pub has_job_section: bool,
    pub last_checked: DateTime<Utc>,
}

pub fn classify(outcome: &FetchOutcome) -> HealthRecord {
    classify_at(outcome, utils::get_now())
}

pub fn classify_at(outcome: &FetchOutcome, checked_at: DateTime<Utc>) -> HealthRecord {
    match outcome {
        Ok(page) => {
            let accessible = page.is_ok();
            HealthRecord {
                url: page.url.clone(),
                accessible,
                response_time: Some((page.elapsed_seconds * 100.0).round() / 100.0),
                status_code: Some(page.status_code),
                has_job_section: accessible && has_job_vocabulary(&page.body),
                last_checked: checked_at,
            }
        }
        Err(failure) => HealthRecord {
            url: failure.url().to_string(),
            accessible: false,
            response_time: None,
            status_code: None,
            has_job_section: false,
            last_checked: checked_at,
        },
    }
}

/// Substring test, not tokenized: "jobs", "careers" and "PhD" all count.
pub fn has_job_vocabulary(html: &str) -> bool {
    let doc = Html::parse_document(html);
    let text = utils::visible_text(&doc).to_lowercase();
    JOB_SECTION_TERMS.iter().any(|term| text.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchFailure, Page};
    use pretty_assertions::assert_eq;

    fn page(status_code: u16, body: &str) -> FetchOutcome {
        Ok(Page {
            url: "https://x.edu/".to_string(),
            status_code,
            body: body.to_string(),
            elapsed_seconds: 0.4567,
        })
    }

    #[test]
    fn failed_fetch_is_inaccessible() {
        let now = Utc::now();
        let outcome = Err(FetchFailure::Timeout {
            url: "https://slow.edu/".to_string(),
        });
        assert_eq!(
            classify_at(&outcome, now),
            HealthRecord {
                url: "https://slow.edu/".to_string(),
                accessible: false,
                response_time: None,
                status_code: None,
                has_job_section: false,
                last_checked: now,
            }
        );
    }

    #[test]
    fn ok_response_is_accessible() {
        let record = classify(&page(200, "<p>Welcome to our campus</p>"));
        assert!(record.accessible);
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.response_time, Some(0.46));
        assert!(!record.has_job_section);
    }

    #[test]
    fn job_section_is_case_insensitive_substring() {
        let record = classify(&page(200, "<h2>Current Openings</h2>"));
        assert!(record.has_job_section);

        let record = classify(&page(200, "<h2>VACANCY notice</h2>"));
        assert!(record.has_job_section);

        // Not stemmed: the plural does not contain "vacancy".
        let record = classify(&page(200, "<h2>Vacancies</h2>"));
        assert!(!record.has_job_section);

        let record = classify(&page(200, "<a href='/c'>CAREERS</a>"));
        assert!(record.has_job_section);
    }

    #[test]
    fn non_200_keeps_timing_but_is_not_accessible() {
        let record = classify(&page(404, "<p>Job not found</p>"));
        assert!(!record.accessible);
        assert_eq!(record.status_code, Some(404));
        assert_eq!(record.response_time, Some(0.46));
        assert!(!record.has_job_section);
    }
}
