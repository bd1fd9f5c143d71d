mod anchor;
mod linkedin;
mod pattern;

pub use anchor::AnchorKeywordExtractor;
pub use linkedin::{apply_job_details, search_url, LinkedInSearchExtractor};
pub use pattern::{PatternIdExtractor, DEFAULT_JOB_PATH_PATTERN};

use crate::{
    config::StrategyConfig,
    posting::{derive_requirements, Posting, Source},
    utils, Extractor, TrackerError,
};
use lazy_static::lazy_static;
use scraper::Selector;

const E: &str = "Invalid selector";
lazy_static! {
    pub(crate) static ref A_HREF: Selector = Selector::parse("a[href]").expect(E);
}

pub(crate) fn pattern_default() -> String {
    DEFAULT_JOB_PATH_PATTERN.to_string()
}

pub type BoxedExtractor = Box<dyn Extractor + Send + Sync>;

pub fn build_extractor(
    strategy: &StrategyConfig,
    location: Option<&str>,
) -> Result<BoxedExtractor, TrackerError> {
    Ok(match strategy {
        StrategyConfig::AnchorKeyword => Box::new(AnchorKeywordExtractor),
        StrategyConfig::PatternId { pattern } => Box::new(PatternIdExtractor::new(
            pattern,
            location.map(ToString::to_string),
        )?),
    })
}

/// A fresh candidate as discovered today; the caller fills in what the page exposes.
pub(crate) fn new_posting(
    title: String,
    institution: &str,
    url: String,
    source: Source,
) -> Posting {
    let description = String::new();
    Posting {
        title,
        institution: institution.to_string(),
        location: None,
        application_deadline: None,
        posted_date: utils::today(),
        requirements: derive_requirements(&description),
        description,
        contact_info: String::new(),
        url,
        source,
    }
}
