use super::{new_posting, A_HREF};
use crate::{
    posting::{Posting, Source},
    utils, Extractor,
};
use regex::Regex;
use scraper::Html;
use url::Url;

pub const DEFAULT_JOB_PATH_PATTERN: &str = r"/job-opportunities/\d+";

const MAX_LISTINGS: usize = 10;

/// Sites with numbered job listing paths. Only student and PhD listings are kept.
#[derive(Debug)]
pub struct PatternIdExtractor {
    pattern: Regex,
    location: Option<String>,
}

impl PatternIdExtractor {
    pub fn new(pattern: &str, location: Option<String>) -> Result<Self, regex::Error> {
        Ok(PatternIdExtractor {
            pattern: Regex::new(pattern)?,
            location,
        })
    }
}

impl Extractor for PatternIdExtractor {
    fn name(&self) -> &'static str {
        "pattern-id"
    }

    fn extract(&self, doc: &Html, page_url: &Url, institution: &str) -> Vec<Posting> {
        doc.select(&A_HREF)
            .filter(|a| {
                a.value()
                    .attr("href")
                    .map(|href| self.pattern.is_match(href))
                    .unwrap_or(false)
            })
            .take(MAX_LISTINGS)
            .filter_map(|a| {
                let title = utils::element_text(&a);
                let lower = title.to_lowercase();
                if !(lower.contains("phd") || lower.contains("student")) {
                    return None;
                }
                let url = page_url.join(a.value().attr("href")?.trim()).ok()?;
                let mut posting =
                    new_posting(title, institution, url.into(), Source::UniversityWebsite);
                posting.location = self.location.clone();
                Some(posting)
            })
            .collect()
    }
}
