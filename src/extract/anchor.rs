use super::{new_posting, A_HREF};
use crate::{
    posting::{Posting, Source},
    utils, Extractor,
};
use scraper::Html;
use url::Url;

pub const PHD_TERMS: [&str; 5] = [
    "phd",
    "doctorate",
    "doctoral",
    "graduate student",
    "research assistant",
];

/// Generic career pages: any link whose text mentions doctoral study.
#[derive(Debug, Default)]
pub struct AnchorKeywordExtractor;

impl Extractor for AnchorKeywordExtractor {
    fn name(&self) -> &'static str {
        "anchor-keyword"
    }

    fn extract(&self, doc: &Html, page_url: &Url, institution: &str) -> Vec<Posting> {
        doc.select(&A_HREF)
            .filter_map(|a| {
                let title = utils::element_text(&a);
                let lower = title.to_lowercase();
                if !PHD_TERMS.iter().any(|term| lower.contains(term)) {
                    return None;
                }
                let href = a.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                let url = page_url.join(href).ok()?;
                Some(new_posting(
                    title,
                    institution,
                    url.into(),
                    Source::UniversityWebsite,
                ))
            })
            .collect()
    }
}
