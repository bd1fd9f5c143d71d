use super::new_posting;
use crate::{
    posting::{derive_requirements, Posting, Source},
    utils, Extractor,
};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

const SEARCH_ENDPOINT: &str = "https://www.linkedin.com/jobs/search/";
const MAX_CARDS: usize = 10;

const E: &str = "Invalid selector";
lazy_static! {
    static ref CARD: Selector = Selector::parse(".job-search-card").expect(E);
    static ref CARD_TITLE: Selector = Selector::parse(".base-search-card__title").expect(E);
    static ref CARD_SUBTITLE: Selector = Selector::parse(".base-search-card__subtitle").expect(E);
    static ref CARD_LOCATION: Selector = Selector::parse(".job-search-card__location").expect(E);
    static ref CARD_LINK: Selector = Selector::parse("a[href]").expect(E);
    static ref DESCRIPTION: Selector = Selector::parse(".show-more-less-html__markup").expect(E);
}

/// Public job search restricted to the last 24 hours.
pub fn search_url(keyword: &str, location: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        SEARCH_ENDPOINT,
        &[
            ("keywords", keyword),
            ("location", location),
            ("f_TPR", "r86400"),
        ],
    )
}

fn first_text(card: &ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| utils::element_text(&el))
        .filter(|s| !s.is_empty())
}

/// Server-rendered LinkedIn search results. The company shown on each card becomes the
/// institution; `institution` is only the fallback.
#[derive(Debug, Default)]
pub struct LinkedInSearchExtractor;

impl Extractor for LinkedInSearchExtractor {
    fn name(&self) -> &'static str {
        "linkedin-search"
    }

    fn extract(&self, doc: &Html, page_url: &Url, institution: &str) -> Vec<Posting> {
        let mut postings = vec![];
        for card in doc.select(&CARD).take(MAX_CARDS) {
            let Some(title) = first_text(&card, &CARD_TITLE) else {
                warn!("Job card without title on {}", page_url);
                continue;
            };
            let Some(url) = card
                .select(&CARD_LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .and_then(|href| page_url.join(href).ok())
            else {
                warn!("Job card {:?} without link on {}", title, page_url);
                continue;
            };

            let company = first_text(&card, &CARD_SUBTITLE);
            let mut posting = new_posting(
                title,
                company.as_deref().unwrap_or(institution),
                url.into(),
                Source::Linkedin,
            );
            posting.location = first_text(&card, &CARD_LOCATION);
            postings.push(posting);
        }
        postings
    }
}

/// Fills description and requirements from a job detail page. Returns false when the page
/// has no description block, leaving the posting untouched.
pub fn apply_job_details(posting: &mut Posting, detail_html: &str) -> bool {
    let doc = Html::parse_document(detail_html);
    let Some(description) = doc
        .select(&DESCRIPTION)
        .next()
        .map(|el| utils::element_text(&el))
    else {
        return false;
    };
    posting.requirements = derive_requirements(&description);
    posting.description = description;
    true
}
