use crate::{extract::A_HREF, utils};
use itertools::Itertools;
use lazy_regex::regex_is_match;
use scraper::Html;
use tracing::warn;
use url::Url;

pub const MAX_CANDIDATE_LINKS: usize = 5;

fn is_job_link_text(text: &str) -> bool {
    regex_is_match!(
        r"(?i)job|career|position|opening|vacancy|phd|postdoc|graduate|student",
        text
    )
}

/// Links on `base_url` whose anchor text looks job related, resolved and deduplicated in
/// document order. Capped at [`MAX_CANDIDATE_LINKS`] to bound fan-out; it is not a ranking.
pub fn find_candidate_links(base_url: &str, html: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(e) => {
            warn!("Cannot resolve links against {}: {}", base_url, e);
            return vec![];
        }
    };
    let doc = Html::parse_document(html);
    candidate_links(&base, &doc)
}

fn candidate_links(base: &Url, doc: &Html) -> Vec<String> {
    doc.select(&A_HREF)
        .filter(|a| is_job_link_text(&utils::element_text(a)))
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .unique()
        .take(MAX_CANDIDATE_LINKS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_vocabulary_no_links() {
        let html = r#"<a href="/about">About Us</a><a href="/news">News</a><a href="/">Home</a>"#;
        assert!(find_candidate_links("https://x.edu/", html).is_empty());
    }

    #[test]
    fn resolves_and_dedups_in_order() {
        let html = r#"
            <a href="/careers">Careers</a>
            <a href="https://jobs.x.edu/list">Open Positions</a>
            <a href="/about">About</a>
            <a href="careers">Careers again</a>
            <a href="grad/">Graduate School</a>
        "#;
        assert_eq!(
            find_candidate_links("https://x.edu/", html),
            vec![
                "https://x.edu/careers".to_string(),
                "https://jobs.x.edu/list".to_string(),
                "https://x.edu/grad/".to_string(),
            ]
        );
    }

    #[test]
    fn relative_to_nested_base() {
        let html = r#"<a href="phd.html">PhD programme</a>"#;
        assert_eq!(
            find_candidate_links("https://x.edu/en/hr/index.html", html),
            vec!["https://x.edu/en/hr/phd.html".to_string()]
        );
    }

    #[test]
    fn never_more_than_five() {
        let html = (0..40)
            .map(|i| format!(r#"<a href="/jobs/{i}">Job {i}</a>"#))
            .collect::<String>();
        let links = find_candidate_links("https://x.edu/", &html);
        assert_eq!(links.len(), MAX_CANDIDATE_LINKS);
        assert_eq!(links[0], "https://x.edu/jobs/0");
        assert_eq!(links[4], "https://x.edu/jobs/4");
    }

    #[test]
    fn empty_href_is_skipped() {
        let html = r#"<a href="">Jobs</a><a href=" ">Careers</a><a href="/phd">PhD</a>"#;
        assert_eq!(
            find_candidate_links("https://x.edu/", html),
            vec!["https://x.edu/phd".to_string()]
        );
    }

    #[test]
    fn bad_base_url_is_empty() {
        let html = r#"<a href="/jobs">Jobs</a>"#;
        assert!(find_candidate_links("::not a url::", html).is_empty());
    }
}
