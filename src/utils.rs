use chrono::{DateTime, Local, NaiveDate, Utc};
use lazy_regex::regex;
use scraper::{ElementRef, Html};
use sqlx::SqlitePool;

pub(crate) async fn is_table_exists(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?
            .is_some(),
    )
}

pub(crate) fn get_now() -> DateTime<Utc> {
    Utc::now()
}

/// Discovery date used for `posted_date`, in the local calendar.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Trims and collapses runs of whitespace into a single space.
pub(crate) fn clean_text<S: AsRef<str>>(s: S) -> String {
    regex!(r"\s+")
        .replace_all(s.as_ref().trim(), " ")
        .into_owned()
}

pub(crate) fn element_text(el: &ElementRef) -> String {
    clean_text(el.text().collect::<String>())
}

/// Concatenated text of the document, skipping `script`, `style` and `noscript` contents.
pub(crate) fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript"))
            .unwrap_or(false);
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}
