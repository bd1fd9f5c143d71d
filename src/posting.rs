use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    UniversityWebsite,
    Linkedin,
    Other,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::UniversityWebsite => "university_website",
            Source::Linkedin => "linkedin",
            Source::Other => "other",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = std::convert::Infallible;

    /// Unknown labels map to `Other` so that rows written by older versions still load.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "university_website" => Source::UniversityWebsite,
            "linkedin" => Source::Linkedin,
            _ => Source::Other,
        })
    }
}

/// One discovered opportunity. `url` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub title: String,
    pub institution: String,
    pub location: Option<String>,
    pub application_deadline: Option<NaiveDate>,
    pub posted_date: NaiveDate,
    pub description: String,
    pub requirements: Vec<String>,
    pub contact_info: String,
    pub url: String,
    pub source: Source,
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title           : {}", self.title)?;
        writeln!(f, "Institution     : {}", self.institution)?;
        if let Some(d) = self.location.as_ref() {
            writeln!(f, "Location        : {}", d)?;
        } else {
            writeln!(f, "Location        : None")?;
        };

        if let Some(d) = self.application_deadline.as_ref() {
            writeln!(f, "Deadline        : {}", d)?;
        } else {
            writeln!(f, "Deadline        : None")?;
        };
        writeln!(f, "Posted          : {}", self.posted_date)?;
        writeln!(f, "Source          : {}", self.source)?;
        writeln!(f, "Url             : {}", self.url)?;
        if !self.requirements.is_empty() {
            writeln!(f, "Requirements    : {}", self.requirements.join(", "))?;
        }
        if !self.description.is_empty() {
            writeln!(f, "Description     : ")?;
            writeln!(f, "> {}", self.description.replace('\n', "\n  "))?;
        }

        Ok(())
    }
}

/// Requirement hints guessed from free-text description, in a fixed order.
pub fn derive_requirements(description: &str) -> Vec<String> {
    let desc = description.to_lowercase();
    let mut requirements = vec![];
    if desc.contains("phd") || desc.contains("doctorate") {
        requirements.push("PhD or equivalent degree".to_string());
    }
    if desc.contains("experience") {
        requirements.push("Relevant research experience".to_string());
    }
    requirements
}
