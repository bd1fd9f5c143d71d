use crate::{extract::pattern_default, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Everything a scan needs. Loaded once and passed down; nothing here is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: String,
    pub http: HttpConfig,
    pub linkedin: LinkedInConfig,
    pub sites: Vec<MonitoredSite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Pause between consecutive requests.
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedInConfig {
    pub enabled: bool,
    pub keywords: Vec<String>,
    pub location: String,
    /// Also visit each job page to fill in the description.
    pub fetch_details: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredSite {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Follow job-looking links from the site page and scan each for PhD vocabulary.
    #[default]
    AnchorKeyword,
    /// Treat links matching `pattern` on the site page itself as listings.
    PatternId {
        #[serde(default = "pattern_default")]
        pattern: String,
    },
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            delay_ms: 2000,
        }
    }
}

impl HttpConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        LinkedInConfig {
            enabled: true,
            keywords: [
                "Medical Physics PhD",
                "Radiation Physics PhD",
                "Medical Imaging PhD",
                "Radiotherapy PhD",
                "Nuclear Medicine PhD",
                "Health Physics PhD",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            location: String::new(),
            fetch_details: true,
        }
    }
}

impl MonitoredSite {
    fn new(name: &str, url: &str) -> Self {
        MonitoredSite {
            name: name.to_string(),
            url: url.to_string(),
            location: None,
            strategy: StrategyConfig::AnchorKeyword,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut sites = vec![MonitoredSite {
            name: "Paul Scherrer Institute".to_string(),
            url: "https://www.psi.ch/en/hr/job-opportunities".to_string(),
            location: Some("Switzerland".to_string()),
            strategy: StrategyConfig::PatternId {
                pattern: pattern_default(),
            },
        }];
        sites.extend(
            [
                ("ETH Zurich", "https://jobs.ethz.ch/"),
                ("CERN", "https://careers.cern/"),
                ("University of Pennsylvania", "https://www.upenn.edu/careers/"),
                ("Stanford University", "https://jobs.stanford.edu/"),
                ("MIT", "https://careers.mit.edu/"),
                ("Harvard University", "https://careers.harvard.edu/"),
                ("University of California, Berkeley", "https://jobs.berkeley.edu/"),
                ("University of Michigan", "https://careers.umich.edu/"),
                ("Johns Hopkins University", "https://jobs.jhu.edu/"),
            ]
            .into_iter()
            .map(|(name, url)| MonitoredSite::new(name, url)),
        );

        Config {
            database: "academic_directory.db".to_string(),
            http: HttpConfig::default(),
            linkedin: LinkedInConfig::default(),
            sites,
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Config, TrackerError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn to_toml(&self) -> Result<String, TrackerError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn site(&self, name: &str) -> Result<&MonitoredSite, TrackerError> {
        self.sites
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| TrackerError::MissingSite(name.to_string()))
    }
}
