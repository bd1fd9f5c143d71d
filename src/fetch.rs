use crate::config::HttpConfig;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// A completed HTTP response, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: String,
    pub status_code: u16,
    pub body: String,
    pub elapsed_seconds: f64,
}

impl Page {
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed reading body of {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

impl FetchFailure {
    pub fn url(&self) -> &str {
        match self {
            FetchFailure::Timeout { url }
            | FetchFailure::Connect { url, .. }
            | FetchFailure::InvalidUrl { url, .. }
            | FetchFailure::Body { url, .. }
            | FetchFailure::Request { url, .. } => url,
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchFailure::Timeout { url }
        } else if err.is_connect() {
            FetchFailure::Connect {
                url,
                reason: err.to_string(),
            }
        } else if err.is_builder() {
            FetchFailure::InvalidUrl {
                url,
                reason: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            FetchFailure::Body {
                url,
                reason: err.to_string(),
            }
        } else {
            FetchFailure::Request {
                url,
                reason: err.to_string(),
            }
        }
    }
}

pub type FetchOutcome = Result<Page, FetchFailure>;

#[async_trait::async_trait]
pub trait Fetch {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<HttpFetcher, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        debug!("Visit {}", url);
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchFailure::from_reqwest(url, e))?;
        let status_code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchFailure::from_reqwest(url, e))?;

        Ok(Page {
            url: url.to_string(),
            status_code,
            body,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }
}

/// Keeps at least `delay` between the starts of consecutive requests.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Throttle {
            delay,
            last_request: None,
        }
    }

    pub async fn wait(&mut self) {
        if let Some(last_request) = self.last_request.take() {
            let duration = Instant::now().duration_since(last_request);
            if duration < self.delay {
                tokio::time::sleep(self.delay - duration).await;
            }
        }
        self.last_request.replace(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classify::classify, config::DEFAULT_USER_AGENT};
    use pretty_assertions::assert_eq;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Answers one request on a local port with the response built from its raw head.
    async fn serve_once<F>(respond: F) -> String
    where
        F: FnOnce(&str) -> String + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = vec![];
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = respond(&String::from_utf8_lossy(&head));
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        url
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn sends_browser_user_agent() {
        let url = serve_once(|head| {
            let agent = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("user-agent")
                        .then(|| value.trim().to_string())
                })
                .unwrap_or_default();
            http_response("200 OK", &agent)
        })
        .await;

        let fetcher = HttpFetcher::new(&HttpConfig::default()).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.status_code, 200);
        assert_eq!(page.body, DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let fetcher = HttpFetcher::new(&HttpConfig {
            timeout_secs: 1,
            ..HttpConfig::default()
        })
        .unwrap();
        let start = Instant::now();
        let outcome = fetcher.fetch(&url).await;
        assert_eq!(outcome, Err(FetchFailure::Timeout { url }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn not_found_keeps_status_and_timing() {
        let url = serve_once(|_| http_response("404 Not Found", "<p>Job not found</p>")).await;

        let fetcher = HttpFetcher::new(&HttpConfig::default()).unwrap();
        let outcome = fetcher.fetch(&url).await;
        let page = outcome.as_ref().unwrap();
        assert_eq!(page.status_code, 404);
        assert!(!page.is_ok());

        let record = classify(&outcome);
        assert!(!record.accessible);
        assert_eq!(record.status_code, Some(404));
        assert!(record.response_time.is_some());
        assert!(!record.has_job_section);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_requests() {
        let mut throttle = Throttle::new(Duration::from_secs(2));
        let start = Instant::now();

        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        throttle.wait().await;
        assert!(before.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn invalid_url_is_a_failure_not_a_panic() {
        let fetcher = HttpFetcher::new(&HttpConfig::default()).unwrap();
        let outcome = fetcher.fetch("not a url").await;
        let failure = outcome.unwrap_err();
        assert_eq!(failure.url(), "not a url");
    }
}
