//! Overpass API retrieval. Network access lives entirely outside the
//! conversion core; this client just fetches a query result with a
//! bounded retry on transient failures.

use std::thread;
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;

pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

const MAX_RETRIES: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum OverpassError {
    #[error("overpass server responded with status {0}")]
    Status(u16),

    #[error(transparent)]
    Http(#[from] ureq::Error),
}

pub struct OverpassClient {
    url: String,
    agent: Agent,
}

impl Default for OverpassClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl OverpassClient {
    pub fn new(url: &str) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(180)))
            .build();
        OverpassClient {
            url: url.to_string(),
            agent: config.into(),
        }
    }

    /// POST an Overpass QL query and return the response body. Retries up
    /// to five times with a fixed backoff before giving up.
    pub fn query(&self, query: &str) -> Result<String, OverpassError> {
        let mut attempt = 0;
        loop {
            match self.send(query) {
                Ok(body) => return Ok(body),
                Err(err) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    log::warn!(
                        "overpass request failed ({}), retry {}/{}",
                        err,
                        attempt,
                        MAX_RETRIES
                    );
                    thread::sleep(RETRY_DELAY);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn send(&self, query: &str) -> Result<String, OverpassError> {
        let mut response = self.agent.post(&self.url).send(query)?;
        if response.status() != 200 {
            return Err(OverpassError::Status(response.status().as_u16()));
        }
        Ok(response.body_mut().read_to_string()?)
    }
}

/// One-shot query against the public Overpass endpoint.
pub fn overpass_call(query: &str) -> Result<String, OverpassError> {
    OverpassClient::default().query(query)
}
