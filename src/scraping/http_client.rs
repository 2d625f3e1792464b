use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::scraping::error_handling::ScrapeError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// RESILIENT REQUEST EXECUTOR
// ============================================================================

/// Issues one HTTP request with bounded retries. Only a 200 counts as
/// success; any other status and any transport error are retry triggers
/// until the attempt budget runs out. The inter-attempt delay is fixed and
/// differs between the listing phase and the document-fetch phase.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpExecutor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        form: Option<&[(String, String)]>,
    ) -> Result<Response, ScrapeError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request = self.client.request(method.clone(), url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(form) = form {
                request = request.form(form);
            }

            match request.send().await {
                Ok(response) if response.status() == StatusCode::OK => return Ok(response),
                Ok(response) => {
                    warn!(
                        "Attempt {}/{} failed with status {}",
                        attempt,
                        self.max_attempts,
                        response.status()
                    );
                }
                Err(err) => {
                    warn!(
                        "Attempt {}/{} failed with error: {}",
                        attempt, self.max_attempts, err
                    );
                }
            }

            if attempt >= self.max_attempts {
                return Err(ScrapeError::ExecutorExhausted {
                    method: method.to_string(),
                    url: url.to_string(),
                    attempts: attempt,
                });
            }
            sleep(self.retry_delay).await;
        }
    }

    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, ScrapeError> {
        self.execute(Method::GET, url, query, None).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<Response, ScrapeError> {
        self.execute(Method::POST, url, &[], Some(form)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_defaults() {
        let executor = HttpExecutor::new(Client::new());
        assert_eq!(executor.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(executor.retry_delay, DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_executor_configuration() {
        let executor = HttpExecutor::new(Client::new())
            .with_max_attempts(3)
            .with_retry_delay(Duration::from_secs(10));
        assert_eq!(executor.max_attempts, 3);
        assert_eq!(executor.retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_attempt_bound_never_below_one() {
        let executor = HttpExecutor::new(Client::new()).with_max_attempts(0);
        assert_eq!(executor.max_attempts, 1);
    }
}
