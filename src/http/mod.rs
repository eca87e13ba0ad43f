// Shared request plumbing for the blocking HTTP clients


use std::time::Duration;

use tracing::{debug, error, warn};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Why a request ultimately failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The server answered with a non-success status
    Status(u16),
    /// The request never got an answer (DNS, connect, timeout, IO)
    Transport(String),
    /// Anything ureq reports that is neither of the above
    Other(String),
}

impl std::fmt::Display for RequestError {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {}", status),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Build an agent with a global timeout
#[inline]
pub fn build_agent(timeout: Duration, verify_certs: bool) -> ureq::Agent {
    let tls = ureq::tls::TlsConfig::builder()
        .disable_verification(!verify_certs)
        .build();

    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .tls_config(tls)
        .build()
        .into()
}

/// Run `request_fn` until it succeeds, retrying server and transport errors with
/// exponential backoff. Client errors (4xx) are returned immediately.
#[inline]
pub fn with_retry<F>(target: &str, attempts: u32, mut request_fn: F) -> Result<String, RequestError>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        debug!("HTTP request attempt {}/{}", attempt, attempts);

        match request_fn() {
            Ok(response_text) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response_text);
            }
            Err(error) => {
                let failure = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, attempts
                            );
                            RequestError::Status(*status)
                        } else {
                            debug!("Client error (status {}), not retrying", status);
                            return Err(RequestError::Status(*status));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, attempts
                        );
                        RequestError::Transport(error.to_string())
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        return Err(RequestError::Other(error.to_string()));
                    }
                };

                last_error = Some(failure);

                if attempt < attempts {
                    let delay = backoff_delay(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed for request to {}", target);

    Err(last_error.unwrap_or_else(|| RequestError::Other("request failed after retries".to_string())))
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt.saturating_sub(1)) * 1000)
}
