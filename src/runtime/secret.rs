//! Push secret lookup
//!
//! The builder push secret is created asynchronously shortly after its
//! namespace, so the lookup is retried on a fixed schedule before giving up.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::cluster::ClusterApi;
use crate::error::{Error, Result};

/// Substring identifying the build push secret
pub const PUSH_SECRET_PATTERN: &str = "builder-dockercfg";

pub const DEFAULT_SECRET_ATTEMPTS: u32 = 3;
pub const DEFAULT_SECRET_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed pause between attempts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SECRET_ATTEMPTS,
            delay: DEFAULT_SECRET_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// No pause between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Longest time the policy can block a pass
    pub fn worst_case_delay(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

/// First secret name containing [`PUSH_SECRET_PATTERN`], in listing order
pub fn select_push_secret(names: &[String]) -> Option<&str> {
    let mut candidates = names
        .iter()
        .filter(|name| name.contains(PUSH_SECRET_PATTERN));
    let first = candidates.next()?;

    let others: Vec<&String> = candidates.collect();
    if !others.is_empty() {
        // Listing order decides; the API server does not guarantee it
        warn!(
            selected = %first,
            ignored = ?others,
            "Multiple push secrets match {}", PUSH_SECRET_PATTERN
        );
    }

    Some(first.as_str())
}

/// Find the push secret in `namespace`, retrying per `policy`.
///
/// List failures and "not there yet" are treated alike: both consume one
/// attempt. At least one attempt is always made.
#[instrument(skip(api, policy), fields(attempts = policy.max_attempts))]
pub async fn find_push_secret<A: ClusterApi + ?Sized>(
    api: &A,
    namespace: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        if attempt > 1 && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }

        match api.list_secret_names(namespace).await {
            Ok(names) => {
                if let Some(name) = select_push_secret(&names) {
                    info!(secret = %name, attempt, "Found push secret");
                    return Ok(name.to_string());
                }
                info!(
                    attempt,
                    "Cannot find Secret {} in {} yet", PUSH_SECRET_PATTERN, namespace
                );
            }
            Err(e) => {
                warn!(attempt, error = %e, "Listing secrets in {} failed", namespace);
            }
        }
    }

    Err(Error::SecretNotFound {
        pattern: PUSH_SECRET_PATTERN.to_string(),
        namespace: namespace.to_string(),
    })
}
