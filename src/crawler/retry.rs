//! Bounded-retry navigation
//!
//! Rendering backends are flaky: a page that fails to show its landmark once
//! usually shows it on the next load. `RetryingNavigator` composes over any
//! `PageNavigator` with a fixed number of attempts and a fixed pause.

use crate::config::RetryConfig;
use crate::page::{location_matches, PageNavigator};
use crate::NavigationError;
use std::time::Duration;

/// Attempt budget and timing for one navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// How long one attempt waits for the landmark
    pub landmark_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            landmark_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            landmark_timeout: Duration::from_secs(config.landmark_timeout_secs),
        }
    }
}

/// How a navigation completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigated {
    /// The backend was already showing the location
    AlreadyThere,
    /// The page was loaded and its landmark seen
    Loaded { attempts: u32 },
}

/// Retry wrapper around a navigator
#[derive(Debug, Clone, Default)]
pub struct RetryingNavigator {
    policy: RetryPolicy,
}

impl RetryingNavigator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Navigates to `location` and waits for a landmark containing `title`
    ///
    /// The "already there" check runs once, before the first attempt: after a
    /// failed attempt the backend sits on the target URL without its
    /// landmark, and that must not count as success.
    ///
    /// # Errors
    ///
    /// `NavigationError::Fatal` once every attempt has failed.
    pub async fn navigate<N>(
        &self,
        navigator: &mut N,
        location: &str,
        title: &str,
    ) -> Result<Navigated, NavigationError>
    where
        N: PageNavigator + ?Sized,
    {
        match navigator.current_location().await {
            Ok(current) if location_matches(&current, location) => {
                tracing::debug!("Already at {}", location);
                return Ok(Navigated::AlreadyThere);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Could not read current location: {}", e),
        }

        let mut last_error = String::new();
        for attempt in 1..=self.policy.max_attempts {
            match self.attempt(navigator, location, title).await {
                Ok(()) => return Ok(Navigated::Loaded { attempts: attempt }),
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < self.policy.max_attempts && !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        Err(NavigationError::Fatal {
            location: location.to_string(),
            attempts: self.policy.max_attempts,
            last_error,
        })
    }

    async fn attempt<N>(
        &self,
        navigator: &mut N,
        location: &str,
        title: &str,
    ) -> Result<(), NavigationError>
    where
        N: PageNavigator + ?Sized,
    {
        let transient = |reason: String| NavigationError::Transient {
            location: location.to_string(),
            reason,
        };

        navigator
            .navigate_to(location)
            .await
            .map_err(|e| transient(e.to_string()))?;

        let visible = navigator
            .wait_for_landmark(title, self.policy.landmark_timeout)
            .await
            .map_err(|e| transient(e.to_string()))?;

        if !visible {
            return Err(transient(format!(
                "no landmark containing '{}' within {:?}",
                title, self.policy.landmark_timeout
            )));
        }

        Ok(())
    }
}
