//! Retry policies for provisioning steps.
//!
//! There is exactly one fallback in the pipeline: a package install that
//! fails gets one index refresh and one more attempt. Everything else fails
//! on the first error.

use anyhow::Result;
use serde::Serialize;

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPolicy {
    /// One attempt. The error propagates unchanged.
    Never,
    /// Attempt, refresh the package index, attempt once more.
    RefreshIndexOnce,
}

/// Value produced by a step plus how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl<T> Attempted<T> {
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }
}

impl RetryPolicy {
    pub fn max_attempts(self) -> u32 {
        match self {
            RetryPolicy::Never => 1,
            RetryPolicy::RefreshIndexOnce => 2,
        }
    }

    /// Run `attempt` under this policy.
    ///
    /// `attempt` receives the 1-based attempt number. `refresh` runs at most
    /// once, between the first and second attempt.
    pub fn run<T>(
        self,
        step: &str,
        mut attempt: impl FnMut(u32) -> Result<T>,
        mut refresh: impl FnMut() -> Result<()>,
    ) -> Result<Attempted<T>> {
        let first = match attempt(1) {
            Ok(value) => return Ok(Attempted { value, attempts: 1 }),
            Err(e) => e,
        };

        if self == RetryPolicy::Never {
            return Err(first);
        }

        tracing::warn!(step, error = %format!("{:#}", first), "attempt 1 failed, refreshing index");
        println!("  [RETRY] {}: first attempt failed, refreshing package index", step);

        if let Err(e) = refresh() {
            return Err(ProvisionError::FatalInstall {
                step: step.to_string(),
                attempts: 1,
                cause: format!("{:#}; index refresh failed: {:#}", first, e),
            }
            .into());
        }

        let last = self.max_attempts();
        match attempt(last) {
            Ok(value) => {
                tracing::info!(step, "attempt {} succeeded after index refresh", last);
                Ok(Attempted { value, attempts: last })
            }
            Err(second) => Err(ProvisionError::FatalInstall {
                step: step.to_string(),
                attempts: last,
                cause: format!("{:#}", second),
            }
            .into()),
        }
    }
}
