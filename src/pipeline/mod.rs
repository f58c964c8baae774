//! The provisioning pipeline as data.
//!
//! Steps describe WHAT happens (action, required artifacts, retry policy,
//! probes). The executor interprets them in order:
//!
//! ```text
//! mirrors → packages → native-runtime → browser → python-deps
//!         → verify (all probes) → cleanup
//! ```
//!
//! Verification and cleanup are fixed tail phases rather than steps: cleanup
//! takes the `Verified` token that only verification produces.

pub mod executor;

pub use executor::{run, ProvisionReport, StepReport};

use std::collections::BTreeSet;

use crate::artifact::ArtifactId;
use crate::common::paths::Layout;
use crate::config::Config;
use crate::env::EnvironmentBindings;
use crate::error::ProvisionError;
use crate::install::{browser, language, native};
use crate::retry::RetryPolicy;
use crate::verify::Probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ConfigureMirrors,
    InstallPackages,
    InstallNativeRuntime,
    InstallBrowser,
    InstallLanguageDeps,
}

/// One installation step.
#[derive(Debug, Clone)]
pub struct ProvisioningStep {
    pub name: &'static str,
    pub action: Action,
    /// Artifacts that must exist before the pipeline starts.
    pub preconditions: Vec<ArtifactId>,
    pub policy: RetryPolicy,
    /// Run right after the action; any failure aborts the pipeline.
    pub probes: Vec<Probe>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub steps: Vec<ProvisioningStep>,
    /// Probes only meaningful once every step has run.
    pub final_probes: Vec<Probe>,
}

impl Pipeline {
    /// The worker image pipeline, probing binaries under `layout`.
    pub fn standard(layout: &Layout) -> Self {
        let steps = vec![
            ProvisioningStep {
                name: "mirrors",
                action: Action::ConfigureMirrors,
                preconditions: vec![],
                policy: RetryPolicy::Never,
                probes: vec![],
            },
            ProvisioningStep {
                name: "packages",
                action: Action::InstallPackages,
                preconditions: vec![],
                policy: RetryPolicy::RefreshIndexOnce,
                probes: vec![],
            },
            ProvisioningStep {
                name: "native-runtime",
                action: Action::InstallNativeRuntime,
                preconditions: vec![
                    ArtifactId::NativeClientBundle,
                    ArtifactId::OracleClientRpm,
                    ArtifactId::OceanBaseClientRpm,
                ],
                policy: RetryPolicy::Never,
                probes: native::probes(),
            },
            ProvisioningStep {
                name: "browser",
                action: Action::InstallBrowser,
                preconditions: vec![ArtifactId::BrowserArchive, ArtifactId::DriverArchive],
                policy: RetryPolicy::Never,
                probes: browser::probes(layout),
            },
            ProvisioningStep {
                name: "python-deps",
                action: Action::InstallLanguageDeps,
                preconditions: vec![ArtifactId::Requirements],
                policy: RetryPolicy::Never,
                probes: language::probes(),
            },
        ];

        let mut final_probes = browser::alias_probes(layout);
        final_probes.push(language::adapter_probe());

        Self {
            steps,
            final_probes,
        }
    }

    /// Union of every step's preconditions, in declaration order.
    pub fn preconditions(&self) -> Vec<ArtifactId> {
        let mut seen = BTreeSet::new();
        self.steps
            .iter()
            .flat_map(|s| s.preconditions.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Every step probe followed by the final probes.
    pub fn all_probes(&self) -> Vec<Probe> {
        self.steps
            .iter()
            .flat_map(|s| s.probes.iter().cloned())
            .chain(self.final_probes.iter().cloned())
            .collect()
    }

    /// Steps plus the verify and cleanup phases.
    pub fn phase_count(&self) -> usize {
        self.steps.len() + 2
    }

    /// Print the plan.
    pub fn print(&self) {
        let total = self.phase_count();
        for (i, step) in self.steps.iter().enumerate() {
            let attempts = step.policy.max_attempts();
            println!(
                "[{}/{}] {} ({:?}, up to {} attempt{})",
                i + 1,
                total,
                step.name,
                step.policy,
                attempts,
                if attempts == 1 { "" } else { "s" }
            );
            for id in &step.preconditions {
                println!("      requires {}", crate::artifact::spec(*id).name);
            }
            for probe in &step.probes {
                println!("      probe {}", probe.name);
            }
        }
        println!("[{}/{}] verify", total - 1, total);
        for probe in &self.final_probes {
            println!("      probe {}", probe.name);
        }
        println!("[{}/{}] cleanup", total, total);
    }
}

/// Bindings present before any step runs.
pub fn seed_environment(config: &Config) -> Result<EnvironmentBindings, ProvisionError> {
    let mut env = EnvironmentBindings::new();
    env.set("DISPLAY", &config.display)?;
    env.inherit("PATH")?;
    Ok(env)
}

/// The environment a successful run produces, without running anything.
pub fn declared_environment(config: &Config) -> Result<EnvironmentBindings, ProvisionError> {
    let mut env = seed_environment(config)?;
    native::bind(&mut env)?;
    browser::bind(&mut env)?;
    Ok(env)
}
