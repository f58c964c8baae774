//! Pipeline executor - interprets steps and performs the actual work.
//!
//! Every step is required. The first failure aborts the run with the step
//! name in the error context; nothing after it executes.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::time::Instant;

use super::{seed_environment, Action, Pipeline, ProvisioningStep};
use crate::cleanup::CleanupPlan;
use crate::common::files::write_file_mode;
use crate::common::paths::{ENV_PROFILE, MANIFEST};
use crate::env::EnvironmentBindings;
use crate::install::packages::all_packages;
use crate::install::{browser, language, native, PackageInstaller, ProvisionContext};
use crate::manifest::BuildManifest;
use crate::mirror::AppliedMirror;
use crate::retry::RetryPolicy;
use crate::timing::{format_duration, Timer};
use crate::verify::{run_probes, ProbeOutcome, Verified, Verifier};

/// What one step did, for the build manifest.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub attempts: u32,
    pub duration_secs: f64,
    pub probes: Vec<ProbeOutcome>,
}

/// Result of a complete provisioning run.
#[derive(Debug)]
pub struct ProvisionReport {
    pub steps: Vec<StepReport>,
    pub environment: EnvironmentBindings,
    pub verified: Verified,
}

impl ProvisionReport {
    /// Steps that needed their fallback.
    pub fn retried(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.attempts > 1)
    }
}

/// State threaded through the steps.
struct Run<'a, 'c> {
    ctx: &'a ProvisionContext<'c>,
    env: EnvironmentBindings,
    mirror: Option<AppliedMirror>,
}

/// Run the whole pipeline against `ctx`.
pub fn run(pipeline: &Pipeline, ctx: &ProvisionContext) -> Result<ProvisionReport> {
    println!("=== Provisioning worker environment ===\n");
    let start = Instant::now();
    let total = pipeline.phase_count();

    // Gate: every vendored input before the first step touches anything.
    let required = pipeline.preconditions();
    for err in ctx.store.missing(&required) {
        println!("  ✗ {}", err);
    }
    ctx.store.require(&required).context("precondition check")?;
    println!("All {} required artifacts present.\n", required.len());

    let mut state = Run {
        ctx,
        env: seed_environment(ctx.config)?,
        mirror: None,
    };
    let mut steps = Vec::with_capacity(pipeline.steps.len());

    for (i, step) in pipeline.steps.iter().enumerate() {
        println!("[{}/{}] {}...", i + 1, total, step.name);
        let timer = Timer::start(step.name);

        let attempts = state
            .perform(step)
            .with_context(|| format!("step '{}'", step.name))?;

        let probes = run_probes(ctx.runner, &step.probes)
            .with_context(|| format!("step '{}'", step.name))?;

        let duration = timer.finish();
        steps.push(StepReport {
            name: step.name.to_string(),
            attempts,
            duration_secs: duration.as_secs_f64(),
            probes,
        });
        println!();
    }

    println!("[{}/{}] verify...", total - 1, total);
    let timer = Timer::start("verify");
    let verifier = Verifier::new(ctx.runner, pipeline.all_probes());
    let verified = verifier.run().context("step 'verify'")?;
    timer.finish();

    let environment = state.env;
    write_file_mode(ctx.layout.path(ENV_PROFILE), environment.render_profile(), 0o644)
        .context("writing environment profile")?;

    let mut manifest = BuildManifest::new(&ctx.config.image_ref());
    manifest.steps = steps.clone();
    manifest.probes = verified.outcomes().to_vec();
    manifest.record_artifacts(&ctx.store, &required)?;
    manifest.environment = environment.to_map();
    manifest.save(&ctx.layout.path(MANIFEST))?;
    println!("  Manifest: {}", MANIFEST);
    println!();

    println!("[{}/{}] cleanup...", total, total);
    let timer = Timer::start("cleanup");
    CleanupPlan::standard()
        .run(&verified, ctx.runner, &ctx.layout)
        .context("step 'cleanup'")?;
    timer.finish();

    println!(
        "\n=== Provisioning complete ({}) ===",
        format_duration(start.elapsed())
    );

    Ok(ProvisionReport {
        steps,
        environment,
        verified,
    })
}

impl<'a, 'c> Run<'a, 'c> {
    /// Perform one step's action. Returns the number of attempts it took.
    fn perform(&mut self, step: &ProvisioningStep) -> Result<u32> {
        let ctx = self.ctx;
        match step.action {
            Action::ConfigureMirrors => {
                let source = ctx.config.mirror_source();
                for url in source.urls() {
                    println!("  {}", url);
                }
                self.mirror = Some(source.apply(&ctx.layout)?);
                Ok(1)
            }

            Action::InstallPackages => {
                let mirror = match &self.mirror {
                    Some(mirror) => mirror,
                    None => bail!("packages cannot be installed before mirrors are configured"),
                };
                let attempted = PackageInstaller::new(ctx.runner, mirror)
                    .with_policy(step.policy)
                    .install(step.name, &all_packages())?;
                Ok(attempted.attempts)
            }

            Action::InstallNativeRuntime => {
                let env = &mut self.env;
                once(step, || native::install(ctx, env))
            }

            Action::InstallBrowser => {
                let env = &mut self.env;
                once(step, || browser::install(ctx, env))
            }

            Action::InstallLanguageDeps => once(step, || language::install(ctx)),
        }
    }
}

/// Run a step that has no refresh action of its own.
fn once(step: &ProvisioningStep, mut action: impl FnMut() -> Result<()>) -> Result<u32> {
    if step.policy != RetryPolicy::Never {
        bail!("{} has no refresh action for {:?}", step.name, step.policy);
    }
    let attempted = step.policy.run(step.name, |_| action(), || Ok(()))?;
    Ok(attempted.attempts)
}
