//! Provision command - runs the pipeline inside the image build.

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::error;
use crate::install::ProvisionContext;
use crate::pipeline::{self, Pipeline};
use crate::process::SystemRunner;

/// Overrides from the command line.
pub struct ProvisionArgs {
    pub root: Option<PathBuf>,
    pub vendor_dir: Option<PathBuf>,
    pub requirements: Option<PathBuf>,
}

/// Execute the provision command.
pub fn cmd_provision(config: &Config, args: ProvisionArgs) -> Result<()> {
    let mut config = config.clone();
    if let Some(root) = args.root {
        config.provision_root = root;
    }
    if let Some(vendor_dir) = args.vendor_dir {
        config.vendor_dir = vendor_dir;
    }
    if let Some(requirements) = args.requirements {
        config.requirements = requirements;
    }

    let ctx = ProvisionContext::new(&config, &SystemRunner);
    let pipeline = Pipeline::standard(&ctx.layout);
    let report = match pipeline::run(&pipeline, &ctx) {
        Ok(report) => report,
        Err(e) => {
            if error::find(&e).is_some_and(|e| e.is_precondition()) {
                println!("\nNothing was installed. Provide the missing input and rerun.");
            }
            return Err(e);
        }
    };

    for step in report.retried() {
        println!(
            "Note: step '{}' succeeded after {} attempts",
            step.name, step.attempts
        );
    }
    Ok(())
}
