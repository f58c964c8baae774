//! Show command - displays information.

use anyhow::Result;

use crate::common::paths::Layout;
use crate::config::Config;
use crate::export::dockerfile;
use crate::pipeline::{declared_environment, Pipeline};

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the generated Dockerfile
    Dockerfile,
    /// Show the environment a provisioned image exports
    Env,
    /// Show the provisioning steps
    Steps,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => {
            config.print();
        }
        ShowTarget::Dockerfile => {
            let env = declared_environment(config)?;
            print!("{}", dockerfile::render(config, &env));
        }
        ShowTarget::Env => {
            print!("{}", declared_environment(config)?.render_profile());
        }
        ShowTarget::Steps => {
            Pipeline::standard(&Layout::new(&config.provision_root)).print();
        }
    }
    Ok(())
}
