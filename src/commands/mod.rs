//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `export` - Build and export the worker image (default)
//! - `provision` - Run the pipeline inside the image build
//! - `preflight` - Run preflight checks
//! - `health` - Probe a running container
//! - `show` - Display information

mod export;
mod health;
mod preflight;
mod provision;
pub mod show;

pub use export::cmd_export;
pub use health::cmd_health;
pub use preflight::cmd_preflight;
pub use provision::{cmd_provision, ProvisionArgs};
pub use show::cmd_show;
