//! Health command - runtime probe for a running container.

use anyhow::Result;

use crate::common::paths::Layout;
use crate::config::Config;
use crate::health;
use crate::process::SystemRunner;

/// Execute the health command. Returns the process exit code.
pub fn cmd_health(config: &Config, json: bool) -> Result<i32> {
    let layout = Layout::new(&config.provision_root);
    let report = health::check(&layout, &SystemRunner);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(if report.healthy { 0 } else { 1 })
}
