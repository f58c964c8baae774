//! Health probe against a provisioned scratch root.

mod helpers;

use anyhow::{bail, Result};
use helpers::{ScriptedRunner, TestEnv};
use std::fs;
use std::path::Path;
use workerimg::common::paths::{CHROME_ALIAS, DRIVER_ALIAS};
use workerimg::health;
use workerimg::install::ProvisionContext;
use workerimg::pipeline::{self, Pipeline};
use workerimg::process::{Cmd, CommandResult, CommandRunner};

/// Refuses anything that could reach the network.
struct Offline<'a>(&'a ScriptedRunner);

impl CommandRunner for Offline<'_> {
    fn execute(&self, cmd: &Cmd) -> Result<CommandResult> {
        let program = Path::new(cmd.program())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if ["curl", "wget", "ping", "nc"].contains(&program.as_str())
            || cmd.get_args().iter().any(|a| a.contains("://"))
        {
            bail!("network access attempted: {}", cmd);
        }
        self.0.execute(cmd)
    }
}

fn provisioned() -> (TestEnv, ScriptedRunner) {
    let env = TestEnv::with_artifacts();
    let runner = ScriptedRunner::new(&env.root);
    let config = env.config();
    let ctx = ProvisionContext::new(&config, &runner);
    pipeline::run(&Pipeline::standard(&ctx.layout), &ctx).unwrap();
    (env, runner)
}

#[test]
fn test_healthy_without_network() {
    let (env, runner) = provisioned();
    let before = runner.calls().len();

    let report = health::check(&env.layout(), &Offline(&runner));

    assert!(report.healthy, "{:?}", report.reason());
    assert!(report.reason().is_none());
    let names: Vec<_> = report.checks.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"chrome"));
    assert!(names.contains(&"chromedriver"));
    assert!(names.contains(&"selenium"));
    assert!(runner.calls().len() > before);
}

#[test]
fn test_missing_driver_is_unhealthy_but_all_checks_run() {
    let (env, runner) = provisioned();
    fs::remove_file(env.layout().path(DRIVER_ALIAS)).unwrap();

    let report = health::check(&env.layout(), &Offline(&runner));

    assert!(!report.healthy);
    assert_eq!(report.reason().unwrap().name, "chromedriver");
    // Later checks still ran
    assert!(report.checks.iter().any(|c| c.name == "selenium" && c.ok));
}

#[test]
fn test_falls_back_to_unpacked_browser() {
    let (env, runner) = provisioned();
    fs::remove_file(env.layout().path(CHROME_ALIAS)).unwrap();
    let before = runner.calls().len();

    let report = health::check(&env.layout(), &Offline(&runner));

    assert!(report.healthy, "{:?}", report.reason());
    let calls = runner.calls();
    assert!(calls[before..]
        .iter()
        .any(|c| c.ends_with("/opt/chrome-linux64/chrome --version")));
}

#[test]
fn test_report_serializes() {
    let (env, runner) = provisioned();
    let report = health::check(&env.layout(), &Offline(&runner));

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["healthy"], true);
    assert!(json["checks"].as_array().unwrap().len() >= 5);
}
