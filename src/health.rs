//! Runtime health probe for a running worker container.
//!
//! Only local checks: file existence, `--version` output, Python imports and
//! the linker cache. Nothing here opens a network connection, so a
//! container without outbound access can still be healthy.

use serde::Serialize;

use crate::common::paths::{Layout, DRIVER_ALIAS};
use crate::install::browser::{CHROME_VERSION_PATTERN, DRIVER_VERSION_PATTERN};
use crate::install::{language, native};
use crate::process::CommandRunner;
use crate::verify::Probe;

/// Where a browser may live, in preference order.
pub const CHROME_CANDIDATES: &[&str] = &[
    "/usr/local/bin/google-chrome",
    "/opt/chrome-linux64/chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium-browser",
    "/usr/bin/chromium",
    "/opt/google/chrome/chrome",
];

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// First failing check, if any.
    pub fn reason(&self) -> Option<&HealthCheck> {
        self.checks.iter().find(|c| !c.ok)
    }

    pub fn print(&self) {
        for check in &self.checks {
            let icon = if check.ok { "✓" } else { "✗" };
            println!("  {} {}: {}", icon, check.name, check.detail);
        }
        match self.reason() {
            None => println!("healthy"),
            Some(check) => println!("unhealthy: {}: {}", check.name, check.detail),
        }
    }
}

/// The probes a health check runs, given what is installed under `layout`.
///
/// Returns an error message instead when no browser candidate exists.
pub fn probes(layout: &Layout) -> (Vec<Probe>, Option<String>) {
    let mut probes = Vec::new();
    let mut problem = None;

    match CHROME_CANDIDATES
        .iter()
        .map(|c| layout.path(c))
        .find(|p| p.exists())
    {
        Some(chrome) => probes.push(Probe::version("chrome", &chrome, CHROME_VERSION_PATTERN)),
        None => problem = Some("no Chrome/Chromium binary found".to_string()),
    }

    probes.push(Probe::version(
        "chromedriver",
        &layout.path(DRIVER_ALIAS),
        DRIVER_VERSION_PATTERN,
    ));
    probes.extend(native::probes());
    probes.push(language::adapter_probe());
    probes.push(Probe::python(
        "selenium",
        "import selenium; print(selenium.__version__)",
    ));

    (probes, problem)
}

/// Run every probe and collect the results. Never stops early.
pub fn check(layout: &Layout, runner: &dyn CommandRunner) -> HealthReport {
    let (probes, problem) = probes(layout);
    let mut checks = Vec::new();

    if let Some(problem) = problem {
        checks.push(HealthCheck {
            name: "chrome".to_string(),
            ok: false,
            detail: format!("{} (searched {})", problem, CHROME_CANDIDATES.join(", ")),
        });
    }

    for probe in &probes {
        checks.push(match probe.check(runner) {
            Ok(outcome) => HealthCheck {
                name: outcome.name,
                ok: true,
                detail: outcome.output.lines().next().unwrap_or("").to_string(),
            },
            Err(e) => HealthCheck {
                name: probe.name.clone(),
                ok: false,
                detail: e.to_string(),
            },
        });
    }

    let healthy = checks.iter().all(|c| c.ok);
    if !healthy {
        tracing::warn!("health check failed");
    }
    HealthReport { healthy, checks }
}
