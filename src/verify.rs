//! Verification probes.
//!
//! A probe runs one local command and checks its exit code or output. It is
//! terminal: pass or fail, never retried. A binary that is missing or lacks
//! the executable bit fails without being spawned.

use regex::Regex;
use serde::Serialize;
use std::path::Path;

use crate::common::files::is_executable;
use crate::error::ProvisionError;
use crate::process::{Cmd, CommandRunner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Expect {
    /// Exit 0 and non-empty stdout.
    NonEmptyOutput,
    /// Exit 0 and stdout matching the regex.
    Pattern(String),
    /// This exact exit code.
    ExitCode(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub expect: Expect,
}

/// What a passing probe reported.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub name: String,
    pub output: String,
}

impl Probe {
    pub fn new(name: &str, program: impl AsRef<str>, args: &[&str], expect: Expect) -> Self {
        Self {
            name: name.to_string(),
            program: program.as_ref().to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: Vec::new(),
            expect,
        }
    }

    /// `<binary> --version`, output matched against `pattern`.
    pub fn version(name: &str, binary: &Path, pattern: &str) -> Self {
        Self::new(
            name,
            binary.to_string_lossy(),
            &["--version"],
            Expect::Pattern(pattern.to_string()),
        )
    }

    /// `python3 -c <code>`, must print something.
    pub fn python(name: &str, code: &str) -> Self {
        Self::new(name, "python3", &["-c", code], Expect::NonEmptyOutput)
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    fn fail(&self, reason: impl Into<String>) -> ProvisionError {
        ProvisionError::Verification {
            probe: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Run the probe.
    pub fn check(&self, runner: &dyn CommandRunner) -> Result<ProbeOutcome, ProvisionError> {
        if self.program.starts_with('/') {
            let path = Path::new(&self.program);
            if !path.exists() {
                return Err(self.fail(format!("{} not found", self.program)));
            }
            if !is_executable(path) {
                return Err(self.fail(format!("{} is not executable", self.program)));
            }
        }

        let mut cmd = Cmd::new(&self.program).args(&self.args).allow_fail();
        for (key, value) in &self.env {
            cmd = cmd.env(key, value);
        }
        let invocation = cmd.to_string();

        let result = cmd
            .run_with(runner)
            .map_err(|e| self.fail(format!("could not run '{}': {:#}", invocation, e)))?;
        let output = result.stdout_trimmed().to_string();

        match &self.expect {
            Expect::ExitCode(code) => {
                if result.code() != *code {
                    return Err(self.fail(format!(
                        "'{}' exited {} (expected {}): {}",
                        invocation,
                        result.code(),
                        code,
                        result.stderr_trimmed()
                    )));
                }
            }
            Expect::NonEmptyOutput | Expect::Pattern(_) => {
                if !result.success() {
                    return Err(self.fail(format!(
                        "'{}' exited {}: {}",
                        invocation,
                        result.code(),
                        result.stderr_trimmed()
                    )));
                }
                if output.is_empty() {
                    return Err(self.fail(format!("'{}' printed nothing", invocation)));
                }
                if let Expect::Pattern(pattern) = &self.expect {
                    let re = Regex::new(pattern)
                        .map_err(|e| self.fail(format!("bad pattern {}: {}", pattern, e)))?;
                    if !re.is_match(&output) {
                        return Err(self.fail(format!(
                            "'{}' output '{}' does not match /{}/",
                            invocation, output, pattern
                        )));
                    }
                }
            }
        }

        Ok(ProbeOutcome {
            name: self.name.clone(),
            output,
        })
    }
}

/// Token proving every build-time probe passed.
///
/// Only [`Verifier::run`] creates one; cleanup demands it.
#[derive(Debug)]
pub struct Verified {
    outcomes: Vec<ProbeOutcome>,
}

impl Verified {
    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }
}

/// Runs a fixed set of probes and stops at the first failure.
pub struct Verifier<'a> {
    runner: &'a dyn CommandRunner,
    probes: Vec<Probe>,
}

impl<'a> Verifier<'a> {
    pub(crate) fn new(runner: &'a dyn CommandRunner, probes: Vec<Probe>) -> Self {
        Self { runner, probes }
    }

    /// An empty probe set proves nothing and is refused.
    pub fn run(&self) -> Result<Verified, ProvisionError> {
        if self.probes.is_empty() {
            return Err(ProvisionError::Verification {
                probe: "verify".to_string(),
                reason: "no checks to run".to_string(),
            });
        }
        let outcomes = run_probes(self.runner, &self.probes)?;
        Ok(Verified { outcomes })
    }
}

/// Run probes in order, printing one line each. First failure wins.
pub fn run_probes(
    runner: &dyn CommandRunner,
    probes: &[Probe],
) -> Result<Vec<ProbeOutcome>, ProvisionError> {
    let mut outcomes = Vec::with_capacity(probes.len());
    for probe in probes {
        match probe.check(runner) {
            Ok(outcome) => {
                println!("  ✓ {}: {}", outcome.name, first_line(&outcome.output));
                outcomes.push(outcome);
            }
            Err(e) => {
                println!("  ✗ {}", e);
                return Err(e);
            }
        }
    }
    Ok(outcomes)
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
