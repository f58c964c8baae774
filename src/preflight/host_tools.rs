//! Host tool availability checks.

use crate::process::{self, Cmd, CommandRunner};

use super::types::CheckResult;

/// Check the container engine is installed and its daemon answers.
///
/// The daemon is only contacted when the executable was found.
pub fn check_engine(engine: &str, runner: &dyn CommandRunner) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let found = match process::which(engine) {
        Some(path) => {
            results.push(CheckResult::pass_with(engine, &path.display().to_string()));
            true
        }
        None => {
            results.push(CheckResult::fail(
                engine,
                "Not found in PATH. Install a container engine or set CONTAINER_ENGINE.",
            ));
            false
        }
    };

    let daemon = format!("{} daemon", engine);
    if !found {
        results.push(CheckResult::skip(&daemon, "engine executable missing"));
        return results;
    }

    let probe = Cmd::new(engine)
        .args(["info", "--format", "{{.ServerVersion}}"])
        .allow_fail()
        .run_with(runner);
    results.push(match probe {
        Ok(result) if result.success() => {
            let version = result.stdout_trimmed();
            if version.is_empty() {
                CheckResult::pass(&daemon)
            } else {
                CheckResult::pass_with(&daemon, &format!("server {}", version))
            }
        }
        Ok(result) => CheckResult::fail(
            &daemon,
            &format!("'{} info' exited {}: {}", engine, result.code(), result.stderr_trimmed()),
        ),
        Err(e) => CheckResult::fail(&daemon, &format!("{:#}", e)),
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SystemRunner;

    #[test]
    fn test_missing_engine_skips_daemon() {
        let results = check_engine("workerimg-no-such-engine", &SystemRunner);
        assert_eq!(results.len(), 2);
        assert!(results[0].failed());
        assert_eq!(results[1].status, super::super::types::CheckStatus::Skip);
    }
}
