//! Shared test utilities for workerimg tests.
//!
//! [`TestEnv`] is a scratch project (vendor dir, requirements, output dir)
//! plus a scratch provisioning root. [`ScriptedRunner`] stands in for every
//! external tool: it records each invocation and reproduces the side effects
//! the pipeline relies on (unpacked archives, converted packages, saved
//! images) under the scratch root.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use workerimg::artifact::{self, ArtifactId, ArtifactStore};
use workerimg::common::paths::Layout;
use workerimg::config::Config;
use workerimg::process::{Cmd, CommandResult, CommandRunner};

pub const CHROME_VERSION: &str = "Google Chrome 120.0.6099.109";
pub const DRIVER_VERSION: &str = "ChromeDriver 120.0.6099.109 (3419140ab665596f21b385ce136419fde0924272)";
pub const INSTANTCLIENT_DIR: &str = "instantclient_21_12";

/// Scratch project and provisioning root.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Project root: vendor/, requirements.txt, output/
    pub base_dir: PathBuf,
    /// Provisioning root standing in for `/`
    pub root: PathBuf,
    /// Extra configuration on top of the scratch paths
    pub vars: HashMap<String, String>,
}

impl TestEnv {
    /// Empty project, no artifacts.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().join("project");
        let root = temp_dir.path().join("root");
        fs::create_dir_all(base_dir.join("vendor")).expect("Failed to create vendor dir");
        fs::create_dir_all(&root).expect("Failed to create root dir");

        let mut vars = HashMap::new();
        vars.insert(
            "PROVISION_ROOT".to_string(),
            root.to_string_lossy().into_owned(),
        );

        Self {
            _temp_dir: temp_dir,
            base_dir,
            root,
            vars,
        }
    }

    /// Project with every vendored artifact present.
    pub fn with_artifacts() -> Self {
        let env = Self::new();
        for spec in artifact::ALL {
            env.write_artifact(spec.id);
        }
        env
    }

    pub fn config(&self) -> Config {
        Config::from_vars(&self.base_dir, &self.vars)
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    pub fn store(&self) -> ArtifactStore {
        let config = self.config();
        ArtifactStore::new(&config.vendor_dir, &config.requirements)
    }

    pub fn write_artifact(&self, id: ArtifactId) {
        let path = self.store().path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create artifact dir");
        }
        let content = match id {
            ArtifactId::Requirements => "selenium==4.15.2\nrequests==2.31.0\n".to_string(),
            other => format!("mock {:?}", other),
        };
        fs::write(&path, content).expect("Failed to write artifact");
    }

    pub fn remove_artifact(&self, id: ArtifactId) {
        fs::remove_file(self.store().path(id)).expect("Failed to remove artifact");
    }

    /// An executable file to stand in for the container engine on PATH lookups.
    pub fn fake_engine(&mut self) -> PathBuf {
        let engine = self.base_dir.join("bin/docker");
        create_script(&engine, "echo docker", 0o755);
        self.vars.insert(
            "CONTAINER_ENGINE".to_string(),
            engine.to_string_lossy().into_owned(),
        );
        engine
    }

    /// A file to stand in for the provisioner binary.
    pub fn fake_binary(&self) -> PathBuf {
        let binary = self.base_dir.join("target/workerimg");
        create_script(&binary, "echo workerimg", 0o755);
        binary
    }
}

/// Write a `/bin/sh` script with the given body and mode.
pub fn create_script(path: &Path, body: &str, mode: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create script dir");
    }
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .expect("Failed to set permissions");
}

/// Hook run when the scripted engine is asked to build a context.
pub type BuildHook = Box<dyn Fn(&Path) -> Result<()>>;

/// Records every command and fakes the tools the pipeline calls.
pub struct ScriptedRunner {
    root: PathBuf,
    calls: RefCell<Vec<String>>,
    /// (needle, remaining) - matching commands fail while remaining > 0
    failures: RefCell<Vec<(String, u32)>>,
    /// Unzip writes a browser whose interpreter does not exist
    pub broken_browser: Cell<bool>,
    /// Size of the archive `docker save` writes
    pub save_bytes: Cell<u64>,
    on_build: RefCell<Option<BuildHook>>,
}

impl ScriptedRunner {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            calls: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
            broken_browser: Cell::new(false),
            save_bytes: Cell::new(3 * 1024 * 1024 + 17),
            on_build: RefCell::new(None),
        }
    }

    /// Make the next `times` commands containing `needle` fail.
    pub fn fail(&self, needle: &str, times: u32) {
        self.failures
            .borrow_mut()
            .push((needle.to_string(), times));
    }

    pub fn on_build(&self, hook: BuildHook) {
        *self.on_build.borrow_mut() = Some(hook);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.contains(needle)).count()
    }

    /// Index of the first call containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| c.contains(needle))
    }

    fn should_fail(&self, line: &str) -> bool {
        let mut failures = self.failures.borrow_mut();
        for (needle, remaining) in failures.iter_mut() {
            if *remaining > 0 && line.contains(needle.as_str()) {
                *remaining -= 1;
                return true;
            }
        }
        false
    }

    fn unzip(&self, args: &[String]) -> Result<CommandResult> {
        let archive = args
            .iter()
            .find(|a| a.ends_with(".zip"))
            .ok_or_else(|| anyhow!("unzip without archive"))?;
        let dest = args
            .iter()
            .position(|a| a == "-d")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("unzip without -d"))?;

        let name = Path::new(archive)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.as_str() {
            "chrome-linux64.zip" => {
                let interpreter = if self.broken_browser.get() {
                    "#!/nonexistent/interpreter"
                } else {
                    "#!/bin/sh"
                };
                write_unpacked(
                    &dest.join("chrome-linux64/chrome"),
                    &format!("{}\necho '{}'\n", interpreter, CHROME_VERSION),
                );
                write_unpacked(&dest.join("chrome-linux64/resources.pak"), "pak");
            }
            "chromedriver-linux64.zip" => {
                write_unpacked(
                    &dest.join("chromedriver-linux64/chromedriver"),
                    &format!("#!/bin/sh\necho '{}'\n", DRIVER_VERSION),
                );
            }
            "instantclient-basic-linux.x64.zip" => {
                write_unpacked(
                    &dest.join(INSTANTCLIENT_DIR).join("libclntsh.so.21.1"),
                    "so",
                );
            }
            other => return Err(anyhow!("unexpected archive {}", other)),
        }
        Ok(CommandResult::ok(""))
    }

    fn alien(&self, cmd: &Cmd) -> Result<CommandResult> {
        let rpm = cmd
            .get_args()
            .last()
            .ok_or_else(|| anyhow!("alien without package"))?;
        let stem = Path::new(rpm)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let package = stem.split('.').next().unwrap_or("pkg").to_string();
        let dir = cmd
            .get_dir()
            .ok_or_else(|| anyhow!("alien without working dir"))?;
        fs::write(dir.join(format!("{}_1.0-2_amd64.deb", package)), "deb")?;
        Ok(CommandResult::ok(format!("{}_1.0-2_amd64.deb generated", package)))
    }

    fn dpkg(&self) -> Result<CommandResult> {
        fs::create_dir_all(self.root.join("u01/obclient/lib"))?;
        fs::create_dir_all(self.root.join("u01/obclient/bin"))?;
        Ok(CommandResult::ok(""))
    }

    fn python(&self, line: &str) -> CommandResult {
        if line.contains("pip check") {
            CommandResult::ok("No broken requirements found.\n")
        } else if line.contains("clientversion") {
            CommandResult::ok("(21, 12, 0, 0, 0)\n")
        } else if line.contains("import selenium") {
            CommandResult::ok("4.15.2\n")
        } else {
            CommandResult::ok("")
        }
    }

    fn engine(&self, args: &[String]) -> Result<CommandResult> {
        match args.first().map(String::as_str) {
            Some("info") => Ok(CommandResult::ok("24.0.7\n")),
            Some("build") => {
                let context = args
                    .last()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("build without context"))?;
                if let Some(hook) = self.on_build.borrow().as_ref() {
                    if let Err(e) = hook(&context) {
                        return Ok(CommandResult::failed(1, format!("{:#}", e)));
                    }
                }
                Ok(CommandResult::ok("Successfully built\n"))
            }
            Some("save") => {
                let out = args
                    .iter()
                    .position(|a| a == "-o")
                    .and_then(|i| args.get(i + 1))
                    .ok_or_else(|| anyhow!("save without -o"))?;
                fs::write(out, vec![0u8; self.save_bytes.get() as usize])?;
                Ok(CommandResult::ok(""))
            }
            _ => Ok(CommandResult::ok("")),
        }
    }
}

/// Emulate exec of an unpacked script: the interpreter must exist, and the
/// output is whatever its `echo` line prints.
fn exec_script(path: &Path) -> Result<CommandResult> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();
    let interpreter = lines
        .next()
        .and_then(|l| l.strip_prefix("#!"))
        .ok_or_else(|| anyhow!("Failed to execute '{}': Exec format error", path.display()))?;
    if !Path::new(interpreter).exists() {
        return Err(anyhow!(
            "Failed to execute '{}': No such file or directory",
            path.display()
        ));
    }
    let output = lines
        .find_map(|l| l.strip_prefix("echo "))
        .map(|s| s.trim_matches('\'').to_string())
        .unwrap_or_default();
    Ok(CommandResult::ok(format!("{}\n", output)))
}

fn write_unpacked(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create unpack dir");
    }
    fs::write(path, content).expect("Failed to write unpacked file");
    // Archives unpacked without permission bits
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
        .expect("Failed to set permissions");
}

impl CommandRunner for ScriptedRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CommandResult> {
        let line = cmd.to_string();
        self.calls.borrow_mut().push(line.clone());

        if self.should_fail(&line) {
            return Ok(CommandResult::failed(100, format!("scripted failure: {}", line)));
        }

        let program = Path::new(cmd.program());
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match name.as_str() {
            "unzip" => self.unzip(cmd.get_args()),
            "alien" => self.alien(cmd),
            "dpkg" => self.dpkg(),
            "ldconfig" if cmd.get_args().iter().any(|a| a == "-p") => Ok(CommandResult::ok(
                "\t1 libs found in cache `/etc/ld.so.cache'\n\
                 \tlibclntsh.so.21.1 (libc6,x86-64) => /opt/oracle/instantclient/libclntsh.so.21.1\n",
            )),
            "python3" => Ok(self.python(&line)),
            "docker" => self.engine(cmd.get_args()),
            _ if program.is_absolute() && program.starts_with(&self.root) => exec_script(program),
            _ => Ok(CommandResult::ok("")),
        }
    }
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &str) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );
    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        target.to_string_lossy(),
        expected_target,
        "Symlink {} points to {:?}, expected {}",
        path.display(),
        target,
        expected_target
    );
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|_| panic!("Failed to read file: {}", path.display()));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(
        path.exists(),
        "Expected file to exist: {}",
        path.display()
    );
}

// =============================================================================
// Log capture
// =============================================================================

/// In-memory sink for `tracing` output.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Run `f` with a plain-text subscriber writing into this buffer.
    pub fn during<T>(&self, f: impl FnOnce() -> T) -> T {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
