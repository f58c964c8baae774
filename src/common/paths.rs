//! Fixed install locations inside the provisioned environment.
//!
//! Constants are absolute paths as the worker sees them. [`Layout`] maps
//! them under a provisioning root, which is `/` inside an image build and a
//! scratch directory in tests.

use std::path::{Component, Path, PathBuf};

pub const APT_SOURCES_LIST: &str = "/etc/apt/sources.list";
pub const APT_SOURCES_DIR: &str = "/etc/apt/sources.list.d";
pub const APT_LISTS_DIR: &str = "/var/lib/apt/lists";

pub const CHROME_DIR: &str = "/opt/chrome-linux64";
pub const CHROME_BIN: &str = "/opt/chrome-linux64/chrome";
pub const CHROME_ALIAS: &str = "/usr/local/bin/google-chrome";
pub const DRIVER_DIR: &str = "/opt/chromedriver-linux64";
pub const DRIVER_BIN: &str = "/opt/chromedriver-linux64/chromedriver";
pub const DRIVER_ALIAS: &str = "/usr/local/bin/chromedriver";

pub const ORACLE_BASE: &str = "/opt/oracle";
pub const INSTANTCLIENT_LINK: &str = "/opt/oracle/instantclient";
pub const OBCLIENT_LIB: &str = "/u01/obclient/lib";
pub const OBCLIENT_BIN: &str = "/u01/obclient/bin";
pub const LD_CONF: &str = "/etc/ld.so.conf.d/worker-native.conf";

pub const PROVISIONER_BIN: &str = "/usr/local/bin/workerimg";
/// Interpreter and site-packages of the base image.
pub const PYTHON_LIB: &str = "/usr/local/lib";
pub const PIP_CACHE: &str = "/root/.cache/pip";
pub const WORK_DIR: &str = "/tmp/workerimg";
/// Read-only bind mounts of the build context during `RUN`. Kept outside
/// `WORK_DIR`, which cleanup removes.
pub const VENDOR_STAGING: &str = "/mnt/workerimg/vendor";
pub const REQUIREMENTS_STAGING: &str = "/mnt/workerimg/requirements.txt";

pub const ENV_PROFILE: &str = "/etc/profile.d/worker-env.sh";
pub const MANIFEST: &str = "/etc/worker-image/manifest.json";

/// Maps in-image absolute paths under a provisioning root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Host path of an in-image absolute path.
    pub fn path(&self, in_image: &str) -> PathBuf {
        self.root.join(in_image.trim_start_matches('/'))
    }
}

/// Relative symlink target from `link` to `target`, both in-image absolute.
///
/// Relative links resolve the same way under a scratch root as they do in
/// the final image.
pub fn relative_target(link: &str, target: &str) -> PathBuf {
    let link_dir: Vec<Component> = Path::new(link)
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let target: Vec<Component> = Path::new(target).components().collect();

    let common = link_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..link_dir.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component.as_os_str());
    }
    rel
}
