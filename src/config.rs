//! Configuration management for workerimg.
//!
//! Reads configuration from a `.env` file and environment variables.
//! Environment variables take precedence over the `.env` file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::mirror::MirrorSource;

pub const DEFAULT_IMAGE_NAME: &str = "worker-env";
pub const DEFAULT_IMAGE_TAG: &str = "latest";
pub const DEFAULT_BASE_IMAGE: &str = "python:3.11-slim-bookworm";
pub const DEFAULT_ENGINE: &str = "docker";
pub const DEFAULT_APT_MIRROR: &str = "http://mirrors.aliyun.com/debian";
pub const DEFAULT_APT_SECURITY_MIRROR: &str = "http://mirrors.aliyun.com/debian-security";
pub const DEFAULT_SUITE: &str = "bookworm";
pub const DEFAULT_CX_ORACLE_VERSION: &str = "8.3.0";
pub const DEFAULT_DISPLAY: &str = ":99";

/// workerimg configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the vendored archives (default: vendor/)
    pub vendor_dir: PathBuf,
    /// Pinned Python requirements (default: requirements.txt)
    pub requirements: PathBuf,
    /// Where the exported image tarball and build context go (default: output/)
    pub output_dir: PathBuf,
    pub image_name: String,
    pub image_tag: String,
    pub base_image: String,
    /// Container engine executable (default: docker)
    pub engine: String,
    pub apt_mirror: String,
    pub apt_security_mirror: String,
    pub suite: String,
    /// Optional Python package index mirror
    pub pip_index_url: Option<String>,
    pub cx_oracle_version: String,
    /// X display for the headless browser
    pub display: String,
    /// Provisioning root (default: /)
    pub provision_root: PathBuf,
}

impl Config {
    /// Load configuration from `<base_dir>/.env` and the environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut env_vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if let Ok(iter) = dotenvy::from_path_iter(&env_path) {
            for (key, value) in iter.flatten() {
                env_vars.insert(key, value);
            }
        }

        // Environment variables override .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        Self::from_vars(base_dir, &env_vars)
    }

    /// Build a config from an explicit variable map, with defaults.
    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Self {
        let path = |key: &str, default: &str| {
            let path = PathBuf::from(vars.get(key).map(String::as_str).unwrap_or(default));
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };
        let string = |key: &str, default: &str| {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            vendor_dir: path("VENDOR_DIR", "vendor"),
            requirements: path("REQUIREMENTS_FILE", "requirements.txt"),
            output_dir: path("OUTPUT_DIR", "output"),
            image_name: string("IMAGE_NAME", DEFAULT_IMAGE_NAME),
            image_tag: string("IMAGE_TAG", DEFAULT_IMAGE_TAG),
            base_image: string("BASE_IMAGE", DEFAULT_BASE_IMAGE),
            engine: string("CONTAINER_ENGINE", DEFAULT_ENGINE),
            apt_mirror: string("APT_MIRROR", DEFAULT_APT_MIRROR),
            apt_security_mirror: string("APT_SECURITY_MIRROR", DEFAULT_APT_SECURITY_MIRROR),
            suite: string("DEBIAN_SUITE", DEFAULT_SUITE),
            pip_index_url: vars.get("PIP_INDEX_URL").filter(|v| !v.is_empty()).cloned(),
            cx_oracle_version: string("CX_ORACLE_VERSION", DEFAULT_CX_ORACLE_VERSION),
            display: string("WORKER_DISPLAY", DEFAULT_DISPLAY),
            provision_root: PathBuf::from(string("PROVISION_ROOT", "/")),
        }
    }

    /// `name:tag` reference of the image.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image_name, self.image_tag)
    }

    /// File name of the exported single-file archive.
    pub fn export_file_name(&self) -> String {
        format!("{}-{}.tar", self.image_name, self.image_tag)
    }

    /// The mirror set every provisioning run starts from.
    pub fn mirror_source(&self) -> MirrorSource {
        MirrorSource::debian(&self.apt_mirror, &self.apt_security_mirror, &self.suite)
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  VENDOR_DIR: {}", self.vendor_dir.display());
        println!("  REQUIREMENTS_FILE: {}", self.requirements.display());
        println!("  OUTPUT_DIR: {}", self.output_dir.display());
        println!("  IMAGE: {}", self.image_ref());
        println!("  BASE_IMAGE: {}", self.base_image);
        println!("  CONTAINER_ENGINE: {}", self.engine);
        println!("  APT_MIRROR: {}", self.apt_mirror);
        println!("  APT_SECURITY_MIRROR: {}", self.apt_security_mirror);
        println!("  DEBIAN_SUITE: {}", self.suite);
        match &self.pip_index_url {
            Some(url) => println!("  PIP_INDEX_URL: {}", url),
            None => println!("  PIP_INDEX_URL: (default index)"),
        }
        println!("  CX_ORACLE_VERSION: {}", self.cx_oracle_version);
        println!("  WORKER_DISPLAY: {}", self.display);
        println!("  PROVISION_ROOT: {}", self.provision_root.display());
    }
}
