//! Vendored artifacts and the precondition gate.
//!
//! The pipeline never downloads the browser, the driver or the native client
//! packages. They are shipped next to the project at fixed relative paths
//! and must all be present before anything expensive starts.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use crate::common::paths::{CHROME_DIR, DRIVER_DIR, OBCLIENT_LIB, ORACLE_BASE};
use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactId {
    BrowserArchive,
    DriverArchive,
    NativeClientBundle,
    OracleClientRpm,
    OceanBaseClientRpm,
    Requirements,
}

/// Where an artifact is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Relative to the vendor directory.
    Vendor(&'static str),
    /// The configured requirements file.
    Requirements,
}

/// Static description of an artifact.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSpec {
    pub id: ArtifactId,
    pub name: &'static str,
    pub origin: Origin,
    /// In-image destination, `None` when installed through a package manager.
    pub install_dest: Option<&'static str>,
    /// Whether the unpacked payload contains an executable entry point.
    pub executable: bool,
}

pub const BROWSER_ARCHIVE: ArtifactSpec = ArtifactSpec {
    id: ArtifactId::BrowserArchive,
    name: "browser archive",
    origin: Origin::Vendor("chrome-linux64.zip"),
    install_dest: Some(CHROME_DIR),
    executable: true,
};

pub const DRIVER_ARCHIVE: ArtifactSpec = ArtifactSpec {
    id: ArtifactId::DriverArchive,
    name: "driver archive",
    origin: Origin::Vendor("chromedriver-linux64.zip"),
    install_dest: Some(DRIVER_DIR),
    executable: true,
};

pub const NATIVE_CLIENT_BUNDLE: ArtifactSpec = ArtifactSpec {
    id: ArtifactId::NativeClientBundle,
    name: "native client bundle",
    origin: Origin::Vendor("instantclient-basic-linux.x64.zip"),
    install_dest: Some(ORACLE_BASE),
    executable: false,
};

pub const ORACLE_CLIENT_RPM: ArtifactSpec = ArtifactSpec {
    id: ArtifactId::OracleClientRpm,
    name: "oracle client package",
    origin: Origin::Vendor("oracle-instantclient-basic.x86_64.rpm"),
    install_dest: None,
    executable: false,
};

pub const OCEANBASE_CLIENT_RPM: ArtifactSpec = ArtifactSpec {
    id: ArtifactId::OceanBaseClientRpm,
    name: "oceanbase client package",
    origin: Origin::Vendor("obci.x86_64.rpm"),
    install_dest: Some(OBCLIENT_LIB),
    executable: false,
};

pub const REQUIREMENTS: ArtifactSpec = ArtifactSpec {
    id: ArtifactId::Requirements,
    name: "python requirements",
    origin: Origin::Requirements,
    install_dest: None,
    executable: false,
};

/// Every artifact the pipeline consumes, in step order.
pub const ALL: &[ArtifactSpec] = &[
    BROWSER_ARCHIVE,
    DRIVER_ARCHIVE,
    NATIVE_CLIENT_BUNDLE,
    ORACLE_CLIENT_RPM,
    OCEANBASE_CLIENT_RPM,
    REQUIREMENTS,
];

pub fn spec(id: ArtifactId) -> &'static ArtifactSpec {
    match id {
        ArtifactId::BrowserArchive => &BROWSER_ARCHIVE,
        ArtifactId::DriverArchive => &DRIVER_ARCHIVE,
        ArtifactId::NativeClientBundle => &NATIVE_CLIENT_BUNDLE,
        ArtifactId::OracleClientRpm => &ORACLE_CLIENT_RPM,
        ArtifactId::OceanBaseClientRpm => &OCEANBASE_CLIENT_RPM,
        ArtifactId::Requirements => &REQUIREMENTS,
    }
}

/// Digest entry recorded in the build manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDigest {
    pub id: ArtifactId,
    pub file: String,
    pub size: u64,
    pub sha256: String,
}

/// Read-only view of the vendored artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    vendor_dir: PathBuf,
    requirements: PathBuf,
}

impl ArtifactStore {
    pub fn new(vendor_dir: impl Into<PathBuf>, requirements: impl Into<PathBuf>) -> Self {
        Self {
            vendor_dir: vendor_dir.into(),
            requirements: requirements.into(),
        }
    }

    /// Expected local path of an artifact.
    pub fn path(&self, id: ArtifactId) -> PathBuf {
        match spec(id).origin {
            Origin::Vendor(rel) => self.vendor_dir.join(rel),
            Origin::Requirements => self.requirements.clone(),
        }
    }

    /// Check a single artifact is a readable regular file.
    pub fn check(&self, id: ArtifactId) -> Result<PathBuf, ProvisionError> {
        let path = self.path(id);
        let readable = path.is_file() && File::open(&path).is_ok();
        if readable {
            Ok(path)
        } else {
            Err(ProvisionError::ArtifactMissing {
                name: spec(id).name.to_string(),
                path,
            })
        }
    }

    /// Precondition gate: every listed artifact must be present.
    ///
    /// Stops at the first missing artifact in the given order.
    pub fn require(&self, ids: &[ArtifactId]) -> Result<(), ProvisionError> {
        for id in ids {
            self.check(*id)?;
        }
        Ok(())
    }

    /// All missing artifacts, for reports that list every problem at once.
    pub fn missing(&self, ids: &[ArtifactId]) -> Vec<ProvisionError> {
        ids.iter().filter_map(|id| self.check(*id).err()).collect()
    }

    /// SHA-256 and size of an artifact.
    pub fn digest(&self, id: ArtifactId) -> Result<ArtifactDigest> {
        let path = self.check(id)?;
        let mut file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut hasher = Sha256::new();
        let size = io::copy(&mut file, &mut hasher)
            .with_context(|| format!("Failed to hash {}", path.display()))?;

        Ok(ArtifactDigest {
            id,
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    /// Size in bytes, used for preflight reporting.
    pub fn size(&self, id: ArtifactId) -> Option<u64> {
        fs::metadata(self.path(id)).ok().map(|m| m.len())
    }
}
