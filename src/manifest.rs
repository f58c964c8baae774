//! Build manifest written into the image.
//!
//! Records what a provisioning run did and with which inputs, so a running
//! container can be traced back to the exact vendored artifacts.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::artifact::{ArtifactDigest, ArtifactId, ArtifactStore};
use crate::common::files::write_file_atomic;
use crate::pipeline::StepReport;
use crate::verify::ProbeOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest {
    pub image: String,
    /// Seconds since the Unix epoch at provisioning time
    pub generated_at: u64,
    pub steps: Vec<StepReport>,
    /// Output of every verification probe
    pub probes: Vec<ProbeOutcome>,
    pub artifacts: Vec<ArtifactDigest>,
    /// Bindings as exported by the profile script
    pub environment: BTreeMap<String, String>,
}

impl BuildManifest {
    pub fn new(image: &str) -> Self {
        Self {
            image: image.to_string(),
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            steps: Vec::new(),
            probes: Vec::new(),
            artifacts: Vec::new(),
            environment: BTreeMap::new(),
        }
    }

    /// Hash every listed artifact.
    pub fn record_artifacts(&mut self, store: &ArtifactStore, ids: &[ArtifactId]) -> Result<()> {
        for id in ids {
            self.artifacts.push(store.digest(*id)?);
        }
        Ok(())
    }

    /// Save manifest to JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_file_atomic(path, json)
            .with_context(|| format!("Failed to write manifest to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_save_records_digests() {
        let temp = TempDir::new().unwrap();
        let requirements = temp.path().join("requirements.txt");
        fs::write(&requirements, "payload").unwrap();
        let store = ArtifactStore::new(temp.path().join("vendor"), &requirements);

        let mut manifest = BuildManifest::new("worker-env:latest");
        manifest
            .record_artifacts(&store, &[ArtifactId::Requirements])
            .unwrap();
        manifest
            .environment
            .insert("DISPLAY".to_string(), ":99".to_string());

        let path = temp.path().join("etc/worker-image/manifest.json");
        manifest.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["image"], "worker-env:latest");
        assert_eq!(value["artifacts"][0]["id"], "requirements");
        assert_eq!(
            value["artifacts"][0]["sha256"],
            "239f59ed55e737c77147cf55ad0c1b030b6d7ee748a7426952f9b852d5a935e5"
        );
        assert_eq!(value["environment"]["DISPLAY"], ":99");
    }
}
