//! Context shared by every installer.

use crate::artifact::ArtifactStore;
use crate::common::paths::Layout;
use crate::config::Config;
use crate::process::CommandRunner;

/// Everything an installer needs: where to install, where artifacts live,
/// and how to run tools.
pub struct ProvisionContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub layout: Layout,
    pub store: ArtifactStore,
    pub config: &'a Config,
}

impl<'a> ProvisionContext<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            layout: Layout::new(&config.provision_root),
            store: ArtifactStore::new(&config.vendor_dir, &config.requirements),
            config,
        }
    }
}
