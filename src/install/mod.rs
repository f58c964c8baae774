//! Installers run by the provisioning pipeline.
//!
//! Each installer takes a [`ProvisionContext`] and contributes its
//! environment bindings only after its own work succeeded.

pub mod browser;
pub mod context;
pub mod language;
pub mod native;
pub mod packages;

pub use context::ProvisionContext;
pub use packages::PackageInstaller;
