//! Vendored artifact checks.

use crate::artifact::{self, ArtifactStore};
use crate::common::files::size_mb;

use super::types::CheckResult;

/// One check per artifact, every missing one reported.
pub fn check_artifacts(store: &ArtifactStore) -> Vec<CheckResult> {
    artifact::ALL
        .iter()
        .map(|spec| match store.check(spec.id) {
            Ok(path) => {
                let size = store.size(spec.id).unwrap_or(0);
                if size == 0 {
                    return CheckResult::warn(
                        spec.name,
                        &format!("{} is empty", path.display()),
                    );
                }
                CheckResult::pass_with(
                    spec.name,
                    &format!("{} ({} MB)", path.display(), size_mb(size)),
                )
            }
            Err(e) => CheckResult::fail(spec.name, &e.to_string()),
        })
        .collect()
}
