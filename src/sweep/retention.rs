use std::cmp::Reverse;

use async_trait::async_trait;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::engine::paginate::{self, Page};
use crate::engine::{Emit, Stage};
use crate::error::{Result, SweepError};
use crate::model::{PackageFile, PackageRef};

use super::Registry;

/// Newest files kept per package unless configured otherwise.
pub const DEFAULT_KEEP: usize = 20;

/// Selects the files of one package that fall outside the retention window.
///
/// Files are ordered newest first by creation time (ties broken by the higher
/// id first) and everything after the first `keep` is returned, oldest last.
/// Fewer than `keep` files means nothing is selected.
///
/// # Errors
///
/// Returns `MissingCreatedAt` if any file lacks a creation timestamp, since
/// the ordering would otherwise be meaningless.
pub fn plan_deletions(mut files: Vec<PackageFile>, keep: usize) -> Result<Vec<PackageFile>> {
    if let Some(file) = files.iter().find(|f| f.created_at.is_none()) {
        return Err(SweepError::MissingCreatedAt {
            package_id: file.package_id,
            file_id: file.id,
        });
    }

    if files.len() <= keep {
        return Ok(Vec::new());
    }

    files.sort_by_key(|f| (Reverse(f.created_at), Reverse(f.id)));
    Ok(files.split_off(keep))
}

/// Lists every file of a package and emits those the retention policy drops.
pub struct PlanRetention {
    pub keep: usize,
    pub page_size: usize,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Stage<Registry> for PlanRetention {
    type Input = PackageRef;
    type Output = PackageFile;

    fn name(&self) -> &'static str {
        "retention"
    }

    fn describe(&self, target: &PackageRef) -> String {
        format!("package {target}")
    }

    async fn run(
        &self,
        target: PackageRef,
        client: &Registry,
        worker: usize,
    ) -> Result<Emit<PackageFile>> {
        let list_page =
            |page: Page| client.list_package_files(target.project_id, target.package_id, page);

        let total = paginate::fetch_total(&self.cancel, &list_page).await?;
        if total < self.keep {
            debug!(
                "[worker-{worker}] package {target} has {total} files, below the {} kept",
                self.keep
            );
            return Ok(Emit::Nothing);
        }

        let files =
            paginate::enumerate_from(total, self.page_size, &self.cancel, list_page).await?;
        let doomed = plan_deletions(files, self.keep)?;
        info!(
            "[worker-{worker}] package {target}: {} of {total} files selected for deletion",
            doomed.len()
        );

        Ok(Emit::Many(doomed))
    }
}
