use async_trait::async_trait;
use log::{debug, warn};

use crate::engine::{Emit, Stage};
use crate::error::Result;
use crate::model::{DeletionOutcome, DeletionStatus, PackageFile};

use super::Registry;

/// Deletes one package file per item.
///
/// A failed delete is reported as a `Failed` outcome rather than a stage
/// error so it shows up next to the successful deletions in the report.
pub struct DeleteFiles;

#[async_trait]
impl Stage<Registry> for DeleteFiles {
    type Input = PackageFile;
    type Output = DeletionOutcome;

    fn name(&self) -> &'static str {
        "delete"
    }

    fn describe(&self, file: &PackageFile) -> String {
        format!(
            "file {} of package {}:{}",
            file.id, file.project_id, file.package_id
        )
    }

    // a started delete is reported even if the run is cancelled meanwhile
    fn interruptible(&self) -> bool {
        false
    }

    async fn run(
        &self,
        file: PackageFile,
        client: &Registry,
        worker: usize,
    ) -> Result<Emit<DeletionOutcome>> {
        let status = match client
            .delete_package_file(file.project_id, file.package_id, file.id)
            .await
        {
            Ok(()) => {
                debug!("[worker-{worker}] deleted {}", file.file_name);
                DeletionStatus::Deleted
            }
            Err(e) => {
                warn!(
                    "[worker-{worker}] failed to delete {}:{}:{}: {e}",
                    file.project_id, file.package_id, file.id
                );
                DeletionStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        Ok(Emit::One(DeletionOutcome {
            project_id: file.project_id,
            package_id: file.package_id,
            file_id: file.id,
            status,
        }))
    }
}
