//! Expansion and filter stages used by the search pipelines.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::engine::paginate::{self, Page};
use crate::engine::{Emit, Stage};
use crate::error::Result;
use crate::model::{Package, PackageRow, Project};
use crate::providers::gitlab::PackageQuery;

use super::Registry;

/// Inclusive range filter; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// A package still attached to the project it was listed from.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub project: Arc<Project>,
    pub package: Package,
}

/// Re-fetches each project with storage statistics and keeps those whose
/// storage size lies within `size`.
pub struct AttachStatistics {
    pub size: Bounds<u64>,
}

#[async_trait]
impl Stage<Registry> for AttachStatistics {
    type Input = Project;
    type Output = Project;

    fn name(&self) -> &'static str {
        "statistics"
    }

    fn describe(&self, project: &Project) -> String {
        format!("project {} ({})", project.id, project.path)
    }

    async fn run(
        &self,
        project: Project,
        client: &Registry,
        worker: usize,
    ) -> Result<Emit<Project>> {
        let detailed = client.project(project.id, true).await?;
        let storage = detailed.statistics.map_or(0, |s| s.storage_size);
        debug!("[worker-{worker}] project {} uses {storage} bytes", project.id);

        if !self.size.contains(storage) {
            return Ok(Emit::Nothing);
        }

        Ok(Emit::One(Project {
            statistics: detailed.statistics,
            ..project
        }))
    }
}

/// Fans each project out into its packages, optionally filtered by name.
pub struct ExpandPackages {
    pub query: PackageQuery,
    pub page_size: usize,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Stage<Registry> for ExpandPackages {
    type Input = Project;
    type Output = PackageEntry;

    fn name(&self) -> &'static str {
        "packages"
    }

    fn describe(&self, project: &Project) -> String {
        format!("project {} ({})", project.id, project.path)
    }

    async fn run(
        &self,
        project: Project,
        client: &Registry,
        worker: usize,
    ) -> Result<Emit<PackageEntry>> {
        let packages = paginate::enumerate(self.page_size, &self.cancel, |page| {
            client.list_packages(project.id, &self.query, page)
        })
        .await?;
        debug!(
            "[worker-{worker}] project {} has {} matching packages",
            project.id,
            packages.len()
        );

        let project = Arc::new(project);
        Ok(Emit::Many(
            packages
                .into_iter()
                .map(|package| PackageEntry {
                    project: Arc::clone(&project),
                    package,
                })
                .collect(),
        ))
    }
}

/// Counts each package's files and keeps packages whose count lies within
/// `files`, turning them into result rows.
pub struct CountFiles {
    pub files: Bounds<usize>,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Stage<Registry> for CountFiles {
    type Input = PackageEntry;
    type Output = PackageRow;

    fn name(&self) -> &'static str {
        "file-count"
    }

    fn describe(&self, entry: &PackageEntry) -> String {
        format!(
            "package {} ({}) of project {}",
            entry.package.id, entry.package.name, entry.project.id
        )
    }

    async fn run(
        &self,
        entry: PackageEntry,
        client: &Registry,
        _worker: usize,
    ) -> Result<Emit<PackageRow>> {
        let PackageEntry { project, package } = entry;
        let file_count = paginate::fetch_total(&self.cancel, &|page: Page| {
            client.list_package_files(project.id, package.id, page)
        })
        .await?;

        if !self.files.contains(file_count) {
            return Ok(Emit::Nothing);
        }

        Ok(Emit::One(PackageRow {
            project_id: project.id,
            project_name: project.name.clone(),
            project_access_level: project.access_level,
            project_url: project.web_url.clone(),
            package_id: package.id,
            package_name: package.name,
            package_version: package.version,
            package_url: package.web_url,
            file_count,
        }))
    }
}
