use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use super::client::GitLabClient;
use crate::engine::paginate::{Listing, Page};
use crate::error::Result;
use crate::model::{Package, PackageFile, Project};

/// Filters for the project listing.
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    /// Substring matched against project names
    pub search: Option<String>,
    /// Only projects where the caller has at least this access level
    pub min_access_level: Option<u8>,
}

/// Filters and ordering for a project's package listing.
#[derive(Debug, Clone, Default)]
pub struct PackageQuery {
    /// Substring matched against package names
    pub name: Option<String>,
    /// `created_at`, `name`, `version` or `type`
    pub order_by: Option<String>,
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("sort order must be 'asc' or 'desc', got '{other}'")),
        }
    }
}

/// The remote package registry as seen by the sweep stages.
///
/// Implementations must be safe for concurrent use: every worker of every
/// stage calls through the same shared handle.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn list_projects(&self, query: &ProjectQuery, page: Page) -> Result<Listing<Project>>;

    async fn list_packages(
        &self,
        project_id: u64,
        query: &PackageQuery,
        page: Page,
    ) -> Result<Listing<Package>>;

    async fn list_package_files(
        &self,
        project_id: u64,
        package_id: u64,
        page: Page,
    ) -> Result<Listing<PackageFile>>;

    async fn delete_package_file(&self, project_id: u64, package_id: u64, file_id: u64) -> Result<()>;

    async fn project(&self, project_id: u64, with_statistics: bool) -> Result<Project>;
}

#[async_trait]
impl PackageRegistry for GitLabClient {
    async fn list_projects(&self, query: &ProjectQuery, page: Page) -> Result<Listing<Project>> {
        GitLabClient::list_projects(self, query, page).await
    }

    async fn list_packages(
        &self,
        project_id: u64,
        query: &PackageQuery,
        page: Page,
    ) -> Result<Listing<Package>> {
        GitLabClient::list_packages(self, project_id, query, page).await
    }

    async fn list_package_files(
        &self,
        project_id: u64,
        package_id: u64,
        page: Page,
    ) -> Result<Listing<PackageFile>> {
        GitLabClient::list_package_files(self, project_id, package_id, page).await
    }

    async fn delete_package_file(&self, project_id: u64, package_id: u64, file_id: u64) -> Result<()> {
        GitLabClient::delete_package_file(self, project_id, package_id, file_id).await
    }

    async fn project(&self, project_id: u64, with_statistics: bool) -> Result<Project> {
        GitLabClient::project(self, project_id, with_statistics).await
    }
}
