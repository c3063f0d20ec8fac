use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::FailureRecord;

/// A GitLab project the caller can manage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// Full path of the owning namespace plus project (e.g. "group/project")
    pub path: String,
    pub web_url: String,
    /// Highest of the project and group access levels granted to the caller
    pub access_level: u8,
    pub created_at: Option<DateTime<Utc>>,
    /// Present only when the project was fetched with statistics
    pub statistics: Option<ProjectStatistics>,
}

/// Storage usage of a project, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatistics {
    #[serde(default)]
    pub storage_size: u64,
    #[serde(default)]
    pub repository_size: u64,
    #[serde(default)]
    pub package_size: u64,
}

/// A package in a project's package registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    pub version: String,
    pub package_type: String,
    pub web_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A single file of a package; the unit of deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub id: u64,
    pub project_id: u64,
    pub package_id: u64,
    pub file_name: String,
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// One search result row: a package together with its owning project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRow {
    pub project_id: u64,
    pub project_name: String,
    pub project_access_level: u8,
    pub project_url: String,
    pub package_id: u64,
    pub package_name: String,
    pub package_version: String,
    pub package_url: Option<String>,
    pub file_count: usize,
}

impl PackageRow {
    pub fn target(&self) -> PackageRef {
        PackageRef {
            project_id: self.project_id,
            package_id: self.package_id,
        }
    }
}

/// Identifies a package to clean, written `project_id:package_id` on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub project_id: u64,
    pub package_id: u64,
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.package_id)
    }
}

impl FromStr for PackageRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, package) = s
            .split_once(':')
            .ok_or_else(|| format!("expected PROJECT_ID:PACKAGE_ID, got '{s}'"))?;
        let project_id = project
            .trim()
            .parse()
            .map_err(|e| format!("invalid project id '{project}': {e}"))?;
        let package_id = package
            .trim()
            .parse()
            .map_err(|e| format!("invalid package id '{package}': {e}"))?;
        Ok(Self {
            project_id,
            package_id,
        })
    }
}

/// Result of one delete call. Failures are recorded here rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub project_id: u64,
    pub package_id: u64,
    pub file_id: u64,
    #[serde(flatten)]
    pub status: DeletionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeletionStatus {
    Deleted,
    Failed { error: String },
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self.status, DeletionStatus::Deleted)
    }
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.project_id, self.package_id, self.file_id)?;
        match &self.status {
            DeletionStatus::Deleted => write!(f, " deleted"),
            DeletionStatus::Failed { error } => write!(f, " Error: {error}"),
        }
    }
}

/// Rows returned by a search, with the total reported for them.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport<T> {
    pub rows: Vec<T>,
    pub total: usize,
    pub failures: Vec<FailureRecord>,
}

/// Files selected for deletion without deleting them.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub files: Vec<PackageFile>,
    pub failures: Vec<FailureRecord>,
}

/// Outcome of a clean run. Partial success shows up as a mix of deleted
/// and failed outcomes, or as package-level failures.
///
/// A cancelled run still lists every deletion that completed before it
/// stopped.
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub outcomes: Vec<DeletionOutcome>,
    pub failures: Vec<FailureRecord>,
    pub cancelled: bool,
}

impl CleanReport {
    pub fn deleted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_deleted()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.deleted()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.failures.is_empty() && !self.cancelled
    }
}
