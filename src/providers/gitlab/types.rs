//! Wire representations of GitLab REST responses.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{Package, PackageFile, Project, ProjectStatistics};

#[derive(Debug, Deserialize)]
pub struct ProjectResponse {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    pub web_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub permissions: Option<Permissions>,
    pub statistics: Option<ProjectStatistics>,
}

#[derive(Debug, Deserialize)]
pub struct Permissions {
    pub project_access: Option<AccessGrant>,
    pub group_access: Option<AccessGrant>,
}

#[derive(Debug, Deserialize)]
pub struct AccessGrant {
    pub access_level: u8,
}

impl ProjectResponse {
    /// Highest access level granted through the project or its group.
    pub fn access_level(&self) -> u8 {
        self.permissions.as_ref().map_or(0, |permissions| {
            [&permissions.project_access, &permissions.group_access]
                .into_iter()
                .flatten()
                .map(|grant| grant.access_level)
                .max()
                .unwrap_or(0)
        })
    }
}

impl From<ProjectResponse> for Project {
    fn from(response: ProjectResponse) -> Self {
        Self {
            access_level: response.access_level(),
            id: response.id,
            name: response.name,
            path: response.path_with_namespace,
            web_url: response.web_url,
            created_at: response.created_at,
            statistics: response.statistics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PackageResponse {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub package_type: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "_links")]
    pub links: Option<PackageLinks>,
}

#[derive(Debug, Deserialize)]
pub struct PackageLinks {
    pub web_path: Option<String>,
}

impl PackageResponse {
    pub fn web_path(&self) -> Option<&str> {
        self.links.as_ref().and_then(|links| links.web_path.as_deref())
    }

    pub fn into_package(self, project_id: u64, web_url: Option<String>) -> Package {
        Package {
            id: self.id,
            project_id,
            name: self.name,
            version: self.version,
            package_type: self.package_type,
            web_url,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PackageFileResponse {
    pub id: u64,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
}

impl PackageFileResponse {
    pub fn into_file(self, project_id: u64, package_id: u64) -> PackageFile {
        PackageFile {
            id: self.id,
            project_id,
            package_id,
            file_name: self.file_name,
            size: self.size,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_takes_highest_grant() {
        let response: ProjectResponse = serde_json::from_str(
            r#"{
                "id": 1,
                "name": "app",
                "path_with_namespace": "team/app",
                "web_url": "https://gitlab.com/team/app",
                "created_at": "2024-01-02T03:04:05Z",
                "permissions": {
                    "project_access": {"access_level": 30},
                    "group_access": {"access_level": 50}
                }
            }"#,
        )
        .unwrap();

        let project = Project::from(response);
        assert_eq!(project.access_level, 50);
        assert_eq!(project.path, "team/app");
        assert!(project.statistics.is_none());
    }

    #[test]
    fn test_access_level_without_permissions_is_zero() {
        let response: ProjectResponse = serde_json::from_str(
            r#"{"id": 1, "name": "app", "path_with_namespace": "a/app", "web_url": "u",
                "permissions": {"project_access": null, "group_access": null}}"#,
        )
        .unwrap();
        assert_eq!(response.access_level(), 0);
    }

    #[test]
    fn test_package_file_keeps_missing_timestamp() {
        let response: PackageFileResponse =
            serde_json::from_str(r#"{"id": 9, "file_name": "a.jar", "size": 10}"#).unwrap();
        let file = response.into_file(1, 2);
        assert_eq!(file.package_id, 2);
        assert!(file.created_at.is_none());
    }
}
