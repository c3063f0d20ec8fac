//! In-memory package registry for exercising pipelines without a server.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::engine::paginate::{Listing, Page};
use crate::error::{Result, SweepError};
use crate::model::{Package, PackageFile, Project, ProjectStatistics};
use crate::providers::gitlab::{PackageQuery, PackageRegistry, ProjectQuery};

#[derive(Default)]
struct State {
    projects: Vec<Project>,
    packages: BTreeMap<u64, Vec<Package>>,
    files: BTreeMap<(u64, u64), Vec<PackageFile>>,
}

#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
    failing_deletes: Mutex<HashSet<u64>>,
    failing_package_listings: Mutex<HashSet<u64>>,
    delete_delay: Option<std::time::Duration>,
    pub deletes: AtomicUsize,
    pub file_listings: AtomicUsize,
}

/// Midnight UTC on the given day of January 2024.
pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i64::from(n) - 1)
}

pub fn project(id: u64, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
        path: format!("group/{name}"),
        web_url: format!("https://gitlab.test/group/{name}"),
        access_level: 40,
        created_at: Some(day(1)),
        statistics: None,
    }
}

pub fn package(id: u64, project_id: u64, name: &str) -> Package {
    Package {
        id,
        project_id,
        name: name.to_string(),
        version: "1.0.0".to_string(),
        package_type: "generic".to_string(),
        web_url: None,
        created_at: Some(day(1)),
    }
}

pub fn file(id: u64, project_id: u64, package_id: u64, created: Option<DateTime<Utc>>) -> PackageFile {
    PackageFile {
        id,
        project_id,
        package_id,
        file_name: format!("artifact-{id}.tar.gz"),
        size: 1024,
        created_at: created,
    }
}

fn paged<T: Clone>(items: &[T], page: Page) -> Listing<T> {
    let start = ((page.number - 1) * page.size).min(items.len());
    let end = (start + page.size).min(items.len());
    Listing {
        items: items[start..end].to_vec(),
        total: items.len(),
    }
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, project: Project) -> Self {
        self.state.lock().unwrap().projects.push(project);
        self
    }

    pub fn with_statistics(self, project_id: u64, storage_size: u64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(project) = state.projects.iter_mut().find(|p| p.id == project_id) {
                project.statistics = Some(ProjectStatistics {
                    storage_size,
                    ..ProjectStatistics::default()
                });
            }
        }
        self
    }

    pub fn with_package(self, package: Package) -> Self {
        self.state
            .lock()
            .unwrap()
            .packages
            .entry(package.project_id)
            .or_default()
            .push(package);
        self
    }

    /// Adds `count` files to a package, created on days `1..=count`, with
    /// ids `first_id..first_id + count`.
    pub fn with_files(self, project_id: u64, package_id: u64, first_id: u64, count: u32) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let files = state.files.entry((project_id, package_id)).or_default();
            for n in 1..=count {
                files.push(file(first_id + u64::from(n) - 1, project_id, package_id, Some(day(n))));
            }
        }
        self
    }

    pub fn with_file(self, file: PackageFile) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .entry((file.project_id, file.package_id))
            .or_default()
            .push(file);
        self
    }

    pub fn fail_delete(self, file_id: u64) -> Self {
        self.failing_deletes.lock().unwrap().insert(file_id);
        self
    }

    /// Makes every delete take `delay` before it lands.
    pub fn with_delete_delay(mut self, delay: std::time::Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    pub fn fail_package_listing(self, project_id: u64) -> Self {
        self.failing_package_listings.lock().unwrap().insert(project_id);
        self
    }

    pub fn remaining_files(&self, project_id: u64, package_id: u64) -> Vec<PackageFile> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(project_id, package_id))
            .cloned()
            .unwrap_or_default()
    }
}

fn not_found(what: &str) -> SweepError {
    SweepError::Api {
        status: 404,
        message: format!("404 {what} Not Found"),
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn list_projects(&self, query: &ProjectQuery, page: Page) -> Result<Listing<Project>> {
        let state = self.state.lock().unwrap();
        let matching: Vec<Project> = state
            .projects
            .iter()
            .filter(|p| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |s| p.name.to_lowercase().contains(&s.to_lowercase()))
            })
            .filter(|p| query.min_access_level.map_or(true, |min| p.access_level >= min))
            .cloned()
            .collect();
        Ok(paged(&matching, page))
    }

    async fn list_packages(
        &self,
        project_id: u64,
        query: &PackageQuery,
        page: Page,
    ) -> Result<Listing<Package>> {
        if self.failing_package_listings.lock().unwrap().contains(&project_id) {
            return Err(SweepError::Api {
                status: 500,
                message: "500 Internal Server Error".to_string(),
            });
        }
        let state = self.state.lock().unwrap();
        let matching: Vec<Package> = state
            .packages
            .get(&project_id)
            .into_iter()
            .flatten()
            .filter(|p| query.name.as_deref().map_or(true, |n| p.name.contains(n)))
            .cloned()
            .collect();
        Ok(paged(&matching, page))
    }

    async fn list_package_files(
        &self,
        project_id: u64,
        package_id: u64,
        page: Page,
    ) -> Result<Listing<PackageFile>> {
        self.file_listings.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let files = state
            .files
            .get(&(project_id, package_id))
            .cloned()
            .unwrap_or_default();
        Ok(paged(&files, page))
    }

    async fn delete_package_file(&self, project_id: u64, package_id: u64, file_id: u64) -> Result<()> {
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.failing_deletes.lock().unwrap().contains(&file_id) {
            return Err(SweepError::Api {
                status: 403,
                message: "403 Forbidden".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let files = state
            .files
            .get_mut(&(project_id, package_id))
            .ok_or_else(|| not_found("Package"))?;
        let before = files.len();
        files.retain(|f| f.id != file_id);
        if files.len() == before {
            return Err(not_found("Package file"));
        }
        Ok(())
    }

    async fn project(&self, project_id: u64, _with_statistics: bool) -> Result<Project> {
        self.state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| not_found("Project"))
    }
}
