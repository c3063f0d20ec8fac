//! Entry points the CLI drives. Each one builds a pipeline against the
//! session's registry, runs it to completion and folds the result into a
//! report.

use std::collections::HashSet;
use std::sync::Arc;

use log::info;

use super::deletion::DeleteFiles;
use super::retention::PlanRetention;
use super::stages::{AttachStatistics, Bounds, CountFiles, ExpandPackages};
use super::session::Session;
use super::Registry;
use crate::engine::paginate::{self, Page};
use crate::engine::{collect, FailureRecord, Pipeline, StageFailure};
use crate::error::{Result, SweepError};
use crate::model::{
    CleanReport, Package, PackageRef, PackageRow, PlanReport, Project, SearchReport,
};
use crate::providers::gitlab::{PackageQuery, ProjectQuery, SortOrder, MAX_PAGE_SIZE};

/// Filters for a project search.
#[derive(Debug, Clone, Default)]
pub struct ProjectSearch {
    pub name: Option<String>,
    /// Storage size range in bytes
    pub size: Bounds<u64>,
}

/// Filters for a package search across projects.
#[derive(Debug, Clone, Default)]
pub struct PackageSearch {
    /// Substring matched against project names
    pub project: Option<String>,
    /// Substring matched against package names
    pub package: Option<String>,
    /// Range of file counts a package must have
    pub files: Bounds<usize>,
}

/// Offset based window into one project's packages.
#[derive(Debug, Clone)]
pub struct PackagePage {
    pub limit: usize,
    pub offset: usize,
    pub order_by: Option<String>,
    pub sort: Option<SortOrder>,
}

impl Default for PackagePage {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            order_by: None,
            sort: None,
        }
    }
}

impl PackagePage {
    /// The listing page this window starts on. Offsets are rounded down to
    /// a page boundary.
    fn page(&self) -> Page {
        let limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        Page::new(self.offset / limit + 1, limit)
    }
}

fn records(failures: &[StageFailure]) -> Vec<FailureRecord> {
    failures.iter().map(FailureRecord::from).collect()
}

/// Starts a pipeline seeded with every project visible under `query`.
fn seed_projects(session: &Session, query: ProjectQuery) -> Pipeline<Registry, Project> {
    let registry = Arc::clone(session.registry());
    let settings = *session.settings();

    Pipeline::seed(
        Arc::clone(session.registry()),
        settings.workers,
        session.cancel_token(),
        move |tx, cancel| async move {
            let seeded = paginate::seed(settings.page_size, &cancel, &tx, |page| {
                registry.list_projects(&query, page)
            })
            .await?;
            info!("Seeded {seeded} projects");
            Ok::<(), SweepError>(())
        },
    )
}

/// Starts a pipeline seeded with each distinct target, in first-seen order.
fn seed_targets(session: &Session, targets: &[PackageRef]) -> Pipeline<Registry, PackageRef> {
    let mut seen = HashSet::new();
    let targets: Vec<PackageRef> = targets
        .iter()
        .copied()
        .filter(|target| seen.insert(*target))
        .collect();

    Pipeline::seed(
        Arc::clone(session.registry()),
        session.settings().workers,
        session.cancel_token(),
        move |tx, _cancel| async move {
            for target in targets {
                tx.send(target).await.map_err(|_| SweepError::StreamClosed)?;
            }
            Ok::<(), SweepError>(())
        },
    )
}

fn project_query(session: &Session, name: Option<String>) -> ProjectQuery {
    ProjectQuery {
        search: name,
        min_access_level: Some(session.settings().min_access_level),
    }
}

/// Projects matching `search`, each carrying its storage statistics.
pub async fn search_projects(session: &Session, search: &ProjectSearch) -> Result<SearchReport<Project>> {
    let query = project_query(session, search.name.clone());
    let drained = seed_projects(session, query)
        .stage(AttachStatistics { size: search.size })
        .drain();

    let collected = collect(drained).await?.complete()?;
    info!(
        "Project search matched {} projects ({} failures)",
        collected.items.len(),
        collected.failures.len()
    );

    Ok(SearchReport {
        total: collected.items.len(),
        failures: records(&collected.failures),
        rows: collected.items,
    })
}

/// Packages of matching projects whose file count lies in `search.files`.
pub async fn search_packages(
    session: &Session,
    search: &PackageSearch,
) -> Result<SearchReport<PackageRow>> {
    let settings = session.settings();
    let query = project_query(session, search.project.clone());

    let drained = seed_projects(session, query)
        .stage(ExpandPackages {
            query: PackageQuery {
                name: search.package.clone(),
                ..PackageQuery::default()
            },
            page_size: settings.page_size,
            cancel: session.cancel_token(),
        })
        .stage(CountFiles {
            files: search.files,
            cancel: session.cancel_token(),
        })
        .drain();

    let collected = collect(drained).await?.complete()?;
    info!(
        "Package search matched {} packages ({} failures)",
        collected.items.len(),
        collected.failures.len()
    );

    Ok(SearchReport {
        total: collected.items.len(),
        failures: records(&collected.failures),
        rows: collected.items,
    })
}

/// One page of a single project's packages, with the total the server
/// reports for the whole listing.
pub async fn project_packages(
    session: &Session,
    project_id: u64,
    window: &PackagePage,
) -> Result<SearchReport<Package>> {
    let query = PackageQuery {
        name: None,
        order_by: window.order_by.clone(),
        sort: window.sort,
    };
    let cancel = session.cancel_token();

    let listing = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SweepError::Cancelled),
        listing = session.registry().list_packages(project_id, &query, window.page()) => listing?,
    };

    Ok(SearchReport {
        rows: listing.items,
        total: listing.total,
        failures: Vec::new(),
    })
}

/// Files the retention policy would delete from `targets`, without deleting
/// anything.
pub async fn plan(session: &Session, targets: &[PackageRef]) -> Result<PlanReport> {
    let settings = session.settings();
    let drained = seed_targets(session, targets)
        .stage(PlanRetention {
            keep: settings.keep,
            page_size: settings.page_size,
            cancel: session.cancel_token(),
        })
        .drain();

    let collected = collect(drained).await?.complete()?;
    info!("{} files selected for deletion", collected.items.len());

    Ok(PlanReport {
        failures: records(&collected.failures),
        files: collected.items,
    })
}

/// Deletes every file outside the retention window of each target package.
///
/// Packages at or below the retention count are left untouched, so running
/// this again right after a successful run deletes nothing.
///
/// Cancellation is not an error: deletes already under way finish, and the
/// report lists them with `cancelled` set.
pub async fn clean(session: &Session, targets: &[PackageRef]) -> Result<CleanReport> {
    let settings = session.settings();
    let drained = seed_targets(session, targets)
        .stage(PlanRetention {
            keep: settings.keep,
            page_size: settings.page_size,
            cancel: session.cancel_token(),
        })
        .stage(DeleteFiles)
        .drain();

    let collected = collect(drained).await?;
    let report = CleanReport {
        failures: records(&collected.failures),
        outcomes: collected.items,
        cancelled: collected.cancelled,
    };
    info!(
        "Clean finished: {} deleted, {} failed, {} packages not processed",
        report.deleted(),
        report.failed(),
        report.failures.len()
    );

    Ok(report)
}
