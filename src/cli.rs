use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::Config;
use crate::model::{PackageRef, PackageRow};
use crate::output::{write_report, OutputFormat, PhaseProgress, Report};
use crate::providers::gitlab::SortOrder;
use crate::sweep::{
    service, Bounds, PackagePage, PackageSearch, ProjectSearch, Session, SweepSettings,
};

#[derive(Parser)]
#[command(name = "pkgsweep")]
#[command(author, version, about = "GitLab package retention cleaner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pkgsweep.toml or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitLab base URL
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Concurrent workers per pipeline stage
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search projects or packages
    Search {
        #[command(subcommand)]
        target: SearchTarget,
    },

    /// List one page of a project's packages
    Packages {
        project_id: u64,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// created_at, name, version or type
        #[arg(long)]
        order_by: Option<String>,

        #[arg(long)]
        sort: Option<SortOrder>,
    },

    /// Delete all but the newest files of each selected package
    Clean {
        /// Package to clean, as PROJECT_ID:PACKAGE_ID (repeatable)
        #[arg(long = "target", value_name = "PROJECT:PACKAGE")]
        targets: Vec<PackageRef>,

        #[command(flatten)]
        filter: PackageFilter,

        /// Clean every package the search finds when no filter is given
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Newest files kept per package
        #[arg(short, long)]
        keep: Option<usize>,

        /// Only report which files would be deleted
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SearchTarget {
    /// Projects filtered by name and storage size
    Projects {
        #[arg(short, long)]
        name: Option<String>,

        /// Minimum storage size in bytes
        #[arg(long)]
        min_size: Option<u64>,

        /// Maximum storage size in bytes (0 means unbounded)
        #[arg(long)]
        max_size: Option<u64>,
    },

    /// Packages filtered by project, name and file count
    Packages {
        #[command(flatten)]
        filter: PackageFilter,
    },
}

#[derive(Args, Clone, Default)]
struct PackageFilter {
    /// Substring of the project name
    #[arg(long)]
    project: Option<String>,

    /// Substring of the package name
    #[arg(long)]
    package: Option<String>,

    #[arg(long)]
    min_files: Option<usize>,

    /// Maximum file count (0 means unbounded)
    #[arg(long)]
    max_files: Option<usize>,
}

impl PackageFilter {
    fn is_empty(&self) -> bool {
        self.project.is_none()
            && self.package.is_none()
            && self.min_files.is_none()
            && self.max_files.is_none()
    }

    fn to_search(&self) -> PackageSearch {
        PackageSearch {
            project: self.project.clone(),
            package: self.package.clone(),
            files: bounds(self.min_files, self.max_files),
        }
    }
}

/// Range from optional limits, where an upper limit of zero is open.
fn bounds<T>(min: Option<T>, max: Option<T>) -> Bounds<T>
where
    T: PartialOrd + Copy + Default,
{
    let max = max.filter(|m| *m != T::default());
    Bounds::new(min, max)
}

impl Cli {
    fn settings(&self, config: &Config) -> Result<SweepSettings> {
        let mut settings = SweepSettings::from(config);
        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("--workers must be at least 1");
            }
            settings.workers = workers;
        }
        if let Commands::Clean {
            keep: Some(keep), ..
        } = &self.command
        {
            settings.keep = *keep;
        }
        Ok(settings)
    }

    async fn connect(&self) -> Result<Session> {
        let config = Config::load(self.config.as_deref())?;
        let settings = self.settings(&config)?;

        let url = self.url.as_deref().unwrap_or(&config.gitlab.base_url);
        let token = self
            .token
            .clone()
            .or_else(|| config.gitlab.token.clone())
            .map(Token::from);

        let session = Session::connect(url, token, settings)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        let cancel = session.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling running pipelines");
                cancel.cancel();
            }
        });

        Ok(session)
    }

    fn emit<R: Report>(&self, report: &R) -> Result<()> {
        if let Some(output_path) = &self.output {
            let mut file = std::fs::File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            write_report(report, self.format, self.pretty, &mut file)?;
            info!("Report written to: {}", output_path.display());
        } else {
            let stdout = std::io::stdout();
            write_report(report, self.format, self.pretty, &mut stdout.lock())?;
        }
        Ok(())
    }

    async fn execute_search(&self, session: &Session, target: &SearchTarget) -> Result<()> {
        match target {
            SearchTarget::Projects {
                name,
                min_size,
                max_size,
            } => {
                let progress = PhaseProgress::start(1, "Searching projects");
                let search = ProjectSearch {
                    name: name.clone(),
                    size: bounds(*min_size, *max_size),
                };
                let report = match service::search_projects(session, &search).await {
                    Ok(report) => report,
                    Err(e) => {
                        progress.fail("Project search failed");
                        return Err(e.into());
                    }
                };
                progress.finish(&format!("Found {} projects", report.total));
                self.emit(&report)
            }
            SearchTarget::Packages { filter } => {
                let progress = PhaseProgress::start(1, "Searching packages");
                let report = match service::search_packages(session, &filter.to_search()).await {
                    Ok(report) => report,
                    Err(e) => {
                        progress.fail("Package search failed");
                        return Err(e.into());
                    }
                };
                progress.finish(&format!("Found {} packages", report.total));
                self.emit(&report)
            }
        }
    }

    async fn execute_clean(
        &self,
        session: &Session,
        targets: &[PackageRef],
        filter: &PackageFilter,
        all: bool,
        dry_run: bool,
    ) -> Result<()> {
        if targets.is_empty() && filter.is_empty() && !all {
            bail!("Refusing to clean every package: pass --target, a search filter, or --all");
        }

        let phases = if targets.is_empty() { 2 } else { 1 };
        let verb = if dry_run { "Planning deletions" } else { "Deleting old files" };

        let (progress, targets) = if targets.is_empty() {
            let progress = PhaseProgress::start(phases, "Searching packages");
            let found = match service::search_packages(session, &filter.to_search()).await {
                Ok(found) => found,
                Err(e) => {
                    progress.fail("Package search failed");
                    return Err(e.into());
                }
            };
            if !found.failures.is_empty() {
                warn!(
                    "{} projects or packages could not be searched and will not be cleaned",
                    found.failures.len()
                );
            }
            let targets: Vec<PackageRef> = found.rows.iter().map(PackageRow::target).collect();
            let progress = progress.advance(&format!("Found {} packages", targets.len()), verb);
            (progress, targets)
        } else {
            (PhaseProgress::start(phases, verb), targets.to_vec())
        };

        info!(
            "{} {} packages, keeping the newest {} files of each",
            if dry_run { "Planning" } else { "Cleaning" },
            targets.len(),
            session.settings().keep
        );

        if dry_run {
            let report = match service::plan(session, &targets).await {
                Ok(report) => report,
                Err(e) => {
                    progress.fail("Planning failed");
                    return Err(e.into());
                }
            };
            progress.finish(&format!("{} files would be deleted", report.files.len()));
            return self.emit(&report);
        }

        let report = match service::clean(session, &targets).await {
            Ok(report) => report,
            Err(e) => {
                progress.fail("Clean failed");
                return Err(e.into());
            }
        };
        if report.cancelled {
            progress.fail(&format!("Cancelled after deleting {} files", report.deleted()));
        } else {
            progress.finish(&format!("Deleted {} files", report.deleted()));
        }
        self.emit(&report)?;

        if report.cancelled {
            bail!(
                "Clean was cancelled after {} deletions; rerun it to finish the remaining packages",
                report.deleted()
            );
        }
        if !report.is_clean() {
            bail!(
                "{} deletions failed and {} packages could not be processed",
                report.failed(),
                report.failures.len()
            );
        }
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let session = self.connect().await?;
        if let Some(user) = session.user() {
            info!("Running as {} (id {})", user.username, user.id);
        }

        match &self.command {
            Commands::Search { target } => self.execute_search(&session, target).await,
            Commands::Packages {
                project_id,
                limit,
                offset,
                order_by,
                sort,
            } => {
                let window = PackagePage {
                    limit: *limit,
                    offset: *offset,
                    order_by: order_by.clone(),
                    sort: *sort,
                };
                let report = service::project_packages(&session, *project_id, &window).await?;
                self.emit(&report)
            }
            Commands::Clean {
                targets,
                filter,
                all,
                dry_run,
                ..
            } => {
                self.execute_clean(&session, targets, filter, *all, *dry_run)
                    .await
            }
        }
    }
}
