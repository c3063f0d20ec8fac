use std::fmt::Write;

use chrono::{DateTime, Utc};
use comfy_table::Cell;

use super::exports::csv_field;
use super::styling::{failure, failure_count, figure, heading, label, success};
use super::tables::{access_level_cell, create_table, format_size, header, status_cell};
use super::Report;
use crate::engine::FailureRecord;
use crate::model::{CleanReport, Package, PackageRow, PlanReport, Project, SearchReport};

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", heading(emoji), heading(title).underlined());
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Appends the failures section; nothing when every item succeeded.
fn render_failures(output: &mut String, failures: &[FailureRecord]) {
    if failures.is_empty() {
        return;
    }

    add_section_header(output, "⚠️", "Failures");
    let mut table = create_table();
    table.set_header(header(&["Stage", "Item", "Error"]));
    for record in failures {
        table.add_row(vec![
            Cell::new(&record.stage),
            Cell::new(&record.item),
            Cell::new(&record.error).fg(comfy_table::Color::Red),
        ]);
    }
    let _ = writeln!(output, "{table}\n");
}

fn render_count(output: &mut String, what: &str, count: usize, failures: usize) {
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n",
        label(what),
        figure(count),
        label("Failures:"),
        failure_count(failures)
    );
}

impl Report for SearchReport<Project> {
    fn summary(&self) -> String {
        let mut output = String::new();
        add_section_header(&mut output, "📁", "Projects");
        render_count(&mut output, "Projects matched:", self.total, self.failures.len());

        if !self.rows.is_empty() {
            let mut table = create_table();
            table.set_header(header(&["ID", "Project", "Access", "Storage", "Packages", "URL"]));
            for project in &self.rows {
                let stats = project.statistics.unwrap_or_default();
                table.add_row(vec![
                    Cell::new(project.id),
                    Cell::new(&project.path),
                    access_level_cell(project.access_level),
                    Cell::new(format_size(stats.storage_size)),
                    Cell::new(format_size(stats.package_size)),
                    Cell::new(&project.web_url),
                ]);
            }
            let _ = writeln!(output, "{table}\n");
        }

        render_failures(&mut output, &self.failures);
        output
    }

    fn csv_header() -> &'static str {
        "project_id,path,access_level,storage_size,package_size,web_url"
    }

    fn csv_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|project| {
                let stats = project.statistics.unwrap_or_default();
                format!(
                    "{},{},{},{},{},{}",
                    project.id,
                    csv_field(&project.path),
                    project.access_level,
                    stats.storage_size,
                    stats.package_size,
                    csv_field(&project.web_url)
                )
            })
            .collect()
    }
}

impl Report for SearchReport<PackageRow> {
    fn summary(&self) -> String {
        let mut output = String::new();
        add_section_header(&mut output, "📦", "Packages");
        render_count(&mut output, "Packages matched:", self.total, self.failures.len());

        if !self.rows.is_empty() {
            let mut table = create_table();
            table.set_header(header(&[
                "Target", "Project", "Access", "Package", "Version", "Files", "Link",
            ]));
            for row in &self.rows {
                table.add_row(vec![
                    Cell::new(row.target()),
                    Cell::new(&row.project_name),
                    access_level_cell(row.project_access_level),
                    Cell::new(&row.package_name),
                    Cell::new(&row.package_version),
                    Cell::new(row.file_count),
                    Cell::new(or_dash(row.package_url.as_deref())),
                ]);
            }
            let _ = writeln!(output, "{table}\n");
        }

        render_failures(&mut output, &self.failures);
        output
    }

    fn csv_header() -> &'static str {
        "project_id,project_name,access_level,package_id,package_name,version,file_count,package_url"
    }

    fn csv_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "{},{},{},{},{},{},{},{}",
                    row.project_id,
                    csv_field(&row.project_name),
                    row.project_access_level,
                    row.package_id,
                    csv_field(&row.package_name),
                    csv_field(&row.package_version),
                    row.file_count,
                    csv_field(or_dash(row.package_url.as_deref()))
                )
            })
            .collect()
    }
}

impl Report for SearchReport<Package> {
    fn summary(&self) -> String {
        let mut output = String::new();
        add_section_header(&mut output, "📦", "Packages");
        let _ = writeln!(
            output,
            "  {} {} of {}\n",
            label("Showing:"),
            figure(self.rows.len()),
            figure(self.total)
        );

        if !self.rows.is_empty() {
            let mut table = create_table();
            table.set_header(header(&["ID", "Name", "Version", "Type", "Created", "Link"]));
            for package in &self.rows {
                table.add_row(vec![
                    Cell::new(package.id),
                    Cell::new(&package.name),
                    Cell::new(&package.version),
                    Cell::new(&package.package_type),
                    Cell::new(format_date(package.created_at)),
                    Cell::new(or_dash(package.web_url.as_deref())),
                ]);
            }
            let _ = writeln!(output, "{table}\n");
        }

        output
    }

    fn csv_header() -> &'static str {
        "package_id,project_id,name,version,package_type,created_at,web_url"
    }

    fn csv_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|package| {
                format!(
                    "{},{},{},{},{},{},{}",
                    package.id,
                    package.project_id,
                    csv_field(&package.name),
                    csv_field(&package.version),
                    csv_field(&package.package_type),
                    package.created_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
                    csv_field(or_dash(package.web_url.as_deref()))
                )
            })
            .collect()
    }
}

impl Report for PlanReport {
    fn summary(&self) -> String {
        let mut output = String::new();
        add_section_header(&mut output, "🗂️", "Deletion plan (dry run)");

        let bytes: u64 = self.files.iter().map(|f| f.size).sum();
        let _ = writeln!(
            output,
            "  {} {}\n  {} {}\n",
            label("Files to delete:"),
            figure(self.files.len()),
            label("Space reclaimed:"),
            figure(format_size(bytes))
        );

        if !self.files.is_empty() {
            let mut files: Vec<_> = self.files.iter().collect();
            files.sort_by_key(|f| (f.project_id, f.package_id, f.created_at, f.id));

            let mut table = create_table();
            table.set_header(header(&["Target", "File ID", "Name", "Size", "Created"]));
            for file in files {
                table.add_row(vec![
                    Cell::new(format!("{}:{}", file.project_id, file.package_id)),
                    Cell::new(file.id),
                    Cell::new(&file.file_name),
                    Cell::new(format_size(file.size)),
                    Cell::new(format_date(file.created_at)),
                ]);
            }
            let _ = writeln!(output, "{table}\n");
        }

        render_failures(&mut output, &self.failures);
        output
    }

    fn csv_header() -> &'static str {
        "project_id,package_id,file_id,file_name,size,created_at"
    }

    fn csv_rows(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|file| {
                format!(
                    "{},{},{},{},{},{}",
                    file.project_id,
                    file.package_id,
                    file.id,
                    csv_field(&file.file_name),
                    file.size,
                    file.created_at.map(|d| d.to_rfc3339()).unwrap_or_default()
                )
            })
            .collect()
    }
}

impl Report for CleanReport {
    fn summary(&self) -> String {
        let mut output = String::new();
        add_section_header(&mut output, "🧹", "Clean");

        if self.cancelled {
            let _ = writeln!(
                output,
                "  {}\n",
                failure("Cancelled before every package was processed")
            );
        }
        let _ = writeln!(
            output,
            "  {} {}\n  {} {}\n  {} {}\n",
            label("Deleted:"),
            success(self.deleted()),
            label("Failed:"),
            failure_count(self.failed()),
            label("Packages not processed:"),
            self.failures.len()
        );

        if !self.outcomes.is_empty() {
            let mut outcomes: Vec<_> = self.outcomes.iter().collect();
            outcomes.sort_by_key(|o| (o.project_id, o.package_id, o.file_id));

            let mut table = create_table();
            table.set_header(header(&["Target", "File ID", "Status"]));
            for outcome in outcomes {
                table.add_row(vec![
                    Cell::new(format!("{}:{}", outcome.project_id, outcome.package_id)),
                    Cell::new(outcome.file_id),
                    status_cell(&outcome.status),
                ]);
            }
            let _ = writeln!(output, "{table}\n");
        }

        render_failures(&mut output, &self.failures);
        output
    }

    fn csv_header() -> &'static str {
        "project_id,package_id,file_id,status,error"
    }

    fn csv_rows(&self) -> Vec<String> {
        use crate::model::DeletionStatus;

        self.outcomes
            .iter()
            .map(|outcome| {
                let (status, error) = match &outcome.status {
                    DeletionStatus::Deleted => ("deleted", ""),
                    DeletionStatus::Failed { error } => ("failed", error.as_str()),
                };
                format!(
                    "{},{},{},{status},{}",
                    outcome.project_id,
                    outcome.package_id,
                    outcome.file_id,
                    csv_field(error)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeletionOutcome, DeletionStatus, PackageFile, ProjectStatistics};
    use chrono::TimeZone;

    fn outcome(file_id: u64, status: DeletionStatus) -> DeletionOutcome {
        DeletionOutcome {
            project_id: 2,
            package_id: 20,
            file_id,
            status,
        }
    }

    fn stage_failure() -> FailureRecord {
        FailureRecord {
            stage: "retention".to_string(),
            item: "package 2:21".to_string(),
            error: "GitLab API error (status 500): boom".to_string(),
        }
    }

    #[test]
    fn test_clean_summary_counts_and_failures() {
        let report = CleanReport {
            outcomes: vec![
                outcome(1, DeletionStatus::Deleted),
                outcome(
                    2,
                    DeletionStatus::Failed {
                        error: "403 Forbidden".to_string(),
                    },
                ),
            ],
            failures: vec![stage_failure()],
            cancelled: false,
        };

        let output = report.summary();

        assert!(output.contains("Deleted:"));
        assert!(output.contains("failed: 403 Forbidden"));
        assert!(output.contains("Failures"));
        assert!(output.contains("package 2:21"));
    }

    #[test]
    fn test_clean_summary_omits_empty_failures() {
        let report = CleanReport {
            outcomes: vec![outcome(1, DeletionStatus::Deleted)],
            failures: vec![],
            cancelled: false,
        };
        assert!(!report.summary().contains("Failures"));
    }

    #[test]
    fn test_clean_summary_flags_cancellation() {
        let report = CleanReport {
            outcomes: vec![outcome(1, DeletionStatus::Deleted)],
            failures: vec![],
            cancelled: true,
        };

        let output = report.summary();

        assert!(output.contains("Cancelled before every package was processed"));
        assert!(output.contains("2:20"));
    }

    #[test]
    fn test_clean_csv_rows() {
        let report = CleanReport {
            outcomes: vec![
                outcome(1, DeletionStatus::Deleted),
                outcome(
                    2,
                    DeletionStatus::Failed {
                        error: "denied, twice".to_string(),
                    },
                ),
            ],
            failures: vec![],
            cancelled: false,
        };

        assert_eq!(
            report.csv_rows(),
            vec![
                "2,20,1,deleted,".to_string(),
                "2,20,2,failed,\"denied, twice\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_plan_summary_reports_reclaimed_space() {
        let created = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let report = PlanReport {
            files: vec![PackageFile {
                id: 9,
                project_id: 2,
                package_id: 20,
                file_name: "ledger-1.0.jar".to_string(),
                size: 2048,
                created_at: Some(created),
            }],
            failures: vec![],
        };

        let output = report.summary();

        assert!(output.contains("2.0 KiB"));
        assert!(output.contains("ledger-1.0.jar"));
        assert!(output.contains("2024-01-03"));
    }

    #[test]
    fn test_package_row_summary_shows_targets() {
        let report = SearchReport {
            rows: vec![PackageRow {
                project_id: 2,
                project_name: "billing".to_string(),
                project_access_level: 40,
                project_url: "https://gitlab.test/fin/billing".to_string(),
                package_id: 20,
                package_name: "ledger".to_string(),
                package_version: "1.0.0".to_string(),
                package_url: Some("https://gitlab.test/fin/billing/-/packages/20".to_string()),
                file_count: 25,
            }],
            total: 1,
            failures: vec![],
        };

        let output = report.summary();

        assert!(output.contains("2:20"));
        assert!(output.contains("Maintainer"));
        assert!(output.contains("ledger"));
        assert!(output.contains("25"));
    }

    #[test]
    fn test_project_csv_rows() {
        let report = SearchReport {
            rows: vec![Project {
                id: 1,
                name: "app".to_string(),
                path: "group/app".to_string(),
                web_url: "https://gitlab.test/group/app".to_string(),
                access_level: 50,
                created_at: None,
                statistics: Some(ProjectStatistics {
                    storage_size: 4096,
                    repository_size: 1024,
                    package_size: 2048,
                }),
            }],
            total: 1,
            failures: vec![],
        };

        assert_eq!(
            report.csv_rows(),
            vec!["1,group/app,50,4096,2048,https://gitlab.test/group/app".to_string()]
        );
    }

    #[test]
    fn test_package_page_summary_shows_total() {
        let report: SearchReport<Package> = SearchReport {
            rows: vec![],
            total: 42,
            failures: vec![],
        };
        let output = report.summary();
        assert!(output.contains("42"));
    }
}
