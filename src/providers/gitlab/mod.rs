mod client;
mod links;
mod registry;
mod types;

pub use client::{CurrentUser, GitLabClient, MAX_PAGE_SIZE};
pub use registry::{PackageQuery, PackageRegistry, ProjectQuery, SortOrder};
