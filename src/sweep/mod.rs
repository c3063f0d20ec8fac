//! Package retention sweeps: searches over projects and packages, and the
//! plan/clean pipelines that prune old package files.

pub mod deletion;
pub mod retention;
pub mod service;
pub mod session;
pub mod stages;

use crate::providers::gitlab::PackageRegistry;

/// The registry handle every stage runs against.
pub type Registry = dyn PackageRegistry;

pub use service::{PackagePage, PackageSearch, ProjectSearch};
pub use session::{Session, SweepSettings};
pub use stages::Bounds;
