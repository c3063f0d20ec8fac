mod core;
mod packages;
mod projects;

pub use self::core::{GitLabClient, MAX_PAGE_SIZE};
pub use self::projects::CurrentUser;
