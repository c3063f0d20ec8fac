use serde::Serialize;

use super::core::GitLabClient;
use crate::engine::paginate::{Listing, Page};
use crate::error::Result;
use crate::model::Project;
use crate::providers::gitlab::registry::ProjectQuery;
use crate::providers::gitlab::types::{ProjectResponse, UserResponse};

/// The user a token belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: u64,
    pub username: String,
}

impl GitLabClient {
    /// Returns the owner of the configured token; fails if the token is
    /// missing, expired or revoked.
    pub async fn current_user(&self) -> Result<CurrentUser> {
        let user: UserResponse = self.get_json(self.endpoint("user")?, &[]).await?;
        Ok(CurrentUser {
            id: user.id,
            username: user.username,
        })
    }

    /// Lists one page of projects visible to the caller.
    ///
    /// Results are ordered by ascending id so that consecutive pages stay
    /// stable while other projects are being created.
    pub async fn list_projects(&self, query: &ProjectQuery, page: Page) -> Result<Listing<Project>> {
        let mut params = vec![
            ("order_by", "id".to_string()),
            ("sort", "asc".to_string()),
        ];
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if let Some(level) = query.min_access_level {
            params.push(("min_access_level", level.to_string()));
        }

        let listing: Listing<ProjectResponse> = self
            .get_listing(self.endpoint("projects")?, &params, page)
            .await?;

        Ok(Listing {
            items: listing.items.into_iter().map(Project::from).collect(),
            total: listing.total,
        })
    }

    pub async fn project(&self, project_id: u64, with_statistics: bool) -> Result<Project> {
        let url = self.endpoint(&format!("projects/{project_id}"))?;
        let response: ProjectResponse = self
            .get_json(url, &[("statistics", with_statistics.to_string())])
            .await?;
        Ok(Project::from(response))
    }
}
