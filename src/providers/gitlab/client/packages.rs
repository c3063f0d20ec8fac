use super::core::GitLabClient;
use crate::engine::paginate::{Listing, Page};
use crate::error::Result;
use crate::model::{Package, PackageFile};
use crate::providers::gitlab::links::package_url;
use crate::providers::gitlab::registry::PackageQuery;
use crate::providers::gitlab::types::{PackageFileResponse, PackageResponse};

impl GitLabClient {
    pub async fn list_packages(
        &self,
        project_id: u64,
        query: &PackageQuery,
        page: Page,
    ) -> Result<Listing<Package>> {
        let mut params = Vec::new();
        if let Some(name) = query.name.as_deref().filter(|s| !s.is_empty()) {
            params.push(("package_name", name.to_string()));
        }
        if let Some(order_by) = query.order_by.as_deref().filter(|s| !s.is_empty()) {
            params.push(("order_by", order_by.to_string()));
        }
        if let Some(sort) = query.sort {
            params.push(("sort", sort.to_string()));
        }

        let url = self.endpoint(&format!("projects/{project_id}/packages"))?;
        let listing: Listing<PackageResponse> = self.get_listing(url, &params, page).await?;

        let items = listing
            .items
            .into_iter()
            .map(|package| {
                let web_url = package
                    .web_path()
                    .map(|path| package_url(self.web_url(), path));
                package.into_package(project_id, web_url)
            })
            .collect();

        Ok(Listing {
            items,
            total: listing.total,
        })
    }

    pub async fn list_package_files(
        &self,
        project_id: u64,
        package_id: u64,
        page: Page,
    ) -> Result<Listing<PackageFile>> {
        let url = self.endpoint(&format!(
            "projects/{project_id}/packages/{package_id}/package_files"
        ))?;
        let listing: Listing<PackageFileResponse> = self.get_listing(url, &[], page).await?;

        Ok(Listing {
            items: listing
                .items
                .into_iter()
                .map(|file| file.into_file(project_id, package_id))
                .collect(),
            total: listing.total,
        })
    }

    pub async fn delete_package_file(
        &self,
        project_id: u64,
        package_id: u64,
        file_id: u64,
    ) -> Result<()> {
        let url = self.endpoint(&format!(
            "projects/{project_id}/packages/{package_id}/package_files/{file_id}"
        ))?;
        self.delete(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SweepError;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_list_packages_builds_links() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/5/packages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("package_name".into(), "core".into()),
                Matcher::UrlEncoded("sort".into(), "desc".into()),
            ]))
            .with_status(200)
            .with_header("x-total", "1")
            .with_body(
                r#"[{"id": 70, "name": "core", "version": "1.2.0", "package_type": "maven",
                     "created_at": "2024-03-01T00:00:00Z",
                     "_links": {"web_path": "/fin/billing/-/packages/70"}}]"#,
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let query = PackageQuery {
            name: Some("core".to_string()),
            order_by: None,
            sort: Some(crate::providers::gitlab::SortOrder::Desc),
        };
        let listing = client.list_packages(5, &query, Page::new(1, 20)).await.unwrap();
        let package = &listing.items[0];

        assert_eq!(package.project_id, 5);
        assert_eq!(package.version, "1.2.0");
        assert_eq!(
            package.web_url.as_deref(),
            Some(format!("{}/fin/billing/-/packages/70", server.url()).as_str())
        );
    }

    #[tokio::test]
    async fn test_list_package_files_tags_parents() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v4/projects/5/packages/70/package_files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("x-total", "2")
            .with_body(
                r#"[{"id": 1, "file_name": "a.jar", "size": 10, "created_at": "2024-03-01T00:00:00Z"},
                    {"id": 2, "file_name": "a.pom", "size": 1, "created_at": "2024-03-02T00:00:00Z"}]"#,
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        let listing = client.list_package_files(5, 70, Page::new(1, 100)).await.unwrap();

        assert_eq!(listing.total, 2);
        assert!(listing
            .items
            .iter()
            .all(|f| f.project_id == 5 && f.package_id == 70 && f.created_at.is_some()));
    }

    #[tokio::test]
    async fn test_delete_package_file() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("DELETE", "/api/v4/projects/5/packages/70/package_files/1")
            .with_status(204)
            .create_async()
            .await;
        let _forbidden = server
            .mock("DELETE", "/api/v4/projects/5/packages/70/package_files/2")
            .with_status(403)
            .with_body(r#"{"message":"403 Forbidden"}"#)
            .create_async()
            .await;

        let client = GitLabClient::new(&server.url(), None).unwrap();
        client.delete_package_file(5, 70, 1).await.unwrap();
        let denied = client.delete_package_file(5, 70, 2).await;

        assert!(matches!(denied, Err(SweepError::Api { status: 403, .. })));
        ok.assert_async().await;
    }
}
