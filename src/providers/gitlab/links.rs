use url::Url;

/// Converts a package `web_path` from the API into a clickable URL.
///
/// GitLab reports `web_path` relative to the host, including any relative
/// root the instance is served under (e.g. `/gitlab/group/app/-/packages/7`).
/// Older instances omit the relative root, so it is only added when missing.
///
/// # Arguments
///
/// * `web_url` - Instance web root (e.g., <https://example.com/gitlab/>)
/// * `web_path` - Package web path reported by the API
pub fn package_url(web_url: &Url, web_path: &str) -> String {
    let origin = web_url.origin().ascii_serialization();
    let root = web_url.path().trim_end_matches('/');
    let path = if web_path.starts_with('/') {
        web_path.to_string()
    } else {
        format!("/{web_path}")
    };

    if root.is_empty() || path.starts_with(&format!("{root}/")) {
        format!("{origin}{path}")
    } else {
        format!("{origin}{root}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url_plain_host() {
        let web = Url::parse("https://gitlab.com/").unwrap();
        assert_eq!(
            package_url(&web, "/group/app/-/packages/7"),
            "https://gitlab.com/group/app/-/packages/7"
        );
    }

    #[test]
    fn test_package_url_relative_root_already_present() {
        let web = Url::parse("https://example.com/gitlab/").unwrap();
        assert_eq!(
            package_url(&web, "/gitlab/group/app/-/packages/7"),
            "https://example.com/gitlab/group/app/-/packages/7"
        );
    }

    #[test]
    fn test_package_url_relative_root_missing() {
        let web = Url::parse("https://example.com/gitlab/").unwrap();
        assert_eq!(
            package_url(&web, "group/app/-/packages/7"),
            "https://example.com/gitlab/group/app/-/packages/7"
        );
    }
}
