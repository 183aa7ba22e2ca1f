use crate::{UrlError, UrlResult};
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Normalizes a URL into the key used for page records
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and repeated slashes
///    - Remove trailing slash (except for root /)
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters alphabetically
/// 7. Remove empty query string (trailing ?)
///
/// Pagination parameters such as `page=2` survive, so each listing page keeps
/// its own key.
///
/// # Examples
///
/// ```
/// use docket::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.GOV/notices/?page=2&utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.gov/notices?page=2");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    normalize_host(&mut url)?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = filtered_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Reduces a document URL to its identity key
///
/// Stricter than [`normalize_url`]: the whole query string is dropped along
/// with fragment and trailing slash. Only consulted after exact-URL and
/// content-hash matching have failed, because two documents served from the
/// same path with different query strings would otherwise collide.
///
/// # Examples
///
/// ```
/// use docket::url::identity_key;
///
/// let key = identity_key("http://www.example.gov/files/order.pdf/?v=3#p2").unwrap();
/// assert_eq!(key, "http://example.gov/files/order.pdf");
/// ```
pub fn identity_key(url_str: &str) -> UrlResult<String> {
    let mut url = normalize_url(url_str)?;
    url.set_query(None);
    Ok(url.to_string())
}

fn normalize_host(url: &mut Url) -> Result<(), UrlError> {
    let host = url.host_str().ok_or(UrlError::MissingDomain)?;
    let mut normalized_host = host.to_lowercase();

    if let Some(stripped) = normalized_host.strip_prefix("www.") {
        normalized_host = stripped.to_string();
    }

    url.set_host(Some(&normalized_host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))
}

/// Collapses dot segments and repeated slashes; drops a trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_preserved() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_remove_www() {
        let result = normalize_url("https://www.example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keeps_pagination_param() {
        let result = normalize_url("https://example.com/list?utm_source=x&page=3").unwrap();
        assert_eq!(result.as_str(), "https://example.com/list?page=3");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = normalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_lowercase_domain_keeps_path_case() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_all_tracking_params_removed() {
        for param in TRACKING_PARAMS {
            let url = format!("https://example.com/page?{}=value", param);
            let result = normalize_url(&url).unwrap();
            assert_eq!(result.as_str(), "https://example.com/page", "{}", param);
        }
        let result = normalize_url("https://example.com/page?utm_custom=value").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_multiple_slashes() {
        let result = normalize_url("https://example.com///path//to///page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/path/to/page");
    }

    #[test]
    fn test_identity_key_drops_query() {
        assert_eq!(
            identity_key("https://example.gov/files/a.pdf?download=1").unwrap(),
            "https://example.gov/files/a.pdf"
        );
        assert_eq!(
            identity_key("https://www.Example.gov/files/a.pdf/").unwrap(),
            "https://example.gov/files/a.pdf"
        );
    }

    #[test]
    fn test_identity_key_differs_from_page_key() {
        let raw = "https://example.gov/list?page=2";
        assert_ne!(normalize_url(raw).unwrap().to_string(), identity_key(raw).unwrap());
    }
}
