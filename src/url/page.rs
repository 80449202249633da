use crate::UrlError;
use url::Url;

/// Query parameter carrying the page number
pub const PAGE_PARAM: &str = "page";

/// Parses and validates a base listing URL
///
/// # Validation Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only HTTP and HTTPS schemes
/// 3. Require a host
/// 4. Drop the fragment (never sent to the server)
///
/// # Examples
///
/// ```
/// use motoscrape::url::parse_base_url;
///
/// let url = parse_base_url("https://example.com/osobowe?search=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/osobowe?search=1");
/// ```
pub fn parse_base_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Builds the URL of page `page` of a listing
///
/// Any `page` pair already present on the base URL is replaced; all other
/// query pairs keep their order.
///
/// # Examples
///
/// ```
/// use motoscrape::url::{page_url, parse_base_url};
///
/// let base = parse_base_url("https://example.com/osobowe?search=1&page=7").unwrap();
/// assert_eq!(
///     page_url(&base, 2).as_str(),
///     "https://example.com/osobowe?search=1&page=2"
/// );
/// ```
pub fn page_url(base: &Url, page: u32) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(PAGE_PARAM, &page.to_string());
    }
    url
}

/// Builds the URLs of pages `1..=page_count`
pub fn page_urls(base: &Url, page_count: u32) -> Vec<Url> {
    (1..=page_count).map(|page| page_url(base, page)).collect()
}
