use thiserror::Error;
use url::Url;

/// Search engine used when a saved item is free text rather than a link.
const SEARCH_URL: &str = "https://www.google.com/search";

/// Errors that can occur when turning a saved input into something openable.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The input looked like a URL but could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Whether a saved input is treated as a link.
///
/// Mirrors how inputs are pasted: anything starting with `http` is a link,
/// everything else is a title or free-text note.
pub fn is_link(input: &str) -> bool {
    input.trim_start().starts_with("http")
}

/// Resolve the URL to open for a saved input.
///
/// Links are validated and opened as-is (http/https only, so a crafted
/// `javascript:` or `file:` import cannot be handed to the browser). Free text
/// becomes a web search for that text.
///
/// # Examples
///
/// ```
/// use memoria::util::open_target;
///
/// let url = open_target("https://youtu.be/xyz").unwrap();
/// assert_eq!(url.host_str(), Some("youtu.be"));
///
/// let search = open_target("rust async book").unwrap();
/// assert_eq!(search.query(), Some("q=rust+async+book"));
/// ```
pub fn open_target(input: &str) -> Result<Url, UrlValidationError> {
    let trimmed = input.trim();
    if is_link(trimmed) {
        let url = Url::parse(trimmed)?;
        return match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
        };
    }

    let mut url = Url::parse(SEARCH_URL)?;
    url.query_pairs_mut().append_pair("q", trimmed);
    Ok(url)
}

/// Lowercased host of a link input, or `None` for free text.
pub fn link_host(input: &str) -> Option<String> {
    if !is_link(input) {
        return None;
    }
    Url::parse(input.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}
