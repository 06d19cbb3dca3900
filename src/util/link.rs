use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinkError {
    #[error("Record has no image URL")]
    Missing,
    #[error("Invalid URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// Only web links are handed to the system opener.
    #[error("Refusing to open {0} link")]
    UnsupportedScheme(String),
}

/// Check a record's image URL before passing it to the browser.
///
/// Records are user-supplied, so anything other than `http`/`https` (for
/// example `file://` or a custom handler scheme) is refused.
pub fn checked_image_link(raw: &str) -> Result<Url, LinkError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LinkError::Missing);
    }
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LinkError::UnsupportedScheme(other.to_string())),
    }
}
