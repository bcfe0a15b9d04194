//! URL validation for documentation reads.
//!
//! Documentation URLs are checked before any network call so the server can
//! never be used to fetch arbitrary hosts.

use thiserror::Error;
use url::Url;

/// Host that serves AWS documentation
pub const AWS_DOCS_HOST: &str = "docs.aws.amazon.com";

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL contains potentially dangerous characters")]
    DangerousUrl,

    #[error("Invalid URL: {url}. URL must be from the {allowed} domain")]
    OutsideDocumentation { url: String, allowed: String },
}

/// Validate a URL to prevent injection attacks
///
/// Returns the parsed URL if it is a well-formed http(s) URL.
pub fn validate_url(url: &str) -> Result<Url, ValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::InvalidUrl("empty URL".to_string()));
    }

    // Check for embedded newlines or nulls
    if url.contains('\0') || url.contains('\n') || url.contains('\r') {
        return Err(ValidationError::DangerousUrl);
    }

    let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;

    // Only allow HTTP and HTTPS schemes
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "invalid scheme: {}",
                other
            )))
        }
    }

    // Reject credentials smuggled into the authority
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(ValidationError::DangerousUrl);
    }

    Ok(parsed)
}

/// Validate that a URL points into one of the allowed documentation hosts
///
/// Hosts match exactly and case-insensitively; subdomains of an allowed host
/// are not accepted.
pub fn validate_docs_url<S: AsRef<str>>(
    url: &str,
    allowed_hosts: &[S],
) -> Result<Url, ValidationError> {
    let parsed = validate_url(url)?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();

    let allowed = allowed_hosts
        .iter()
        .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(&host));

    if !allowed {
        let allowed = allowed_hosts
            .iter()
            .map(|h| h.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ValidationError::OutsideDocumentation {
            url: url.trim().to_string(),
            allowed,
        });
    }

    Ok(parsed)
}

/// Whether a string looks like an http(s) URL rather than free text
pub fn looks_like_url(input: &str) -> bool {
    let input = input.trim();
    (input.starts_with("http://") || input.starts_with("https://")) && validate_url(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: &[&str] = &[AWS_DOCS_HOST];

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://docs.aws.amazon.com/lambda/latest/dg/welcome.html").is_ok());
        assert!(validate_url("http://example.com/path?q=1").is_ok());
    }

    #[test]
    fn test_validate_url_invalid() {
        assert!(validate_url("").is_err());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("not a url").is_err());
        assert_eq!(
            validate_url("https://docs.aws.amazon.com/a\nb"),
            Err(ValidationError::DangerousUrl)
        );
    }

    #[test]
    fn test_docs_url_accepted() {
        let url = validate_docs_url(
            "https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html",
            HOSTS,
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("docs.aws.amazon.com"));

        assert!(validate_docs_url("https://DOCS.AWS.AMAZON.COM/x.html", HOSTS).is_ok());
    }

    #[test]
    fn test_docs_url_rejects_other_hosts() {
        for url in [
            "https://example.com/docs.aws.amazon.com/page.html",
            "https://docs.aws.amazon.com.evil.example/page.html",
            "https://evil.docs.aws.amazon.com/page.html",
            "https://aws.amazon.com/s3/",
        ] {
            assert!(
                matches!(
                    validate_docs_url(url, HOSTS),
                    Err(ValidationError::OutsideDocumentation { .. })
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_docs_url_rejects_credentials() {
        assert_eq!(
            validate_docs_url("https://user:pw@docs.aws.amazon.com/x.html", HOSTS),
            Err(ValidationError::DangerousUrl)
        );
    }

    #[test]
    fn test_looks_like_url() {
        assert!(looks_like_url("https://docs.aws.amazon.com/x.html"));
        assert!(!looks_like_url("how do I configure lambda layers"));
        assert!(!looks_like_url("ftp://docs.aws.amazon.com"));
    }
}
