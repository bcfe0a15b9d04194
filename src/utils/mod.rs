//! Utility modules shared by the documentation sources and transports.
//!
//! - [`HttpClient`]: reqwest client with the crate user agent and a bounded timeout
//! - [`validate_docs_url`]: domain guard applied before any documentation fetch
//!
//! ```rust
//! use aws_docs_mcp::utils::{validate_docs_url, AWS_DOCS_HOST};
//!
//! assert!(validate_docs_url("https://docs.aws.amazon.com/index.html", &[AWS_DOCS_HOST]).is_ok());
//! assert!(validate_docs_url("https://example.com/", &[AWS_DOCS_HOST]).is_err());
//! ```

mod http;
mod validate;

pub use http::{HttpClient, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use validate::{looks_like_url, validate_docs_url, validate_url, ValidationError, AWS_DOCS_HOST};
