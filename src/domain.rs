//! Normalization of user supplied domains and URLs into bare host names.

use tracing::trace;
use url::{Host, ParseError, Url};

use crate::error::{Result, VerifyError};

/// Scheme prepended when the input carries no host of its own.
const FALLBACK_SCHEME: &str = "https://";

/// Reduce `input` to its bare host: no scheme, no port, no path.
///
/// Accepts `example.com`, `https://example.com/path`, `example.com:8443`
/// and any of those wrapped in whitespace.
pub fn normalize_host(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(VerifyError::InvalidInput("domain is required".to_string()));
    }

    let host = match host_of(input)? {
        Some(host) => host,
        None => {
            let prefixed = format!("{}{}", FALLBACK_SCHEME, input);
            match host_of(&prefixed) {
                Ok(Some(host)) => host,
                _ => return Err(VerifyError::InvalidInput(format!("invalid domain: {}", input))),
            }
        }
    };

    trace!("Normalized {:?} to host {}", input, host);
    Ok(host)
}

/// Parse `candidate` as a URL and return its host, if it has one.
///
/// A relative reference such as `example.com` has no host rather than being
/// a parse failure.
fn host_of(candidate: &str) -> Result<Option<String>> {
    let url = match Url::parse(candidate) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => return Ok(None),
        Err(e) => {
            return Err(VerifyError::InvalidInput(format!(
                "invalid domain {}: {}",
                candidate, e
            )));
        }
    };

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_ascii_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => return Ok(None),
    };

    Ok(Some(host))
}
