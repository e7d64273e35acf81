//! Origin helpers.

use url::Url;

use crate::NetError;

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Resolve a manifest entry against the worker origin.
///
/// Absolute URLs (CDN assets) are returned as-is; paths are joined onto `base`.
pub fn resolve(base: &Url, reference: &str) -> Result<Url, NetError> {
    base.join(reference)
        .map_err(|e| NetError::InvalidUrl(format!("{reference}: {e}")))
}
