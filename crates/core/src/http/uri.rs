//! URI canonicalization for consistent cache keys and same-origin checks.

/// Canonicalize a URI for use in cache keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase the host
/// 3. Remove the fragment (#...)
/// 4. Keep the query string intact (do not reorder)
///
/// Inputs that do not parse as absolute URLs are returned trimmed with any
/// fragment sliced off, so keying still works for opaque identifiers.
pub fn canonicalize(input: &str) -> String {
    let trimmed = input.trim();

    match url::Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => match trimmed.split_once('#') {
            Some((before, _)) => before.to_string(),
            None => trimmed.to_string(),
        },
    }
}

/// Whether two absolute URIs share scheme, host, and port.
///
/// Unparseable input on either side is never same-origin.
pub fn same_origin(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (url::Url::parse(a), url::Url::parse(b)) else {
        return false;
    };
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Resolve a possibly-relative reference (e.g. a `Location` value) against
/// a base URI, dropping any fragment.
pub fn resolve_reference(base: &str, reference: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    let mut resolved = base.join(reference.trim()).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
