//! `Cache-Control` directive parsing.
//!
//! The tokenizer is a two-state machine: `Outside` a quoted string, commas
//! end a directive token; `InsideQuotes` (entered and left on `"`), commas
//! are literal so quoted field lists like `no-cache="set-cookie,vary"`
//! survive splitting. Each token is trimmed and split at the first `=`;
//! quoted values are unwrapped. Directive names match case-insensitively.
//!
//! Which directive names are recognized depends on whether the header came
//! from the request or the response side; anything else is preserved under
//! `extensions`.

use std::collections::BTreeMap;

use super::headers::Headers;

/// Which side of the exchange a `Cache-Control` value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveScope {
    Request,
    Response,
}

/// The request `max-stale` directive: bare (any staleness accepted) or
/// bounded by a second count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxStale {
    Unlimited,
    Limit(u64),
}

/// Parsed `Cache-Control` directive set.
///
/// Response-only and request-only directives share the struct; the scope
/// passed to [`CacheControl::parse`] decides which names are recognized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
    pub no_cache: bool,
    /// Field names from a qualified `no-cache="f1,f2"`, lowercased.
    pub no_cache_fields: Vec<String>,
    pub no_store: bool,
    pub no_transform: bool,
    pub must_revalidate: bool,
    pub must_understand: bool,
    pub proxy_revalidate: bool,
    pub public: bool,
    pub private: bool,
    /// Field names from a qualified `private="f1,f2"`, lowercased.
    pub private_fields: Vec<String>,
    pub max_stale: Option<MaxStale>,
    pub min_fresh: Option<u64>,
    pub only_if_cached: bool,
    /// Unrecognized directives, name (lowercased) to optional value.
    pub extensions: BTreeMap<String, Option<String>>,
}

impl CacheControl {
    /// Parse a `Cache-Control` header value.
    pub fn parse(value: &str, scope: DirectiveScope) -> Self {
        let mut parsed = CacheControl::default();

        for token in split_directives(value) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let (name, raw_value) = match token.split_once('=') {
                Some((n, v)) => (n.trim().to_ascii_lowercase(), Some(unquote(v.trim()))),
                None => (token.to_ascii_lowercase(), None),
            };

            parsed.apply(&name, raw_value, scope);
        }

        parsed
    }

    /// Parse the `cache-control` field of a header map; an absent field
    /// yields the empty directive set.
    pub fn from_headers(headers: &Headers, scope: DirectiveScope) -> Self {
        match headers.get("cache-control") {
            Some(value) => Self::parse(value, scope),
            None => CacheControl::default(),
        }
    }

    fn apply(&mut self, name: &str, value: Option<String>, scope: DirectiveScope) {
        match (scope, name) {
            (_, "max-age") => self.max_age = parse_delta(value.as_deref()),
            (_, "no-store") => self.no_store = true,
            (_, "no-transform") => self.no_transform = true,

            (DirectiveScope::Response, "s-maxage") => self.s_maxage = parse_delta(value.as_deref()),
            (DirectiveScope::Response, "no-cache") => {
                self.no_cache = true;
                if let Some(fields) = value.as_deref() {
                    self.no_cache_fields = parse_field_list(fields);
                }
            }
            (DirectiveScope::Response, "must-revalidate") => self.must_revalidate = true,
            (DirectiveScope::Response, "must-understand") => self.must_understand = true,
            (DirectiveScope::Response, "proxy-revalidate") => self.proxy_revalidate = true,
            (DirectiveScope::Response, "public") => self.public = true,
            (DirectiveScope::Response, "private") => {
                self.private = true;
                if let Some(fields) = value.as_deref() {
                    self.private_fields = parse_field_list(fields);
                }
            }

            (DirectiveScope::Request, "no-cache") => self.no_cache = true,
            (DirectiveScope::Request, "max-stale") => {
                self.max_stale = match value.as_deref() {
                    None => Some(MaxStale::Unlimited),
                    Some(v) => parse_delta(Some(v)).map(MaxStale::Limit),
                };
            }
            (DirectiveScope::Request, "min-fresh") => self.min_fresh = parse_delta(value.as_deref()),
            (DirectiveScope::Request, "only-if-cached") => self.only_if_cached = true,

            _ => {
                self.extensions.insert(name.to_string(), value);
            }
        }
    }
}

/// Split a header value on commas, honoring double-quoted strings.
///
/// States: `Outside` (commas split) and `InsideQuotes` (commas literal);
/// a `"` toggles between them.
fn split_directives(value: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut inside_quotes = false;

    for c in value.chars() {
        match c {
            '"' => {
                inside_quotes = !inside_quotes;
                current.push(c);
            }
            ',' if !inside_quotes => {
                tokens.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Strip one pair of surrounding double quotes, if present.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Parse a non-negative integer second count; anything else means the
/// directive is absent.
fn parse_delta(value: Option<&str>) -> Option<u64> {
    value?.parse::<u64>().ok()
}

fn parse_field_list(fields: &str) -> Vec<String> {
    fields
        .split(',')
        .map(|f| f.trim().to_ascii_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_basic() {
        let cc = CacheControl::parse("max-age=300, must-revalidate", DirectiveScope::Response);
        assert_eq!(cc.max_age, Some(300));
        assert!(cc.must_revalidate);
        assert!(!cc.no_store);
    }

    #[test]
    fn test_parse_case_insensitive_names() {
        let cc = CacheControl::parse("Max-Age=60, No-Store", DirectiveScope::Response);
        assert_eq!(cc.max_age, Some(60));
        assert!(cc.no_store);
    }

    #[test]
    fn test_parse_quoted_value_with_commas() {
        let cc = CacheControl::parse("no-cache=\"set-cookie, vary\", max-age=10", DirectiveScope::Response);
        assert!(cc.no_cache);
        assert_eq!(cc.no_cache_fields, vec!["set-cookie", "vary"]);
        assert_eq!(cc.max_age, Some(10));
    }

    #[test]
    fn test_parse_private_field_list() {
        let cc = CacheControl::parse("private=\"Authorization\"", DirectiveScope::Response);
        assert!(cc.private);
        assert_eq!(cc.private_fields, vec!["authorization"]);
    }

    #[test]
    fn test_parse_s_maxage_response_only() {
        let response = CacheControl::parse("s-maxage=600", DirectiveScope::Response);
        assert_eq!(response.s_maxage, Some(600));

        // On the request side s-maxage is not a recognized directive.
        let request = CacheControl::parse("s-maxage=600", DirectiveScope::Request);
        assert_eq!(request.s_maxage, None);
        assert_eq!(request.extensions.get("s-maxage"), Some(&Some("600".to_string())));
    }

    #[test]
    fn test_parse_request_directives() {
        let cc = CacheControl::parse("max-stale, min-fresh=30, only-if-cached", DirectiveScope::Request);
        assert_eq!(cc.max_stale, Some(MaxStale::Unlimited));
        assert_eq!(cc.min_fresh, Some(30));
        assert!(cc.only_if_cached);
    }

    #[test]
    fn test_parse_max_stale_with_limit() {
        let cc = CacheControl::parse("max-stale=120", DirectiveScope::Request);
        assert_eq!(cc.max_stale, Some(MaxStale::Limit(120)));
    }

    #[test]
    fn test_non_parseable_delta_is_absent() {
        let cc = CacheControl::parse("max-age=abc", DirectiveScope::Response);
        assert_eq!(cc.max_age, None);

        let cc = CacheControl::parse("max-age=-5", DirectiveScope::Response);
        assert_eq!(cc.max_age, None);

        let cc = CacheControl::parse("max-stale=forever", DirectiveScope::Request);
        assert_eq!(cc.max_stale, None);
    }

    #[test]
    fn test_unknown_directives_preserved() {
        let cc = CacheControl::parse("stale-while-revalidate=30, immutable", DirectiveScope::Response);
        assert_eq!(cc.extensions.get("stale-while-revalidate"), Some(&Some("30".to_string())));
        assert_eq!(cc.extensions.get("immutable"), Some(&None));
    }

    #[test]
    fn test_from_headers_absent() {
        let headers = Headers::new();
        let cc = CacheControl::from_headers(&headers, DirectiveScope::Response);
        assert_eq!(cc, CacheControl::default());
    }

    #[test]
    fn test_whitespace_tolerance() {
        let cc = CacheControl::parse("  max-age = 60 ,  public  ", DirectiveScope::Response);
        assert_eq!(cc.max_age, Some(60));
        assert!(cc.public);
    }

    #[test]
    fn test_empty_value() {
        let cc = CacheControl::parse("", DirectiveScope::Response);
        assert_eq!(cc, CacheControl::default());
    }
}
