//! Media type parsing and matching.

use std::fmt::{self, Display};

use crate::error::MultipartError;

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Content type assumed for a part that declares none.
pub const DEFAULT_PART_CONTENT_TYPE: &str = "text/plain";

const MAX_BOUNDARY_LEN: usize = 70;

/// A parsed `type/subtype; name=value` media type.
///
/// Type, subtype and parameter names are lowercased; parameter values keep
/// their case with surrounding quotes removed.
///
/// # Example
///
/// ```rust
/// use formcheck::MediaType;
///
/// let media = MediaType::parse("multipart/form-data; boundary=\"abc 123\"").unwrap();
/// assert_eq!(media.essence(), "multipart/form-data");
/// assert_eq!(media.param("boundary"), Some("abc 123"));
/// assert!(media.matches("multipart/*"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    main: String,
    sub: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Returns `None` unless the value has a non-empty type and subtype.
    pub fn parse(value: &str) -> Option<Self> {
        let mut pieces = split_params(value).into_iter();
        let essence = pieces.next()?;
        let (main, sub) = essence.trim().split_once('/')?;
        let (main, sub) = (main.trim(), sub.trim());
        if main.is_empty() || sub.is_empty() {
            return None;
        }

        let params = pieces
            .filter_map(|piece| {
                let (name, value) = piece.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote(value.trim())))
            })
            .collect();

        Some(Self {
            main: main.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
            params,
        })
    }

    pub fn main_type(&self) -> &str {
        &self.main
    }

    pub fn sub_type(&self) -> &str {
        &self.sub
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main, self.sub)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_multipart_form_data(&self) -> bool {
        self.main == "multipart" && self.sub == "form-data"
    }

    /// `application/json` or any `+json` structured syntax suffix.
    pub fn is_json(&self) -> bool {
        (self.main == "application" && self.sub == "json") || self.sub.ends_with("+json")
    }

    /// Matches against `*/*`, `type/*`, or an exact `type/subtype`.
    ///
    /// Parameters of the pattern are ignored.
    pub fn matches(&self, pattern: &str) -> bool {
        let Some(pattern) = MediaType::parse(pattern) else {
            return false;
        };
        match (pattern.main.as_str(), pattern.sub.as_str()) {
            ("*", "*") => true,
            (main, "*") => main == self.main,
            (main, sub) => main == self.main && sub == self.sub,
        }
    }

    /// Matches against a comma separated list of patterns.
    pub fn matches_any(&self, patterns: &str) -> bool {
        patterns
            .split(',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| self.matches(pattern))
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)?;
        for (name, value) in &self.params {
            write!(f, "; {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Extracts the `boundary` parameter of a `multipart/form-data` content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let media = MediaType::parse(content_type).ok_or_else(|| {
        MultipartError::InvalidBoundary(format!("unparseable content type {:?}", content_type))
    })?;
    let boundary = media.param("boundary").ok_or_else(|| {
        MultipartError::InvalidBoundary("boundary parameter is missing".to_string())
    })?;
    validate_boundary(boundary)?;
    Ok(boundary.to_string())
}

/// Enforces the boundary length limits of RFC 2046.
pub fn validate_boundary(boundary: &str) -> Result<(), MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::InvalidBoundary(
            "boundary is empty".to_string(),
        ));
    }
    if boundary.len() > MAX_BOUNDARY_LEN {
        return Err(MultipartError::InvalidBoundary(format!(
            "boundary is {} bytes, at most {} allowed",
            boundary.len(),
            MAX_BOUNDARY_LEN
        )));
    }
    if boundary.contains(['\r', '\n']) {
        return Err(MultipartError::InvalidBoundary(
            "boundary contains a line break".to_string(),
        ));
    }
    Ok(())
}

/// Splits on `;` outside of double quotes.
pub(crate) fn split_params(value: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                pieces.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&value[start..]);
    pieces
}

pub(crate) fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(ch) = chars.next() {
                if ch == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(ch);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        let media = MediaType::parse("Multipart/Form-Data; Boundary=XyZ").unwrap();
        assert!(media.is_multipart_form_data());
        assert_eq!(media.param("boundary"), Some("XyZ"));
    }

    #[test]
    fn rejects_missing_subtype() {
        assert!(MediaType::parse("text").is_none());
        assert!(MediaType::parse("text/").is_none());
        assert!(MediaType::parse("").is_none());
    }

    #[test]
    fn quoted_params_may_contain_semicolons() {
        let media = MediaType::parse(r#"text/plain; note="a;b \"c\""; charset=utf-8"#).unwrap();
        assert_eq!(media.param("note"), Some(r#"a;b "c""#));
        assert_eq!(media.param("charset"), Some("utf-8"));
    }

    #[test]
    fn wildcard_matching() {
        let png = MediaType::parse("image/png").unwrap();
        assert!(png.matches("*/*"));
        assert!(png.matches("image/*"));
        assert!(png.matches("image/png; q=1"));
        assert!(!png.matches("image/jpeg"));
        assert!(!png.matches("text/*"));
        assert!(png.matches_any("application/zip, image/*"));
    }

    #[test]
    fn json_detection() {
        assert!(MediaType::parse("application/json").unwrap().is_json());
        assert!(MediaType::parse("application/vnd.api+json")
            .unwrap()
            .is_json());
        assert!(!MediaType::parse("text/plain").unwrap().is_json());
    }

    #[test]
    fn boundary_extraction() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=\"--abc\"").unwrap(),
            "--abc"
        );
        assert!(matches!(
            boundary_from_content_type("multipart/form-data"),
            Err(MultipartError::InvalidBoundary(_))
        ));
        assert!(boundary_from_content_type("multipart/form-data; boundary=\"\"").is_err());

        let long = format!("multipart/form-data; boundary={}", "x".repeat(71));
        assert!(boundary_from_content_type(&long).is_err());
        let max = format!("multipart/form-data; boundary={}", "x".repeat(70));
        assert!(boundary_from_content_type(&max).is_ok());
    }
}
