//! Part header block interpretation.

use crate::error::MultipartError;
use crate::media::{split_params, unquote, MediaType, DEFAULT_PART_CONTENT_TYPE};

/// Metadata of one multipart part, taken from its header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeaders {
    index: usize,
    name: String,
    filename: Option<String>,
    content_type: String,
    declared_content_type: bool,
    raw: Vec<(String, String)>,
}

impl PartHeaders {
    /// Interprets raw `(name, value)` header pairs of the part at `index`.
    ///
    /// `Content-Disposition` must be present, of type `form-data`, and carry a
    /// non-empty `name`. `filename*` (RFC 5987) takes precedence over
    /// `filename`.
    pub fn from_raw(index: usize, raw: Vec<(String, String)>) -> Result<Self, MultipartError> {
        let disposition = find(&raw, "content-disposition")
            .ok_or(MultipartError::MissingDisposition { index })?;

        let mut pieces = split_params(disposition).into_iter();
        let kind = pieces
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if kind != "form-data" {
            return Err(MultipartError::NotFormData {
                index,
                disposition: kind,
            });
        }

        let mut name = None;
        let mut filename = None;
        let mut extended_filename = None;
        for piece in pieces {
            let Some((key, value)) = piece.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(unquote(value)),
                "filename" => filename = Some(unquote(value)),
                "filename*" => extended_filename = decode_extended(value),
                _ => {}
            }
        }

        let name = name
            .filter(|name| !name.is_empty())
            .ok_or(MultipartError::MissingName { index })?;

        let declared = find(&raw, "content-type")
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let content_type = declared.unwrap_or(DEFAULT_PART_CONTENT_TYPE).to_string();
        let declared_content_type = declared.is_some();

        Ok(Self {
            index,
            name,
            filename: extended_filename.or(filename),
            content_type,
            declared_content_type,
            raw,
        })
    }

    /// Zero-based position of the part in the body.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The declared content type, or `text/plain` when none was sent.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn has_declared_content_type(&self) -> bool {
        self.declared_content_type
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::parse(&self.content_type)
    }

    /// First header with the given name, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        find(&self.raw, name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn find<'h>(raw: &'h [(String, String)], name: &str) -> Option<&'h str> {
    raw.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Decodes `charset'lang'percent-encoded`; bytes are read as UTF-8.
fn decode_extended(value: &str) -> Option<String> {
    let value = unquote(value);
    let mut sections = value.splitn(3, '\'');
    let _charset = sections.next()?;
    let _language = sections.next()?;
    let encoded = sections.next()?;

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (high, low) = (hex_value(bytes[i + 1])?, hex_value(bytes[i + 2])?);
            out.push((high << 4) | low);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
