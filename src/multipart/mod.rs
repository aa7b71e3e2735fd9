//! Streaming `multipart/form-data` decoder.
//!
//! [`MultipartReader`] makes a single forward pass over a body. Payload bytes
//! go through a small lookahead buffer, so memory use does not grow with the
//! body or with any single part. Each [`Part`] mutably borrows the reader;
//! asking for the next part skips whatever is left of the current one.
//!
//! # Example
//!
//! ```rust
//! use formcheck::MultipartReader;
//!
//! let body = b"--XyZ\r\n\
//!     Content-Disposition: form-data; name=\"description\"\r\n\
//!     \r\n\
//!     a short note\r\n\
//!     --XyZ--\r\n";
//!
//! let mut reader = MultipartReader::new(&body[..], "XyZ").unwrap();
//! let mut part = reader.next_part().unwrap().unwrap();
//! assert_eq!(part.name(), "description");
//! assert_eq!(part.content_type(), "text/plain");
//!
//! let mut text = Vec::new();
//! assert!(part.read_limited(1024, &mut text).unwrap());
//! assert_eq!(text, b"a short note");
//!
//! assert!(reader.next_part().unwrap().is_none());
//! ```

mod headers;
mod part;

pub use headers::PartHeaders;
pub use part::Part;

use std::io::{self, Read};

use crate::context::CancelToken;
use crate::error::MultipartError;
use crate::media::validate_boundary;

const READ_CHUNK: usize = 8 * 1024;
const DEFAULT_MAX_HEADER_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the first delimiter.
    Preamble,
    /// Inside the payload of the current part.
    Body,
    /// Just past a delimiter; the next bytes say whether another part follows.
    Delimited,
    Finished,
}

/// Pull-based reader over the parts of a multipart body.
pub struct MultipartReader<R> {
    source: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    delimiter: Vec<u8>,
    boundary: String,
    state: State,
    next_index: usize,
    max_header_bytes: usize,
    cancel: Option<CancelToken>,
}

impl<R: Read> MultipartReader<R> {
    pub fn new(source: R, boundary: &str) -> Result<Self, MultipartError> {
        validate_boundary(boundary)?;
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Ok(Self {
            source,
            // a leading CRLF lets the delimiter match at the very start of the body
            buf: b"\r\n".to_vec(),
            pos: 0,
            eof: false,
            delimiter,
            boundary: boundary.to_string(),
            state: State::Preamble,
            next_index: 0,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            cancel: None,
        })
    }

    pub fn with_max_header_bytes(mut self, limit: usize) -> Self {
        self.max_header_bytes = limit;
        self
    }

    /// Checked before every read from the source.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Number of parts handed out so far.
    pub fn parts_read(&self) -> usize {
        self.next_index
    }

    /// Advances to the next part, or `None` after the closing delimiter.
    pub fn next_part(&mut self) -> Result<Option<Part<'_, R>>, MultipartError> {
        self.check_cancelled()?;
        match self.state {
            State::Finished => return Ok(None),
            State::Preamble => self.skip_preamble()?,
            State::Body => while self.body_span(usize::MAX)?.is_some() {},
            State::Delimited => {}
        }

        if !self.after_delimiter()? {
            tracing::trace!(parts = self.next_index, "multipart body finished");
            return Ok(None);
        }

        let index = self.next_index;
        let raw = self.read_header_block(index)?;
        let headers = PartHeaders::from_raw(index, raw)?;
        tracing::trace!(
            index,
            name = headers.name(),
            content_type = headers.content_type(),
            "multipart part headers parsed"
        );

        self.next_index += 1;
        self.state = State::Body;
        Ok(Some(Part::new(self, headers)))
    }

    /// Consumes up to `max` payload bytes of the current part, returning
    /// their position in the buffer. `None` marks the end of the part.
    fn body_span(&mut self, max: usize) -> Result<Option<(usize, usize)>, MultipartError> {
        if self.state != State::Body || max == 0 {
            return Ok(None);
        }
        let keep = self.delimiter.len() - 1;
        loop {
            let available = self.buf.len() - self.pos;
            match find_subslice(&self.buf[self.pos..], &self.delimiter) {
                Some(0) => {
                    self.pos += self.delimiter.len();
                    self.state = State::Delimited;
                    return Ok(None);
                }
                Some(found) => return Ok(Some(self.take(found.min(max)))),
                None if available > keep => {
                    return Ok(Some(self.take((available - keep).min(max))))
                }
                None if self.eof => {
                    return Err(MultipartError::Truncated {
                        index: self.next_index.saturating_sub(1),
                    })
                }
                None => self.fill()?,
            }
        }
    }

    fn take(&mut self, len: usize) -> (usize, usize) {
        let start = self.pos;
        self.pos += len;
        (start, start + len)
    }

    fn slice(&self, span: (usize, usize)) -> &[u8] {
        &self.buf[span.0..span.1]
    }

    fn skip_preamble(&mut self) -> Result<(), MultipartError> {
        let keep = self.delimiter.len() - 1;
        loop {
            let available = self.buf.len() - self.pos;
            match find_subslice(&self.buf[self.pos..], &self.delimiter) {
                Some(found) => {
                    self.pos += found + self.delimiter.len();
                    self.state = State::Delimited;
                    return Ok(());
                }
                None if self.eof => {
                    return Err(MultipartError::MissingBoundary {
                        boundary: self.boundary.clone(),
                    })
                }
                None => {
                    self.pos += available.saturating_sub(keep);
                    self.fill()?;
                }
            }
        }
    }

    /// Returns `false` at the closing delimiter. Transport padding (spaces
    /// and tabs) before the line break is skipped; the epilogue is ignored.
    fn after_delimiter(&mut self) -> Result<bool, MultipartError> {
        let index = self.next_index;
        if self.fill_to(2)? && &self.buf[self.pos..self.pos + 2] == b"--" {
            self.pos += 2;
            self.state = State::Finished;
            return Ok(false);
        }
        loop {
            if !self.fill_to(1)? {
                return Err(MultipartError::Truncated { index });
            }
            match self.buf[self.pos] {
                b' ' | b'\t' => self.pos += 1,
                b'\n' => {
                    self.pos += 1;
                    return Ok(true);
                }
                b'\r' => {
                    if !self.fill_to(2)? {
                        return Err(MultipartError::Truncated { index });
                    }
                    if self.buf[self.pos + 1] != b'\n' {
                        return Err(MultipartError::BadDelimiter { index });
                    }
                    self.pos += 2;
                    return Ok(true);
                }
                _ => return Err(MultipartError::BadDelimiter { index }),
            }
        }
    }

    fn read_header_block(&mut self, index: usize) -> Result<Vec<(String, String)>, MultipartError> {
        let mut budget = self.max_header_bytes;
        let mut raw: Vec<(String, String)> = Vec::new();
        loop {
            let line = self.read_header_line(index, &mut budget)?;
            if line.is_empty() {
                return Ok(raw);
            }
            if line.starts_with([' ', '\t']) {
                // obsolete line folding continues the previous header
                match raw.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                        continue;
                    }
                    None => return Err(MultipartError::MalformedHeader { index, line }),
                }
            }
            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    raw.push((name.trim().to_string(), value.trim().to_string()))
                }
                _ => return Err(MultipartError::MalformedHeader { index, line }),
            }
        }
    }

    /// One header line without its CRLF or LF terminator.
    fn read_header_line(
        &mut self,
        index: usize,
        budget: &mut usize,
    ) -> Result<String, MultipartError> {
        loop {
            let available = &self.buf[self.pos..];
            if let Some(newline) = available.iter().position(|b| *b == b'\n') {
                let consumed = newline + 1;
                if consumed > *budget {
                    return Err(self.headers_too_large(index));
                }
                *budget -= consumed;
                let mut line = &available[..newline];
                if let Some(stripped) = line.strip_suffix(b"\r") {
                    line = stripped;
                }
                let line = String::from_utf8_lossy(line).into_owned();
                self.pos += consumed;
                return Ok(line);
            }
            if available.len() > *budget {
                return Err(self.headers_too_large(index));
            }
            if self.eof {
                return Err(MultipartError::Truncated { index });
            }
            self.fill()?;
        }
    }

    fn headers_too_large(&self, index: usize) -> MultipartError {
        MultipartError::HeadersTooLarge {
            index,
            limit: self.max_header_bytes,
        }
    }

    /// Reads until `n` bytes are buffered or the source is exhausted.
    fn fill_to(&mut self, n: usize) -> Result<bool, MultipartError> {
        while self.buf.len() - self.pos < n && !self.eof {
            self.fill()?;
        }
        Ok(self.buf.len() - self.pos >= n)
    }

    fn fill(&mut self) -> Result<(), MultipartError> {
        self.check_cancelled()?;
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let filled = self.buf.len();
        self.buf.resize(filled + READ_CHUNK, 0);
        let read = loop {
            match self.source.read(&mut self.buf[filled..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(filled);
                    return Err(MultipartError::Io(e));
                }
            }
        };
        self.buf.truncate(filled + read);
        if read == 0 {
            self.eof = true;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), MultipartError> {
        match &self.cancel {
            Some(cancel) if cancel.is_cancelled() => Err(MultipartError::Cancelled),
            _ => Ok(()),
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
