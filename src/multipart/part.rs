use std::io::{self, Read};

use crate::error::MultipartError;
use crate::media::MediaType;

use super::{MultipartReader, PartHeaders};

/// One part of a multipart body, with its payload still in the stream.
///
/// The payload can be pulled as borrowed chunks ([`next_chunk`]), through
/// [`std::io::Read`], or with the bounded helpers. Whatever is not consumed
/// is skipped by the next [`MultipartReader::next_part`] call.
///
/// [`next_chunk`]: Part::next_chunk
pub struct Part<'r, R> {
    reader: &'r mut MultipartReader<R>,
    headers: PartHeaders,
}

impl<'r, R: Read> Part<'r, R> {
    pub(super) fn new(reader: &'r mut MultipartReader<R>, headers: PartHeaders) -> Self {
        Self { reader, headers }
    }

    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    pub fn index(&self) -> usize {
        self.headers.index()
    }

    pub fn name(&self) -> &str {
        self.headers.name()
    }

    pub fn filename(&self) -> Option<&str> {
        self.headers.filename()
    }

    pub fn content_type(&self) -> &str {
        self.headers.content_type()
    }

    pub fn media_type(&self) -> Option<MediaType> {
        self.headers.media_type()
    }

    /// The next slice of payload, or `None` at the end of the part.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>, MultipartError> {
        match self.reader.body_span(usize::MAX)? {
            Some(span) => Ok(Some(self.reader.slice(span))),
            None => Ok(None),
        }
    }

    /// Discards the rest of the payload, returning how many bytes were skipped.
    pub fn skip(&mut self) -> Result<u64, MultipartError> {
        let mut skipped = 0u64;
        while let Some(chunk) = self.next_chunk()? {
            skipped += chunk.len() as u64;
        }
        Ok(skipped)
    }

    /// Appends the payload to `out` unless it exceeds `limit` bytes.
    ///
    /// Returns `false` once the limit is crossed; the payload is then left
    /// partially consumed and `out` holds an incomplete prefix.
    pub fn read_limited(
        &mut self,
        limit: usize,
        out: &mut Vec<u8>,
    ) -> Result<bool, MultipartError> {
        let start = out.len();
        while let Some(chunk) = self.next_chunk()? {
            if out.len() - start + chunk.len() > limit {
                return Ok(false);
            }
            out.extend_from_slice(chunk);
        }
        Ok(true)
    }
}

impl<R: Read> Read for Part<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match self.reader.body_span(out.len()) {
            Ok(Some(span)) => {
                let chunk = self.reader.slice(span);
                out[..chunk.len()].copy_from_slice(chunk);
                Ok(chunk.len())
            }
            Ok(None) => Ok(0),
            Err(MultipartError::Io(e)) => Err(e),
            Err(other) => Err(io::Error::new(io::ErrorKind::InvalidData, other)),
        }
    }
}

impl<R> std::fmt::Debug for Part<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Part")
            .field("headers", &self.headers)
            .finish()
    }
}
