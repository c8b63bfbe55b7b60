//! Decoder implementation for `multipart/form-data` bodies.
//!
//! This module splits a multipart body into its parts as described in
//! [RFC 7578](https://tools.ietf.org/html/rfc7578). The decoder is incremental:
//! it accepts the body in arbitrary slices and emits part data as soon as it
//! is sure the bytes don't belong to the next boundary, so a file part never
//! has to be buffered whole.

use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem::Finder;
use tokio_util::codec::Decoder;
use tracing::trace;

use super::part_header::PartHeader;
use crate::protocol::BodyError;
use crate::ensure;
use MultipartState::*;

/// Maximum size of the header block of a single part.
pub const MAX_PART_HEADER_SIZE: usize = 8 * 1024;

const CRLF: &[u8] = b"\r\n";
const CRLF_CRLF: &[u8] = b"\r\n\r\n";

/// An item of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartItem {
    /// A new part starts
    Header(PartHeader),
    /// A piece of the current part's content
    Chunk(Bytes),
    /// The current part is complete
    PartEnd,
    /// The closing boundary was read
    Eof,
}

impl PartItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PartItem::Eof)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultipartState {
    /// Skip anything before the first boundary
    Preamble,
    /// Read what follows a boundary: `--` or the end of the boundary line
    Delimiter,
    /// Read the header block of a part
    Headers,
    /// Read part content up to the next boundary
    Body,
    /// The closing boundary was read, the epilogue is ignored
    Done,
}

/// A decoder splitting a multipart body into [`PartItem`]s.
///
/// The items of every part arrive as `Header`, any number of `Chunk`s, then
/// `PartEnd`. `Eof` is emitted once, after the closing boundary.
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    state: MultipartState,
    /// `\r\n--boundary`
    delimiter: Vec<u8>,
    finder: Finder<'static>,
}

impl MultipartDecoder {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        let finder = Finder::new(&delimiter).into_owned();
        Self { state: Preamble, delimiter, finder }
    }

    /// Returns true once the closing boundary was read.
    pub fn is_finished(&self) -> bool {
        self.state == Done
    }

    /// The first boundary may open the body without a leading CRLF.
    fn read_preamble(&mut self, src: &mut BytesMut) -> Option<MultipartState> {
        let dash_boundary = &self.delimiter[CRLF.len()..];
        if src.starts_with(dash_boundary) {
            src.advance(dash_boundary.len());
            return Some(Delimiter);
        }

        if let Some(pos) = self.finder.find(src) {
            src.advance(pos + self.delimiter.len());
            return Some(Delimiter);
        }

        // keep a tail that may be the start of the boundary
        let keep = (self.delimiter.len() - 1).min(src.len());
        src.advance(src.len() - keep);
        None
    }

    fn read_delimiter(src: &mut BytesMut) -> Result<Option<MultipartState>, BodyError> {
        if src.len() < 2 {
            return Ok(None);
        }

        if src.starts_with(b"--") {
            src.advance(2);
            return Ok(Some(Done));
        }

        // transport padding is allowed before the line break
        let padding = src.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
        let line = &src[padding..];
        if line.len() < 2 {
            return Ok(None);
        }

        ensure!(line.starts_with(CRLF), BodyError::invalid_multipart("boundary must be followed by CRLF"));
        src.advance(padding + CRLF.len());
        Ok(Some(Headers))
    }

    fn read_headers(src: &mut BytesMut) -> Result<Option<PartHeader>, BodyError> {
        // a part without any header starts straight with the empty line
        let end = if src.starts_with(CRLF) { Some(0) } else { memchr::memmem::find(src, CRLF_CRLF) };

        let Some(end) = end else {
            ensure!(
                src.len() <= MAX_PART_HEADER_SIZE,
                BodyError::invalid_multipart(format!("part header size exceed the limit {MAX_PART_HEADER_SIZE}"))
            );
            return Ok(None);
        };

        let block_len = if end == 0 { CRLF.len() } else { end + CRLF_CRLF.len() };
        ensure!(
            block_len <= MAX_PART_HEADER_SIZE,
            BodyError::invalid_multipart(format!("part header size exceed the limit {MAX_PART_HEADER_SIZE}"))
        );

        let block = src.split_to(block_len);
        PartHeader::parse(&block).map(Some)
    }

    fn read_body(&mut self, src: &mut BytesMut) -> Option<PartItem> {
        match self.finder.find(src) {
            Some(0) => {
                src.advance(self.delimiter.len());
                self.state = Delimiter;
                Some(PartItem::PartEnd)
            }
            Some(pos) => Some(PartItem::Chunk(src.split_to(pos).freeze())),
            None => {
                // the last bytes may be a partial delimiter
                let safe = src.len().saturating_sub(self.delimiter.len() - 1);
                (safe > 0).then(|| PartItem::Chunk(src.split_to(safe).freeze()))
            }
        }
    }
}

impl Decoder for MultipartDecoder {
    type Item = PartItem;
    type Error = BodyError;

    /// Decodes the next multipart item from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(item))` when a header, a content chunk or a boundary was read
    /// - `Ok(None)` when more data is needed, or after the closing boundary
    /// - `Err(BodyError)` if the body violates the multipart framing
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                Preamble => match self.read_preamble(src) {
                    Some(state) => self.state = state,
                    None => return Ok(None),
                },

                Delimiter => match Self::read_delimiter(src)? {
                    Some(Done) => {
                        trace!("read closing multipart boundary");
                        self.state = Done;
                        return Ok(Some(PartItem::Eof));
                    }
                    Some(state) => self.state = state,
                    None => return Ok(None),
                },

                Headers => {
                    return match Self::read_headers(src)? {
                        Some(header) => {
                            trace!(name = header.name(), file = header.is_file(), "read multipart part header");
                            self.state = Body;
                            Ok(Some(PartItem::Header(header)))
                        }
                        None => Ok(None),
                    };
                }

                Body => {
                    let item = self.read_body(src);
                    if let Some(PartItem::Chunk(bytes)) = &item {
                        trace!(len = bytes.len(), "read multipart part bytes");
                    }
                    return Ok(item);
                }

                Done => {
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn crlf(s: &str) -> String {
        s.replace('\n', "\r\n")
    }

    fn sample() -> String {
        crlf(indoc! {r#"
            --X-BOUNDARY
            Content-Disposition: form-data; name="name"

            virk
            --X-BOUNDARY
            Content-Disposition: form-data; name="package"; filename="package.json"
            Content-Type: application/json

            {"name": "micro"}
            --X-BOUNDARY--
        "#})
    }

    /// A decoded part: its header and the whole of its content.
    type Part = (PartHeader, Vec<u8>);

    fn decode_in_slices(body: &[u8], slice_len: usize) -> (Vec<Part>, bool) {
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        let mut buffer = BytesMut::new();
        let mut parts: Vec<Part> = Vec::new();
        let mut eof = false;

        for slice in body.chunks(slice_len) {
            buffer.extend_from_slice(slice);
            while let Some(item) = decoder.decode(&mut buffer).unwrap() {
                match item {
                    PartItem::Header(header) => parts.push((header, Vec::new())),
                    PartItem::Chunk(bytes) => parts.last_mut().unwrap().1.extend_from_slice(&bytes),
                    PartItem::PartEnd => {}
                    PartItem::Eof => eof = true,
                }
            }
        }

        (parts, eof)
    }

    #[test]
    fn test_basic() {
        let body = sample();
        let (parts, eof) = decode_in_slices(body.as_bytes(), body.len());

        assert!(eof);
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].0.name(), "name");
        assert_eq!(parts[0].1, b"virk");

        assert_eq!(parts[1].0.name(), "package");
        assert_eq!(parts[1].0.filename(), Some("package.json"));
        assert_eq!(parts[1].0.content_type(), Some("application/json"));
        assert_eq!(parts[1].1, br#"{"name": "micro"}"#);
    }

    #[test]
    fn test_any_slicing() {
        let body = sample();
        let (expected, _) = decode_in_slices(body.as_bytes(), body.len());

        for slice_len in [1, 2, 3, 7, 13, 64] {
            let (parts, eof) = decode_in_slices(body.as_bytes(), slice_len);
            assert!(eof, "slice_len {slice_len}");
            assert_eq!(parts, expected, "slice_len {slice_len}");
        }
    }

    #[test]
    fn test_item_order() {
        let body = sample();
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        let mut buffer = BytesMut::from(body.as_bytes());

        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::Header(_))));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::Chunk(Bytes::from_static(b"virk"))));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::PartEnd));
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::Header(_))));
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::Chunk(_))));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::PartEnd));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PartItem::Eof));
        assert!(decoder.is_finished());
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_preamble_and_epilogue() {
        let body = crlf(indoc! {r#"
            this is the preamble
            --X-BOUNDARY
            Content-Disposition: form-data; name="a"

            1
            --X-BOUNDARY--
            this is the epilogue
        "#});

        let (parts, eof) = decode_in_slices(body.as_bytes(), 5);
        assert!(eof);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].1, b"1");
    }

    #[test]
    fn test_content_with_boundary_like_bytes() {
        let body = crlf(indoc! {r#"
            --X-BOUNDARY
            Content-Disposition: form-data; name="a"

            line one
            --X-BOUND
            --X-BOUNDARY--
        "#});

        let (parts, _) = decode_in_slices(body.as_bytes(), 4);
        assert_eq!(parts[0].1, b"line one\r\n--X-BOUND");
    }

    #[test]
    fn test_empty_part() {
        let body = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"empty\"\r\n\r\n\r\n--X-BOUNDARY--\r\n";

        let (parts, eof) = decode_in_slices(body.as_bytes(), 3);
        assert!(eof);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].0.name(), "empty");
        assert!(parts[0].1.is_empty());
    }

    #[test]
    fn test_missing_crlf_after_boundary() {
        let mut buffer = BytesMut::from(&b"--X-BOUNDARYjunk\r\n"[..]);
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_missing_content_disposition() {
        let mut buffer = BytesMut::from(&b"--X-BOUNDARY\r\nContent-Type: text/plain\r\n\r\nabc\r\n--X-BOUNDARY--"[..]);
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_too_large_header() {
        let mut body = b"--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"".to_vec();
        body.extend(std::iter::repeat_n(b'a', MAX_PART_HEADER_SIZE));

        let mut buffer = BytesMut::from(&body[..]);
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        let error = decoder.decode(&mut buffer).unwrap_err();
        assert_eq!(error.code(), "E_INVALID_MULTIPART");
    }

    #[test]
    fn test_incomplete_body_is_not_finished() {
        let body = sample();
        let cut = &body.as_bytes()[..body.len() / 2];
        let mut decoder = MultipartDecoder::new(BOUNDARY);
        let mut buffer = BytesMut::from(cut);
        while decoder.decode(&mut buffer).unwrap().is_some() {}
        assert!(!decoder.is_finished());
    }
}
