//! Multipart part headers and the multipart boundary parameter.

use mime::Mime;

use crate::protocol::BodyError;
use crate::ensure;

/// RFC 2046 limits a boundary to 70 characters.
const MAX_BOUNDARY_LEN: usize = 70;

/// Maximum number of headers in a single part.
const MAX_PART_HEADERS: usize = 16;

/// Reads the `boundary` parameter of a `multipart/form-data` media type.
pub fn parse_boundary(content_type: &str) -> Result<String, BodyError> {
    let mime = content_type
        .trim()
        .parse::<Mime>()
        .map_err(|e| BodyError::invalid_multipart(format!("invalid content type: {e}")))?;

    let boundary = mime
        .get_param(mime::BOUNDARY)
        .ok_or_else(|| BodyError::invalid_multipart("missing boundary in multipart content type"))?;

    let boundary = boundary.as_str();
    ensure!(
        !boundary.is_empty() && boundary.len() <= MAX_BOUNDARY_LEN,
        BodyError::invalid_multipart(format!("invalid multipart boundary length {}", boundary.len()))
    );

    Ok(boundary.to_owned())
}

/// The headers of one multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
}

impl PartHeader {
    /// The field name from `Content-Disposition`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client file name, reduced to its base name.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns true if the part carries a file rather than a field value.
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// Parses a header block, including its terminating empty line.
    pub(crate) fn parse(block: &[u8]) -> Result<Self, BodyError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
        let headers = match httparse::parse_headers(block, &mut headers) {
            Ok(httparse::Status::Complete((_, headers))) => headers,
            Ok(httparse::Status::Partial) => return Err(BodyError::invalid_multipart("incomplete part headers")),
            Err(e) => return Err(BodyError::invalid_multipart(format!("invalid part headers: {e}"))),
        };

        let mut disposition = None;
        let mut content_type = None;
        for header in headers {
            let value = std::str::from_utf8(header.value)
                .map_err(|e| BodyError::invalid_multipart(format!("part header {} is not utf8: {e}", header.name)))?;

            if header.name.eq_ignore_ascii_case("content-disposition") {
                disposition = Some(value);
            } else if header.name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_owned());
            }
        }

        let disposition =
            disposition.ok_or_else(|| BodyError::invalid_multipart("missing Content-Disposition in part"))?;
        let (name, filename) = parse_content_disposition(disposition)?;

        Ok(Self { name, filename, content_type })
    }
}

/// Parses `form-data; name="field"; filename="a.txt"` into the name and the base file name.
fn parse_content_disposition(value: &str) -> Result<(String, Option<String>), BodyError> {
    let mut params = DispositionParams { rest: value };

    let disposition = params.token();
    ensure!(
        disposition.eq_ignore_ascii_case("form-data"),
        BodyError::invalid_multipart(format!("unsupported content disposition {disposition:?}"))
    );

    let mut name = None;
    let mut filename = None;
    while let Some((key, value)) = params.next_param() {
        if key.eq_ignore_ascii_case("name") {
            name = Some(value);
        } else if key.eq_ignore_ascii_case("filename") {
            filename = Some(base_name(&value).to_owned());
        }
    }

    let name = name.ok_or_else(|| BodyError::invalid_multipart("missing field name in Content-Disposition"))?;
    Ok((name, filename))
}

/// Browsers on some platforms send the full client path.
fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

struct DispositionParams<'a> {
    rest: &'a str,
}

impl<'a> DispositionParams<'a> {
    /// Reads an unquoted token up to the next `;`.
    fn token(&mut self) -> &'a str {
        let end = self.rest.find(';').unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        token.trim()
    }

    fn next_param(&mut self) -> Option<(&'a str, String)> {
        loop {
            self.rest = self.rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
            if self.rest.is_empty() {
                return None;
            }

            let end = self.rest.find(['=', ';']).unwrap_or(self.rest.len());
            let key = self.rest[..end].trim();
            self.rest = &self.rest[end..];

            // a bare flag without a value
            let Some(rest) = self.rest.strip_prefix('=') else {
                continue;
            };
            self.rest = rest.trim_start();

            let value = if self.rest.starts_with('"') { self.quoted() } else { self.token().to_owned() };
            return Some((key, value));
        }
    }

    fn quoted(&mut self) -> String {
        let mut value = String::new();
        let mut chars = self.rest.char_indices().skip(1).peekable();

        while let Some((idx, c)) = chars.next() {
            match c {
                // only `\"` and `\\` are escapes, raw windows paths keep their separators
                '\\' if matches!(chars.peek(), Some((_, '"' | '\\'))) => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '"' => {
                    self.rest = &self.rest[idx + 1..];
                    return value;
                }
                c => value.push(c),
            }
        }

        // unterminated quote, take everything
        self.rest = "";
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        assert_eq!(parse_boundary("multipart/form-data; boundary=----abc123").unwrap(), "----abc123");
        assert_eq!(parse_boundary("multipart/form-data; boundary=\"quoted boundary\"").unwrap(), "quoted boundary");
        assert!(parse_boundary("multipart/form-data").is_err());
        assert!(parse_boundary(&format!("multipart/form-data; boundary={}", "a".repeat(71))).is_err());
    }

    #[test]
    fn test_field_part() {
        let header = PartHeader::parse(b"Content-Disposition: form-data; name=\"user[email]\"\r\n\r\n").unwrap();
        assert_eq!(header.name(), "user[email]");
        assert!(!header.is_file());
        assert_eq!(header.content_type(), None);
    }

    #[test]
    fn test_file_part() {
        let block = b"content-disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n";
        let header = PartHeader::parse(block).unwrap();
        assert_eq!(header.name(), "avatar");
        assert_eq!(header.filename(), Some("me.png"));
        assert_eq!(header.content_type(), Some("image/png"));
        assert!(header.is_file());
    }

    #[test]
    fn test_file_name_is_reduced_to_base_name() {
        let block = b"Content-Disposition: form-data; name=\"doc\"; filename=\"C:\\\\Users\\\\me\\\\cv.pdf\"\r\n\r\n";
        let header = PartHeader::parse(block).unwrap();
        assert_eq!(header.filename(), Some("cv.pdf"));

        let block = b"Content-Disposition: form-data; name=\"doc\"; filename=\"C:\\tmp\\raw.pdf\"\r\n\r\n";
        assert_eq!(PartHeader::parse(block).unwrap().filename(), Some("raw.pdf"));

        let block = b"Content-Disposition: form-data; name=\"doc\"; filename=\"../../etc/passwd\"\r\n\r\n";
        assert_eq!(PartHeader::parse(block).unwrap().filename(), Some("passwd"));
    }

    #[test]
    fn test_quoted_values() {
        let (name, filename) =
            parse_content_disposition(r#"form-data; name="a;b"; filename="say \"hi\".txt""#).unwrap();
        assert_eq!(name, "a;b");
        assert_eq!(filename.as_deref(), Some("say \"hi\".txt"));

        let (name, filename) = parse_content_disposition("form-data; name=plain; filename=").unwrap();
        assert_eq!(name, "plain");
        assert_eq!(filename.as_deref(), Some(""));
    }

    #[test]
    fn test_invalid_disposition() {
        assert!(parse_content_disposition("attachment; name=\"a\"").is_err());
        assert!(parse_content_disposition("form-data; filename=\"a.txt\"").is_err());
        assert!(PartHeader::parse(b"Content-Type: text/plain\r\n\r\n").is_err());
        assert!(PartHeader::parse(b"not a header\r\n\r\n").is_err());
    }
}
