//! Lazy `multipart/form-data` decoding over a buffered body.

use std::collections::HashMap;

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// `name` from `Content-Disposition`, if any
    pub name: Option<String>,
    /// `filename` from `Content-Disposition`, if any
    pub file_name: Option<String>,
    /// Part headers, keyed by lower-cased name
    pub headers: HashMap<String, String>,
    /// Raw part content
    pub body: Vec<u8>,
}

/// Iterator over the parts of a multipart body.
///
/// Each call to `next` decodes one part and advances a cursor into the body;
/// the sequence is single pass. Malformed input ends the sequence early
/// instead of producing an error.
#[derive(Debug, Clone)]
pub struct MultipartParts<'a> {
    body: &'a [u8],
    delimiter: Vec<u8>,
    cursor: usize,
    finished: bool,
}

impl<'a> MultipartParts<'a> {
    /// Decode `body` using `boundary`. A missing boundary yields no parts.
    pub fn new(body: &'a [u8], boundary: Option<String>) -> Self {
        let mut parts = Self {
            body,
            delimiter: Vec::new(),
            cursor: 0,
            finished: true,
        };
        if let Some(boundary) = boundary {
            parts.delimiter = format!("--{boundary}").into_bytes();
            if let Some(start) = find(body, &parts.delimiter, 0) {
                parts.cursor = start + parts.delimiter.len();
                parts.finished = false;
            }
        }
        parts
    }

    fn next_part(&mut self) -> Option<MultipartPart> {
        // The cursor sits just after a delimiter.
        let rest = &self.body[self.cursor..];
        if rest.starts_with(b"--") {
            return None;
        }
        let mut start = self.cursor;
        if rest.starts_with(b"\r\n") {
            start += 2;
        } else if rest.starts_with(b"\n") {
            start += 1;
        }

        let (headers_end, content_start) = match find(self.body, b"\r\n\r\n", start) {
            Some(pos) => (pos, pos + 4),
            None => {
                let pos = find(self.body, b"\n\n", start)?;
                (pos, pos + 2)
            }
        };
        let headers = parse_part_headers(&self.body[start..headers_end]);

        let mut closing = Vec::with_capacity(self.delimiter.len() + 2);
        closing.extend_from_slice(b"\r\n");
        closing.extend_from_slice(&self.delimiter);
        let (content_end, next_cursor) = match find(self.body, &closing, content_start) {
            Some(pos) => (pos, pos + closing.len()),
            None => {
                let pos = find(self.body, &self.delimiter, content_start)?;
                let end = if pos > content_start && self.body[pos - 1] == b'\n' { pos - 1 } else { pos };
                (end, pos + self.delimiter.len())
            }
        };
        self.cursor = next_cursor;

        let (name, file_name) = headers
            .get("content-disposition")
            .map(|value| parse_content_disposition(value))
            .unwrap_or_default();

        Some(MultipartPart {
            name,
            file_name,
            headers,
            body: self.body[content_start..content_end].to_vec(),
        })
    }
}

impl Iterator for MultipartParts<'_> {
    type Item = MultipartPart;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let part = self.next_part();
        if part.is_none() {
            self.finished = true;
        }
        part
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn parse_part_headers(block: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(block)
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Pull `name` and `filename` out of a `Content-Disposition` value.
fn parse_content_disposition(value: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut file_name = None;
    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let unquoted = raw.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(unquoted),
            "filename" => file_name = Some(unquoted),
            _ => {}
        }
    }
    (name, file_name)
}
