//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::multipart::MultipartParts;
use crate::parser::version::HttpVersion;

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target exactly as sent, including any query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers, keyed by lower-cased name
    pub headers: HashMap<String, String>,
    /// Query parameters parsed from the path, in order, duplicates kept
    pub query_params: Vec<(String, String)>,
    /// Parameters bound by the matched route
    pub params: HashMap<String, String>,
    /// The request body when it was buffered in memory
    pub body: Vec<u8>,
    /// The spooled body when it was streamed to disk instead
    pub temp_file: Option<PathBuf>,
    /// Remote peer address, if known
    pub address: Option<String>,
}

impl HttpRequest {
    /// Create a new HTTP request.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method
    /// * `path` - The request target, query string included
    /// * `version` - The HTTP version
    /// * `headers` - The HTTP headers (names are lower-cased)
    ///
    /// # Returns
    ///
    /// A new HTTP request with an empty body
    pub fn new(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        let query_params = extract_query_params(&path);
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();

        Self {
            method,
            path,
            version,
            headers,
            query_params,
            params: HashMap::new(),
            body: Vec::new(),
            temp_file: None,
            address: None,
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let mut request = Self::new(method, path, version, headers);
        request.body = body;
        request
    }

    /// The path with any query string removed.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
    }

    /// Get a header value. Lookup is case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value);
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Check whether a comma-separated header contains `token`, ignoring case.
    pub fn has_token_for_header(&self, name: &str, token: &str) -> bool {
        self.header(name).is_some_and(|value| {
            value
                .split(',')
                .any(|item| item.trim().eq_ignore_ascii_case(token))
        })
    }

    /// Whether the client asked to keep the connection open.
    pub fn supports_keep_alive(&self) -> bool {
        self.header("connection")
            .is_some_and(|value| value.trim() == "keep-alive")
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check if a query parameter exists.
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_param(name).is_some()
    }

    /// A parameter bound by the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parse the request body as JSON.
    ///
    /// # Returns
    ///
    /// The parsed JSON value, or an error if the body is not valid JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body)?;
        Ok(json)
    }

    /// Check if the request has a JSON body.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    ///
    /// Returns an empty list for any other content type. Pairs without `=`
    /// are skipped; `+` decodes to a space.
    pub fn parse_urlencoded_form(&self) -> Vec<(String, String)> {
        let Some(content_type) = self.header("content-type") else {
            return Vec::new();
        };
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        if !mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            return Vec::new();
        }

        String::from_utf8_lossy(&self.body)
            .split('&')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = decode_form_component(name)?;
                let value = decode_form_component(value).unwrap_or_default();
                Some((name, value))
            })
            .collect()
    }

    /// Lazily decode a `multipart/form-data` body.
    ///
    /// Yields nothing when the content type carries no `boundary=` parameter or
    /// the body does not contain the boundary.
    pub fn multipart(&self) -> MultipartParts<'_> {
        let boundary = self
            .header("content-type")
            .and_then(boundary_from_content_type);
        MultipartParts::new(&self.body, boundary)
    }
}

/// Extract the `boundary` parameter of a multipart content type.
pub(crate) fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mut tokens = content_type.split(';').map(str::trim);
    let mime = tokens.next()?;
    if !mime.to_ascii_lowercase().starts_with("multipart/") {
        return None;
    }
    tokens
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

fn decode_form_component(raw: &str) -> Option<String> {
    percent_decode(&raw.replace('+', " "))
}

/// Percent-decode `raw`, failing on a `%` not followed by two hex digits
/// or on a result that is not UTF-8.
fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut from = 0;
    while let Some(offset) = bytes[from..].iter().position(|&b| b == b'%') {
        let at = from + offset;
        let escape = bytes.get(at + 1..at + 3)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        from = at + 3;
    }
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}

/// Split a request line into method, target and version.
///
/// Tokens are separated by single spaces; at least three are required and
/// anything past the third is ignored.
pub(crate) fn parse_status_line(line: &str) -> Result<(Method, String, HttpVersion), Error> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < 3 {
        return Err(Error::InvalidStatusLine(line.to_string()));
    }
    Ok((Method::from(tokens[0]), tokens[1].to_string(), HttpVersion::from(tokens[2])))
}

/// Split a header line on its first colon into a lower-cased name and a
/// trimmed value. Lines without a colon yield `None`.
pub(crate) fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    Some((name.to_lowercase(), value.trim().to_string()))
}

/// Extract query parameters from a request target.
///
/// Pairs without `=` are dropped, as are pairs whose name fails to
/// percent-decode. A value that is empty or fails to decode becomes `""`.
pub fn extract_query_params(path: &str) -> Vec<(String, String)> {
    let Some((_, query)) = path.split_once('?') else {
        return Vec::new();
    };
    if query.is_empty() {
        return Vec::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = percent_decode(name)?;
            let value = percent_decode(value).unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

/// Parse an HTTP request from a byte slice.
///
/// The whole request must be present in `input`. The body is whatever
/// follows the blank line, truncated to `Content-Length` when that header is
/// a valid integer and empty otherwise.
///
/// # Arguments
///
/// * `input` - A byte slice containing the HTTP request to parse
///
/// # Returns
///
/// The parsed HTTP request, or an error if the request line is invalid
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let mut rest = input;
    let mut next_line = || -> Option<String> {
        let current: &[u8] = rest;
        if current.is_empty() {
            return None;
        }
        let (line, remaining) = match current.iter().position(|&b| b == b'\n') {
            Some(pos) => (&current[..pos], &current[pos + 1..]),
            None => (current, &current[current.len()..]),
        };
        rest = remaining;
        let line: Vec<u8> = line.iter().copied().filter(|&b| b != b'\r').collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    };

    let status_line = next_line().ok_or(Error::EmptyRequest)?;
    let (method, path, version) = parse_status_line(&status_line)?;

    let mut headers = HashMap::new();
    while let Some(line) = next_line() {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = parse_header_line(&line) {
            headers.insert(name, value);
        }
    }

    let mut request = HttpRequest::new(method, path, version, headers);
    if let Some(length) = request.header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        request.body = rest[..length.min(rest.len())].to_vec();
    }
    Ok(request)
}
