use std::collections::HashMap;
use std::fmt;

/// HTTP request methods.
///
/// The request line accepts any method token; the common ones get their own
/// variant and everything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Method {
    /// GET - Retrieve a resource
    #[default]
    GET,
    /// POST - Submit a form
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
    /// Any other token
    Other(String),
}

impl Method {
    /// Parses an HTTP method token (case-sensitive).
    ///
    /// ```
    /// # use staticd::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("get"), Method::Other("get".into()));
    /// ```
    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP request.
///
/// Rebuilt for every request on a connection and discarded once the response
/// has been prepared.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Normalized request path (e.g., "/index.html")
    pub path: String,
    /// Version from the request line without the `HTTP/` prefix (e.g. "1.1")
    pub version: String,
    /// Request headers, keys exactly as received
    pub headers: HashMap<String, String>,
    /// Raw request body
    pub body: Vec<u8>,
    /// Decoded `application/x-www-form-urlencoded` fields
    pub form: HashMap<String, String>,
}

/// Builder for constructing requests in tests and tools.
#[derive(Default)]
pub struct RequestBuilder {
    method: Method,
    path: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<HttpRequest, &'static str> {
        Ok(HttpRequest {
            method: self.method,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "1.1".to_string()),
            headers: self.headers,
            body: self.body,
            form: HashMap::new(),
        })
    }
}

impl HttpRequest {
    /// Retrieves a header value by its exact name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Parsed `Content-Length`, or 0 when missing or not a number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Keep-alive only when explicitly requested over HTTP/1.1.
    pub fn is_keep_alive(&self) -> bool {
        self.header("Connection") == Some("keep-alive") && self.version == "1.1"
    }

    /// Decoded form field, if present.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form.get(key).map(|v| v.as_str())
    }

    pub fn is_form_post(&self) -> bool {
        self.method == Method::POST
            && self.header("Content-Type") == Some("application/x-www-form-urlencoded")
    }
}
