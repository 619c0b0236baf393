use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use memmap2::Mmap;

use crate::buffer::ByteBuffer;
use crate::http::mime;

/// HTTP status codes the server answers with.
///
/// - `Ok` (200): file served
/// - `BadRequest` (400): malformed request line
/// - `Forbidden` (403): file not world-readable
/// - `NotFound` (404): file missing or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Maps a numeric code to a known status.
    ///
    /// ```
    /// # use staticd::http::response::StatusCode;
    /// assert_eq!(StatusCode::from_u16(404), Some(StatusCode::NotFound));
    /// assert_eq!(StatusCode::from_u16(500), None);
    /// ```
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            200 => Some(StatusCode::Ok),
            400 => Some(StatusCode::BadRequest),
            403 => Some(StatusCode::Forbidden),
            404 => Some(StatusCode::NotFound),
            _ => None,
        }
    }

    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use staticd::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
        }
    }

    /// Canned page served in place of the requested path, for error codes.
    pub fn error_page(&self) -> Option<&'static str> {
        match self {
            StatusCode::Ok => None,
            StatusCode::BadRequest => Some("/400.html"),
            StatusCode::Forbidden => Some("/403.html"),
            StatusCode::NotFound => Some("/404.html"),
        }
    }
}

/// HTML body used when the target file cannot be opened or mapped.
pub fn error_body(code: u16, message: &str) -> String {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BadRequest);
    format!(
        "<html><title>Error</title><body bgcolor=\"ffffff\">{} : {}\n<p>{}</p><hr><em>staticd</em></body></html>",
        code,
        status.reason_phrase(),
        message
    )
}

/// Response for one request: status line and headers go into the caller's
/// write buffer, the body is either a read-only mapping of the target file or
/// an inline error page appended after the headers.
///
/// The mapping belongs to the response and is released exactly once, by the
/// next [`init`](Self::init) or when the response is dropped.
#[derive(Debug)]
pub struct HttpResponse {
    code: u16,
    keep_alive: bool,
    path: String,
    doc_root: PathBuf,
    file: Option<Mmap>,
    file_len: usize,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            code: 200,
            keep_alive: false,
            path: String::new(),
            doc_root: PathBuf::new(),
            file: None,
            file_len: 0,
        }
    }

    /// Prepares for a new response, releasing the previous mapping.
    ///
    /// `code` 200 means "serve `path` if possible"; any other code is answered
    /// as is (mapped onto its canned page).
    pub fn init(&mut self, doc_root: &Path, path: &str, keep_alive: bool, code: u16) {
        self.unmap_file();
        self.code = code;
        self.keep_alive = keep_alive;
        self.path = path.to_string();
        self.doc_root = doc_root.to_path_buf();
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Path actually served, after error-page substitution.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The mapped file body, if any.
    pub fn file(&self) -> Option<&[u8]> {
        self.file.as_deref()
    }

    pub fn file_len(&self) -> usize {
        self.file_len
    }

    pub fn unmap_file(&mut self) {
        self.file = None;
        self.file_len = 0;
    }

    /// Writes status line and headers (and an inline body on failure) into
    /// `buf`, mapping the target file when there is one.
    pub fn make_response(&mut self, buf: &mut ByteBuffer) {
        if self.code == 200 {
            self.code = self.check_target();
        }
        if StatusCode::from_u16(self.code).is_none() {
            self.code = 400;
        }
        self.error_html();
        self.add_state_line(buf);
        self.add_header(buf);
        self.add_content(buf);
    }

    fn full_path(&self) -> PathBuf {
        self.doc_root.join(self.path.trim_start_matches('/'))
    }

    fn check_target(&self) -> u16 {
        if Path::new(&self.path)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return 403;
        }
        match fs::metadata(self.full_path()) {
            Err(_) => 404,
            Ok(meta) if meta.is_dir() => 404,
            Ok(meta) if meta.permissions().mode() & 0o004 == 0 => 403,
            Ok(_) => 200,
        }
    }

    fn error_html(&mut self) {
        if let Some(page) = StatusCode::from_u16(self.code).and_then(|s| s.error_page()) {
            self.path = page.to_string();
        }
    }

    fn add_state_line(&self, buf: &mut ByteBuffer) {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::BadRequest);
        let line = format!("HTTP/1.1 {} {}\r\n", self.code, status.reason_phrase());
        buf.append(line.as_bytes());
    }

    fn add_header(&self, buf: &mut ByteBuffer) {
        if self.keep_alive {
            buf.append(b"Connection: keep-alive\r\n");
            buf.append(b"keep-alive: max=6, timeout=120\r\n");
        } else {
            buf.append(b"Connection: close\r\n");
        }
        let content_type = format!("Content-type: {}\r\n", mime::content_type(&self.path));
        buf.append(content_type.as_bytes());
    }

    fn add_content(&mut self, buf: &mut ByteBuffer) {
        let full = self.full_path();
        let file = match File::open(&full) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %full.display(), error = %e, "Open failed");
                self.error_content(buf, "File NotFound!");
                return;
            }
        };

        let len = match file.metadata() {
            Ok(meta) => meta.len() as usize,
            Err(_) => {
                self.error_content(buf, "File NotFound!");
                return;
            }
        };

        if len > 0 {
            // SAFETY: the mapping is read-only and private to this response;
            // files under the document root are not truncated while served.
            match unsafe { Mmap::map(&file) } {
                Ok(map) => self.file = Some(map),
                Err(e) => {
                    tracing::warn!(path = %full.display(), error = %e, "Mapping failed");
                    self.error_content(buf, "File NotFound!");
                    return;
                }
            }
        }
        self.file_len = len;
        tracing::debug!(path = %full.display(), len, "File mapped");

        let header = format!("Content-length: {len}\r\n\r\n");
        buf.append(header.as_bytes());
    }

    fn error_content(&self, buf: &mut ByteBuffer, message: &str) {
        let body = error_body(self.code, message);
        let header = format!("Content-length: {}\r\n\r\n", body.len());
        buf.append(header.as_bytes());
        buf.append(body.as_bytes());
    }
}
