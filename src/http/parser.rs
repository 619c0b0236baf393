use std::collections::HashMap;

use thiserror::Error;

use crate::auth::CredentialService;
use crate::buffer::ByteBuffer;
use crate::http::request::{HttpRequest, Method};

/// Logical pages that are served from `<page>.html`.
const DEFAULT_HTML: [&str; 6] = [
    "/index",
    "/register",
    "/login",
    "/welcome",
    "/video",
    "/picture",
];

const REGISTER_PAGE: &str = "/register.html";
const LOGIN_PAGE: &str = "/login.html";
const WELCOME_PAGE: &str = "/welcome.html";
const ERROR_PAGE: &str = "/error.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body,
    Finish,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line: {0:?}")]
    InvalidRequestLine(String),
    #[error("request line is not valid UTF-8")]
    InvalidEncoding,
}

/// Incremental request parser.
///
/// Consumes complete CRLF-terminated lines from the read buffer. When a line
/// is not complete yet, parsing stops and picks up from the same state on the
/// next call; consumed bytes are never looked at twice.
#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    request: HttpRequest,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::RequestLine,
            request: HttpRequest::default(),
        }
    }

    /// Forgets any partial request and starts over at the request line.
    pub fn init(&mut self) {
        self.state = ParseState::RequestLine;
        self.request = HttpRequest::default();
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Hands out the finished request and resets for the next one.
    pub fn take_request(&mut self) -> HttpRequest {
        self.state = ParseState::RequestLine;
        std::mem::take(&mut self.request)
    }

    /// Advances the state machine over whatever `buf` holds.
    ///
    /// Returns `Ok(true)` once the request is complete and `Ok(false)` when
    /// more input is needed (including when `buf` is empty).
    pub fn parse(
        &mut self,
        buf: &mut ByteBuffer,
        users: &CredentialService,
    ) -> Result<bool, ParseError> {
        if buf.readable() == 0 {
            return Ok(false);
        }

        while self.state != ParseState::Finish {
            match self.state {
                ParseState::RequestLine => {
                    let Some(end) = buf.find_crlf() else { break };
                    let line = std::str::from_utf8(&buf.peek()[..end])
                        .map_err(|_| ParseError::InvalidEncoding)?
                        .to_string();
                    buf.retrieve_until(end + 2);

                    self.parse_request_line(&line)?;
                    self.parse_path();
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(end) = buf.find_crlf() else { break };
                    let line = String::from_utf8_lossy(&buf.peek()[..end]).into_owned();
                    buf.retrieve_until(end + 2);

                    if !self.parse_header(&line) {
                        self.state = if self.expects_body(buf) {
                            ParseState::Body
                        } else {
                            ParseState::Finish
                        };
                    }
                }
                ParseState::Body => {
                    let len = self.request.content_length();
                    let body = if len > 0 {
                        if buf.readable() < len {
                            break;
                        }
                        let body = buf.peek()[..len].to_vec();
                        buf.retrieve(len);
                        body
                    } else {
                        // no length given: the rest of the line is the body
                        match buf.find_crlf() {
                            Some(end) => {
                                let body = buf.peek()[..end].to_vec();
                                buf.retrieve_until(end + 2);
                                body
                            }
                            None => {
                                let body = buf.peek().to_vec();
                                buf.retrieve(body.len());
                                body
                            }
                        }
                    };

                    tracing::debug!(len = body.len(), "Request body");
                    self.request.body = body;
                    self.parse_post(users);
                    self.state = ParseState::Finish;
                }
                ParseState::Finish => unreachable!("loop exits on Finish"),
            }
        }

        if self.state == ParseState::Finish {
            tracing::debug!(
                method = %self.request.method,
                path = %self.request.path,
                version = %self.request.version,
                "Request parsed"
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// `METHOD SP PATH SP HTTP/VERSION`, nothing more.
    fn parse_request_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut parts = line.splitn(3, ' ');
        let method = parts.next();
        let path = parts.next();
        let version = parts
            .next()
            .filter(|v| !v.contains(' '))
            .and_then(|v| v.strip_prefix("HTTP/"));

        match (method, path, version) {
            (Some(method), Some(path), Some(version)) => {
                self.request.method = Method::parse(method);
                self.request.path = path.to_string();
                self.request.version = version.to_string();
                Ok(())
            }
            _ => {
                tracing::error!(line = %line, "Request line error");
                Err(ParseError::InvalidRequestLine(line.to_string()))
            }
        }
    }

    fn parse_path(&mut self) {
        let path = &mut self.request.path;
        if path.as_str() == "/" {
            *path = "/index.html".to_string();
        } else if DEFAULT_HTML.contains(&path.as_str()) {
            path.push_str(".html");
        }
    }

    /// `KEY: VALUE`; returns false for any other line, the blank one included.
    fn parse_header(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.split_once(':') else {
            return false;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        self.request
            .headers
            .insert(key.to_string(), value.to_string());
        true
    }

    fn expects_body(&self, buf: &ByteBuffer) -> bool {
        self.request.content_length() > 0
            || (self.request.method == Method::POST && buf.readable() > 0)
    }

    fn parse_post(&mut self, users: &CredentialService) {
        if !self.request.is_form_post() {
            return;
        }
        self.request.form = decode_form(&self.request.body);

        let is_login = match self.request.path.as_str() {
            REGISTER_PAGE => false,
            LOGIN_PAGE => true,
            _ => return,
        };

        let username = self.request.form_value("username").unwrap_or_default();
        let password = self.request.form_value("password").unwrap_or_default();
        let verified = users.verify(username, password, is_login);

        self.request.path = if verified { WELCOME_PAGE } else { ERROR_PAGE }.to_string();
    }
}

/// Decodes an `application/x-www-form-urlencoded` body.
///
/// `+` becomes a space, `%XX` is decoded when followed by exactly two hex
/// digits, pairs are split on `&`, and a trailing key without `=` maps to an
/// empty value. Repeated keys keep the last value.
pub fn decode_form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}
