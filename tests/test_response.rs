use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use staticd::buffer::ByteBuffer;
use staticd::http::mime::content_type;
use staticd::http::response::{HttpResponse, StatusCode, error_body};

fn write_file(root: &Path, name: &str, body: &[u8], mode: u32) {
    let path = root.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
}

fn respond(root: &Path, path: &str, keep_alive: bool) -> (HttpResponse, String) {
    let mut resp = HttpResponse::new();
    let mut buf = ByteBuffer::new();
    resp.init(root, path, keep_alive, 200);
    resp.make_response(&mut buf);
    let header = buf.retrieve_all_to_string();
    (resp, header)
}

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::Forbidden.reason_phrase(), "Forbidden");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
}

#[test]
fn test_status_code_error_pages() {
    assert_eq!(StatusCode::Ok.error_page(), None);
    assert_eq!(StatusCode::BadRequest.error_page(), Some("/400.html"));
    assert_eq!(StatusCode::Forbidden.error_page(), Some("/403.html"));
    assert_eq!(StatusCode::NotFound.error_page(), Some("/404.html"));
}

#[test]
fn test_serves_readable_file_with_exact_length() {
    let root = tempfile::tempdir().unwrap();
    let body = b"<html><body>hi</body></html>";
    write_file(root.path(), "index.html", body, 0o644);

    let (resp, header) = respond(root.path(), "/index.html", true);

    assert!(header.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(header.contains("Connection: keep-alive\r\n"));
    assert!(header.contains("keep-alive: max=6, timeout=120\r\n"));
    assert!(header.contains("Content-type: text/html\r\n"));
    assert!(header.ends_with(&format!("Content-length: {}\r\n\r\n", body.len())));
    assert_eq!(resp.file(), Some(&body[..]));
    assert_eq!(resp.file_len(), body.len());
}

#[test]
fn test_close_header_without_keep_alive() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "a.css", b"body{}", 0o644);

    let (_, header) = respond(root.path(), "/a.css", false);
    assert!(header.contains("Connection: close\r\n"));
    assert!(!header.contains("keep-alive: max"));
    assert!(header.contains("Content-type: text/css\r\n"));
}

#[test]
fn test_missing_file_is_404() {
    let root = tempfile::tempdir().unwrap();
    let (resp, header) = respond(root.path(), "/nope.html", false);

    assert_eq!(resp.code(), 404);
    assert_eq!(resp.path(), "/404.html");
    assert!(header.starts_with("HTTP/1.1 404 Not Found\r\n"));
    // no 404.html in the root: inline error body follows the headers
    let (head, body) = header.split_once("\r\n\r\n").unwrap();
    assert!(body.contains("File NotFound!"));
    assert!(head.ends_with(&format!("Content-length: {}", body.len())));
    assert_eq!(body, error_body(404, "File NotFound!"));
    assert!(resp.file().is_none());
}

#[test]
fn test_directory_is_404() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();
    let (resp, _) = respond(root.path(), "/sub", false);
    assert_eq!(resp.code(), 404);
}

#[test]
fn test_404_serves_error_page_when_present() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "404.html", b"gone", 0o644);

    let (resp, header) = respond(root.path(), "/missing", false);
    assert!(header.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(header.ends_with("Content-length: 4\r\n\r\n"));
    assert_eq!(resp.file(), Some(&b"gone"[..]));
}

#[test]
fn test_not_world_readable_is_403() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "secret.txt", b"top secret", 0o600);

    let (resp, header) = respond(root.path(), "/secret.txt", false);
    assert_eq!(resp.code(), 403);
    assert!(header.starts_with("HTTP/1.1 403 Forbidden\r\n"));
}

#[test]
fn test_parent_dir_is_403() {
    let root = tempfile::tempdir().unwrap();
    let (resp, _) = respond(root.path(), "/../etc/passwd", false);
    assert_eq!(resp.code(), 403);
}

#[test]
fn test_empty_file_is_not_mapped() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "empty.txt", b"", 0o644);

    let (resp, header) = respond(root.path(), "/empty.txt", false);
    assert_eq!(resp.code(), 200);
    assert!(header.ends_with("Content-length: 0\r\n\r\n"));
    assert!(resp.file().is_none());
}

#[test]
fn test_non_200_code_is_answered_as_is() {
    let root = tempfile::tempdir().unwrap();
    let mut resp = HttpResponse::new();
    let mut buf = ByteBuffer::new();
    resp.init(root.path(), "", false, 400);
    resp.make_response(&mut buf);

    assert!(buf.retrieve_all_to_string().starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(resp.path(), "/400.html");
}

#[test]
fn test_unknown_code_becomes_400() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "x", b"should not be served", 0o644);
    let mut resp = HttpResponse::new();
    let mut buf = ByteBuffer::new();
    resp.init(root.path(), "/x", false, 599);
    resp.make_response(&mut buf);

    assert_eq!(resp.code(), 400);
    assert_eq!(resp.path(), "/400.html");
    assert!(resp.file().is_none());
    assert!(buf.retrieve_all_to_string().starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[test]
fn test_init_releases_previous_mapping() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "a.txt", b"aaaa", 0o644);

    let (mut resp, _) = respond(root.path(), "/a.txt", false);
    assert!(resp.file().is_some());
    resp.init(root.path(), "/b.txt", false, 200);
    assert!(resp.file().is_none());
    assert_eq!(resp.file_len(), 0);
}

#[test]
fn test_content_types() {
    assert_eq!(content_type("/index.html"), "text/html");
    assert_eq!(content_type("/a/b/pic.jpg"), "image/jpeg");
    assert_eq!(content_type("/a.jpeg"), "image/jpeg");
    assert_eq!(content_type("/app.js"), "text/javascript");
    assert_eq!(content_type("/clip.avi"), "video/x-msvideo");
    assert_eq!(content_type("/unknown.xyz"), "text/plain");
    assert_eq!(content_type("/noext"), "text/plain");
}

#[test]
fn test_error_body() {
    let body = error_body(404, "File NotFound!");
    assert!(body.starts_with("<html><title>Error</title>"));
    assert!(body.contains("404 : Not Found\n<p>File NotFound!</p>"));
}
