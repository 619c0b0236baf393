use staticd::http::request::{HttpRequest, Method, RequestBuilder};

#[test]
fn test_request_header_retrieval() {
    let req = RequestBuilder::new()
        .path("/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .header("Content-Length", "42")
        .build()
        .unwrap();
    assert_eq!(req.content_length(), 42);

    let req = RequestBuilder::new()
        .path("/api")
        .header("Content-Length", "lots")
        .build()
        .unwrap();
    assert_eq!(req.content_length(), 0);

    let req = RequestBuilder::new().path("/").build().unwrap();
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_keep_alive_requires_header_and_http11() {
    let req = RequestBuilder::new()
        .path("/")
        .header("Connection", "keep-alive")
        .build()
        .unwrap();
    assert!(req.is_keep_alive());

    let req = RequestBuilder::new()
        .path("/")
        .version("1.0")
        .header("Connection", "keep-alive")
        .build()
        .unwrap();
    assert!(!req.is_keep_alive());

    let req = RequestBuilder::new().path("/").build().unwrap();
    assert!(!req.is_keep_alive());

    let req = RequestBuilder::new()
        .path("/")
        .header("Connection", "close")
        .build()
        .unwrap();
    assert!(!req.is_keep_alive());
}

#[test]
fn test_form_post_detection() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/login.html")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .build()
        .unwrap();
    assert!(req.is_form_post());

    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/login.html")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .build()
        .unwrap();
    assert!(!req.is_form_post());
}

#[test]
fn test_builder_requires_path() {
    assert!(RequestBuilder::new().build().is_err());
}

#[test]
fn test_method_parse_and_display() {
    assert_eq!(Method::parse("DELETE"), Method::DELETE);
    assert_eq!(Method::parse("BREW"), Method::Other("BREW".to_string()));
    assert_eq!(Method::PATCH.to_string(), "PATCH");
    assert_eq!(Method::Other("BREW".into()).as_str(), "BREW");
}

#[test]
fn test_default_request() {
    let req = HttpRequest::default();
    assert_eq!(req.method, Method::GET);
    assert!(req.path.is_empty());
    assert!(req.form.is_empty());
    assert_eq!(req.form_value("username"), None);
}
