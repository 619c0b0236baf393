/// Content type for a request path, keyed by its last `.suffix`.
///
/// Paths without a suffix, or with an unknown one, are served as `text/plain`.
///
/// ```
/// # use staticd::http::mime::content_type;
/// assert_eq!(content_type("/index.html"), "text/html");
/// assert_eq!(content_type("/archive.tar"), "application/x-tar");
/// assert_eq!(content_type("/README"), "text/plain");
/// ```
pub fn content_type(path: &str) -> &'static str {
    let Some(idx) = path.rfind('.') else {
        return "text/plain";
    };

    match &path[idx..] {
        ".html" => "text/html",
        ".xml" => "text/xml",
        ".xhtml" => "application/xhtml+xml",
        ".txt" => "text/plain",
        ".rtf" => "application/rtf",
        ".pdf" => "application/pdf",
        ".word" => "application/nsword",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".au" => "audio/basic",
        ".mpeg" | ".mpg" => "video/mpeg",
        ".avi" => "video/x-msvideo",
        ".gz" => "application/x-gzip",
        ".tar" => "application/x-tar",
        ".css" => "text/css",
        ".js" => "text/javascript",
        _ => "text/plain",
    }
}
