//! Request path to upstream path mapping

use percent_encoding::percent_decode_str;

/// A request path accepted for proxying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPath {
    /// Path handed to SIZE / RETR
    pub path: String,
    /// Last segment, used for the content type
    pub file_name: String,
}

/// Decode and validate a request path
///
/// Returns `None` for the root, for `..` segments, control characters or
/// invalid UTF-8. Empty and `.` segments are dropped. The result is
/// relative to the login directory unless `root` is set.
pub fn resolve(raw: &str, root: &str) -> Option<UpstreamPath> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains(['\0', '\r', '\n']) {
        return None;
    }

    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s => segments.push(s),
        }
    }
    let file_name = (*segments.last()?).to_string();
    let joined = segments.join("/");

    let root = root.trim_end_matches('/');
    let path = if root.is_empty() {
        joined
    } else {
        format!("{root}/{joined}")
    };
    Some(UpstreamPath { path, file_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let p = resolve("/videos/movie.mp4", "").unwrap();
        assert_eq!(p.path, "videos/movie.mp4");
        assert_eq!(p.file_name, "movie.mp4");
    }

    #[test]
    fn test_root_prefix() {
        assert_eq!(resolve("/a.mp3", "/media/").unwrap().path, "/media/a.mp3");
        assert_eq!(resolve("/a.mp3", "pub").unwrap().path, "pub/a.mp3");
    }

    #[test]
    fn test_percent_decoding() {
        let p = resolve("/my%20clip%2Bfinal.webm", "").unwrap();
        assert_eq!(p.path, "my clip+final.webm");
    }

    #[test]
    fn test_redundant_separators() {
        assert_eq!(resolve("//a/./b.mp4", "").unwrap().path, "a/b.mp4");
    }

    #[test]
    fn test_rejected_paths() {
        assert_eq!(resolve("/", ""), None);
        assert_eq!(resolve("", ""), None);
        assert_eq!(resolve("//", ""), None);
        assert_eq!(resolve("/../etc/passwd", ""), None);
        assert_eq!(resolve("/a/%2e%2e/b", ""), None);
        assert_eq!(resolve("/a%0d%0aDELE%20x", ""), None);
        assert_eq!(resolve("/nul%00.mp4", ""), None);
        assert_eq!(resolve("/bad%ff.mp4", ""), None);
    }
}
