//! MIME type detection module
//!
//! Maps a file name to a Content-Type by extension. Lookups go through a
//! bounded cache shared by all request workers.

use crate::config::{CacheConfig, EvictionPolicy};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Fallback for unknown or missing extensions
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Get MIME Content-Type based on (lowercase) file extension
///
/// # Examples
/// ```
/// use ftp_gateway::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("mp4")), "video/mp4");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Text
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("vtt") => "text/vtt",
        Some("srt") => "application/x-subrip",

        // JavaScript/WASM
        Some("js" | "mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("wasm") => "application/wasm",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",

        // Video
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogv") => "video/ogg",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("ts") => "video/mp2t",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("mpd") => "application/dash+xml",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("ogg" | "oga") => "audio/ogg",
        Some("aac") => "audio/aac",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents and archives
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "gzip") => "application/gzip",
        Some("tar") => "application/x-tar",

        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Whether a content type is audio, video or image
pub fn is_media(content_type: &str) -> bool {
    ["video/", "audio/", "image/"]
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

/// Bounded extension → content-type map
struct MimeCache {
    capacity: usize,
    policy: EvictionPolicy,
    entries: HashMap<String, &'static str>,
    /// Front = next to evict
    order: VecDeque<String>,
}

impl MimeCache {
    fn get(&mut self, key: &str) -> Option<&'static str> {
        let value = *self.entries.get(key)?;
        if self.policy == EvictionPolicy::Lru {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                if let Some(k) = self.order.remove(pos) {
                    self.order.push_back(k);
                }
            }
        }
        Some(value)
    }

    fn insert(&mut self, key: String, value: &'static str) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }
}

/// Content-type lookup with a bounded cache
pub struct MimeResolver {
    cache: Mutex<MimeCache>,
}

impl MimeResolver {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            cache: Mutex::new(MimeCache {
                capacity: capacity.max(1),
                policy,
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.mime_capacity, config.mime_eviction)
    }

    /// Content type for `filename`; never fails
    pub fn resolve(&self, filename: &str) -> &'static str {
        let key = extension_key(filename);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(&key) {
            return hit;
        }
        let value = get_content_type((!key.is_empty()).then_some(key.as_str()));
        cache.insert(key, value);
        value
    }

    /// Number of cached extensions
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the extension of `filename` currently has a cache entry
    pub fn is_cached(&self, filename: &str) -> bool {
        let key = extension_key(filename);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(&key)
    }
}

/// Lowercased extension, empty when there is none
fn extension_key(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
