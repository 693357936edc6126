//! File extension to MIME type lookup, used when serving files.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a file path, from its extension.
///
/// Paths without an extension are `application/octet-stream`; unknown
/// extensions fall back to `text/plain`.
pub fn from_path(path: impl AsRef<Path>) -> &'static str {
    match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => from_extension(ext),
        None => OCTET_STREAM,
    }
}

pub fn from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "txt" => "text/plain",
        "js" | "mjs" => "text/javascript",
        "ics" => "text/calendar",
        "json" => "application/json",
        "jsonld" => "application/ld+json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "wasm" => "application/wasm",
        "xhtml" => "application/xhtml+xml",
        "bin" => OCTET_STREAM,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "opus" => "audio/opus",
        "weba" => "audio/webm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mpeg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "otf" => "font/otf",
        "ttf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "text/plain",
    }
}
