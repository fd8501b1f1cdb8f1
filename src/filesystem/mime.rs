//! Content-type detection: extension table first, then a bounded content probe.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::protocol::{ContentType, EntryMetadata};

/// Bytes read from the head of a file for sniffing
pub const PROBE_LEN: usize = 256;

const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
];

/// Classify the file at `path`. Never fails: probe errors yield
/// `application/octet-stream`.
pub fn classify(path: &Path) -> ContentType {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if let Some(mime) = guess_mime_from_extension(&name) {
        return ContentType::from_mime(mime);
    }
    if let Some(mime) = text_extension_fallback(&name) {
        return ContentType::from_mime(mime);
    }

    match read_probe(path) {
        Ok(buffer) => sniff(&buffer),
        Err(e) => {
            tracing::debug!("Content probe failed for {}: {}", path.display(), e);
            ContentType::octet_stream()
        }
    }
}

/// Classify a probe buffer: printable text, then known signatures
pub fn sniff(buffer: &[u8]) -> ContentType {
    if is_printable_text(buffer) {
        return ContentType::text_plain();
    }

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| buffer.starts_with(magic)) {
        return ContentType::from_mime(mime);
    }

    if let Some(kind) = infer::get(buffer) {
        return ContentType::from_mime(kind.mime_type());
    }

    ContentType::octet_stream()
}

fn read_probe(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(PROBE_LEN);
    file.take(PROBE_LEN as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Printable ASCII plus TAB, LF and CR. Vacuously true for an empty buffer.
fn is_printable_text(buffer: &[u8]) -> bool {
    buffer
        .iter()
        .all(|&b| (0x20..=0x7E).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r'))
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Standard extension-to-type table. `None` when the extension is unknown.
pub fn guess_mime_from_extension(filename: &str) -> Option<&'static str> {
    let ext = extension_of(filename)?;

    let mime = match ext.as_str() {
        "txt" | "text" | "conf" | "ini" => "text/plain",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "c" | "h" => "text/x-c",
        "cpp" | "cc" | "cxx" | "hpp" => "text/x-c++",
        "java" => "text/x-java",
        "go" => "text/x-go",
        "sh" => "application/x-sh",
        "xml" => "text/xml",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(mime)
}

/// Extensions that must read as text even where the standard table is silent
fn text_extension_fallback(filename: &str) -> Option<&'static str> {
    match extension_of(filename)?.as_str() {
        "log" | "txt" | "csv" | "md" => Some("text/plain"),
        "json" => Some("application/json"),
        _ => None,
    }
}

/// Display-only kind label: "Folder", the extension type's subtype, the raw
/// extension, or "Unknown", in that order.
pub fn kind_label(filename: &str, is_directory: bool) -> String {
    if is_directory {
        return "Folder".to_string();
    }
    if let Some(mime) = guess_mime_from_extension(filename) {
        if let Some((_, subtype)) = mime.split_once('/') {
            return subtype.to_uppercase();
        }
    }
    extension_of(filename)
        .map(|ext| ext.to_uppercase())
        .unwrap_or_else(|| EntryMetadata::UNKNOWN_LABEL.to_string())
}
