//! Preview negotiation: pick a bounded, renderable form for a file by type.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::fs;

use crate::protocol::{ContentType, FileSystemError, PreviewResult, Renderable};

use super::operations::{io_error, requested_name, FileOperations};
use super::security::ResolvedPath;

pub const INVALID_JSON_BODY: &str = "Invalid JSON file";

#[derive(Clone)]
pub struct FilePreview {
    ops: FileOperations,
}

impl FilePreview {
    pub fn new(ops: FileOperations) -> Self {
        Self { ops }
    }

    /// Build a preview of a resolved file. Reads at most one whole file.
    pub async fn preview(&self, resolved: &ResolvedPath) -> Result<PreviewResult, FileSystemError> {
        let metadata = fs::metadata(resolved.absolute())
            .await
            .map_err(|e| io_error(resolved.requested(), e))?;

        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile {
                path: resolved.requested().to_string(),
            });
        }

        let content_type = self.ops.classify(resolved).await;
        let previewable = content_type.is_json() || content_type.is_text() || content_type.is_image();
        let max_size = self.ops.config().max_preview_size;

        let renderable = if !previewable {
            unavailable(&content_type)
        } else if metadata.len() > max_size {
            Renderable::Unavailable {
                reason: format!("File too large to preview: {} bytes", metadata.len()),
            }
        } else {
            let bytes = fs::read(resolved.absolute())
                .await
                .map_err(|e| io_error(resolved.requested(), e))?;
            render(&content_type, &bytes)
        };

        Ok(PreviewResult {
            display_name: requested_name(resolved),
            content_type,
            renderable,
        })
    }
}

fn render(content_type: &ContentType, bytes: &[u8]) -> Renderable {
    if content_type.is_json() {
        Renderable::Text {
            body: pretty_json(bytes),
        }
    } else if content_type.is_text() {
        Renderable::Text {
            body: decode_text_buffer(bytes)
                .unwrap_or_else(|| String::from_utf8_lossy(bytes).to_string()),
        }
    } else if content_type.is_image() {
        Renderable::InlineImage {
            data_uri: format!("data:{};base64,{}", content_type, BASE64.encode(bytes)),
        }
    } else {
        unavailable(content_type)
    }
}

fn unavailable(content_type: &ContentType) -> Renderable {
    Renderable::Unavailable {
        reason: format!("Preview not available for this file type: {}", content_type),
    }
}

/// Pretty-print with two-space indentation; any decode error becomes the
/// fixed diagnostic body.
fn pretty_json(bytes: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|e| {
            tracing::debug!("JSON preview parse failed: {}", e);
            INVALID_JSON_BODY.to_string()
        })
}

fn decode_text_buffer(buffer: &[u8]) -> Option<String> {
    if buffer.starts_with(&[0xEF, 0xBB, 0xBF]) {
        if let Ok(content) = std::str::from_utf8(&buffer[3..]) {
            return Some(content.to_string());
        }
    }

    if let Ok(content) = std::str::from_utf8(buffer) {
        return Some(content.to_string());
    }

    if buffer.starts_with(&[0xFF, 0xFE]) {
        let utf16: Vec<u16> = buffer[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        if let Ok(content) = String::from_utf16(&utf16) {
            return Some(content);
        }
    }

    if buffer.starts_with(&[0xFE, 0xFF]) {
        let utf16: Vec<u16> = buffer[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(content) = String::from_utf16(&utf16) {
            return Some(content);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_pretty_printed_with_two_spaces() {
        let body = pretty_json(br#"{"a":[1,2]}"#);
        assert_eq!(body, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn invalid_json_becomes_diagnostic() {
        assert_eq!(pretty_json(b"{not valid}"), INVALID_JSON_BODY);
        assert_eq!(pretty_json(&[0xC3, 0x28]), INVALID_JSON_BODY);
    }

    #[test]
    fn text_decoding_strips_bom_and_handles_utf16() {
        assert_eq!(decode_text_buffer(b"\xEF\xBB\xBFhi").as_deref(), Some("hi"));
        assert_eq!(decode_text_buffer(&[0xFF, 0xFE, b'h', 0, b'i', 0]).as_deref(), Some("hi"));
        assert_eq!(decode_text_buffer(&[0xC3, 0x28]), None);
    }

    #[test]
    fn images_render_as_data_uris() {
        let rendered = render(&ContentType::new("image", "gif"), b"GIF89a");
        assert_eq!(
            rendered,
            Renderable::InlineImage {
                data_uri: "data:image/gif;base64,R0lGODlh".to_string()
            }
        );
    }

    #[test]
    fn other_types_are_unavailable() {
        let rendered = render(&ContentType::new("application", "pdf"), b"%PDF");
        assert_eq!(
            rendered,
            Renderable::Unavailable {
                reason: "Preview not available for this file type: application/pdf".to_string()
            }
        );
    }
}
