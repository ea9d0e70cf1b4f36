use rand::RngCore;
use serde::Deserialize;
use thiserror::Error;

use crate::config::MediaLimits;
use crate::http::HttpRequest;
use crate::rest::{ChatApi, RestError};
use crate::types::message::{MediaRef, MessageType};

/// Client-side validation failures for chat media. Raised before any network
/// call, with a reason specific enough to show the user.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MediaError {
    #[error("'{file_name}' is not a supported attachment type ({mime})")]
    UnsupportedType { file_name: String, mime: String },
    #[error("'{file_name}' is {size} bytes, above the {limit}-byte limit for {kind}")]
    TooLarge {
        file_name: String,
        size: u64,
        limit: u64,
        kind: &'static str,
    },
    #[error("'{file_name}' is empty")]
    EmptyFile { file_name: String },
}

/// A file selected for sending, before upload.
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Validates one attachment against the configured limits and resolves its
/// message type.
pub fn validate_attachment(
    limits: &MediaLimits,
    attachment: &OutgoingAttachment,
) -> Result<MessageType, MediaError> {
    let message_type = MessageType::from_mime(&attachment.mime_type).ok_or_else(|| {
        MediaError::UnsupportedType {
            file_name: attachment.file_name.clone(),
            mime: attachment.mime_type.clone(),
        }
    })?;

    if attachment.data.is_empty() {
        return Err(MediaError::EmptyFile {
            file_name: attachment.file_name.clone(),
        });
    }

    let size = attachment.data.len() as u64;
    let (limit, kind) = match message_type {
        MessageType::Image => (limits.image_max_bytes, "images"),
        MessageType::Video => (limits.video_max_bytes, "videos"),
        MessageType::Audio => (limits.audio_max_bytes, "audio"),
        MessageType::Text => unreachable!("text is never an attachment type"),
    };
    if size > limit {
        return Err(MediaError::TooLarge {
            file_name: attachment.file_name.clone(),
            size,
            limit,
            kind,
        });
    }

    Ok(message_type)
}

#[derive(Deserialize)]
struct UploadResponse {
    media: Vec<MediaRef>,
}

impl ChatApi {
    /// Uploads chat attachments as one multipart request and returns the
    /// stored media objects in input order.
    ///
    /// Callers are expected to have validated the files already; the server
    /// re-checks regardless.
    pub async fn upload_chat_media(
        &self,
        attachments: &[OutgoingAttachment],
    ) -> Result<Vec<MediaRef>, RestError> {
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, attachments);

        let request = HttpRequest::post(format!("{}/chat/upload", self.media_base_url))
            .with_header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .with_body(body);

        let response: UploadResponse = self.execute_json(self.authorized(request)).await?;
        Ok(response.media)
    }

    /// Resolves a media object's URL against the media base when the server
    /// returned a relative path.
    pub fn media_url(&self, media: &MediaRef) -> String {
        if media.url.starts_with("http://") || media.url.starts_with("https://") {
            media.url.clone()
        } else {
            format!("{}/{}", self.media_base_url, media.url.trim_start_matches('/'))
        }
    }
}

fn multipart_boundary() -> String {
    let mut random_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut random_bytes);
    format!("----agrichat-{}", hex::encode(random_bytes))
}

fn multipart_body(boundary: &str, attachments: &[OutgoingAttachment]) -> Vec<u8> {
    let mut body = Vec::new();
    for attachment in attachments {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                attachment.file_name.replace('"', "_")
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("Content-Type: {}\r\n\r\n", attachment.mime_type).as_bytes(),
        );
        body.extend_from_slice(&attachment.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, mime: &str, size: usize) -> OutgoingAttachment {
        OutgoingAttachment {
            file_name: name.into(),
            mime_type: mime.into(),
            data: vec![0u8; size],
        }
    }

    #[test]
    fn image_over_limit_is_rejected_with_size_reason() {
        let limits = MediaLimits::default();
        let too_big = attachment("field.jpg", "image/jpeg", 3 * 1024 * 1024);

        match validate_attachment(&limits, &too_big) {
            Err(MediaError::TooLarge {
                file_name,
                size,
                limit,
                kind,
            }) => {
                assert_eq!(file_name, "field.jpg");
                assert_eq!(size, 3 * 1024 * 1024);
                assert_eq!(limit, 2 * 1024 * 1024);
                assert_eq!(kind, "images");
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn accepted_image_resolves_its_message_type() {
        let limits = MediaLimits::default();
        let ok = attachment("field.png", "image/png", 512 * 1024);
        assert_eq!(validate_attachment(&limits, &ok), Ok(MessageType::Image));
    }

    #[test]
    fn documents_are_not_supported() {
        let limits = MediaLimits::default();
        let pdf = attachment("report.pdf", "application/pdf", 1024);
        assert!(matches!(
            validate_attachment(&limits, &pdf),
            Err(MediaError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn empty_files_are_rejected() {
        let limits = MediaLimits::default();
        let empty = attachment("note.ogg", "audio/ogg", 0);
        assert!(matches!(
            validate_attachment(&limits, &empty),
            Err(MediaError::EmptyFile { .. })
        ));
    }

    #[test]
    fn media_urls_resolve_against_the_media_base() {
        let api = crate::test_utils::create_test_api(std::sync::Arc::new(
            crate::test_utils::MockHttpClient::new(),
        ));

        let relative = MediaRef {
            id: "m1".into(),
            url: "chat/media/x.png".into(),
            name: None,
            format: None,
        };
        assert_eq!(
            api.media_url(&relative),
            "https://api.test/api/v1/chat/media/x.png"
        );

        let absolute = MediaRef {
            id: "m2".into(),
            url: "https://cdn.example.com/x.png".into(),
            name: None,
            format: None,
        };
        assert_eq!(api.media_url(&absolute), "https://cdn.example.com/x.png");
    }

    #[test]
    fn multipart_body_contains_every_part_and_terminator() {
        let parts = [
            attachment("a.png", "image/png", 4),
            attachment("b.ogg", "audio/ogg", 4),
        ];
        let body = multipart_body("----test", &parts);
        let text = String::from_utf8_lossy(&body);
        assert_eq!(text.matches("Content-Disposition").count(), 2);
        assert!(text.contains("filename=\"a.png\""));
        assert!(text.contains("filename=\"b.ogg\""));
        assert!(text.ends_with("------test--\r\n"));
    }
}
