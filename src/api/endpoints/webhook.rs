use std::collections::HashMap;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// Twilio attaches at most ten media items to one message.
const MAX_MEDIA_PER_MESSAGE: usize = 10;

pub const NO_IMAGE_REPLY: &str =
    "Please send me a photo of the receipt. I can only register expenses from receipt images.";

/// Sender and usable image URLs from one inbound message.
#[derive(Debug, PartialEq)]
pub struct InboundMessage {
    pub sender: String,
    pub image_urls: Vec<String>,
}

/// Pull sender and image attachments out of Twilio's form fields.
/// Attachments with a non-image content type are skipped.
pub fn parse_inbound(form: &HashMap<String, String>) -> Result<InboundMessage, ApiError> {
    let sender = form
        .get("From")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing From".into()))?
        .to_string();

    let num_media = match form.get("NumMedia").map(|s| s.trim()) {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("Invalid NumMedia: {raw}")))?,
    };

    let image_urls = (0..num_media.min(MAX_MEDIA_PER_MESSAGE))
        .filter_map(|i| {
            let url = form.get(&format!("MediaUrl{i}"))?.trim();
            if url.is_empty() {
                return None;
            }
            match form.get(&format!("MediaContentType{i}")) {
                Some(ct) if !ct.trim().to_ascii_lowercase().starts_with("image/") => {
                    tracing::debug!(index = i, content_type = %ct, "Skipping non-image attachment");
                    None
                }
                _ => Some(url.to_string()),
            }
        })
        .collect();

    Ok(InboundMessage { sender, image_urls })
}

/// `POST /whatsapp`: Twilio inbound message webhook.
pub async fn receive(
    State(ctx): State<ApiContext>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let inbound = parse_inbound(&form)?;

    if inbound.image_urls.is_empty() {
        tracing::info!(sender = %inbound.sender, "Message without images, replying with instructions");
        return Ok(twiml_message(NO_IMAGE_REPLY));
    }

    let handle = ctx
        .dispatcher
        .dispatch(&inbound.sender, inbound.image_urls)?;
    tracing::info!(batch_id = %handle.batch_id, sender = %inbound.sender, "Batch dispatched");

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// TwiML reply carrying a single text message.
pub fn twiml_message(text: &str) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
        escape_xml(text)
    );
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn images_collected_in_order() {
        let inbound = parse_inbound(&form(&[
            ("From", "whatsapp:+5491100000000"),
            ("NumMedia", "2"),
            ("MediaUrl0", "https://api.twilio.com/m/0"),
            ("MediaContentType0", "image/jpeg"),
            ("MediaUrl1", "https://api.twilio.com/m/1"),
            ("MediaContentType1", "image/png"),
        ]))
        .unwrap();
        assert_eq!(inbound.sender, "whatsapp:+5491100000000");
        assert_eq!(
            inbound.image_urls,
            vec!["https://api.twilio.com/m/0", "https://api.twilio.com/m/1"]
        );
    }

    #[test]
    fn non_image_attachments_skipped() {
        let inbound = parse_inbound(&form(&[
            ("From", "s"),
            ("NumMedia", "2"),
            ("MediaUrl0", "https://api.twilio.com/m/0"),
            ("MediaContentType0", "audio/ogg"),
            ("MediaUrl1", "https://api.twilio.com/m/1"),
            ("MediaContentType1", "IMAGE/JPEG"),
        ]))
        .unwrap();
        assert_eq!(inbound.image_urls, vec!["https://api.twilio.com/m/1"]);
    }

    #[test]
    fn no_media_yields_empty_list() {
        let inbound = parse_inbound(&form(&[("From", "s"), ("Body", "hola")])).unwrap();
        assert!(inbound.image_urls.is_empty());
    }

    #[test]
    fn missing_sender_rejected() {
        assert!(matches!(
            parse_inbound(&form(&[("NumMedia", "0")])),
            Err(ApiError::BadRequest(_))
        ));
        assert!(parse_inbound(&form(&[("From", "  ")])).is_err());
    }

    #[test]
    fn invalid_num_media_rejected() {
        assert!(matches!(
            parse_inbound(&form(&[("From", "s"), ("NumMedia", "many")])),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn media_count_is_capped() {
        let mut f = form(&[("From", "s"), ("NumMedia", "999999")]);
        for i in 0..12 {
            f.insert(format!("MediaUrl{i}"), format!("https://m/{i}"));
        }
        assert_eq!(parse_inbound(&f).unwrap().image_urls.len(), MAX_MEDIA_PER_MESSAGE);
    }

    #[test]
    fn xml_escaping() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
