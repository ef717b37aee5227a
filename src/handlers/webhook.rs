use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::services::{conversation, messaging};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TwilioWebhookForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(&str, &str)],
) -> bool {
    // URL followed by the params sorted by key, each as key then value
    let mut data = url.to_string();
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in &sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    expected == signature
}

/// Checks `X-Twilio-Signature` against the webhook URL as the caller saw it.
fn verify_request(state: &AppState, headers: &HeaderMap, form: &TwilioWebhookForm) -> Result<(), Response> {
    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if signature.is_empty() {
        tracing::warn!("missing X-Twilio-Signature header");
        return Err((StatusCode::FORBIDDEN, "Missing signature").into_response());
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let url = format!("{proto}://{host}/webhook/sms");

    let params = [
        ("From", form.from.as_str()),
        ("To", form.to.as_str()),
        ("Body", form.body.as_str()),
        ("MessageSid", form.message_sid.as_deref().unwrap_or("")),
    ];

    if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
        tracing::warn!("invalid Twilio signature");
        return Err((StatusCode::FORBIDDEN, "Invalid signature").into_response());
    }
    Ok(())
}

/// Inbound SMS. The sender's number is the session key and the reply goes back by SMS.
pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<TwilioWebhookForm>,
) -> Response {
    // Signature checks are skipped when no auth token is configured
    if !state.config.twilio_auth_token.is_empty() {
        if let Err(rejection) = verify_request(&state, &headers, &form) {
            return rejection;
        }
    }

    let from = form.from.trim();
    let body = form.body.trim();
    tracing::info!(from, message_sid = ?form.message_sid, "incoming SMS");

    if body.is_empty() {
        return twiml_response();
    }

    let reply = match conversation::process_message(&state, from, body).await {
        Ok(outcome) => outcome.reply,
        Err(e) => {
            tracing::error!(error = %e, from, "conversation processing failed");
            format!(
                "Sorry, I'm having trouble right now. Please try again in a moment or call us at {}.",
                state.config.office_phone
            )
        }
    };
    messaging::send_sms(&state, from, &reply).await;

    twiml_response()
}

fn twiml_response() -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        "<Response></Response>",
    )
        .into_response()
}
