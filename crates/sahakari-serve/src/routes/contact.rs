//! Contact form submission endpoint.

use std::sync::LazyLock;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use sahakari_core::model::{ContactSubmission, SubmissionPriority, SubmissionStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// `local@domain.tld` with no whitespace and exactly one `@`.
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex should compile"));

const UNKNOWN: &str = "unknown";

const SUCCESS_MESSAGE: &str = "Thank you for contacting us. We will get back to you soon.";

/// Incoming form body. Every field is optional here so that missing fields
/// produce our own 400 instead of a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub id: String,
    pub message: &'static str,
}

/// A request that passed validation.
#[derive(Debug, PartialEq, Eq)]
struct ValidContact {
    name: String,
    email: String,
    phone: Option<String>,
    subject: String,
    message: String,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate(request: ContactRequest) -> Result<ValidContact, ApiError> {
    let (Some(name), Some(email), Some(subject), Some(message)) = (
        required(request.name),
        required(request.email),
        required(request.subject),
        required(request.message),
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    if !EMAIL_REGEX.is_match(&email) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }

    Ok(ValidContact {
        name,
        email,
        phone: required(request.phone),
        subject,
        message,
    })
}

/// Client address: first `x-forwarded-for` entry, else `x-real-ip`.
fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    forwarded.or_else(real_ip).unwrap_or(UNKNOWN).to_string()
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// POST /api/contact
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected contact body");
        metrics::counter!("contact_submissions_total", "outcome" => "invalid").increment(1);
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    let contact = validate(request).inspect_err(|_| {
        metrics::counter!("contact_submissions_total", "outcome" => "invalid").increment(1);
    })?;

    let submission = ContactSubmission {
        id: format!("contact-{}", uuid::Uuid::new_v4()),
        doc_type: ContactSubmission::DOC_TYPE,
        name: contact.name,
        email: contact.email,
        phone: contact.phone,
        subject: contact.subject,
        message: contact.message,
        submitted_at: Utc::now(),
        status: SubmissionStatus::New,
        read: false,
        priority: SubmissionPriority::Medium,
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
    };

    let document = serde_json::to_value(&submission)?;
    let id = match state.source.create(document).await {
        Ok(id) => id,
        Err(err) => {
            metrics::counter!("contact_submissions_total", "outcome" => "failed").increment(1);
            return Err(ApiError::Content(err));
        }
    };

    metrics::counter!("contact_submissions_total", "outcome" => "accepted").increment(1);
    tracing::info!(id = %id, "contact submission stored");

    Ok(Json(ContactResponse {
        success: true,
        id,
        message: SUCCESS_MESSAGE,
    }))
}

/// Any method other than POST on /api/contact.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed { allow: "POST" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(name: &str, email: &str, subject: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            phone: None,
            subject: Some(subject.to_string()),
            message: Some(message.to_string()),
        }
    }

    fn message_of(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_complete_request() {
        let contact = validate(request(" Ram ", "ram@example.com", "Loan", "Hello")).unwrap();
        assert_eq!(contact.name, "Ram");
        assert!(contact.phone.is_none());
    }

    #[test]
    fn validate_rejects_missing_or_blank_fields() {
        let err = validate(ContactRequest::default()).unwrap_err();
        assert_eq!(message_of(err), "Missing required fields");

        let err = validate(request("Ram", "ram@example.com", "   ", "Hello")).unwrap_err();
        assert_eq!(message_of(err), "Missing required fields");
    }

    #[test]
    fn validate_rejects_bad_email() {
        for email in ["not-an-email", "a@b", "a b@c.com", "a@@b.com", "@b.com"] {
            let err = validate(request("Ram", email, "Loan", "Hi")).unwrap_err();
            assert_eq!(message_of(err), "Invalid email format", "{email}");
        }
    }

    #[test]
    fn email_regex_accepts_common_addresses() {
        for email in ["a@b.co", "ram.sharma+coop@mail.example.com.np"] {
            assert!(EMAIL_REGEX.is_match(email), "{email}");
        }
    }

    #[test]
    fn client_ip_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn client_ip_falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "10.0.0.2");
    }

    #[test]
    fn user_agent_defaults_to_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_agent(&headers), "unknown");
        headers.insert("user-agent", HeaderValue::from_static("Mozilla/5.0"));
        assert_eq!(user_agent(&headers), "Mozilla/5.0");
    }
}
