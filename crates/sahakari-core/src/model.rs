//! Content records read from, and written to, the CMS.
//!
//! Read models mirror the projections issued by the content queries; every
//! field the CMS may leave unset is optional or defaulted so that partially
//! filled documents still decode.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::document::Document;
use crate::image::ImageRef;

/// Site-wide homepage settings (singleton document).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomepageSettings {
    #[serde(rename = "_id")]
    pub id: String,
    pub site_title: Option<String>,
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    #[serde(deserialize_with = "lenient_image")]
    pub hero_image: Option<ImageRef>,
    pub hero_cta_label: Option<String>,
    pub hero_cta_link: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

/// The "about us" introduction section shown on the homepage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntroductionSection {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Document,
    #[serde(deserialize_with = "lenient_image")]
    pub image: Option<ImageRef>,
}

/// A news article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewsItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub slug: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: Option<String>,
    #[serde(deserialize_with = "lenient_image")]
    pub main_image: Option<ImageRef>,
    pub body: Document,
}

/// A member of the board of directors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardMember {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub position: Option<String>,
    pub order: Option<i64>,
    #[serde(deserialize_with = "lenient_image")]
    pub photo: Option<ImageRef>,
    pub bio: Document,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A staff member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaffMember {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub order: Option<i64>,
    #[serde(deserialize_with = "lenient_image")]
    pub photo: Option<ImageRef>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A notice shown in the announcements list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Announcement {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub body: Document,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub is_active: bool,
}

impl Default for Announcement {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            body: Document::default(),
            published_at: None,
            priority: None,
            is_active: true,
        }
    }
}

/// Decode a field the CMS projects as `null` when unset.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a publish time from either a datetime or a plain `date` field.
///
/// Dates are taken as midnight UTC; anything unparsable is absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(serde_json::Value::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Decode an optional image field, treating a malformed image as absent.
fn lenient_image<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ImageRef>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| ImageRef::deserialize(&v).ok()))
}

/// Everything the homepage needs, fetched as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HomepageData {
    pub settings: Option<HomepageSettings>,
    pub introduction: Option<IntroductionSection>,
    pub news: Vec<NewsItem>,
}

/// Workflow status of a contact submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    New,
    Replied,
    Closed,
}

/// Triage priority of a contact submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionPriority {
    Low,
    Medium,
    High,
}

/// Contact-form submission as stored in the CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: &'static str,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub read: bool,
    pub priority: SubmissionPriority,
    pub ip_address: String,
    pub user_agent: String,
}

impl ContactSubmission {
    /// CMS document type for contact submissions.
    pub const DOC_TYPE: &'static str = "contactSubmission";
}
