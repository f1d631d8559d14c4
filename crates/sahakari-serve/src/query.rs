//! GROQ queries and typed fetchers for site content.
//!
//! Every fetcher issues exactly one query, except [`fetch_homepage`] which
//! issues three concurrently. A `null` result decodes as "absent".

use serde::de::DeserializeOwned;
use serde_json::Value;

use sahakari_core::model::{
    Announcement, BoardMember, HomepageData, HomepageSettings, IntroductionSection, NewsItem,
    StaffMember,
};

use crate::source::{ContentError, ContentQuery, ContentSource};

/// Number of news items shown on the homepage.
pub const LATEST_NEWS_LIMIT: u32 = 3;

// Image projection shared by every query: expand the asset so the URL and
// dimensions travel with the reference.
macro_rules! image_projection {
    ($field:literal) => {
        concat!($field, "{asset->{_id, url, metadata{dimensions}}}")
    };
}

pub const HOMEPAGE_SETTINGS_QUERY: &str = concat!(
    r#"*[_type == "homepageSettings"][0]{_id, siteTitle, heroTitle, heroSubtitle, "#,
    image_projection!("heroImage"),
    r#", heroCtaLabel, heroCtaLink, contactEmail, contactPhone, address}"#
);

pub const INTRODUCTION_QUERY: &str = concat!(
    r#"*[_type == "introductionSection"][0]{_id, title, subtitle, body, "#,
    image_projection!("image"),
    "}"
);

pub const LATEST_NEWS_QUERY: &str = concat!(
    r#"*[_type == "news" && defined(slug.current)] | order(publishedAt desc)[0...$limit]"#,
    r#"{_id, title, "slug": slug.current, publishedAt, excerpt, "#,
    image_projection!("mainImage"),
    "}"
);

pub const NEWS_BY_SLUG_QUERY: &str = concat!(
    r#"*[_type == "news" && slug.current == $slug][0]"#,
    r#"{_id, title, "slug": slug.current, publishedAt, excerpt, "#,
    image_projection!("mainImage"),
    ", body}"
);

pub const BOARD_MEMBERS_QUERY: &str = concat!(
    r#"*[_type == "boardMember"] | order(order asc){_id, name, position, order, "#,
    image_projection!("photo"),
    ", bio, phone, email}"
);

pub const STAFF_MEMBERS_QUERY: &str = concat!(
    r#"*[_type == "staffMember"] | order(order asc){_id, name, designation, department, order, "#,
    image_projection!("photo"),
    ", phone, email}"
);

pub const ANNOUNCEMENTS_QUERY: &str = concat!(
    r#"*[_type == "announcement" && isActive == true] | order(publishedAt desc)"#,
    "{_id, title, body, publishedAt, priority, isActive}"
);

/// Fetch a single document, `None` when the query matched nothing.
async fn fetch_one<T: DeserializeOwned>(
    source: &dyn ContentSource,
    query: &ContentQuery,
) -> Result<Option<T>, ContentError> {
    match source.query(query).await? {
        Value::Null => Ok(None),
        value => Ok(Some(serde_json::from_value(value)?)),
    }
}

/// Fetch a list of documents, empty when the query matched nothing.
///
/// Records are decoded one at a time; a record that does not decode is
/// logged and dropped so the rest of the list still loads.
async fn fetch_list<T: DeserializeOwned>(
    source: &dyn ContentSource,
    query: &ContentQuery,
) -> Result<Vec<T>, ContentError> {
    match source.query(query).await? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().filter_map(decode_record).collect()),
        value => Ok(serde_json::from_value(value)?),
    }
}

fn decode_record<T: DeserializeOwned>(item: Value) -> Option<T> {
    let id = item.get("_id").and_then(Value::as_str).map(str::to_owned);
    match serde_json::from_value(item) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(id = ?id, error = %err, "dropping malformed record");
            None
        }
    }
}

/// Fetch settings, introduction and latest news concurrently.
///
/// Any failing query fails the whole aggregate.
pub async fn fetch_homepage(source: &dyn ContentSource) -> Result<HomepageData, ContentError> {
    let settings_query = ContentQuery::new(HOMEPAGE_SETTINGS_QUERY);
    let introduction_query = ContentQuery::new(INTRODUCTION_QUERY);
    let news_query = ContentQuery::new(LATEST_NEWS_QUERY).param("limit", LATEST_NEWS_LIMIT);

    let (settings, introduction, news) = tokio::try_join!(
        fetch_one::<HomepageSettings>(source, &settings_query),
        fetch_one::<IntroductionSection>(source, &introduction_query),
        fetch_list::<NewsItem>(source, &news_query),
    )?;

    Ok(HomepageData {
        settings,
        introduction,
        news,
    })
}

pub async fn fetch_board_members(
    source: &dyn ContentSource,
) -> Result<Vec<BoardMember>, ContentError> {
    fetch_list(source, &ContentQuery::new(BOARD_MEMBERS_QUERY)).await
}

pub async fn fetch_staff_members(
    source: &dyn ContentSource,
) -> Result<Vec<StaffMember>, ContentError> {
    fetch_list(source, &ContentQuery::new(STAFF_MEMBERS_QUERY)).await
}

/// Active announcements, newest first.
///
/// The query already filters on `isActive`; documents that still come back
/// inactive are dropped here as well.
pub async fn fetch_announcements(
    source: &dyn ContentSource,
) -> Result<Vec<Announcement>, ContentError> {
    let announcements: Vec<Announcement> =
        fetch_list(source, &ContentQuery::new(ANNOUNCEMENTS_QUERY)).await?;
    Ok(announcements.into_iter().filter(|a| a.is_active).collect())
}

pub async fn fetch_introduction(
    source: &dyn ContentSource,
) -> Result<Option<IntroductionSection>, ContentError> {
    fetch_one(source, &ContentQuery::new(INTRODUCTION_QUERY)).await
}

pub async fn fetch_news_by_slug(
    source: &dyn ContentSource,
    slug: &str,
) -> Result<Option<NewsItem>, ContentError> {
    fetch_one(source, &ContentQuery::new(NEWS_BY_SLUG_QUERY).param("slug", slug)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeSource;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[test]
    fn image_projection_expands_asset() {
        assert!(BOARD_MEMBERS_QUERY.contains("photo{asset->{_id, url, metadata{dimensions}}}"));
        assert!(LATEST_NEWS_QUERY.contains(r#""slug": slug.current"#));
        assert!(NEWS_BY_SLUG_QUERY.contains("$slug"));
    }

    #[tokio::test]
    async fn homepage_combines_three_queries() {
        let source = FakeSource::new();
        source.respond(HOMEPAGE_SETTINGS_QUERY, json!({"_id": "s", "siteTitle": "Sahakari"}));
        source.respond(INTRODUCTION_QUERY, json!({"_id": "i", "title": "About us"}));
        source.respond(
            LATEST_NEWS_QUERY,
            json!([{"_id": "n1", "title": "AGM"}, {"_id": "n2", "title": "Loan camp"}]),
        );

        let data = fetch_homepage(source.as_ref()).await.unwrap();
        assert_eq!(source.query_count(), 3);
        assert_eq!(data.settings.unwrap().site_title.as_deref(), Some("Sahakari"));
        assert_eq!(data.introduction.unwrap().title.as_deref(), Some("About us"));
        assert_eq!(data.news.len(), 2);
    }

    #[tokio::test]
    async fn homepage_queries_run_concurrently() {
        let source = FakeSource::new();
        // All three queries must be in flight at once to pass the barrier.
        source.gate(Arc::new(Barrier::new(3)));

        let data = tokio::time::timeout(Duration::from_secs(5), fetch_homepage(source.as_ref()))
            .await
            .expect("homepage queries were serialized")
            .unwrap();
        assert_eq!(data, HomepageData::default());
    }

    #[tokio::test]
    async fn homepage_fails_when_any_query_fails() {
        let source = FakeSource::new();
        source.respond(HOMEPAGE_SETTINGS_QUERY, json!({"_id": "s"}));
        source.fail(LATEST_NEWS_QUERY);

        let err = fetch_homepage(source.as_ref()).await.unwrap_err();
        assert!(matches!(err, ContentError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn null_results_decode_as_absent() {
        let source = FakeSource::new();
        assert!(fetch_introduction(source.as_ref()).await.unwrap().is_none());
        assert!(fetch_board_members(source.as_ref()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_shape_is_a_decode_error() {
        let source = FakeSource::new();
        source.respond(BOARD_MEMBERS_QUERY, json!({"not": "a list"}));
        let err = fetch_board_members(source.as_ref()).await.unwrap_err();
        assert!(matches!(err, ContentError::Decode(_)));
    }

    #[tokio::test]
    async fn malformed_records_are_dropped_from_lists() {
        let source = FakeSource::new();
        source.respond(
            BOARD_MEMBERS_QUERY,
            json!([
                {"_id": "b1", "name": "Sita"},
                {"_id": "b2", "name": null},
                {"_id": "b3", "name": {"first": "Ram"}},
                "not a record"
            ]),
        );
        let members = fetch_board_members(source.as_ref()).await.unwrap();
        let ids: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b1", "b2"]);
    }

    #[tokio::test]
    async fn homepage_accepts_date_only_news() {
        let source = FakeSource::new();
        source.respond(
            LATEST_NEWS_QUERY,
            json!([{"_id": "n1", "title": "AGM", "publishedAt": "2024-03-01"}]),
        );
        let data = fetch_homepage(source.as_ref()).await.unwrap();
        assert_eq!(data.news.len(), 1);
        assert!(data.news[0].published_at.is_some());
    }

    #[tokio::test]
    async fn inactive_announcements_are_dropped() {
        let source = FakeSource::new();
        source.respond(
            ANNOUNCEMENTS_QUERY,
            json!([
                {"_id": "a1", "title": "Open", "isActive": true},
                {"_id": "a2", "title": "Old", "isActive": false},
                {"_id": "a3", "title": "Unset"}
            ]),
        );
        let list = fetch_announcements(source.as_ref()).await.unwrap();
        let ids: Vec<_> = list.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a3"]);
    }

    #[tokio::test]
    async fn news_by_slug_binds_parameter() {
        let source = FakeSource::new();
        source.respond(NEWS_BY_SLUG_QUERY, json!({"_id": "n1", "title": "AGM", "slug": "agm"}));

        let item = fetch_news_by_slug(source.as_ref(), "agm").await.unwrap().unwrap();
        assert_eq!(item.slug.as_deref(), Some("agm"));
        let params = source.last_params.lock().clone().unwrap();
        assert_eq!(params.get("slug"), Some(&json!("agm")));
    }
}
