//! Response views: CMS records with text sanitized, rich text rendered to
//! HTML and images resolved to CDN URLs.
//!
//! Anything that fails validation is omitted from the view rather than
//! passed through.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sahakari_core::image::FitMode;
use sahakari_core::model::{
    Announcement, BoardMember, HomepageData, HomepageSettings, IntroductionSection, NewsItem,
    StaffMember,
};
use sahakari_core::{
    DocumentRenderer, ImageOptions, ImageRef, plain_text, sanitize_text, validate_image_url,
    validate_link_url,
};

/// Longest generated summary, in bytes, before the ellipsis.
const SUMMARY_LEN: usize = 200;

const HERO_WIDTH: u32 = 1600;
const CARD_WIDTH: u32 = 800;
const PORTRAIT_SIZE: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub src: String,
    pub src_set: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkView {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub site_title: Option<String>,
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    pub hero_image: Option<ImageView>,
    pub hero_cta: Option<LinkView>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroductionView {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body_html: String,
    pub image: Option<ImageView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsSummaryView {
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: Option<String>,
    pub image: Option<ImageView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticleView {
    #[serde(flatten)]
    pub summary: NewsSummaryView,
    pub body_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomepageView {
    pub settings: Option<SettingsView>,
    pub introduction: Option<IntroductionView>,
    pub news: Vec<NewsSummaryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMemberView {
    pub id: String,
    pub name: String,
    pub position: Option<String>,
    pub photo: Option<ImageView>,
    pub bio_html: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMemberView {
    pub id: String,
    pub name: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub photo: Option<ImageView>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementView {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub body_html: String,
    pub published_at: Option<DateTime<Utc>>,
    pub priority: Option<String>,
}

/// Sanitized text, `None` when nothing visible is left.
fn text(value: Option<&str>) -> Option<String> {
    let clean = sanitize_text(value?);
    let trimmed = clean.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A URL slug of letters, digits, `-` and `_`; anything else is dropped.
fn slug(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    valid.then(|| value.to_string())
}

/// Truncate `s` to at most `max_len` bytes on a char boundary, adding "...".
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}...", s[..end].trim_end())
    }
}

/// Resolve `image` at `opts`, with a srcset from the renderer's widths.
fn image_view(renderer: &DocumentRenderer, image: &ImageRef, opts: ImageOptions) -> Option<ImageView> {
    let images = renderer.images();
    let opts = ImageOptions {
        quality: opts.quality.or(Some(renderer.options().quality)),
        ..opts
    };
    let Some(src) = validate_image_url(&images.build_image_url(image, &opts)) else {
        tracing::warn!(asset_ref = %image.asset_ref, "dropping image with unsafe url");
        return None;
    };
    let src_set = images.build_src_set(image, &renderer.options().src_set_widths, &opts);
    let (width, height) = match (opts.width, opts.height, image.dimensions) {
        (Some(w), Some(h), _) => (Some(w), Some(h)),
        (Some(w), None, Some(d)) if d.width > 0 => {
            let height = u64::from(w) * u64::from(d.height) / u64::from(d.width);
            (Some(w), u32::try_from(height).ok())
        }
        (_, _, Some(d)) => (Some(d.width), Some(d.height)),
        _ => (opts.width, opts.height),
    };
    Some(ImageView {
        src,
        src_set,
        width,
        height,
    })
}

fn portrait(renderer: &DocumentRenderer, image: Option<&ImageRef>) -> Option<ImageView> {
    let opts = ImageOptions {
        width: Some(PORTRAIT_SIZE),
        height: Some(PORTRAIT_SIZE),
        fit: Some(FitMode::Crop),
        ..ImageOptions::default()
    };
    image.and_then(|img| image_view(renderer, img, opts))
}

pub fn settings(renderer: &DocumentRenderer, settings: &HomepageSettings) -> SettingsView {
    let hero_cta = match (
        text(settings.hero_cta_label.as_deref()),
        settings.hero_cta_link.as_deref().and_then(validate_link_url),
    ) {
        (Some(label), Some(href)) => Some(LinkView { label, href }),
        _ => None,
    };

    SettingsView {
        site_title: text(settings.site_title.as_deref()),
        hero_title: text(settings.hero_title.as_deref()),
        hero_subtitle: text(settings.hero_subtitle.as_deref()),
        hero_image: settings
            .hero_image
            .as_ref()
            .and_then(|img| image_view(renderer, img, ImageOptions::width(HERO_WIDTH))),
        hero_cta,
        contact_email: text(settings.contact_email.as_deref()),
        contact_phone: text(settings.contact_phone.as_deref()),
        address: text(settings.address.as_deref()),
    }
}

pub fn introduction(renderer: &DocumentRenderer, section: &IntroductionSection) -> IntroductionView {
    IntroductionView {
        title: text(section.title.as_deref()),
        subtitle: text(section.subtitle.as_deref()),
        body_html: renderer.render_html(section.body.blocks()),
        image: section
            .image
            .as_ref()
            .and_then(|img| image_view(renderer, img, ImageOptions::width(CARD_WIDTH))),
    }
}

pub fn news_summary(renderer: &DocumentRenderer, item: &NewsItem) -> NewsSummaryView {
    let excerpt = text(item.excerpt.as_deref()).or_else(|| {
        let body = plain_text(item.body.blocks());
        (!body.is_empty()).then(|| truncate(&body, SUMMARY_LEN))
    });

    NewsSummaryView {
        id: item.id.clone(),
        title: sanitize_text(&item.title),
        slug: slug(item.slug.as_deref()),
        published_at: item.published_at,
        excerpt,
        image: item
            .main_image
            .as_ref()
            .and_then(|img| image_view(renderer, img, ImageOptions::width(CARD_WIDTH))),
    }
}

pub fn news_article(renderer: &DocumentRenderer, item: &NewsItem) -> NewsArticleView {
    NewsArticleView {
        summary: news_summary(renderer, item),
        body_html: renderer.render_html(item.body.blocks()),
    }
}

pub fn homepage(renderer: &DocumentRenderer, data: &HomepageData) -> HomepageView {
    HomepageView {
        settings: data.settings.as_ref().map(|s| settings(renderer, s)),
        introduction: data
            .introduction
            .as_ref()
            .map(|i| introduction(renderer, i)),
        news: data.news.iter().map(|n| news_summary(renderer, n)).collect(),
    }
}

pub fn board_member(renderer: &DocumentRenderer, member: &BoardMember) -> BoardMemberView {
    BoardMemberView {
        id: member.id.clone(),
        name: sanitize_text(&member.name),
        position: text(member.position.as_deref()),
        photo: portrait(renderer, member.photo.as_ref()),
        bio_html: renderer.render_html(member.bio.blocks()),
        phone: text(member.phone.as_deref()),
        email: text(member.email.as_deref()),
    }
}

pub fn staff_member(renderer: &DocumentRenderer, member: &StaffMember) -> StaffMemberView {
    StaffMemberView {
        id: member.id.clone(),
        name: sanitize_text(&member.name),
        designation: text(member.designation.as_deref()),
        department: text(member.department.as_deref()),
        photo: portrait(renderer, member.photo.as_ref()),
        phone: text(member.phone.as_deref()),
        email: text(member.email.as_deref()),
    }
}

pub fn announcement(renderer: &DocumentRenderer, item: &Announcement) -> AnnouncementView {
    AnnouncementView {
        id: item.id.clone(),
        title: sanitize_text(&item.title),
        summary: truncate(&plain_text(item.body.blocks()), SUMMARY_LEN),
        body_html: renderer.render_html(item.body.blocks()),
        published_at: item.published_at,
        priority: text(item.priority.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahakari_core::image::{DEFAULT_CDN_BASE, Dimensions};
    use sahakari_core::{Document, ImageUrlBuilder, RenderOptions, parse_document};
    use serde_json::json;

    fn renderer() -> DocumentRenderer {
        DocumentRenderer::new(
            ImageUrlBuilder::new(DEFAULT_CDN_BASE, "abc123", "production"),
            RenderOptions::default(),
        )
    }

    fn body(text: &str) -> Document {
        parse_document(&json!([{"_type": "block", "children": [{"text": text}]}]))
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("café", 4), "caf...");
        assert_eq!(truncate("नमस्ते", 4), "न...");
    }

    #[test]
    fn settings_drop_unsafe_cta_link() {
        let view = settings(
            &renderer(),
            &HomepageSettings {
                hero_title: Some("<b>Welcome</b>".to_string()),
                hero_cta_label: Some("Join".to_string()),
                hero_cta_link: Some("javascript:alert(1)".to_string()),
                ..HomepageSettings::default()
            },
        );
        assert_eq!(view.hero_title.as_deref(), Some("Welcome"));
        assert!(view.hero_cta.is_none());
    }

    #[test]
    fn settings_keep_safe_cta_link() {
        let view = settings(
            &renderer(),
            &HomepageSettings {
                hero_cta_label: Some("Contact".to_string()),
                hero_cta_link: Some("/contact".to_string()),
                ..HomepageSettings::default()
            },
        );
        let cta = view.hero_cta.unwrap();
        assert_eq!(cta.href, "/contact");
        assert_eq!(cta.label, "Contact");
    }

    #[test]
    fn blank_text_becomes_none() {
        let view = settings(
            &renderer(),
            &HomepageSettings {
                address: Some("<script>x</script>   ".to_string()),
                ..HomepageSettings::default()
            },
        );
        assert!(view.address.is_none());
    }

    #[test]
    fn portrait_uses_cropped_square() {
        let member = BoardMember {
            id: "b1".to_string(),
            name: "Sita".to_string(),
            photo: Some(ImageRef::from_asset_ref("image-abc-1200x800-jpg")),
            bio: body("Founding member."),
            ..BoardMember::default()
        };
        let view = board_member(&renderer(), &member);
        let photo = view.photo.unwrap();
        assert_eq!(
            photo.src,
            "https://cdn.sanity.io/images/abc123/production/abc-1200x800.jpg?w=400&h=400&q=80&fit=crop"
        );
        assert_eq!((photo.width, photo.height), (Some(400), Some(400)));
        assert!(photo.src_set.contains(" 480w"));
        assert_eq!(view.bio_html, "<p>Founding member.</p>");
    }

    #[test]
    fn image_height_follows_aspect_ratio() {
        let item = NewsItem {
            id: "n1".to_string(),
            title: "AGM".to_string(),
            main_image: Some(ImageRef::from_asset_ref("image-abc-1600x900-png")),
            ..NewsItem::default()
        };
        let image = news_summary(&renderer(), &item).image.unwrap();
        assert_eq!((image.width, image.height), (Some(800), Some(450)));
    }

    #[test]
    fn tall_image_height_does_not_overflow() {
        let item = NewsItem {
            id: "n1".to_string(),
            title: "AGM".to_string(),
            main_image: Some(ImageRef {
                asset_ref: "image-abc-1x6000000-png".to_string(),
                url: None,
                dimensions: Some(Dimensions {
                    width: 1,
                    height: 6_000_000,
                }),
            }),
            ..NewsItem::default()
        };
        let image = news_summary(&renderer(), &item).image.unwrap();
        assert_eq!((image.width, image.height), (Some(800), None));
    }

    #[test]
    fn unsafe_slug_is_dropped() {
        let mut item = NewsItem {
            id: "n1".to_string(),
            title: "AGM".to_string(),
            slug: Some("agm-2024".to_string()),
            ..NewsItem::default()
        };
        assert_eq!(news_summary(&renderer(), &item).slug.as_deref(), Some("agm-2024"));

        for bad in ["<script>x</script>", "../admin", "a b", "javascript:alert(1)", ""] {
            item.slug = Some(bad.to_string());
            assert!(news_summary(&renderer(), &item).slug.is_none(), "{bad}");
        }
    }

    #[test]
    fn nested_fragments_in_titles_are_stripped() {
        let item = NewsItem {
            id: "n1".to_string(),
            title: "<<b>script>alert(1)<</b>/script>AGM".to_string(),
            ..NewsItem::default()
        };
        assert_eq!(news_summary(&renderer(), &item).title, "AGM");
    }

    #[test]
    fn unsafe_expanded_image_url_is_dropped() {
        let member = StaffMember {
            id: "s1".to_string(),
            name: "Hari".to_string(),
            photo: Some(ImageRef {
                asset_ref: "image-abc-10x10-png".to_string(),
                url: Some("javascript:alert(1)".to_string()),
                dimensions: None,
            }),
            ..StaffMember::default()
        };
        assert!(staff_member(&renderer(), &member).photo.is_none());
    }

    #[test]
    fn news_excerpt_falls_back_to_body_text() {
        let item = NewsItem {
            id: "n1".to_string(),
            title: "AGM".to_string(),
            body: body(&"x".repeat(300)),
            ..NewsItem::default()
        };
        let view = news_summary(&renderer(), &item);
        let excerpt = view.excerpt.unwrap();
        assert_eq!(excerpt.len(), SUMMARY_LEN + 3);

        let article = news_article(&renderer(), &item);
        assert!(article.body_html.starts_with("<p>"));
        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["title"], "AGM");
        assert!(value["bodyHtml"].is_string());
    }

    #[test]
    fn announcement_escapes_body_markup() {
        let item = Announcement {
            id: "a1".to_string(),
            title: "Notice".to_string(),
            body: body("Office closed <img src=x onerror=alert(1)> Friday"),
            ..Announcement::default()
        };
        let view = announcement(&renderer(), &item);
        assert!(!view.body_html.contains("<img"));
        assert!(!view.body_html.contains("onerror"));
        assert_eq!(view.summary, "Office closed  Friday");
    }
}
