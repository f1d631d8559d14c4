//! CDN image URL construction.
//!
//! CMS image fields carry an opaque asset reference of the form
//! `image-<id>-<width>x<height>-<ext>`. [`ImageUrlBuilder`] turns a reference
//! plus sizing options into a CDN URL. Building is a pure function of its
//! inputs: no clocks, no randomness, fixed parameter order.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default CDN origin for image assets.
pub const DEFAULT_CDN_BASE: &str = "https://cdn.sanity.io";

/// Known pixel dimensions of an image asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Reference to an image asset embedded in a CMS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImage", into = "RawImage")]
pub struct ImageRef {
    /// Opaque asset reference (`image-<id>-<w>x<h>-<ext>`).
    pub asset_ref: String,
    /// Direct asset URL, present when the query expanded the asset.
    pub url: Option<String>,
    /// Known dimensions, if any.
    pub dimensions: Option<Dimensions>,
}

impl ImageRef {
    /// Build a reference from a bare asset reference string.
    ///
    /// Dimensions are taken from the reference when it is well-formed.
    pub fn from_asset_ref(asset_ref: impl Into<String>) -> Self {
        let asset_ref = asset_ref.into();
        let dimensions = parse_asset_ref(&asset_ref).ok().map(|a| Dimensions {
            width: a.width,
            height: a.height,
        });
        Self {
            asset_ref,
            url: None,
            dimensions,
        }
    }
}

/// CMS wire shape of an image field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset: Option<RawAsset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawAsset {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimensions: Option<Dimensions>,
}

impl TryFrom<RawImage> for ImageRef {
    type Error = Error;

    fn try_from(raw: RawImage) -> Result<Self> {
        let asset = raw.asset.ok_or(Error::InvalidField {
            field: "asset",
            reason: "image has no asset".to_string(),
        })?;
        let asset_ref = asset
            .reference
            .or(asset.id)
            .filter(|r| !r.is_empty())
            .ok_or(Error::InvalidField {
                field: "asset",
                reason: "asset has neither _ref nor _id".to_string(),
            })?;

        let mut image = ImageRef::from_asset_ref(asset_ref);
        image.url = asset.url.filter(|u| !u.is_empty());
        if let Some(dims) = asset.metadata.and_then(|m| m.dimensions) {
            image.dimensions = Some(dims);
        }
        Ok(image)
    }
}

impl From<ImageRef> for RawImage {
    fn from(image: ImageRef) -> Self {
        RawImage {
            asset: Some(RawAsset {
                reference: Some(image.asset_ref),
                id: None,
                url: image.url,
                metadata: image.dimensions.map(|d| RawMetadata {
                    dimensions: Some(d),
                }),
            }),
        }
    }
}

/// Decoded parts of an `image-<id>-<w>x<h>-<ext>` asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetId {
    /// Content hash part of the reference.
    pub id: String,
    /// Original width.
    pub width: u32,
    /// Original height.
    pub height: u32,
    /// File extension (`jpg`, `png`, ...).
    pub extension: String,
}

/// Parse an asset reference into its parts.
pub fn parse_asset_ref(asset_ref: &str) -> Result<AssetId> {
    let invalid = || Error::InvalidAssetRef(asset_ref.to_string());

    let rest = asset_ref.strip_prefix("image-").ok_or_else(invalid)?;
    let (rest, extension) = rest.rsplit_once('-').ok_or_else(invalid)?;
    let (id, dims) = rest.rsplit_once('-').ok_or_else(invalid)?;
    let (w, h) = dims.split_once('x').ok_or_else(invalid)?;

    let width: u32 = w.parse().map_err(|_| invalid())?;
    let height: u32 = h.parse().map_err(|_| invalid())?;

    let valid_part = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid_part(id) || !valid_part(extension) {
        return Err(invalid());
    }

    Ok(AssetId {
        id: id.to_string(),
        width,
        height,
        extension: extension.to_string(),
    })
}

/// Output format requested from the CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Webp,
    /// Any format the CDN does not support; ignored when building.
    #[serde(other)]
    Unsupported,
}

impl ImageFormat {
    fn as_param(self) -> Option<&'static str> {
        match self {
            Self::Jpg => Some("jpg"),
            Self::Png => Some("png"),
            Self::Webp => Some("webp"),
            Self::Unsupported => None,
        }
    }
}

/// Resize behaviour when both width and height are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    Clip,
    Crop,
    Fill,
    Max,
    Min,
    Scale,
    #[serde(other)]
    Unsupported,
}

impl FitMode {
    fn as_param(self) -> Option<&'static str> {
        match self {
            Self::Clip => Some("clip"),
            Self::Crop => Some("crop"),
            Self::Fill => Some("fill"),
            Self::Max => Some("max"),
            Self::Min => Some("min"),
            Self::Scale => Some("scale"),
            Self::Unsupported => None,
        }
    }
}

/// Sizing and encoding options for a built URL.
///
/// Deserialization ignores unknown keys and unknown enum values so options
/// coming from configuration never fail the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Target width in pixels (`0` is ignored).
    pub width: Option<u32>,
    /// Target height in pixels (`0` is ignored).
    pub height: Option<u32>,
    /// Encoding quality, clamped to `1..=100`.
    pub quality: Option<i64>,
    /// Output format.
    pub format: Option<ImageFormat>,
    /// Resize mode.
    pub fit: Option<FitMode>,
}

impl ImageOptions {
    /// Options with only a width set.
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    /// Query parameters in their fixed order.
    fn query_pairs(&self) -> Vec<String> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(w) = self.width.filter(|w| *w > 0) {
            pairs.push(format!("w={w}"));
        }
        if let Some(h) = self.height.filter(|h| *h > 0) {
            pairs.push(format!("h={h}"));
        }
        if let Some(q) = self.quality {
            pairs.push(format!("q={}", q.clamp(1, 100)));
        }
        if let Some(fm) = self.format.and_then(ImageFormat::as_param) {
            pairs.push(format!("fm={fm}"));
        }
        if let Some(fit) = self.fit.and_then(FitMode::as_param) {
            pairs.push(format!("fit={fit}"));
        }
        pairs
    }
}

/// Builds CDN URLs for image assets of one project/dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrlBuilder {
    cdn_base: String,
    project_id: String,
    dataset: String,
}

impl ImageUrlBuilder {
    /// Create a builder for the given CDN origin, project and dataset.
    pub fn new(
        cdn_base: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            cdn_base: cdn_base.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            dataset: dataset.into(),
        }
    }

    /// Build the URL for `image` with the given options.
    pub fn build_image_url(&self, image: &ImageRef, opts: &ImageOptions) -> String {
        let base = match image.url.as_deref() {
            Some(url) => url.to_string(),
            None => self.asset_url(&image.asset_ref),
        };

        let pairs = opts.query_pairs();
        if pairs.is_empty() {
            return base;
        }
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}{}", pairs.join("&"))
    }

    /// Build a `srcset` value with one descriptor per distinct width.
    ///
    /// Widths keep their input order; repeated and zero widths are skipped.
    pub fn build_src_set(&self, image: &ImageRef, widths: &[u32], opts: &ImageOptions) -> String {
        let mut seen = Vec::with_capacity(widths.len());
        let mut descriptors = Vec::with_capacity(widths.len());

        for &width in widths {
            if width == 0 || seen.contains(&width) {
                continue;
            }
            seen.push(width);
            let sized = ImageOptions {
                width: Some(width),
                ..opts.clone()
            };
            descriptors.push(format!("{} {width}w", self.build_image_url(image, &sized)));
        }

        descriptors.join(", ")
    }

    fn asset_url(&self, asset_ref: &str) -> String {
        let file = match parse_asset_ref(asset_ref) {
            Ok(asset) => format!(
                "{}-{}x{}.{}",
                asset.id, asset.width, asset.height, asset.extension
            ),
            Err(_) => asset_ref
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect(),
        };
        format!(
            "{}/images/{}/{}/{file}",
            self.cdn_base, self.project_id, self.dataset
        )
    }
}
