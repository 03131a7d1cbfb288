//! Cloudinary image URL transformations.
//!
//! Product images are stored as plain delivery URLs. This module rewrites
//! them for the size they are shown at by inserting a transformation
//! segment after `/upload/`.

use url::Url;

use crate::config::ImageConfig;

const CLOUDINARY_HOST: &str = "res.cloudinary.com";
const UPLOAD_PATH: &str = "/image/upload/";

/// Named transformation presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePreset {
    /// Listing cards.
    Thumbnail,
    /// Product page gallery.
    Detail,
    /// Full-size zoom.
    Zoom,
}

impl ImagePreset {
    #[must_use]
    pub const fn transformation(self) -> &'static str {
        match self {
            Self::Thumbnail => "c_fill,w_400,h_500,q_auto,f_auto",
            Self::Detail => "c_limit,w_1200,q_auto,f_auto",
            Self::Zoom => "c_limit,w_2000,q_auto",
        }
    }
}

/// Rewrites image URLs for the configured Cloudinary account.
#[derive(Debug, Clone, Default)]
pub struct ImageTransformer {
    cloud_name: Option<String>,
}

impl ImageTransformer {
    #[must_use]
    pub fn new(config: Option<&ImageConfig>) -> Self {
        Self {
            cloud_name: config.map(|c| c.cloud_name.clone()),
        }
    }

    /// URL of `source` transformed with `preset`.
    ///
    /// Non-Cloudinary sources, sources from another cloud, already
    /// transformed sources, and every source when Cloudinary is not
    /// configured are returned unchanged.
    #[must_use]
    pub fn url(&self, source: &str, preset: ImagePreset) -> String {
        self.transform(source, preset)
            .unwrap_or_else(|| source.to_owned())
    }

    fn transform(&self, source: &str, preset: ImagePreset) -> Option<String> {
        let cloud_name = self.cloud_name.as_deref()?;

        let parsed = Url::parse(source).ok()?;
        if parsed.host_str() != Some(CLOUDINARY_HOST) {
            return None;
        }

        let prefix = format!("/{cloud_name}{UPLOAD_PATH}");
        let rest = parsed.path().strip_prefix(&prefix)?;
        let first_segment = rest.split('/').next().unwrap_or_default();
        if is_transformation(first_segment) {
            return None;
        }

        let split_at = source.find(&prefix)? + prefix.len();
        let (head, tail) = source.split_at(split_at);
        Some(format!("{head}{}/{tail}", preset.transformation()))
    }
}

/// Whether a path segment is a transformation such as `c_fill,w_400`.
///
/// Version segments (`v1712345678`) and file names are not.
fn is_transformation(segment: &str) -> bool {
    !segment.is_empty()
        && segment.split(',').all(|part| {
            part.split_once('_').is_some_and(|(key, value)| {
                (1..=3).contains(&key.len())
                    && key.bytes().all(|b| b.is_ascii_lowercase())
                    && !value.is_empty()
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "https://res.cloudinary.com/bazaar/image/upload/v1712345678/kurtas/indigo.jpg";

    fn transformer() -> ImageTransformer {
        ImageTransformer::new(Some(&ImageConfig {
            cloud_name: "bazaar".to_string(),
        }))
    }

    #[test]
    fn test_inserts_preset_after_upload() {
        assert_eq!(
            transformer().url(SOURCE, ImagePreset::Thumbnail),
            "https://res.cloudinary.com/bazaar/image/upload/c_fill,w_400,h_500,q_auto,f_auto/v1712345678/kurtas/indigo.jpg"
        );
        assert_eq!(
            transformer().url(SOURCE, ImagePreset::Zoom),
            "https://res.cloudinary.com/bazaar/image/upload/c_limit,w_2000,q_auto/v1712345678/kurtas/indigo.jpg"
        );
    }

    #[test]
    fn test_unconfigured_returns_source() {
        let transformer = ImageTransformer::new(None);
        assert_eq!(transformer.url(SOURCE, ImagePreset::Detail), SOURCE);
    }

    #[test]
    fn test_other_hosts_and_clouds_untouched() {
        let other_host = "https://cdn.example.com/image/upload/kurta.jpg";
        assert_eq!(transformer().url(other_host, ImagePreset::Detail), other_host);

        let other_cloud = "https://res.cloudinary.com/someone-else/image/upload/kurta.jpg";
        assert_eq!(
            transformer().url(other_cloud, ImagePreset::Detail),
            other_cloud
        );

        assert_eq!(transformer().url("not a url", ImagePreset::Detail), "not a url");
    }

    #[test]
    fn test_already_transformed_is_not_transformed_twice() {
        let transformed = transformer().url(SOURCE, ImagePreset::Detail);
        assert_eq!(
            transformer().url(&transformed, ImagePreset::Thumbnail),
            transformed
        );
    }

    #[test]
    fn test_is_transformation() {
        assert!(is_transformation("c_fill,w_400"));
        assert!(is_transformation("q_auto"));
        assert!(!is_transformation("v1712345678"));
        assert!(!is_transformation("indigo.jpg"));
        assert!(!is_transformation("summer_sale"));
        assert!(!is_transformation(""));
    }
}
