///! Grayscale template cache
use dashmap::DashMap;
use image::{DynamicImage, GrayImage};
use std::sync::Arc;

use crate::models::Template;

/// Luma conversion together with the image it was made from
#[derive(Clone)]
struct CachedLuma {
    source: Arc<DynamicImage>,
    luma: Arc<GrayImage>,
}

/// Luma conversions of templates, computed once per template image.
///
/// Entries are keyed by name but only served for the exact image they were
/// converted from, so a scorer shared between template sets that reuse a
/// name never scores against the wrong picture.
#[derive(Default)]
pub struct TemplateCache {
    cache: Arc<DashMap<String, CachedLuma>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the grayscale image for a template, converting on first use
    pub fn luma(&self, template: &Template) -> Arc<GrayImage> {
        let source = template.image_handle();
        if let Some(entry) = self.cache.get(template.name()) {
            if Arc::ptr_eq(&entry.source, source) {
                return Arc::clone(&entry.luma);
            }
        }
        let luma = Arc::new(source.to_luma8());
        self.cache.insert(
            template.name().to_string(),
            CachedLuma {
                source: Arc::clone(source),
                luma: Arc::clone(&luma),
            },
        );
        luma
    }

    /// Get cache size
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gray(width: u32, height: u32, level: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([level])))
    }

    #[test]
    fn test_cache_converts_once() {
        let cache = TemplateCache::new();
        assert!(cache.is_empty());

        let template = Template::new("button", gray(3, 2, 40), 0.9).unwrap();

        let first = cache.luma(&template);
        let second = cache.luma(&template.clone());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dimensions(), (3, 2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_same_name_different_image_is_not_stale() {
        let cache = TemplateCache::new();
        let dark = Template::new("logo", gray(2, 2, 10), 0.9).unwrap();
        let bright = Template::new("logo", gray(4, 4, 200), 0.9).unwrap();

        assert_eq!(cache.luma(&dark).get_pixel(0, 0)[0], 10);
        let luma = cache.luma(&bright);
        assert_eq!(luma.dimensions(), (4, 4));
        assert_eq!(luma.get_pixel(0, 0)[0], 200);
        assert_eq!(cache.luma(&dark).get_pixel(0, 0)[0], 10);
    }
}
