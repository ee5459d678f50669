///! Data models for frame recognition
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::errors::VisualError;

/// Rectangular area in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Whether the region is non-empty and lies entirely inside a `width`x`height` frame
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|right| right <= width)
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }

    pub fn offset(&self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// One captured device screen
#[derive(Debug, Clone)]
pub struct Frame {
    /// Unique identifier for the frame
    pub id: String,

    /// Decoded image, shared so frames are cheap to hand to blocking workers
    pub image: Arc<DynamicImage>,

    /// Capture timestamp
    pub timestamp: SystemTime,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image: Arc::new(image),
            timestamp: SystemTime::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy of the area under `region`; keeps id and timestamp of the source frame
    pub fn crop(&self, region: Region) -> Result<Frame, VisualError> {
        let (width, height) = self.image.dimensions();
        if !region.fits_within(width, height) {
            return Err(VisualError::RegionOutOfBounds {
                region,
                width,
                height,
            });
        }
        let cropped = self
            .image
            .crop_imm(region.x, region.y, region.width, region.height);
        Ok(Frame {
            id: self.id.clone(),
            image: Arc::new(cropped),
            timestamp: self.timestamp,
        })
    }
}

/// Named reference pattern used to recognise a UI state
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    image: Arc<DynamicImage>,
    threshold: f64,
    region: Option<Region>,
    tags: BTreeSet<String>,
}

impl Template {
    /// Create a template; threshold must be in (0, 1] since zero would match anything
    pub fn new(
        name: impl Into<String>,
        image: DynamicImage,
        threshold: f64,
    ) -> Result<Self, VisualError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VisualError::InvalidInput(
                "template name cannot be empty".to_string(),
            ));
        }
        if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
            return Err(VisualError::InvalidThreshold {
                template: name,
                threshold,
            });
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(VisualError::InvalidInput(format!(
                "template {} has an empty image",
                name
            )));
        }
        Ok(Self {
            name,
            image: Arc::new(image),
            threshold,
            region: None,
            tags: BTreeSet::new(),
        })
    }

    /// Restrict the search to a region of the frame
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Shared handle to the reference image; clones of a template share it
    pub fn image_handle(&self) -> &Arc<DynamicImage> {
        &self.image
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Templates keyed by unique name, in insertion order
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<Template>,
    index: HashMap<String, usize>,
}

impl TemplateSet {
    pub fn new(templates: impl IntoIterator<Item = Template>) -> Result<Self, VisualError> {
        let mut set = Self::default();
        for template in templates {
            set.insert(template)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, template: Template) -> Result<(), VisualError> {
        if self.index.contains_key(template.name()) {
            return Err(VisualError::DuplicateTemplate(template.name().to_string()));
        }
        self.index
            .insert(template.name().to_string(), self.templates.len());
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.index.get(name).map(|&idx| &self.templates[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Insertion position, used to keep tie ordering stable
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.name())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// A template whose score met its threshold on a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub template: String,

    /// Similarity score (0.0-1.0)
    pub score: f64,

    /// Matched area in frame coordinates, when the scorer reports one
    pub region: Option<Region>,
}

/// Template that could not be scored on a frame
#[derive(Debug, Clone)]
pub struct RecognitionFailure {
    pub template: String,
    pub error: VisualError,
}

/// Result of matching one frame against a set of templates
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// Matches in descending score order; ties keep template insertion order
    pub matches: Vec<TemplateMatch>,

    /// Templates whose scoring failed; counted as "no match"
    pub failures: Vec<RecognitionFailure>,
}

impl MatchReport {
    pub fn get(&self, template: &str) -> Option<&TemplateMatch> {
        self.matches.iter().find(|m| m.template == template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    #[test]
    fn test_template_threshold_bounds() {
        assert!(Template::new("zero", gray(2, 2, 10), 0.0).is_err());
        assert!(Template::new("neg", gray(2, 2, 10), -0.5).is_err());
        assert!(Template::new("over", gray(2, 2, 10), 1.01).is_err());
        assert!(Template::new("nan", gray(2, 2, 10), f64::NAN).is_err());
        assert!(Template::new("one", gray(2, 2, 10), 1.0).is_ok());
    }

    #[test]
    fn test_template_set_rejects_duplicates() {
        let result = TemplateSet::new(vec![
            Template::new("menu", gray(2, 2, 1), 0.8).unwrap(),
            Template::new("menu", gray(3, 3, 1), 0.9).unwrap(),
        ]);
        assert!(matches!(result, Err(VisualError::DuplicateTemplate(name)) if name == "menu"));
    }

    #[test]
    fn test_template_set_preserves_order() {
        let set = TemplateSet::new(vec![
            Template::new("b", gray(2, 2, 1), 0.8).unwrap(),
            Template::new("a", gray(2, 2, 1), 0.8).unwrap(),
        ])
        .unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.position("a"), Some(1));
    }

    #[test]
    fn test_frame_crop_bounds() {
        let frame = Frame::new(gray(10, 8, 0));
        let cropped = frame.crop(Region::new(2, 2, 4, 4)).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (4, 4));
        assert_eq!(cropped.id, frame.id);

        assert!(frame.crop(Region::new(8, 0, 4, 4)).is_err());
        assert!(frame.crop(Region::new(0, 0, 0, 4)).is_err());
    }

    #[test]
    fn test_region_center() {
        assert_eq!(Region::new(10, 20, 30, 40).center(), (25, 40));
    }
}
