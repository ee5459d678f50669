///! Error types for recognition operations
use std::fmt;

use crate::models::Region;

#[derive(Debug, Clone)]
pub enum VisualError {
    /// Scoring function failed on a frame/template pair
    Recognition(String),

    /// Image processing error
    ImageProcessing(String),

    /// Threshold outside (0, 1]
    InvalidThreshold { template: String, threshold: f64 },

    /// Two templates share one name
    DuplicateTemplate(String),

    /// Template name not present in the set
    UnknownTemplate(String),

    /// Search region does not fit inside the frame
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },

    /// Template is larger than the area it is searched in
    TemplateTooLarge {
        template: String,
        template_size: (u32, u32),
        search_size: (u32, u32),
    },

    /// Invalid input parameters
    InvalidInput(String),
}

impl VisualError {
    /// Errors produced while scoring a live frame; planning treats them as "no match".
    pub fn is_recognition_failure(&self) -> bool {
        matches!(
            self,
            Self::Recognition(_)
                | Self::ImageProcessing(_)
                | Self::RegionOutOfBounds { .. }
                | Self::TemplateTooLarge { .. }
        )
    }
}

impl fmt::Display for VisualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recognition(msg) => write!(f, "Recognition failed: {}", msg),
            Self::ImageProcessing(msg) => write!(f, "Image processing error: {}", msg),
            Self::InvalidThreshold {
                template,
                threshold,
            } => write!(
                f,
                "Template {} has invalid threshold {} (must be in (0, 1])",
                template, threshold
            ),
            Self::DuplicateTemplate(name) => write!(f, "Duplicate template name: {}", name),
            Self::UnknownTemplate(name) => write!(f, "Unknown template: {}", name),
            Self::RegionOutOfBounds {
                region,
                width,
                height,
            } => write!(
                f,
                "Region {} is outside the {}x{} frame",
                region, width, height
            ),
            Self::TemplateTooLarge {
                template,
                template_size,
                search_size,
            } => write!(
                f,
                "Template {} ({}x{}) does not fit the {}x{} search area",
                template, template_size.0, template_size.1, search_size.0, search_size.1
            ),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for VisualError {}

impl From<image::ImageError> for VisualError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}
