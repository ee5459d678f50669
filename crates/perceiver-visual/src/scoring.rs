///! Similarity scoring between a frame and a template
use image::GenericImageView;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use tracing::trace;

use crate::cache::TemplateCache;
use crate::errors::VisualError;
use crate::models::{Frame, Template};

/// Best fit of a template inside a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Similarity in [0.0, 1.0]
    pub value: f64,

    /// Top-left corner of the best fit, if the scorer locates matches
    pub location: Option<(u32, u32)>,
}

impl Score {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            location: None,
        }
    }

    pub fn at(value: f64, location: (u32, u32)) -> Self {
        Self {
            value,
            location: Some(location),
        }
    }
}

/// Pure scoring function over (frame, template).
///
/// Implementations must be deterministic: the same inputs always give the
/// same score. Errors are reported per template and treated as "no match".
pub trait Scorer: Send + Sync {
    fn score(&self, frame: &Frame, template: &Template) -> Result<Score, VisualError>;
}

/// Normalized cross-correlation over grayscale images
#[derive(Default)]
pub struct NccScorer {
    cache: TemplateCache,
}

impl NccScorer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scorer for NccScorer {
    fn score(&self, frame: &Frame, template: &Template) -> Result<Score, VisualError> {
        let tpl = self.cache.luma(template);
        let (tw, th) = tpl.dimensions();
        let (fw, fh) = frame.image.dimensions();

        // match_template panics when the template exceeds the search image
        if tw == 0 || th == 0 || tw > fw || th > fh {
            return Err(VisualError::TemplateTooLarge {
                template: template.name().to_string(),
                template_size: (tw, th),
                search_size: (fw, fh),
            });
        }

        let haystack = frame.image.to_luma8();
        let result = match_template(
            &haystack,
            &tpl,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&result);

        // all-black areas divide by zero
        let value = if extremes.max_value.is_finite() {
            f64::from(extremes.max_value).clamp(0.0, 1.0)
        } else {
            0.0
        };

        trace!(
            template = template.name(),
            score = value,
            x = extremes.max_value_location.0,
            y = extremes.max_value_location.1,
            "ncc scored"
        );

        Ok(Score::at(value, extremes.max_value_location))
    }
}
