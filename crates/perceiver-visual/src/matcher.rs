///! Template matching over a template set
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::VisualError;
use crate::models::{
    Frame, MatchReport, RecognitionFailure, Region, Template, TemplateMatch, TemplateSet,
};
use crate::scoring::{NccScorer, Scorer};

/// Scores frames against a fixed, shared set of templates.
///
/// Matching is read-only: templates are never mutated, so one matcher can be
/// used from blocking workers while the engine keeps running.
#[derive(Clone)]
pub struct TemplateMatcher {
    templates: Arc<TemplateSet>,
    scorer: Arc<dyn Scorer>,
}

impl TemplateMatcher {
    /// Create a matcher using normalized cross-correlation
    pub fn new(templates: TemplateSet) -> Self {
        Self::with_scorer(templates, Arc::new(NccScorer::new()))
    }

    pub fn with_scorer(templates: TemplateSet, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            templates: Arc::new(templates),
            scorer,
        }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Score one template, honoring its search region
    pub fn score(&self, frame: &Frame, name: &str) -> Result<TemplateMatch, VisualError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| VisualError::UnknownTemplate(name.to_string()))?;
        self.score_template(frame, template)
    }

    fn score_template(
        &self,
        frame: &Frame,
        template: &Template,
    ) -> Result<TemplateMatch, VisualError> {
        let (score, origin) = match template.region() {
            Some(region) => {
                let cropped = frame.crop(region)?;
                (
                    self.scorer.score(&cropped, template)?,
                    (region.x, region.y),
                )
            }
            None => (self.scorer.score(frame, template)?, (0, 0)),
        };

        if !score.value.is_finite() {
            return Err(VisualError::Recognition(format!(
                "scorer returned {} for {}",
                score.value,
                template.name()
            )));
        }

        let (width, height) = template.size();
        let region = score
            .location
            .map(|(x, y)| Region::new(x, y, width, height).offset(origin.0, origin.1));

        Ok(TemplateMatch {
            template: template.name().to_string(),
            score: score.value,
            region,
        })
    }

    /// Match the named templates against a frame.
    ///
    /// Only templates scoring at or above their threshold are reported as
    /// matches. Unknown names and scorer errors are recorded as failures.
    pub fn match_templates<'a, I>(&self, frame: &Frame, names: I) -> MatchReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = MatchReport::default();
        let mut ranked: Vec<(usize, TemplateMatch)> = Vec::new();

        for name in names {
            let Some(template) = self.templates.get(name) else {
                report.failures.push(RecognitionFailure {
                    template: name.to_string(),
                    error: VisualError::UnknownTemplate(name.to_string()),
                });
                continue;
            };
            match self.score_template(frame, template) {
                Ok(m) if m.score >= template.threshold() => {
                    let position = self.templates.position(name).unwrap_or(usize::MAX);
                    ranked.push((position, m));
                }
                Ok(m) => {
                    debug!(
                        template = name,
                        score = m.score,
                        threshold = template.threshold(),
                        "below threshold"
                    );
                }
                Err(error) => {
                    warn!(template = name, %error, "recognition failed");
                    report.failures.push(RecognitionFailure {
                        template: name.to_string(),
                        error,
                    });
                }
            }
        }

        ranked.sort_by(|(pa, a), (pb, b)| b.score.total_cmp(&a.score).then(pa.cmp(pb)));
        ranked.dedup_by(|(pa, _), (pb, _)| pa == pb);
        report.matches = ranked.into_iter().map(|(_, m)| m).collect();
        report
    }

    /// Locate a template on a frame, returning the matched area if it clears
    /// its threshold.
    pub fn locate(&self, frame: &Frame, name: &str) -> Result<Option<TemplateMatch>, VisualError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| VisualError::UnknownTemplate(name.to_string()))?;
        let found = self.score_template(frame, template)?;
        Ok((found.score >= template.threshold()).then_some(found))
    }
}

impl std::fmt::Debug for TemplateMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateMatcher")
            .field("templates", &self.templates.len())
            .finish()
    }
}
