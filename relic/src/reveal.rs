//! Scroll reveal - one-shot fade/slide-in for page sections
//!
//! Platform-agnostic half of the reveal effect. The web shell registers
//! each scroll section here, applies the returned [`SectionStyle`], and
//! forwards intersection reports. A section is revealed the first time its
//! visible fraction reaches the threshold and never hides again. Sections
//! too tall to ever reach that fraction are revealed once their visible
//! part covers the same fraction of the viewport.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut tracker = RevealTracker::new(RevealConfig::default());
//! let (id, initial) = tracker.register();
//! apply(element, &initial);
//!
//! if let Some(style) = tracker.on_visibility(id, 0.35) {
//!     apply(element, &style);
//! }
//! ```

use crate::config::RevealConfig;

/// Index of a registered section.
pub type SectionId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Hidden,
    Revealed,
}

/// Inline style the shell writes onto a section element.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionStyle {
    pub opacity: f32,
    pub translate_y_px: f32,
    /// Only set on the initial style; revealing keeps the existing transition
    pub transition: Option<String>,
}

impl SectionStyle {
    /// CSS `transform` value for this style.
    pub fn transform(&self) -> String {
        if self.translate_y_px == 0.0 {
            "translateY(0)".to_string()
        } else {
            format!("translateY({}px)", self.translate_y_px)
        }
    }

    pub fn opacity_css(&self) -> String {
        format!("{}", self.opacity)
    }
}

/// One intersection report for a section.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intersection {
    /// Visible fraction of the section
    pub ratio: f64,
    /// Visible height of the section as a fraction of the viewport height
    pub viewport_coverage: f64,
}

/// Observer thresholds between zero and the reveal threshold.
const OBSERVER_STEPS: usize = 10;

/// Tracks reveal state for every registered section.
#[derive(Debug)]
pub struct RevealTracker {
    config: RevealConfig,
    sections: Vec<RevealState>,
}

impl RevealTracker {
    pub fn new(config: RevealConfig) -> Self {
        Self {
            config,
            sections: Vec::new(),
        }
    }

    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// Threshold to hand to the intersection observer.
    pub fn threshold(&self) -> f64 {
        self.config.clamped_threshold()
    }

    /// Ratios at which the intersection observer should report.
    ///
    /// Intermediate steps make tall sections report while they scroll in,
    /// so their viewport coverage is re-checked.
    pub fn observer_thresholds(&self) -> Vec<f64> {
        let threshold = self.threshold();
        if threshold == 0.0 {
            return vec![0.0];
        }
        (0..=OBSERVER_STEPS)
            .map(|step| threshold * step as f64 / OBSERVER_STEPS as f64)
            .collect()
    }

    /// Register a section, returning its id and the hidden starting style.
    pub fn register(&mut self) -> (SectionId, SectionStyle) {
        let id = self.sections.len();
        self.sections.push(RevealState::Hidden);
        (
            id,
            SectionStyle {
                opacity: 0.0,
                translate_y_px: self.config.offset_px,
                transition: Some(self.config.transition.clone()),
            },
        )
    }

    /// Report the visible fraction of a section.
    ///
    /// Returns the revealed style exactly once per section, on the first
    /// report at or above the threshold. Unknown ids are ignored.
    pub fn on_visibility(&mut self, id: SectionId, ratio: f64) -> Option<SectionStyle> {
        self.on_intersection(
            id,
            Intersection {
                ratio,
                viewport_coverage: 0.0,
            },
        )
    }

    /// Report an intersection. Reveals when either the section ratio or
    /// its viewport coverage reaches the threshold.
    pub fn on_intersection(&mut self, id: SectionId, report: Intersection) -> Option<SectionStyle> {
        let threshold = self.threshold();
        let state = self.sections.get_mut(id)?;
        if *state == RevealState::Revealed
            || (report.ratio < threshold && report.viewport_coverage < threshold)
        {
            return None;
        }
        *state = RevealState::Revealed;
        log::debug!(
            "section {} revealed at ratio {:.2}, viewport coverage {:.2}",
            id,
            report.ratio,
            report.viewport_coverage
        );
        Some(SectionStyle {
            opacity: 1.0,
            translate_y_px: 0.0,
            transition: None,
        })
    }

    pub fn state(&self, id: SectionId) -> Option<RevealState> {
        self.sections.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn revealed_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| **s == RevealState::Revealed)
            .count()
    }
}
