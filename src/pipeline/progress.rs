//! Progress state shown while a recognition runs.

use serde::Serialize;

use crate::ocr::ProgressEvent;

/// Label before the first recognition.
pub const INITIAL_LABEL: &str = "idle";
/// Label displayed while nothing has been reported yet.
pub const IDLE_LABEL: &str = "Idle";
/// Label set when a recognition starts.
pub const STARTING_LABEL: &str = "Starting...";
/// Label used when the engine reports progress without a status.
pub const PROCESSING_LABEL: &str = "Processing...";
/// Label for a completed step.
pub const DONE_LABEL: &str = "Done";

/// Fraction complete plus a human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    /// Completion in [0, 1].
    pub fraction: f64,
    pub label: String,
    /// Set while the engine is being constructed and cannot report a fraction.
    pub indeterminate: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            label: INITIAL_LABEL.to_string(),
            indeterminate: false,
        }
    }
}

impl ProgressState {
    /// State at the start of every recognition call.
    pub fn starting() -> Self {
        Self {
            fraction: 0.0,
            label: STARTING_LABEL.to_string(),
            indeterminate: false,
        }
    }

    /// Fold an engine event into this state. Returns whether anything changed.
    ///
    /// Fractions outside [0, 1] are clamped and NaN is ignored. A fraction
    /// of exactly 1 is always labelled "Done". Events without a fraction
    /// only replace the label while the engine is still starting up.
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        // "Done" is reserved for a complete fraction
        let status = event
            .status
            .as_deref()
            .filter(|s| !s.is_empty() && *s != DONE_LABEL);

        let Some(raw) = event.progress else {
            return match status {
                Some(status) if self.indeterminate => {
                    self.label = status.to_string();
                    true
                }
                _ => false,
            };
        };

        if raw.is_nan() {
            tracing::warn!("Ignoring NaN progress from OCR engine");
            return false;
        }

        let fraction = raw.clamp(0.0, 1.0);
        if fraction != raw {
            tracing::warn!("OCR engine reported out-of-range progress {}, clamped to {}", raw, fraction);
        }

        self.fraction = fraction;
        self.indeterminate = false;
        self.label = if fraction == 1.0 {
            DONE_LABEL.to_string()
        } else {
            status.unwrap_or(PROCESSING_LABEL).to_string()
        };
        true
    }

    /// Label as a progress bar should show it.
    pub fn display_label(&self) -> &str {
        if self.fraction == 0.0 && !self.indeterminate {
            IDLE_LABEL
        } else {
            &self.label
        }
    }

    /// Completion as a percentage in [0, 100].
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }

    pub fn is_done(&self) -> bool {
        self.fraction == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_processing() {
        let mut state = ProgressState::starting();
        assert!(state.apply(&ProgressEvent::fraction(0.4)));
        assert_eq!(state.fraction, 0.4);
        assert_eq!(state.label, PROCESSING_LABEL);

        assert!(state.apply(&ProgressEvent::new("", 0.5)));
        assert_eq!(state.label, PROCESSING_LABEL);

        assert!(state.apply(&ProgressEvent::new("recognizing text", 0.6)));
        assert_eq!(state.label, "recognizing text");
    }

    #[test]
    fn test_done_iff_complete() {
        let mut state = ProgressState::starting();
        for (fraction, status) in [(0.0, "a"), (0.5, "Done"), (0.999, "c"), (1.0, "d")] {
            state.apply(&ProgressEvent::new(status, fraction));
            assert_eq!(state.label == DONE_LABEL, fraction == 1.0);
        }
        assert!(state.is_done());

        let mut state = ProgressState::starting();
        state.apply(&ProgressEvent::new(DONE_LABEL, 0.5));
        assert_eq!(state.fraction, 0.5);
        assert_eq!(state.label, PROCESSING_LABEL);

        state.indeterminate = true;
        assert!(!state.apply(&ProgressEvent::status(DONE_LABEL)));
        assert_eq!(state.label, PROCESSING_LABEL);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let mut state = ProgressState::starting();
        state.apply(&ProgressEvent::new("x", 1.7));
        assert_eq!(state.fraction, 1.0);
        assert_eq!(state.label, DONE_LABEL);

        state.apply(&ProgressEvent::new("x", -0.2));
        assert_eq!(state.fraction, 0.0);
        assert_eq!(state.label, "x");

        assert!(!state.apply(&ProgressEvent::new("y", f64::NAN)));
        assert_eq!(state.label, "x");
    }

    #[test]
    fn test_status_only_events() {
        let mut state = ProgressState::starting();
        assert!(!state.apply(&ProgressEvent::status("loading")));
        assert_eq!(state.label, STARTING_LABEL);

        state.indeterminate = true;
        assert!(state.apply(&ProgressEvent::status("loading")));
        assert_eq!(state.label, "loading");
        assert_eq!(state.display_label(), "loading");
    }

    #[test]
    fn test_display_label() {
        let state = ProgressState::default();
        assert_eq!(state.display_label(), IDLE_LABEL);

        let mut state = ProgressState::starting();
        state.apply(&ProgressEvent::new("recognizing text", 0.25));
        assert_eq!(state.display_label(), "recognizing text");
        assert_eq!(state.percent(), 25.0);
    }
}
