use crate::extractor::{Extraction, PartialFinding, Summary};
use crate::render::edit::RenderEdit;

/// What the summary block currently shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryDisplay {
    #[default]
    Hidden,
    Provisional,
    Settled,
}

/// Bookkeeping for one response. Create a fresh value per response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderState {
    /// Completed findings already turned into finished records. Never decreases.
    pub rendered_count: usize,
    /// Whether the in-progress record currently exists.
    pub has_placeholder: bool,
    pub summary: SummaryDisplay,
    /// Fields the placeholder currently shows.
    pub shown_partial: Option<PartialFinding>,
    /// Text of the provisional summary currently shown.
    pub shown_summary: Option<String>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute the edits that bring the visible structure in line with
/// `extraction`, updating `state` as if they had been applied.
pub fn reconcile(extraction: &Extraction, state: &mut RenderState, is_final: bool) -> Vec<RenderEdit> {
    let mut edits = Vec::new();

    reconcile_summary(extraction.summary.as_ref(), state, is_final, &mut edits);

    let mut new_completed = 0;
    for finding in extraction.completed.iter().skip(state.rendered_count) {
        if state.has_placeholder && new_completed == 0 {
            edits.push(RenderEdit::PromotePlaceholder {
                finding: finding.clone(),
            });
            state.has_placeholder = false;
            state.shown_partial = None;
        } else {
            edits.push(RenderEdit::AppendFinding {
                finding: finding.clone(),
            });
        }
        state.rendered_count += 1;
        new_completed += 1;
    }

    if is_final {
        // A finding that never closed is dropped, not finalized.
        if state.has_placeholder {
            edits.push(RenderEdit::RemovePlaceholder);
            state.has_placeholder = false;
            state.shown_partial = None;
        }
    } else if new_completed == 0 {
        if let Some(partial) = &extraction.partial {
            if !state.has_placeholder {
                edits.push(RenderEdit::OpenPlaceholder);
                state.has_placeholder = true;
            }
            if state.shown_partial.as_ref() != Some(partial) {
                edits.push(RenderEdit::UpdatePlaceholder {
                    partial: partial.clone(),
                });
                state.shown_partial = Some(partial.clone());
            }
        }
    }

    edits
}

fn reconcile_summary(
    summary: Option<&Summary>,
    state: &mut RenderState,
    is_final: bool,
    edits: &mut Vec<RenderEdit>,
) {
    if state.summary == SummaryDisplay::Settled {
        return;
    }

    match summary {
        Some(Summary::Complete(text)) => {
            edits.push(RenderEdit::SetSummary {
                text: text.clone(),
                settled: true,
            });
            state.summary = SummaryDisplay::Settled;
            state.shown_summary = None;
        }
        Some(Summary::Provisional(_)) | None if is_final => {
            if state.summary == SummaryDisplay::Provisional {
                edits.push(RenderEdit::ClearSummary);
                state.summary = SummaryDisplay::Hidden;
                state.shown_summary = None;
            }
        }
        Some(Summary::Provisional(text)) => {
            if state.shown_summary.as_ref() != Some(text) {
                edits.push(RenderEdit::SetSummary {
                    text: text.clone(),
                    settled: false,
                });
                state.summary = SummaryDisplay::Provisional;
                state.shown_summary = Some(text.clone());
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{Finding, PartialFinding};

    fn finding(n: usize) -> Finding {
        Finding::new(format!("t{}", n), "c", format!("r{}", n))
    }

    fn partial(target: &str) -> PartialFinding {
        PartialFinding {
            target: target.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_appends_new_completed_findings() {
        let mut state = RenderState::new();
        let extraction = Extraction {
            completed: vec![finding(0), finding(1)],
            ..Default::default()
        };
        let edits = reconcile(&extraction, &mut state, false);
        assert_eq!(
            edits,
            vec![
                RenderEdit::AppendFinding { finding: finding(0) },
                RenderEdit::AppendFinding { finding: finding(1) },
            ]
        );
        assert_eq!(state.rendered_count, 2);

        // Same extraction again is a no-op
        assert!(reconcile(&extraction, &mut state, false).is_empty());
        assert_eq!(state.rendered_count, 2);
    }

    #[test]
    fn test_placeholder_lifecycle() {
        let mut state = RenderState::new();

        let edits = reconcile(
            &Extraction {
                partial: Some(partial("a")),
                ..Default::default()
            },
            &mut state,
            false,
        );
        assert_eq!(
            edits,
            vec![
                RenderEdit::OpenPlaceholder,
                RenderEdit::UpdatePlaceholder {
                    partial: partial("a")
                },
            ]
        );
        assert!(state.has_placeholder);

        let edits = reconcile(
            &Extraction {
                partial: Some(partial("ab")),
                ..Default::default()
            },
            &mut state,
            false,
        );
        assert_eq!(
            edits,
            vec![RenderEdit::UpdatePlaceholder {
                partial: partial("ab")
            }]
        );

        // Two findings complete at once: the first replaces the placeholder
        let edits = reconcile(
            &Extraction {
                completed: vec![finding(0), finding(1)],
                ..Default::default()
            },
            &mut state,
            false,
        );
        assert_eq!(
            edits,
            vec![
                RenderEdit::PromotePlaceholder { finding: finding(0) },
                RenderEdit::AppendFinding { finding: finding(1) },
            ]
        );
        assert!(!state.has_placeholder);
        assert_eq!(state.rendered_count, 2);
    }

    #[test]
    fn test_partial_ignored_when_new_completed_arrives() {
        let mut state = RenderState::new();
        let edits = reconcile(
            &Extraction {
                completed: vec![finding(0)],
                partial: Some(partial("next")),
                ..Default::default()
            },
            &mut state,
            false,
        );
        assert_eq!(edits, vec![RenderEdit::AppendFinding { finding: finding(0) }]);
        assert!(!state.has_placeholder);
    }

    #[test]
    fn test_final_removes_placeholder() {
        let mut state = RenderState {
            rendered_count: 0,
            has_placeholder: true,
            ..Default::default()
        };
        let edits = reconcile(
            &Extraction {
                partial: Some(partial("a")),
                ..Default::default()
            },
            &mut state,
            true,
        );
        assert_eq!(edits, vec![RenderEdit::RemovePlaceholder]);
        assert!(!state.has_placeholder);

        // Without a placeholder the final pass has nothing to remove
        assert!(reconcile(&Extraction::default(), &mut state, true).is_empty());
    }

    #[test]
    fn test_final_promotes_then_never_reopens() {
        let mut state = RenderState {
            rendered_count: 0,
            has_placeholder: true,
            ..Default::default()
        };
        let edits = reconcile(
            &Extraction {
                completed: vec![finding(0)],
                ..Default::default()
            },
            &mut state,
            true,
        );
        assert_eq!(edits, vec![RenderEdit::PromotePlaceholder { finding: finding(0) }]);
        assert!(!state.has_placeholder);
    }

    #[test]
    fn test_summary_settles_once() {
        let mut state = RenderState::new();
        let provisional = Extraction {
            summary: Some(Summary::Provisional("A qu".to_string())),
            ..Default::default()
        };
        assert_eq!(
            reconcile(&provisional, &mut state, false),
            vec![RenderEdit::SetSummary {
                text: "A qu".to_string(),
                settled: false
            }]
        );

        let complete = Extraction {
            summary: Some(Summary::Complete("A quiet street.".to_string())),
            ..Default::default()
        };
        assert_eq!(
            reconcile(&complete, &mut state, false),
            vec![RenderEdit::SetSummary {
                text: "A quiet street.".to_string(),
                settled: true
            }]
        );
        assert_eq!(state.summary, SummaryDisplay::Settled);

        assert!(reconcile(&complete, &mut state, false).is_empty());
        assert!(reconcile(&complete, &mut state, true).is_empty());
    }

    #[test]
    fn test_unclosed_summary_dropped_at_final() {
        let mut state = RenderState::new();
        let provisional = Extraction {
            summary: Some(Summary::Provisional("A qu".to_string())),
            ..Default::default()
        };
        reconcile(&provisional, &mut state, false);
        assert_eq!(
            reconcile(&provisional, &mut state, true),
            vec![RenderEdit::ClearSummary]
        );
        assert_eq!(state.summary, SummaryDisplay::Hidden);
    }

    #[test]
    fn test_unchanged_partial_emits_nothing() {
        let mut state = RenderState::new();
        let extraction = Extraction {
            partial: Some(partial("lantern")),
            ..Default::default()
        };
        assert_eq!(reconcile(&extraction, &mut state, false).len(), 2);
        // e.g. a held-back close marker growing at the buffer tail
        assert!(reconcile(&extraction, &mut state, false).is_empty());
        assert!(state.has_placeholder);

        // After a promotion the same fields belong to a new placeholder
        let promoted = Extraction {
            completed: vec![finding(0)],
            ..Default::default()
        };
        reconcile(&promoted, &mut state, false);
        let reopened = Extraction {
            completed: vec![finding(0)],
            partial: Some(partial("lantern")),
            ..Default::default()
        };
        assert_eq!(
            reconcile(&reopened, &mut state, false),
            vec![
                RenderEdit::OpenPlaceholder,
                RenderEdit::UpdatePlaceholder {
                    partial: partial("lantern")
                },
            ]
        );
    }

    #[test]
    fn test_unchanged_provisional_summary_emits_nothing() {
        let mut state = RenderState::new();
        let provisional = Extraction {
            summary: Some(Summary::Provisional("A qu".to_string())),
            ..Default::default()
        };
        assert_eq!(reconcile(&provisional, &mut state, false).len(), 1);
        assert!(reconcile(&provisional, &mut state, false).is_empty());

        let longer = Extraction {
            summary: Some(Summary::Provisional("A quiet".to_string())),
            ..Default::default()
        };
        assert_eq!(
            reconcile(&longer, &mut state, false),
            vec![RenderEdit::SetSummary {
                text: "A quiet".to_string(),
                settled: false
            }]
        );
    }

    #[test]
    fn test_vanished_partial_keeps_placeholder() {
        let mut state = RenderState::new();
        let open = Extraction {
            partial: Some(partial("a")),
            ..Default::default()
        };
        reconcile(&open, &mut state, false);

        // A closed record with no category or reasoning neither completes nor stays partial
        assert!(reconcile(&Extraction::default(), &mut state, false).is_empty());
        assert!(state.has_placeholder);
        assert_eq!(
            reconcile(&Extraction::default(), &mut state, true),
            vec![RenderEdit::RemovePlaceholder]
        );
    }
}
