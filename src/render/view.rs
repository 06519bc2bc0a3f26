use crate::extractor::{Finding, PartialFinding};
use crate::render::{RenderEdit, RenderSurface, SurfaceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryBlock {
    pub text: String,
    pub settled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Card {
    Completed(Finding),
    InProgress(PartialFinding),
}

impl Card {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Card::InProgress(_))
    }

    /// Category used to tag the card, if known yet.
    pub fn category(&self) -> Option<&str> {
        let category = match self {
            Card::Completed(finding) => &finding.category,
            Card::InProgress(partial) => &partial.category,
        };
        (!category.is_empty()).then_some(category.as_str())
    }
}

/// In-memory virtual list of what a user would currently see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleView {
    pub summary: Option<SummaryBlock>,
    pub cards: Vec<Card>,
    pub failure: Option<String>,
}

impl VisibleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> Vec<&Finding> {
        self.cards
            .iter()
            .filter_map(|card| match card {
                Card::Completed(finding) => Some(finding),
                Card::InProgress(_) => None,
            })
            .collect()
    }

    pub fn placeholder(&self) -> Option<&PartialFinding> {
        self.cards.iter().find_map(|card| match card {
            Card::InProgress(partial) => Some(partial),
            Card::Completed(_) => None,
        })
    }

    pub fn placeholder_count(&self) -> usize {
        self.cards.iter().filter(|card| card.is_in_progress()).count()
    }

    fn placeholder_index(&self) -> Option<usize> {
        self.cards.iter().position(Card::is_in_progress)
    }
}

impl RenderSurface for VisibleView {
    fn apply(&mut self, edit: &RenderEdit) -> Result<(), SurfaceError> {
        match edit {
            RenderEdit::SetSummary { text, settled } => {
                self.summary = Some(SummaryBlock {
                    text: text.clone(),
                    settled: *settled,
                });
            }
            RenderEdit::ClearSummary => {
                self.summary = None;
            }
            RenderEdit::AppendFinding { finding } => {
                // Finished records always sit before the in-progress one
                let card = Card::Completed(finding.clone());
                match self.placeholder_index() {
                    Some(idx) => self.cards.insert(idx, card),
                    None => self.cards.push(card),
                }
            }
            RenderEdit::OpenPlaceholder => {
                if self.placeholder_index().is_none() {
                    self.cards.push(Card::InProgress(PartialFinding::default()));
                }
            }
            RenderEdit::UpdatePlaceholder { partial } => match self.placeholder_index() {
                Some(idx) => self.cards[idx] = Card::InProgress(partial.clone()),
                None => self.cards.push(Card::InProgress(partial.clone())),
            },
            RenderEdit::PromotePlaceholder { finding } => {
                let card = Card::Completed(finding.clone());
                match self.placeholder_index() {
                    Some(idx) => self.cards[idx] = card,
                    None => self.cards.push(card),
                }
            }
            RenderEdit::RemovePlaceholder => {
                if let Some(idx) = self.placeholder_index() {
                    self.cards.remove(idx);
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, message: &str) -> Result<(), SurfaceError> {
        self.failure = Some(message.to_string());
        Ok(())
    }
}
