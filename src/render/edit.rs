use serde::{Deserialize, Serialize};

use crate::extractor::{Finding, PartialFinding};

/// One structural change to the visible structure.
///
/// Serialized with an `op` tag so thin clients can replay edits received
/// over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderEdit {
    /// Set the summary text. Once `settled` is true it never changes again.
    SetSummary { text: String, settled: bool },
    /// Drop a summary that never closed.
    ClearSummary,
    /// Append a finished record after the last finished record.
    AppendFinding { finding: Finding },
    /// Create the in-progress record at the end of the list.
    OpenPlaceholder,
    /// Overwrite the fields shown by the in-progress record.
    UpdatePlaceholder { partial: PartialFinding },
    /// Turn the in-progress record into a finished one at the same position.
    PromotePlaceholder { finding: Finding },
    /// Remove the in-progress record.
    RemovePlaceholder,
}
