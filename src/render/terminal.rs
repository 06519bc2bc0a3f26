use std::io::Write;

use crate::extractor::{Finding, PartialFinding};
use crate::render::{RenderEdit, RenderSurface, SurfaceError};

const CLEAR_LINE: &str = "\r\x1b[2K";
const STATUS_WIDTH: usize = 72;

/// Renders edits to a terminal.
///
/// Finished content is printed once and never touched again. In-progress
/// content (a provisional summary or the placeholder card) lives on a single
/// status line that is rewritten in place, which needs ANSI support; without
/// it only finished content is printed.
pub struct TerminalSurface<W: Write> {
    out: W,
    ansi: bool,
    status_active: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, ansi: bool) -> Self {
        Self {
            out,
            ansi,
            status_active: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn clear_status(&mut self) -> std::io::Result<()> {
        if self.status_active {
            write!(self.out, "{}", CLEAR_LINE)?;
            self.status_active = false;
        }
        Ok(())
    }

    fn status(&mut self, line: &str) -> std::io::Result<()> {
        if !self.ansi {
            return Ok(());
        }
        write!(self.out, "{}{}", CLEAR_LINE, tail_chars(line, STATUS_WIDTH))?;
        self.status_active = true;
        self.out.flush()
    }

    fn print_card(&mut self, finding: &Finding) -> std::io::Result<()> {
        self.clear_status()?;
        writeln!(self.out, "[{}] {}", finding.category, finding.target)?;
        for line in finding.reasoning.lines() {
            writeln!(self.out, "    {}", line.trim())?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> RenderSurface for TerminalSurface<W> {
    fn apply(&mut self, edit: &RenderEdit) -> Result<(), SurfaceError> {
        match edit {
            RenderEdit::SetSummary { text, settled: true } => {
                self.clear_status()?;
                writeln!(self.out, "{}\n", text)?;
                self.out.flush()?;
            }
            RenderEdit::SetSummary {
                text,
                settled: false,
            } => {
                self.status(text)?;
            }
            RenderEdit::ClearSummary | RenderEdit::RemovePlaceholder => {
                self.clear_status()?;
                self.out.flush()?;
            }
            RenderEdit::AppendFinding { finding } | RenderEdit::PromotePlaceholder { finding } => {
                self.print_card(finding)?;
            }
            RenderEdit::OpenPlaceholder => {}
            RenderEdit::UpdatePlaceholder { partial } => {
                self.status(&placeholder_line(partial))?;
            }
        }
        Ok(())
    }

    fn fail(&mut self, message: &str) -> Result<(), SurfaceError> {
        self.clear_status()?;
        writeln!(self.out, "error: {}", message)?;
        self.out.flush()?;
        Ok(())
    }
}

fn placeholder_line(partial: &PartialFinding) -> String {
    let category = if partial.category.is_empty() {
        "…"
    } else {
        partial.category.as_str()
    };
    format!(
        "[{}] {} {}▍",
        category,
        partial.target,
        partial.reasoning.replace('\n', " ")
    )
}

/// Keep the last `max` characters so the newest text stays visible.
fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    &text[start..]
}
