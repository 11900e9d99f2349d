//! In-memory host document.
//!
//! Stand-in for the live spreadsheet used by the CLI driver and the test
//! suite. It reproduces the host's request/sync programming model: writes
//! queue into a pending set and only land in the committed grid at
//! [`SheetDocument::flush`]; reads observe committed state.
//!
//! Display evaluation is deliberately minimal - the one formula shape the
//! staging engine ever writes is `=SUM(range)`, so that is the one shape the
//! stand-in evaluates.

use std::collections::HashMap;

use sheetstage_model::{
    BorderEdge, BorderLine, CellCoord, CellStyle, CellValue, HorizontalAlign, RangeRef,
    VerticalAlign,
};
use thiserror::Error;

use super::{ClearScope, SheetDocument};

const MAX_EVAL_DEPTH: usize = 8;

#[derive(Debug, Error)]
#[error("sheet rejected {action}: {message}")]
pub struct MemSheetError {
    pub action: &'static str,
    pub message: String,
}

impl MemSheetError {
    fn new(action: &'static str, message: impl Into<String>) -> MemSheetError {
        MemSheetError {
            action,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct MemCell {
    value: CellValue,
    formula: Option<String>,
    style: CellStyle,
    note: Option<String>,
}

impl MemCell {
    fn is_blank(&self) -> bool {
        self.value.is_empty()
            && self.formula.is_none()
            && self.style.is_unset()
            && self.note.is_none()
    }
}

enum Pending {
    Values(RangeRef, Vec<Vec<CellValue>>),
    Formula(RangeRef, String),
    StylePatch(CellCoord, CellStyle),
    Clear(RangeRef, ClearScope),
    Border(RangeRef, BorderEdge, BorderLine),
    ClearBorder(RangeRef),
}

/// Sparse in-memory sheet with deferred writes.
#[derive(Default)]
pub struct MemSheet {
    /// Committed cells, keyed by (row, col), 1-based.
    cells: HashMap<(u32, u32), MemCell>,
    /// Outer borders, keyed by the unqualified range address they were set on.
    borders: HashMap<String, Vec<(BorderEdge, BorderLine)>>,
    pending: Vec<Pending>,
    flushes: usize,
}

impl MemSheet {
    pub fn new() -> MemSheet {
        MemSheet::default()
    }

    /// Number of completed flush cycles (for tests and diagnostics).
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Commit a value directly, bypassing the pending queue (host-side load).
    pub fn load_value(&mut self, cell: CellCoord, value: CellValue) {
        let entry = self.cells.entry((cell.row, cell.col)).or_default();
        entry.value = value;
        entry.formula = None;
    }

    /// Commit a formula directly, bypassing the pending queue (host-side load).
    pub fn load_formula(&mut self, cell: CellCoord, formula: &str) {
        let entry = self.cells.entry((cell.row, cell.col)).or_default();
        entry.formula = Some(formula.to_string());
        entry.value = CellValue::Empty;
    }

    /// Attach a user note to a cell (host-side; notes are never written by
    /// the staging engine, only cleared).
    pub fn set_note(&mut self, cell: CellCoord, note: &str) {
        self.cells.entry((cell.row, cell.col)).or_default().note = Some(note.to_string());
    }

    pub fn note(&self, cell: CellCoord) -> Option<&str> {
        self.cells
            .get(&(cell.row, cell.col))
            .and_then(|c| c.note.as_deref())
    }

    pub fn formula_at(&self, cell: CellCoord) -> Option<&str> {
        self.cells
            .get(&(cell.row, cell.col))
            .and_then(|c| c.formula.as_deref())
    }

    /// Committed raw value (formulas excluded).
    pub fn value_at(&self, cell: CellCoord) -> CellValue {
        self.cells
            .get(&(cell.row, cell.col))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn style_at(&self, cell: CellCoord) -> CellStyle {
        self.cells
            .get(&(cell.row, cell.col))
            .map(|c| c.style.clone())
            .unwrap_or_default()
    }

    /// Effective style with host defaults filled in. Live hosts report a
    /// concrete value for every style property; capturing those concrete
    /// values is what makes merge-based restore an exact rollback.
    pub fn effective_style(&self, cell: CellCoord) -> CellStyle {
        let mut style = host_default_style();
        style.merge(&self.style_at(cell));
        style
    }

    /// Borders currently set on exactly this range address.
    pub fn borders_at(&self, range: &RangeRef) -> &[(BorderEdge, BorderLine)] {
        self.borders
            .get(&range.unqualified().to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Committed value with `=SUM(range)` formulas evaluated.
    pub fn evaluated_value(&self, cell: CellCoord) -> CellValue {
        self.evaluated_at(cell.row, cell.col, 0)
    }

    /// Display string for a cell, evaluating formulas.
    pub fn display_value(&self, cell: CellCoord) -> String {
        match self.cells.get(&(cell.row, cell.col)) {
            Some(c) if c.formula.is_some() => self.evaluated_value(cell).to_string(),
            Some(c) => c.value.to_string(),
            None => String::new(),
        }
    }

    /// Bounding rectangle of all non-blank committed cells.
    pub fn used_range(&self) -> Option<RangeRef> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (&(row, col), cell) in &self.cells {
            if cell.is_blank() {
                continue;
            }
            bounds = Some(match bounds {
                None => (row, col, row, col),
                Some((r1, c1, r2, c2)) => (r1.min(row), c1.min(col), r2.max(row), c2.max(col)),
            });
        }
        bounds.map(|(r1, c1, r2, c2)| {
            RangeRef::new(None, CellCoord::new(c1, r1), CellCoord::new(c2, r2))
        })
    }

    fn evaluated_at(&self, row: u32, col: u32, depth: usize) -> CellValue {
        let Some(cell) = self.cells.get(&(row, col)) else {
            return CellValue::Empty;
        };
        let Some(formula) = &cell.formula else {
            return cell.value.clone();
        };
        if depth >= MAX_EVAL_DEPTH {
            return CellValue::Empty;
        }
        match parse_sum_range(formula) {
            Some(range) => {
                let mut total = 0.0;
                for target in range.cells() {
                    if let Some(n) = self
                        .evaluated_at(target.row, target.col, depth + 1)
                        .as_number()
                    {
                        total += n;
                    }
                }
                CellValue::Number(total)
            }
            // Anything else displays as its formula text.
            None => CellValue::Text(formula.clone()),
        }
    }

    fn apply(&mut self, change: Pending) {
        match change {
            Pending::Values(range, values) => {
                for (row_offset, row) in values.into_iter().enumerate() {
                    for (col_offset, value) in row.into_iter().enumerate() {
                        let target = range.cell_at(row_offset as u32, col_offset as u32);
                        let entry = self.cells.entry((target.row, target.col)).or_default();
                        entry.value = value;
                        entry.formula = None;
                    }
                }
            }
            Pending::Formula(range, formula) => {
                for target in range.cells() {
                    let entry = self.cells.entry((target.row, target.col)).or_default();
                    entry.formula = Some(formula.clone());
                    entry.value = CellValue::Empty;
                }
            }
            Pending::StylePatch(cell, patch) => {
                let entry = self.cells.entry((cell.row, cell.col)).or_default();
                entry.style.merge(&patch);
                // A style explicitly equal to the host defaults is
                // indistinguishable from an untouched cell.
                if entry.style == host_default_style() {
                    entry.style = CellStyle::default();
                }
            }
            Pending::Clear(range, scope) => {
                for target in range.cells() {
                    let Some(entry) = self.cells.get_mut(&(target.row, target.col)) else {
                        continue;
                    };
                    if scope.contents {
                        entry.value = CellValue::Empty;
                        entry.formula = None;
                    }
                    if scope.formatting {
                        entry.style = CellStyle::default();
                    }
                    if scope.notes {
                        entry.note = None;
                    }
                }
            }
            Pending::Border(range, edge, line) => {
                let entry = self
                    .borders
                    .entry(range.unqualified().to_string())
                    .or_default();
                entry.retain(|(e, _)| *e != edge);
                entry.push((edge, line));
            }
            Pending::ClearBorder(range) => {
                self.borders.remove(&range.unqualified().to_string());
            }
        }
    }
}

impl SheetDocument for MemSheet {
    type Error = MemSheetError;

    fn read_values(&mut self, range: &RangeRef) -> Result<Vec<Vec<CellValue>>, Self::Error> {
        let mut matrix = Vec::with_capacity(range.row_count() as usize);
        for row in range.start.row..=range.end.row {
            let mut out = Vec::with_capacity(range.column_count() as usize);
            for col in range.start.col..=range.end.col {
                out.push(self.value_at(CellCoord::new(col, row)));
            }
            matrix.push(out);
        }
        Ok(matrix)
    }

    fn cell_style(&mut self, cell: &CellCoord) -> Result<CellStyle, Self::Error> {
        Ok(self.effective_style(*cell))
    }

    fn set_cell_style(&mut self, cell: &CellCoord, patch: &CellStyle) -> Result<(), Self::Error> {
        self.pending.push(Pending::StylePatch(*cell, patch.clone()));
        Ok(())
    }

    fn write_values(
        &mut self,
        range: &RangeRef,
        values: &[Vec<CellValue>],
    ) -> Result<(), Self::Error> {
        if values.len() != range.row_count() as usize
            || values
                .iter()
                .any(|row| row.len() != range.column_count() as usize)
        {
            return Err(MemSheetError::new(
                "write",
                format!(
                    "value matrix does not match {} ({}x{})",
                    range,
                    range.row_count(),
                    range.column_count()
                ),
            ));
        }
        self.pending
            .push(Pending::Values(range.clone(), values.to_vec()));
        Ok(())
    }

    fn write_formula(&mut self, range: &RangeRef, formula: &str) -> Result<(), Self::Error> {
        if formula.trim().is_empty() {
            return Err(MemSheetError::new("write", "empty formula"));
        }
        self.pending
            .push(Pending::Formula(range.clone(), formula.to_string()));
        Ok(())
    }

    fn clear_region(&mut self, range: &RangeRef, scope: ClearScope) -> Result<(), Self::Error> {
        self.pending.push(Pending::Clear(range.clone(), scope));
        Ok(())
    }

    fn set_border(
        &mut self,
        range: &RangeRef,
        edge: BorderEdge,
        line: &BorderLine,
    ) -> Result<(), Self::Error> {
        self.pending
            .push(Pending::Border(range.clone(), edge, line.clone()));
        Ok(())
    }

    fn clear_border(&mut self, range: &RangeRef) -> Result<(), Self::Error> {
        self.pending.push(Pending::ClearBorder(range.clone()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        for change in std::mem::take(&mut self.pending) {
            self.apply(change);
        }
        self.cells.retain(|_, cell| !cell.is_blank());
        self.flushes += 1;
        Ok(())
    }
}

fn host_default_style() -> CellStyle {
    CellStyle {
        bold: Some(false),
        italic: Some(false),
        underline: Some(false),
        font_name: Some("Calibri".to_string()),
        font_size: Some(11.0),
        font_color: Some("#000000".to_string()),
        fill_color: Some("#FFFFFF".to_string()),
        number_format: Some("General".to_string()),
        horizontal_align: Some(HorizontalAlign::General),
        vertical_align: Some(VerticalAlign::Bottom),
        wrap_text: Some(false),
        borders: None,
    }
}

/// Recognize `=SUM(range)` (case-insensitive, optional `=`).
fn parse_sum_range(formula: &str) -> Option<RangeRef> {
    let body = formula.trim().trim_start_matches('=').trim();
    let upper = body.to_ascii_uppercase();
    let inner = upper.strip_prefix("SUM(")?.strip_suffix(')')?;
    RangeRef::parse(inner.trim()).ok()
}
