//! Pre-edit capture of ranges: values plus per-cell styles.
//!
//! Two capture shapes serve two different consumers. [`RangeSnapshot`] is
//! the authoritative rollback state of a range about to be drafted over.
//! [`RangeFormatting`] is the style profile of the user's input selection,
//! later mined by the projection renderer. Capture is cell-granular because
//! a region's formatting is not guaranteed uniform per row.

use sheetstage_model::{CellStyle, CellValue, RangeRef};

use crate::document::SheetDocument;
use crate::error::{Result, StageError};

/// Captured style profile of the user's input selection.
#[derive(Clone, Debug)]
pub struct RangeFormatting {
    pub address: String,
    pub row_count: u32,
    pub column_count: u32,
    /// One style per column, read from the selection's first row.
    pub header_row_style: Vec<CellStyle>,
    /// One style per column from the second row; absent for 1-row selections.
    pub data_row_style: Option<Vec<CellStyle>>,
}

impl RangeFormatting {
    pub fn header_style(&self, column: usize) -> CellStyle {
        pick(&self.header_row_style, column)
    }

    pub fn data_style(&self, column: usize) -> CellStyle {
        match &self.data_row_style {
            Some(styles) => pick(styles, column),
            None => CellStyle::default(),
        }
    }
}

fn pick(styles: &[CellStyle], column: usize) -> CellStyle {
    styles
        .get(column)
        .or_else(|| styles.first())
        .cloned()
        .unwrap_or_default()
}

/// The authoritative pre-edit state of one range.
#[derive(Clone, Debug)]
pub struct RangeSnapshot {
    pub values: Vec<Vec<CellValue>>,
    pub formatting: Vec<Vec<CellStyle>>,
}

/// Capture the style profile of the input selection.
pub fn capture_range_formatting<D: SheetDocument>(
    doc: &mut D,
    range: &RangeRef,
) -> Result<RangeFormatting> {
    let mut header_row_style = Vec::with_capacity(range.column_count() as usize);
    for col in 0..range.column_count() {
        let cell = range.cell_at(0, col);
        header_row_style.push(
            doc.cell_style(&cell)
                .map_err(|e| StageError::document("capturing header style", e))?,
        );
    }

    let data_row_style = if range.row_count() > 1 {
        let mut styles = Vec::with_capacity(range.column_count() as usize);
        for col in 0..range.column_count() {
            let cell = range.cell_at(1, col);
            styles.push(
                doc.cell_style(&cell)
                    .map_err(|e| StageError::document("capturing data style", e))?,
            );
        }
        Some(styles)
    } else {
        None
    };

    Ok(RangeFormatting {
        address: range.to_string(),
        row_count: range.row_count(),
        column_count: range.column_count(),
        header_row_style,
        data_row_style,
    })
}

/// Capture the full pre-edit state of a range (values in one read, styles
/// cell by cell).
pub fn capture_range_snapshot<D: SheetDocument>(
    doc: &mut D,
    range: &RangeRef,
) -> Result<RangeSnapshot> {
    let values = doc
        .read_values(range)
        .map_err(|e| StageError::document("reading range values", e))?;

    let mut formatting = Vec::with_capacity(range.row_count() as usize);
    for row in 0..range.row_count() {
        let mut styles = Vec::with_capacity(range.column_count() as usize);
        for col in 0..range.column_count() {
            let cell = range.cell_at(row, col);
            styles.push(
                doc.cell_style(&cell)
                    .map_err(|e| StageError::document("reading cell style", e))?,
            );
        }
        formatting.push(styles);
    }

    Ok(RangeSnapshot { values, formatting })
}

/// Write a snapshot back: values verbatim, then the captured per-cell
/// styles. `skip_fill` leaves any current fill color in place.
pub fn restore_range_snapshot<D: SheetDocument>(
    doc: &mut D,
    range: &RangeRef,
    snapshot: &RangeSnapshot,
    skip_fill: bool,
) -> Result<()> {
    doc.write_values(range, &snapshot.values)
        .map_err(|e| StageError::document("restoring range values", e))?;

    for (row, styles) in snapshot.formatting.iter().enumerate() {
        for (col, style) in styles.iter().enumerate() {
            let patch = if skip_fill {
                style.without_fill()
            } else {
                style.clone()
            };
            if patch.is_unset() {
                continue;
            }
            let cell = range.cell_at(row as u32, col as u32);
            doc.set_cell_style(&cell, &patch)
                .map_err(|e| StageError::document("restoring cell style", e))?;
        }
    }
    Ok(())
}
