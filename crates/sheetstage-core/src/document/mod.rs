//! Access to the live sheet document.
//!
//! The host spreadsheet is an external mutable resource; everything the
//! staging engine does to it goes through [`SheetDocument`]. Implementations
//! may buffer writes until [`SheetDocument::flush`]; reads observe the last
//! flushed state.

mod mem;

pub use mem::{MemSheet, MemSheetError};

use sheetstage_model::{BorderEdge, BorderLine, CellCoord, CellStyle, CellValue, RangeRef};

/// What [`SheetDocument::clear_region`] removes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearScope {
    pub contents: bool,
    pub formatting: bool,
    pub notes: bool,
}

impl ClearScope {
    pub fn all() -> ClearScope {
        ClearScope {
            contents: true,
            formatting: true,
            notes: true,
        }
    }
}

/// Narrow capability interface to a host spreadsheet document.
pub trait SheetDocument {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the region as a row-major matrix of scalar values.
    fn read_values(&mut self, range: &RangeRef) -> Result<Vec<Vec<CellValue>>, Self::Error>;

    /// Read one cell's effective style.
    fn cell_style(&mut self, cell: &CellCoord) -> Result<CellStyle, Self::Error>;

    /// Apply a style patch to one cell; fields absent from the patch are
    /// left untouched.
    fn set_cell_style(&mut self, cell: &CellCoord, patch: &CellStyle) -> Result<(), Self::Error>;

    /// Write a matrix of values into the region. The matrix dimensions must
    /// match the region.
    fn write_values(
        &mut self,
        range: &RangeRef,
        values: &[Vec<CellValue>],
    ) -> Result<(), Self::Error>;

    /// Broadcast a single formula string to every cell of the region.
    fn write_formula(&mut self, range: &RangeRef, formula: &str) -> Result<(), Self::Error>;

    fn clear_region(&mut self, range: &RangeRef, scope: ClearScope) -> Result<(), Self::Error>;

    fn set_border(
        &mut self,
        range: &RangeRef,
        edge: BorderEdge,
        line: &BorderLine,
    ) -> Result<(), Self::Error>;

    fn clear_border(&mut self, range: &RangeRef) -> Result<(), Self::Error>;

    /// Commit all writes issued since the previous flush.
    fn flush(&mut self) -> Result<(), Self::Error>;
}
