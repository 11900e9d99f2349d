//! A1-notation address parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet column letters and
//! 1-based column indices, and parsing of range addresses (optionally
//! sheet-qualified) into rectangles.
//!
//! # Examples
//!
//! ```ignore
//! let range = RangeRef::parse("Sheet1!B2:D10").unwrap();
//! assert_eq!(range.start.col, 2);
//! assert_eq!(range.end.row, 10);
//! assert_eq!(range.to_string(), "Sheet1!B2:D10");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Returned when a string does not describe a cell or rectangle in A1 notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid range address '{addr}'")]
pub struct AddressParseError {
    pub addr: String,
}

/// Decode column letters to a 1-based column index (A=1, Z=26, AA=27).
/// Returns None on empty input or overflow.
pub fn letters_to_col(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut acc = 0u32;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as u32 + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc)
}

/// Encode a 1-based column index as letters (1 -> A, 26 -> Z, 27 -> AA).
pub fn col_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col as u64;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// One cell position, 1-based in both dimensions.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub fn new(col: u32, row: u32) -> CellCoord {
        CellCoord { row, col }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row)
    }
}

/// A rectangular region of a sheet, optionally sheet-qualified.
///
/// Invariant: `start.col <= end.col` and `start.row <= end.row`; a single
/// cell is a 1x1 rectangle. Reversed input corners are normalized on parse.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub start: CellCoord,
    pub end: CellCoord,
}

impl RangeRef {
    pub fn new(sheet: Option<String>, start: CellCoord, end: CellCoord) -> RangeRef {
        let (c1, c2) = (start.col.min(end.col), start.col.max(end.col));
        let (r1, r2) = (start.row.min(end.row), start.row.max(end.row));
        RangeRef {
            sheet,
            start: CellCoord::new(c1, r1),
            end: CellCoord::new(c2, r2),
        }
    }

    pub fn single(cell: CellCoord) -> RangeRef {
        RangeRef::new(None, cell, cell)
    }

    /// Parse an address like `"B2"`, `"B2:D10"` or `"Sheet1!B2:D10"`.
    pub fn parse(addr: &str) -> Result<RangeRef, AddressParseError> {
        let re = Regex::new(
            r"^(?:(?:'(?<quoted>[^']+)'|(?<sheet>[A-Za-z0-9_ .\-]+))!)?(?<l1>[A-Za-z]{1,3})(?<n1>[0-9]+)(?::(?<l2>[A-Za-z]{1,3})(?<n2>[0-9]+))?$",
        )
        .unwrap();
        let err = || AddressParseError {
            addr: addr.to_string(),
        };
        let caps = re.captures(addr.trim()).ok_or_else(err)?;

        let sheet = caps
            .name("quoted")
            .or_else(|| caps.name("sheet"))
            .map(|m| m.as_str().to_string());

        let start_col = letters_to_col(&caps["l1"]).ok_or_else(err)?;
        let start_row = caps["n1"].parse::<u32>().ok().filter(|r| *r > 0).ok_or_else(err)?;
        let (end_col, end_row) = match (caps.name("l2"), caps.name("n2")) {
            (Some(l2), Some(n2)) => (
                letters_to_col(l2.as_str()).ok_or_else(err)?,
                n2.as_str().parse::<u32>().ok().filter(|r| *r > 0).ok_or_else(err)?,
            ),
            _ => (start_col, start_row),
        };

        Ok(RangeRef::new(
            sheet,
            CellCoord::new(start_col, start_row),
            CellCoord::new(end_col, end_row),
        ))
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn column_count(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// Cell at a zero-based (row, column) offset into the rectangle.
    /// Offsets are not bounds-checked; callers may address past the end.
    pub fn cell_at(&self, row_offset: u32, col_offset: u32) -> CellCoord {
        CellCoord::new(self.start.col + col_offset, self.start.row + row_offset)
    }

    /// Iterate every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellCoord::new(col, row)))
    }

    /// Drop the sheet qualifier, keeping the rectangle.
    pub fn unqualified(&self) -> RangeRef {
        RangeRef {
            sheet: None,
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            if sheet.contains(' ') {
                write!(f, "'{}'!", sheet)?;
            } else {
                write!(f, "{}!", sheet)?;
            }
        }
        write!(f, "{}", self.start)?;
        if !self.is_single_cell() {
            write!(f, ":{}", self.end)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for RangeRef {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeRef::parse(s)
    }
}
