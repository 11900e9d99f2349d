//! sheetstage-model - spreadsheet vocabulary shared by the staging engine.

pub mod addr;
pub mod style;
pub mod value;

pub use addr::{AddressParseError, CellCoord, RangeRef, col_to_letters, letters_to_col};
pub use style::{BorderEdge, BorderLine, CellStyle, HorizontalAlign, VerticalAlign};
pub use value::CellValue;
