//! Cell style model.
//!
//! A bounded, explicit subset of a cell's visual formatting. Every field is
//! optional: absence means "do not modify / unknown", never "clear to
//! default". Styles are pure values with merge semantics - applying a patch
//! only overwrites the fields the patch carries.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    General,
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

/// Captured/applied formatting of one cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub font_color: Option<String>,
    pub fill_color: Option<String>,
    pub number_format: Option<String>,
    pub horizontal_align: Option<HorizontalAlign>,
    pub vertical_align: Option<VerticalAlign>,
    pub wrap_text: Option<bool>,
    /// Host border description, passed through verbatim.
    pub borders: Option<serde_json::Value>,
}

macro_rules! merge_field {
    ($self:ident, $patch:ident, $($field:ident),+ $(,)?) => {
        $(if $patch.$field.is_some() {
            $self.$field = $patch.$field.clone();
        })+
    };
}

impl CellStyle {
    /// A patch carrying only a fill color.
    pub fn fill(color: impl Into<String>) -> CellStyle {
        CellStyle {
            fill_color: Some(color.into()),
            ..CellStyle::default()
        }
    }

    /// A patch carrying only a number format.
    pub fn format(number_format: impl Into<String>) -> CellStyle {
        CellStyle {
            number_format: Some(number_format.into()),
            ..CellStyle::default()
        }
    }

    /// True when no field is set.
    pub fn is_unset(&self) -> bool {
        *self == CellStyle::default()
    }

    /// Overwrite the fields present in `patch`, leaving the rest untouched.
    pub fn merge(&mut self, patch: &CellStyle) {
        merge_field!(
            self, patch, bold, italic, underline, font_name, font_size, font_color, fill_color,
            number_format, horizontal_align, vertical_align, wrap_text, borders,
        );
    }

    /// Copy of this style with the fill dropped (reject-path policy hook).
    pub fn without_fill(&self) -> CellStyle {
        CellStyle {
            fill_color: None,
            ..self.clone()
        }
    }

    /// Whether the number format renders fractions as percentages.
    pub fn is_percent_format(&self) -> bool {
        self.number_format
            .as_deref()
            .is_some_and(|fmt| fmt.contains('%'))
    }
}

/// One outer edge of a range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderEdge {
    Top,
    Bottom,
    Left,
    Right,
}

impl BorderEdge {
    pub const ALL: [BorderEdge; 4] = [
        BorderEdge::Top,
        BorderEdge::Bottom,
        BorderEdge::Left,
        BorderEdge::Right,
    ];
}

/// Line appearance for a border edge. Style and weight are host vocabulary
/// ("Dashed", "Continuous", "Thin", ...) passed through as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderLine {
    pub style: String,
    pub color: String,
    pub weight: String,
}

impl BorderLine {
    pub fn new(style: &str, color: &str, weight: &str) -> BorderLine {
        BorderLine {
            style: style.to_string(),
            color: color.to_string(),
            weight: weight.to_string(),
        }
    }
}
