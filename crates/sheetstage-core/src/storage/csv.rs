//! CSV import/export for [`MemSheet`].
//!
//! Values only; styles and borders have no CSV representation. Export uses
//! evaluated display values, so total formulas land as their computed sums.

use std::io;
use std::io::Write;
use std::path::Path;

use sheetstage_model::{CellCoord, CellValue, RangeRef};

use crate::document::MemSheet;

/// Load a CSV file into a fresh sheet, anchored at A1.
pub fn load_csv(path: &Path) -> io::Result<MemSheet> {
    let content = std::fs::read_to_string(path)?;
    let mut sheet = MemSheet::new();

    for (row_idx, line) in content.lines().enumerate() {
        for (col_idx, field) in parse_csv_line(line).into_iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            let cell = CellCoord::new(col_idx as u32 + 1, row_idx as u32 + 1);
            if field.starts_with('=') {
                sheet.load_formula(cell, &field);
            } else if has_leading_zeros(&field) {
                // Preserve identifiers like "007" as text.
                sheet.load_value(cell, CellValue::text(field));
            } else {
                sheet.load_value(cell, CellValue::from_input(&field));
            }
        }
    }

    Ok(sheet)
}

fn has_leading_zeros(field: &str) -> bool {
    field.starts_with('0')
        && field.len() > 1
        && !field.starts_with("0.")
        && field.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
}

/// Parse a single CSV line, handling quoted fields.
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    if field_was_quoted {
                        fields.push(current.clone());
                    } else {
                        fields.push(current.trim().to_string());
                    }
                    current = String::new();
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    if field_was_quoted {
        fields.push(current);
    } else {
        fields.push(current.trim().to_string());
    }
    fields
}

/// Render a sheet (or a sub-range of it) as CSV text using evaluated
/// display values.
pub fn csv_string(sheet: &MemSheet, range: Option<&RangeRef>) -> String {
    let bounds = match range {
        Some(r) => Some(r.clone()),
        None => sheet.used_range(),
    };
    let Some(bounds) = bounds else {
        return String::new();
    };

    let mut out = String::new();
    for row in bounds.start.row..=bounds.end.row {
        let mut row_fields = Vec::new();
        for col in bounds.start.col..=bounds.end.col {
            let value = sheet.display_value(CellCoord::new(col, row));
            row_fields.push(escape_csv_field(&value));
        }
        out.push_str(&row_fields.join(","));
        out.push('\n');
    }
    out
}

/// Export a sheet (or a sub-range of it) to a CSV file.
pub fn write_csv(path: &Path, sheet: &MemSheet, range: Option<&RangeRef>) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(csv_string(sheet, range).as_bytes())?;
    Ok(())
}

/// Escape a field for CSV output.
fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '+' | '-' | '@')) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "sheetstage_{}_{}_{}_{:?}.csv",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            std::thread::current().id(),
        ))
    }

    struct Cleanup(std::path::PathBuf);
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_parse_csv_line_simple() {
        assert_eq!(parse_csv_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_csv_line_quoted() {
        assert_eq!(
            parse_csv_line(r#"a,"hello, world",c"#),
            vec!["a", "hello, world", "c"]
        );
    }

    #[test]
    fn test_parse_csv_line_escaped_quotes() {
        assert_eq!(
            parse_csv_line(r#"a,"say ""hello""",c"#),
            vec!["a", r#"say "hello""#, "c"]
        );
    }

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("simple"), "simple");
        assert_eq!(escape_csv_field("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv_field("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv_field("=SUM(A1:A2)"), "'=SUM(A1:A2)");
    }

    #[test]
    fn test_load_round_trip() {
        let path = temp_path("round_trip");
        let _cleanup = Cleanup(path.clone());
        std::fs::write(&path, "Shareholder,Shares\nFounders,1000000\n").unwrap();

        let sheet = load_csv(&path).unwrap();
        assert_eq!(
            sheet.value_at(CellCoord::new(1, 1)),
            CellValue::text("Shareholder")
        );
        assert_eq!(
            sheet.value_at(CellCoord::new(2, 2)),
            CellValue::number(1_000_000.0)
        );

        let out = temp_path("round_trip_out");
        let _cleanup_out = Cleanup(out.clone());
        write_csv(&out, &sheet, None).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, "Shareholder,Shares\nFounders,1000000\n");
    }

    #[test]
    fn test_load_csv_reads_formulas() {
        let path = temp_path("formulas");
        let _cleanup = Cleanup(path.clone());
        std::fs::write(&path, "1\n2\n=SUM(A1:A2)\n").unwrap();

        let sheet = load_csv(&path).unwrap();
        let total = CellCoord::new(1, 3);
        assert_eq!(sheet.formula_at(total), Some("=SUM(A1:A2)"));
        assert_eq!(sheet.evaluated_value(total), CellValue::Number(3.0));
    }

    #[test]
    fn test_load_preserves_leading_zero_text() {
        let path = temp_path("zeros");
        let _cleanup = Cleanup(path.clone());
        std::fs::write(&path, "007,0.5,0\n").unwrap();

        let sheet = load_csv(&path).unwrap();
        assert_eq!(sheet.value_at(CellCoord::new(1, 1)), CellValue::text("007"));
        assert_eq!(sheet.value_at(CellCoord::new(2, 1)), CellValue::number(0.5));
        assert_eq!(sheet.value_at(CellCoord::new(3, 1)), CellValue::number(0.0));
    }

    #[test]
    fn test_export_uses_evaluated_values() {
        let path = temp_path("eval");
        let _cleanup = Cleanup(path.clone());

        let mut sheet = MemSheet::new();
        sheet.load_value(CellCoord::new(1, 1), CellValue::number(1.0));
        sheet.load_value(CellCoord::new(1, 2), CellValue::number(2.0));
        sheet.load_formula(CellCoord::new(1, 3), "=SUM(A1:A2)");

        write_csv(&path, &sheet, None).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "1\n2\n3\n");
    }

    #[test]
    fn test_export_range_limits_output() {
        let path = temp_path("range");
        let _cleanup = Cleanup(path.clone());

        let mut sheet = MemSheet::new();
        for row in 1..=5 {
            sheet.load_value(CellCoord::new(1, row), CellValue::number(row as f64));
        }

        let range = RangeRef::parse("A2:A4").unwrap();
        write_csv(&path, &sheet, Some(&range)).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "2\n3\n4\n");
    }
}
