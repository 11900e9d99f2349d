//! Formatting projection renderer.
//!
//! Writes the canonical output for an accepted plan: a Round Inputs block, a
//! Calculations block, and a Cap Table with live total formulas, anchored
//! two columns right of the input selection and styled by mining the
//! selection's captured profile. Column mapping is positional (output column
//! index within its block, falling back to column 0); percent columns
//! prefer any captured percent-formatted style and otherwise force a
//! default percent format so fractions never render bare.

use sheetstage_model::{CellCoord, CellStyle, CellValue, RangeRef, col_to_letters};

use crate::document::{ClearScope, SheetDocument};
use crate::error::{Result, StageError};
use crate::plan::{Investor, PlanResult};
use crate::preview::RangeFormatting;

/// Output lands this many columns right of the selection's last column.
const OUTPUT_COLUMN_GAP: u32 = 2;
/// Widest block (the cap table) in columns.
const OUTPUT_WIDTH: u32 = 4;

const TABLE_PERCENT_FORMAT: &str = "0.0%";
const POOL_PERCENT_FORMAT: &str = "0%";

const NEW_INVESTORS: &str = "New Investors";
const OPTION_POOL: &str = "Option Pool";
/// Placeholder rows the service sometimes leaves in parsed investor lists.
const PLACEHOLDER_NAME: &str = "shareholder";

#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Extra rows cleared past the computed output height, so re-running a
    /// plan never leaves stale cells from a previous, longer rendering.
    pub clear_row_buffer: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            clear_row_buffer: 5,
        }
    }
}

/// Render the full output block. Fatal only when the formatting profile's
/// address cannot anchor the layout; missing calculated values degrade to
/// blank cells.
pub fn render_projection<D: SheetDocument>(
    doc: &mut D,
    plan: &PlanResult,
    formatting: &RangeFormatting,
    options: &RenderOptions,
) -> Result<()> {
    let input = RangeRef::parse(&formatting.address).map_err(|_| StageError::RenderLayout {
        addr: formatting.address.clone(),
    })?;
    let sheet = input.sheet.clone();
    let anchor_col = input.end.col + OUTPUT_COLUMN_GAP;
    let anchor_row = input.start.row;

    let cv = &plan.calculated_values;
    let investors: Vec<&Investor> = cv
        .parsed_investors
        .iter()
        .filter(|inv| {
            let name = inv.name.trim();
            !name.is_empty() && !name.eq_ignore_ascii_case(PLACEHOLDER_NAME)
        })
        .collect();

    // Round Inputs (5) + gap + Calculations (3) + gap + table header +
    // investor rows + New Investors + Option Pool + Total.
    let output_rows = 5 + 1 + 3 + 1 + 1 + investors.len() as u32 + 2 + 1;

    let clear = RangeRef::new(
        sheet.clone(),
        CellCoord::new(anchor_col, anchor_row),
        CellCoord::new(
            anchor_col + OUTPUT_WIDTH - 1,
            anchor_row + output_rows + options.clear_row_buffer - 1,
        ),
    );
    doc.clear_region(&clear, ClearScope::all())
        .map_err(|e| StageError::document("clearing output region", e))?;
    doc.flush()
        .map_err(|e| StageError::document("syncing output clear", e))?;

    let at = |row: u32, col_offset: u32| {
        RangeRef::new(
            sheet.clone(),
            CellCoord::new(anchor_col + col_offset, row),
            CellCoord::new(anchor_col + col_offset, row),
        )
    };

    let mut row = anchor_row;

    // Round Inputs block.
    write_cell(doc, &at(row, 0), CellValue::text("Round Inputs"), &formatting.header_style(0))?;
    row += 1;
    let label_style = formatting.data_style(0);
    let value_style = formatting.data_style(1);
    let inputs = [
        ("Round Type", text_or_blank(plan.slots.round_type.as_deref())),
        ("Amount ($M)", millions(plan.slots.amount)),
        ("Pre-Money ($M)", millions(plan.slots.pre_money)),
    ];
    for (label, value) in inputs {
        write_cell(doc, &at(row, 0), CellValue::text(label), &label_style)?;
        write_cell(doc, &at(row, 1), value, &value_style)?;
        row += 1;
    }
    write_cell(doc, &at(row, 0), CellValue::text("Pool Pct (%)"), &label_style)?;
    write_cell(
        doc,
        &at(row, 1),
        number_or_blank(plan.slots.pool_pct.map(|p| p / 100.0)),
        &percent_style(formatting, 1, POOL_PERCENT_FORMAT),
    )?;
    row += 2;

    // Calculations block.
    write_cell(doc, &at(row, 0), CellValue::text("Calculations"), &formatting.header_style(0))?;
    row += 1;
    write_cell(doc, &at(row, 0), CellValue::text("Post-Money ($M)"), &label_style)?;
    write_cell(doc, &at(row, 1), millions(cv.post_money_valuation), &value_style)?;
    row += 1;
    write_cell(doc, &at(row, 0), CellValue::text("Price per Share"), &label_style)?;
    write_cell(doc, &at(row, 1), number_or_blank(cv.price_per_share), &value_style)?;
    row += 2;

    // Cap Table block.
    let headers = ["Shareholder", "Investment ($)", "Shares", "% Ownership"];
    for (col, header) in headers.iter().enumerate() {
        write_cell(
            doc,
            &at(row, col as u32),
            CellValue::text(*header),
            &formatting.header_style(col),
        )?;
    }
    row += 1;

    let pct_style = percent_style(formatting, 3, TABLE_PERCENT_FORMAT);
    let first_data_row = row;
    for inv in &investors {
        write_table_row(
            doc,
            &at,
            row,
            &inv.name,
            number_or_blank(inv.investment),
            number_or_blank(cv.final_share_counts.get(&inv.name).copied()),
            number_or_blank(cv.final_ownership_pct.get(&inv.name).copied()),
            formatting,
            &pct_style,
        )?;
        row += 1;
    }
    write_table_row(
        doc,
        &at,
        row,
        NEW_INVESTORS,
        number_or_blank(plan.slots.amount),
        number_or_blank(cv.final_share_counts.get(NEW_INVESTORS).copied()),
        number_or_blank(cv.final_ownership_pct.get(NEW_INVESTORS).copied()),
        formatting,
        &pct_style,
    )?;
    row += 1;
    write_table_row(
        doc,
        &at,
        row,
        OPTION_POOL,
        CellValue::Empty,
        number_or_blank(cv.final_share_counts.get(OPTION_POOL).copied()),
        number_or_blank(cv.final_ownership_pct.get(OPTION_POOL).copied()),
        formatting,
        &pct_style,
    )?;
    row += 1;
    let last_data_row = row - 1;

    // Total row: live sums over the data rows so the sheet stays
    // self-consistent if a row is edited afterwards.
    write_cell(doc, &at(row, 0), CellValue::text("Total"), &formatting.data_style(0))?;
    for col in 1..OUTPUT_WIDTH {
        let letters = col_to_letters(anchor_col + col);
        let formula = format!("=SUM({letters}{first_data_row}:{letters}{last_data_row})");
        let target = at(row, col);
        doc.write_formula(&target, &formula)
            .map_err(|e| StageError::document("writing total formula", e))?;
        let style = if col == 3 {
            pct_style.clone()
        } else {
            formatting.data_style(col as usize)
        };
        apply_style(doc, &target, &style)?;
    }

    doc.flush()
        .map_err(|e| StageError::document("syncing rendered output", e))?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_table_row<D: SheetDocument>(
    doc: &mut D,
    at: &impl Fn(u32, u32) -> RangeRef,
    row: u32,
    name: &str,
    investment: CellValue,
    shares: CellValue,
    pct: CellValue,
    formatting: &RangeFormatting,
    pct_style: &CellStyle,
) -> Result<()> {
    write_cell(doc, &at(row, 0), CellValue::text(name), &formatting.data_style(0))?;
    write_cell(doc, &at(row, 1), investment, &formatting.data_style(1))?;
    write_cell(doc, &at(row, 2), shares, &formatting.data_style(2))?;
    write_cell(doc, &at(row, 3), pct, pct_style)?;
    Ok(())
}

fn write_cell<D: SheetDocument>(
    doc: &mut D,
    target: &RangeRef,
    value: CellValue,
    style: &CellStyle,
) -> Result<()> {
    doc.write_values(target, &[vec![value]])
        .map_err(|e| StageError::document("writing output cell", e))?;
    apply_style(doc, target, style)
}

fn apply_style<D: SheetDocument>(doc: &mut D, target: &RangeRef, style: &CellStyle) -> Result<()> {
    if style.is_unset() {
        return Ok(());
    }
    doc.set_cell_style(&target.start, style)
        .map_err(|e| StageError::document("styling output cell", e))?;
    Ok(())
}

/// Style for a percent-bearing output column: prefer any captured
/// percent-formatted data style, otherwise force `default_format` onto the
/// positional style.
fn percent_style(formatting: &RangeFormatting, column: usize, default_format: &str) -> CellStyle {
    if let Some(styles) = &formatting.data_row_style {
        if let Some(found) = styles.iter().find(|s| s.is_percent_format()) {
            return found.clone();
        }
    }
    let mut style = formatting.data_style(column);
    style.number_format = Some(default_format.to_string());
    style
}

fn millions(value: Option<f64>) -> CellValue {
    number_or_blank(value.map(|v| v / 1_000_000.0))
}

fn number_or_blank(value: Option<f64>) -> CellValue {
    value.map(CellValue::Number).unwrap_or(CellValue::Empty)
}

fn text_or_blank(value: Option<&str>) -> CellValue {
    value
        .map(CellValue::text)
        .unwrap_or(CellValue::Empty)
}
