//! Stage / accept / reject orchestration.
//!
//! At most one preview session is active at a time. Staging snapshots every
//! range an op touches before the first write lands, so `reject` can always
//! put the sheet back exactly; `accept` swaps the draft for the canonical
//! rendered projection. On any failure the session state is left intact so
//! the caller can retry the same call (both paths are idempotent per range).

use std::collections::HashMap;

use sheetstage_model::{BorderEdge, BorderLine, CellStyle, RangeRef};
use tracing::{debug, warn};

use crate::document::SheetDocument;
use crate::error::{Result, StageError};
use crate::plan::{ActionOp, OpKind, PlanResult};
use crate::render::{RenderOptions, render_projection};

use super::snapshot::{
    RangeFormatting, RangeSnapshot, capture_range_snapshot, restore_range_snapshot,
};

/// Accent used for the draft marker; also the hex the plan service's own
/// examples use.
pub const DEFAULT_ACCENT_COLOR: &str = "#4F81BD";

const DRAFT_BORDER_STYLE: &str = "Dashed";
const DRAFT_BORDER_WEIGHT: &str = "Thin";

/// Tunable preview behavior.
#[derive(Clone, Debug)]
pub struct PreviewPolicy {
    /// Draft marker border color.
    pub accent_color: String,
    /// Leave fill colors in place when rejecting (keeps highlights applied
    /// by `color` ops visible after rollback).
    pub keep_fill_on_reject: bool,
}

impl Default for PreviewPolicy {
    fn default() -> Self {
        PreviewPolicy {
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            keep_fill_on_reject: false,
        }
    }
}

struct Session {
    /// Pre-edit state per range, keyed by normalized address.
    snapshots: HashMap<String, RangeSnapshot>,
    /// Staged ranges in insertion order, no duplicates.
    touched: Vec<RangeRef>,
}

impl Session {
    fn new() -> Session {
        Session {
            snapshots: HashMap::new(),
            touched: Vec::new(),
        }
    }
}

/// Owner of the process-wide preview state.
#[derive(Default)]
pub struct PreviewManager {
    policy: PreviewPolicy,
    session: Option<Session>,
}

impl PreviewManager {
    pub fn new() -> PreviewManager {
        PreviewManager::with_policy(PreviewPolicy::default())
    }

    pub fn with_policy(policy: PreviewPolicy) -> PreviewManager {
        PreviewManager {
            policy,
            session: None,
        }
    }

    pub fn is_previewing(&self) -> bool {
        self.session.is_some()
    }

    /// Addresses currently under preview, in staging order.
    pub fn touched_ranges(&self) -> Vec<String> {
        self.session
            .as_ref()
            .map(|s| s.touched.iter().map(|r| r.to_string()).collect())
            .unwrap_or_default()
    }

    /// Apply a plan's ops to the document as a draft, snapshotting every
    /// range first. A new plan supersedes any active preview: the previous
    /// session's snapshots are discarded without restore.
    pub fn stage<D: SheetDocument>(&mut self, doc: &mut D, ops: &[ActionOp]) -> Result<()> {
        if self.session.is_some() {
            debug!("new plan supersedes active preview");
        }
        let marker = BorderLine::new(
            DRAFT_BORDER_STYLE,
            &self.policy.accent_color,
            DRAFT_BORDER_WEIGHT,
        );
        let session = self.session.insert(Session::new());

        for op in ops {
            if !op.has_required_payload() {
                warn!(id = %op.id, kind = ?op.kind, "op missing required payload, skipping");
                continue;
            }
            let range = RangeRef::parse(&op.range)?;
            let key = range.to_string();

            // Only the first write's pre-state is the rollback target.
            if !session.snapshots.contains_key(&key) {
                let snapshot = capture_range_snapshot(doc, &range)?;
                session.snapshots.insert(key, snapshot);
                session.touched.push(range.clone());
            }

            match op.kind {
                OpKind::Write => {
                    if let Some(values) = &op.values {
                        doc.write_values(&range, values)
                            .map_err(|e| StageError::document("writing draft values", e))?;
                    }
                }
                OpKind::Formula => {
                    if let Some(formula) = &op.formula {
                        doc.write_formula(&range, formula)
                            .map_err(|e| StageError::document("writing draft formula", e))?;
                    }
                }
                OpKind::Color => {
                    let Some(color) = op.color.as_deref().and_then(resolve_color) else {
                        warn!(id = %op.id, "unrecognized color, skipping op");
                        continue;
                    };
                    let patch = CellStyle::fill(color);
                    for cell in range.cells() {
                        doc.set_cell_style(&cell, &patch)
                            .map_err(|e| StageError::document("applying draft color", e))?;
                    }
                }
            }

            for edge in BorderEdge::ALL {
                doc.set_border(&range, edge, &marker)
                    .map_err(|e| StageError::document("applying draft marker", e))?;
            }
            doc.flush()
                .map_err(|e| StageError::document("syncing staged range", e))?;
            debug!(range = %range, "staged draft op");
        }
        Ok(())
    }

    /// Commit the preview: clear the draft markers, render the canonical
    /// output block, then drop the snapshots. With no active session this
    /// degrades to the direct-apply path.
    pub fn accept<D: SheetDocument>(
        &mut self,
        doc: &mut D,
        plan: &PlanResult,
        formatting: &RangeFormatting,
        options: &RenderOptions,
    ) -> Result<()> {
        if let Some(session) = &self.session {
            for range in &session.touched {
                doc.clear_border(range)
                    .map_err(|e| StageError::document("clearing draft marker", e))?;
                doc.flush()
                    .map_err(|e| StageError::document("syncing marker removal", e))?;
            }
        }

        render_projection(doc, plan, formatting, options)?;

        self.session = None;
        Ok(())
    }

    /// Render the canonical output block without ever staging a draft.
    pub fn apply_direct<D: SheetDocument>(
        &mut self,
        doc: &mut D,
        plan: &PlanResult,
        formatting: &RangeFormatting,
        options: &RenderOptions,
    ) -> Result<()> {
        render_projection(doc, plan, formatting, options)
    }

    /// Roll the preview back, restoring every touched range in insertion
    /// order. A failure part-way leaves the session (and all snapshots)
    /// intact so the same call can be retried. With no active session this
    /// is a no-op.
    pub fn reject<D: SheetDocument>(&mut self, doc: &mut D) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };

        for range in &session.touched {
            let Some(snapshot) = session.snapshots.get(&range.to_string()) else {
                continue;
            };
            doc.clear_border(range)
                .map_err(|e| StageError::document("clearing draft marker", e))?;
            restore_range_snapshot(doc, range, snapshot, self.policy.keep_fill_on_reject)?;
            doc.flush()
                .map_err(|e| StageError::document("syncing restored range", e))?;
            debug!(range = %range, "restored range from snapshot");
        }

        self.session = None;
        Ok(())
    }

}

/// Resolve a named color or `#RRGGBB` literal from a `color` op.
fn resolve_color(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit())
    {
        return Some(trimmed.to_ascii_uppercase());
    }
    let hex = match trimmed.to_ascii_lowercase().as_str() {
        "blue" => "#4472C4",
        "green" => "#70AD47",
        "red" => "#FF0000",
        "yellow" => "#FFFF00",
        "orange" => "#ED7D31",
        "gray" | "grey" => "#A6A6A6",
        "white" => "#FFFFFF",
        "black" => "#000000",
        _ => return None,
    };
    Some(hex.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ClearScope, MemSheet, MemSheetError};
    use crate::plan::ActionOp;
    use sheetstage_model::{CellCoord, CellValue};

    fn coord(addr: &str) -> CellCoord {
        RangeRef::parse(addr).unwrap().start
    }

    fn write_op(id: &str, range: &str, values: Vec<Vec<CellValue>>) -> ActionOp {
        ActionOp {
            id: id.to_string(),
            range: range.to_string(),
            kind: OpKind::Write,
            values: Some(values),
            formula: None,
            color: None,
            note: None,
        }
    }

    fn formula_op(id: &str, range: &str, formula: &str) -> ActionOp {
        ActionOp {
            id: id.to_string(),
            range: range.to_string(),
            kind: OpKind::Formula,
            values: None,
            formula: Some(formula.to_string()),
            color: None,
            note: None,
        }
    }

    fn seeded_sheet() -> MemSheet {
        let mut sheet = MemSheet::new();
        sheet.load_value(coord("A1"), CellValue::text("Shareholder"));
        sheet.load_value(coord("A2"), CellValue::text("Founders"));
        sheet.load_value(coord("B2"), CellValue::number(1_000_000.0));
        sheet
            .set_cell_style(
                &coord("A1"),
                &CellStyle {
                    bold: Some(true),
                    fill_color: Some("#DCE6F1".into()),
                    ..CellStyle::default()
                },
            )
            .unwrap();
        sheet.flush().unwrap();
        sheet
    }

    fn full_state(sheet: &mut MemSheet, range: &RangeRef) -> (Vec<Vec<CellValue>>, Vec<CellStyle>) {
        use crate::document::SheetDocument;
        let values = sheet.read_values(range).unwrap();
        let styles = range.cells().map(|c| sheet.effective_style(c)).collect();
        (values, styles)
    }

    #[test]
    fn test_stage_applies_draft_and_marker() {
        let mut sheet = seeded_sheet();
        let mut manager = PreviewManager::new();
        let ops = vec![write_op(
            "op-1",
            "A1:B1",
            vec![vec![CellValue::text("Name"), CellValue::text("Invested")]],
        )];

        manager.stage(&mut sheet, &ops).unwrap();

        assert!(manager.is_previewing());
        assert_eq!(manager.touched_ranges(), vec!["A1:B1".to_string()]);
        assert_eq!(sheet.value_at(coord("A1")), CellValue::text("Name"));
        let range = RangeRef::parse("A1:B1").unwrap();
        let borders = sheet.borders_at(&range);
        assert_eq!(borders.len(), 4);
        assert!(borders.iter().all(|(_, line)| line.style == "Dashed"));
    }

    #[test]
    fn test_stage_then_reject_restores_exact_state() {
        let mut sheet = seeded_sheet();
        let touched = RangeRef::parse("A1:B2").unwrap();
        let (values_before, styles_before) = full_state(&mut sheet, &touched);

        let mut manager = PreviewManager::new();
        let ops = vec![
            write_op(
                "op-1",
                "A1:B2",
                vec![
                    vec![CellValue::text("x"), CellValue::number(0.0)],
                    vec![CellValue::Empty, CellValue::number(42.0)],
                ],
            ),
            ActionOp {
                id: "op-2".to_string(),
                range: "A1:B2".to_string(),
                kind: OpKind::Color,
                values: None,
                formula: None,
                color: Some("yellow".to_string()),
                note: None,
            },
        ];
        manager.stage(&mut sheet, &ops).unwrap();
        assert_eq!(
            sheet.style_at(coord("A1")).fill_color.as_deref(),
            Some("#FFFF00")
        );

        manager.reject(&mut sheet).unwrap();

        assert!(!manager.is_previewing());
        let (values_after, styles_after) = full_state(&mut sheet, &touched);
        assert_eq!(values_after, values_before);
        assert_eq!(styles_after, styles_before);
        assert!(sheet.borders_at(&touched).is_empty());
    }

    #[test]
    fn test_reject_without_session_is_noop() {
        let mut sheet = seeded_sheet();
        let mut manager = PreviewManager::new();
        manager.reject(&mut sheet).unwrap();
        assert_eq!(sheet.value_at(coord("A1")), CellValue::text("Shareholder"));
        assert_eq!(sheet.flush_count(), 1); // only the seed flush
    }

    #[test]
    fn test_formula_op_broadcasts_across_target() {
        let mut sheet = MemSheet::new();
        let mut manager = PreviewManager::new();
        let ops = vec![formula_op("op-1", "C1:C3", "=SUM(A1:B1)")];

        manager.stage(&mut sheet, &ops).unwrap();

        for addr in ["C1", "C2", "C3"] {
            assert_eq!(sheet.formula_at(coord(addr)), Some("=SUM(A1:B1)"));
        }
    }

    #[test]
    fn test_malformed_op_skipped_without_touching_document() {
        let mut sheet = seeded_sheet();
        let mut manager = PreviewManager::new();
        let ops = vec![ActionOp {
            id: "op-1".to_string(),
            range: "A1".to_string(),
            kind: OpKind::Write,
            values: None,
            formula: None,
            color: None,
            note: None,
        }];

        manager.stage(&mut sheet, &ops).unwrap();

        assert!(manager.touched_ranges().is_empty());
        assert_eq!(sheet.value_at(coord("A1")), CellValue::text("Shareholder"));
    }

    #[test]
    fn test_bad_range_address_is_fatal() {
        let mut sheet = MemSheet::new();
        let mut manager = PreviewManager::new();
        let ops = vec![formula_op("op-1", "not-a-range", "=1")];
        let err = manager.stage(&mut sheet, &ops).unwrap_err();
        assert!(matches!(err, StageError::Address(_)));
    }

    #[test]
    fn test_overlapping_same_address_snapshots_once() {
        let mut sheet = seeded_sheet();
        let mut manager = PreviewManager::new();
        let ops = vec![
            write_op("op-1", "A2", vec![vec![CellValue::text("first")]]),
            write_op("op-2", "A2", vec![vec![CellValue::text("second")]]),
        ];

        manager.stage(&mut sheet, &ops).unwrap();
        assert_eq!(manager.touched_ranges(), vec!["A2".to_string()]);
        assert_eq!(sheet.value_at(coord("A2")), CellValue::text("second"));

        // Rollback target is the pre-first-write state, not "first".
        manager.reject(&mut sheet).unwrap();
        assert_eq!(sheet.value_at(coord("A2")), CellValue::text("Founders"));
    }

    #[test]
    fn test_new_stage_supersedes_previous_session() {
        let mut sheet = seeded_sheet();
        let mut manager = PreviewManager::new();
        manager
            .stage(
                &mut sheet,
                &[write_op("op-1", "A2", vec![vec![CellValue::text("draft one")]])],
            )
            .unwrap();
        manager
            .stage(
                &mut sheet,
                &[write_op("op-1", "B2", vec![vec![CellValue::number(7.0)]])],
            )
            .unwrap();

        assert_eq!(manager.touched_ranges(), vec!["B2".to_string()]);

        // Rejecting only rolls back the superseding plan's ranges.
        manager.reject(&mut sheet).unwrap();
        assert_eq!(sheet.value_at(coord("A2")), CellValue::text("draft one"));
        assert_eq!(sheet.value_at(coord("B2")), CellValue::number(1_000_000.0));
    }

    #[test]
    fn test_keep_fill_on_reject_policy() {
        let mut sheet = seeded_sheet();
        let mut manager = PreviewManager::with_policy(PreviewPolicy {
            keep_fill_on_reject: true,
            ..PreviewPolicy::default()
        });
        let ops = vec![ActionOp {
            id: "op-1".to_string(),
            range: "A2".to_string(),
            kind: OpKind::Color,
            values: None,
            formula: None,
            color: Some("green".to_string()),
            note: None,
        }];

        manager.stage(&mut sheet, &ops).unwrap();
        manager.reject(&mut sheet).unwrap();

        assert_eq!(
            sheet.style_at(coord("A2")).fill_color.as_deref(),
            Some("#70AD47")
        );
    }

    /// Document wrapper that fails every write once a fuse burns out.
    struct FlakyDoc {
        inner: MemSheet,
        writes_left: usize,
    }

    impl SheetDocument for FlakyDoc {
        type Error = MemSheetError;

        fn read_values(
            &mut self,
            range: &RangeRef,
        ) -> std::result::Result<Vec<Vec<CellValue>>, Self::Error> {
            self.inner.read_values(range)
        }

        fn cell_style(&mut self, cell: &CellCoord) -> std::result::Result<CellStyle, Self::Error> {
            self.inner.cell_style(cell)
        }

        fn set_cell_style(
            &mut self,
            cell: &CellCoord,
            patch: &CellStyle,
        ) -> std::result::Result<(), Self::Error> {
            self.inner.set_cell_style(cell, patch)
        }

        fn write_values(
            &mut self,
            range: &RangeRef,
            values: &[Vec<CellValue>],
        ) -> std::result::Result<(), Self::Error> {
            if self.writes_left == 0 {
                return Err(MemSheetError {
                    action: "write",
                    message: "host refused the write".to_string(),
                });
            }
            self.writes_left -= 1;
            self.inner.write_values(range, values)
        }

        fn write_formula(&mut self, range: &RangeRef, formula: &str) -> std::result::Result<(), Self::Error> {
            self.inner.write_formula(range, formula)
        }

        fn clear_region(&mut self, range: &RangeRef, scope: ClearScope) -> std::result::Result<(), Self::Error> {
            self.inner.clear_region(range, scope)
        }

        fn set_border(
            &mut self,
            range: &RangeRef,
            edge: BorderEdge,
            line: &BorderLine,
        ) -> std::result::Result<(), Self::Error> {
            self.inner.set_border(range, edge, line)
        }

        fn clear_border(&mut self, range: &RangeRef) -> std::result::Result<(), Self::Error> {
            self.inner.clear_border(range)
        }

        fn flush(&mut self) -> std::result::Result<(), Self::Error> {
            self.inner.flush()
        }
    }

    #[test]
    fn test_failed_reject_keeps_session_for_retry() {
        let mut doc = FlakyDoc {
            inner: seeded_sheet(),
            writes_left: 2,
        };
        let mut manager = PreviewManager::new();
        let ops = vec![
            write_op("op-1", "A1", vec![vec![CellValue::text("one")]]),
            write_op("op-2", "B2", vec![vec![CellValue::text("two")]]),
        ];
        manager.stage(&mut doc, &ops).unwrap();

        // Both staged writes burned the fuse; the first restore write fails.
        let err = manager.reject(&mut doc).unwrap_err();
        assert!(matches!(err, StageError::Document { .. }));
        assert!(manager.is_previewing());

        // Retry after the host recovers; restore completes and clears state.
        doc.writes_left = 10;
        manager.reject(&mut doc).unwrap();
        assert!(!manager.is_previewing());
        assert_eq!(doc.inner.value_at(coord("A1")), CellValue::text("Shareholder"));
        assert_eq!(doc.inner.value_at(coord("B2")), CellValue::number(1_000_000.0));
    }
}
