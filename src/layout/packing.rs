use std::ops::Range;

use crate::geometry::round_half_up;

use super::precalc::ValidItem;

/// Contiguous slice of the valid items forming one row.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedRow {
    pub items: Range<usize>,
    pub ratio_sum: f64,
}

impl PackedRow {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Number of rows the ideal widths should be spread over; never below one.
pub fn target_row_count(
    ideal_width_sum: f64,
    item_count: usize,
    container_width: f64,
    spacing: f64,
) -> f64 {
    let count = round_half_up(
        (ideal_width_sum + spacing * item_count as f64) / (container_width + spacing),
    );
    // f64::max discards NaN
    count.max(1.0)
}

/// Greedy partition of `items` into rows of roughly equal ideal width.
///
/// Items are walked last to first so the final row is the fullest and any
/// slack lands in the first rows. A row break happens once an item would
/// carry the accumulated width more than half its own width past the budget
/// of the rows opened so far.
pub fn pack_rows(
    items: &[ValidItem],
    ideal_width_sum: f64,
    container_width: f64,
    spacing: f64,
) -> Vec<PackedRow> {
    if items.is_empty() {
        return Vec::new();
    }

    let row_count = target_row_count(ideal_width_sum, items.len(), container_width, spacing);
    let row_budget = ideal_width_sum / row_count;

    let mut rows: Vec<PackedRow> = Vec::new();
    let mut accumulated = 0.0;

    for (idx, item) in items.iter().enumerate().rev() {
        let overshoots = accumulated + item.ideal_width / 2.0 > row_budget * rows.len() as f64;
        if overshoots || rows.is_empty() {
            rows.push(PackedRow {
                items: idx..idx + 1,
                ratio_sum: 0.0,
            });
        }
        if let Some(row) = rows.last_mut() {
            row.items.start = idx;
            row.ratio_sum += item.ratio;
        }
        accumulated += item.ideal_width;
    }

    rows.reverse();
    rows
}
