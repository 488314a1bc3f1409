use crate::geometry::{NaturalSize, Rect, round_half_up};
use crate::registry::ItemId;

use super::packing::PackedRow;
use super::precalc::ValidItem;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedItem {
    pub id: ItemId,
    pub rect: Rect,
    pub ratio: f64,
    pub natural: Option<NaturalSize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowGeometry {
    pub top: f64,
    pub height: f64,
    pub items: Vec<PlacedItem>,
}

/// Pixel layout of every row plus the total container height.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridGeometry {
    pub width: f64,
    pub height: f64,
    pub rows: Vec<RowGeometry>,
}

impl GridGeometry {
    pub fn item_count(&self) -> usize {
        self.rows.iter().map(|row| row.items.len()).sum()
    }
}

/// Scales each packed row to fill `container_width` exactly.
///
/// Widths are rounded per item and the last item of a row absorbs the
/// rounding residual. The row height is the rounded mean of the heights
/// implied by each item's width and ratio.
pub fn compute_geometry(
    items: &[ValidItem],
    rows: &[PackedRow],
    container_width: f64,
    spacing: f64,
) -> GridGeometry {
    let mut geometry = GridGeometry {
        width: container_width,
        height: 0.0,
        rows: Vec::with_capacity(rows.len()),
    };
    let mut next_top = 0.0;

    for row in rows {
        let Some(members) = items.get(row.items.clone()) else {
            continue;
        };
        if members.is_empty() {
            continue;
        }

        let count = members.len() as f64;
        let available = container_width - spacing * (count - 1.0);

        let mut widths: Vec<f64> = members
            .iter()
            .map(|member| round_half_up(member.ratio / row.ratio_sum * available))
            .collect();
        let used: f64 = widths.iter().sum();
        if let Some(last) = widths.last_mut() {
            *last += available - used;
        }

        let implied: f64 = members
            .iter()
            .zip(&widths)
            .map(|(member, width)| width / member.ratio)
            .sum();
        let height = round_half_up(implied / count);

        let top = next_top;
        let mut left = 0.0;
        let placed = members
            .iter()
            .zip(&widths)
            .map(|(member, width)| {
                let rect = Rect::new(left, top, *width, height);
                left += width + spacing;
                PlacedItem {
                    id: member.id,
                    rect,
                    ratio: member.ratio,
                    natural: member.natural,
                }
            })
            .collect();

        if !geometry.rows.is_empty() {
            geometry.height += spacing;
        }
        geometry.height += height;
        next_top = top + height + spacing;

        geometry.rows.push(RowGeometry {
            top,
            height,
            items: placed,
        });
    }

    geometry
}
