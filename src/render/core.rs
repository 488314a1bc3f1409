use std::io::Write;

use blake3::Hash;
use serde::Serialize;

use crate::error::Result;
use crate::geometry::Rect;
use crate::layout::{GridGeometry, ValidItemSet};
use crate::registry::ItemId;

const FULL_FONT_SCALE: f64 = 100.0;

/// Absolute placement of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPlacement {
    pub id: ItemId,
    pub rect: Rect,
    /// Font size in percent of the inherited size.
    pub font_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFrame {
    pub top: f64,
    pub height: f64,
    pub items: Vec<ItemPlacement>,
}

/// Everything a renderer needs to apply one layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridFrame {
    pub width: f64,
    pub height: f64,
    pub rows: Vec<RowFrame>,
    pub hidden: Vec<ItemId>,
    pub pending: Vec<ItemId>,
}

impl GridFrame {
    pub fn placements(&self) -> impl Iterator<Item = &ItemPlacement> {
        self.rows.iter().flat_map(|row| row.items.iter())
    }

    pub fn placement(&self, id: ItemId) -> Option<&ItemPlacement> {
        self.placements().find(|placement| placement.id == id)
    }

    pub fn item_count(&self) -> usize {
        self.rows.iter().map(|row| row.items.len()).sum()
    }

    /// Content hash over every value a renderer would apply.
    pub fn fingerprint(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        for row in &self.rows {
            hasher.update(b"row");
            hasher.update(&row.top.to_le_bytes());
            hasher.update(&row.height.to_le_bytes());
            for item in &row.items {
                hasher.update(&(item.id.0 as u64).to_le_bytes());
                for value in [
                    item.rect.x,
                    item.rect.y,
                    item.rect.width,
                    item.rect.height,
                    item.font_scale,
                ] {
                    hasher.update(&value.to_le_bytes());
                }
            }
        }
        hasher.update(b"hidden");
        for id in &self.hidden {
            hasher.update(&(id.0 as u64).to_le_bytes());
        }
        hasher.update(b"pending");
        for id in &self.pending {
            hasher.update(&(id.0 as u64).to_le_bytes());
        }
        hasher.finalize()
    }
}

/// Combines geometry with visibility and font scaling into a frame.
pub fn build_frame(
    geometry: &GridGeometry,
    set: &ValidItemSet,
    auto_font_size: bool,
) -> GridFrame {
    let rows = geometry
        .rows
        .iter()
        .map(|row| RowFrame {
            top: row.top,
            height: row.height,
            items: row
                .items
                .iter()
                .map(|item| {
                    let font_scale = match item.natural {
                        Some(natural) if auto_font_size => {
                            item.rect.width * FULL_FONT_SCALE / natural.width
                        }
                        _ => FULL_FONT_SCALE,
                    };
                    ItemPlacement {
                        id: item.id,
                        rect: item.rect,
                        font_scale,
                    }
                })
                .collect(),
        })
        .collect();

    GridFrame {
        width: geometry.width,
        height: geometry.height,
        rows,
        hidden: set.hidden.clone(),
        pending: set.pending.clone(),
    }
}

/// Rendering collaborator that applies frames to the real surface.
pub trait GridRenderer {
    fn apply(&mut self, frame: &GridFrame) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl GridRenderer for NullRenderer {
    fn apply(&mut self, _frame: &GridFrame) -> Result<()> {
        Ok(())
    }
}

/// Writes one absolute-position style declaration per item.
pub struct StyleRenderer<W: Write> {
    writer: W,
}

impl<W: Write> StyleRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> GridRenderer for StyleRenderer<W> {
    fn apply(&mut self, frame: &GridFrame) -> Result<()> {
        for item in frame.placements() {
            let Rect {
                x,
                y,
                width,
                height,
            } = item.rect;
            writeln!(
                self.writer,
                "{} position: absolute; width: {}px; height: {}px; left: {}px; top: {}px; font-size: {}%;",
                item.id, width, height, x, y, item.font_scale
            )?;
        }
        for id in &frame.hidden {
            writeln!(self.writer, "{} display: none;", id)?;
        }
        for id in &frame.pending {
            writeln!(self.writer, "{} visibility: hidden;", id)?;
        }
        writeln!(self.writer, "container height: {}px;", frame.height)?;
        self.writer.flush()?;
        Ok(())
    }
}
