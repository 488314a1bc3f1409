use std::fmt;

use serde::Serialize;

use crate::error::{GridError, Result};
use crate::geometry::NaturalSize;

/// Insertion identity of a registered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ItemId(pub usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resolution state as seen by the layout stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Sizable,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub natural: Option<NaturalSize>,
    pub failed: bool,
}

impl Item {
    pub fn status(&self) -> ItemStatus {
        if self.failed {
            ItemStatus::Failed
        } else if self.natural.is_some_and(|size| size.is_sizable()) {
            ItemStatus::Sizable
        } else {
            ItemStatus::Pending
        }
    }
}

/// Ordered store of every registered item and its known size state.
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: Vec<Item>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> ItemId {
        let id = ItemId(self.items.len());
        self.items.push(Item::default());
        id
    }

    pub fn mark_ready(&mut self, id: ItemId, size: NaturalSize) -> Result<()> {
        let item = self.get_mut(id)?;
        item.natural = Some(size);
        Ok(())
    }

    /// Flags the item as failed. A sizable size reported earlier wins over
    /// `fallback`.
    pub fn mark_failed(&mut self, id: ItemId, fallback: Option<NaturalSize>) -> Result<()> {
        let item = self.get_mut(id)?;
        item.failed = true;
        let sized = item.natural.is_some_and(|size| size.is_sizable());
        if let Some(size) = fallback.filter(|_| !sized) {
            item.natural = Some(size);
        }
        Ok(())
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        id.0 < self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, item)| (ItemId(idx), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn get_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.items.get_mut(id.0).ok_or(GridError::ItemNotFound(id))
    }
}
