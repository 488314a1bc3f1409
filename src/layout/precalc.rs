use crate::geometry::NaturalSize;
use crate::registry::{ItemId, ItemRegistry, ItemStatus};

/// Aspect ratio used for failed items that are shown but never reported a size.
pub const PLACEHOLDER_RATIO: f64 = 1.0;

/// Options that change the valid-item set or ideal widths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecalcKey {
    pub desired_row_height: f64,
    pub hide_on_missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidItem {
    pub id: ItemId,
    pub ratio: f64,
    pub ideal_width: f64,
    /// `None` for placeholder items.
    pub natural: Option<NaturalSize>,
}

/// Output of the precalculation stage, in registry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidItemSet {
    pub items: Vec<ValidItem>,
    pub ideal_width_sum: f64,
    /// Failed items suppressed by `hide_on_missing`.
    pub hidden: Vec<ItemId>,
    /// Items still waiting for a size.
    pub pending: Vec<ItemId>,
}

pub fn compute_valid_items(registry: &ItemRegistry, key: PrecalcKey) -> ValidItemSet {
    let mut set = ValidItemSet::default();

    for (id, item) in registry.iter() {
        let sized = item.natural.filter(NaturalSize::is_sizable);
        let (ratio, natural) = match (item.status(), sized) {
            (ItemStatus::Failed, _) if key.hide_on_missing => {
                set.hidden.push(id);
                continue;
            }
            (ItemStatus::Failed, None) => (PLACEHOLDER_RATIO, None),
            (ItemStatus::Pending, _) | (ItemStatus::Sizable, None) => {
                set.pending.push(id);
                continue;
            }
            (_, Some(size)) => (size.ratio(), Some(size)),
        };

        let ideal_width = key.desired_row_height * ratio;
        set.ideal_width_sum += ideal_width;
        set.items.push(ValidItem {
            id,
            ratio,
            ideal_width,
            natural,
        });
    }

    set
}

/// Memoizes the valid-item set against the options it was computed with.
#[derive(Debug, Default)]
pub struct PrecalcCache {
    key: Option<PrecalcKey>,
    set: ValidItemSet,
}

impl PrecalcCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the cached set stale; the next refresh rescans whatever the key.
    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Recomputes when the cache was invalidated or the key differs from the
    /// cached one. Returns whether a rescan happened.
    pub fn refresh(&mut self, registry: &ItemRegistry, key: PrecalcKey) -> bool {
        if self.key == Some(key) {
            return false;
        }
        self.set = compute_valid_items(registry, key);
        self.key = Some(key);
        true
    }

    pub fn set(&self) -> &ValidItemSet {
        &self.set
    }

    pub fn key(&self) -> Option<PrecalcKey> {
        self.key
    }
}
