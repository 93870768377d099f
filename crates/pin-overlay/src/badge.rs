//! Reservation order lookup, stacking values and label badge restoration

use crate::style::{self, LabelTemplate};
use crate::{Pin, PositionKey};
use std::collections::HashMap;

/// Stacking value of markers without a reservation order
pub const BASE_MARKER_Z_INDEX: i32 = 1;

/// Ordered markers stack in `(BASE_MARKER_Z_INDEX, ORDERED_MARKER_Z_CEILING]`
const ORDERED_MARKER_Z_CEILING: i32 = 1000;

/// Labels sit above every non-elevated marker
pub const LABEL_Z_INDEX: i32 = 1500;

/// Hitboxes sit above labels so they receive clicks
pub const HITBOX_Z_INDEX: i32 = 1600;

/// Stacking value of the cluster glyph layer
pub const CLUSTER_Z_INDEX: i32 = 2000;

/// Selected and cluster-excluded markers render above everything else
pub const ELEVATED_Z_INDEX: i32 = 10_000;

/// Externally computed visit priorities, keyed by pin id or by position key string
///
/// Lookups try the pin id first and fall back to the position key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationOrder {
    entries: HashMap<String, u32>,
}

impl ReservationOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, priority: u32) {
        self.entries.insert(key.into(), priority);
    }

    pub fn remove(&mut self, key: &str) -> Option<u32> {
        self.entries.remove(key)
    }

    pub fn lookup(&self, pin_id: &str, position_key: &PositionKey) -> Option<u32> {
        self.entries
            .get(pin_id)
            .or_else(|| self.entries.get(&position_key.to_string()))
            .copied()
    }

    /// Lookup for a pin with the given key precision
    pub fn for_pin(&self, pin: &Pin, precision: u32) -> Option<u32> {
        self.lookup(&pin.id, &pin.position_key(precision))
    }

    /// Largest priority in the map, used by hosts to hand out the next slot
    pub fn max_priority(&self) -> Option<u32> {
        self.entries.values().copied().max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, u32)> for ReservationOrder {
    fn from_iter<T: IntoIterator<Item = (K, u32)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Stacking value for a marker
///
/// Priority 1 is the topmost ordered marker; larger priorities render below smaller ones.
/// Elevated markers (selected, or excluded from clustering) override any order.
pub fn marker_z_index(priority: Option<u32>, elevated: bool) -> i32 {
    if elevated {
        return ELEVATED_Z_INDEX;
    }
    match priority {
        Some(p) => {
            let p = p.clamp(1, (ORDERED_MARKER_Z_CEILING - BASE_MARKER_Z_INDEX - 1) as u32);
            ORDERED_MARKER_Z_CEILING - p as i32 + 1
        }
        None => BASE_MARKER_Z_INDEX,
    }
}

/// Label content rebuilt from the stored raw text and the current badge
///
/// Never derived from what a node currently renders, so a badge left over from a previous
/// pin or mode cannot bleed into the new content.
pub(crate) fn restored_label(raw_text: &str, badge: Option<u32>, gap_px: f32) -> LabelTemplate {
    style::label_template(raw_text, badge, gap_px)
}
