//! Engine configuration

use crate::{OverlayError, PinKind, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the overlay engine
///
/// Levels follow the map-level convention (larger = farther). Labels are shown up to
/// [`Config::safe_label_max`], clustering starts at `cluster_min_level`, and the levels in
/// between are a transitional band with bare icons and no clustering.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Farthest level at which labels are shown
    pub label_max_level: i32,
    /// Nearest level at which markers are clustered
    pub cluster_min_level: i32,
    /// Vertical gap between the icon top and its label, in pixels
    pub label_gap_px: f32,
    /// Side of the square hitbox click target, in pixels
    pub hitbox_size_px: f32,
    /// Kind used for pins without one
    pub default_kind: PinKind,
    /// Decimal places kept when rounding coordinates into a position key
    pub position_key_precision: u32,
    /// Pins closer than this share one visible label
    pub label_dedup_distance_m: f64,
    /// Suffix of the synthesized label for draft and plan pins
    pub plan_label_suffix: String,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Default for Config {
    fn default() -> Self {
        Self {
            label_max_level: 4,
            cluster_min_level: 6,
            label_gap_px: 4.0,
            hitbox_size_px: 44.0,
            default_kind: PinKind::Apartment,
            position_key_precision: 5,
            label_dedup_distance_m: 20.0,
            plan_label_suffix: "답사예정".to_string(),
        }
    }
}

impl Config {
    /// Label ceiling clamped strictly below the cluster threshold
    #[inline]
    pub fn safe_label_max(&self) -> i32 {
        self.label_max_level
            .min(self.cluster_min_level.saturating_sub(1))
    }

    /// Check the numeric fields
    ///
    /// Level misconfiguration (`label_max_level >= cluster_min_level`) is not an error, it is
    /// resolved by [`Config::safe_label_max`].
    pub fn validate(&self) -> Result<()> {
        if !self.hitbox_size_px.is_finite() || self.hitbox_size_px <= 0.0 {
            return Err(OverlayError::InvalidConfig(format!(
                "hitbox size must be positive, got {}",
                self.hitbox_size_px
            )));
        }
        if !self.label_gap_px.is_finite() || self.label_gap_px < 0.0 {
            return Err(OverlayError::InvalidConfig(format!(
                "label gap must be non-negative, got {}",
                self.label_gap_px
            )));
        }
        if !self.label_dedup_distance_m.is_finite() || self.label_dedup_distance_m < 0.0 {
            return Err(OverlayError::InvalidConfig(format!(
                "label dedup distance must be non-negative, got {}",
                self.label_dedup_distance_m
            )));
        }
        if self.position_key_precision > 9 {
            return Err(OverlayError::InvalidConfig(format!(
                "position key precision must be at most 9, got {}",
                self.position_key_precision
            )));
        }
        Ok(())
    }
}
