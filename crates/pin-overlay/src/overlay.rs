//! Overlay factory: builds marker, label and hitbox nodes for planned pins

use crate::badge::{self, HITBOX_Z_INDEX, LABEL_Z_INDEX};
use crate::style::{self, IconBadge, IconStyle};
use crate::{
    Config, HitboxHandle, HitboxSpec, LabelHandle, LabelSpec, MapProvider, MarkerHandle,
    MarkerSpec, PlannedPin, ProviderResult,
};

/// Builds provider nodes from planned pins using the style resolver
///
/// Nodes are created detached; attaching is the mode controller's job.
#[derive(Debug, Clone, Copy)]
pub struct OverlayFactory<'a> {
    config: &'a Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a> OverlayFactory<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Icon for a planned pin given its current order
    pub fn icon(&self, entry: &PlannedPin) -> IconStyle {
        style::icon_for(
            entry.kind,
            IconBadge::for_pin(&entry.pin, entry.order.is_some()),
        )
    }

    pub fn marker<P: MapProvider>(
        &self,
        provider: &mut P,
        entry: &PlannedPin,
    ) -> ProviderResult<MarkerHandle> {
        provider.create_marker(MarkerSpec {
            position: entry.position(),
            icon: self.icon(entry),
            z_index: badge::marker_z_index(entry.order, entry.selected),
            title: entry.label_text.clone(),
        })
    }

    pub fn label<P: MapProvider>(
        &self,
        provider: &mut P,
        entry: &PlannedPin,
    ) -> ProviderResult<LabelHandle> {
        provider.create_label(LabelSpec {
            position: entry.position(),
            template: badge::restored_label(
                &entry.label_text,
                entry.order,
                self.config.label_gap_px,
            ),
            z_index: LABEL_Z_INDEX,
        })
    }

    pub fn hitbox<P: MapProvider>(
        &self,
        provider: &mut P,
        entry: &PlannedPin,
    ) -> ProviderResult<HitboxHandle> {
        provider.create_hitbox(HitboxSpec {
            position: entry.position(),
            template: style::hitbox_template(self.config.hitbox_size_px),
            z_index: HITBOX_Z_INDEX,
        })
    }
}
