//! Map provider abstraction
//!
//! The engine never draws anything itself. Everything visible goes through a
//! [`MapProvider`]: overlay node construction, attach/detach, stacking, the marker clusterer
//! and click subscriptions. Nodes are referenced by small typed handles.

use crate::LatLng;
use crate::style::{HitboxTemplate, IconStyle, LabelTemplate};
use std::rc::Rc;

/// Handle to a point-icon overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Handle to a free-form content overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelHandle(pub u64);

/// Handle to an invisible click-target overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitboxHandle(pub u64);

/// Handle to a registered event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Any overlay node owned by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayNode {
    Marker(MarkerHandle),
    Label(LabelHandle),
    Hitbox(HitboxHandle),
}

impl From<MarkerHandle> for OverlayNode {
    fn from(value: MarkerHandle) -> Self {
        Self::Marker(value)
    }
}

impl From<LabelHandle> for OverlayNode {
    fn from(value: LabelHandle) -> Self {
        Self::Label(value)
    }
}

impl From<HitboxHandle> for OverlayNode {
    fn from(value: HitboxHandle) -> Self {
        Self::Hitbox(value)
    }
}

/// What a listener is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerTarget {
    Marker(MarkerHandle),
    Hitbox(HitboxHandle),
    /// The cluster glyph layer as a whole
    Clusterer,
}

/// A cluster as reported by the provider on click
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    pub members: Vec<MarkerHandle>,
    pub center: LatLng,
}

/// Events delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    Click,
    ClusterClick(ClusterInfo),
}

/// Listener callback; removal is by the [`ListenerId`] returned on registration
pub type EventHandler = Rc<dyn Fn(&OverlayEvent)>;

/// Construction parameters for a marker
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub icon: IconStyle,
    pub z_index: i32,
    /// Tooltip / accessibility title
    pub title: String,
}

/// Construction parameters for a label
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSpec {
    pub position: LatLng,
    pub template: LabelTemplate,
    pub z_index: i32,
}

/// Construction parameters for a hitbox
#[derive(Debug, Clone, PartialEq)]
pub struct HitboxSpec {
    pub position: LatLng,
    pub template: HitboxTemplate,
    pub z_index: i32,
}

/// Failures reported by a map provider
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("map surface is not ready")]
    NotReady,

    #[error("unknown overlay node {0:?}")]
    UnknownNode(OverlayNode),

    #[error("unknown listener {0:?}")]
    UnknownListener(ListenerId),

    #[error("provider internal error: {0}")]
    Internal(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// The external map surface the engine draws through
///
/// Newly created nodes start detached. Adding a marker to the clusterer hands its display
/// over to the cluster layer; the engine detaches it directly before doing so.
pub trait MapProvider {
    /// Whether the surface is mounted and can own overlays
    fn is_ready(&self) -> bool;

    fn create_marker(&mut self, spec: MarkerSpec) -> ProviderResult<MarkerHandle>;
    fn create_label(&mut self, spec: LabelSpec) -> ProviderResult<LabelHandle>;
    fn create_hitbox(&mut self, spec: HitboxSpec) -> ProviderResult<HitboxHandle>;

    /// Detach and release a node
    fn destroy(&mut self, node: OverlayNode) -> ProviderResult<()>;

    fn set_attached(&mut self, node: OverlayNode, attached: bool) -> ProviderResult<()>;
    fn set_z_index(&mut self, node: OverlayNode, z_index: i32) -> ProviderResult<()>;
    fn set_marker_icon(&mut self, marker: MarkerHandle, icon: IconStyle) -> ProviderResult<()>;
    fn set_label_content(
        &mut self,
        label: LabelHandle,
        template: LabelTemplate,
    ) -> ProviderResult<()>;

    /// Remove every marker from the cluster grouping
    fn clusterer_clear(&mut self) -> ProviderResult<()>;
    fn clusterer_add(&mut self, markers: &[MarkerHandle]) -> ProviderResult<()>;
    /// Show or hide the cluster layer on the map
    fn set_clusterer_attached(&mut self, attached: bool) -> ProviderResult<()>;

    fn add_listener(
        &mut self,
        target: ListenerTarget,
        handler: EventHandler,
    ) -> ProviderResult<ListenerId>;
    fn remove_listener(&mut self, listener: ListenerId) -> ProviderResult<()>;
}
