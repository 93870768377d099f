//! Pin Overlay - Map Overlay & Clustering Engine
//!
//! This library projects an arbitrary set of geographic point entities ("pins") onto a map
//! surface owned by an external [`MapProvider`]. Per zoom level it decides whether each pin is
//! shown with a label, as a bare icon, or folded into a cluster, deduplicates overlapping
//! labels, decorates labels with reservation-order badges and keeps exactly one pin selected
//! and exempt from clustering.
//!
//! # Architecture
//!
//! - **[`style`]**: Pure icon/label/hitbox template resolution
//! - **[`OverlayFactory`]**: Builds marker, label and hitbox nodes through the provider
//! - **[`build_scene`]**: Computes the desired overlay set with label deduplication
//! - **[`Mode`]**: Classifies a zoom level and decides attach/detach per overlay
//! - **[`ClustererAdapter`]**: Feeds markers to the provider's clusterer with an exclusion list
//! - **[`OverlayEngine`]**: Owns the registries and reconciles the scene
//! - **[`events`]**: Click callback cell, listener ledger and the cross-instance [`SignalBus`]
//! - **[`MemoryProvider`]**: Headless provider with a grid clusterer, used by tests and hosts
//!
//! # Zoom levels
//!
//! Levels follow the "map level" convention: a larger level is a farther view. Level 1 is the
//! closest street-level view, see [`utils::zoom_to_level`] for the slippy-map conversion.

mod badge;
mod cluster;
mod config;
pub mod events;
mod memory;
mod mode;
mod overlay;
mod pin;
mod provider;
mod reconciler;
mod scene;
pub mod style;
pub mod utils;

// Public API exports
pub use badge::{ReservationOrder, marker_z_index};
pub use badge::{CLUSTER_Z_INDEX, ELEVATED_Z_INDEX, HITBOX_Z_INDEX, LABEL_Z_INDEX};
pub use cluster::{ClustererAdapter, MountSummary};
pub use config::Config;
pub use events::{ClickCallbackCell, RemoveNearSignal, SignalBus, SignalSubscription};
pub use memory::{
    Cluster, ClusterSnapshot, HitboxNode, LabelNode, MarkerNode, MemoryProvider, RenderSnapshot,
};
pub use mode::{MarkerPlacement, Mode, Placement};
pub use overlay::OverlayFactory;
pub use pin::{LatLng, Pin, PinId, PinKind, PositionKey};
pub use provider::{
    ClusterInfo, EventHandler, HitboxHandle, HitboxSpec, LabelHandle, LabelSpec, ListenerId,
    ListenerTarget, MapProvider, MarkerHandle, MarkerSpec, OverlayEvent, OverlayNode,
    ProviderError, ProviderResult,
};
pub use reconciler::{AttachState, DEFAULT_LEVEL, MarkerState, OverlayEngine, SceneReport};
pub use scene::{PlannedPin, SceneKey, ScenePlan, build_scene, label_text, scene_key};

/// Error types for the overlay engine
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Map provider error: {0}")]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
