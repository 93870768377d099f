//! OverlayEngine - scene reconciler owning the overlay registries
//!
//! The engine diffs incoming pin lists against a content-derived scene key, tears down and
//! rebuilds overlays only when that key changes, and re-applies mode decisions on zoom,
//! selection and reservation-order changes without recreating anything.

use crate::badge;
use crate::events::{self, ClickCallbackCell, ListenerLedger, SignalBus, SignalSubscription};
use crate::mode::{self, MarkerPlacement, Placement};
use crate::style::{self, IconBadge};
use crate::{
    ClustererAdapter, Config, HitboxHandle, LabelHandle, LatLng, ListenerTarget, MapProvider,
    MarkerHandle, Mode, OverlayFactory, OverlayNode, Pin, PinId, PinKind, PlannedPin,
    PositionKey, ProviderError, ProviderResult, ReservationOrder, Result, SceneKey, build_scene,
    scene_key,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Level an engine starts at before the host reports one
pub const DEFAULT_LEVEL: i32 = 3;

/// How a marker is currently displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerState {
    Detached,
    /// Attached directly to the map
    Direct,
    /// Owned by the clusterer
    Clustered,
}

/// Current attach state of one pin's overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachState {
    pub marker: MarkerState,
    pub label: bool,
    pub hitbox: bool,
    pub z_index: i32,
}

/// Outcome of a scene update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneReport {
    /// Overlays were torn down and recreated
    pub rebuilt: bool,
    /// The provider was not ready; the scene is built on a later call
    pub deferred: bool,
    /// Pins with overlays after the update
    pub overlays: usize,
    /// Label nodes (one per visible position)
    pub labels: usize,
    pub hitboxes: usize,
    /// Overlay sets patched in place by a soft update
    pub reused: usize,
    /// Malformed or duplicate pin ids left out of the scene
    pub skipped: Vec<PinId>,
}

/// Provider nodes and bookkeeping for one pin
#[derive(Debug, Clone)]
struct OverlaySet {
    pin: Pin,
    kind: PinKind,
    position_key: PositionKey,
    /// Label text without badge
    label_text: String,
    order: Option<u32>,
    marker: MarkerHandle,
    label: Option<LabelHandle>,
    hitbox: Option<HitboxHandle>,
    state: AttachState,
}

impl OverlaySet {
    fn icon_badge(&self) -> IconBadge {
        IconBadge::for_pin(&self.pin, self.order.is_some())
    }
}

/// The map overlay and clustering engine
///
/// Single-threaded: every entry point runs to completion before the next one starts, and
/// the engine exclusively owns its provider, registries and clusterer.
pub struct OverlayEngine<P: MapProvider> {
    provider: P,
    config: Config,
    overlays: BTreeMap<PinId, OverlaySet>,
    /// Marker handle to pin id, shared with the cluster click handler
    reverse: Rc<RefCell<HashMap<MarkerHandle, PinId>>>,
    clusterer: ClustererAdapter,
    ledger: ListenerLedger,
    on_click: ClickCallbackCell,
    signals: Option<SignalSubscription>,
    pins: Vec<Pin>,
    scene_key: Option<SceneKey>,
    order: ReservationOrder,
    selection: Option<PinId>,
    level: i32,
    mode: Mode,
    /// Draft pins removed by a signal, kept out while their id stays in the pin list
    suppressed: HashSet<PinId>,
    /// A scene update arrived while the provider was not ready
    pending: bool,
}

impl<P: MapProvider> std::fmt::Debug for OverlayEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayEngine")
            .field("overlays", &self.overlays.len())
            .field("pins", &self.pins.len())
            .field("level", &self.level)
            .field("mode", &self.mode)
            .field("selection", &self.selection)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<P: MapProvider> OverlayEngine<P> {
    /// Create an engine drawing through `provider`
    pub fn new(provider: P, config: Config) -> Result<Self> {
        config.validate()?;
        let mode = Mode::classify(DEFAULT_LEVEL, &config);
        Ok(Self {
            provider,
            config,
            overlays: BTreeMap::new(),
            reverse: Rc::default(),
            clusterer: ClustererAdapter::new(),
            ledger: ListenerLedger::new(),
            on_click: ClickCallbackCell::new(),
            signals: None,
            pins: Vec::new(),
            scene_key: None,
            order: ReservationOrder::new(),
            selection: None,
            level: DEFAULT_LEVEL,
            mode,
            suppressed: HashSet::new(),
            pending: false,
        })
    }

    /// Subscribe to a shared signal bus; drain it with [`Self::process_signals`]
    pub fn with_signal_bus(mut self, bus: &SignalBus) -> Self {
        self.signals = Some(bus.subscribe());
        self
    }

    /// Set the outward click-by-id callback
    ///
    /// Takes effect immediately for every registered overlay, including the cluster layer.
    pub fn on_marker_click(&self, callback: impl FnMut(&str) + 'static) {
        self.on_click.set(callback);
    }

    pub fn clear_marker_click(&self) {
        self.on_click.clear();
    }

    /// Replace the pin list
    ///
    /// Overlays are rebuilt when the scene key changes or `force` is set; otherwise the
    /// existing overlays are patched in place.
    pub fn set_pins(&mut self, pins: Vec<Pin>, force: bool) -> SceneReport {
        self.pins = pins;

        let present: HashSet<&str> = self.pins.iter().map(|p| p.id.as_str()).collect();
        self.suppressed.retain(|id| present.contains(id.as_str()));

        let key = scene_key(&self.pins, &self.config);

        if !self.provider.is_ready() {
            tracing::debug!(pins = self.pins.len(), "provider not ready, scene deferred");
            self.pending = true;
            return SceneReport {
                deferred: true,
                ..SceneReport::default()
            };
        }

        if !force
            && !self.pending
            && self.scene_key.as_ref() == Some(&key)
            && let Some(report) = self.soft_update()
        {
            return report;
        }

        self.rebuild(key)
    }

    /// Report a new map level (larger = farther) and re-apply the mode if it changed
    pub fn set_zoom(&mut self, level: i32) -> Mode {
        self.level = level;

        let mode = Mode::classify(level, &self.config);
        let changed = mode != self.mode;
        if changed {
            tracing::debug!(
                level,
                from = self.mode.name(),
                to = mode.name(),
                "display mode changed"
            );
            self.mode = mode;
        }

        if self.retry_pending().is_none() && changed {
            self.apply_mode();
        }
        mode
    }

    /// Change the selected pin
    pub fn set_selection(&mut self, selection: Option<&str>) {
        let selection = selection.map(str::to_string);
        if self.selection == selection {
            return;
        }
        self.selection = selection;
        if self.retry_pending().is_none() {
            self.apply_mode();
        }
    }

    /// Apply a new reservation order and selection to the existing overlays
    ///
    /// Restores every label from its raw text plus the new badge and restacks the markers.
    /// Never creates or destroys overlays.
    pub fn update_badges(&mut self, order: ReservationOrder, selection: Option<&str>) {
        #[cfg(feature = "profiling")]
        profiling::scope!("reconciler::update_badges");

        self.order = order;
        self.selection = selection.map(str::to_string);
        self.retry_pending();

        if !self.provider.is_ready() {
            return;
        }

        let gap = self.config.label_gap_px;
        for (id, set) in self.overlays.iter_mut() {
            let order = self.order.lookup(id, &set.position_key);
            let previous_badge = set.icon_badge();
            set.order = order;

            if let Err(err) = patch_badge(&mut self.provider, set, previous_badge, gap) {
                tracing::debug!(%id, %err, "badge update failed");
            }
        }

        self.apply_mode();
    }

    /// Refresh the current scene in place: restore label content and re-apply the mode
    pub fn redraw(&mut self) {
        if self.retry_pending().is_some() || !self.provider.is_ready() {
            return;
        }

        let gap = self.config.label_gap_px;
        for (id, set) in self.overlays.iter() {
            let Some(label) = set.label else {
                continue;
            };
            let template = badge::restored_label(&set.label_text, set.order, gap);
            if let Err(err) = self.provider.set_label_content(label, template) {
                tracing::debug!(%id, %err, "label restore failed");
            }
        }
        self.apply_mode();
    }

    /// Tear down and rebuild the current pin list regardless of the scene key
    pub fn force_remount(&mut self) -> SceneReport {
        let pins = std::mem::take(&mut self.pins);
        self.set_pins(pins, true)
    }

    /// Remove every overlay and forget the pin list
    pub fn clear(&mut self) {
        self.teardown();
        self.pins.clear();
        self.suppressed.clear();
        self.pending = false;
    }

    /// Handle the signals received from the bus since the last call
    ///
    /// Returns the number of draft pins removed.
    pub fn process_signals(&mut self) -> usize {
        let Some(subscription) = self.signals.as_mut() else {
            return 0;
        };
        let signals = subscription.drain();

        signals
            .into_iter()
            .map(|signal| self.remove_overlays_near(signal.position, signal.radius_m))
            .sum()
    }

    /// Remove the overlays of draft pins within `radius_m` of `position`
    ///
    /// The removed pins stay out of the scene while their id is in the pin list.
    pub fn remove_overlays_near(&mut self, position: LatLng, radius_m: f64) -> usize {
        let doomed: Vec<PinId> = self
            .pins
            .iter()
            .filter(|p| p.is_draft && !self.suppressed.contains(&p.id))
            .filter(|p| p.position.distance_m(&position) <= radius_m)
            .map(|p| p.id.clone())
            .collect();

        let mut lost_label = false;
        for id in &doomed {
            self.suppressed.insert(id.clone());
            let Some(set) = self.overlays.remove(id) else {
                continue;
            };
            lost_label |= set.label.is_some();
            self.ledger.remove_pin(&mut self.provider, id);
            destroy_nodes(&mut self.provider, &set);
            self.reverse.borrow_mut().remove(&set.marker);
        }

        if doomed.is_empty() {
            return 0;
        }
        tracing::debug!(removed = doomed.len(), radius_m, "draft overlays removed");

        if !lost_label {
            self.apply_mode();
        } else if self.provider.is_ready() {
            // Labels owned by a removed pin pass to the next pin at that spot
            let key = scene_key(&self.pins, &self.config);
            self.rebuild(key);
        } else {
            self.pending = true;
        }
        doomed.len()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutable provider access for hosts that feed it viewport state
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn order(&self) -> &ReservationOrder {
        &self.order
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn scene_key(&self) -> Option<&SceneKey> {
        self.scene_key.as_ref()
    }

    /// Whether a scene update is waiting for the provider
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn overlay_ids(&self) -> impl Iterator<Item = &str> {
        self.overlays.keys().map(String::as_str)
    }

    pub fn marker_handle(&self, id: &str) -> Option<MarkerHandle> {
        self.overlays.get(id).map(|set| set.marker)
    }

    pub fn label_handle(&self, id: &str) -> Option<LabelHandle> {
        self.overlays.get(id).and_then(|set| set.label)
    }

    pub fn hitbox_handle(&self, id: &str) -> Option<HitboxHandle> {
        self.overlays.get(id).and_then(|set| set.hitbox)
    }

    pub fn attach_state(&self, id: &str) -> Option<AttachState> {
        self.overlays.get(id).map(|set| set.state)
    }

    /// Raw label text of a pin, without badge
    pub fn label_text(&self, id: &str) -> Option<&str> {
        self.overlays.get(id).map(|set| set.label_text.as_str())
    }

    pub fn pin_for_marker(&self, marker: MarkerHandle) -> Option<PinId> {
        self.reverse.borrow().get(&marker).cloned()
    }

    /// Listeners registered by the current scene
    pub fn listener_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_suppressed(&self, id: &str) -> bool {
        self.suppressed.contains(id)
    }

    fn retry_pending(&mut self) -> Option<SceneReport> {
        if !self.pending || !self.provider.is_ready() {
            return None;
        }
        tracing::debug!("provider ready, building deferred scene");
        let key = scene_key(&self.pins, &self.config);
        Some(self.rebuild(key))
    }

    fn rebuild(&mut self, key: SceneKey) -> SceneReport {
        #[cfg(feature = "profiling")]
        profiling::scope!("reconciler::rebuild");

        self.teardown();

        let plan = build_scene(
            &self.pins,
            &self.order,
            self.selection.as_deref(),
            &self.config,
            &self.suppressed,
        );
        let factory = OverlayFactory::new(&self.config);

        for entry in &plan.entries {
            match build_overlay_set(
                &mut self.provider,
                &factory,
                &self.on_click,
                &mut self.ledger,
                entry,
            ) {
                Ok(set) => {
                    self.reverse
                        .borrow_mut()
                        .insert(set.marker, entry.pin.id.clone());
                    self.overlays.insert(entry.pin.id.clone(), set);
                }
                Err(ProviderError::NotReady) => {
                    tracing::debug!("provider went away during rebuild, scene deferred");
                    self.teardown();
                    self.pending = true;
                    return SceneReport {
                        deferred: true,
                        skipped: plan.skipped,
                        ..SceneReport::default()
                    };
                }
                Err(err) => {
                    tracing::debug!(id = %entry.pin.id, %err, "overlay creation failed");
                }
            }
        }

        let handler = events::cluster_click_handler(self.on_click.clone(), self.reverse.clone());
        match self
            .provider
            .add_listener(ListenerTarget::Clusterer, handler)
        {
            Ok(listener) => self.ledger.set_cluster(listener),
            Err(err) => tracing::debug!(%err, "cluster listener registration failed"),
        }

        self.scene_key = Some(key);
        self.pending = false;
        self.apply_mode();

        let report = SceneReport {
            rebuilt: true,
            deferred: false,
            overlays: self.overlays.len(),
            labels: self.overlays.values().filter(|s| s.label.is_some()).count(),
            hitboxes: self.overlays.values().filter(|s| s.hitbox.is_some()).count(),
            reused: 0,
            skipped: plan.skipped,
        };
        tracing::debug!(
            overlays = report.overlays,
            labels = report.labels,
            hitboxes = report.hitboxes,
            skipped = report.skipped.len(),
            "scene rebuilt"
        );
        report
    }

    /// Patch existing overlays when the scene key is unchanged
    ///
    /// Returns `None` when label ownership changed and a full rebuild is needed.
    fn soft_update(&mut self) -> Option<SceneReport> {
        let plan = build_scene(
            &self.pins,
            &self.order,
            self.selection.as_deref(),
            &self.config,
            &self.suppressed,
        );

        let compatible = plan.entries.len() == self.overlays.len()
            && plan.entries.iter().all(|entry| {
                self.overlays.get(entry.id()).is_some_and(|set| {
                    set.label.is_some() == entry.has_label
                        && set.hitbox.is_some() == entry.has_hitbox
                })
            });
        if !compatible {
            return None;
        }

        let factory = OverlayFactory::new(&self.config);
        let mut reused = 0;
        for entry in &plan.entries {
            let Some(set) = self.overlays.get_mut(entry.id()) else {
                continue;
            };
            let previous = style::icon_for(set.kind, set.icon_badge());
            set.pin = entry.pin.clone();
            set.kind = entry.kind;
            set.order = entry.order;

            let icon = factory.icon(entry);
            if icon != previous
                && let Err(err) = self.provider.set_marker_icon(set.marker, icon)
            {
                tracing::debug!(id = %entry.pin.id, %err, "icon patch failed");
            }
            reused += 1;
        }

        self.apply_mode();

        tracing::debug!(reused, "scene patched in place");
        Some(SceneReport {
            rebuilt: false,
            deferred: false,
            overlays: self.overlays.len(),
            labels: self.overlays.values().filter(|s| s.label.is_some()).count(),
            hitboxes: self.overlays.values().filter(|s| s.hitbox.is_some()).count(),
            reused,
            skipped: plan.skipped,
        })
    }

    /// Detach and release every overlay, listener and the cluster grouping
    ///
    /// Provider failures are logged and skipped so the teardown always completes.
    fn teardown(&mut self) {
        let listeners = self.ledger.remove_all(&mut self.provider);

        if let Err(err) = self.clusterer.unmount(&mut self.provider) {
            tracing::debug!(%err, "clusterer unmount failed");
        }

        let sets = std::mem::take(&mut self.overlays);
        for set in sets.values() {
            destroy_nodes(&mut self.provider, set);
        }
        self.reverse.borrow_mut().clear();
        self.scene_key = None;

        if !sets.is_empty() || listeners > 0 {
            tracing::debug!(overlays = sets.len(), listeners, "scene torn down");
        }
    }

    /// Place every overlay according to the current mode and selection
    fn apply_mode(&mut self) {
        #[cfg(feature = "profiling")]
        profiling::scope!("reconciler::apply_mode");

        if !self.provider.is_ready() {
            return;
        }

        let mode = self.mode;
        let clusters = mode.clusters();
        let gap = self.config.label_gap_px;
        let selection = self.selection.as_deref();

        if !clusters && let Err(err) = self.clusterer.unmount(&mut self.provider) {
            tracing::debug!(%err, "clusterer unmount failed");
        }

        let mut excluded: HashSet<PinId> = HashSet::new();
        for (id, set) in self.overlays.iter_mut() {
            let selected = selection == Some(id.as_str());
            let placement = mode::placement(
                mode,
                selected,
                set.pin.is_draft,
                set.label.is_some(),
                set.hitbox.is_some(),
            );
            if clusters && placement.marker == MarkerPlacement::Direct {
                excluded.insert(id.clone());
            }
            if let Err(err) = apply_placement(&mut self.provider, set, placement, !clusters, gap)
            {
                tracing::debug!(%id, %err, "placement failed");
            }
        }

        if !clusters {
            return;
        }

        let mounted = {
            let markers: Vec<(&str, MarkerHandle)> = self
                .overlays
                .iter()
                .map(|(id, set)| (id.as_str(), set.marker))
                .collect();
            let excluding: HashSet<&str> = excluded.iter().map(String::as_str).collect();
            self.clusterer
                .mount(&mut self.provider, &markers, &excluding)
        };

        match mounted {
            Ok(_) => {
                for (id, set) in self.overlays.iter_mut() {
                    set.state.marker = if excluded.contains(id) {
                        set.state.z_index = badge::ELEVATED_Z_INDEX;
                        MarkerState::Direct
                    } else {
                        MarkerState::Clustered
                    };
                }
            }
            Err(err) => {
                tracing::debug!(%err, "clusterer mount failed");
                for set in self.overlays.values_mut() {
                    set.state.marker = MarkerState::Detached;
                }
            }
        }
    }
}

/// Create one pin's nodes and register its click listeners
///
/// On failure the nodes created so far are released again.
fn build_overlay_set<P: MapProvider>(
    provider: &mut P,
    factory: &OverlayFactory<'_>,
    on_click: &ClickCallbackCell,
    ledger: &mut ListenerLedger,
    entry: &PlannedPin,
) -> ProviderResult<OverlaySet> {
    let marker = factory.marker(provider, entry)?;
    let mut set = OverlaySet {
        pin: entry.pin.clone(),
        kind: entry.kind,
        position_key: entry.position_key,
        label_text: entry.label_text.clone(),
        order: entry.order,
        marker,
        label: None,
        hitbox: None,
        state: AttachState {
            marker: MarkerState::Detached,
            label: false,
            hitbox: false,
            z_index: badge::marker_z_index(entry.order, entry.selected),
        },
    };

    if let Err(err) = complete_overlay_set(provider, factory, on_click, ledger, entry, &mut set) {
        ledger.remove_pin(provider, entry.id());
        destroy_nodes(provider, &set);
        return Err(err);
    }
    Ok(set)
}

fn complete_overlay_set<P: MapProvider>(
    provider: &mut P,
    factory: &OverlayFactory<'_>,
    on_click: &ClickCallbackCell,
    ledger: &mut ListenerLedger,
    entry: &PlannedPin,
    set: &mut OverlaySet,
) -> ProviderResult<()> {
    let id = entry.id();

    let listener = provider.add_listener(
        ListenerTarget::Marker(set.marker),
        events::marker_click_handler(on_click.clone(), id.to_string()),
    )?;
    ledger.record(id, listener);

    if entry.has_label {
        set.label = Some(factory.label(provider, entry)?);
    }

    if entry.has_hitbox {
        let hitbox = factory.hitbox(provider, entry)?;
        set.hitbox = Some(hitbox);
        let listener = provider.add_listener(
            ListenerTarget::Hitbox(hitbox),
            events::marker_click_handler(on_click.clone(), id.to_string()),
        )?;
        ledger.record(id, listener);
    }
    Ok(())
}

/// Release a pin's nodes, ignoring provider failures
fn destroy_nodes<P: MapProvider>(provider: &mut P, set: &OverlaySet) {
    let nodes = std::iter::once(OverlayNode::from(set.marker))
        .chain(set.label.map(OverlayNode::from))
        .chain(set.hitbox.map(OverlayNode::from));
    // Detach first so a failed release never leaves the node on the map
    for node in nodes {
        if let Err(err) = provider.set_attached(node, false) {
            tracing::debug!(?node, %err, "node detach failed");
        }
        if let Err(err) = provider.destroy(node) {
            tracing::debug!(?node, %err, "node release failed");
        }
    }
}

/// Move one pin's overlays to their desired placement
///
/// Marker attachment is only managed outside cluster mode; the clusterer adapter owns it
/// there. Labels get their content restored before every detached to attached transition.
fn apply_placement<P: MapProvider>(
    provider: &mut P,
    set: &mut OverlaySet,
    placement: Placement,
    manage_marker: bool,
    gap_px: f32,
) -> ProviderResult<()> {
    if let Some(label) = set.label {
        if placement.label && !set.state.label {
            let template = badge::restored_label(&set.label_text, set.order, gap_px);
            provider.set_label_content(label, template)?;
            provider.set_attached(label.into(), true)?;
            set.state.label = true;
            tracing::trace!(id = %set.pin.id, "label attached");
        } else if !placement.label && set.state.label {
            provider.set_attached(label.into(), false)?;
            set.state.label = false;
            tracing::trace!(id = %set.pin.id, "label detached");
        }
    }

    if let Some(hitbox) = set.hitbox
        && placement.hitbox != set.state.hitbox
    {
        provider.set_attached(hitbox.into(), placement.hitbox)?;
        set.state.hitbox = placement.hitbox;
        tracing::trace!(id = %set.pin.id, attached = placement.hitbox, "hitbox flipped");
    }

    let z_index = badge::marker_z_index(set.order, placement.elevated);
    if z_index != set.state.z_index {
        provider.set_z_index(set.marker.into(), z_index)?;
        set.state.z_index = z_index;
    }

    if manage_marker && set.state.marker != MarkerState::Direct {
        provider.set_attached(set.marker.into(), true)?;
        set.state.marker = MarkerState::Direct;
        tracing::trace!(id = %set.pin.id, "marker attached");
    }
    Ok(())
}

/// Re-apply icon, stacking and label content after a reservation-order change
fn patch_badge<P: MapProvider>(
    provider: &mut P,
    set: &mut OverlaySet,
    previous_badge: IconBadge,
    gap_px: f32,
) -> ProviderResult<()> {
    if set.icon_badge() != previous_badge {
        provider.set_marker_icon(set.marker, style::icon_for(set.kind, set.icon_badge()))?;
    }

    if set.state.z_index != badge::ELEVATED_Z_INDEX {
        let z_index = badge::marker_z_index(set.order, false);
        if z_index != set.state.z_index {
            provider.set_z_index(set.marker.into(), z_index)?;
            set.state.z_index = z_index;
        }
    }

    if let Some(label) = set.label {
        provider.set_label_content(
            label,
            badge::restored_label(&set.label_text, set.order, gap_px),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryProvider;
    use std::cell::Cell;

    fn engine() -> OverlayEngine<MemoryProvider> {
        OverlayEngine::new(MemoryProvider::new(), Config::default()).unwrap()
    }

    fn pins() -> Vec<Pin> {
        vec![
            Pin::new("a", 37.50, 127.00).with_title("A"),
            Pin::new("b", 37.51, 127.01).with_title("B"),
            Pin::new("c", 37.52, 127.02).with_title("C").draft(),
        ]
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            hitbox_size_px: 0.0,
            ..Config::default()
        };
        assert!(OverlayEngine::new(MemoryProvider::new(), config).is_err());
    }

    #[test]
    fn test_rebuild_creates_overlays() {
        let mut engine = engine();
        let report = engine.set_pins(pins(), false);

        assert!(report.rebuilt);
        assert_eq!(report.overlays, 3);
        assert_eq!(report.labels, 3);
        assert_eq!(report.hitboxes, 0);
        assert_eq!(engine.mode(), Mode::Label);
        assert_eq!(engine.provider().attached_marker_count(), 3);
        assert_eq!(engine.provider().attached_label_count(), 3);
    }

    #[test]
    fn test_unchanged_pins_do_not_rebuild() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        let marker = engine.marker_handle("a");

        let report = engine.set_pins(pins(), false);
        assert!(!report.rebuilt);
        assert_eq!(report.reused, 3);
        assert_eq!(engine.marker_handle("a"), marker);

        let report = engine.set_pins(pins(), true);
        assert!(report.rebuilt);
        assert_ne!(engine.marker_handle("a"), marker);
    }

    #[test]
    fn test_soft_update_patches_icon() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        let marker = engine.marker_handle("a").unwrap();

        let mut changed = pins();
        changed[0].kind = Some(PinKind::Land);
        let report = engine.set_pins(changed, false);

        assert!(!report.rebuilt);
        assert_eq!(engine.marker_handle("a"), Some(marker));
        assert_eq!(
            engine.provider().marker(marker).unwrap().icon.asset,
            "icons/land.svg"
        );
    }

    #[test]
    fn test_transitional_mode_keeps_markers_direct() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        assert_eq!(engine.set_zoom(5), Mode::Transitional);

        assert_eq!(engine.provider().attached_label_count(), 0);
        assert_eq!(engine.provider().attached_marker_count(), 3);
        assert!(!engine.provider().is_clusterer_attached());
    }

    #[test]
    fn test_cluster_mode_round_trip() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        engine.set_zoom(8);

        assert!(engine.provider().is_clusterer_attached());
        // The draft pin stays out of the pool
        assert_eq!(engine.provider().cluster_pool().len(), 2);
        assert_eq!(
            engine.attach_state("c").unwrap().marker,
            MarkerState::Direct
        );
        assert_eq!(
            engine.attach_state("a").unwrap().marker,
            MarkerState::Clustered
        );

        engine.set_zoom(2);
        assert!(!engine.provider().is_clusterer_attached());
        assert_eq!(engine.provider().attached_marker_count(), 3);
        assert_eq!(engine.provider().attached_label_count(), 3);
    }

    #[test]
    fn test_selection_moves_elevation() {
        let mut engine = engine();
        engine.set_pins(pins(), false);

        engine.set_selection(Some("a"));
        let a = engine.attach_state("a").unwrap();
        assert!(!a.label);
        assert_eq!(a.z_index, badge::ELEVATED_Z_INDEX);

        engine.set_selection(Some("b"));
        let a = engine.attach_state("a").unwrap();
        assert!(a.label);
        assert_eq!(a.z_index, badge::marker_z_index(None, false));
        assert!(!engine.attach_state("b").unwrap().label);
    }

    #[test]
    fn test_marker_click_reaches_callback() {
        let mut engine = engine();
        engine.set_pins(pins(), false);

        let clicked = Rc::new(RefCell::new(Vec::<String>::new()));
        let sink = clicked.clone();
        engine.on_marker_click(move |id| sink.borrow_mut().push(id.to_string()));

        let marker = engine.marker_handle("b").unwrap();
        assert_eq!(
            engine.provider().dispatch_click(ListenerTarget::Marker(marker)),
            1
        );
        assert_eq!(*clicked.borrow(), vec!["b".to_string()]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        engine.clear();

        assert_eq!(engine.overlay_count(), 0);
        assert_eq!(engine.provider().node_count(), 0);
        assert_eq!(engine.provider().total_listeners(), 0);
        assert!(engine.pins().is_empty());
        assert!(engine.scene_key().is_none());
    }

    #[test]
    fn test_remove_near_only_touches_drafts() {
        let mut engine = engine();
        engine.set_pins(pins(), false);

        let removed = engine.remove_overlays_near(LatLng::new(37.52, 127.02), 50.0);
        assert_eq!(removed, 1);
        assert!(engine.marker_handle("c").is_none());
        assert!(engine.is_suppressed("c"));

        // Ordinary pins in range are kept
        assert_eq!(engine.remove_overlays_near(LatLng::new(37.5, 127.0), 50.0), 0);
        assert!(engine.marker_handle("a").is_some());

        // Suppression survives a forced rebuild while the id is still listed
        engine.force_remount();
        assert!(engine.marker_handle("c").is_none());

        // And ends once the id leaves the pin list
        let mut without_c = pins();
        without_c.pop();
        engine.set_pins(without_c, false);
        assert!(!engine.is_suppressed("c"));
    }

    #[test]
    fn test_remove_near_hands_label_to_remaining_pin() {
        let mut engine = engine();
        engine.set_pins(
            vec![
                Pin::new("d", 37.5, 127.0).draft().plan().with_region("X"),
                Pin::new("real", 37.5, 127.0).with_title("Real"),
            ],
            false,
        );
        assert!(engine.label_handle("d").is_some());
        assert!(engine.label_handle("real").is_none());

        assert_eq!(engine.remove_overlays_near(LatLng::new(37.5, 127.0), 5.0), 1);

        let label = engine.label_handle("real").expect("label passes to the remaining pin");
        assert!(engine.provider().label(label).unwrap().attached);
        assert_eq!(engine.provider().attached_label_count(), 1);
        assert_eq!(engine.label_text("real"), Some("Real"));
        assert!(engine.is_suppressed("d"));
    }

    #[test]
    fn test_deferred_until_ready() {
        let mut provider = MemoryProvider::new();
        provider.set_ready(false);
        let mut engine = OverlayEngine::new(provider, Config::default()).unwrap();

        let report = engine.set_pins(pins(), false);
        assert!(report.deferred);
        assert!(engine.is_pending());
        assert_eq!(engine.overlay_count(), 0);

        engine.provider_mut().set_ready(true);
        engine.set_zoom(3);
        assert!(!engine.is_pending());
        assert_eq!(engine.overlay_count(), 3);
    }

    #[test]
    fn test_cluster_click_selects_representative() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        engine.set_zoom(8);

        let clicked = Rc::new(RefCell::new(None::<String>));
        let sink = clicked.clone();
        engine.on_marker_click(move |id| *sink.borrow_mut() = Some(id.to_string()));

        let a = engine.marker_handle("a").unwrap();
        let cluster = crate::Cluster {
            members: vec![a],
            center: LatLng::new(37.5, 127.0),
        };
        assert_eq!(engine.provider().dispatch_cluster_click(&cluster), 1);
        assert_eq!(clicked.borrow().as_deref(), Some("a"));
    }

    #[test]
    fn test_callback_replacement_without_rebuild() {
        let mut engine = engine();
        engine.set_pins(pins(), false);
        let marker = engine.marker_handle("a").unwrap();

        let first = Rc::new(Cell::new(0));
        let counter = first.clone();
        engine.on_marker_click(move |_| counter.set(counter.get() + 1));
        let second = Rc::new(Cell::new(0));
        let counter = second.clone();
        engine.on_marker_click(move |_| counter.set(counter.get() + 1));

        engine
            .provider()
            .dispatch_click(ListenerTarget::Marker(marker));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }
}
