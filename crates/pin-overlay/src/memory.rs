//! In-memory map provider
//!
//! A headless [`MapProvider`] that keeps overlay nodes, listeners and a grid-based marker
//! clusterer in plain collections. Hosts that draw with an immediate-mode UI render from
//! [`MemoryProvider::snapshot`] every frame and feed clicks back through
//! [`MemoryProvider::dispatch_click`] / [`MemoryProvider::dispatch_cluster_click`].

use crate::badge::CLUSTER_Z_INDEX;
use crate::style::{HitboxTemplate, IconStyle, LabelTemplate};
use crate::{
    ClusterInfo, EventHandler, HitboxHandle, HitboxSpec, LabelHandle, LabelSpec, LatLng,
    ListenerId, ListenerTarget, MapProvider, MarkerHandle, MarkerSpec, OverlayEvent, OverlayNode,
    ProviderError, ProviderResult, utils,
};
use geo::{Centroid, MultiPoint, Point};
use std::collections::{BTreeMap, BTreeSet};

/// Default side of a clustering grid cell, in pixels
pub const DEFAULT_GRID_SIZE_PX: f64 = 60.0;

/// Default minimum number of markers for a cell to become a cluster glyph
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;

/// A marker node as stored by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerNode {
    pub position: LatLng,
    pub icon: IconStyle,
    pub z_index: i32,
    pub title: String,
    /// Attached directly to the map (clustered markers are not)
    pub attached: bool,
}

/// A label node as stored by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct LabelNode {
    pub position: LatLng,
    pub template: LabelTemplate,
    pub z_index: i32,
    pub attached: bool,
}

/// A hitbox node as stored by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct HitboxNode {
    pub position: LatLng,
    pub template: HitboxTemplate,
    pub z_index: i32,
    pub attached: bool,
}

/// A group of pooled markers shown as one glyph
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub members: Vec<MarkerHandle>,
    pub center: LatLng,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            members: self.members.clone(),
            center: self.center,
        }
    }
}

/// Result of grouping the cluster pool at the current level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSnapshot {
    /// Groups at or above the minimum cluster size
    pub clusters: Vec<Cluster>,
    /// Pooled markers drawn individually because their cell is too sparse
    pub singles: Vec<MarkerHandle>,
}

/// Everything visible, ready to draw in ascending stacking order
#[derive(Debug, Clone, Default)]
pub struct RenderSnapshot {
    pub markers: Vec<(MarkerHandle, MarkerNode)>,
    pub labels: Vec<(LabelHandle, LabelNode)>,
    pub hitboxes: Vec<(HitboxHandle, HitboxNode)>,
    pub clusters: Vec<Cluster>,
    pub cluster_z_index: i32,
}

/// Grid clusterer over a pool of markers
#[derive(Debug, Clone)]
struct GridClusterer {
    pool: BTreeSet<MarkerHandle>,
    attached: bool,
    grid_size_px: f64,
    min_cluster_size: usize,
}

impl GridClusterer {
    fn new() -> Self {
        Self {
            pool: BTreeSet::new(),
            attached: false,
            grid_size_px: DEFAULT_GRID_SIZE_PX,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
        }
    }

    fn compute(&self, markers: &BTreeMap<MarkerHandle, MarkerNode>, level: i32) -> ClusterSnapshot {
        #[cfg(feature = "profiling")]
        profiling::scope!("memory::cluster_compute");

        let mut cells: BTreeMap<(i64, i64), Vec<MarkerHandle>> = BTreeMap::new();
        for handle in &self.pool {
            let Some(node) = markers.get(handle) else {
                continue;
            };
            let pixel = utils::world_pixel(node.position.lat, node.position.lng, level);
            let cell = (
                (pixel.x() / self.grid_size_px).floor() as i64,
                (pixel.y() / self.grid_size_px).floor() as i64,
            );
            cells.entry(cell).or_default().push(*handle);
        }

        let mut snapshot = ClusterSnapshot::default();
        for members in cells.into_values() {
            if members.len() < self.min_cluster_size {
                snapshot.singles.extend(members);
                continue;
            }

            let points: Vec<Point<f64>> = members
                .iter()
                .filter_map(|h| markers.get(h))
                .map(|node| node.position.into())
                .collect();
            let center = MultiPoint::new(points)
                .centroid()
                .map(LatLng::from)
                .unwrap_or_default();

            snapshot.clusters.push(Cluster { members, center });
        }
        snapshot
    }
}

/// Headless map provider
pub struct MemoryProvider {
    ready: bool,
    next_id: u64,
    level: i32,
    markers: BTreeMap<MarkerHandle, MarkerNode>,
    labels: BTreeMap<LabelHandle, LabelNode>,
    hitboxes: BTreeMap<HitboxHandle, HitboxNode>,
    listeners: BTreeMap<ListenerId, (ListenerTarget, EventHandler)>,
    clusterer: GridClusterer,
    fail_destroy: bool,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("ready", &self.ready)
            .field("level", &self.level)
            .field("markers", &self.markers.len())
            .field("labels", &self.labels.len())
            .field("hitboxes", &self.hitboxes.len())
            .field("listeners", &self.listeners.len())
            .field("pool", &self.clusterer.pool.len())
            .finish()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MemoryProvider {
    /// Create a ready provider at level 3
    pub fn new() -> Self {
        Self {
            ready: true,
            next_id: 1,
            level: 3,
            markers: BTreeMap::new(),
            labels: BTreeMap::new(),
            hitboxes: BTreeMap::new(),
            listeners: BTreeMap::new(),
            clusterer: GridClusterer::new(),
            fail_destroy: false,
        }
    }

    /// Set the clustering grid cell size
    pub fn with_grid_size(mut self, grid_size_px: f64) -> Self {
        self.clusterer.grid_size_px = grid_size_px.max(1.0);
        self
    }

    /// Set the minimum number of markers per cluster glyph
    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.clusterer.min_cluster_size = min_cluster_size.max(1);
        self
    }

    /// Simulate mounting / unmounting the map surface
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Map level used by the clusterer's pixel grid
    pub fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Make every `destroy` call fail, to exercise teardown error paths
    pub fn set_fail_destroy(&mut self, fail: bool) {
        self.fail_destroy = fail;
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&MarkerNode> {
        self.markers.get(&handle)
    }

    pub fn label(&self, handle: LabelHandle) -> Option<&LabelNode> {
        self.labels.get(&handle)
    }

    /// Mutable access to a label, for hosts that edit rendered content in place
    pub fn label_mut(&mut self, handle: LabelHandle) -> Option<&mut LabelNode> {
        self.labels.get_mut(&handle)
    }

    pub fn hitbox(&self, handle: HitboxHandle) -> Option<&HitboxNode> {
        self.hitboxes.get(&handle)
    }

    /// Number of live nodes of all kinds
    pub fn node_count(&self) -> usize {
        self.markers.len() + self.labels.len() + self.hitboxes.len()
    }

    pub fn attached_marker_count(&self) -> usize {
        self.markers.values().filter(|n| n.attached).count()
    }

    pub fn attached_label_count(&self) -> usize {
        self.labels.values().filter(|n| n.attached).count()
    }

    pub fn attached_hitbox_count(&self) -> usize {
        self.hitboxes.values().filter(|n| n.attached).count()
    }

    /// Markers currently owned by the clusterer
    pub fn cluster_pool(&self) -> &BTreeSet<MarkerHandle> {
        &self.clusterer.pool
    }

    pub fn is_clusterer_attached(&self) -> bool {
        self.clusterer.attached
    }

    /// Listeners registered on one target
    pub fn listener_count(&self, target: ListenerTarget) -> usize {
        self.listeners.values().filter(|(t, _)| *t == target).count()
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Group the cluster pool at the current level
    pub fn clusters(&self) -> ClusterSnapshot {
        if !self.clusterer.attached {
            return ClusterSnapshot::default();
        }
        self.clusterer.compute(&self.markers, self.level)
    }

    /// Collect everything visible in ascending stacking order
    pub fn snapshot(&self) -> RenderSnapshot {
        let clusters = self.clusters();

        let mut markers: Vec<(MarkerHandle, MarkerNode)> = self
            .markers
            .iter()
            .filter(|(_, n)| n.attached)
            .map(|(h, n)| (*h, n.clone()))
            .collect();
        markers.extend(
            clusters
                .singles
                .iter()
                .filter_map(|h| self.markers.get(h).map(|n| (*h, n.clone()))),
        );
        markers.sort_by_key(|(h, n)| (n.z_index, *h));

        let mut labels: Vec<(LabelHandle, LabelNode)> = self
            .labels
            .iter()
            .filter(|(_, n)| n.attached)
            .map(|(h, n)| (*h, n.clone()))
            .collect();
        labels.sort_by_key(|(h, n)| (n.z_index, *h));

        let mut hitboxes: Vec<(HitboxHandle, HitboxNode)> = self
            .hitboxes
            .iter()
            .filter(|(_, n)| n.attached)
            .map(|(h, n)| (*h, n.clone()))
            .collect();
        hitboxes.sort_by_key(|(h, n)| (n.z_index, *h));

        RenderSnapshot {
            markers,
            labels,
            hitboxes,
            clusters: clusters.clusters,
            cluster_z_index: CLUSTER_Z_INDEX,
        }
    }

    /// Invoke every listener registered on `target` with a click
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch_click(&self, target: ListenerTarget) -> usize {
        let handlers: Vec<EventHandler> = self
            .listeners
            .values()
            .filter(|(t, _)| *t == target)
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler(&OverlayEvent::Click);
        }
        handlers.len()
    }

    /// Invoke the cluster layer listeners with a cluster click
    pub fn dispatch_cluster_click(&self, cluster: &Cluster) -> usize {
        let handlers: Vec<EventHandler> = self
            .listeners
            .values()
            .filter(|(t, _)| *t == ListenerTarget::Clusterer)
            .map(|(_, handler)| handler.clone())
            .collect();

        let event = OverlayEvent::ClusterClick(cluster.info());
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn ensure_ready(&self) -> ProviderResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(ProviderError::NotReady)
        }
    }

    fn target_exists(&self, target: ListenerTarget) -> bool {
        match target {
            ListenerTarget::Marker(h) => self.markers.contains_key(&h),
            ListenerTarget::Hitbox(h) => self.hitboxes.contains_key(&h),
            ListenerTarget::Clusterer => true,
        }
    }
}

impl MapProvider for MemoryProvider {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn create_marker(&mut self, spec: MarkerSpec) -> ProviderResult<MarkerHandle> {
        self.ensure_ready()?;
        let handle = MarkerHandle(self.next_id());
        self.markers.insert(
            handle,
            MarkerNode {
                position: spec.position,
                icon: spec.icon,
                z_index: spec.z_index,
                title: spec.title,
                attached: false,
            },
        );
        Ok(handle)
    }

    fn create_label(&mut self, spec: LabelSpec) -> ProviderResult<LabelHandle> {
        self.ensure_ready()?;
        let handle = LabelHandle(self.next_id());
        self.labels.insert(
            handle,
            LabelNode {
                position: spec.position,
                template: spec.template,
                z_index: spec.z_index,
                attached: false,
            },
        );
        Ok(handle)
    }

    fn create_hitbox(&mut self, spec: HitboxSpec) -> ProviderResult<HitboxHandle> {
        self.ensure_ready()?;
        let handle = HitboxHandle(self.next_id());
        self.hitboxes.insert(
            handle,
            HitboxNode {
                position: spec.position,
                template: spec.template,
                z_index: spec.z_index,
                attached: false,
            },
        );
        Ok(handle)
    }

    fn destroy(&mut self, node: OverlayNode) -> ProviderResult<()> {
        if self.fail_destroy {
            return Err(ProviderError::Internal(format!(
                "injected failure destroying {node:?}"
            )));
        }
        let removed = match node {
            OverlayNode::Marker(h) => {
                self.clusterer.pool.remove(&h);
                self.markers.remove(&h).is_some()
            }
            OverlayNode::Label(h) => self.labels.remove(&h).is_some(),
            OverlayNode::Hitbox(h) => self.hitboxes.remove(&h).is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(ProviderError::UnknownNode(node))
        }
    }

    fn set_attached(&mut self, node: OverlayNode, attached: bool) -> ProviderResult<()> {
        let slot = match node {
            OverlayNode::Marker(h) => self.markers.get_mut(&h).map(|n| &mut n.attached),
            OverlayNode::Label(h) => self.labels.get_mut(&h).map(|n| &mut n.attached),
            OverlayNode::Hitbox(h) => self.hitboxes.get_mut(&h).map(|n| &mut n.attached),
        };
        let slot = slot.ok_or(ProviderError::UnknownNode(node))?;
        *slot = attached;
        Ok(())
    }

    fn set_z_index(&mut self, node: OverlayNode, z_index: i32) -> ProviderResult<()> {
        let slot = match node {
            OverlayNode::Marker(h) => self.markers.get_mut(&h).map(|n| &mut n.z_index),
            OverlayNode::Label(h) => self.labels.get_mut(&h).map(|n| &mut n.z_index),
            OverlayNode::Hitbox(h) => self.hitboxes.get_mut(&h).map(|n| &mut n.z_index),
        };
        let slot = slot.ok_or(ProviderError::UnknownNode(node))?;
        *slot = z_index;
        Ok(())
    }

    fn set_marker_icon(&mut self, marker: MarkerHandle, icon: IconStyle) -> ProviderResult<()> {
        let node = self
            .markers
            .get_mut(&marker)
            .ok_or(ProviderError::UnknownNode(OverlayNode::Marker(marker)))?;
        node.icon = icon;
        Ok(())
    }

    fn set_label_content(
        &mut self,
        label: LabelHandle,
        template: LabelTemplate,
    ) -> ProviderResult<()> {
        let node = self
            .labels
            .get_mut(&label)
            .ok_or(ProviderError::UnknownNode(OverlayNode::Label(label)))?;
        node.template = template;
        Ok(())
    }

    fn clusterer_clear(&mut self) -> ProviderResult<()> {
        self.clusterer.pool.clear();
        Ok(())
    }

    fn clusterer_add(&mut self, markers: &[MarkerHandle]) -> ProviderResult<()> {
        for handle in markers {
            if !self.markers.contains_key(handle) {
                return Err(ProviderError::UnknownNode(OverlayNode::Marker(*handle)));
            }
        }
        self.clusterer.pool.extend(markers.iter().copied());
        Ok(())
    }

    fn set_clusterer_attached(&mut self, attached: bool) -> ProviderResult<()> {
        self.clusterer.attached = attached;
        Ok(())
    }

    fn add_listener(
        &mut self,
        target: ListenerTarget,
        handler: EventHandler,
    ) -> ProviderResult<ListenerId> {
        self.ensure_ready()?;
        if !self.target_exists(target) {
            return Err(ProviderError::Internal(format!(
                "listener target {target:?} does not exist"
            )));
        }
        let id = ListenerId(self.next_id());
        self.listeners.insert(id, (target, handler));
        Ok(id)
    }

    fn remove_listener(&mut self, listener: ListenerId) -> ProviderResult<()> {
        self.listeners
            .remove(&listener)
            .map(|_| ())
            .ok_or(ProviderError::UnknownListener(listener))
    }
}
