//! Walkers plugin painting the overlay engine's scene
//!
//! The engine draws into a [`MemoryProvider`]; every frame the app takes a
//! [`RenderSnapshot`] of the provider and this plugin paints it in stacking order, then
//! hit-tests a click against the same geometry.

use egui::{Color32, FontId, Pos2, Rect, Stroke, Vec2};
use pin_overlay::style::MARKER_GEOMETRY;
use pin_overlay::{
    Cluster, HitboxHandle, HitboxNode, LabelNode, LatLng, ListenerTarget, MarkerHandle,
    MarkerNode, RenderSnapshot,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use walkers::{Plugin, Projector};

/// What a click landed on
#[derive(Debug, Clone, PartialEq)]
pub enum ClickHit {
    Marker(MarkerHandle),
    Hitbox(HitboxHandle),
    Cluster(Cluster),
}

impl ClickHit {
    /// Listener target for node hits; clusters go through the cluster dispatch
    pub fn target(&self) -> Option<ListenerTarget> {
        match self {
            Self::Marker(handle) => Some(ListenerTarget::Marker(*handle)),
            Self::Hitbox(handle) => Some(ListenerTarget::Hitbox(*handle)),
            Self::Cluster(_) => None,
        }
    }
}

/// One paintable item with its stacking value
enum Item<'a> {
    Marker(MarkerHandle, &'a MarkerNode),
    Label(&'a LabelNode),
    Hitbox(HitboxHandle, &'a HitboxNode),
    Cluster(&'a Cluster),
}

/// Plugin for painting overlay nodes on the map
pub struct OverlayPlugin {
    snapshot: RenderSnapshot,
    /// Marker of the selected pin, drawn with a ring
    selected: Option<MarkerHandle>,
    show_hitboxes: bool,
    /// Written when the map is clicked on an overlay
    click: Arc<RwLock<Option<ClickHit>>>,
}

impl OverlayPlugin {
    pub fn new(
        snapshot: RenderSnapshot,
        selected: Option<MarkerHandle>,
        click: Arc<RwLock<Option<ClickHit>>>,
    ) -> Self {
        Self {
            snapshot,
            selected,
            show_hitboxes: false,
            click,
        }
    }

    /// Outline hitboxes for debugging
    pub fn with_hitboxes(mut self, show: bool) -> Self {
        self.show_hitboxes = show;
        self
    }

    /// Items in ascending stacking order
    fn items(&self) -> Vec<(i32, Item<'_>)> {
        let snapshot = &self.snapshot;
        let mut items: Vec<(i32, Item<'_>)> = Vec::with_capacity(
            snapshot.markers.len()
                + snapshot.labels.len()
                + snapshot.hitboxes.len()
                + snapshot.clusters.len(),
        );
        items.extend(
            snapshot
                .markers
                .iter()
                .map(|(h, n)| (n.z_index, Item::Marker(*h, n))),
        );
        items.extend(
            snapshot
                .labels
                .iter()
                .map(|(_, n)| (n.z_index, Item::Label(n))),
        );
        items.extend(
            snapshot
                .hitboxes
                .iter()
                .map(|(h, n)| (n.z_index, Item::Hitbox(*h, n))),
        );
        items.extend(
            snapshot
                .clusters
                .iter()
                .map(|c| (snapshot.cluster_z_index, Item::Cluster(c))),
        );
        // Stable, so each list keeps its own order within a stacking value
        items.sort_by_key(|(z, _)| *z);
        items
    }
}

fn screen(projector: &Projector, position: LatLng) -> Pos2 {
    projector
        .project(walkers::lat_lon(position.lat, position.lng))
        .to_pos2()
}

fn color(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// Screen rect of a marker icon whose tip is at `tip`
fn marker_rect(tip: Pos2) -> Rect {
    let g = MARKER_GEOMETRY;
    Rect::from_min_size(
        tip - Vec2::new(g.anchor_x, g.anchor_y),
        Vec2::new(g.width, g.height),
    )
}

fn hitbox_rect(tip: Pos2, node: &HitboxNode) -> Rect {
    let center = tip - Vec2::new(0.0, node.template.offset_y_px);
    Rect::from_center_size(center, Vec2::splat(node.template.size_px))
}

fn cluster_radius(cluster: &Cluster) -> f32 {
    14.0 + (cluster.len() as f32).log10() * 8.0
}

fn paint_marker(painter: &egui::Painter, tip: Pos2, node: &MarkerNode, selected: bool) {
    let rect = marker_rect(tip);
    let fill = color(node.icon.color);
    let head = Pos2::new(rect.center().x, rect.min.y + rect.width() / 2.0);
    let radius = rect.width() / 2.0;

    painter.add(egui::Shape::convex_polygon(
        vec![
            head + Vec2::new(-radius * 0.7, radius * 0.6),
            head + Vec2::new(radius * 0.7, radius * 0.6),
            tip,
        ],
        fill,
        Stroke::NONE,
    ));
    painter.circle(head, radius, fill, Stroke::new(1.5, Color32::WHITE));
    painter.circle_filled(head, radius * 0.35, Color32::WHITE);

    if selected {
        painter.circle_stroke(head, radius + 4.0, Stroke::new(3.0, Color32::YELLOW));
    }
}

fn paint_label(painter: &egui::Painter, tip: Pos2, node: &LabelNode) {
    let template = &node.template;
    let galley = painter.layout_no_wrap(
        template.text.clone(),
        FontId::proportional(12.0),
        Color32::from_gray(30),
    );

    let badge_size = if template.badge.is_some() { 18.0 } else { 0.0 };
    let padding = Vec2::new(6.0, 3.0);
    let size = galley.size() + padding * 2.0 + Vec2::new(badge_size, 0.0);
    let bottom = tip - Vec2::new(0.0, template.offset_y_px);
    let rect = Rect::from_min_size(Pos2::new(bottom.x - size.x / 2.0, bottom.y - size.y), size);

    painter.rect(
        rect,
        4.0,
        Color32::WHITE,
        Stroke::new(1.0, Color32::from_gray(120)),
        egui::StrokeKind::Inside,
    );

    if let Some(order) = template.badge {
        let center = Pos2::new(rect.min.x + padding.x + badge_size / 2.0 - 2.0, rect.center().y);
        painter.circle_filled(center, badge_size / 2.0 - 1.0, Color32::from_rgb(230, 90, 40));
        painter.text(
            center,
            egui::Align2::CENTER_CENTER,
            order.to_string(),
            FontId::proportional(10.0),
            Color32::WHITE,
        );
    }

    let text_pos = Pos2::new(rect.min.x + padding.x + badge_size, rect.min.y + padding.y);
    painter.galley(text_pos, galley, Color32::from_gray(30));
}

fn paint_cluster(painter: &egui::Painter, center: Pos2, cluster: &Cluster) {
    let radius = cluster_radius(cluster);
    painter.circle_filled(center, radius + 5.0, Color32::from_rgba_unmultiplied(52, 120, 246, 70));
    painter.circle(
        center,
        radius,
        Color32::from_rgb(52, 120, 246),
        Stroke::new(2.0, Color32::WHITE),
    );
    painter.text(
        center,
        egui::Align2::CENTER_CENTER,
        cluster.len().to_string(),
        FontId::proportional(13.0),
        Color32::WHITE,
    );
}

impl Plugin for OverlayPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("OverlayPlugin::run");

        let painter = ui.painter();
        let items = self.items();

        {
            profiling::scope!("paint_overlays");
            for (_, item) in &items {
                match item {
                    Item::Marker(handle, node) => {
                        let selected = self.selected == Some(*handle);
                        paint_marker(painter, screen(projector, node.position), node, selected);
                    }
                    Item::Label(node) => paint_label(painter, screen(projector, node.position), node),
                    Item::Hitbox(_, node) if self.show_hitboxes => {
                        let rect = hitbox_rect(screen(projector, node.position), node);
                        painter.rect_stroke(
                            rect,
                            0.0,
                            Stroke::new(1.0, Color32::RED),
                            egui::StrokeKind::Inside,
                        );
                    }
                    Item::Hitbox(..) => {}
                    Item::Cluster(cluster) => {
                        paint_cluster(painter, screen(projector, cluster.center), cluster)
                    }
                }
            }
        }

        let click_pos = if response.clicked() {
            response.interact_pointer_pos()
        } else {
            None
        };
        let Some(click_pos) = click_pos else {
            return;
        };

        // Topmost first; labels are not click targets
        let hit = items.iter().rev().find_map(|(_, item)| match item {
            Item::Marker(handle, node) => marker_rect(screen(projector, node.position))
                .contains(click_pos)
                .then_some(ClickHit::Marker(*handle)),
            Item::Hitbox(handle, node) => hitbox_rect(screen(projector, node.position), node)
                .contains(click_pos)
                .then_some(ClickHit::Hitbox(*handle)),
            Item::Cluster(cluster) => {
                let center = screen(projector, cluster.center);
                (center.distance(click_pos) <= cluster_radius(cluster))
                    .then(|| ClickHit::Cluster((*cluster).clone()))
            }
            Item::Label(_) => None,
        });

        if let Some(hit) = hit {
            tracing::trace!("Overlay click: {hit:?}");
            // Use try_write for non-blocking UI updates.
            if let Ok(mut slot) = self.click.try_write() {
                *slot = Some(hit);
            }
        }
    }
}
