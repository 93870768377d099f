//! Application module
//!
//! Full-screen tile map with the overlay scene painted on top, plus a toggleable sidebar
//! to inspect and drive the engine.

mod pins;
mod plugin;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::plugin::{ClickHit, OverlayPlugin};
use crate::app::settings::Settings;
use crate::app::state::AppState;
use eframe::egui;
use pin_overlay::utils;
use std::sync::Arc;
use tokio::sync::RwLock;
use walkers::{HttpTiles, Map, MapMemory, sources::OpenStreetMap};

/// Main application structure
pub struct PinOverlayViewerApp {
    /// Engine, pins and UI settings
    state: AppState,

    /// Map tiles provider (OpenStreetMap)
    tiles: HttpTiles,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// Where the map is centered until the user drags it
    home: walkers::Position,

    /// Show help overlay
    show_help: bool,

    /// Overlay hit reported by the plugin, consumed after the map is drawn
    click: Arc<RwLock<Option<ClickHit>>>,
}

impl PinOverlayViewerApp {
    /// Build the app from the command line
    ///
    /// Fails when the engine rejects the configured sizes or distances.
    pub fn new(cc: &eframe::CreationContext<'_>) -> pin_overlay::Result<Self> {
        let settings = Settings::from_cli();
        let state = AppState::new(&settings)?;

        let mut map_memory = MapMemory::default();
        let _ = map_memory.set_zoom(utils::level_to_zoom(settings.level));

        tracing::info!(
            "Initialized with {} pins at level {}",
            state.source_pins.len(),
            settings.level
        );

        Ok(Self {
            state,
            tiles: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            map_memory,
            home: walkers::lat_lon(settings.lat, settings.lon),
            show_help: false,
            click: Arc::new(RwLock::new(None)),
        })
    }

    /// Route the plugin's click into the provider's listeners
    fn dispatch_click(&mut self) {
        // Use try_write for non-blocking UI polling.
        let hit = match self.click.try_write() {
            Ok(mut slot) => slot.take(),
            Err(_) => return,
        };
        let Some(hit) = hit else {
            return;
        };

        let provider = self.state.engine.provider();
        let invoked = match &hit {
            ClickHit::Cluster(cluster) => provider.dispatch_cluster_click(cluster),
            other => other
                .target()
                .map_or(0, |target| provider.dispatch_click(target)),
        };
        tracing::trace!("Click dispatched to {invoked} listeners");

        self.state.apply_click();
    }
}

#[profiling::all_functions]
impl eframe::App for PinOverlayViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle keyboard shortcuts
        ctx.input(|i| {
            if i.key_pressed(egui::Key::F1) {
                self.show_help = !self.show_help;
            }
        });
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.state.clear_selection();
        }

        // Signals may come from any engine sharing the bus
        self.state.process_signals();

        ui_panels::handle_drag_and_drop(ctx, &mut self.state);

        if self.show_help {
            ui_panels::help_overlay(ctx, &mut self.show_help);
        }

        ui_panels::render_sidebar(ctx, &mut self.state);

        // Central panel: Map view (full screen)
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                self.state.sync_zoom(self.map_memory.zoom());

                let engine = &self.state.engine;
                let selected = engine.selection().and_then(|id| engine.marker_handle(id));
                let overlay_plugin =
                    OverlayPlugin::new(engine.provider().snapshot(), selected, self.click.clone())
                        .with_hitboxes(self.state.ui_settings.show_hitboxes);

                let map = Map::new(Some(&mut self.tiles), &mut self.map_memory, self.home)
                    .with_plugin(overlay_plugin);

                ui.add(map);

                ui_panels::sidebar_toggle_button(ui, &mut self.state);

                let painter = ui.painter();
                let screen_rect = ui.max_rect();
                painter.text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    "© OpenStreetMap contributors",
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });

        self.dispatch_click();
    }
}
