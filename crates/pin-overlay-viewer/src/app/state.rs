//! Application state management
//!
//! Owns the overlay engine, the signal bus it listens on and the click slot the engine's
//! marker callback writes into.

use crate::app::pins::{self, ViewerError};
use crate::app::settings::Settings;
use pin_overlay::{
    LatLng, MemoryProvider, OverlayEngine, Pin, PinId, SceneReport, SignalBus, utils,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Main application state
pub struct AppState {
    /// The overlay engine, drawing into an in-memory provider
    pub engine: OverlayEngine<MemoryProvider>,

    /// Cross-instance signals (remove-near)
    pub bus: SignalBus,

    /// Pins as loaded, kept so a cleared scene can be reloaded
    pub source_pins: Vec<Pin>,

    /// Outcome of the last scene update
    pub last_report: SceneReport,

    /// Current UI settings
    pub ui_settings: UiSettings,

    /// File the pins came from, if any
    pub pins_path: Option<PathBuf>,

    /// Last load error, shown in the sidebar
    pub load_error: Option<String>,

    /// Written by the engine's marker click callback, consumed once per frame
    clicked: Rc<RefCell<Option<PinId>>>,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone, Debug, PartialEq)]
pub struct UiSettings {
    /// Whether sidebar is open
    pub sidebar_open: bool,

    /// Outline the invisible click targets
    pub show_hitboxes: bool,

    /// Radius for the remove-near action, in meters
    pub remove_radius_m: f64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            show_hitboxes: false,
            remove_radius_m: 30.0,
        }
    }
}

impl AppState {
    /// Build the engine and load the initial pins
    pub fn new(settings: &Settings) -> pin_overlay::Result<Self> {
        let (source_pins, load_error) = match &settings.pins {
            Some(path) => match pins::load_pins(path) {
                Ok(pins) => (pins, None),
                Err(e) => {
                    tracing::error!("{e}");
                    (Vec::new(), Some(e.to_string()))
                }
            },
            None => (
                pins::demo_pins(settings.demo_pins, settings.start_position()),
                None,
            ),
        };
        Self::with_pins(settings, source_pins, load_error)
    }

    fn with_pins(
        settings: &Settings,
        source_pins: Vec<Pin>,
        load_error: Option<String>,
    ) -> pin_overlay::Result<Self> {
        let mut provider = MemoryProvider::new().with_grid_size(settings.grid_size);
        provider.set_level(settings.level);

        let bus = SignalBus::default();
        let mut engine = OverlayEngine::new(provider, settings.to_config())?.with_signal_bus(&bus);

        let clicked: Rc<RefCell<Option<PinId>>> = Rc::new(RefCell::new(None));
        let slot = clicked.clone();
        engine.on_marker_click(move |id| {
            *slot.borrow_mut() = Some(id.to_string());
        });
        engine.set_zoom(settings.level);

        let mut state = Self {
            engine,
            bus,
            source_pins,
            pins_path: settings.pins.clone(),
            last_report: SceneReport::default(),
            ui_settings: UiSettings::default(),
            load_error,
            clicked,
        };
        state.reload_pins();
        Ok(state)
    }

    /// Hand the loaded pins to the engine again
    pub fn reload_pins(&mut self) {
        let report = self.engine.set_pins(self.source_pins.clone(), false);
        self.record_report(report);
    }

    /// Read the pin file again and replace the scene
    pub fn reload_file(&mut self) -> Result<(), ViewerError> {
        let Some(path) = self.pins_path.clone() else {
            return Ok(());
        };
        match pins::load_pins(&path) {
            Ok(pins) => {
                self.source_pins = pins;
                self.load_error = None;
                self.reload_pins();
                Ok(())
            }
            Err(e) => {
                self.load_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn force_remount(&mut self) {
        let report = self.engine.force_remount();
        self.record_report(report);
    }

    fn record_report(&mut self, report: SceneReport) {
        for id in &report.skipped {
            tracing::warn!("Skipped malformed or duplicate pin {id:?}");
        }
        if report.deferred {
            tracing::debug!("Scene update deferred until the map is ready");
        }
        self.last_report = report;
    }

    /// Follow the map's zoom
    pub fn sync_zoom(&mut self, zoom: f64) {
        let level = utils::zoom_to_level(zoom);
        if level == self.engine.level() {
            return;
        }
        self.engine.provider_mut().set_level(level);
        self.engine.set_zoom(level);
    }

    /// Apply a click reported by the engine since the last frame
    pub fn apply_click(&mut self) -> Option<PinId> {
        let clicked = self.clicked.borrow_mut().take();
        if let Some(id) = &clicked {
            tracing::debug!("Selected {id}");
            self.engine.set_selection(Some(id));
        }
        clicked
    }

    pub fn clear_selection(&mut self) {
        self.engine.set_selection(None);
    }

    /// Give the selected pin the next reservation order
    ///
    /// Pins already ordered, by id or by position, keep their order.
    pub fn assign_next_order(&mut self) -> Option<u32> {
        let pin = self.selected_pin()?.clone();
        let precision = self.engine.config().position_key_precision;
        let mut order = self.engine.order().clone();
        if order.for_pin(&pin, precision).is_some() {
            return None;
        }
        let next = order.max_priority().map_or(1, |max| max + 1);
        order.insert(pin.id.clone(), next);
        self.engine.update_badges(order, Some(&pin.id));
        Some(next)
    }

    /// Drop the selected pin's reservation order
    pub fn remove_selected_order(&mut self) -> Option<u32> {
        let selection = self.engine.selection()?.to_string();
        let mut order = self.engine.order().clone();
        let removed = order.remove(&selection)?;
        self.engine.update_badges(order, Some(&selection));
        Some(removed)
    }

    /// Remove every reservation order
    pub fn clear_orders(&mut self) {
        let selection = self.engine.selection().map(str::to_string);
        self.engine
            .update_badges(Default::default(), selection.as_deref());
    }

    /// Broadcast a remove-near signal around the selected pin
    pub fn remove_near_selection(&mut self) -> usize {
        let Some(position) = self.selected_position() else {
            return 0;
        };
        self.bus
            .emit_remove_near(position, self.ui_settings.remove_radius_m)
    }

    /// Drain pending signals into the engine
    pub fn process_signals(&mut self) -> usize {
        let removed = self.engine.process_signals();
        if removed > 0 {
            tracing::info!("Removed {removed} draft overlays");
        }
        removed
    }

    pub fn selected_pin(&self) -> Option<&Pin> {
        let id = self.engine.selection()?;
        self.engine.pins().iter().find(|p| p.id == id)
    }

    fn selected_position(&self) -> Option<LatLng> {
        self.selected_pin().map(|p| p.position)
    }
}
