//! Pin Overlay Viewer - Application Library
//!
//! Hosts the overlay engine on top of a `walkers` tile map: the engine draws into an
//! in-memory provider and a map plugin paints that provider's visible nodes each frame.

mod app;
pub mod logging;

pub use app::PinOverlayViewerApp;

/// Window title and application id
pub const APP_NAME: &str = "Pin Overlay Viewer";

/// Native window options
pub fn native_options() -> eframe::NativeOptions {
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(APP_NAME),
        ..Default::default()
    }
}
