#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

// The binary uses the library, not duplicate modules
use pin_overlay_viewer::{APP_NAME, PinOverlayViewerApp, logging};

fn main() -> eframe::Result {
    logging::init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build the tokio runtime");

    // Tile downloads spawn onto the ambient runtime
    let _guard = rt.enter();

    eframe::run_native(
        APP_NAME,
        pin_overlay_viewer::native_options(),
        Box::new(|cc| Ok(Box::new(PinOverlayViewerApp::new(cc)?))),
    )
}
