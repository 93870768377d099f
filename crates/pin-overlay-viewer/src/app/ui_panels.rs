//! UI panels for the application
//!
//! Sidebar with the engine's mode, selection and reservation-order controls, plus the
//! map overlays (toggle button, help window, drop preview).

use crate::app::state::AppState;
use egui::{Color32, RichText, Ui};
use pin_overlay::Mode;

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the main sidebar
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    egui::SidePanel::right("main_sidebar")
        .default_width(300.0)
        .min_width(260.0)
        .max_width(450.0)
        .resizable(true)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    render_scene_section(ui, state);
                    ui.separator();
                    render_selection_section(ui, state);
                    ui.separator();
                    render_actions_section(ui, state);
                    ui.separator();
                    render_report_section(ui, state);
                });
        });
}

fn mode_color(mode: Mode) -> Color32 {
    match mode {
        Mode::Label => Color32::from_rgb(46, 160, 67),
        Mode::Transitional => Color32::from_rgb(200, 140, 20),
        Mode::Cluster => Color32::from_rgb(52, 120, 246),
    }
}

fn render_scene_section(ui: &mut Ui, state: &mut AppState) {
    let engine = &state.engine;
    let mode = engine.mode();

    ui.heading("Scene");
    ui.horizontal(|ui| {
        ui.label("Mode:");
        ui.label(RichText::new(mode.name()).strong().color(mode_color(mode)));
        ui.label(format!("(level {})", engine.level()));
    });

    let provider = engine.provider();
    egui::Grid::new("scene_stats")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            ui.label("Pins");
            ui.label(engine.pins().len().to_string());
            ui.end_row();

            ui.label("Overlays");
            ui.label(engine.overlay_count().to_string());
            ui.end_row();

            ui.label("Visible markers");
            ui.label(provider.attached_marker_count().to_string());
            ui.end_row();

            ui.label("Visible labels");
            ui.label(provider.attached_label_count().to_string());
            ui.end_row();

            ui.label("Clustered");
            ui.label(provider.cluster_pool().len().to_string());
            ui.end_row();

            ui.label("Listeners");
            ui.label(engine.listener_count().to_string());
            ui.end_row();
        });

    if engine.is_pending() {
        ui.colored_label(Color32::from_rgb(200, 140, 20), "Waiting for the map surface");
    }

    ui.checkbox(&mut state.ui_settings.show_hitboxes, "Outline click targets");
}

fn render_selection_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Selection");

    let Some(pin) = state.selected_pin().cloned() else {
        ui.label(RichText::new("Click a pin or a cluster to select it").weak());
        return;
    };

    ui.label(RichText::new(pin.title.as_deref().unwrap_or(&pin.id)).strong());
    ui.label(format!("{:.5}, {:.5}", pin.position.lat, pin.position.lng));
    if let Some(text) = state.engine.label_text(&pin.id) {
        ui.label(format!("Label: {text}"));
    }
    if pin.is_draft {
        ui.label(RichText::new("Draft").italics());
    } else if pin.is_plan {
        ui.label(RichText::new("Plan").italics());
    }

    let precision = state.engine.config().position_key_precision;
    let order = state.engine.order().for_pin(&pin, precision);
    match order {
        Some(order) => ui.label(format!("Reservation order: {order}")),
        None => ui.label("No reservation order"),
    };

    ui.horizontal(|ui| {
        if order.is_none() && ui.button("Assign next order").clicked() {
            state.assign_next_order();
        }
        if order.is_some() && ui.button("Remove order").clicked() {
            state.remove_selected_order();
        }
        if ui.button("Deselect").clicked() {
            state.clear_selection();
        }
    });

    if pin.is_draft {
        ui.horizontal(|ui| {
            ui.add(
                egui::Slider::new(&mut state.ui_settings.remove_radius_m, 5.0..=500.0)
                    .suffix(" m")
                    .logarithmic(true),
            );
            if ui.button("Remove drafts nearby").clicked() {
                state.remove_near_selection();
            }
        });
    }
}

fn render_actions_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Actions");

    ui.horizontal_wrapped(|ui| {
        if ui
            .button("Redraw")
            .on_hover_text("Restore labels and re-apply the mode")
            .clicked()
        {
            state.engine.redraw();
        }
        if ui
            .button("Force remount")
            .on_hover_text("Destroy and rebuild every overlay")
            .clicked()
        {
            state.force_remount();
        }
        if ui.button("Clear").clicked() {
            state.engine.clear();
        }
        if ui.button("Reload pins").clicked() {
            state.reload_pins();
        }
        if state.pins_path.is_some() && ui.button("Reload file").clicked() {
            // Errors are kept in the state and shown below
            let _ = state.reload_file();
        }
        if !state.engine.order().is_empty() && ui.button("Clear orders").clicked() {
            state.clear_orders();
        }
    });
}

fn render_report_section(ui: &mut Ui, state: &AppState) {
    if let Some(error) = &state.load_error {
        ui.colored_label(Color32::from_rgb(220, 60, 60), error.as_str());
    }

    let report = &state.last_report;
    ui.label(
        RichText::new(format!(
            "Last update: {} overlays, {} labels, {} reused",
            report.overlays, report.labels, report.reused
        ))
        .small(),
    );

    if report.skipped.is_empty() {
        return;
    }
    ui.collapsing(format!("Skipped pins ({})", report.skipped.len()), |ui| {
        for id in &report.skipped {
            let shown = if id.is_empty() { "<empty id>" } else { id.as_str() };
            ui.label(RichText::new(shown).monospace());
        }
    });
}

/// Render help overlay
pub fn help_overlay(ctx: &egui::Context, show_help: &mut bool) {
    egui::Window::new("Help")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.heading("Pin Overlay Viewer");
            ui.add_space(8.0);

            ui.label("Pins show labels up close, bare icons in between and clusters far out.");
            ui.add_space(12.0);

            ui.label(RichText::new("Navigation").strong());
            ui.label("• Scroll or pinch to zoom");
            ui.label("• Click and drag to pan");
            ui.label("• Click a pin to select it, click a cluster to select one of its pins");
            ui.add_space(8.0);

            ui.label(RichText::new("Pins").strong());
            ui.label("• Pass --pins FILE with a JSON array of pins");
            ui.label("• Or drop a JSON file onto the window");
            ui.add_space(8.0);

            ui.label(RichText::new("Keyboard Shortcuts").strong());
            ui.label("• F1 - Toggle this help");
            ui.label("• Esc - Clear the selection");
            ui.add_space(12.0);

            if ui.button("Close").clicked() {
                *show_help = false;
            }
        });
}

/// Handle drag and drop of pin files
pub fn handle_drag_and_drop(ctx: &egui::Context, state: &mut AppState) {
    let hovered_files = ctx.input(|i| !i.raw.hovered_files.is_empty());
    let dropped_files: Vec<_> = ctx.input(|i| i.raw.dropped_files.clone());

    if hovered_files {
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("drop_preview"),
        ));
        let screen_rect = ctx.content_rect();
        let bg_rect = egui::Rect::from_center_size(screen_rect.center(), egui::vec2(340.0, 80.0));
        painter.rect_filled(bg_rect, 16.0, Color32::from_black_alpha(180));
        painter.text(
            screen_rect.center(),
            egui::Align2::CENTER_CENTER,
            "📂 Drop a pin file here",
            egui::FontId::proportional(28.0),
            Color32::WHITE,
        );
    }

    // The last dropped JSON file wins
    let dropped = dropped_files
        .iter()
        .filter_map(|file| file.path.clone())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .last();
    if let Some(path) = dropped {
        state.pins_path = Some(path);
        if let Err(e) = state.reload_file() {
            tracing::warn!("{e}");
        }
    }
}
