use clap::Parser;
use pin_overlay::{Config, LatLng};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Pin Overlay Viewer - Render pins, deduplicated labels and clusters over a tile map
pub struct Settings {
    /// JSON file with the pins to show (an array of pins, or an object with a `pins` array)
    #[clap(short, long, value_name = "FILE")]
    pub pins: Option<PathBuf>,

    /// Number of generated demo pins when no file is given
    #[clap(long, default_value = "120")]
    pub demo_pins: usize,

    /// Farthest map level at which labels are shown
    #[clap(long, default_value = "4")]
    pub label_max_level: i32,

    /// Nearest map level at which markers are clustered
    #[clap(long, default_value = "6")]
    pub cluster_min_level: i32,

    /// Gap between the icon top and its label, in pixels
    #[clap(long, default_value = "4.0")]
    pub label_gap: f32,

    /// Side of the square click target around each labeled pin, in pixels
    #[clap(long, default_value = "44.0")]
    pub hitbox_size: f32,

    /// Pins closer than this many meters share one label
    #[clap(long, default_value = "20.0")]
    pub dedup_distance: f64,

    /// Decimal places kept in position keys
    #[clap(long, default_value = "5")]
    pub key_precision: u32,

    /// Side of a clustering grid cell, in pixels
    #[clap(long, default_value = "60.0")]
    pub grid_size: f64,

    /// Start latitude
    #[clap(long, default_value = "37.5665", allow_hyphen_values = true)]
    pub lat: f64,

    /// Start longitude
    #[clap(long, default_value = "126.978", allow_hyphen_values = true)]
    pub lon: f64,

    /// Start map level (1 is street level, larger is farther)
    #[clap(long, default_value = "3")]
    pub level: i32,
}

impl Settings {
    /// Parse the process arguments, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Engine configuration from the command line
    pub fn to_config(&self) -> Config {
        Config {
            label_max_level: self.label_max_level,
            cluster_min_level: self.cluster_min_level,
            label_gap_px: self.label_gap,
            hitbox_size_px: self.hitbox_size,
            position_key_precision: self.key_precision,
            label_dedup_distance_m: self.dedup_distance,
            ..Config::default()
        }
    }

    pub fn start_position(&self) -> LatLng {
        LatLng::new(self.lat, self.lon)
    }
}
