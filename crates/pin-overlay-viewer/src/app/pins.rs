//! Pin sources: JSON files and a generated demo set

use pin_overlay::{LatLng, Pin, PinKind};
use std::path::{Path, PathBuf};

/// Errors raised while loading pins
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pin file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Accepted pin file layouts
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum PinFile {
    List(Vec<Pin>),
    Wrapped { pins: Vec<Pin> },
}

/// Parse pins from JSON text
pub fn parse_pins(json: &str) -> Result<Vec<Pin>, serde_json::Error> {
    let file: PinFile = serde_json::from_str(json)?;
    Ok(match file {
        PinFile::List(pins) | PinFile::Wrapped { pins } => pins,
    })
}

/// Load pins from a JSON file
pub fn load_pins(path: &Path) -> Result<Vec<Pin>, ViewerError> {
    let json = std::fs::read_to_string(path).map_err(|source| ViewerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pins = parse_pins(&json).map_err(|source| ViewerError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Loaded {} pins from {}", pins.len(), path.display());
    Ok(pins)
}

/// Generate `count` pins scattered around `center`
///
/// Deterministic: a golden-angle spiral with a few stacked pairs so label sharing and
/// clustering show up at every zoom.
pub fn demo_pins(count: usize, center: LatLng) -> Vec<Pin> {
    const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
    let kinds = PinKind::all();

    (0..count)
        .map(|i| {
            let radius_deg = 0.0009 * (i as f64).sqrt();
            let angle = i as f64 * GOLDEN_ANGLE;
            let mut lat = center.lat + radius_deg * angle.sin();
            let mut lng = center.lng + radius_deg * angle.cos() * 1.25;

            // Every 9th pin sits a few meters from its predecessor
            if i % 9 == 8 {
                let prev = 0.0009 * ((i - 1) as f64).sqrt();
                let prev_angle = (i - 1) as f64 * GOLDEN_ANGLE;
                lat = center.lat + prev * prev_angle.sin() + 0.00003;
                lng = center.lng + prev * prev_angle.cos() * 1.25;
            }

            let mut pin = Pin::new(format!("demo-{i}"), lat, lng)
                .with_title(format!("Site {}", i + 1))
                .with_kind(kinds[i % kinds.len()]);
            if i % 13 == 5 {
                pin = pin.plan().with_region(region_for(i));
            }
            if i % 17 == 3 {
                pin = pin.draft();
            }
            pin
        })
        .collect()
}

fn region_for(i: usize) -> &'static str {
    const REGIONS: [&str; 4] = ["Jongno", "Jung", "Mapo", "Yongsan"];
    REGIONS[i % REGIONS.len()]
}
