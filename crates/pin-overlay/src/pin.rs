//! Pin input model and position keys

use crate::utils;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable pin identity used for overlay reuse across rebuilds
pub type PinId = String;

/// Geographic coordinate in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components finite and inside the WGS84 ranges
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in meters
    #[inline]
    pub fn distance_m(&self, other: &LatLng) -> f64 {
        utils::haversine_distance(self.lat, self.lng, other.lat, other.lng)
    }
}

impl From<LatLng> for geo::Point<f64> {
    fn from(value: LatLng) -> Self {
        geo::Point::new(value.lng, value.lat)
    }
}

impl From<geo::Point<f64>> for LatLng {
    fn from(value: geo::Point<f64>) -> Self {
        Self::new(value.y(), value.x())
    }
}

/// Semantic property kind, resolved to an icon by [`crate::style`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PinKind {
    #[default]
    Apartment,
    Officetel,
    Villa,
    House,
    Commercial,
    Land,
}

impl PinKind {
    pub fn all() -> &'static [Self] {
        &[
            Self::Apartment,
            Self::Officetel,
            Self::Villa,
            Self::House,
            Self::Commercial,
            Self::Land,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::Officetel => "officetel",
            Self::Villa => "villa",
            Self::House => "house",
            Self::Commercial => "commercial",
            Self::Land => "land",
        }
    }
}

/// A point entity to render on the map
///
/// Owned by the host application; the engine only reads it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Pin {
    pub id: PinId,
    pub position: LatLng,
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: Option<PinKind>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_draft: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_plan: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub region_label: Option<String>,
}

impl Pin {
    /// Create an ordinary pin
    pub fn new(id: impl Into<PinId>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            position: LatLng::new(lat, lng),
            title: None,
            kind: None,
            is_draft: false,
            is_plan: false,
            region_label: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_kind(mut self, kind: PinKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region_label = Some(region.into());
        self
    }

    /// Mark as a draft (not yet persisted) visit site
    pub fn draft(mut self) -> Self {
        self.is_draft = true;
        self
    }

    /// Mark as a planned visit
    pub fn plan(mut self) -> Self {
        self.is_plan = true;
        self
    }

    /// Whether the pin can take part in scene construction
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.position.is_valid()
    }

    /// Rounded-coordinate bucket used for label deduplication
    #[inline]
    pub fn position_key(&self, precision: u32) -> PositionKey {
        PositionKey::new(self.position, precision)
    }
}

/// Rounded-coordinate bucket: pins with equal keys are "at the same place"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    lat: i64,
    lng: i64,
    precision: u32,
}

impl PositionKey {
    /// Round a coordinate to `precision` decimal places
    pub fn new(position: LatLng, precision: u32) -> Self {
        let scale = 10f64.powi(precision as i32);
        Self {
            lat: (position.lat * scale).round() as i64,
            lng: (position.lng * scale).round() as i64,
            precision,
        }
    }
}

impl fmt::Display for PositionKey {
    /// Formats as `"lat,lng"` with the key's precision, the form used in reservation maps
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10f64.powi(self.precision as i32);
        let precision = self.precision as usize;
        write!(
            f,
            "{:.precision$},{:.precision$}",
            self.lat as f64 / scale,
            self.lng as f64 / scale
        )
    }
}
