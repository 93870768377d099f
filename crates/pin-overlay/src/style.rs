//! Style and asset resolution
//!
//! Pure functions mapping a pin's kind and badge state to an icon reference with fixed
//! geometry, and building the label and hitbox templates handed to the map provider.

use crate::{Pin, PinKind};

/// Fixed icon geometry in pixels, anchored at the bottom center (the pin tip)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconGeometry {
    pub width: f32,
    pub height: f32,
    /// Anchor offset from the icon's top-left corner
    pub anchor_x: f32,
    pub anchor_y: f32,
}

/// Geometry shared by every marker icon
pub const MARKER_GEOMETRY: IconGeometry = IconGeometry {
    width: 28.0,
    height: 36.0,
    anchor_x: 14.0,
    anchor_y: 36.0,
};

/// Icon decoration state, derived from the pin flags and the reservation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconBadge {
    Plain,
    Reserved,
    Plan,
    Draft,
}

impl IconBadge {
    /// Draft beats plan beats reserved
    pub fn for_pin(pin: &Pin, has_order: bool) -> Self {
        if pin.is_draft {
            Self::Draft
        } else if pin.is_plan {
            Self::Plan
        } else if has_order {
            Self::Reserved
        } else {
            Self::Plain
        }
    }
}

/// A resolved marker icon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconStyle {
    /// Asset reference, relative to the host's icon directory
    pub asset: &'static str,
    /// Fill color used by hosts that draw vector glyphs instead of assets
    pub color: [u8; 3],
    pub geometry: IconGeometry,
}

/// Resolve the icon for a kind and badge state
pub fn icon_for(kind: PinKind, badge: IconBadge) -> IconStyle {
    let (asset, color) = match badge {
        IconBadge::Draft => ("icons/draft.svg", [150, 150, 150]),
        IconBadge::Plan => ("icons/plan.svg", [46, 160, 67]),
        IconBadge::Reserved => (reserved_asset(kind), [230, 90, 40]),
        IconBadge::Plain => (plain_asset(kind), kind_color(kind)),
    };

    IconStyle {
        asset,
        color,
        geometry: MARKER_GEOMETRY,
    }
}

fn plain_asset(kind: PinKind) -> &'static str {
    match kind {
        PinKind::Apartment => "icons/apartment.svg",
        PinKind::Officetel => "icons/officetel.svg",
        PinKind::Villa => "icons/villa.svg",
        PinKind::House => "icons/house.svg",
        PinKind::Commercial => "icons/commercial.svg",
        PinKind::Land => "icons/land.svg",
    }
}

fn reserved_asset(kind: PinKind) -> &'static str {
    match kind {
        PinKind::Apartment => "icons/apartment-reserved.svg",
        PinKind::Officetel => "icons/officetel-reserved.svg",
        PinKind::Villa => "icons/villa-reserved.svg",
        PinKind::House => "icons/house-reserved.svg",
        PinKind::Commercial => "icons/commercial-reserved.svg",
        PinKind::Land => "icons/land-reserved.svg",
    }
}

fn kind_color(kind: PinKind) -> [u8; 3] {
    match kind {
        PinKind::Apartment => [52, 120, 246],
        PinKind::Officetel => [120, 80, 220],
        PinKind::Villa => [0, 150, 170],
        PinKind::House => [200, 140, 20],
        PinKind::Commercial => [210, 60, 120],
        PinKind::Land => [110, 130, 60],
    }
}

/// Visual template of a label: raw text, optional order badge and placement
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTemplate {
    pub text: String,
    pub badge: Option<u32>,
    /// Offset of the label's bottom edge above the pin tip, in pixels
    pub offset_y_px: f32,
}

impl LabelTemplate {
    /// Text as rendered, with the badge as a leading number
    pub fn rendered(&self) -> String {
        match self.badge {
            Some(order) => format!("{order} {}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Build a label template that sits `gap_px` above the icon
pub fn label_template(raw_text: &str, badge: Option<u32>, gap_px: f32) -> LabelTemplate {
    LabelTemplate {
        text: raw_text.to_string(),
        badge,
        offset_y_px: MARKER_GEOMETRY.height + gap_px,
    }
}

/// Visual template of an invisible click target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxTemplate {
    pub size_px: f32,
    /// Offset of the hitbox center above the pin tip, in pixels
    pub offset_y_px: f32,
}

/// Build a square hitbox centered on the icon body
pub fn hitbox_template(size_px: f32) -> HitboxTemplate {
    HitboxTemplate {
        size_px: size_px.max(MARKER_GEOMETRY.width),
        offset_y_px: MARKER_GEOMETRY.height / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_priority() {
        let pin = Pin::new("a", 37.5, 127.0).plan().draft();
        assert_eq!(IconBadge::for_pin(&pin, true), IconBadge::Draft);

        let pin = Pin::new("a", 37.5, 127.0).plan();
        assert_eq!(IconBadge::for_pin(&pin, true), IconBadge::Plan);

        let pin = Pin::new("a", 37.5, 127.0);
        assert_eq!(IconBadge::for_pin(&pin, true), IconBadge::Reserved);
        assert_eq!(IconBadge::for_pin(&pin, false), IconBadge::Plain);
    }

    #[test]
    fn test_icon_for_every_kind() {
        for &kind in PinKind::all() {
            let plain = icon_for(kind, IconBadge::Plain);
            let reserved = icon_for(kind, IconBadge::Reserved);
            assert!(plain.asset.contains(kind.name()));
            assert!(reserved.asset.ends_with("-reserved.svg"));
            assert_eq!(plain.geometry, MARKER_GEOMETRY);
        }
        assert_eq!(
            icon_for(PinKind::Land, IconBadge::Draft).asset,
            "icons/draft.svg"
        );
    }

    #[test]
    fn test_label_template_rendering() {
        let label = label_template("Gangnam 답사예정", Some(2), 4.0);
        assert_eq!(label.rendered(), "2 Gangnam 답사예정");
        assert_eq!(label.offset_y_px, MARKER_GEOMETRY.height + 4.0);

        let label = label_template("A", None, 0.0);
        assert_eq!(label.rendered(), "A");
    }

    #[test]
    fn test_hitbox_never_smaller_than_icon() {
        assert_eq!(hitbox_template(10.0).size_px, MARKER_GEOMETRY.width);
        assert_eq!(hitbox_template(44.0).size_px, 44.0);
    }
}
