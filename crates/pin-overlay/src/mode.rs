//! Display mode classification and per-overlay placement decisions

use crate::Config;

/// Viewport display mode
///
/// - `Label`: every marker attached with its label or hitbox
/// - `Transitional`: bare icons plus hitboxes, no labels and no clustering
/// - `Cluster`: markers handed to the clusterer, no labels or hitboxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Label,
    Transitional,
    Cluster,
}

impl Mode {
    /// Classify a map level (larger = farther)
    ///
    /// Monotonic in `level`: `Label` up to [`Config::safe_label_max`], `Cluster` from
    /// `cluster_min_level`, `Transitional` in between.
    pub fn classify(level: i32, config: &Config) -> Self {
        if level >= config.cluster_min_level {
            Self::Cluster
        } else if level <= config.safe_label_max() {
            Self::Label
        } else {
            Self::Transitional
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Label => "Label",
            Self::Transitional => "Transitional",
            Self::Cluster => "Cluster",
        }
    }

    /// Whether the clusterer owns the non-excluded markers
    #[inline]
    pub fn clusters(&self) -> bool {
        matches!(self, Self::Cluster)
    }
}

/// Where a marker is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerPlacement {
    /// Attached directly to the map
    Direct,
    /// Owned by the clusterer
    Clustered,
}

/// Desired attach state of one pin's overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub marker: MarkerPlacement,
    pub label: bool,
    pub hitbox: bool,
    /// Marker stacks above the cluster layer and every ordered marker
    pub elevated: bool,
}

/// Decide the placement of a pin's overlays
///
/// The selected pin never shows its label or hitbox and is never clustered. Draft pins are
/// excluded from clustering as well and are lifted above the cluster layer in cluster mode.
pub fn placement(
    mode: Mode,
    selected: bool,
    is_draft: bool,
    has_label: bool,
    has_hitbox: bool,
) -> Placement {
    match mode {
        Mode::Label => Placement {
            marker: MarkerPlacement::Direct,
            label: has_label && !selected,
            hitbox: has_hitbox && !selected,
            elevated: selected,
        },
        Mode::Transitional => Placement {
            marker: MarkerPlacement::Direct,
            label: false,
            hitbox: has_hitbox && !selected,
            elevated: selected,
        },
        Mode::Cluster => {
            let excluded = selected || is_draft;
            Placement {
                marker: if excluded {
                    MarkerPlacement::Direct
                } else {
                    MarkerPlacement::Clustered
                },
                label: false,
                hitbox: false,
                elevated: excluded,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_partition() {
        let config = Config::default();
        assert_eq!(Mode::classify(1, &config), Mode::Label);
        assert_eq!(Mode::classify(4, &config), Mode::Label);
        assert_eq!(Mode::classify(5, &config), Mode::Transitional);
        assert_eq!(Mode::classify(6, &config), Mode::Cluster);
        assert_eq!(Mode::classify(14, &config), Mode::Cluster);
    }

    #[test]
    fn test_classify_is_monotonic_even_when_misconfigured() {
        let configs = [
            Config::default(),
            Config {
                label_max_level: 10,
                cluster_min_level: 6,
                ..Config::default()
            },
            Config {
                label_max_level: 6,
                cluster_min_level: 6,
                ..Config::default()
            },
            Config {
                label_max_level: -3,
                cluster_min_level: 2,
                ..Config::default()
            },
        ];

        let rank = |mode: Mode| match mode {
            Mode::Label => 0,
            Mode::Transitional => 1,
            Mode::Cluster => 2,
        };

        for config in &configs {
            assert!(config.safe_label_max() < config.cluster_min_level);
            let mut previous = 0;
            for level in -5..=20 {
                let current = rank(Mode::classify(level, config));
                assert!(current >= previous, "non-monotonic at level {level}");
                previous = current;
            }
        }
    }

    #[test]
    fn test_misconfigured_levels_have_no_label_overlap() {
        let config = Config {
            label_max_level: 8,
            cluster_min_level: 6,
            ..Config::default()
        };
        assert_eq!(Mode::classify(5, &config), Mode::Label);
        assert_eq!(Mode::classify(6, &config), Mode::Cluster);
    }

    #[test]
    fn test_selected_pin_never_shows_label_or_hitbox() {
        for mode in [Mode::Label, Mode::Transitional, Mode::Cluster] {
            for is_draft in [false, true] {
                let p = placement(mode, true, is_draft, true, true);
                assert!(!p.label);
                assert!(!p.hitbox);
                assert_eq!(p.marker, MarkerPlacement::Direct);
                assert!(p.elevated);
            }
        }
    }

    #[test]
    fn test_label_mode_placement() {
        let p = placement(Mode::Label, false, false, true, false);
        assert_eq!(p.marker, MarkerPlacement::Direct);
        assert!(p.label);
        assert!(!p.hitbox);
        assert!(!p.elevated);

        let p = placement(Mode::Label, false, false, false, true);
        assert!(p.hitbox);
    }

    #[test]
    fn test_transitional_mode_detaches_labels_only() {
        let p = placement(Mode::Transitional, false, false, true, false);
        assert!(!p.label);
        assert_eq!(p.marker, MarkerPlacement::Direct);

        let p = placement(Mode::Transitional, false, true, false, true);
        assert!(p.hitbox);
        assert!(!p.elevated);
    }

    #[test]
    fn test_cluster_mode_excludes_drafts() {
        let p = placement(Mode::Cluster, false, false, true, true);
        assert_eq!(p.marker, MarkerPlacement::Clustered);
        assert!(!p.label && !p.hitbox && !p.elevated);

        let p = placement(Mode::Cluster, false, true, true, true);
        assert_eq!(p.marker, MarkerPlacement::Direct);
        assert!(p.elevated);
    }
}
