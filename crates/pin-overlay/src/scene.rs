//! Scene builder: desired overlay set and content-derived scene keys
//!
//! Every valid pin gets a marker. Labels are deduplicated geographically: at most one
//! visible label per position key, or per group of pins within the configured distance.
//! Pins whose label is suppressed get a hitbox instead. Plan pins are processed after
//! ordinary pins so they can reclaim a shared label that an ordinary pin took first.

use crate::{Config, LatLng, Pin, PinId, PinKind, PositionKey, ReservationOrder, utils};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Content-derived key of a pin list; the scene is rebuilt only when it changes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneKey(String);

impl SceneKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Display text of a pin's label, before any badge
///
/// Draft and plan pins get `"<region> <suffix>"`; ordinary pins use their title, falling back
/// to the id.
pub fn label_text(pin: &Pin, config: &Config) -> String {
    if pin.is_draft || pin.is_plan {
        return match pin.region_label.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => format!("{region} {}", config.plan_label_suffix),
            None => match pin.title.as_deref().filter(|t| !t.is_empty()) {
                Some(title) => format!("{title} {}", config.plan_label_suffix),
                None => config.plan_label_suffix.clone(),
            },
        };
    }

    match pin.title.as_deref().filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => pin.id.clone(),
    }
}

/// Sorted concatenation of `id:lat,lng:label` over all pins
///
/// Id and label are length-prefixed so separators inside them cannot alias another pin set.
pub fn scene_key(pins: &[Pin], config: &Config) -> SceneKey {
    #[cfg(feature = "profiling")]
    profiling::scope!("scene::scene_key");

    let mut entries: Vec<String> = pins
        .par_iter()
        .map(|pin| {
            let label = label_text(pin, config);
            format!(
                "{}#{}:{},{}:{}#{}",
                pin.id.len(),
                pin.id,
                pin.position.lat,
                pin.position.lng,
                label.len(),
                label
            )
        })
        .collect();
    entries.par_sort_unstable();

    SceneKey(entries.join("|"))
}

/// A pin as placed by the scene builder
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPin {
    pub pin: Pin,
    pub kind: PinKind,
    pub position_key: PositionKey,
    /// Raw label text, without badge
    pub label_text: String,
    /// Reservation priority, rendered as the label badge
    pub order: Option<u32>,
    pub selected: bool,
    /// Owns the visible label at its position
    pub has_label: bool,
    /// Gets an enlarged click target because its label is suppressed
    pub has_hitbox: bool,
}

impl PlannedPin {
    pub fn id(&self) -> &str {
        &self.pin.id
    }

    pub fn position(&self) -> LatLng {
        self.pin.position
    }
}

/// Output of [`build_scene`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenePlan {
    /// Planned pins in processing order (ordinary pins first, then plan pins)
    pub entries: Vec<PlannedPin>,
    /// Ids of malformed or duplicate pins left out of the scene
    pub skipped: Vec<PinId>,
}

impl ScenePlan {
    pub fn label_count(&self) -> usize {
        self.entries.iter().filter(|e| e.has_label).count()
    }

    pub fn hitbox_count(&self) -> usize {
        self.entries.iter().filter(|e| e.has_hitbox).count()
    }

    pub fn get(&self, id: &str) -> Option<&PlannedPin> {
        self.entries.iter().find(|e| e.pin.id == id)
    }
}

/// Spatial index over label owners: buckets by latitude band plus an exact key map
struct LabelOwners {
    band_size_deg: f64,
    bands: HashMap<i64, Vec<usize>>,
    by_key: HashMap<PositionKey, usize>,
}

impl LabelOwners {
    fn new(dedup_distance_m: f64) -> Self {
        Self {
            band_size_deg: (dedup_distance_m / utils::METERS_PER_DEGREE_LAT).max(1e-6),
            bands: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    fn band(&self, lat: f64) -> i64 {
        (lat / self.band_size_deg).floor() as i64
    }

    fn insert(&mut self, index: usize, entry: &PlannedPin) {
        let band = self.band(entry.pin.position.lat);
        self.bands.entry(band).or_default().push(index);
        self.by_key.insert(entry.position_key, index);
    }

    /// Current label owners conflicting with `candidate`
    fn conflicts(
        &self,
        entries: &[PlannedPin],
        candidate: &PlannedPin,
        dedup_distance_m: f64,
    ) -> Vec<usize> {
        let mut found: Vec<usize> = Vec::new();

        if let Some(&index) = self.by_key.get(&candidate.position_key)
            && entries[index].has_label
        {
            found.push(index);
        }

        if dedup_distance_m > 0.0 {
            let band = self.band(candidate.pin.position.lat);
            for neighbour in band - 1..=band + 1 {
                let Some(indices) = self.bands.get(&neighbour) else {
                    continue;
                };
                for &index in indices {
                    let owner = &entries[index];
                    if owner.has_label
                        && !found.contains(&index)
                        && owner.pin.position.distance_m(&candidate.pin.position)
                            <= dedup_distance_m
                    {
                        found.push(index);
                    }
                }
            }
        }

        found
    }
}

/// Compute the desired overlay set for a pin list
///
/// Malformed pins (empty id, non-finite or out-of-range coordinates), duplicate ids and ids
/// in `suppressed` are left out; the first two are reported in [`ScenePlan::skipped`].
pub fn build_scene(
    pins: &[Pin],
    order: &ReservationOrder,
    selection: Option<&str>,
    config: &Config,
    suppressed: &HashSet<PinId>,
) -> ScenePlan {
    #[cfg(feature = "profiling")]
    profiling::scope!("scene::build_scene");

    let mut skipped = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(pins.len());
    let mut valid: Vec<&Pin> = Vec::with_capacity(pins.len());

    for pin in pins {
        if !pin.is_valid() || !seen.insert(pin.id.as_str()) {
            skipped.push(pin.id.clone());
            continue;
        }
        if suppressed.contains(&pin.id) {
            continue;
        }
        valid.push(pin);
    }

    // Ordinary pins first so plan pins can evict the labels they created
    valid.sort_by_key(|pin| pin.is_plan);

    let mut entries: Vec<PlannedPin> = Vec::with_capacity(valid.len());
    let mut owners = LabelOwners::new(config.label_dedup_distance_m);

    for pin in valid {
        let position_key = pin.position_key(config.position_key_precision);
        let mut entry = PlannedPin {
            pin: pin.clone(),
            kind: pin.kind.unwrap_or(config.default_kind),
            position_key,
            label_text: label_text(pin, config),
            order: order.lookup(&pin.id, &position_key),
            selected: selection == Some(pin.id.as_str()),
            has_label: false,
            has_hitbox: false,
        };

        let conflicts = owners.conflicts(&entries, &entry, config.label_dedup_distance_m);
        let reclaims = pin.is_plan && conflicts.iter().all(|&i| !entries[i].pin.is_plan);

        if conflicts.is_empty() || reclaims {
            for index in conflicts {
                let evicted = &mut entries[index];
                evicted.has_label = false;
                evicted.has_hitbox = true;
                tracing::trace!(
                    "Plan pin {} reclaims the label of {}",
                    pin.id,
                    evicted.pin.id
                );
            }
            entry.has_label = true;
            let index = entries.len();
            owners.insert(index, &entry);
        } else {
            entry.has_hitbox = true;
        }

        entries.push(entry);
    }

    ScenePlan { entries, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_suppression() -> HashSet<PinId> {
        HashSet::new()
    }

    #[test]
    fn test_label_text_variants() {
        let config = Config::default();

        let pin = Pin::new("a", 37.5, 127.0).with_title("A");
        assert_eq!(label_text(&pin, &config), "A");

        let pin = Pin::new("a", 37.5, 127.0);
        assert_eq!(label_text(&pin, &config), "a");

        let pin = Pin::new("b", 37.5, 127.0).plan().with_region("Gangnam");
        assert_eq!(label_text(&pin, &config), "Gangnam 답사예정");

        let pin = Pin::new("c", 37.5, 127.0).draft().with_title("Lot 7");
        assert_eq!(label_text(&pin, &config), "Lot 7 답사예정");

        let pin = Pin::new("d", 37.5, 127.0).draft();
        assert_eq!(label_text(&pin, &config), "답사예정");
    }

    #[test]
    fn test_scene_key_is_order_independent() {
        let config = Config::default();
        let a = Pin::new("a", 37.5, 127.0).with_title("A");
        let b = Pin::new("b", 37.6, 127.1).with_title("B");

        let k1 = scene_key(&[a.clone(), b.clone()], &config);
        let k2 = scene_key(&[b.clone(), a.clone()], &config);
        assert_eq!(k1, k2);

        let moved = Pin::new("b", 37.61, 127.1).with_title("B");
        assert_ne!(k1, scene_key(&[a.clone(), moved], &config));

        let renamed = Pin::new("b", 37.6, 127.1).with_title("B2");
        assert_ne!(k1, scene_key(&[a, renamed], &config));
    }

    #[test]
    fn test_scene_key_separators_in_text() {
        let config = Config::default();
        let merged = [Pin::new("a", 37.5, 127.0).with_title("A|b:37.6,127.1:B")];
        let split = [
            Pin::new("a", 37.5, 127.0).with_title("A"),
            Pin::new("b", 37.6, 127.1).with_title("B"),
        ];
        assert_ne!(scene_key(&merged, &config), scene_key(&split, &config));

        let odd_id = [Pin::new("a:1", 37.5, 127.0).with_title("x")];
        let odd_title = [Pin::new("a", 37.5, 127.0).with_title("1:x")];
        assert_ne!(scene_key(&odd_id, &config), scene_key(&odd_title, &config));
    }

    #[test]
    fn test_scene_key_empty() {
        assert_eq!(scene_key(&[], &Config::default()).as_str(), "");
    }

    #[test]
    fn test_every_valid_pin_gets_an_entry() {
        let pins: Vec<Pin> = (0..10)
            .map(|i| Pin::new(format!("p{i}"), 37.5 + i as f64 * 0.01, 127.0))
            .collect();
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &no_suppression(),
        );

        assert_eq!(plan.entries.len(), 10);
        assert_eq!(plan.label_count(), 10);
        assert_eq!(plan.hitbox_count(), 0);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_plan_pin_reclaims_shared_label() {
        let pins = vec![
            Pin::new("b", 37.5, 127.0).plan().with_region("Gangnam"),
            Pin::new("a", 37.5, 127.0).with_title("A"),
        ];
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &no_suppression(),
        );

        // Processing order puts the ordinary pin first
        assert_eq!(plan.entries[0].id(), "a");
        assert_eq!(plan.entries[1].id(), "b");

        let a = plan.get("a").unwrap();
        let b = plan.get("b").unwrap();
        assert!(!a.has_label && a.has_hitbox);
        assert!(b.has_label && !b.has_hitbox);
        assert_eq!(b.label_text, "Gangnam 답사예정");
    }

    #[test]
    fn test_first_ordinary_pin_keeps_label() {
        let pins = vec![
            Pin::new("a", 37.5, 127.0).with_title("A"),
            Pin::new("b", 37.5, 127.0).with_title("B"),
        ];
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &no_suppression(),
        );

        assert!(plan.get("a").unwrap().has_label);
        assert!(plan.get("b").unwrap().has_hitbox);
        assert_eq!(plan.label_count(), 1);
    }

    #[test]
    fn test_distance_threshold_dedup() {
        let config = Config::default();
        // ~11 m apart: different position keys but inside the 20 m threshold
        let pins = vec![
            Pin::new("a", 37.5, 127.0),
            Pin::new("b", 37.5001, 127.0),
            // ~111 m away: independent label
            Pin::new("c", 37.501, 127.0),
        ];
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &config,
            &no_suppression(),
        );

        assert_ne!(
            plan.get("a").unwrap().position_key,
            plan.get("b").unwrap().position_key
        );
        assert!(plan.get("a").unwrap().has_label);
        assert!(plan.get("b").unwrap().has_hitbox);
        assert!(plan.get("c").unwrap().has_label);
    }

    #[test]
    fn test_zero_distance_uses_key_only() {
        let config = Config {
            label_dedup_distance_m: 0.0,
            ..Config::default()
        };
        let pins = vec![
            Pin::new("a", 37.5, 127.0),
            Pin::new("b", 37.5001, 127.0),
            Pin::new("c", 37.500001, 127.0),
        ];
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &config,
            &no_suppression(),
        );

        assert!(plan.get("a").unwrap().has_label);
        assert!(plan.get("b").unwrap().has_label);
        assert!(plan.get("c").unwrap().has_hitbox);
    }

    #[test]
    fn test_plan_pins_do_not_evict_each_other() {
        let pins = vec![
            Pin::new("p1", 37.5, 127.0).plan().with_region("North"),
            Pin::new("p2", 37.5, 127.0).plan().with_region("South"),
        ];
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &no_suppression(),
        );

        assert!(plan.get("p1").unwrap().has_label);
        assert!(plan.get("p2").unwrap().has_hitbox);
    }

    #[test]
    fn test_plan_pin_evicts_every_nearby_owner() {
        let pins = vec![
            Pin::new("a", 37.5, 127.0),
            Pin::new("b", 37.50015, 127.0),
            Pin::new("p", 37.500075, 127.0).plan(),
        ];
        let config = Config {
            label_dedup_distance_m: 10.0,
            ..Config::default()
        };
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &config,
            &no_suppression(),
        );

        // a and b are ~16.7 m apart so both own labels until the plan pin sits between them
        assert!(plan.get("p").unwrap().has_label);
        assert!(plan.get("a").unwrap().has_hitbox);
        assert!(plan.get("b").unwrap().has_hitbox);
        assert_eq!(plan.label_count(), 1);
    }

    #[test]
    fn test_malformed_and_duplicate_pins_are_skipped() {
        let pins = vec![
            Pin::new("a", 37.5, 127.0),
            Pin::new("bad", f64::NAN, 127.0),
            Pin::new("", 37.5, 127.0),
            Pin::new("a", 37.6, 127.0),
        ];
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &no_suppression(),
        );

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.skipped, vec!["bad".to_string(), String::new(), "a".to_string()]);
    }

    #[test]
    fn test_suppressed_pins_are_left_out_silently() {
        let pins = vec![Pin::new("a", 37.5, 127.0), Pin::new("d", 37.6, 127.0).draft()];
        let suppressed: HashSet<PinId> = ["d".to_string()].into_iter().collect();
        let plan = build_scene(
            &pins,
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &suppressed,
        );

        assert_eq!(plan.entries.len(), 1);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_order_and_selection_decorations() {
        let pins = vec![Pin::new("a", 37.5, 127.0), Pin::new("b", 37.6, 127.0)];
        let order: ReservationOrder = [("a".to_string(), 2)].into_iter().collect();
        let plan = build_scene(&pins, &order, Some("b"), &Config::default(), &no_suppression());

        assert_eq!(plan.get("a").unwrap().order, Some(2));
        assert_eq!(plan.get("b").unwrap().order, None);
        assert!(plan.get("b").unwrap().selected);
        assert!(!plan.get("a").unwrap().selected);
    }

    #[test]
    fn test_empty_pin_list() {
        let plan = build_scene(
            &[],
            &ReservationOrder::new(),
            None,
            &Config::default(),
            &no_suppression(),
        );
        assert!(plan.entries.is_empty());
        assert!(plan.skipped.is_empty());
    }
}
