//! Clusterer adapter: hands markers to the provider's clusterer with an exclusion list

use crate::badge::ELEVATED_Z_INDEX;
use crate::{ClusterInfo, MapProvider, MarkerHandle, PinId, ProviderResult};
use std::collections::{HashMap, HashSet};

/// Outcome of a [`ClustererAdapter::mount`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountSummary {
    /// Markers handed to the clusterer
    pub pooled: usize,
    /// Markers attached individually above the cluster layer
    pub excluded: usize,
}

/// Wraps the provider's clustering primitive
///
/// Excluded markers (the selected pin, draft pins) never enter the pool; they stay attached
/// directly with a stacking value above every cluster glyph.
#[derive(Debug, Clone, Default)]
pub struct ClustererAdapter {
    mounted: bool,
    pooled: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClustererAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Markers in the pool after the last mount
    pub fn pooled(&self) -> usize {
        self.pooled
    }

    /// Regroup `markers`, leaving out the ids in `excluding`
    pub fn mount<P: MapProvider>(
        &mut self,
        provider: &mut P,
        markers: &[(&str, MarkerHandle)],
        excluding: &HashSet<&str>,
    ) -> ProviderResult<MountSummary> {
        provider.clusterer_clear()?;
        self.pooled = 0;

        let (excluded, pool): (Vec<_>, Vec<_>) = markers
            .iter()
            .partition(|(id, _)| excluding.contains(id));
        let pool: Vec<MarkerHandle> = pool.into_iter().map(|(_, h)| h).collect();

        for handle in &pool {
            provider.set_attached((*handle).into(), false)?;
        }
        provider.clusterer_add(&pool)?;
        self.pooled = pool.len();

        for (_, handle) in &excluded {
            provider.set_attached((*handle).into(), true)?;
            provider.set_z_index((*handle).into(), ELEVATED_Z_INDEX)?;
        }

        provider.set_clusterer_attached(true)?;
        self.mounted = true;

        tracing::trace!(
            pooled = pool.len(),
            excluded = excluded.len(),
            "clusterer mounted"
        );
        Ok(MountSummary {
            pooled: pool.len(),
            excluded: excluded.len(),
        })
    }

    /// Empty the pool and hide the cluster layer
    ///
    /// Previously pooled markers are left detached.
    pub fn unmount<P: MapProvider>(&mut self, provider: &mut P) -> ProviderResult<()> {
        if !self.mounted {
            return Ok(());
        }
        self.mounted = false;
        self.pooled = 0;
        provider.clusterer_clear()?;
        provider.set_clusterer_attached(false)
    }

    /// Pick the pin a cluster click selects
    ///
    /// The representative is the first member with a known pin id; `None` when no member
    /// resolves.
    pub fn representative(
        cluster: &ClusterInfo,
        reverse: &HashMap<MarkerHandle, PinId>,
    ) -> Option<PinId> {
        cluster
            .members
            .iter()
            .find_map(|handle| reverse.get(handle).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{self, IconBadge};
    use crate::{LatLng, MarkerSpec, MemoryProvider, PinKind};

    fn create(provider: &mut MemoryProvider, n: usize) -> Vec<MarkerHandle> {
        (0..n)
            .map(|i| {
                provider
                    .create_marker(MarkerSpec {
                        position: LatLng::new(37.5 + i as f64 * 0.01, 127.0),
                        icon: style::icon_for(PinKind::Villa, IconBadge::Plain),
                        z_index: 1,
                        title: format!("p{i}"),
                    })
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_mount_excludes_and_elevates() {
        let mut provider = MemoryProvider::new();
        let handles = create(&mut provider, 4);
        let ids = ["a", "b", "c", "d"];
        let markers: Vec<(&str, MarkerHandle)> =
            ids.iter().copied().zip(handles.iter().copied()).collect();

        let excluding: HashSet<&str> = ["b", "d"].into_iter().collect();
        let mut adapter = ClustererAdapter::new();
        let summary = adapter
            .mount(&mut provider, &markers, &excluding)
            .unwrap();

        assert_eq!(summary, MountSummary { pooled: 2, excluded: 2 });
        assert!(adapter.is_mounted());
        assert!(provider.is_clusterer_attached());
        assert_eq!(provider.cluster_pool().len(), 2);
        assert!(provider.cluster_pool().contains(&handles[0]));
        assert!(!provider.cluster_pool().contains(&handles[1]));

        let b = provider.marker(handles[1]).unwrap();
        assert!(b.attached);
        assert_eq!(b.z_index, ELEVATED_Z_INDEX);
        assert!(!provider.marker(handles[0]).unwrap().attached);
    }

    #[test]
    fn test_remount_replaces_pool() {
        let mut provider = MemoryProvider::new();
        let handles = create(&mut provider, 3);
        let markers: Vec<(&str, MarkerHandle)> = vec![
            ("a", handles[0]),
            ("b", handles[1]),
            ("c", handles[2]),
        ];

        let mut adapter = ClustererAdapter::new();
        adapter
            .mount(&mut provider, &markers, &HashSet::new())
            .unwrap();
        assert_eq!(provider.cluster_pool().len(), 3);

        let excluding: HashSet<&str> = ["a"].into_iter().collect();
        adapter.mount(&mut provider, &markers, &excluding).unwrap();
        assert_eq!(provider.cluster_pool().len(), 2);
        assert_eq!(adapter.pooled(), 2);
    }

    #[test]
    fn test_unmount() {
        let mut provider = MemoryProvider::new();
        let handles = create(&mut provider, 2);
        let markers = vec![("a", handles[0]), ("b", handles[1])];

        let mut adapter = ClustererAdapter::new();
        adapter
            .mount(&mut provider, &markers, &HashSet::new())
            .unwrap();
        adapter.unmount(&mut provider).unwrap();

        assert!(!adapter.is_mounted());
        assert!(!provider.is_clusterer_attached());
        assert!(provider.cluster_pool().is_empty());

        // Unmounting twice is a no-op
        adapter.unmount(&mut provider).unwrap();
    }

    #[test]
    fn test_representative_resolution() {
        let reverse: HashMap<MarkerHandle, PinId> = [
            (MarkerHandle(2), "b".to_string()),
            (MarkerHandle(3), "c".to_string()),
        ]
        .into_iter()
        .collect();

        let cluster = ClusterInfo {
            members: vec![MarkerHandle(9), MarkerHandle(3), MarkerHandle(2)],
            center: LatLng::new(37.5, 127.0),
        };
        assert_eq!(
            ClustererAdapter::representative(&cluster, &reverse),
            Some("c".to_string())
        );

        let unknown = ClusterInfo {
            members: vec![MarkerHandle(42)],
            center: LatLng::new(37.5, 127.0),
        };
        assert_eq!(ClustererAdapter::representative(&unknown, &reverse), None);
    }
}
