//! Event bridge: click callbacks, listener bookkeeping and the cross-instance signal bus

use crate::{
    ClusterInfo, ClustererAdapter, EventHandler, LatLng, ListenerId, MapProvider, MarkerHandle,
    OverlayEvent, PinId,
};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::broadcast;

type ClickCallback = Box<dyn FnMut(&str)>;

/// Mutable cell holding the outward click-by-id callback
///
/// Handlers registered on overlays hold a clone of the cell and dereference it when the
/// click arrives, so replacing the callback never requires re-registering listeners.
#[derive(Clone, Default)]
pub struct ClickCallbackCell {
    inner: Rc<RefCell<Option<ClickCallback>>>,
}

impl std::fmt::Debug for ClickCallbackCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickCallbackCell")
            .field("set", &self.is_set())
            .finish()
    }
}

impl ClickCallbackCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the callback; ignored when called from inside the running callback
    pub fn set(&self, callback: impl FnMut(&str) + 'static) {
        match self.inner.try_borrow_mut() {
            Ok(mut slot) => *slot = Some(Box::new(callback)),
            Err(_) => tracing::debug!("click callback replaced while running, ignored"),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.inner.try_borrow_mut() {
            slot.take();
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .try_borrow()
            .map(|callback| callback.is_some())
            .unwrap_or(true)
    }

    /// Call the current callback with a pin id
    ///
    /// Returns `false` when no callback is set or when called from inside the callback itself.
    pub fn invoke(&self, id: &str) -> bool {
        let Ok(mut slot) = self.inner.try_borrow_mut() else {
            tracing::debug!(id, "re-entrant click dropped");
            return false;
        };
        match slot.as_mut() {
            Some(callback) => {
                callback(id);
                true
            }
            None => false,
        }
    }
}

/// Listener for clicks on one pin's marker or hitbox
pub fn marker_click_handler(cell: ClickCallbackCell, id: PinId) -> EventHandler {
    Rc::new(move |event| {
        if matches!(event, OverlayEvent::Click) {
            cell.invoke(&id);
        }
    })
}

/// Listener for clicks on the cluster layer
///
/// Resolves a representative member through the reverse marker index; unresolvable clusters
/// are dropped silently.
pub fn cluster_click_handler(
    cell: ClickCallbackCell,
    reverse: Rc<RefCell<HashMap<MarkerHandle, PinId>>>,
) -> EventHandler {
    Rc::new(move |event| {
        let OverlayEvent::ClusterClick(cluster) = event else {
            return;
        };
        if let Some(id) = resolve_cluster(cluster, &reverse) {
            cell.invoke(&id);
        }
    })
}

fn resolve_cluster(
    cluster: &ClusterInfo,
    reverse: &RefCell<HashMap<MarkerHandle, PinId>>,
) -> Option<PinId> {
    let index = reverse.try_borrow().ok()?;
    let id = ClustererAdapter::representative(cluster, &index);
    if id.is_none() {
        tracing::debug!(members = cluster.members.len(), "cluster click unresolved");
    }
    id
}

/// Listener ids registered during the current scene
///
/// Registration and removal are paired: everything recorded here is removed on teardown.
#[derive(Debug, Clone, Default)]
pub struct ListenerLedger {
    per_pin: HashMap<PinId, SmallVec<[ListenerId; 2]>>,
    cluster: Option<ListenerId>,
}

impl ListenerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: &str, listener: ListenerId) {
        self.per_pin.entry(id.to_string()).or_default().push(listener);
    }

    pub fn set_cluster(&mut self, listener: ListenerId) {
        self.cluster = Some(listener);
    }

    pub fn has_cluster(&self) -> bool {
        self.cluster.is_some()
    }

    /// Listeners recorded for a pin
    pub fn for_pin(&self, id: &str) -> &[ListenerId] {
        self.per_pin.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        let per_pin: usize = self.per_pin.values().map(|v| v.len()).sum();
        per_pin + usize::from(self.cluster.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove one pin's listeners; provider failures are ignored
    pub fn remove_pin<P: MapProvider>(&mut self, provider: &mut P, id: &str) -> usize {
        let Some(listeners) = self.per_pin.remove(id) else {
            return 0;
        };
        remove_listeners(provider, listeners)
    }

    /// Remove every recorded listener; provider failures are ignored
    pub fn remove_all<P: MapProvider>(&mut self, provider: &mut P) -> usize {
        let listeners = self
            .per_pin
            .drain()
            .flat_map(|(_, v)| v)
            .chain(self.cluster.take());
        remove_listeners(provider, listeners)
    }
}

fn remove_listeners<P: MapProvider>(
    provider: &mut P,
    listeners: impl IntoIterator<Item = ListenerId>,
) -> usize {
    let mut removed = 0;
    for listener in listeners {
        match provider.remove_listener(listener) {
            Ok(()) => removed += 1,
            Err(err) => tracing::debug!(?listener, %err, "listener removal ignored"),
        }
    }
    removed
}

/// "Remove overlays near a coordinate" request shared between engine instances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoveNearSignal {
    pub position: LatLng,
    pub radius_m: f64,
}

/// Default number of signals buffered per subscriber
pub const DEFAULT_SIGNAL_CAPACITY: usize = 64;

/// Broadcast channel created by the application and injected into each engine
#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<RemoveNearSignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Ask every subscribed engine to drop draft overlays within `radius_m` of `position`
    ///
    /// Returns the number of subscribers that will see the signal.
    pub fn emit_remove_near(&self, position: LatLng, radius_m: f64) -> usize {
        self.sender
            .send(RemoveNearSignal { position, radius_m })
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> SignalSubscription {
        SignalSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One engine's end of the [`SignalBus`]
#[derive(Debug)]
pub struct SignalSubscription {
    receiver: broadcast::Receiver<RemoveNearSignal>,
}

impl SignalSubscription {
    /// Take every pending signal without blocking
    pub fn drain(&mut self) -> Vec<RemoveNearSignal> {
        let mut signals = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(signal) => signals.push(signal),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "signal subscriber lagged, oldest signals lost");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => break,
            }
        }
        signals
    }
}
