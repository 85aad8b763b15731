//! Signal/slot system for Horizon Grid.
//!
//! This module provides a type-safe, observer-style signal mechanism used by
//! the grid engine to report state transitions (edit activation, tree
//! expansion, sort changes, ...) to whoever is hosting it.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionType`] - How a slot should be invoked (Direct or Queued)
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Connection Types
//!
//! - **Direct**: Slot is called immediately inside `emit`
//! - **Queued**: Slot invocation is held until [`Signal::flush_queued`] runs,
//!   which the grid does once per settle pass
//!
//! The grid engine is driven from a single host update cycle, so there is no
//! cross-thread delivery here. Signals are still `Send + Sync` so a grid can be
//! moved between threads or shared behind a lock.
//!
//! # Example
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let text_changed = Signal::<String>::new();
//!
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! text_changed.emit("Hello, World!".to_string());
//! text_changed.disconnect(conn_id);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

/// Specifies how a connected slot should be invoked when the signal is emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionType {
    /// Invoke the slot immediately, inside `emit`.
    #[default]
    Direct,

    /// Hold the invocation until [`Signal::flush_queued`] is called.
    ///
    /// Useful for observers that must not run in the middle of a state
    /// transition, e.g. a view that reads derived indices which are only
    /// consistent once the whole operation has finished.
    Queued,
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// Internal storage for a single connection.
struct Connection<Args> {
    slot: Slot<Args>,
    connection_type: ConnectionType,
}

type ConnectionMap<Args> = Mutex<SlotMap<ConnectionId, Connection<Args>>>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(String, i32)` for multiple arguments.
pub struct Signal<Args> {
    /// All active connections.
    connections: Arc<ConnectionMap<Args>>,
    /// Invocations waiting for the next flush.
    pending: Mutex<Vec<(Slot<Args>, Args)>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Arc::new(Mutex::new(SlotMap::with_key())),
            pending: Mutex::new(Vec::new()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal with [`ConnectionType::Direct`].
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connect_with_type(slot, ConnectionType::Direct)
    }

    /// Connect a slot with a specific connection type.
    ///
    /// # Example
    ///
    /// ```
    /// use horizon_grid_core::{ConnectionType, Signal};
    ///
    /// let signal = Signal::<i32>::new();
    /// signal.connect_with_type(|n| println!("{}", n), ConnectionType::Queued);
    ///
    /// signal.emit(42);
    /// assert_eq!(signal.flush_queued(), 1);
    /// ```
    pub fn connect_with_type<F>(&self, slot: F, connection_type: ConnectionType) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let connection = Connection {
            slot: Arc::new(slot),
            connection_type,
        };
        self.connections.lock().insert(connection)
    }

    /// Connect a slot with automatic disconnection when the guard is dropped.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            connections: Arc::downgrade(&self.connections),
            id,
        }
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
        self.pending.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing. This is useful
    /// during batch updates to prevent cascading notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots.
    ///
    /// Direct slots run before this returns; queued slots are recorded and
    /// run by the next [`flush_queued`](Self::flush_queued). Slots are called
    /// outside the connection lock, so a slot may connect or disconnect.
    #[tracing::instrument(skip_all, target = "horizon_grid_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let (direct, queued): (Vec<_>, Vec<_>) = {
            let connections = self.connections.lock();
            tracing::trace!(
                target: targets::SIGNAL,
                connection_count = connections.len(),
                "emitting signal"
            );
            connections
                .values()
                .map(|conn| (conn.slot.clone(), conn.connection_type))
                .partition(|(_, ty)| *ty == ConnectionType::Direct)
        };

        if !queued.is_empty() {
            let mut pending = self.pending.lock();
            for (slot, _) in queued {
                pending.push((slot, args.clone()));
            }
        }

        for (slot, _) in direct {
            slot(&args);
        }
    }

    /// Run every queued invocation recorded since the last flush.
    ///
    /// Returns the number of slots invoked.
    pub fn flush_queued(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let count = pending.len();
        for (slot, args) in pending {
            slot(&args);
        }
        if count > 0 {
            tracing::trace!(target: targets::SIGNAL, count, "flushed queued slots");
        }
        count
    }

    /// Number of queued invocations waiting for a flush.
    pub fn queued_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]. The guard does not keep the signal
/// alive; dropping it after the signal is gone is a no-op.
///
/// # Example
///
/// ```
/// use horizon_grid_core::Signal;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let signal = Signal::<i32>::new();
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42);
/// }
/// signal.emit(43);
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<Args> {
    connections: Weak<ConnectionMap<Args>>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<Args> {
    /// The connection this guard owns.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(connections) = self.connections.upgrade() {
            connections.lock().remove(self.id);
        }
    }
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_signal_basic() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(AtomicUsize::new(0));
        let r = received.clone();
        signal.connect(move |&n| {
            r.fetch_add(n as usize, Ordering::SeqCst);
        });

        signal.emit(5);
        signal.emit(7);
        assert_eq!(received.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(());
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_signal_blocked() {
        let signal = Signal::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        signal.connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        signal.set_blocked(true);
        signal.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        signal.set_blocked(false);
        signal.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_runs_on_flush() {
        let signal = Signal::<String>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        signal.connect_with_type(move |v: &String| s.lock().push(v.clone()), ConnectionType::Queued);

        signal.emit("a".into());
        signal.emit("b".into());
        assert!(seen.lock().is_empty());
        assert_eq!(signal.queued_count(), 2);

        assert_eq!(signal.flush_queued(), 2);
        assert_eq!(*seen.lock(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(signal.flush_queued(), 0);
    }

    #[test]
    fn test_scoped_guard_disconnects() {
        let signal = Signal::<()>::new();
        {
            let _guard = signal.connect_scoped(|_| {});
            assert_eq!(signal.connection_count(), 1);
        }
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_slot_may_disconnect_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let weak = Arc::downgrade(&signal);
        let id = Arc::new(Mutex::new(None));
        let id_slot = id.clone();
        let conn = signal.connect(move |_| {
            if let (Some(sig), Some(id)) = (weak.upgrade(), *id_slot.lock()) {
                sig.disconnect(id);
            }
        });
        *id.lock() = Some(conn);

        signal.emit(());
        assert_eq!(signal.connection_count(), 0);
    }
}
