//! Sidebar visibility flags and the layout bus.
//!
//! Every flag mutation publishes [`LayoutEvent::Resize`] on the
//! [`LayoutBus`] so listeners that size themselves against the sidebar can
//! re-measure. The flags are not persisted.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Layout bus
// ---------------------------------------------------------------------------

/// Signals broadcast to layout listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutEvent {
    /// The available viewport changed; re-measure.
    Resize,
}

/// Broadcast channel for [`LayoutEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LayoutBus {
    sender: Arc<broadcast::Sender<LayoutEvent>>,
}

impl LayoutBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Broadcast `event`, returning how many subscribers will see it.
    ///
    /// Having no subscribers is normal (nothing is laid out yet) and yields 0.
    pub fn publish(&self, event: LayoutEvent) -> usize {
        match self.sender.send(event) {
            Ok(n) => {
                tracing::trace!(receivers = n, ?event, "layout event published");
                n
            }
            Err(_) => 0,
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LayoutEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Sidebar visibility, including the not-yet-decided state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SidebarVisibility {
    /// Never set; the layout picks a responsive default. Falsy.
    #[default]
    Unset,
    Shown,
    Hidden,
}

impl SidebarVisibility {
    /// Whether the sidebar counts as visible. `Unset` does not.
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Shown)
    }

    /// Logical negation; `Unset` collapses to `Shown`.
    #[must_use]
    pub fn toggled(self) -> Self {
        Self::from(!self.is_visible())
    }
}

impl From<bool> for SidebarVisibility {
    fn from(visible: bool) -> Self {
        if visible { Self::Shown } else { Self::Hidden }
    }
}

/// The UI flag state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiFlags {
    pub sidebar_visible: SidebarVisibility,
    pub sidebar_unfoldable: bool,
}

/// Owner of [`UiFlags`].
pub struct UiStore {
    flags: RwLock<UiFlags>,
    bus: LayoutBus,
}

impl UiStore {
    /// Create default flags publishing on `bus`.
    pub fn new(bus: LayoutBus) -> Self {
        Self {
            flags: RwLock::new(UiFlags::default()),
            bus,
        }
    }

    /// Snapshot of the flags.
    pub fn flags(&self) -> UiFlags {
        *self.flags.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe to resize signals.
    pub fn subscribe(&self) -> broadcast::Receiver<LayoutEvent> {
        self.bus.subscribe()
    }

    /// Negate `sidebar_visible`, returning the new value.
    pub fn toggle_sidebar(&self) -> SidebarVisibility {
        self.mutate(|flags| {
            flags.sidebar_visible = flags.sidebar_visible.toggled();
            flags.sidebar_visible
        })
    }

    /// Flip `sidebar_unfoldable`, returning the new value.
    pub fn toggle_unfoldable(&self) -> bool {
        self.mutate(|flags| {
            flags.sidebar_unfoldable = !flags.sidebar_unfoldable;
            flags.sidebar_unfoldable
        })
    }

    /// Set `sidebar_visible` explicitly.
    pub fn set_sidebar_visible(&self, visible: bool) {
        self.mutate(|flags| flags.sidebar_visible = SidebarVisibility::from(visible));
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut UiFlags) -> T) -> T {
        let out = {
            let mut flags = self
                .flags
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            apply(&mut flags)
        };
        self.bus.publish(LayoutEvent::Resize);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
