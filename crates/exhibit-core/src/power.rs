//! Power toggle state.
//!
//! The exhibit's physical button emits a payload-free "toggle requested"
//! event. [`PowerState`] answers each one by flipping its `power_on` cell;
//! effects and indicators subscribe to the cell.

use std::sync::Arc;

use crate::cell::{ObservableCell, ReadOnlyCell};
use crate::logging::targets;
use crate::signal::{ConnectionGuard, Signal};

/// Application power state.
#[derive(Debug)]
pub struct PowerState {
    power_on: ObservableCell<bool>,
}

impl Default for PowerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerState {
    /// Create the state, powered off.
    pub fn new() -> Self {
        Self {
            power_on: ObservableCell::new(false),
        }
    }

    /// The power cell, for observers.
    pub fn power_on(&self) -> ReadOnlyCell<bool> {
        self.power_on.read_only()
    }

    /// Check whether power is currently on.
    pub fn is_on(&self) -> bool {
        self.power_on.get()
    }

    /// Flip the power state, notifying observers. Returns the new value.
    pub fn toggle(&self) -> bool {
        let on = self.power_on.update(|on| !on);
        tracing::debug!(target: targets::POWER, power_on = on, "power toggled");
        on
    }

    /// Toggle once for every emission of `toggle_requested`.
    ///
    /// The listener is removed when the returned guard is dropped.
    pub fn bind_toggle(self: &Arc<Self>, toggle_requested: &Signal<()>) -> ConnectionGuard<()> {
        let state = Arc::downgrade(self);
        toggle_requested.connect_scoped(move |_| {
            if let Some(state) = state.upgrade() {
                state.toggle();
            }
        })
    }

    /// Drop every observer. Called when the owner is torn down.
    pub fn dispose(&self) {
        self.power_on.dispose_all();
    }
}
