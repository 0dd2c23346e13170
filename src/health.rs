//! Liveness and readiness tracking.
//!
//! ```text
//! NotReady ──(config loaded + route table built)──► Ready
//!     │                                               │
//!     └──────────────────► Stopping ◄─────────────────┘
//! ```
//!
//! `Stopping` is terminal and the reporter never returns to `NotReady`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::routing::RouteTable;

/// Serving state published by [`HealthReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    NotReady,
    Ready,
    Stopping,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::NotReady => "not_ready",
            HealthState::Ready => "ready",
            HealthState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: watch::Sender<HealthState>,
    config_loaded: AtomicBool,
    routes_built: AtomicBool,
}

/// Shared health state. Clones observe and update the same state.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    inner: Arc<Inner>,
}

impl HealthReporter {
    pub fn new() -> Self {
        let (state, _) = watch::channel(HealthState::NotReady);
        Self {
            inner: Arc::new(Inner {
                state,
                config_loaded: AtomicBool::new(false),
                routes_built: AtomicBool::new(false),
            }),
        }
    }

    /// Record that configuration was loaded and validated.
    pub fn config_loaded(&self) {
        self.inner.config_loaded.store(true, Ordering::SeqCst);
        self.try_promote();
    }

    /// Record that the route table finished building.
    ///
    /// Takes the table itself so readiness cannot be claimed before one exists.
    pub fn route_table_built(&self, table: &RouteTable) {
        info!(routes = table.len(), "Route table built");
        self.inner.routes_built.store(true, Ordering::SeqCst);
        self.try_promote();
    }

    /// Enter the terminal `Stopping` state.
    pub fn stopping(&self) {
        let changed = self.inner.state.send_if_modified(|state| {
            let changed = *state != HealthState::Stopping;
            *state = HealthState::Stopping;
            changed
        });
        if changed {
            warn!("Health state -> stopping");
        }
    }

    pub fn state(&self) -> HealthState {
        *self.inner.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HealthState::Ready
    }

    /// Live until `Stopping`.
    pub fn is_live(&self) -> bool {
        self.state() != HealthState::Stopping
    }

    /// Watch state changes. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.inner.state.subscribe()
    }

    fn try_promote(&self) {
        let config_loaded = self.inner.config_loaded.load(Ordering::SeqCst);
        let routes_built = self.inner.routes_built.load(Ordering::SeqCst);
        if !(config_loaded && routes_built) {
            return;
        }
        let promoted = self.inner.state.send_if_modified(|state| {
            if *state == HealthState::NotReady {
                *state = HealthState::Ready;
                true
            } else {
                false
            }
        });
        if promoted {
            info!("Health state -> ready");
        }
    }
}

impl Default for HealthReporter {
    fn default() -> Self {
        Self::new()
    }
}
