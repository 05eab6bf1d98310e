use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Unmetered,
    Metered,
    Disconnected,
}

pub trait NetworkMonitor: Send + Sync {
    fn current(&self) -> NetworkState;
}

/// A network state set by configuration, adjustable at runtime.
#[derive(Debug)]
pub struct StaticNetwork {
    state: RwLock<NetworkState>,
}

impl StaticNetwork {
    pub fn new(state: NetworkState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn from_metered(metered: bool) -> Self {
        Self::new(if metered {
            NetworkState::Metered
        } else {
            NetworkState::Unmetered
        })
    }

    pub fn set(&self, state: NetworkState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

impl NetworkMonitor for StaticNetwork {
    fn current(&self) -> NetworkState {
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
