// Fan-out point for auth client events. Listeners are scoped: `listen` hands back a guard
// and dropping the guard unregisters the listener.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::state::AuthEvent;

type Listener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

#[derive(Clone, Default)]
pub struct AuthEventHub {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for AuthEventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match registry.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}

impl AuthEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "dropping the guard unregisters the listener"]
    pub fn listen(&self, listener: impl Fn(AuthEvent) + Send + Sync + 'static) -> AuthListenerGuard {
        let mut reg = lock(&self.registry);
        reg.next_id += 1;
        let id = reg.next_id;
        reg.listeners.push((id, Arc::new(listener)));
        AuthListenerGuard {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Delivers `event` to every registered listener and returns how many were called.
    /// Listeners run outside the registry lock.
    pub fn emit(&self, event: AuthEvent) -> usize {
        let listeners: Vec<Listener> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        if listeners.is_empty() {
            tracing::debug!(event = event.tag(), "auth event with no listeners");
        }
        for listener in &listeners {
            listener(event.clone());
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

pub struct AuthListenerGuard {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Drop for AuthListenerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
