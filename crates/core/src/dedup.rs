use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::DedupConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    FirstSeen,
    AlreadySeen,
}

/// Atomic check-then-insert over webhook event identifiers.
pub trait EventRegistry: Send + Sync {
    fn register(&self, event_id: &str) -> Registration;
}

/// In-memory registry that remembers at most `capacity` identifiers, each for at most
/// `window`. The oldest identifier is evicted first when the registry is full.
#[derive(Debug)]
pub struct BoundedEventRegistry {
    capacity: usize,
    window: Duration,
    inner: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    seen: HashSet<String>,
    order: VecDeque<(String, Instant)>,
}

impl BoundedEventRegistry {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self { capacity: capacity.max(1), window, inner: Mutex::new(RegistryState::default()) }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.window_secs))
    }

    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn register_at(&self, event_id: &str, now: Instant) -> Registration {
        let mut state = self.lock();
        state.evict_expired(now, self.window);

        if state.seen.contains(event_id) {
            return Registration::AlreadySeen;
        }

        while state.order.len() >= self.capacity {
            state.evict_oldest();
        }

        state.seen.insert(event_id.to_string());
        state.order.push_back((event_id.to_string(), now));
        Registration::FirstSeen
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // Dedup is best-effort; a poisoned guard is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventRegistry for BoundedEventRegistry {
    fn register(&self, event_id: &str) -> Registration {
        self.register_at(event_id, Instant::now())
    }
}

impl RegistryState {
    fn evict_expired(&mut self, now: Instant, window: Duration) {
        while let Some((_, inserted_at)) = self.order.front() {
            if now.saturating_duration_since(*inserted_at) < window {
                break;
            }
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((event_id, _)) = self.order.pop_front() {
            self.seen.remove(&event_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{BoundedEventRegistry, EventRegistry, Registration};

    #[test]
    fn second_registration_is_already_seen() {
        let registry = BoundedEventRegistry::new(16, Duration::from_secs(60));

        assert_eq!(registry.register("Ev1"), Registration::FirstSeen);
        assert_eq!(registry.register("Ev1"), Registration::AlreadySeen);
        assert_eq!(registry.register("Ev2"), Registration::FirstSeen);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_identical_deliveries_admit_exactly_one() {
        let registry = Arc::new(BoundedEventRegistry::new(1_000, Duration::from_secs(60)));
        let first_seen = Arc::new(AtomicUsize::new(0));

        thread::scope(|scope| {
            for _ in 0..32 {
                let registry = Arc::clone(&registry);
                let first_seen = Arc::clone(&first_seen);
                scope.spawn(move || {
                    for round in 0..50 {
                        let id = format!("Ev{round}");
                        if registry.register(&id) == Registration::FirstSeen {
                            first_seen.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(first_seen.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn capacity_evicts_oldest_identifier() {
        let registry = BoundedEventRegistry::new(2, Duration::from_secs(60));
        let now = Instant::now();

        registry.register_at("a", now);
        registry.register_at("b", now);
        registry.register_at("c", now);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.register_at("b", now), Registration::AlreadySeen);
        assert_eq!(registry.register_at("a", now), Registration::FirstSeen);
    }

    #[test]
    fn identifiers_expire_after_the_window() {
        let registry = BoundedEventRegistry::new(16, Duration::from_secs(10));
        let start = Instant::now();

        assert_eq!(registry.register_at("Ev1", start), Registration::FirstSeen);
        assert_eq!(
            registry.register_at("Ev1", start + Duration::from_secs(9)),
            Registration::AlreadySeen
        );
        assert_eq!(
            registry.register_at("Ev1", start + Duration::from_secs(10)),
            Registration::FirstSeen
        );
    }

    #[test]
    fn duplicate_check_does_not_refresh_expiry() {
        let registry = BoundedEventRegistry::new(16, Duration::from_secs(10));
        let start = Instant::now();

        registry.register_at("Ev1", start);
        registry.register_at("Ev1", start + Duration::from_secs(8));

        assert_eq!(
            registry.register_at("Ev1", start + Duration::from_secs(11)),
            Registration::FirstSeen
        );
    }
}
