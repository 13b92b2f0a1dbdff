//! Memoised decisions keyed by `(role, action, resource, scope)`.
//!
//! Staleness bound: a `Grant`/`Revoke` for a role bumps that role's
//! generation before the call returns, and entries stamped with an older
//! generation are never served. Invalidation is therefore immediate; the TTL
//! only bounds how long an entry lives if nothing invalidates it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::{Action, Decision, Resource, Role, Scope};

/// Safety-net lifetime of a cached decision.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub role: Role,
    pub action: Action,
    pub resource: Resource,
    pub scope: Scope,
}

impl CacheKey {
    pub fn new(role: Role, action: Action, resource: Resource, scope: Scope) -> Self {
        Self {
            role,
            action,
            resource,
            scope,
        }
    }

    /// Every key in the (small, closed) input domain.
    pub fn all() -> impl Iterator<Item = CacheKey> {
        Role::ALL.iter().flat_map(|role| {
            Action::ALL.iter().flat_map(move |action| {
                Resource::ALL.iter().flat_map(move |resource| {
                    Scope::ALL
                        .iter()
                        .map(move |scope| CacheKey::new(*role, *action, *resource, *scope))
                })
            })
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    decision: Decision,
    generation: u64,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct DecisionCache {
    entries: DashMap<CacheKey, Entry>,
    generations: [AtomicU64; Role::COUNT],
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecisionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn generation(&self, role: Role) -> u64 {
        self.generations[role.index()].load(Ordering::Acquire)
    }

    /// Fresh cached decision for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Decision> {
        let current = self.generation(key.role);
        let entry = self.entries.get(key).map(|e| *e)?;

        if entry.generation == current && entry.inserted_at.elapsed() < self.ttl {
            return Some(entry.decision);
        }

        self.entries
            .remove_if(key, |_, e| e.generation != current || e.inserted_at.elapsed() >= self.ttl);
        None
    }

    /// Cached decision for `key`, computing and storing it on a miss.
    ///
    /// Transient outcomes (`StoreUnavailable`, …) are returned but not stored.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Decision
    where
        F: FnOnce() -> Decision,
    {
        if let Some(decision) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return decision;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Stamp with the generation observed before computing: a concurrent
        // invalidation makes this entry unservable.
        let generation = self.generation(key.role);
        let decision = compute();
        if !decision.reason.is_transient() {
            self.entries.insert(
                key,
                Entry {
                    decision,
                    generation,
                    inserted_at: Instant::now(),
                },
            );
        }
        decision
    }

    /// Drop everything cached for `role`.
    pub fn invalidate_role(&self, role: Role) {
        self.generations[role.index()].fetch_add(1, Ordering::AcqRel);
        self.entries.retain(|k, _| k.role != role);
    }

    pub fn clear(&self) {
        for g in &self.generations {
            g.fetch_add(1, Ordering::AcqRel);
        }
        self.entries.clear();
    }

    /// Precompute every key. Returns the number of entries stored.
    pub fn warm<F>(&self, compute: F) -> usize
    where
        F: Fn(CacheKey) -> Decision,
    {
        for key in CacheKey::all() {
            let generation = self.generation(key.role);
            let decision = compute(key);
            if !decision.reason.is_transient() {
                self.entries.insert(
                    key,
                    Entry {
                        decision,
                        generation,
                        inserted_at: Instant::now(),
                    },
                );
            }
        }
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reason;
    use std::cell::Cell;

    fn key(role: Role) -> CacheKey {
        CacheKey::new(role, Action::Read, Resource::Sales, Scope::Any)
    }

    #[test]
    fn key_space_is_fully_enumerable() {
        assert_eq!(CacheKey::all().count(), 980);
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = DecisionCache::default();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Decision::allow(Reason::CrossModuleRead)
        };

        let a = cache.get_or_compute(key(Role::Staff), compute);
        let b = cache.get_or_compute(key(Role::Staff), compute);

        assert_eq!(a, b);
        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn invalidation_only_touches_the_role() {
        let cache = DecisionCache::default();
        cache.get_or_compute(key(Role::Staff), || Decision::deny(Reason::NoGrant));
        cache.get_or_compute(key(Role::Finance), || Decision::allow(Reason::CrossModuleRead));

        cache.invalidate_role(Role::Staff);

        assert_eq!(cache.get(&key(Role::Staff)), None);
        assert_eq!(
            cache.get(&key(Role::Finance)),
            Some(Decision::allow(Reason::CrossModuleRead))
        );
    }

    #[test]
    fn entries_computed_across_an_invalidation_are_not_served() {
        let cache = DecisionCache::default();
        let d = cache.get_or_compute(key(Role::Staff), || {
            // A grant lands while this decision is being computed.
            cache.invalidate_role(Role::Staff);
            Decision::deny(Reason::NoGrant)
        });
        assert_eq!(d, Decision::deny(Reason::NoGrant));
        assert_eq!(cache.get(&key(Role::Staff)), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = DecisionCache::new(Duration::ZERO);
        cache.get_or_compute(key(Role::Staff), || Decision::deny(Reason::NoGrant));
        assert_eq!(cache.get(&key(Role::Staff)), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn transient_decisions_are_not_cached() {
        let cache = DecisionCache::default();
        cache.get_or_compute(key(Role::Staff), || Decision::deny(Reason::StoreUnavailable));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn warm_fills_the_whole_domain() {
        let cache = DecisionCache::default();
        let stored = cache.warm(|_| Decision::deny(Reason::NoGrant));
        assert_eq!(stored, 980);

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
