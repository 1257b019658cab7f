//! Process-wide fallback identity shared by every server instance in one process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Identity;

/// How the identity in the shared slot got there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedOrigin {
    /// Supplied up front, e.g. the daemon-wide default read from disk.
    Seeded,
    /// Generated by an instance in this process and published for the rest.
    Generated,
}

#[derive(Debug)]
struct SharedEntry {
    identity: Identity,
    origin: SharedOrigin,
}

/// Cloneable handle to the shared fallback identity.
///
/// Provisioning holds [`SharedIdentity::lock`] across its read → generate → publish
/// sequence, so concurrent instances are serialized and the first identity
/// published is the one every later instance sees.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    slot: Arc<Mutex<Option<SharedEntry>>>,
}

impl SharedIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `identity` already published, e.g. the daemon-wide default.
    #[must_use]
    pub fn seeded(identity: Identity) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(SharedEntry {
                identity,
                origin: SharedOrigin::Seeded,
            }))),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.lock().get().cloned()
    }

    /// Publish `identity` unless one is already present. Returns whether it was stored.
    pub fn publish(&self, identity: Identity) -> bool {
        self.lock().publish(identity)
    }

    #[must_use]
    pub fn lock(&self) -> SharedIdentitySlot<'_> {
        // The slot cannot be left half-written, so a poisoned lock is still usable.
        SharedIdentitySlot {
            guard: self.slot.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Exclusive access to the shared slot.
pub struct SharedIdentitySlot<'a> {
    guard: MutexGuard<'a, Option<SharedEntry>>,
}

impl SharedIdentitySlot<'_> {
    #[must_use]
    pub fn get(&self) -> Option<&Identity> {
        self.guard.as_ref().map(|entry| &entry.identity)
    }

    #[must_use]
    pub fn origin(&self) -> Option<SharedOrigin> {
        self.guard.as_ref().map(|entry| entry.origin)
    }

    /// First writer wins. Published identities are recorded as [`SharedOrigin::Generated`].
    pub fn publish(&mut self, identity: Identity) -> bool {
        if self.guard.is_some() {
            return false;
        }
        *self.guard = Some(SharedEntry {
            identity,
            origin: SharedOrigin::Generated,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::generated_identity;

    #[test]
    fn test_empty_by_default() {
        let shared = SharedIdentity::new();
        assert!(shared.current().is_none());
        assert!(shared.lock().get().is_none());
    }

    #[test]
    fn test_first_writer_wins() {
        let shared = SharedIdentity::new();
        let identity = generated_identity().clone();

        assert!(shared.publish(identity.clone()));
        assert!(!shared.publish(identity.clone()));
        assert_eq!(shared.current(), Some(identity));
    }

    #[test]
    fn test_clones_share_the_slot() {
        let shared = SharedIdentity::new();
        let other = shared.clone();
        assert!(other.publish(generated_identity().clone()));
        assert!(shared.current().is_some());
    }

    #[test]
    fn test_seeded_slot_rejects_publication() {
        let shared = SharedIdentity::seeded(generated_identity().clone());
        let mut slot = shared.lock();
        assert!(slot.get().is_some());
        assert!(!slot.publish(generated_identity().clone()));
        assert_eq!(slot.origin(), Some(SharedOrigin::Seeded));
    }

    #[test]
    fn test_published_identity_is_marked_generated() {
        let shared = SharedIdentity::new();
        assert_eq!(shared.lock().origin(), None);

        assert!(shared.publish(generated_identity().clone()));
        assert_eq!(shared.lock().origin(), Some(SharedOrigin::Generated));
    }
}
