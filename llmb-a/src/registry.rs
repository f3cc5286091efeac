//! Handle registry for engine contexts.
//!
//! Managed callers hold contexts as integer handles, never as pointers. A
//! handle packs a slot index and a generation counter; destroying a context
//! bumps the slot's generation, so a stale handle from before the destroy
//! resolves to nothing instead of to whatever reuses the slot. A completion
//! worker keeps its own `Arc` to the session, so destroying a handle while
//! a worker is in flight defers the engine teardown to whichever reference
//! drops last.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

fn encode(index: usize, generation: u32) -> i64 {
    (((generation as u64) << INDEX_BITS) | (index as u64 + 1)) as i64
}

fn decode(handle: i64) -> Option<(usize, u32)> {
    let raw = handle as u64;
    let index = raw & INDEX_MASK;
    if index == 0 {
        return None;
    }
    Some(((index - 1) as usize, (raw >> INDEX_BITS) as u32))
}

/// Per-context state shared between the control thread and the completion
/// worker. The control thread only touches the atomics; the engine cell
/// belongs to the active worker.
pub struct Session<E> {
    engine: Mutex<E>,
    interrupt: AtomicBool,
    busy: AtomicBool,
}

impl<E> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(engine),
            interrupt: AtomicBool::new(false),
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the session for one completion. Fails if a worker is already
    /// active. Clears any interrupt left over from the previous request.
    pub fn try_begin(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.interrupt.store(false, Ordering::Release);
        true
    }

    pub fn finish(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Request early termination of the active completion. No-op when no
    /// worker is active. Idempotent, callable from any thread.
    pub fn interrupt(&self) -> bool {
        if !self.is_busy() {
            debug!("interrupt ignored: no active completion");
            return false;
        }
        self.interrupt.store(true, Ordering::Release);
        true
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Exclusive access to the engine. A cell poisoned by a panicked worker
    /// is recovered rather than wedging the handle.
    pub fn engine(&self) -> MutexGuard<'_, E> {
        match self.engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

struct Slot<E> {
    generation: u32,
    session: Option<Arc<Session<E>>>,
}

/// Arena of live engine sessions keyed by generation-checked handles.
/// Handle value 0 is never issued and always resolves to nothing.
pub struct ContextRegistry<E> {
    slots: Mutex<Vec<Slot<E>>>,
}

impl<E> ContextRegistry<E> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, engine: E) -> i64 {
        let session = Arc::new(Session::new(engine));
        let mut slots = self.lock();
        let handle = if let Some(index) = slots.iter().position(|slot| slot.session.is_none()) {
            let slot = &mut slots[index];
            slot.session = Some(session);
            encode(index, slot.generation)
        } else {
            slots.push(Slot {
                generation: 0,
                session: Some(session),
            });
            encode(slots.len() - 1, 0)
        };
        debug!("context registered: handle {handle:#x}");
        handle
    }

    pub fn get(&self, handle: i64) -> Option<Arc<Session<E>>> {
        let (index, generation) = decode(handle)?;
        let slots = self.lock();
        let slot = slots.get(index)?;
        if slot.generation != generation {
            return None;
        }
        slot.session.clone()
    }

    /// Drop the registry's reference to the session and retire the handle.
    /// Returns the session so a caller can observe deferred teardown.
    pub fn remove(&self, handle: i64) -> Option<Arc<Session<E>>> {
        let (index, generation) = decode(handle)?;
        let mut slots = self.lock();
        let slot = slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        debug!("context destroyed: handle {handle:#x}");
        Some(session)
    }

    /// Number of live sessions.
    pub fn active(&self) -> usize {
        self.lock()
            .iter()
            .filter(|slot| slot.session.is_some())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Slot<E>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<E> Default for ContextRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn insert_then_get_resolves_the_same_session() {
        let registry = ContextRegistry::new();
        let handle = registry.insert(());
        assert_ne!(handle, 0);
        assert!(registry.get(handle).is_some());
    }

    #[test]
    fn null_and_garbage_handles_resolve_to_nothing() {
        let registry = ContextRegistry::<()>::new();
        assert!(registry.get(0).is_none());
        assert!(registry.get(-1).is_none());
        assert!(registry.get(0x7fff_ffff_0000_0042).is_none());
    }

    #[test]
    fn remove_retires_the_handle_and_double_destroy_is_safe() {
        let registry = ContextRegistry::new();
        let handle = registry.insert(());
        assert!(registry.remove(handle).is_some());
        assert!(registry.get(handle).is_none());
        assert!(registry.remove(handle).is_none());
    }

    #[test]
    fn slot_reuse_does_not_resurrect_stale_handles() {
        let registry = ContextRegistry::new();
        let first = registry.insert(());
        registry.remove(first);
        let second = registry.insert(());
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
        // Both handles mapped to the same slot
        assert_eq!(registry.lock().len(), 1);
    }

    #[test]
    fn load_destroy_cycles_release_every_engine() {
        let drops = Arc::new(AtomicUsize::new(0));
        let registry = ContextRegistry::new();
        for _ in 0..100 {
            let handle = registry.insert(DropProbe(Arc::clone(&drops)));
            registry.remove(handle);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 100);
        assert_eq!(registry.active(), 0);
        assert_eq!(registry.lock().len(), 1);
    }

    #[test]
    fn destroy_during_flight_defers_teardown_to_the_worker_reference() {
        let drops = Arc::new(AtomicUsize::new(0));
        let registry = ContextRegistry::new();
        let handle = registry.insert(DropProbe(Arc::clone(&drops)));

        let in_flight = registry.get(handle).unwrap();
        registry.remove(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(in_flight);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interrupt_without_active_worker_is_a_no_op() {
        let session = Session::new(());
        assert!(!session.interrupt());
        assert!(!session.interrupted());
    }

    #[test]
    fn busy_claim_is_exclusive_and_resets_interrupt() {
        let session = Session::new(());
        assert!(session.try_begin());
        assert!(!session.try_begin());

        assert!(session.interrupt());
        assert!(session.interrupted());

        session.finish();
        assert!(!session.is_busy());

        // Next claim starts from a clean interrupt flag
        assert!(session.try_begin());
        assert!(!session.interrupted());
    }
}
