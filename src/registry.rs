// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The context registry.
//!
//! [`ContextRegistry`] owns every live [`Context`] and records which one is
//! current on each thread. It is an ordinary value: the embedding shim keeps
//! one (typically in a `OnceLock`) and passes the calling thread's
//! [`ThreadHandle`] explicitly.
//!
//! # Destruction
//!
//! Destroying a context that some thread still has current only marks it
//! pending-destroy; the context stays fully usable on that thread. It is
//! finalized when its thread switches away or detaches, provided no dependent
//! sharing its tables is still current somewhere. Finalizing a dependent
//! re-checks its owner, so the last dependent to go also takes a waiting owner
//! with it. Tables themselves are reference counted and are freed only when the
//! last context referencing them is finalized.
//!
//! Lock order: the thread map, then the context map. Looking up the current
//! context takes only the read side of the thread map; switching and
//! destroying take the write side.

use crate::config::Config;
use crate::context::{Context, ContextId};
use crate::error::{Error, ObjectKind, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::ThreadId;
use wasm_safe_mutex::rwlock::RwLock as ThreadMapLock;

/// Identifies a host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(ThreadId);

impl ThreadHandle {
    /// The calling thread.
    pub fn current() -> Self {
        ThreadHandle(std::thread::current().id())
    }

    pub fn from_thread_id(id: ThreadId) -> Self {
        ThreadHandle(id)
    }

    pub fn thread_id(&self) -> ThreadId {
        self.0
    }
}

pub struct ContextRegistry {
    config: Config,
    contexts: RwLock<HashMap<ContextId, Arc<Context>>>,
    current: ThreadMapLock<HashMap<ThreadHandle, ContextId>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("config", &self.config)
            .field("contexts", &self.len())
            .finish_non_exhaustive()
    }
}

impl ContextRegistry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            contexts: RwLock::new(HashMap::new()),
            current: ThreadMapLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of contexts not yet finalized, including pending-destroy ones.
    pub fn len(&self) -> usize {
        self.contexts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a context that has not been finalized.
    pub fn context(&self, id: ContextId) -> Result<Arc<Context>> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(Error::invalid_id(ObjectKind::Context, id.get()))
    }

    /// `false` for unknown or already finalized contexts.
    pub fn is_pending_destroy(&self, id: ContextId) -> bool {
        self.context(id).is_ok_and(|c| c.is_pending_destroy())
    }

    /**
    Creates a context.

    With `share_with` the new context references that context's tables and
    becomes its dependent. Only owners can be shared with.
    */
    pub fn create_context(&self, share_with: Option<ContextId>) -> Result<ContextId> {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        let id = ContextId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let context = match share_with {
            None => Context::new_owner(id, &self.config),
            Some(owner) => {
                let owner = contexts
                    .get(&owner)
                    .ok_or(Error::invalid_id(ObjectKind::Context, owner.get()))?;
                Context::new_dependent(id, owner, &self.config)?
            }
        };
        logwise::info_sync!(
            "created context {id}, sharing with {owner}",
            id = id.get(),
            owner = context.owner().map_or(0, ContextId::get)
        );
        contexts.insert(id, Arc::new(context));
        Ok(id)
    }

    /**
    Makes `context` current on `thread`, or detaches the thread with `None`.

    A context can be current on one thread at a time. If the thread's previous
    context was waiting to be destroyed, it is finalized here.
    */
    pub fn make_current(&self, context: Option<ContextId>, thread: ThreadHandle) -> Result<()> {
        let mut current = self.current.lock_sync_write();
        let previous = current.get(&thread).copied();
        if previous == context {
            return Ok(());
        }
        match context {
            Some(id) => {
                let next = self.context(id)?;
                if next.is_pending_destroy() {
                    return Err(Error::invalid_id(ObjectKind::Context, id.get()));
                }
                if current.iter().any(|(t, c)| *c == id && *t != thread) {
                    return Err(Error::ContextInUse { context: id.get() });
                }
                current.insert(thread, id);
                next.set_attached(true);
            }
            None => {
                current.remove(&thread);
            }
        }
        if let Some(previous) = previous {
            if let Ok(previous) = self.context(previous) {
                previous.set_attached(false);
                self.finalize_if_ready(&previous)?;
                if let Some(owner) = previous.owner() {
                    if let Ok(owner) = self.context(owner) {
                        self.finalize_if_ready(&owner)?;
                    }
                }
            }
        }
        drop(current);
        Ok(())
    }

    /**
    Destroys a context.

    A context current on some thread is only marked; see the module docs.
    Destroying a context that is already pending is a no-op.
    */
    pub fn destroy_context(&self, id: ContextId) -> Result<()> {
        let current = self.current.lock_sync_write();
        let context = self.context(id)?;
        if context.is_pending_destroy() {
            return Ok(());
        }
        context.mark_pending_destroy();
        if context.is_attached() {
            logwise::info_sync!("deferring destruction of attached context {id}", id = id.get());
            drop(current);
            return Ok(());
        }
        self.finalize(&context)?;
        drop(current);
        Ok(())
    }

    /// Finalizes a detached pending-destroy context with no attached dependents.
    fn finalize_if_ready(&self, context: &Arc<Context>) -> Result<()> {
        if !context.is_pending_destroy() || context.is_attached() {
            return Ok(());
        }
        let dependent_attached = self
            .contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|c| c.owner() == Some(context.id()) && c.is_attached());
        if dependent_attached {
            logwise::trace_sync!(
                "context {id} waits on an attached dependent",
                id = context.id().get()
            );
            return Ok(());
        }
        self.finalize(context)
    }

    fn finalize(&self, context: &Arc<Context>) -> Result<()> {
        let removed = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&context.id());
        if removed.is_none() {
            return Ok(());
        }
        let freed = context.release_tables()?;
        logwise::info_sync!(
            "finalized context {id}, tables freed: {freed}",
            id = context.id().get(),
            freed = logwise::privacy::LogIt(&freed)
        );
        if let Some(owner) = context.owner() {
            if let Ok(owner) = self.context(owner) {
                self.finalize_if_ready(&owner)?;
            }
        }
        Ok(())
    }

    /// The context current on `thread`.
    pub fn current_context(&self, thread: ThreadHandle) -> Option<Arc<Context>> {
        let id = self.current.lock_sync_read().get(&thread).copied()?;
        self.context(id).ok()
    }

    pub fn current_id(&self, thread: ThreadHandle) -> Option<ContextId> {
        self.current.lock_sync_read().get(&thread).copied()
    }

    /// Like [`current_context`](Self::current_context), but nothing current is an error.
    pub fn require_current(&self, thread: ThreadHandle) -> Result<Arc<Context>> {
        self.current_context(thread).ok_or(Error::NoCurrentContext)
    }

    /// Runs `f` against the context current on `thread`.
    pub fn with_current<T>(
        &self,
        thread: ThreadHandle,
        f: impl FnOnce(&Context) -> Result<T>,
    ) -> Result<T> {
        let context = self.require_current(thread)?;
        f(&context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferMapping;

    fn registry() -> ContextRegistry {
        ContextRegistry::new(Config::new(BufferMapping::Emulated))
    }

    #[test]
    fn make_current_and_detach() {
        let registry = registry();
        let thread = ThreadHandle::current();
        assert!(matches!(
            registry.require_current(thread),
            Err(Error::NoCurrentContext)
        ));
        let id = registry.create_context(None).unwrap();
        registry.make_current(Some(id), thread).unwrap();
        assert_eq!(registry.current_context(thread).unwrap().id(), id);
        assert!(registry.context(id).unwrap().is_attached());
        registry.make_current(None, thread).unwrap();
        assert!(registry.current_context(thread).is_none());
        assert!(!registry.context(id).unwrap().is_attached());
    }

    #[test]
    fn unknown_ids() {
        let registry = registry();
        let bogus = ContextId::from_raw(99);
        assert!(matches!(
            registry.create_context(Some(bogus)),
            Err(Error::InvalidId {
                kind: ObjectKind::Context,
                id: 99
            })
        ));
        assert!(registry.make_current(Some(bogus), ThreadHandle::current()).is_err());
        assert!(registry.destroy_context(bogus).is_err());
        assert!(!registry.is_pending_destroy(bogus));
    }

    #[test]
    fn sharing_depth_is_one() {
        let registry = registry();
        let owner = registry.create_context(None).unwrap();
        let dependent = registry.create_context(Some(owner)).unwrap();
        assert!(matches!(
            registry.create_context(Some(dependent)),
            Err(Error::InvalidSharingDepth { .. })
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn destroying_detached_context_is_immediate() {
        let registry = registry();
        let id = registry.create_context(None).unwrap();
        let context = registry.context(id).unwrap();
        registry.destroy_context(id).unwrap();
        assert!(registry.context(id).is_err());
        assert!(context.is_released());
        assert!(context.tables().buffers().is_released());
    }

    #[test]
    fn destroy_defers_until_switch() {
        let registry = registry();
        let thread = ThreadHandle::current();
        let a = registry.create_context(None).unwrap();
        let b = registry.create_context(None).unwrap();
        registry.make_current(Some(a), thread).unwrap();
        registry.destroy_context(a).unwrap();
        assert!(registry.is_pending_destroy(a));
        //still usable while current
        registry.require_current(thread).unwrap().create_buffer(1).unwrap();
        registry.make_current(Some(b), thread).unwrap();
        assert!(registry.context(a).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn context_current_elsewhere_is_rejected() {
        let registry = Arc::new(registry());
        let id = registry.create_context(None).unwrap();
        registry.make_current(Some(id), ThreadHandle::current()).unwrap();
        let other = registry.clone();
        let result = std::thread::spawn(move || other.make_current(Some(id), ThreadHandle::current()))
            .join()
            .unwrap();
        assert!(matches!(result, Err(Error::ContextInUse { .. })));
    }

    #[test]
    fn lookups_run_alongside_switches() {
        let registry = Arc::new(registry());
        let threads = 4;
        let barrier = Arc::new(std::sync::Barrier::new(threads));
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let thread = ThreadHandle::current();
                    let a = registry.create_context(None).unwrap();
                    let b = registry.create_context(None).unwrap();
                    barrier.wait();
                    for round in 0..200 {
                        let id = if round % 2 == 0 { a } else { b };
                        registry.make_current(Some(id), thread).unwrap();
                        for _ in 0..5 {
                            assert_eq!(registry.current_id(thread), Some(id));
                            let context = registry.require_current(thread).unwrap();
                            assert_eq!(context.id(), id);
                            context.create_buffer(round + 1).unwrap();
                        }
                    }
                    registry.make_current(None, thread).unwrap();
                    assert!(registry.current_context(thread).is_none());
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(registry.len(), threads * 2);
    }
}
