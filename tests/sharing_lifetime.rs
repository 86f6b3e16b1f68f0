// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Sharing groups must never free a table while some live context still
//! references it, whatever order contexts are made current and destroyed in.

use glshare::config::{BufferMapping, Config};
use glshare::registry::{ContextRegistry, ThreadHandle};
use glshare::{ContextId, Error};
use std::sync::Arc;

fn registry() -> ContextRegistry {
    ContextRegistry::new(Config::new(BufferMapping::Emulated))
}

#[test]
fn owner_destroyed_before_dependent() {
    let registry = registry();
    let owner = registry.create_context(None).unwrap();
    let dependent = registry.create_context(Some(owner)).unwrap();
    registry.context(owner).unwrap().create_buffer(4).unwrap();
    let tables = registry.context(owner).unwrap().tables().clone();
    assert_eq!(tables.owners(), 2);

    registry.destroy_context(owner).unwrap();
    assert!(registry.context(owner).is_err());
    assert_eq!(tables.owners(), 1);
    //the dependent still sees the owner's objects
    assert!(registry.context(dependent).unwrap().buffer(4).is_ok());

    registry.destroy_context(dependent).unwrap();
    assert!(tables.buffers().is_released());
    assert!(registry.is_empty());
}

#[test]
fn pending_owner_waits_for_attached_dependent() {
    let registry = Arc::new(registry());
    let owner = registry.create_context(None).unwrap();
    let dependent = registry.create_context(Some(owner)).unwrap();
    let here = ThreadHandle::current();
    registry.make_current(Some(owner), here).unwrap();

    let (attached_tx, attached_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let worker = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            let thread = ThreadHandle::current();
            registry.make_current(Some(dependent), thread).unwrap();
            attached_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            registry.destroy_context(dependent).unwrap();
            //still current here, so still alive
            assert!(registry.is_pending_destroy(dependent));
            registry.make_current(None, thread).unwrap();
        })
    };
    attached_rx.recv().unwrap();

    registry.destroy_context(owner).unwrap();
    registry.make_current(None, here).unwrap();
    //the dependent is still current on the worker, so the owner is kept
    assert!(registry.is_pending_destroy(owner));
    let tables = registry.context(owner).unwrap().tables().clone();
    assert!(!tables.buffers().is_released());

    release_tx.send(()).unwrap();
    worker.join().unwrap();
    assert!(registry.context(owner).is_err());
    assert!(registry.context(dependent).is_err());
    assert!(tables.buffers().is_released());
}

#[test]
fn pending_context_stays_usable_until_switch() {
    let registry = registry();
    let thread = ThreadHandle::current();
    let a = registry.create_context(None).unwrap();
    registry.make_current(Some(a), thread).unwrap();
    registry.destroy_context(a).unwrap();
    //destroying twice is harmless
    registry.destroy_context(a).unwrap();

    let current = registry.require_current(thread).unwrap();
    current.create_texture(2).unwrap();
    assert!(current.texture(2).is_ok());
    //it cannot be made current anywhere else
    let elsewhere = std::thread::spawn(|| ThreadHandle::current()).join().unwrap();
    assert!(matches!(
        registry.make_current(Some(a), elsewhere),
        Err(Error::InvalidId { .. })
    ));

    registry.make_current(None, thread).unwrap();
    assert!(current.is_released());
    assert!(matches!(current.texture(2), Err(Error::OrphanedTable { .. })));
}

#[test]
fn random_lifecycles_never_free_live_tables() {
    //xorshift, so the sequence is reproducible without a dependency
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let registry = registry();
    let thread = ThreadHandle::current();
    let mut ids: Vec<ContextId> = Vec::new();
    for _ in 0..500 {
        match next() % 4 {
            0 => {
                let share = if ids.is_empty() || next() % 2 == 0 {
                    None
                } else {
                    Some(ids[(next() as usize) % ids.len()])
                };
                if let Ok(id) = registry.create_context(share) {
                    ids.push(id);
                }
            }
            1 if !ids.is_empty() => {
                let id = ids[(next() as usize) % ids.len()];
                let _ = registry.make_current(Some(id), thread);
            }
            2 if !ids.is_empty() => {
                let id = ids.swap_remove((next() as usize) % ids.len());
                let _ = registry.destroy_context(id);
            }
            _ => {
                let _ = registry.make_current(None, thread);
            }
        }
        for id in &ids {
            let context = registry.context(*id).unwrap();
            assert!(!context.tables().buffers().is_released());
            assert!(context.buffers().get(1).is_ok());
        }
    }
}
