//! The handle table: allocates handles, maps them to live
//! [`ServiceContext`]s, and maintains the sorted name-binding array.
//! Grounded on `skynet_handle.c`'s `handle_storage`: a power-of-two slot
//! array with linear probing on insert, and a name array kept sorted so
//! lookups can binary search it. The original guards the slot array and
//! the name array with one `rwlock`; this keeps the same split (`read()`
//! for lookups, `write()` for register/retire/bind) via `parking_lot`.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::handle::{Handle, DEFAULT_SLOT_SIZE, HANDLE_MASK, MAX_SLOT_SIZE};

struct Slots {
    slots: Vec<Option<Arc<ServiceContext>>>,
    /// Next handle to try allocating from, wrapping at `HANDLE_MASK`. Named
    /// `handle_index` in `skynet_handle.c`.
    next: u32,
    node: u8,
}

impl Slots {
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn grow(&mut self) {
        let old_len = self.slots.len();
        let new_len = old_len * 2;
        assert!(new_len <= MAX_SLOT_SIZE, "handle table exhausted");
        let mut new_slots: Vec<Option<Arc<ServiceContext>>> = (0..new_len).map(|_| None).collect();
        for slot in self.slots.drain(..) {
            if let Some(ctx) = slot {
                let mut idx = (ctx.handle as usize) & (new_len - 1);
                while new_slots[idx].is_some() {
                    idx = (idx + 1) & (new_len - 1);
                }
                new_slots[idx] = Some(ctx);
            }
        }
        self.slots = new_slots;
    }
}

#[derive(Default)]
struct Names {
    /// Kept sorted by name so `find` can binary search, mirroring the
    /// `name[]` array in `skynet_handle.c`.
    bindings: Vec<(String, Handle)>,
}

impl Names {
    fn find(&self, name: &str) -> Option<Handle> {
        self.bindings
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.bindings[i].1)
    }

    fn insert(&mut self, name: String, handle: Handle) -> Result<()> {
        match self.bindings.binary_search_by(|(n, _)| n.as_str().cmp(&name)) {
            Ok(_) => Err(Error::DuplicateName(name)),
            Err(pos) => {
                self.bindings.insert(pos, (name, handle));
                Ok(())
            }
        }
    }

    fn remove_handle(&mut self, handle: Handle) {
        self.bindings.retain(|(_, h)| *h != handle);
    }
}

pub struct Registry {
    slots: RwLock<Slots>,
    names: RwLock<Names>,
}

impl Registry {
    pub fn new(node: u8) -> Registry {
        Registry {
            slots: RwLock::new(Slots {
                slots: (0..DEFAULT_SLOT_SIZE).map(|_| None).collect(),
                next: 1, // handle 0 is reserved
                node,
            }),
            names: RwLock::new(Names::default()),
        }
    }

    /// Allocates a fresh local handle and stores `make_context(handle)`'s
    /// result under it. The context constructor needs the handle before
    /// the slot exists (it's embedded in the context and its mailbox), so
    /// allocation and insertion happen under one write lock, same as
    /// `skynet_handle_register` in the original.
    pub fn register(
        &self,
        make_context: impl FnOnce(Handle) -> Arc<ServiceContext>,
    ) -> Arc<ServiceContext> {
        let mut slots = self.slots.write();
        if slots.slots.iter().filter(|s| s.is_some()).count() >= slots.slots.len() * 3 / 4 {
            slots.grow();
        }
        let mut tries: u32 = 0;
        let local = loop {
            let local_cap = slots.slots.len() as u32;
            let candidate = slots.next & (local_cap - 1);
            slots.next = slots.next.wrapping_add(1) & HANDLE_MASK;
            tries += 1;
            if candidate != 0 && slots.slots[candidate as usize].is_none() {
                break candidate;
            }
            if tries > local_cap {
                slots.grow();
                tries = 0;
            }
        };
        let handle = ((slots.node as u32) << crate::handle::HANDLE_REMOTE_SHIFT) | local;
        let ctx = make_context(handle);
        slots.slots[local as usize] = Some(ctx.clone());
        ctx
    }

    pub fn grab(&self, handle: Handle) -> Result<Arc<ServiceContext>> {
        let slots = self.slots.read();
        let local = (handle & HANDLE_MASK) as usize;
        slots
            .slots
            .get(local & slots.mask())
            .and_then(|s| s.clone())
            .filter(|ctx| ctx.handle == handle)
            .ok_or(Error::UnknownHandle(handle))
    }

    pub fn retire(&self, handle: Handle) -> Result<Arc<ServiceContext>> {
        let mut slots = self.slots.write();
        let mask = slots.mask();
        let local = (handle & HANDLE_MASK) as usize & mask;
        let ctx = slots
            .slots
            .get(local)
            .and_then(|s| s.clone())
            .filter(|ctx| ctx.handle == handle)
            .ok_or(Error::UnknownHandle(handle))?;
        slots.slots[local] = None;
        drop(slots);
        self.names.write().remove_handle(handle);
        Ok(ctx)
    }

    pub fn find_name(&self, name: &str) -> Result<Handle> {
        self.names
            .read()
            .find(name)
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }

    pub fn bind_name(&self, name: &str, handle: Handle) -> Result<()> {
        self.names.write().insert(name.to_string(), handle)
    }

    pub fn retire_all(&self) -> Vec<Arc<ServiceContext>> {
        let mut slots = self.slots.write();
        slots.slots.iter_mut().filter_map(|s| s.take()).collect()
    }
}
