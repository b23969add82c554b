//! Generational arena for object handles.
//!
//! The heap is the bridge's weak-table primitive. Each slot stores one
//! handle's payload (native pointer, type tag, peer table) together with the
//! number of strong references the host holds to it. When that count drops
//! to zero the handle becomes *pending*: it is invisible to identity lookups
//! but its payload stays readable until the collector sweeps it. Freeing a
//! slot bumps its generation, so a stale [`ObjectHandle`] never aliases the
//! slot's next occupant.

use std::fmt;

use crate::{DescriptorId, NativePtr};

use super::TableRef;

/// Handle to a bridged object.
///
/// A cheap, copyable reference into the [`HandleHeap`]. Two values refer to
/// the same script object exactly when their handles compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into HandleHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Who destroys the native object behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Native code keeps responsibility.
    Borrowed,
    /// The bridge destroys the object when the handle is collected.
    Owned,
}

/// Type and ownership attached to every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleTag {
    pub descriptor: DescriptorId,
    pub ownership: Ownership,
}

impl HandleTag {
    pub fn borrowed(descriptor: DescriptorId) -> Self {
        Self {
            descriptor,
            ownership: Ownership::Borrowed,
        }
    }
}

/// Payload of a live or pending handle.
#[derive(Debug)]
pub struct HandleEntry {
    pub ptr: NativePtr,
    pub tag: HandleTag,
    /// Script-side extra fields, created lazily.
    pub peer: Option<TableRef>,
}

struct HeapSlot {
    generation: u32,
    entry: Option<HandleEntry>,
    ref_count: u32,
}

/// Heap storage for object handles with generational indices.
pub struct HandleHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    pending: Vec<ObjectHandle>,
}

impl HandleHeap {
    /// Create a new empty heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Allocate a handle for `ptr`, holding one strong reference.
    pub fn allocate(&mut self, ptr: NativePtr, tag: HandleTag) -> ObjectHandle {
        let entry = HandleEntry {
            ptr,
            tag,
            peer: None,
        };

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            slot.ref_count = 1;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                entry: Some(entry),
                ref_count: 1,
            });
            ObjectHandle::new(index, 0)
        }
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&HeapSlot> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.generation == handle.generation && slot.entry.is_some()).then_some(slot)
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapSlot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.generation == handle.generation && slot.entry.is_some()).then_some(slot)
    }

    /// Get the payload of a live or pending handle.
    ///
    /// Returns None once the handle has been freed.
    pub fn get(&self, handle: ObjectHandle) -> Option<&HandleEntry> {
        self.slot(handle)?.entry.as_ref()
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut HandleEntry> {
        self.slot_mut(handle)?.entry.as_mut()
    }

    pub fn ptr(&self, handle: ObjectHandle) -> Option<NativePtr> {
        self.get(handle).map(|e| e.ptr)
    }

    pub fn tag(&self, handle: ObjectHandle) -> Option<HandleTag> {
        self.get(handle).map(|e| e.tag)
    }

    /// True while the host still holds a strong reference.
    pub fn is_reachable(&self, handle: ObjectHandle) -> bool {
        self.slot(handle).is_some_and(|s| s.ref_count > 0)
    }

    /// Increment the strong count.
    ///
    /// Pending handles cannot be revived; returns false for them.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slot_mut(handle)
            && slot.ref_count > 0
        {
            slot.ref_count = slot.ref_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Decrement the strong count.
    ///
    /// Returns true if the handle became unreachable and is now pending
    /// collection.
    pub fn release(&mut self, handle: ObjectHandle) -> bool {
        if let Some(slot) = self.slot_mut(handle)
            && slot.ref_count > 0
        {
            slot.ref_count -= 1;
            if slot.ref_count == 0 {
                self.pending.push(handle);
                return true;
            }
        }
        false
    }

    /// Take the handles that became unreachable since the last sweep.
    pub fn take_pending(&mut self) -> Vec<ObjectHandle> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Free a slot immediately, dropping its peer table.
    pub fn free(&mut self, handle: ObjectHandle) -> Option<HandleEntry> {
        let slot = self.slot_mut(handle)?;
        let entry = slot.entry.take();
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        entry
    }

    /// Get the strong count of a live or pending handle.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.slot(handle).map(|s| s.ref_count)
    }

    /// Number of live or pending handles.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peer(&self, handle: ObjectHandle) -> Option<TableRef> {
        self.get(handle)?.peer.clone()
    }

    /// Get the peer table, creating it on first use.
    pub fn ensure_peer(&mut self, handle: ObjectHandle) -> Option<TableRef> {
        let entry = self.get_mut(handle)?;
        Some(entry.peer.get_or_insert_with(TableRef::new).clone())
    }

    /// Replace the peer table; `None` detaches it.
    pub fn set_peer(&mut self, handle: ObjectHandle, peer: Option<TableRef>) -> bool {
        match self.get_mut(handle) {
            Some(entry) => {
                entry.peer = peer;
                true
            }
            None => false,
        }
    }
}

impl Default for HandleHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("pending_count", &self.pending.len())
            .finish()
    }
}
