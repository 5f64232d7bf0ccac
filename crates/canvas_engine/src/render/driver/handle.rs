//! Typed resource handles and the tables that own driver resources
//!
//! Every driver resource lives in exactly one [`HandleTable`] slot. Callers only
//! ever see the small, copyable key types declared here; the backend object
//! behind a key is constructed in place on create and dropped in place on
//! destroy. Keys carry a generation tag, so a handle that outlives its resource
//! is caught on the next lookup instead of aliasing a recycled slot.
//!
//! Looking up a dead handle is a programming error and panics.

use slotmap::{Key, SlotMap};

slotmap::new_key_type! {
    /// Handle to a vertex buffer
    pub struct VertexBufferHandle;
    /// Handle to an index buffer
    pub struct IndexBufferHandle;
    /// Handle to a texture
    pub struct TextureHandle;
    /// Handle to a sampler group
    pub struct SamplerGroupHandle;
    /// Handle to a uniform buffer
    pub struct UniformBufferHandle;
    /// Handle to a render primitive (vertex + index buffer + draw range)
    pub struct RenderPrimitiveHandle;
    /// Handle to a shader program
    pub struct ProgramHandle;
    /// Handle to a render target
    pub struct RenderTargetHandle;
    /// Handle to a swap chain
    pub struct SwapChainHandle;
    /// Handle to a fence
    pub struct FenceHandle;
    /// Handle to an external stream
    pub struct StreamHandle;
}

/// Arena of backend resources addressed by one handle type
pub struct HandleTable<K: Key, T> {
    kind: &'static str,
    slots: SlotMap<K, T>,
}

impl<K: Key, T> HandleTable<K, T> {
    /// Create an empty table; `kind` names the resource in panic messages
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: SlotMap::with_key(),
        }
    }

    /// Construct a resource in a fresh slot
    pub fn insert(&mut self, resource: T) -> K {
        self.slots.insert(resource)
    }

    /// Destroy the resource behind `handle`, returning it for teardown
    pub fn remove(&mut self, handle: K) -> T {
        match self.slots.remove(handle) {
            Some(resource) => resource,
            None => self.invalid(handle),
        }
    }

    /// Borrow the resource behind `handle`
    pub fn get(&self, handle: K) -> &T {
        match self.slots.get(handle) {
            Some(resource) => resource,
            None => self.invalid(handle),
        }
    }

    /// Mutably borrow the resource behind `handle`
    pub fn get_mut(&mut self, handle: K) -> &mut T {
        let kind = self.kind;
        match self.slots.get_mut(handle) {
            Some(resource) => resource,
            None => panic!("invalid {kind} handle {handle:?}: resource was destroyed or never created"),
        }
    }

    /// Check whether `handle` still refers to a live resource
    pub fn contains(&self, handle: K) -> bool {
        self.slots.contains_key(handle)
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no resources are alive
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn invalid(&self, handle: K) -> ! {
        panic!(
            "invalid {} handle {:?}: resource was destroyed or never created",
            self.kind, handle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut table: HandleTable<TextureHandle, u32> = HandleTable::new("texture");
        let a = table.insert(7);
        let b = table.insert(9);

        assert_eq!(*table.get(a), 7);
        assert_eq!(*table.get(b), 9);
        assert_eq!(table.len(), 2);

        *table.get_mut(a) = 8;
        assert_eq!(table.remove(a), 8);
        assert!(!table.contains(a));
        assert!(table.contains(b));
    }

    #[test]
    fn test_recycled_slot_does_not_alias_stale_handle() {
        let mut table: HandleTable<TextureHandle, &str> = HandleTable::new("texture");
        let stale = table.insert("first");
        table.remove(stale);
        let fresh = table.insert("second");

        assert_ne!(stale, fresh);
        assert!(!table.contains(stale));
        assert_eq!(*table.get(fresh), "second");
    }

    #[test]
    #[should_panic(expected = "invalid texture handle")]
    fn test_use_after_destroy_panics() {
        let mut table: HandleTable<TextureHandle, u8> = HandleTable::new("texture");
        let handle = table.insert(1);
        table.remove(handle);
        let _ = table.get(handle);
    }

    #[test]
    #[should_panic(expected = "invalid uniform buffer handle")]
    fn test_null_handle_panics() {
        let table: HandleTable<UniformBufferHandle, u8> = HandleTable::new("uniform buffer");
        let _ = table.get(UniformBufferHandle::null());
    }
}
