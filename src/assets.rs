//! Asset Handle Registry
//!
//! The core never loads or inspects asset contents; decoding belongs to the
//! external asset collaborator. What lives here is the minimal contract the
//! scheduler needs: opaque handles, a resolved/pending state per handle, and
//! a stable batch key for draw sorting.
//!
//! A handle registered as pending models an asset whose load never finished
//! ("unresolved"); nodes referencing it are skipped at Emit with a warning,
//! without affecting their siblings.

use slotmap::{Key, SlotMap, new_key_type};

new_key_type! {
    /// Opaque handle to mesh data owned by the asset collaborator.
    pub struct MeshHandle;
    /// Opaque handle to material data owned by the asset collaborator.
    pub struct MaterialHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveState {
    Resolved,
    Pending,
}

#[derive(Debug, Clone)]
struct MeshEntry {
    name: String,
    state: ResolveState,
}

#[derive(Debug, Clone)]
struct MaterialEntry {
    name: String,
    state: ResolveState,
    transparent: bool,
}

/// Registry of externally owned assets, addressed by opaque handles.
#[derive(Debug, Default)]
pub struct AssetServer {
    meshes: SlotMap<MeshHandle, MeshEntry>,
    materials: SlotMap<MaterialHandle, MaterialEntry>,
}

impl AssetServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Registration (called by the asset collaborator)
    // ========================================================================

    /// Registers an already-resolved mesh.
    pub fn register_mesh(&mut self, name: &str) -> MeshHandle {
        self.meshes.insert(MeshEntry {
            name: name.to_string(),
            state: ResolveState::Resolved,
        })
    }

    /// Registers a mesh whose load has not completed yet.
    pub fn register_pending_mesh(&mut self, name: &str) -> MeshHandle {
        self.meshes.insert(MeshEntry {
            name: name.to_string(),
            state: ResolveState::Pending,
        })
    }

    /// Marks a pending mesh as resolved. Unknown handles are ignored.
    pub fn resolve_mesh(&mut self, handle: MeshHandle) {
        if let Some(entry) = self.meshes.get_mut(handle) {
            entry.state = ResolveState::Resolved;
        }
    }

    pub fn register_material(&mut self, name: &str, transparent: bool) -> MaterialHandle {
        self.materials.insert(MaterialEntry {
            name: name.to_string(),
            state: ResolveState::Resolved,
            transparent,
        })
    }

    pub fn register_pending_material(&mut self, name: &str, transparent: bool) -> MaterialHandle {
        self.materials.insert(MaterialEntry {
            name: name.to_string(),
            state: ResolveState::Pending,
            transparent,
        })
    }

    pub fn resolve_material(&mut self, handle: MaterialHandle) {
        if let Some(entry) = self.materials.get_mut(handle) {
            entry.state = ResolveState::Resolved;
        }
    }

    // ========================================================================
    // Validity queries (called by the scheduler)
    // ========================================================================

    #[must_use]
    pub fn mesh_resolved(&self, handle: MeshHandle) -> bool {
        self.meshes
            .get(handle)
            .is_some_and(|e| e.state == ResolveState::Resolved)
    }

    #[must_use]
    pub fn material_resolved(&self, handle: MaterialHandle) -> bool {
        self.materials
            .get(handle)
            .is_some_and(|e| e.state == ResolveState::Resolved)
    }

    #[must_use]
    pub fn material_transparent(&self, handle: MaterialHandle) -> Option<bool> {
        Some(self.materials.get(handle)?.transparent)
    }

    /// Opaque sort key for draw batching.
    ///
    /// Stable for the handle's lifetime; equal handles give equal keys, so
    /// items sharing a material end up adjacent after the opaque sort.
    #[must_use]
    pub fn material_batch_key(&self, handle: MaterialHandle) -> u64 {
        handle.data().as_ffi()
    }

    #[must_use]
    pub fn mesh_name(&self, handle: MeshHandle) -> Option<&str> {
        Some(&self.meshes.get(handle)?.name)
    }

    #[must_use]
    pub fn material_name(&self, handle: MaterialHandle) -> Option<&str> {
        Some(&self.materials.get(handle)?.name)
    }
}
