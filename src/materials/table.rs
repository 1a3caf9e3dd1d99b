use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{Material, MaterialProperties};

/// Floats per material slot in the encoded table:
/// density, viscosity, surface tension, elasticity
pub const MATERIAL_SLOT_WIDTH: usize = 4;

/// Ordered material table as consumed by the compute backends
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTable {
    slots: [MaterialProperties; Material::COUNT],
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self {
            slots: Material::ALL.map(Material::properties),
        }
    }
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, material: Material) -> &MaterialProperties {
        &self.slots[material.index() as usize]
    }

    /// Override the density of one slot
    pub fn set_density(&mut self, material: Material, density: f32) {
        self.slots[material.index() as usize].density = density;
    }

    /// Flat `[density, viscosity, surface_tension, elasticity]` per slot
    pub fn encode(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(Material::COUNT * MATERIAL_SLOT_WIDTH);
        for slot in &self.slots {
            flat.extend_from_slice(&[
                slot.density,
                slot.viscosity,
                slot.surface_tension,
                slot.elasticity,
            ]);
        }
        flat
    }

    /// Bit-exact key of the physical columns
    fn cache_key(&self) -> Vec<u32> {
        self.encode().iter().map(|v| v.to_bits()).collect()
    }
}

/// Memoizes table encodings so identical tables share one allocation
#[derive(Debug, Default)]
pub struct MaterialCache {
    encodings: RwLock<FxHashMap<Vec<u32>, Arc<[f32]>>>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded form of `table`, computed once per distinct table
    pub fn encoded(&self, table: &MaterialTable) -> Arc<[f32]> {
        let key = table.cache_key();

        if let Some(hit) = self.encodings.read().get(&key) {
            return Arc::clone(hit);
        }

        let mut encodings = self.encodings.write();
        Arc::clone(
            encodings
                .entry(key)
                .or_insert_with(|| Arc::from(table.encode())),
        )
    }

    pub fn len(&self) -> usize {
        self.encodings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_follows_enum_order() {
        let flat = MaterialTable::new().encode();
        assert_eq!(flat.len(), Material::COUNT * MATERIAL_SLOT_WIDTH);

        let mercury = Material::Mercury.index() as usize * MATERIAL_SLOT_WIDTH;
        assert_eq!(flat[mercury], 13.534);
        assert_eq!(flat[mercury + 1], 1.5);
        assert_eq!(flat[mercury + 2], 0.487);
        assert_eq!(flat[mercury + 3], 0.2);
    }

    #[test]
    fn density_override_only_touches_one_slot() {
        let mut table = MaterialTable::new();
        table.set_density(Material::Oil, 3.0);

        assert_eq!(table.get(Material::Oil).density, 3.0);
        assert_eq!(table.get(Material::Water).density, 1.0);
        assert_eq!(table.get(Material::Oil).viscosity, 1.2);
    }

    #[test]
    fn cache_shares_identical_tables() {
        let cache = MaterialCache::new();
        let first = cache.encoded(&MaterialTable::new());
        let second = cache.encoded(&MaterialTable::new());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let mut heavy = MaterialTable::new();
        heavy.set_density(Material::Water, 2.0);
        let third = cache.encoded(&heavy);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);
    }
}
