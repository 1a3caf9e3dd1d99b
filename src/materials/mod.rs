//! Fluid material presets
//!
//! Materials form a closed set. A particle refers to its material by index,
//! and the index is the enum discriminant, so the table order is fixed for the
//! lifetime of the process.

mod table;

pub use table::{MaterialCache, MaterialTable, MATERIAL_SLOT_WIDTH};

use serde::{Deserialize, Serialize};

/// Fluid types supported by the engine
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Material {
    #[default]
    Water = 0,
    Oil = 1,
    Mercury = 2,
    Gasoline = 3,
    Glycerin = 4,
}

/// Physical and visual properties of a material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    pub density: f32,
    pub viscosity: f32,
    pub surface_tension: f32,
    /// Fraction of normal velocity kept when bouncing off a wall
    pub elasticity: f32,
    /// Packed 0xAARRGGBB
    pub color: u32,
}

impl Material {
    /// Every material in table order
    pub const ALL: [Material; 5] = [
        Material::Water,
        Material::Oil,
        Material::Mercury,
        Material::Gasoline,
        Material::Glycerin,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Slot in the material table
    pub fn index(self) -> u32 {
        self as u32
    }

    /// Look a material up by table slot
    pub fn from_index(index: u32) -> Option<Material> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Material::Water => "Water",
            Material::Oil => "Oil",
            Material::Mercury => "Mercury",
            Material::Gasoline => "Gasoline",
            Material::Glycerin => "Glycerin",
        }
    }

    /// Relative density (water = 1)
    pub fn density(self) -> f32 {
        match self {
            Material::Water => 1.0,
            Material::Oil => 0.92,
            Material::Mercury => 13.534,
            Material::Gasoline => 0.72,
            Material::Glycerin => 1.26,
        }
    }

    pub fn viscosity(self) -> f32 {
        match self {
            Material::Water => 1.0,
            Material::Oil => 1.2,
            Material::Mercury => 1.5,
            Material::Gasoline => 0.3,
            Material::Glycerin => 2.0,
        }
    }

    pub fn surface_tension(self) -> f32 {
        match self {
            Material::Water => 0.073,
            Material::Oil => 0.032,
            Material::Mercury => 0.487,
            Material::Gasoline => 0.022,
            Material::Glycerin => 0.064,
        }
    }

    pub fn elasticity(self) -> f32 {
        match self {
            Material::Water => 0.8,
            Material::Oil => 0.7,
            Material::Mercury => 0.2,
            Material::Gasoline => 0.9,
            Material::Glycerin => 0.5,
        }
    }

    /// Display color, packed 0xAARRGGBB
    pub fn color(self) -> u32 {
        match self {
            Material::Water => pack_rgb(0, 119, 190),
            Material::Oil => pack_rgb(168, 140, 0),
            Material::Mercury => pack_rgb(192, 192, 192),
            Material::Gasoline => pack_rgb(255, 222, 173),
            Material::Glycerin => pack_rgb(230, 230, 250),
        }
    }

    pub fn properties(self) -> MaterialProperties {
        MaterialProperties {
            density: self.density(),
            viscosity: self.viscosity(),
            surface_tension: self.surface_tension(),
            elasticity: self.elasticity(),
            color: self.color(),
        }
    }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pack an opaque RGB triple as 0xAARRGGBB
pub const fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_table_order() {
        for (slot, material) in Material::ALL.iter().enumerate() {
            assert_eq!(material.index() as usize, slot);
            assert_eq!(Material::from_index(slot as u32), Some(*material));
        }
        assert_eq!(Material::from_index(Material::COUNT as u32), None);
    }

    #[test]
    fn mercury_is_heaviest() {
        let heaviest = Material::ALL
            .iter()
            .max_by(|a, b| a.density().total_cmp(&b.density()))
            .copied();
        assert_eq!(heaviest, Some(Material::Mercury));
    }

    #[test]
    fn packed_color_is_opaque() {
        assert_eq!(pack_rgb(0, 119, 190), 0xFF00_77BE);
        for material in Material::ALL {
            assert_eq!(material.color() >> 24, 0xFF);
        }
    }
}
