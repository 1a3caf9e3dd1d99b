//! Per-particle force and integration math
//!
//! The host backend runs these functions directly. `force_integrate.wgsl`
//! implements the same model on the device; keep the two in step.

use bytemuck::{Pod, Zeroable};

use crate::constants::{kernel, pointer, thermal};
use crate::materials::{Material, MATERIAL_SLOT_WIDTH};
use crate::particles::KINEMATIC_STRIDE;

use super::StepInput;

/// Uniform block shared by both compute passes
///
/// Field order and layout must match `struct Params` in the WGSL prelude.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct StepParams {
    pub particle_count: u32,
    pub max_neighbors: u32,
    pub grid_cols: u32,
    pub grid_rows: u32,
    pub cell_size: f32,
    pub interaction_radius: f32,
    pub width: f32,
    pub height: f32,
    pub dt: f32,
    pub gravity: f32,
    pub viscosity: f32,
    pub repulsion: f32,
    pub surface_tension: f32,
    pub pointer_x: f32,
    pub pointer_y: f32,
    /// Signed pointer force, already clamped
    pub pointer_force: f32,
    pub pointer_radius: f32,
    /// `ForceMode` discriminant
    pub force_mode: u32,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub temperature_diffusion: f32,
    pub max_speed: f32,
    pub material_count: u32,
    pub _padding: u32,
}

impl StepParams {
    pub fn new(input: &StepInput<'_>, grid_cols: u32, grid_rows: u32) -> Self {
        let env = input.environment;
        let forcing = input.forcing;
        let limit = (pointer::VORTEX_MULTIPLIER * forcing.force_scale).abs();
        let pointer_force = if forcing.is_active() {
            forcing.force.clamp(-limit, limit)
        } else {
            0.0
        };

        Self {
            particle_count: input.particle_count() as u32,
            max_neighbors: kernel::MAX_NEIGHBORS as u32,
            grid_cols,
            grid_rows,
            cell_size: kernel::CELL_SIZE,
            interaction_radius: kernel::INTERACTION_RADIUS,
            width: env.width,
            height: env.height,
            dt: input.dt,
            gravity: env.gravity,
            viscosity: env.viscosity,
            repulsion: env.repulsion,
            surface_tension: env.surface_tension,
            pointer_x: forcing.pointer.x,
            pointer_y: forcing.pointer.y,
            pointer_force,
            pointer_radius: pointer::INFLUENCE_RADIUS,
            force_mode: forcing.mode as u32,
            min_temperature: env.min_temperature,
            max_temperature: env.max_temperature,
            temperature_diffusion: thermal::TEMPERATURE_DIFFUSION,
            max_speed: kernel::MAX_SPEED,
            material_count: (input.material_table.len() / MATERIAL_SLOT_WIDTH).max(1) as u32,
            _padding: 0,
        }
    }
}

/// `[density, viscosity, surface_tension, elasticity]` for a material index
///
/// Unknown indices fall back to the last slot, an empty table to water.
#[inline]
pub fn material_slot(table: &[f32], material: u32) -> [f32; 4] {
    let slots = table.len() / MATERIAL_SLOT_WIDTH;
    if slots == 0 {
        let water = Material::Water.properties();
        return [water.density, water.viscosity, water.surface_tension, water.elasticity];
    }
    let base = (material as usize).min(slots - 1) * MATERIAL_SLOT_WIDTH;
    [table[base], table[base + 1], table[base + 2], table[base + 3]]
}

/// Compute the next `[x, y, vx, vy]` and temperature of particle `i`
///
/// `neighbors` holds indices already within the interaction radius,
/// excluding `i`.
pub fn integrate_particle(
    i: usize,
    neighbors: &[u32],
    kinematics: &[f32],
    temperatures: &[f32],
    materials: &[u32],
    material_table: &[f32],
    params: &StepParams,
) -> ([f32; 4], f32) {
    let base = i * KINEMATIC_STRIDE;
    let (mut px, mut py) = (kinematics[base], kinematics[base + 1]);
    let (mut vx, mut vy) = (kinematics[base + 2], kinematics[base + 3]);
    let temperature = temperatures[i];
    let [_, visc_i, tension_i, elasticity] = material_slot(material_table, materials[i]);
    let radius = params.interaction_radius;

    let mut ax = 0.0f32;
    let mut ay = params.gravity;
    let (mut visc_x, mut visc_y) = (0.0f32, 0.0f32);
    let (mut centroid_x, mut centroid_y, mut weight) = (0.0f32, 0.0f32, 0.0f32);
    let mut heat = 0.0f32;

    for &j in neighbors {
        let j = j as usize;
        let other = j * KINEMATIC_STRIDE;
        let (jx, jy) = (kinematics[other], kinematics[other + 1]);
        let (dx, dy) = (px - jx, py - jy);
        let dist = (dx * dx + dy * dy).sqrt();
        let q = (1.0 - dist / radius).max(0.0);

        // Coincident pairs separate along x, lower index to the left
        let (nx, ny) = if dist > kernel::MIN_SEPARATION {
            (dx / dist, dy / dist)
        } else if i < j {
            (-1.0, 0.0)
        } else {
            (1.0, 0.0)
        };
        let push = params.repulsion * material_slot(material_table, materials[j])[0] * q * q;
        ax += nx * push;
        ay += ny * push;

        visc_x += q * (kinematics[other + 2] - vx);
        visc_y += q * (kinematics[other + 3] - vy);
        centroid_x += q * jx;
        centroid_y += q * jy;
        weight += q;
        heat += q * (temperatures[j] - temperature);
    }

    let mut next_temperature = temperature;
    if !neighbors.is_empty() {
        let n = neighbors.len() as f32;
        ax += params.viscosity * visc_i * visc_x / n;
        ay += params.viscosity * visc_i * visc_y / n;
        if weight > 0.0 {
            ax += params.surface_tension * tension_i * (centroid_x / weight - px);
            ay += params.surface_tension * tension_i * (centroid_y / weight - py);
        }
        next_temperature += params.temperature_diffusion * heat / n;
    }
    let next_temperature = next_temperature.clamp(params.min_temperature, params.max_temperature);

    if params.force_mode != 0 && params.pointer_force != 0.0 {
        let (ox, oy) = (px - params.pointer_x, py - params.pointer_y);
        let dist_sq = ox * ox + oy * oy;
        let dist = dist_sq.sqrt();
        if dist > kernel::MIN_SEPARATION {
            let (ux, uy) = (ox / dist, oy / dist);
            let falloff = 1.0 + dist_sq / (params.pointer_radius * params.pointer_radius);
            let strength = params.pointer_force / falloff;
            if params.force_mode == 1 {
                ax += ux * strength;
                ay += uy * strength;
            } else {
                ax -= uy * strength;
                ay += ux * strength;
            }
        }
    }

    // Semi-implicit Euler
    vx += ax * params.dt;
    vy += ay * params.dt;
    let speed = (vx * vx + vy * vy).sqrt();
    if speed > params.max_speed {
        let scale = params.max_speed / speed;
        vx *= scale;
        vy *= scale;
    }
    px += vx * params.dt;
    py += vy * params.dt;

    if params.width > 0.0 {
        if px < 0.0 {
            px = 0.0;
            vx = -vx * elasticity;
        } else if px > params.width {
            px = params.width;
            vx = -vx * elasticity;
        }
    }
    if params.height > 0.0 {
        if py < 0.0 {
            py = 0.0;
            vy = -vy * elasticity;
        } else if py > params.height {
            py = params.height;
            vy = -vy * elasticity;
        }
    }

    ([px, py, vx, vy], next_temperature)
}
