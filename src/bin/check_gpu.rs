//! Quick GPU check utility to diagnose compute backend issues
//!
//! Lists adapters, compiles the fluid kernels, runs one step on a small grid
//! and compares it against the CPU backend.

use std::sync::Arc;

use fluid_engine::backend::StepInput;
use fluid_engine::{
    ComputeBackend, CpuBackend, Environment, GpuBackend, KernelSource, Material, ParticleSet, SimulationState,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp_millis()
        .init();

    println!("=== GPU Compute Check ===");

    if let Ok(backend) = std::env::var("WGPU_BACKEND") {
        log::info!("WGPU_BACKEND set to: {}", backend);
    } else {
        log::info!("WGPU_BACKEND not set, will use auto-detection");
    }

    match check_gpu() {
        Ok(max_error) => {
            println!("\nGPU compute backend OK (max deviation from CPU: {:.6})", max_error);
        }
        Err(e) => {
            println!("\nGPU compute check failed!");
            log::error!("GPU check failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn list_adapters() {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).into_iter().collect();

    println!("\nFound {} adapter(s):", adapters.len());
    for (i, adapter) in adapters.iter().enumerate() {
        let info = adapter.get_info();
        let limits = adapter.limits();
        println!("  [{}] {}", i, info.name);
        println!("      Backend: {:?}", info.backend);
        println!("      Device Type: {:?}", info.device_type);
        println!(
            "      Storage buffers per stage: {}",
            limits.max_storage_buffers_per_shader_stage
        );
    }
}

fn check_gpu() -> anyhow::Result<f32> {
    list_adapters();

    let kernels = KernelSource::embedded();
    let mut gpu = GpuBackend::new(&kernels)?;
    println!("\nUsing adapter: {}", gpu.adapter_name());
    let mut cpu = CpuBackend::new();

    let environment = Environment {
        width: 400.0,
        height: 400.0,
        gravity: 500.0,
        viscosity: 0.8,
        repulsion: 1000.0,
        surface_tension: 100.0,
        ..Environment::default()
    };
    let state = SimulationState::default()
        .with_environment(environment)
        .with_particles(Arc::new(ParticleSet::grid(400.0, 400.0, Material::Water)));
    let input = StepInput::from_state(&state, 1.0 / 120.0);

    gpu.prepare(state.particle_count())?;
    cpu.prepare(state.particle_count())?;
    let on_device = gpu.step(&input)?;
    let on_host = cpu.step(&input)?;

    let max_error = on_device
        .kinematics
        .iter()
        .zip(&on_host.kinematics)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);

    if max_error > 1e-2 {
        anyhow::bail!("GPU and CPU results diverge by {}", max_error);
    }
    Ok(max_error)
}
