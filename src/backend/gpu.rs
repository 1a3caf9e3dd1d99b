//! wgpu compute backend
//!
//! The host builds the dense cell grid (counting sort) each step and uploads
//! it with the particle arrays. Two compute passes then run on the device,
//! `build_neighbors` followed by `integrate`, and the output buffers are read
//! back through staging buffers.

use bytemuck::Pod;

use crate::constants::kernel;
use crate::error::{BackendErrorContext, EngineError, EngineResult};
use crate::materials::{Material, MATERIAL_SLOT_WIDTH};
use crate::particles::KINEMATIC_STRIDE;
use crate::spatial_hash::CellGrid;

use super::kernel::StepParams;
use super::kernel_source::{KernelSource, FORCE_ENTRY, NEIGHBOR_ENTRY};
use super::lifecycle::{BackendLifecycle, BufferState, DensityOverrides};
use super::{ComputeBackend, StepInput, StepOutput};

/// wgpu rejects zero-sized bindings
const MIN_BUFFER_SIZE: u64 = 16;

/// Storage buffers bound by the force pass
const REQUIRED_STORAGE_BUFFERS: u32 = 8;

const TABLE_LEN: usize = Material::COUNT * MATERIAL_SLOT_WIDTH;

fn buffer_size(bytes: usize) -> u64 {
    (bytes as u64).max(MIN_BUFFER_SIZE)
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compiled pipelines; independent of particle count
struct GpuPipelines {
    neighbor_layout: wgpu::BindGroupLayout,
    force_layout: wgpu::BindGroupLayout,
    neighbor_pipeline: wgpu::ComputePipeline,
    force_pipeline: wgpu::ComputePipeline,
}

impl GpuPipelines {
    fn new(device: &wgpu::Device, kernels: &KernelSource) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fluid Kernels"),
            source: wgpu::ShaderSource::Wgsl(kernels.source().into()),
        });

        let neighbor_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Neighbor Build Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, false),
                storage_entry(6, false),
            ],
        });

        let force_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Force Integrate Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(5, false),
                storage_entry(6, false),
                storage_entry(10, false),
                storage_entry(11, true),
                storage_entry(12, false),
                storage_entry(13, true),
                storage_entry(14, true),
            ],
        });

        let neighbor_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Neighbor Build Pipeline Layout"),
            bind_group_layouts: &[&neighbor_layout],
            push_constant_ranges: &[],
        });
        let force_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Force Integrate Pipeline Layout"),
            bind_group_layouts: &[&force_layout],
            push_constant_ranges: &[],
        });

        let neighbor_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Neighbor Build Pipeline"),
            layout: Some(&neighbor_pipeline_layout),
            module: &module,
            entry_point: NEIGHBOR_ENTRY,
        });
        let force_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Force Integrate Pipeline"),
            layout: Some(&force_pipeline_layout),
            module: &module,
            entry_point: FORCE_ENTRY,
        });

        Self {
            neighbor_layout,
            force_layout,
            neighbor_pipeline,
            force_pipeline,
        }
    }
}

/// Device buffers sized for one particle count and grid
struct GpuBuffers {
    params: wgpu::Buffer,
    particles_in: wgpu::Buffer,
    particles_out: wgpu::Buffer,
    temperatures_in: wgpu::Buffer,
    temperatures_out: wgpu::Buffer,
    materials: wgpu::Buffer,
    material_table: wgpu::Buffer,
    cell_offsets: wgpu::Buffer,
    cell_counts: wgpu::Buffer,
    sorted_indices: wgpu::Buffer,
    neighbor_indices: wgpu::Buffer,
    neighbor_counts: wgpu::Buffer,
    staging_particles: wgpu::Buffer,
    staging_temperatures: wgpu::Buffer,
    neighbor_bind_group: wgpu::BindGroup,
    force_bind_group: wgpu::BindGroup,
    grid_cells: usize,
}

impl GpuBuffers {
    fn new(device: &wgpu::Device, pipelines: &GpuPipelines, particle_count: usize, grid_cells: usize) -> Self {
        let create = |label: &str, bytes: usize, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: buffer_size(bytes),
                usage,
                mapped_at_creation: false,
            })
        };
        let input = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let output = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC;
        let staging = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
        let word = std::mem::size_of::<u32>();
        let particle_bytes = particle_count * KINEMATIC_STRIDE * word;

        let params = create(
            "Fluid Params Buffer",
            std::mem::size_of::<StepParams>(),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let particles_in = create("Particles In Buffer", particle_bytes, input);
        let particles_out = create("Particles Out Buffer", particle_bytes, output);
        let temperatures_in = create("Temperatures In Buffer", particle_count * word, input);
        let temperatures_out = create("Temperatures Out Buffer", particle_count * word, output);
        let materials = create("Materials Buffer", particle_count * word, input);
        let material_table = create("Material Table Buffer", TABLE_LEN * word, input);
        let cell_offsets = create("Cell Offsets Buffer", grid_cells * word, input);
        let cell_counts = create("Cell Counts Buffer", grid_cells * word, input);
        let sorted_indices = create("Sorted Indices Buffer", particle_count * word, input);
        let neighbor_indices = create(
            "Neighbor Indices Buffer",
            particle_count * kernel::MAX_NEIGHBORS * word,
            wgpu::BufferUsages::STORAGE,
        );
        let neighbor_counts = create("Neighbor Counts Buffer", particle_count * word, wgpu::BufferUsages::STORAGE);
        let staging_particles = create("Particles Staging Buffer", particle_bytes, staging);
        let staging_temperatures = create("Temperatures Staging Buffer", particle_count * word, staging);

        let neighbor_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Neighbor Build Bind Group"),
            layout: &pipelines.neighbor_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: particles_in.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: cell_offsets.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: cell_counts.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: sorted_indices.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: neighbor_indices.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 6, resource: neighbor_counts.as_entire_binding() },
            ],
        });

        let force_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Force Integrate Bind Group"),
            layout: &pipelines.force_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: particles_in.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: neighbor_indices.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 6, resource: neighbor_counts.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 10, resource: particles_out.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 11, resource: temperatures_in.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 12, resource: temperatures_out.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 13, resource: materials.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 14, resource: material_table.as_entire_binding() },
            ],
        });

        Self {
            params,
            particles_in,
            particles_out,
            temperatures_in,
            temperatures_out,
            materials,
            material_table,
            cell_offsets,
            cell_counts,
            sorted_indices,
            neighbor_indices,
            neighbor_counts,
            staging_particles,
            staging_temperatures,
            neighbor_bind_group,
            force_bind_group,
            grid_cells,
        }
    }
}

impl std::fmt::Debug for GpuBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffers").field("grid_cells", &self.grid_cells).finish()
    }
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipelines: GpuPipelines,
    buffers: BufferState<GpuBuffers>,
    grid: CellGrid,
    overrides: DensityOverrides,
    table_scratch: Vec<f32>,
}

impl GpuBackend {
    /// Acquire a device and compile the kernels
    ///
    /// Fails with `BackendUnavailable` when no adapter or device can be
    /// obtained, and with `ShaderCompilation` when the kernels do not validate.
    pub fn new(kernels: &KernelSource) -> EngineResult<Self> {
        pollster::block_on(Self::new_async(kernels))
    }

    pub async fn new_async(kernels: &KernelSource) -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::BackendUnavailable {
                message: "no compatible GPU adapter found".to_string(),
            })?;

        let info = adapter.get_info();
        let storage_limit = adapter.limits().max_storage_buffers_per_shader_stage;
        if storage_limit < REQUIRED_STORAGE_BUFFERS {
            return Err(EngineError::BackendUnavailable {
                message: format!(
                    "adapter {} supports {} storage buffers per stage, {} required",
                    info.name, storage_limit, REQUIRED_STORAGE_BUFFERS
                ),
            });
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fluid Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::BackendUnavailable {
                message: format!("failed to create device on {}: {}", info.name, e),
            })?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = GpuPipelines::new(&device, kernels);
        if let Some(error) = device.pop_error_scope().await {
            return Err(EngineError::ShaderCompilation {
                shader: "fluid kernels".to_string(),
                error: error.to_string(),
            });
        }

        log::info!("Initialized GPU compute backend on {} ({:?})", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
            pipelines,
            buffers: BufferState::Uninitialized,
            grid: CellGrid::new(kernel::CELL_SIZE, 1.0, 1.0),
            overrides: DensityOverrides::default(),
            table_scratch: Vec::with_capacity(TABLE_LEN),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn allocate(&mut self, particle_count: usize) {
        // Release before reallocating
        self.buffers = BufferState::Uninitialized;
        let buffers = GpuBuffers::new(&self.device, &self.pipelines, particle_count, self.grid.cell_count());
        self.buffers = BufferState::Ready {
            particle_count,
            buffers,
        };
    }

    /// Map both staging buffers and copy their contents out
    fn read_back(&self, buffers: &GpuBuffers, particle_count: usize) -> EngineResult<StepOutput> {
        let word = std::mem::size_of::<f32>() as u64;
        let particle_bytes = particle_count as u64 * KINEMATIC_STRIDE as u64 * word;
        let temperature_bytes = particle_count as u64 * word;

        let particles_slice = buffers.staging_particles.slice(..particle_bytes);
        let temperatures_slice = buffers.staging_temperatures.slice(..temperature_bytes);

        let (tx, rx) = flume::bounded(2);
        let tx_temperatures = tx.clone();
        particles_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        temperatures_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx_temperatures.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        for _ in 0..2 {
            rx.recv()
                .backend_context("staging map channel closed")?
                .backend_context("failed to map staging buffer")?;
        }

        let kinematics = copy_mapped::<f32>(&particles_slice);
        let temperatures = copy_mapped::<f32>(&temperatures_slice);
        buffers.staging_particles.unmap();
        buffers.staging_temperatures.unmap();

        Ok(StepOutput {
            kinematics,
            temperatures,
        })
    }
}

fn copy_mapped<T: Pod>(slice: &wgpu::BufferSlice<'_>) -> Vec<T> {
    let data = slice.get_mapped_range();
    bytemuck::cast_slice::<u8, T>(&data).to_vec()
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn prepare(&mut self, particle_count: usize) -> EngineResult<()> {
        if self.buffers.is_closed() {
            return Err(EngineError::BackendClosed);
        }
        if self.buffers.is_ready_for(particle_count) {
            return Ok(());
        }

        log::debug!(
            "Resizing GPU buffers: {:?} -> {} particles",
            self.buffers.particle_count(),
            particle_count
        );
        self.allocate(particle_count);
        Ok(())
    }

    fn step(&mut self, input: &StepInput<'_>) -> EngineResult<StepOutput> {
        let n = input.validated_count()?;
        self.buffers.ready_mut(n)?;
        if n == 0 {
            return Ok(StepOutput::default());
        }

        // Step 1: host-side cell grid
        let env = input.environment;
        self.grid.rebuild(input.kinematics, env.width, env.height);
        if self.buffers.ready_mut(n)?.grid_cells != self.grid.cell_count() {
            log::debug!(
                "Canvas changed; resizing GPU grid to {}x{} cells",
                self.grid.cols(),
                self.grid.rows()
            );
            self.allocate(n);
        }

        let mut params = StepParams::new(input, self.grid.cols(), self.grid.rows());
        params.material_count = params.material_count.min(Material::COUNT as u32);
        self.overrides.apply(input.material_table, &mut self.table_scratch);
        self.table_scratch.resize(TABLE_LEN, 0.0);

        let buffers = self.buffers.ready_mut(n)?;

        // Step 2: uploads
        self.queue.write_buffer(&buffers.params, 0, bytemuck::bytes_of(&params));
        self.queue.write_buffer(&buffers.particles_in, 0, bytemuck::cast_slice(input.kinematics));
        self.queue.write_buffer(&buffers.temperatures_in, 0, bytemuck::cast_slice(input.temperatures));
        self.queue.write_buffer(&buffers.materials, 0, bytemuck::cast_slice(input.materials));
        self.queue.write_buffer(&buffers.material_table, 0, bytemuck::cast_slice(&self.table_scratch));
        self.queue.write_buffer(&buffers.cell_offsets, 0, bytemuck::cast_slice(self.grid.cell_offsets()));
        self.queue.write_buffer(&buffers.cell_counts, 0, bytemuck::cast_slice(self.grid.cell_counts()));
        self.queue.write_buffer(&buffers.sorted_indices, 0, bytemuck::cast_slice(self.grid.sorted_indices()));

        // Step 3: both passes in one submission
        let workgroups = (n as u32 + kernel::WORKGROUP_SIZE - 1) / kernel::WORKGROUP_SIZE;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fluid Step Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Neighbor Build Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.neighbor_pipeline);
            pass.set_bind_group(0, &buffers.neighbor_bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Force Integrate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.force_pipeline);
            pass.set_bind_group(0, &buffers.force_bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        let word = std::mem::size_of::<f32>() as u64;
        let particle_bytes = (n * KINEMATIC_STRIDE) as u64 * word;
        encoder.copy_buffer_to_buffer(&buffers.particles_out, 0, &buffers.staging_particles, 0, particle_bytes);
        encoder.copy_buffer_to_buffer(
            &buffers.temperatures_out,
            0,
            &buffers.staging_temperatures,
            0,
            n as u64 * word,
        );
        self.queue.submit(Some(encoder.finish()));

        // Step 4: readback
        let buffers = match &self.buffers {
            BufferState::Ready { buffers, .. } => buffers,
            _ => return Err(EngineError::BackendClosed),
        };
        self.read_back(buffers, n)
    }

    fn set_material_density(&mut self, material: Material, density: f32) {
        self.overrides.set(material, density);
    }

    fn lifecycle(&self) -> BackendLifecycle {
        self.buffers.lifecycle()
    }

    fn close(&mut self) {
        if !self.buffers.is_closed() {
            log::info!("Closing GPU compute backend on {}", self.adapter_name);
            self.buffers = BufferState::Closed;
            self.device.poll(wgpu::Maintain::Wait);
        }
    }
}

impl Drop for GpuBackend {
    fn drop(&mut self) {
        self.close();
    }
}
