//! wgpu compute-shader FFT.
//!
//! One device, one set of buffers sized for `max_batch` frames, five compute
//! pipelines (`fft.wgsl`). Every call uploads, dispatches the whole transform
//! in a single compute pass, copies to a staging buffer and blocks on
//! `Maintain::Wait` until the readback is mapped.

use std::borrow::Cow;
use std::sync::mpsc;

use sf_audio::fft::Complex32;
use wgpu::util::DeviceExt;

use crate::error::GpuError;

const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct StageParams {
    n: u32,
    log2n: u32,
    half: u32,
    bins: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BatchParams {
    count: u32,
    inverse: u32,
    pad0: u32,
    pad1: u32,
}

/// Adapter selection knobs.
#[derive(Clone, Copy, Debug)]
pub struct AdapterRequest {
    /// Accept CPU-emulated adapters (llvmpipe, WARP). Useful in CI.
    pub allow_software: bool,
}

/// Device-resident batched real FFT of one fixed size.
pub struct WgpuFft {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    fft_size: usize,
    bins: usize,
    max_batch: usize,

    batch_uniform: wgpu::Buffer,
    real_io: wgpu::Buffer,
    bins_io: wgpu::Buffer,
    real_staging: wgpu::Buffer,
    bins_staging: wgpu::Buffer,
    // Bind groups reference these; held so their lifetime is explicit.
    _work: wgpu::Buffer,
    _twiddles: wgpu::Buffer,
    _stage_uniforms: Vec<wgpu::Buffer>,
    /// One bind group per butterfly stage; `[0]` also serves load/store.
    stage_groups: Vec<wgpu::BindGroup>,

    load_real: wgpu::ComputePipeline,
    load_spectrum: wgpu::ComputePipeline,
    butterfly: wgpu::ComputePipeline,
    store_bins: wgpu::ComputePipeline,
    store_real: wgpu::ComputePipeline,

    host_bins: Vec<[f32; 2]>,
}

impl WgpuFft {
    /// Acquire an adapter and device, then allocate every buffer and pipeline.
    ///
    /// # Errors
    /// Any adapter, device, allocation or validation failure.
    pub fn new(fft_size: usize, max_batch: usize, request: AdapterRequest) -> Result<Self, GpuError> {
        pollster::block_on(Self::create(fft_size, max_batch, request))
    }

    #[allow(clippy::too_many_lines)]
    async fn create(
        fft_size: usize,
        max_batch: usize,
        request: AdapterRequest,
    ) -> Result<Self, GpuError> {
        if !fft_size.is_power_of_two() || fft_size < 4 {
            return Err(GpuError::Unsupported("FFT size must be a power of two >= 4"));
        }
        if max_batch == 0 {
            return Err(GpuError::Batch("max_batch must be > 0"));
        }

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
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        if info.device_type == wgpu::DeviceType::Cpu && !request.allow_software {
            return Err(GpuError::SoftwareAdapter(info.name));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("stemforge FFT device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::RequestDevice(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("wgpu: {e}");
        }));
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bins = fft_size / 2 + 1;
        let log2n = fft_size.trailing_zeros();
        let n = fft_size as u64;
        let b = max_batch as u64;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stemforge FFT shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("fft.wgsl"))),
        });

        let storage = |read_only: bool| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        let uniform = wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        let entry = |binding: u32, ty: wgpu::BindingType| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty,
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FFT Bind Group Layout"),
            entries: &[
                entry(0, uniform),
                entry(1, uniform),
                entry(2, storage(false)),
                entry(3, storage(false)),
                entry(4, storage(false)),
                entry(5, storage(true)),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("FFT Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point,
            })
        };
        let load_real = pipeline("load_real");
        let load_spectrum = pipeline("load_spectrum");
        let butterfly = pipeline("butterfly");
        let store_bins = pipeline("store_bins");
        let store_real = pipeline("store_real");

        let twiddle_table: Vec<[f32; 2]> = (0..fft_size / 2)
            .map(|k| {
                let angle = -2.0 * std::f64::consts::PI * k as f64 / fft_size as f64;
                [angle.cos() as f32, angle.sin() as f32]
            })
            .collect();
        let twiddles = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("FFT Twiddles"),
            contents: bytemuck::cast_slice(&twiddle_table),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let buffer = |label: &str, size: u64, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };
        let io = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let readback = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;

        let real_io = buffer("FFT Real IO", n * b * 4, io);
        let bins_io = buffer("FFT Bins IO", bins as u64 * b * 8, io);
        let work = buffer("FFT Work", n * b * 8, wgpu::BufferUsages::STORAGE);
        let real_staging = buffer("FFT Real Staging", n * b * 4, readback);
        let bins_staging = buffer("FFT Bins Staging", bins as u64 * b * 8, readback);
        let batch_uniform = buffer(
            "FFT Batch Params",
            std::mem::size_of::<BatchParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let stage_uniforms: Vec<wgpu::Buffer> = (0..log2n)
            .map(|s| {
                let params = StageParams {
                    n: fft_size as u32,
                    log2n,
                    half: 1 << s,
                    bins: bins as u32,
                };
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("FFT Stage Params"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                })
            })
            .collect();

        let stage_groups = stage_uniforms
            .iter()
            .map(|stage| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("FFT Bind Group"),
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: stage.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: batch_uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: real_io.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: bins_io.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: work.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: twiddles.as_entire_binding(),
                        },
                    ],
                })
            })
            .collect();

        if let Some(e) = device.pop_error_scope().await {
            return Err(GpuError::Allocation(e.to_string()));
        }
        if let Some(e) = device.pop_error_scope().await {
            return Err(GpuError::Allocation(e.to_string()));
        }

        log::info!(
            "GPU FFT ready on {} ({:?}), size {fft_size}, batch {max_batch}",
            info.name,
            info.backend
        );

        Ok(Self {
            device,
            queue,
            info,
            fft_size,
            bins,
            max_batch,
            batch_uniform,
            real_io,
            bins_io,
            real_staging,
            bins_staging,
            _work: work,
            _twiddles: twiddles,
            _stage_uniforms: stage_uniforms,
            stage_groups,
            load_real,
            load_spectrum,
            butterfly,
            store_bins,
            store_real,
            host_bins: vec![[0.0; 2]; bins * max_batch],
        })
    }

    /// Frames per call the buffers were sized for.
    #[must_use]
    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Adapter name and backend, e.g. `"Radeon RX 7900 (Vulkan)"`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} ({:?})", self.info.name, self.info.backend)
    }

    /// Forward transform of `inputs.len()` frames in one submission.
    ///
    /// # Errors
    /// Batch larger than `max_batch`, wrong lengths, or a readback failure.
    pub fn forward(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [Complex32]],
    ) -> Result<(), GpuError> {
        let count = inputs.len();
        if count == 0 || count > self.max_batch || outputs.len() != count {
            return Err(GpuError::Batch("forward batch size"));
        }
        let frame_bytes = (self.fft_size * 4) as u64;
        for (k, input) in inputs.iter().enumerate() {
            if input.len() != self.fft_size {
                return Err(GpuError::Batch("forward input length"));
            }
            self.queue
                .write_buffer(&self.real_io, k as u64 * frame_bytes, bytemuck::cast_slice(input));
        }

        let bytes = (self.bins * count * 8) as u64;
        self.dispatch(count, false, bytes);
        let bins = self.bins;
        Self::read_back(&self.device, &self.bins_staging, bytes, |raw| {
            let values: &[[f32; 2]] = bytemuck::cast_slice(raw);
            for (out, chunk) in outputs.iter_mut().zip(values.chunks(bins)) {
                for (dst, v) in out.iter_mut().zip(chunk) {
                    *dst = Complex32::new(v[0], v[1]);
                }
            }
        })
    }

    /// Inverse transform of contiguous spectra into contiguous frames.
    ///
    /// # Errors
    /// Batch larger than `max_batch`, wrong lengths, or a readback failure.
    pub fn inverse(&mut self, spectra: &[Complex32], frames: &mut [f32]) -> Result<(), GpuError> {
        if spectra.len() % self.bins != 0 {
            return Err(GpuError::Batch("inverse spectra length"));
        }
        let count = spectra.len() / self.bins;
        if count == 0 || count > self.max_batch || frames.len() != count * self.fft_size {
            return Err(GpuError::Batch("inverse batch size"));
        }

        for (dst, c) in self.host_bins.iter_mut().zip(spectra) {
            *dst = [c.re, c.im];
        }
        self.queue.write_buffer(
            &self.bins_io,
            0,
            bytemuck::cast_slice(&self.host_bins[..spectra.len()]),
        );

        let bytes = (self.fft_size * count * 4) as u64;
        self.dispatch(count, true, bytes);
        Self::read_back(&self.device, &self.real_staging, bytes, |raw| {
            let values: &[f32] = bytemuck::cast_slice(raw);
            frames.copy_from_slice(&values[..frames.len()]);
        })
    }

    /// Encode load → butterflies → store, then the copy to staging, and submit.
    fn dispatch(&self, count: usize, inverse: bool, readback_bytes: u64) {
        let params = BatchParams {
            count: count as u32,
            inverse: u32::from(inverse),
            pad0: 0,
            pad1: 0,
        };
        self.queue
            .write_buffer(&self.batch_uniform, 0, bytemuck::bytes_of(&params));

        let (load, store, store_items, source, staging) = if inverse {
            (
                &self.load_spectrum,
                &self.store_real,
                self.fft_size * count,
                &self.real_io,
                &self.real_staging,
            )
        } else {
            (
                &self.load_real,
                &self.store_bins,
                self.bins * count,
                &self.bins_io,
                &self.bins_staging,
            )
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FFT Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("FFT Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(load);
            pass.set_bind_group(0, &self.stage_groups[0], &[]);
            pass.dispatch_workgroups(groups(self.fft_size * count), 1, 1);

            pass.set_pipeline(&self.butterfly);
            for group in &self.stage_groups {
                pass.set_bind_group(0, group, &[]);
                pass.dispatch_workgroups(groups(self.fft_size / 2 * count), 1, 1);
            }

            pass.set_pipeline(store);
            pass.set_bind_group(0, &self.stage_groups[0], &[]);
            pass.dispatch_workgroups(groups(store_items), 1, 1);
        }
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, readback_bytes);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Map `bytes` of `staging`, wait for the device, hand the bytes to `read`.
    fn read_back(
        device: &wgpu::Device,
        staging: &wgpu::Buffer,
        bytes: u64,
        read: impl FnOnce(&[u8]),
    ) -> Result<(), GpuError> {
        let slice = staging.slice(..bytes);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::Map("map callback dropped".to_string()))?
            .map_err(|e| GpuError::Map(e.to_string()))?;
        {
            let view = slice.get_mapped_range();
            read(&view);
        }
        staging.unmap();
        Ok(())
    }
}

#[inline(always)]
fn groups(items: usize) -> u32 {
    (items as u32).div_ceil(WORKGROUP_SIZE)
}
