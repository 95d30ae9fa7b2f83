//! Uploads the composed window image to the GPU and presents it.

use anyhow::anyhow;
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

const BACKGROUND: Color = Color::BLACK;

/// The device and queue used for presenting.
struct Gpu {
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    async fn open(instance: &Instance, surface: &Surface) -> anyhow::Result<Self> {
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                compatible_surface: Some(surface),
                ..Default::default()
            })
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        log_adapter(&adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

fn log_adapter(info: &AdapterInfo) {
    let backend = match info.backend {
        Backend::Empty => "dummy",
        Backend::Vulkan => "Vulkan",
        Backend::Metal => "Metal",
        Backend::Dx12 => "DX12",
        Backend::Dx11 => "DX11",
        Backend::Gl => "OpenGL",
        Backend::BrowserWebGpu => "WebGPU",
    };
    log::info!("using graphics adapter [{}] {}", backend, info.name);
}

/// A fixed-size window showing a single texture.
pub struct Renderer {
    surface: Surface,
    surface_format: TextureFormat,
    gpu: Gpu,
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    texture: Texture,
    texture_size: Extent3d,
    bind_group: BindGroup,
    resolution: Resolution,
    _instance: Instance,
    /// Surface must be destroyed before the window.
    window: winit::window::Window,
}

impl Renderer {
    pub fn open<T>(
        event_loop: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
    ) -> anyhow::Result<Self> {
        let window = WindowBuilder::new()
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_title(title)
            .build(event_loop)?;

        // The OpenGL backend panics spuriously, so don't enable it.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        // Safety: the window outlives the surface, since it is dropped last.
        let surface = unsafe { instance.create_surface(&window)? };
        let gpu = pollster::block_on(Gpu::open(&instance, &surface))?;

        let formats = surface.get_capabilities(&gpu.adapter).formats;
        let surface_format = formats
            .iter()
            .copied()
            .find(TextureFormat::is_srgb)
            .or_else(|| formats.first().copied())
            .ok_or_else(|| anyhow!("adapter cannot render to window surface"))?;

        let shader = gpu.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("window texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        let bind_group_layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("window_texture_layout"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });
        let pipeline = create_pipeline(&gpu.device, &shader, &bind_group_layout, surface_format);
        let sampler = gpu.device.create_sampler(&SamplerDescriptor::default());

        let texture_size = Extent3d {
            width: resolution.width(),
            height: resolution.height(),
            depth_or_array_layers: 1,
        };
        let texture = create_texture(&gpu.device, texture_size);
        let bind_group = create_bind_group(&gpu.device, &bind_group_layout, &texture, &sampler);

        let this = Self {
            surface,
            surface_format,
            gpu,
            pipeline,
            bind_group_layout,
            sampler,
            texture,
            texture_size,
            bind_group,
            resolution,
            _instance: instance,
            window,
        };
        this.configure_surface();
        Ok(this)
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }

    /// Replaces the displayed image with RGBA8 `data` of the given resolution.
    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        assert_eq!(res.num_pixels() * 4, data.len() as u64);

        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if size != self.texture_size {
            log::debug!("reallocating window texture for {res}");
            self.texture = create_texture(&self.gpu.device, size);
            self.texture_size = size;
            // The bind group refers to the old texture.
            self.bind_group = create_bind_group(
                &self.gpu.device,
                &self.bind_group_layout,
                &self.texture,
                &self.sampler,
            );
        }

        self.gpu.queue.write_texture(
            ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: Origin3d::default(),
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: None,
            },
            size,
        );
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.configure_surface();
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(e.into()),
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }

    fn configure_surface(&self) {
        let size = self.window.inner_size();
        if size.width != self.resolution.width() || size.height != self.resolution.height() {
            // The window is not resizable, but some window managers ignore that.
            log::warn!(
                "window size {}x{} does not match the configured {}",
                size.width,
                size.height,
                self.resolution,
            );
        }
        log::debug!(
            "configuring surface at {} ({:?})",
            self.resolution,
            self.surface_format
        );
        self.surface.configure(
            &self.gpu.device,
            &SurfaceConfiguration {
                usage: TextureUsages::RENDER_ATTACHMENT,
                format: self.surface_format,
                width: self.resolution.width(),
                height: self.resolution.height(),
                present_mode: PresentMode::Fifo,
                alpha_mode: CompositeAlphaMode::Auto,
                view_formats: Vec::new(),
            },
        );
    }
}

fn create_pipeline(
    device: &Device,
    shader: &ShaderModule,
    bind_group_layout: &BindGroupLayout,
    format: TextureFormat,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("textured_quad"),
        layout: Some(&device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        })),
        vertex: VertexState {
            module: shader,
            entry_point: "vert",
            buffers: &[],
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: "frag",
            targets: &[Some(ColorTargetState {
                format,
                write_mask: ColorWrites::ALL,
                blend: None,
            })],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}

fn create_texture(device: &Device, size: Extent3d) -> Texture {
    device.create_texture(&TextureDescriptor {
        label: Some("window_texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_bind_group(
    device: &Device,
    layout: &BindGroupLayout,
    texture: &Texture,
    sampler: &Sampler,
) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("window_texture_bind_group"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&texture.create_view(&Default::default())),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
        ],
    })
}
