pub mod ascii;
pub mod camera;
pub mod raster;
pub mod resources;
pub mod stylized;

pub use ascii::{CharGrid, Palette, StylizationConfig, StylizeError};
pub use camera::{OrbitControls, PerspectiveCamera, ViewPose};
pub use resources::{GpuResources, ResourceStats};
pub use stylized::{DisplayHost, StylizedRenderer, SurfaceContainer};

use std::sync::{mpsc, Arc};
use winit::dpi::PhysicalSize;
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("surface frame unavailable: {0}")]
    FrameUnavailable(#[from] wgpu::SurfaceError),
    #[error("capture readback failed: {0}")]
    Readback(String),
}

/// Tessellated UI for one frame.
pub struct UiFrame<'a> {
    pub primitives: &'a [egui::ClippedPrimitive],
    pub textures_delta: &'a egui::TexturesDelta,
    pub pixels_per_point: f32,
    pub clear: [u8; 3],
}

/// Window-sized RGBA8 readback of a presented frame.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub struct RenderContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    egui_renderer: egui_wgpu::Renderer,
}

impl RenderContext {
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Viewer Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        }))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let egui_renderer =
            egui_wgpu::Renderer::new(&device, format, egui_wgpu::RendererOptions::default());

        log::info!(
            "Graphics initialized: {}x{}, format {:?}, adapter {}",
            surface_config.width,
            surface_config.height,
            format,
            adapter.get_info().name
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            egui_renderer,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.device, &self.surface_config);
        log::debug!("Surface resized to {}x{}", new_size.width, new_size.height);
    }

    /// Draws the UI to the window. With `capture`, the same frame is also
    /// drawn offscreen and read back.
    pub fn present(
        &mut self,
        frame: &UiFrame<'_>,
        capture: bool,
    ) -> Result<Option<CapturedImage>, RenderError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                log::debug!("Surface reconfigured after loss; skipping frame");
                return Ok(None);
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let (width, height) = self.size();
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: frame.pixels_per_point,
        };
        for (id, delta) in &frame.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewer Encoder"),
            });
        let mut command_buffers = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            frame.primitives,
            &screen,
        );

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.encode_ui_pass(&mut encoder, &view, frame, &screen);

        let readback = if capture {
            Some(self.encode_capture(&mut encoder, frame, &screen))
        } else {
            None
        };

        command_buffers.push(encoder.finish());
        self.queue.submit(command_buffers);
        surface_texture.present();

        for id in &frame.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        readback
            .map(|(_texture, buffer, padded_row)| self.finish_capture(&buffer, padded_row))
            .transpose()
    }

    fn encode_ui_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        frame: &UiFrame<'_>,
        screen: &egui_wgpu::ScreenDescriptor,
    ) {
        let [r, g, b] = frame.clear;
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Viewer UI Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64 / 255.0,
                        g: g as f64 / 255.0,
                        b: b as f64 / 255.0,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let mut pass = pass.forget_lifetime();
        self.egui_renderer.render(&mut pass, frame.primitives, screen);
    }

    fn encode_capture(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &UiFrame<'_>,
        screen: &egui_wgpu::ScreenDescriptor,
    ) -> (wgpu::Texture, wgpu::Buffer, u32) {
        let (width, height) = self.size();
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.surface_config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.encode_ui_pass(encoder, &view, frame, screen);

        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = (width * 4).div_ceil(align) * align;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Staging Buffer"),
            size: (padded_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        (texture, buffer, padded_row)
    }

    fn finish_capture(
        &self,
        buffer: &wgpu::Buffer,
        padded_row: u32,
    ) -> Result<CapturedImage, RenderError> {
        let (width, height) = self.size();
        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|err| RenderError::Readback(err.to_string()))?;
        rx.recv()
            .map_err(|err| RenderError::Readback(err.to_string()))?
            .map_err(|err| RenderError::Readback(err.to_string()))?;

        let bgra = matches!(
            self.surface_config.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let mapped = slice.get_mapped_range();
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_row) as usize;
            let end = start + (width * 4) as usize;
            rgba.extend_from_slice(&mapped[start..end]);
        }
        drop(mapped);
        buffer.unmap();

        if bgra {
            for texel in rgba.chunks_exact_mut(4) {
                texel.swap(0, 2);
            }
        }
        Ok(CapturedImage {
            width,
            height,
            rgba,
        })
    }
}
