use std::collections::HashMap;

use anyhow::{anyhow, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::dissolve::DissolveFrame;
use crate::session::SessionFrame;

use super::context::GpuContext;
use super::pipeline::{Pipelines, QUAD_VERTICES};
use super::textures::{create_sampler, ImageTexture, SlotTextures};
use super::uniforms::{BackgroundUniforms, DissolveUniforms};

struct DissolveLayer {
    texture: ImageTexture,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    image_bind_group: wgpu::BindGroup,
    visible: bool,
}

pub(crate) struct GpuState {
    context: GpuContext,
    pipelines: Pipelines,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    slots: SlotTextures,
    sampler: wgpu::Sampler,
    dissolves: HashMap<u64, DissolveLayer>,
    draw_order: Vec<u64>,
}

impl GpuState {
    pub(crate) fn new<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = Pipelines::new(device, context.surface_format);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(anyhow!("failed to build render pipelines: {error}"));
        }

        let uniform_buffer =
            create_uniform_buffer::<BackgroundUniforms>(device, "background uniforms");
        let uniform_bind_group =
            create_uniform_bind_group(device, &pipelines.uniform_layout, &uniform_buffer);
        let slots = SlotTextures::new(device, &context.queue, &pipelines.slot_layout);
        let sampler = create_sampler(device);

        Ok(Self {
            context,
            pipelines,
            uniform_buffer,
            uniform_bind_group,
            slots,
            sampler,
            dissolves: HashMap::new(),
            draw_order: Vec::new(),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size != self.context.size {
            self.context.resize(new_size);
        }
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Applies the frame's uploads, then draws the background and any dissolve
    /// overlays in one pass.
    pub(crate) fn render(&mut self, frame: &SessionFrame) -> Result<(), wgpu::SurfaceError> {
        // Uploads go first so a dropped surface frame never loses a committed image.
        self.slots.apply(
            &self.context.device,
            &self.context.queue,
            &self.pipelines.slot_layout,
            &frame.scene.slots.uploads,
            self.context.max_texture_dimension,
        );
        for upload in &frame.scene.slots.uploads {
            let (width, height) = self.slots.dimensions(upload.slot);
            tracing::trace!(slot = ?upload.slot, width, height, "slot upload");
        }

        let (width, height) = (self.context.config.width, self.context.config.height);
        let uniforms = BackgroundUniforms::from_frame(&frame.scene, width, height);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.sync_dissolves(&frame.dissolves, width, height);

        let output = self.context.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.pipelines.background);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &self.slots.bind_group, &[]);
            render_pass.draw(0..QUAD_VERTICES, 0..1);

            for id in &self.draw_order {
                let Some(layer) = self.dissolves.get(id) else {
                    continue;
                };
                if !layer.visible {
                    continue;
                }
                render_pass.set_pipeline(&self.pipelines.dissolve);
                render_pass.set_bind_group(0, &layer.uniform_bind_group, &[]);
                render_pass.set_bind_group(1, &layer.image_bind_group, &[]);
                render_pass.draw(0..QUAD_VERTICES, 0..1);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        let dissolves = &mut self.dissolves;
        self.draw_order.retain(|id| {
            let keep = dissolves.get(id).is_some_and(|layer| layer.visible);
            if !keep && dissolves.remove(id).is_some() {
                debug!(id, "released dissolve resources");
            }
            keep
        });
        Ok(())
    }

    /// Creates, updates and retires overlay resources to match `frames`.
    fn sync_dissolves(&mut self, frames: &[DissolveFrame], width: u32, height: u32) {
        let device = &self.context.device;
        let queue = &self.context.queue;
        let live: Vec<u64> = frames.iter().map(|frame| frame.id).collect();
        self.draw_order.retain(|id| live.contains(id));
        self.dissolves.retain(|id, _| live.contains(id));

        for frame in frames {
            let layer = match self.dissolves.entry(frame.id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let texture =
                        ImageTexture::solid(device, queue, "dissolve texture", frame.placeholder);
                    let uniform_buffer =
                        create_uniform_buffer::<DissolveUniforms>(device, "dissolve uniforms");
                    let uniform_bind_group = create_uniform_bind_group(
                        device,
                        &self.pipelines.uniform_layout,
                        &uniform_buffer,
                    );
                    let image_bind_group = create_image_bind_group(
                        device,
                        &self.pipelines.image_layout,
                        &texture,
                        &self.sampler,
                    );
                    self.draw_order.push(frame.id);
                    entry.insert(DissolveLayer {
                        texture,
                        uniform_buffer,
                        uniform_bind_group,
                        image_bind_group,
                        visible: true,
                    })
                }
            };

            if let Some(image) = frame.upload.as_ref() {
                if layer
                    .texture
                    .upload(device, queue, image, self.context.max_texture_dimension)
                {
                    layer.image_bind_group = create_image_bind_group(
                        device,
                        &self.pipelines.image_layout,
                        &layer.texture,
                        &self.sampler,
                    );
                }
            }

            layer.visible = !frame.finished && frame.alpha > 0.0;
            let uniforms = DissolveUniforms::from_frame(frame, width, height);
            queue.write_buffer(&layer.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }
    }
}

fn create_uniform_buffer<U>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<U>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("uniform bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn create_image_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &ImageTexture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("dissolve image bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
