use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::slots::{SlotId, SlotUpload};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// One sampled RGBA texture that is re-created whenever its source dimensions change.
pub(crate) struct ImageTexture {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
    label: &'static str,
}

impl ImageTexture {
    pub fn solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &'static str,
        rgba: [u8; 4],
    ) -> Self {
        Self::with_data(device, queue, label, 1, 1, &rgba)
    }

    fn with_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &'static str,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            label,
        }
    }

    /// Writes `image` into the texture. Returns true when the texture had to be
    /// re-created, which invalidates any bind group built from the old view.
    /// Oversized or empty images are logged and skipped.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &RgbaImage,
        max_dimension: u32,
    ) -> bool {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            tracing::warn!(texture = self.label, "ignoring empty frame");
            return false;
        }
        if width > max_dimension || height > max_dimension {
            tracing::warn!(
                texture = self.label,
                width,
                height,
                max_dimension,
                "frame exceeds GPU texture limit; keeping previous contents"
            );
            return false;
        }

        if (width, height) != (self.width, self.height) {
            *self = Self::with_data(device, queue, self.label, width, height, image.as_raw());
            tracing::debug!(texture = self.label, width, height, "re-created texture");
            return true;
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        false
    }
}

pub(crate) fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("image sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// The two ping-pong textures and the bind group the background shader reads.
pub(crate) struct SlotTextures {
    slots: [ImageTexture; 2],
    sampler: wgpu::Sampler,
    pub bind_group: wgpu::BindGroup,
}

impl SlotTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        let slots = [
            ImageTexture::solid(device, queue, "slot texture A", TRANSPARENT),
            ImageTexture::solid(device, queue, "slot texture B", TRANSPARENT),
        ];
        let sampler = create_sampler(device);
        let bind_group = build_bind_group(device, layout, &slots, &sampler);
        Self {
            slots,
            sampler,
            bind_group,
        }
    }

    pub fn apply(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        uploads: &[SlotUpload],
        max_dimension: u32,
    ) {
        let mut rebuilt = false;
        for upload in uploads {
            let slot = &mut self.slots[upload.slot.index()];
            rebuilt |= slot.upload(device, queue, &upload.image, max_dimension);
        }
        if rebuilt {
            self.bind_group = build_bind_group(device, layout, &self.slots, &self.sampler);
        }
    }

    pub fn dimensions(&self, slot: SlotId) -> (u32, u32) {
        let texture = &self.slots[slot.index()];
        (texture.width, texture.height)
    }
}

fn build_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    slots: &[ImageTexture; 2],
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("slot bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&slots[0].view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&slots[1].view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
