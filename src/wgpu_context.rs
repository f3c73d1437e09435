/// The GPU implementation of `RenderContext`.
///
/// A `WgpuContext` lives for one frame. Everything the pipeline asks for is
/// recorded into a single command encoder which the host submits with
/// `finish` once the frame is done.
use crate::context::RenderContext;
use crate::fullscreen::{BlitMode, FullscreenBlitter};
use crate::resource_manager::ManagedFbo;
use crate::texture::{Texel, Texture, TextureDesc, TextureHandle, UPLOAD_FORMAT};

pub struct WgpuContext<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    blitter: &'a mut FullscreenBlitter,
    encoder: wgpu::CommandEncoder,
}

fn color(texel: Texel) -> wgpu::Color {
    wgpu::Color {
        r: texel[0] as f64,
        g: texel[1] as f64,
        b: texel[2] as f64,
        a: texel[3] as f64,
    }
}

impl<'a> WgpuContext<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue, blitter: &'a mut FullscreenBlitter) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pipeline encoder"),
        });
        Self { device, queue, blitter, encoder }
    }

    /// The encoder everything was recorded into, for the host to add its own
    /// work (e.g. the GUI) before submitting.
    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }

    fn allocate(&self, desc: &TextureDesc) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usages.to_wgpu(desc.format),
            view_formats: &[],
        })
    }

    fn clear_attachments(&mut self, colors: &[Option<&Texture>], depth: Option<(&Texture, f32)>, clear_color: Texel) {
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colors
            .iter()
            .map(|target| {
                target.and_then(|t| t.view()).map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color(clear_color)),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        let depth_stencil_attachment = depth.and_then(|(t, value)| {
            t.view().map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(value),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            })
        });
        if color_attachments.iter().all(Option::is_none) && depth_stencil_attachment.is_none() {
            return;
        }

        // beginning and ending the pass is all it takes to clear
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

impl RenderContext for WgpuContext<'_> {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        log::debug!("allocating {}x{} {:?} texture '{}'", desc.width, desc.height, desc.format, desc.label);
        Texture::from_wgpu(desc, self.allocate(desc))
    }

    fn upload_texture(&mut self, desc: &TextureDesc, texels: &[Texel]) -> anyhow::Result<TextureHandle> {
        anyhow::ensure!(
            desc.format == UPLOAD_FORMAT,
            "texture '{}' has to be {:?} to be uploaded, not {:?}",
            desc.label,
            UPLOAD_FORMAT,
            desc.format
        );
        let expected = desc.width as usize * desc.height as usize;
        anyhow::ensure!(
            texels.len() == expected,
            "texture '{}' needs {} texels, got {}",
            desc.label,
            expected,
            texels.len()
        );

        let texture = self.allocate(desc);
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(std::mem::size_of::<Texel>() as u32 * desc.width),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(Texture::from_wgpu(desc, texture))
    }

    fn clear_texture(&mut self, texture: &Texture, color: Texel) {
        if texture.is_depth() {
            self.clear_attachments(&[], Some((texture, color[0])), color);
        } else {
            self.clear_attachments(&[Some(texture)], None, color);
        }
    }

    fn clear_fbo(&mut self, fbo: &ManagedFbo, color: Texel, depth: f32) {
        let colors: Vec<Option<&Texture>> = fbo.color_targets().iter().map(|t| t.as_deref()).collect();
        let depth_target = fbo.depth_stencil_target().map(|t| (&**t, depth));
        self.clear_attachments(&colors, depth_target, color);
    }

    fn blit(&mut self, src: &Texture, dst: &Texture) {
        if src.id() == dst.id() {
            return;
        }
        self.blitter.draw(self.device, &mut self.encoder, src, dst, BlitMode::Copy, 1.0);
    }

    fn blend(&mut self, src: &Texture, dst: &Texture, weight: f32) {
        if src.id() == dst.id() {
            return;
        }
        self.blitter.draw(self.device, &mut self.encoder, src, dst, BlitMode::Blend, weight);
    }

    fn max_color_attachments(&self) -> usize {
        // wgpu 0.18 has no `Limits::max_color_attachments`; its limit is fixed at 8.
        crate::context::MAX_COLOR_TARGETS
    }
}
