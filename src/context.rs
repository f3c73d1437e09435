/// The boundary between the pipeline and the rendering engine.
///
/// Passes and the resource manager never talk to a GPU API directly. They
/// allocate textures and issue the handful of built-in operations below
/// through a `RenderContext`, which is handed to them explicitly every time
/// they are allowed to do GPU work.
use crate::resource_manager::ManagedFbo;
use crate::texture::{is_depth_format, Texel, Texture, TextureDesc, TextureHandle, TextureStorage};

/// Number of color attachments a framebuffer can have (the default
/// `max_color_attachments` limit of wgpu).
pub const MAX_COLOR_TARGETS: usize = 8;

pub trait RenderContext {
    /// Allocate a texture. The contents are undefined until written.
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle;

    /// Allocate a texture and fill it with `texels` (row-major, `width * height` entries).
    fn upload_texture(&mut self, desc: &TextureDesc, texels: &[Texel]) -> anyhow::Result<TextureHandle>;

    /// Fill the whole texture with `color`. Depth textures are cleared to the
    /// red component.
    fn clear_texture(&mut self, texture: &Texture, color: Texel);

    /// Clear every attachment of `fbo`: color targets to `color`, the
    /// depth/stencil target to `depth`.
    fn clear_fbo(&mut self, fbo: &ManagedFbo, color: Texel, depth: f32);

    /// Copy `src` into `dst`, stretching if the sizes differ.
    fn blit(&mut self, src: &Texture, dst: &Texture);

    /// `dst = dst * (1 - weight) + src * weight`, per texel.
    fn blend(&mut self, src: &Texture, dst: &Texture, weight: f32);

    fn max_color_attachments(&self) -> usize {
        MAX_COLOR_TARGETS
    }
}

/**
An engine that keeps every texture in memory and executes the built-in
operations on the CPU, immediately.

This is what the tests render with. It can run a whole pipeline without a
window or a GPU, and `Texture::read_texels` can inspect any channel afterwards.
*/
#[derive(Debug)]
pub struct HeadlessContext {
    allocations: usize,
    max_color_attachments: usize,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::with_max_color_attachments(MAX_COLOR_TARGETS)
    }
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that pretends the platform supports only `count` color
    /// attachments per framebuffer.
    pub fn with_max_color_attachments(count: usize) -> Self {
        Self { allocations: 0, max_color_attachments: count }
    }

    /// How many textures have been created through this context so far.
    pub fn allocation_count(&self) -> usize {
        self.allocations
    }
}

fn headless_texels(texture: &Texture) -> Option<&std::cell::RefCell<Vec<Texel>>> {
    match &texture.storage {
        TextureStorage::Headless(texels) => Some(texels),
        TextureStorage::Gpu { .. } => {
            log::warn!("headless context cannot access GPU texture '{}'", texture.label);
            None
        }
    }
}

/// Nearest-neighbour lookup of the texel of `src` that covers (x, y) of a
/// `dst_width` x `dst_height` image.
fn sample_nearest(src: &[Texel], src_width: u32, src_height: u32, dst_width: u32, dst_height: u32, x: u32, y: u32) -> Texel {
    let sx = (x as u64 * src_width as u64 / dst_width.max(1) as u64) as u32;
    let sy = (y as u64 * src_height as u64 / dst_height.max(1) as u64) as u32;
    src[(sy.min(src_height - 1) * src_width + sx.min(src_width - 1)) as usize]
}

impl HeadlessContext {
    /// Produce the contents of `src` at the resolution of `dst`.
    fn resampled(src: &Texture, dst: &Texture) -> Option<Vec<Texel>> {
        let src_texels = headless_texels(src)?.borrow().clone();
        if src.size() == dst.size() {
            return Some(src_texels);
        }
        if src.width == 0 || src.height == 0 {
            return None;
        }
        let mut out = Vec::with_capacity(dst.width as usize * dst.height as usize);
        for y in 0..dst.height {
            for x in 0..dst.width {
                out.push(sample_nearest(&src_texels, src.width, src.height, dst.width, dst.height, x, y));
            }
        }
        Some(out)
    }
}

impl RenderContext for HeadlessContext {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        self.allocations += 1;
        Texture::new_headless(desc, [0.0; 4])
    }

    fn upload_texture(&mut self, desc: &TextureDesc, texels: &[Texel]) -> anyhow::Result<TextureHandle> {
        let expected = desc.width as usize * desc.height as usize;
        anyhow::ensure!(
            texels.len() == expected,
            "texture '{}' needs {} texels, got {}",
            desc.label,
            expected,
            texels.len()
        );
        let texture = self.create_texture(desc);
        if let Some(storage) = headless_texels(&texture) {
            storage.borrow_mut().copy_from_slice(texels);
        }
        Ok(texture)
    }

    fn clear_texture(&mut self, texture: &Texture, color: Texel) {
        let Some(storage) = headless_texels(texture) else { return };
        let value = if is_depth_format(texture.format) { [color[0], 0.0, 0.0, 0.0] } else { color };
        storage.borrow_mut().fill(value);
    }

    fn clear_fbo(&mut self, fbo: &ManagedFbo, color: Texel, depth: f32) {
        for target in fbo.color_targets().iter().flatten() {
            self.clear_texture(target, color);
        }
        if let Some(depth_target) = fbo.depth_stencil_target() {
            self.clear_texture(depth_target, [depth, 0.0, 0.0, 0.0]);
        }
    }

    fn blit(&mut self, src: &Texture, dst: &Texture) {
        if src.id() == dst.id() {
            return;
        }
        let Some(texels) = Self::resampled(src, dst) else { return };
        if let Some(storage) = headless_texels(dst) {
            *storage.borrow_mut() = texels;
        }
    }

    fn blend(&mut self, src: &Texture, dst: &Texture, weight: f32) {
        if src.id() == dst.id() {
            return;
        }
        let Some(incoming) = Self::resampled(src, dst) else { return };
        let Some(storage) = headless_texels(dst) else { return };
        for (current, new) in storage.borrow_mut().iter_mut().zip(incoming) {
            for c in 0..4 {
                current[c] = current[c] * (1.0 - weight) + new[c] * weight;
            }
        }
    }

    fn max_color_attachments(&self) -> usize {
        self.max_color_attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{ChannelUsages, DEFAULT_CHANNEL_FORMAT, DEPTH_FORMAT};

    fn desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc::new("test", width, height, DEFAULT_CHANNEL_FORMAT, ChannelUsages::DEFAULT)
    }

    #[test]
    fn clear_then_blit_copies_every_texel() {
        let mut ctx = HeadlessContext::new();
        let src = ctx.create_texture(&desc(4, 4));
        let dst = ctx.create_texture(&desc(4, 4));
        ctx.clear_texture(&src, [0.25, 0.5, 0.75, 1.0]);
        ctx.blit(&src, &dst);
        assert!(dst.read_texels().unwrap().iter().all(|t| *t == [0.25, 0.5, 0.75, 1.0]));
        assert_eq!(ctx.allocation_count(), 2);
    }

    #[test]
    fn blit_stretches_to_destination_size() {
        let mut ctx = HeadlessContext::new();
        let src = ctx.upload_texture(&desc(2, 1), &[[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]]).unwrap();
        let dst = ctx.create_texture(&desc(4, 2));
        ctx.blit(&src, &dst);
        assert_eq!(dst.texel(0, 0), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(dst.texel(1, 1), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(dst.texel(2, 0), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(dst.texel(3, 1), Some([0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn blend_mixes_with_weight() {
        let mut ctx = HeadlessContext::new();
        let src = ctx.create_texture(&desc(1, 1));
        let dst = ctx.create_texture(&desc(1, 1));
        ctx.clear_texture(&src, [1.0, 1.0, 1.0, 1.0]);
        ctx.clear_texture(&dst, [0.0, 0.0, 0.0, 0.0]);
        ctx.blend(&src, &dst, 0.25);
        assert_eq!(dst.texel(0, 0), Some([0.25, 0.25, 0.25, 0.25]));
    }

    #[test]
    fn depth_clear_uses_red_component() {
        let mut ctx = HeadlessContext::new();
        let depth = ctx.create_texture(&TextureDesc::new("depth", 2, 2, DEPTH_FORMAT, ChannelUsages::DEPTH_BUFFER));
        ctx.clear_texture(&depth, [1.0, 0.5, 0.5, 0.5]);
        assert_eq!(depth.texel(1, 1), Some([1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn upload_rejects_wrong_texel_count() {
        let mut ctx = HeadlessContext::new();
        assert!(ctx.upload_texture(&desc(2, 2), &[[0.0; 4]]).is_err());
    }
}
