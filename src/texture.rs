/// Textures shared between render passes.
///
/// A texture is always handed around as a `TextureHandle` (an `Rc<Texture>`),
/// so several passes and the resource manager can point at the same allocation.
/// Whether the texels live on the GPU or in memory depends on which
/// `RenderContext` created the texture.
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

/// A single RGBA texel as seen by the headless engine.
pub type Texel = [f32; 4];

pub type TextureHandle = Rc<Texture>;

bitflags! {
    /// How a channel is going to be used by the passes that requested it.
    /// Requests for the same channel union their usages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelUsages: u32 {
        const RENDER_TARGET   = 1 << 0;
        const SHADER_RESOURCE = 1 << 1;
        const STORAGE         = 1 << 2;
        const DEPTH_STENCIL   = 1 << 3;

        /// Readable, writable as storage and renderable. Somewhat less
        /// performant but lets any pass use the channel any way it likes.
        const DEFAULT = Self::SHADER_RESOURCE.bits() | Self::STORAGE.bits() | Self::RENDER_TARGET.bits();
        const DEPTH_BUFFER = Self::SHADER_RESOURCE.bits() | Self::DEPTH_STENCIL.bits();
    }
}

impl ChannelUsages {
    /// Translate into the usages the GPU texture is created with. Managed
    /// textures can always be copied from and to so that blits work.
    pub fn to_wgpu(self, format: wgpu::TextureFormat) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        if self.contains(Self::SHADER_RESOURCE) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(Self::STORAGE) && !is_depth_format(format) {
            usages |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if self.intersects(Self::RENDER_TARGET | Self::DEPTH_STENCIL) {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        usages
    }
}

/// Format used for channels when a pass doesn't ask for anything specific.
pub const DEFAULT_CHANNEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Format used for depth buffers.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Format of textures uploaded from the CPU (environment maps).
pub const UPLOAD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Returns true for the formats that can only be bound as depth/stencil targets.
pub fn is_depth_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Stencil8
            | wgpu::TextureFormat::Depth16Unorm
            | wgpu::TextureFormat::Depth24Plus
            | wgpu::TextureFormat::Depth24PlusStencil8
            | wgpu::TextureFormat::Depth32Float
            | wgpu::TextureFormat::Depth32FloatStencil8
    )
}

/// Size policy of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelSize {
    /// Follows the window and is reallocated whenever it is resized.
    #[default]
    FullScreen,
    /// Stays this size until someone explicitly changes it.
    Fixed { width: u32, height: u32 },
}

impl ChannelSize {
    /// The dimensions a texture with this policy has on a screen of the given size.
    pub fn resolve(self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        match self {
            ChannelSize::FullScreen => (screen_width, screen_height),
            ChannelSize::Fixed { width, height } => (width, height),
        }
    }
}

/// Everything the engine needs to know to allocate a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usages: ChannelUsages,
}

impl TextureDesc {
    pub fn new(label: &str, width: u32, height: u32, format: wgpu::TextureFormat, usages: ChannelUsages) -> Self {
        Self { label: label.to_string(), width, height, format, usages }
    }
}

/// Where the texels of a texture actually live.
pub enum TextureStorage {
    /// In memory, one `Texel` per pixel in row-major order. Depth textures keep
    /// the depth value in the red component.
    Headless(RefCell<Vec<Texel>>),
    /// On the GPU. Swapchain frames are wrapped without owning the texture, so
    /// only the view is guaranteed to be there.
    Gpu {
        texture: Option<wgpu::Texture>,
        view: wgpu::TextureView,
    },
}

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

/**
A texture allocated by a `RenderContext`.

The description fields never change after creation. Resizing a channel means
allocating a new texture, which is why holders of a `TextureHandle` must
re-fetch it once the resource manager reports that resources have changed.
*/
pub struct Texture {
    id: u64,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usages: ChannelUsages,
    pub storage: TextureStorage,
}

impl Texture {
    fn with_storage(desc: &TextureDesc, storage: TextureStorage) -> TextureHandle {
        Rc::new(Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usages: desc.usages,
            storage,
        })
    }

    /// Allocate an in-memory texture filled with `fill`.
    pub fn new_headless(desc: &TextureDesc, fill: Texel) -> TextureHandle {
        let texel_count = desc.width as usize * desc.height as usize;
        Self::with_storage(desc, TextureStorage::Headless(RefCell::new(vec![fill; texel_count])))
    }

    /// Wrap a GPU texture together with its default view.
    pub fn from_wgpu(desc: &TextureDesc, texture: wgpu::Texture) -> TextureHandle {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self::with_storage(desc, TextureStorage::Gpu { texture: Some(texture), view })
    }

    /// Wrap a view we don't own the texture of, e.g. the current swapchain frame.
    pub fn from_view(desc: &TextureDesc, view: wgpu::TextureView) -> TextureHandle {
        Self::with_storage(desc, TextureStorage::Gpu { texture: None, view })
    }

    /// Unique for every allocation made in this process.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_depth(&self) -> bool {
        is_depth_format(self.format)
    }

    pub fn desc(&self) -> TextureDesc {
        TextureDesc::new(&self.label, self.width, self.height, self.format, self.usages)
    }

    /// The GPU view, if this texture lives on the GPU.
    pub fn view(&self) -> Option<&wgpu::TextureView> {
        match &self.storage {
            TextureStorage::Gpu { view, .. } => Some(view),
            TextureStorage::Headless(_) => None,
        }
    }

    /// A copy of the texels, if this texture lives in memory.
    pub fn read_texels(&self) -> Option<Vec<Texel>> {
        match &self.storage {
            TextureStorage::Headless(texels) => Some(texels.borrow().clone()),
            TextureStorage::Gpu { .. } => None,
        }
    }

    /// The texel at (x, y), if this texture lives in memory and the
    /// coordinates are inside it.
    pub fn texel(&self, x: u32, y: u32) -> Option<Texel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match &self.storage {
            TextureStorage::Headless(texels) => texels.borrow().get((y * self.width + x) as usize).copied(),
            TextureStorage::Gpu { .. } => None,
        }
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("usages", &self.usages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_usages_map_to_renderable_storage_textures() {
        let usages = ChannelUsages::DEFAULT.to_wgpu(DEFAULT_CHANNEL_FORMAT);
        assert!(usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(usages.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(usages.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }

    #[test]
    fn depth_buffers_never_become_storage() {
        let usages = (ChannelUsages::DEPTH_BUFFER | ChannelUsages::STORAGE).to_wgpu(DEPTH_FORMAT);
        assert!(usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(!usages.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }

    #[test]
    fn every_texture_gets_its_own_id() {
        let desc = TextureDesc::new("a", 2, 2, DEFAULT_CHANNEL_FORMAT, ChannelUsages::DEFAULT);
        let a = Texture::new_headless(&desc, [0.0; 4]);
        let b = Texture::new_headless(&desc, [0.0; 4]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.read_texels().map(|t| t.len()), Some(4));
        assert_eq!(a.texel(2, 0), None);
    }

    #[test]
    fn size_policy_resolution() {
        assert_eq!(ChannelSize::FullScreen.resolve(800, 600), (800, 600));
        assert_eq!(ChannelSize::Fixed { width: 64, height: 32 }.resolve(800, 600), (64, 32));
    }
}
