/// The resource manager is the central directory of textures ("channels")
/// shared between render passes.
///
/// Passes written independently of each other never hold references to one
/// another. Instead they ask the resource manager for a channel by name, and
/// any two passes asking for the same name get the same texture. Allocation is
/// lazy: channels are recorded when requested and only created once the
/// pipeline initializes its resources (or the window is resized).
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::context::RenderContext;
use crate::texture::{
    is_depth_format, ChannelSize, ChannelUsages, Texel, TextureDesc, TextureHandle, DEFAULT_CHANNEL_FORMAT,
    UPLOAD_FORMAT,
};

/// The channel whose contents end up on screen at the end of every frame.
pub const OUTPUT_CHANNEL: &str = "PipelineOutput";

/// The channel holding the environment map used by ray tracing passes.
pub const ENVIRONMENT_MAP: &str = "EnvironmentMap";

/// Side length of the constant color environment maps.
const CONSTANT_ENVIRONMENT_SIZE: u32 = 128;

/// Scene loaded on the first frame if a pass asks for a default scene.
const DEFAULT_SCENE: &str = "cube.obj";

/// Index of a channel, cheaper to look up than its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub usize);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Two passes asked for the same channel with conflicting needs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("channel '{name}' was requested as {requested:?} but already exists as {existing:?}")]
    FormatMismatch {
        name: String,
        existing: wgpu::TextureFormat,
        requested: wgpu::TextureFormat,
    },
    #[error("channel '{name}' was requested with size {requested:?} but already exists with size {existing:?}")]
    SizeMismatch {
        name: String,
        existing: ChannelSize,
        requested: ChannelSize,
    },
}

/// Anything a channel can be looked up by.
pub trait ChannelKey {
    fn resolve(&self, resources: &ResourceManager) -> Option<ChannelId>;
}

impl ChannelKey for ChannelId {
    fn resolve(&self, resources: &ResourceManager) -> Option<ChannelId> {
        (self.0 < resources.channels.len()).then_some(*self)
    }
}

impl ChannelKey for &str {
    fn resolve(&self, resources: &ResourceManager) -> Option<ChannelId> {
        resources.texture_index(self)
    }
}

impl ChannelKey for String {
    fn resolve(&self, resources: &ResourceManager) -> Option<ChannelId> {
        resources.texture_index(self)
    }
}

impl ChannelKey for &String {
    fn resolve(&self, resources: &ResourceManager) -> Option<ChannelId> {
        resources.texture_index(self)
    }
}

impl<K: ChannelKey> ChannelKey for Option<K> {
    fn resolve(&self, resources: &ResourceManager) -> Option<ChannelId> {
        self.as_ref().and_then(|key| key.resolve(resources))
    }
}

struct Channel {
    name: String,
    texture: Option<TextureHandle>,
    size: ChannelSize,
    usages: ChannelUsages,
    format: wgpu::TextureFormat,
}

impl Channel {
    fn desc(&self, screen_width: u32, screen_height: u32) -> TextureDesc {
        let (width, height) = self.size.resolve(screen_width, screen_height);
        TextureDesc::new(&self.name, width, height, self.format, self.usages)
    }
}

/// A set of managed channels bound together as render targets.
///
/// Color targets keep the position they were requested at; positions whose
/// channel couldn't be bound are `None`. The bundle stays valid until the
/// resource manager reports changed resources.
#[derive(Debug, Clone)]
pub struct ManagedFbo {
    color_targets: Vec<Option<TextureHandle>>,
    depth_stencil: Option<TextureHandle>,
}

impl ManagedFbo {
    pub fn color_targets(&self) -> &[Option<TextureHandle>] {
        &self.color_targets
    }

    pub fn color_target(&self, index: usize) -> Option<&TextureHandle> {
        self.color_targets.get(index).and_then(Option::as_ref)
    }

    pub fn depth_stencil_target(&self) -> Option<&TextureHandle> {
        self.depth_stencil.as_ref()
    }

    /// Size of the first bound attachment.
    pub fn size(&self) -> (u32, u32) {
        self.color_targets
            .iter()
            .flatten()
            .chain(self.depth_stencil.iter())
            .next()
            .map(|t| t.size())
            .unwrap_or((0, 0))
    }
}

pub struct ResourceManager {
    width: u32,
    height: u32,
    initialized: bool,
    updated: bool,
    min_t: f32,
    env_map_name: String,
    default_scene: PathBuf,
    user_set_default_scene: bool,
    channels: Vec<Channel>,
}

impl ResourceManager {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            initialized: false,
            updated: true,
            min_t: 1.0e-4,
            env_map_name: String::new(),
            default_scene: PathBuf::from(DEFAULT_SCENE),
            user_set_default_scene: false,
            channels: Vec::new(),
        }
    }

    /// Register interest in a channel.
    ///
    /// If another pass already asked for `name`, the format and size policy
    /// have to match what it asked for; the usages of both requests are
    /// combined. On a conflict nothing is modified and the caller is expected
    /// to fail its own initialization.
    pub fn request_texture_resource(
        &mut self,
        name: &str,
        format: wgpu::TextureFormat,
        usages: ChannelUsages,
        size: ChannelSize,
    ) -> Result<ChannelId, ResourceError> {
        if let Some(id) = self.texture_index(name) {
            let channel = &mut self.channels[id.0];
            if channel.format != format {
                return Err(ResourceError::FormatMismatch {
                    name: name.to_string(),
                    existing: channel.format,
                    requested: format,
                });
            }
            if channel.size != size {
                return Err(ResourceError::SizeMismatch {
                    name: name.to_string(),
                    existing: channel.size,
                    requested: size,
                });
            }
            channel.usages |= usages;
            return Ok(id);
        }

        let id = ChannelId(self.channels.len());
        self.channels.push(Channel {
            name: name.to_string(),
            texture: None,
            size,
            usages,
            format,
        });
        // Nothing existing changed, but the set of available channels did.
        self.updated = true;
        log::debug!("registered channel '{}' as {}", name, id);
        Ok(id)
    }

    /// Request several channels with the same format, usages and size.
    pub fn request_texture_resources(
        &mut self,
        names: &[&str],
        format: wgpu::TextureFormat,
        usages: ChannelUsages,
        size: ChannelSize,
    ) -> Result<Vec<ChannelId>, ResourceError> {
        names
            .iter()
            .map(|name| self.request_texture_resource(name, format, usages, size))
            .collect()
    }

    /// Request a full-screen channel with the default format and usages.
    pub fn request_channel(&mut self, name: &str) -> Result<ChannelId, ResourceError> {
        self.request_texture_resource(name, DEFAULT_CHANNEL_FORMAT, ChannelUsages::DEFAULT, ChannelSize::FullScreen)
    }

    /// Share a texture a pass allocated itself under `name`.
    ///
    /// Format, size and usages are taken from the texture. The channel keeps
    /// that fixed size and is not resized with the window.
    pub fn manage_texture_resource(&mut self, name: &str, texture: TextureHandle) -> ChannelId {
        let id = match self.texture_index(name) {
            Some(id) => id,
            None => {
                self.channels.push(Channel {
                    name: name.to_string(),
                    texture: None,
                    size: ChannelSize::FullScreen,
                    usages: ChannelUsages::DEFAULT,
                    format: texture.format,
                });
                ChannelId(self.channels.len() - 1)
            }
        };

        let channel = &mut self.channels[id.0];
        channel.format = texture.format;
        channel.size = ChannelSize::Fixed { width: texture.width, height: texture.height };
        channel.usages = texture.usages;
        channel.texture = Some(texture);

        self.updated = true;
        id
    }

    /// Allocate every channel that hasn't been allocated yet.
    ///
    /// Full-screen channels wait while the window has no area; `resize` will
    /// allocate them later.
    pub fn initialize_resources(&mut self, ctx: &mut dyn RenderContext) {
        let (screen_width, screen_height) = (self.width, self.height);
        for channel in self.channels.iter_mut() {
            if channel.texture.is_some() {
                continue;
            }
            let desc = channel.desc(screen_width, screen_height);
            if desc.width == 0 || desc.height == 0 {
                continue;
            }
            channel.texture = Some(ctx.create_texture(&desc));
        }

        self.initialized = true;
        self.updated = true;
    }

    /// Resize all full-screen channels to the new window size.
    pub fn resize(&mut self, ctx: &mut dyn RenderContext, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }

        self.width = width;
        self.height = height;

        // Nothing sensible can be allocated for an empty window
        if width == 0 || height == 0 {
            return;
        }

        let first_allocation = !self.initialized;
        for channel in self.channels.iter_mut() {
            if channel.size != ChannelSize::FullScreen {
                continue;
            }
            // initialize_resources below allocates these at the new size
            if first_allocation && channel.texture.is_none() {
                continue;
            }
            channel.texture = Some(ctx.create_texture(&channel.desc(width, height)));
        }
        if first_allocation {
            self.initialize_resources(ctx);
        }

        self.updated = true;
    }

    /// Change the size policy of a channel, reallocating it.
    pub fn update_texture_size<K: ChannelKey>(&mut self, ctx: &mut dyn RenderContext, key: K, size: ChannelSize) {
        let Some(id) = key.resolve(self) else { return };
        let (screen_width, screen_height) = (self.width, self.height);
        let channel = &mut self.channels[id.0];
        if channel.size == size {
            return;
        }

        channel.size = size;
        let desc = channel.desc(screen_width, screen_height);
        channel.texture = (desc.width > 0 && desc.height > 0).then(|| ctx.create_texture(&desc));
        self.updated = true;
    }

    pub fn get_texture<K: ChannelKey>(&self, key: K) -> Option<TextureHandle> {
        let id = key.resolve(self)?;
        self.channels[id.0].texture.clone()
    }

    /// Like `get_texture`, but clears the channel to `color` first.
    pub fn get_cleared_texture<K: ChannelKey>(
        &self,
        ctx: &mut dyn RenderContext,
        key: K,
        color: Texel,
    ) -> Option<TextureHandle> {
        let texture = self.get_texture(key)?;
        ctx.clear_texture(&texture, color);
        Some(texture)
    }

    pub fn clear_texture(&self, ctx: &mut dyn RenderContext, texture: &TextureHandle, color: Texel) {
        ctx.clear_texture(texture, color);
    }

    pub fn texture_name(&self, id: ChannelId) -> Option<&str> {
        self.channels.get(id.0).map(|c| c.name.as_str())
    }

    pub fn texture_index(&self, name: &str) -> Option<ChannelId> {
        self.channels.iter().position(|c| c.name == name).map(ChannelId)
    }

    /// Number of channels ever registered.
    pub fn texture_count(&self) -> usize {
        self.channels.len()
    }

    /// Iterate over the ids and names of all channels, in registration order.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &str)> {
        self.channels.iter().enumerate().map(|(i, c)| (ChannelId(i), c.name.as_str()))
    }

    pub fn channel_size<K: ChannelKey>(&self, key: K) -> Option<ChannelSize> {
        key.resolve(self).map(|id| self.channels[id.0].size)
    }

    pub fn channel_usages<K: ChannelKey>(&self, key: K) -> Option<ChannelUsages> {
        key.resolve(self).map(|id| self.channels[id.0].usages)
    }

    pub fn channel_format<K: ChannelKey>(&self, key: K) -> Option<wgpu::TextureFormat> {
        key.resolve(self).map(|id| self.channels[id.0].format)
    }

    fn has_usage(&self, id: ChannelId, usage: ChannelUsages) -> bool {
        self.channels[id.0].usages.contains(usage)
    }

    /**
    Bind managed channels together as render targets.

    Color channels are attached at their position in `colors`; `None`,
    unknown or not-yet-allocated channels and channels that can't be rendered
    to leave that attachment point unbound. Returns `None` if the depth
    channel isn't a depth/stencil channel, if a color channel has a depth
    format, or if nothing at all ended up bound.

    Color channels past the attachment limit of `ctx` are dropped without
    an error.
    */
    pub fn create_managed_fbo(
        &self,
        ctx: &dyn RenderContext,
        colors: &[Option<ChannelId>],
        depth_stencil: Option<ChannelId>,
    ) -> Option<ManagedFbo> {
        let max_color_targets = ctx.max_color_attachments();
        let mut fbo = ManagedFbo { color_targets: Vec::new(), depth_stencil: None };

        if let Some(id) = depth_stencil.resolve(self) {
            let channel = &self.channels[id.0];
            if !is_depth_format(channel.format) || !self.has_usage(id, ChannelUsages::DEPTH_STENCIL) {
                return None;
            }
            fbo.depth_stencil = channel.texture.clone();
        }

        for (slot, id) in colors.iter().enumerate() {
            if slot >= max_color_targets {
                break;
            }
            let bound = match id.resolve(self) {
                Some(id) => {
                    let channel = &self.channels[id.0];
                    if is_depth_format(channel.format) {
                        return None;
                    }
                    if self.has_usage(id, ChannelUsages::RENDER_TARGET) {
                        channel.texture.clone()
                    } else {
                        None
                    }
                }
                None => None,
            };
            fbo.color_targets.push(bound);
        }

        if fbo.depth_stencil.is_none() && fbo.color_targets.iter().all(Option::is_none) {
            return None;
        }
        Some(fbo)
    }

    /// `create_managed_fbo` with channels given by name. Unknown names leave
    /// their attachment point unbound.
    pub fn create_managed_fbo_by_name(
        &self,
        ctx: &dyn RenderContext,
        colors: &[&str],
        depth_stencil: Option<&str>,
    ) -> Option<ManagedFbo> {
        let color_ids: Vec<Option<ChannelId>> = colors.iter().map(|name| self.texture_index(name)).collect();
        let depth_id = depth_stencil.and_then(|name| self.texture_index(name));
        self.create_managed_fbo(ctx, &color_ids, depth_id)
    }

    /// Replace the environment map.
    ///
    /// `""`, `"Black"` and `"Carolina sky blue"` select small constant color
    /// maps; anything else is loaded as an image file. If loading fails the
    /// previous map stays in place.
    pub fn update_environment_map(&mut self, ctx: &mut dyn RenderContext, source: &str) -> anyhow::Result<()> {
        let constant = match source {
            "" => Some([0.5, 0.5, 0.8, 1.0]),
            "Black" => Some([0.0, 0.0, 0.0, 1.0]),
            "Carolina sky blue" => Some([0.078, 0.361, 0.753, 1.0]),
            _ => None,
        };

        let texture = match constant {
            Some(color) => {
                let desc = TextureDesc::new(
                    ENVIRONMENT_MAP,
                    CONSTANT_ENVIRONMENT_SIZE,
                    CONSTANT_ENVIRONMENT_SIZE,
                    UPLOAD_FORMAT,
                    ChannelUsages::DEFAULT,
                );
                let texture = ctx.create_texture(&desc);
                ctx.clear_texture(&texture, color);
                texture
            }
            None => {
                let texture = crate::resources::load_environment_map(ctx, Path::new(source))?;
                self.env_map_name = Path::new(source)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source.to_string());
                log::info!("loaded environment map {}", self.env_map_name);
                texture
            }
        };

        self.manage_texture_resource(ENVIRONMENT_MAP, texture);
        Ok(())
    }

    /// File name of the environment map loaded from disk, empty if none was.
    pub fn environment_map_name(&self) -> &str {
        &self.env_map_name
    }

    pub fn environment_map(&self) -> Option<TextureHandle> {
        self.get_texture(ENVIRONMENT_MAP)
    }

    pub fn environment_map_size(&self) -> (u32, u32) {
        match self.channel_size(ENVIRONMENT_MAP) {
            Some(size) => size.resolve(self.width, self.height),
            None => (0, 0),
        }
    }

    pub fn default_scene_name(&self) -> &Path {
        &self.default_scene
    }

    /// Setting a default scene means the pipeline loads it on the first frame.
    pub fn set_default_scene_name(&mut self, path: impl Into<PathBuf>) {
        self.default_scene = path.into();
        self.user_set_default_scene = true;
    }

    pub fn user_set_default_scene(&self) -> bool {
        self.user_set_default_scene
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True if channels were added or reallocated since the last
    /// `reset_dirty_flag`. Anyone holding texture handles must re-fetch them.
    pub fn have_resources_changed(&self) -> bool {
        self.updated
    }

    pub fn reset_dirty_flag(&mut self) {
        self.updated = false;
    }

    // Ray tracing state every ray tracing pass should agree on
    pub fn min_t_dist(&self) -> f32 {
        self.min_t
    }

    pub fn set_min_t_dist(&mut self, min_t: f32) {
        self.min_t = min_t;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;
    use crate::texture::DEPTH_FORMAT;

    fn initialized(width: u32, height: u32) -> (ResourceManager, HeadlessContext) {
        (ResourceManager::new(width, height), HeadlessContext::new())
    }

    #[test]
    fn same_request_twice_returns_same_id_and_unions_usages() {
        let (mut resources, _) = initialized(8, 8);
        let first = resources
            .request_texture_resource("Albedo", DEFAULT_CHANNEL_FORMAT, ChannelUsages::SHADER_RESOURCE, ChannelSize::FullScreen)
            .unwrap();
        let second = resources
            .request_texture_resource("Albedo", DEFAULT_CHANNEL_FORMAT, ChannelUsages::STORAGE, ChannelSize::FullScreen)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            resources.channel_usages(first),
            Some(ChannelUsages::SHADER_RESOURCE | ChannelUsages::STORAGE)
        );
    }

    #[test]
    fn conflicting_format_is_rejected_without_changes() {
        let (mut resources, _) = initialized(8, 8);
        let id = resources.request_channel("Albedo").unwrap();
        let err = resources
            .request_texture_resource("Albedo", wgpu::TextureFormat::Rgba8Unorm, ChannelUsages::STORAGE, ChannelSize::FullScreen)
            .unwrap_err();
        assert!(matches!(err, ResourceError::FormatMismatch { .. }));
        assert_eq!(resources.channel_format(id), Some(DEFAULT_CHANNEL_FORMAT));
        assert_eq!(resources.channel_usages(id), Some(ChannelUsages::DEFAULT));
        assert_eq!(resources.texture_count(), 1);
    }

    #[test]
    fn conflicting_size_is_rejected() {
        let (mut resources, _) = initialized(8, 8);
        resources.request_channel("Albedo").unwrap();
        let err = resources
            .request_texture_resource(
                "Albedo",
                DEFAULT_CHANNEL_FORMAT,
                ChannelUsages::DEFAULT,
                ChannelSize::Fixed { width: 4, height: 4 },
            )
            .unwrap_err();
        assert!(matches!(err, ResourceError::SizeMismatch { .. }));
    }

    #[test]
    fn initialize_is_lazy_and_idempotent() {
        let (mut resources, mut ctx) = initialized(8, 4);
        let id = resources.request_channel("Albedo").unwrap();
        assert!(resources.get_texture(id).is_none());

        resources.initialize_resources(&mut ctx);
        let texture = resources.get_texture(id).unwrap();
        assert_eq!(texture.size(), (8, 4));

        resources.initialize_resources(&mut ctx);
        assert_eq!(resources.get_texture(id).unwrap().id(), texture.id());
        assert_eq!(ctx.allocation_count(), 1);
    }

    #[test]
    fn first_resize_allocates_each_channel_once() {
        let (mut resources, mut ctx) = initialized(0, 0);
        let screen = resources.request_channel("Screen").unwrap();
        resources
            .request_texture_resource("Lut", DEFAULT_CHANNEL_FORMAT, ChannelUsages::DEFAULT, ChannelSize::Fixed { width: 4, height: 4 })
            .unwrap();

        resources.resize(&mut ctx, 32, 16);
        assert!(resources.is_initialized());
        assert_eq!(resources.get_texture(screen).unwrap().size(), (32, 16));
        assert_eq!(ctx.allocation_count(), 2);
    }

    #[test]
    fn resize_only_touches_full_screen_channels() {
        let (mut resources, mut ctx) = initialized(8, 8);
        let screen = resources.request_channel("Screen").unwrap();
        let fixed = resources
            .request_texture_resource(
                "Lut",
                DEFAULT_CHANNEL_FORMAT,
                ChannelUsages::DEFAULT,
                ChannelSize::Fixed { width: 16, height: 2 },
            )
            .unwrap();
        resources.initialize_resources(&mut ctx);
        let fixed_before = resources.get_texture(fixed).unwrap().id();
        resources.reset_dirty_flag();

        resources.resize(&mut ctx, 8, 8);
        assert!(!resources.have_resources_changed());

        resources.resize(&mut ctx, 32, 16);
        assert_eq!(resources.get_texture(screen).unwrap().size(), (32, 16));
        assert_eq!(resources.get_texture(fixed).unwrap().size(), (16, 2));
        assert_eq!(resources.get_texture(fixed).unwrap().id(), fixed_before);
        assert!(resources.have_resources_changed());
        assert!(resources.have_resources_changed());
        resources.reset_dirty_flag();
        assert!(!resources.have_resources_changed());
    }

    #[test]
    fn managed_textures_keep_their_own_size() {
        let (mut resources, mut ctx) = initialized(8, 8);
        let texture = ctx.create_texture(&TextureDesc::new("mine", 3, 5, wgpu::TextureFormat::Rgba8Unorm, ChannelUsages::SHADER_RESOURCE));
        resources.reset_dirty_flag();
        let id = resources.manage_texture_resource("Mine", texture.clone());
        assert!(resources.have_resources_changed());
        assert_eq!(resources.channel_size(id), Some(ChannelSize::Fixed { width: 3, height: 5 }));
        assert_eq!(resources.channel_format(id), Some(wgpu::TextureFormat::Rgba8Unorm));

        resources.resize(&mut ctx, 64, 64);
        assert_eq!(resources.get_texture("Mine").unwrap().id(), texture.id());
    }

    #[test]
    fn manage_replaces_first_channel_in_place() {
        let (mut resources, mut ctx) = initialized(8, 8);
        let id = resources.request_channel("First").unwrap();
        let texture = ctx.create_texture(&TextureDesc::new("mine", 2, 2, DEFAULT_CHANNEL_FORMAT, ChannelUsages::DEFAULT));
        assert_eq!(resources.manage_texture_resource("First", texture), id);
        assert_eq!(resources.texture_count(), 1);
    }

    #[test]
    fn update_texture_size_reallocates() {
        let (mut resources, mut ctx) = initialized(8, 8);
        let id = resources.request_channel("Half").unwrap();
        resources.initialize_resources(&mut ctx);
        resources.reset_dirty_flag();
        resources.update_texture_size(&mut ctx, "Half", ChannelSize::Fixed { width: 4, height: 4 });
        assert_eq!(resources.get_texture(id).unwrap().size(), (4, 4));
        assert!(resources.have_resources_changed());

        resources.resize(&mut ctx, 20, 20);
        assert_eq!(resources.get_texture(id).unwrap().size(), (4, 4));
    }

    #[test]
    fn cleared_texture_has_clear_color() {
        let (mut resources, mut ctx) = initialized(2, 2);
        resources.request_channel(OUTPUT_CHANNEL).unwrap();
        resources.initialize_resources(&mut ctx);
        let texture = resources.get_cleared_texture(&mut ctx, OUTPUT_CHANNEL, [0.1, 0.2, 0.3, 1.0]).unwrap();
        assert!(texture.read_texels().unwrap().iter().all(|t| *t == [0.1, 0.2, 0.3, 1.0]));
        assert!(resources.get_cleared_texture(&mut ctx, "Missing", [0.0; 4]).is_none());
    }

    #[test]
    fn fbo_without_anything_bound_is_none() {
        let (resources, ctx) = initialized(8, 8);
        assert!(resources.create_managed_fbo(&ctx, &[], Some(ChannelId(42))).is_none());
        assert!(resources.create_managed_fbo(&ctx, &[], None).is_none());
    }

    #[test]
    fn fbo_with_only_depth_is_valid() {
        let (mut resources, mut ctx) = initialized(8, 8);
        let depth = resources
            .request_texture_resource("Z", DEPTH_FORMAT, ChannelUsages::DEPTH_BUFFER, ChannelSize::FullScreen)
            .unwrap();
        resources.initialize_resources(&mut ctx);
        let fbo = resources.create_managed_fbo(&ctx, &[], Some(depth)).unwrap();
        assert!(fbo.depth_stencil_target().is_some());
        assert_eq!(fbo.size(), (8, 8));
    }

    #[test]
    fn clearing_an_fbo_clears_every_target() {
        let (mut resources, mut ctx) = initialized(4, 4);
        let color = resources.request_channel("Color").unwrap();
        let depth = resources
            .request_texture_resource("Z", DEPTH_FORMAT, ChannelUsages::DEPTH_BUFFER, ChannelSize::FullScreen)
            .unwrap();
        resources.initialize_resources(&mut ctx);

        let fbo = resources.create_managed_fbo(&ctx, &[Some(color)], Some(depth)).unwrap();
        ctx.clear_fbo(&fbo, [0.5, 0.25, 0.0, 1.0], 1.0);
        assert!(resources.get_texture(color).unwrap().read_texels().unwrap().iter().all(|t| *t == [0.5, 0.25, 0.0, 1.0]));
        assert_eq!(resources.get_texture(depth).unwrap().texel(3, 3), Some([1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn fbo_rejects_depth_format_color_and_non_depth_depth() {
        let (mut resources, mut ctx) = initialized(8, 8);
        let depth = resources
            .request_texture_resource("Z", DEPTH_FORMAT, ChannelUsages::DEPTH_BUFFER, ChannelSize::FullScreen)
            .unwrap();
        let color = resources.request_channel("Color").unwrap();
        resources.initialize_resources(&mut ctx);

        assert!(resources.create_managed_fbo(&ctx, &[Some(depth)], None).is_none());
        assert!(resources.create_managed_fbo(&ctx, &[Some(color)], Some(color)).is_none());
        assert!(resources.create_managed_fbo_by_name(&ctx, &["Color"], Some("Z")).is_some());
    }

    #[test]
    fn fbo_skips_unbindable_entries_and_drops_excess_targets() {
        let (mut resources, mut ctx) = initialized(4, 4);
        let readonly = resources
            .request_texture_resource("ReadOnly", DEFAULT_CHANNEL_FORMAT, ChannelUsages::SHADER_RESOURCE, ChannelSize::FullScreen)
            .unwrap();
        let color = resources.request_channel("Color").unwrap();
        resources.initialize_resources(&mut ctx);

        let fbo = resources.create_managed_fbo(&ctx, &[None, Some(readonly), Some(color)], None).unwrap();
        assert_eq!(fbo.color_targets().len(), 3);
        assert!(fbo.color_target(0).is_none());
        assert!(fbo.color_target(1).is_none());
        assert!(fbo.color_target(2).is_some());

        let many = vec![Some(color); 12];
        let fbo = resources.create_managed_fbo(&ctx, &many, None).unwrap();
        assert_eq!(fbo.color_targets().len(), crate::context::MAX_COLOR_TARGETS);

        let small = HeadlessContext::with_max_color_attachments(2);
        let fbo = resources.create_managed_fbo(&small, &many, None).unwrap();
        assert_eq!(fbo.color_targets().len(), 2);
    }

    #[test]
    fn constant_environment_maps() {
        let (mut resources, mut ctx) = initialized(8, 8);
        resources.update_environment_map(&mut ctx, "Black").unwrap();
        let env = resources.environment_map().unwrap();
        assert_eq!(env.texel(0, 0), Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(resources.environment_map_size(), (128, 128));

        resources.update_environment_map(&mut ctx, "").unwrap();
        assert_eq!(resources.environment_map().unwrap().texel(5, 5), Some([0.5, 0.5, 0.8, 1.0]));
        assert_eq!(resources.texture_count(), 1);
    }

    #[test]
    fn failed_environment_load_keeps_previous_map() {
        let (mut resources, mut ctx) = initialized(8, 8);
        resources.update_environment_map(&mut ctx, "Carolina sky blue").unwrap();
        let before = resources.environment_map().unwrap().id();
        assert!(resources.update_environment_map(&mut ctx, "/does/not/exist.hdr").is_err());
        assert_eq!(resources.environment_map().unwrap().id(), before);
    }

    #[test]
    fn default_scene_and_min_t() {
        let (mut resources, _) = initialized(8, 8);
        assert!(!resources.user_set_default_scene());
        resources.set_default_scene_name("scenes/room.obj");
        assert!(resources.user_set_default_scene());
        assert_eq!(resources.default_scene_name(), Path::new("scenes/room.obj"));
        assert_eq!(resources.min_t_dist(), 1.0e-4);
        resources.set_min_t_dist(0.0);
        assert_eq!(resources.min_t_dist(), 0.0);
    }
}
