//! A framework for ray tracing tutorials: an editable pipeline of render
//! passes that share textures through named channels.
//!
//! Samples build a `RenderingPipeline`, put passes into its slots and hand it
//! window events and frames. Everything GPU specific goes through a
//! `RenderContext`, so a pipeline can also run headless.

pub mod camera;
pub mod config;
pub mod context;
pub mod fullscreen;
pub mod input;
pub mod model;
pub mod passes;
pub mod pipeline;
pub mod render_pass;
pub mod resource_manager;
pub mod resources;
pub mod scene;
pub mod texture;
pub mod wgpu_context;

pub use context::{HeadlessContext, RenderContext};
pub use pipeline::RenderingPipeline;
pub use render_pass::{shared, FrameContext, PassBase, RenderPass, SharedPass};
pub use resource_manager::ResourceManager;
