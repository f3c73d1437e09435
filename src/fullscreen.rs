/// Fullscreen draws used to copy and blend textures on the GPU.
///
/// A fullscreen pass draws a single triangle covering the target and runs the
/// fragment shader once per target pixel. One render pipeline is created per
/// target format and blend mode, the first time it's needed.
use std::collections::HashMap;

use crate::texture::Texture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitMode {
    /// Overwrite the target.
    Copy,
    /// `target = target * (1 - weight) + source * weight`, with the weight
    /// given as the blend constant.
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    target_format: wgpu::TextureFormat,
    mode: BlitMode,
}

pub struct FullscreenBlitter {
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl FullscreenBlitter {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fullscreen Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/fullscreen.wgsl").into()),
        });

        // the source is read with textureLoad, so any float texture works,
        // filterable or not
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fullscreen source layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fullscreen pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            shader,
            bind_group_layout,
            layout,
            pipelines: HashMap::new(),
        }
    }

    fn create_pipeline(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let blend = match key.mode {
            BlitMode::Copy => None,
            BlitMode::Blend => {
                let component = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Constant,
                    dst_factor: wgpu::BlendFactor::OneMinusConstant,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState { color: component, alpha: component })
            }
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Fullscreen pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.target_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    /// Record a fullscreen draw of `src` into `dst`. `weight` is only used
    /// when blending.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &Texture,
        dst: &Texture,
        mode: BlitMode,
        weight: f32,
    ) {
        let (Some(src_view), Some(dst_view)) = (src.view(), dst.view()) else {
            log::warn!("can't draw '{}' into '{}', both need to live on the GPU", src.label, dst.label);
            return;
        };
        if src.is_depth() || dst.is_depth() {
            log::warn!("fullscreen draws don't support depth textures ('{}' -> '{}')", src.label, dst.label);
            return;
        }
        if mode == BlitMode::Blend
            && !dst
                .format
                .guaranteed_format_features(device.features())
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
        {
            log::warn!("can't blend into '{}', {:?} isn't blendable", dst.label, dst.format);
            return;
        }

        let key = PipelineKey { target_format: dst.format, mode };
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(device, key);
            self.pipelines.insert(key, pipeline);
        }
        let Some(pipeline) = self.pipelines.get(&key) else { return };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fullscreen source"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(src_view),
            }],
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fullscreen pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dst_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        if mode == BlitMode::Blend {
            let w = weight as f64;
            render_pass.set_blend_constant(wgpu::Color { r: w, g: w, b: w, a: w });
        }
        render_pass.draw(0..3, 0..1);
    }
}
