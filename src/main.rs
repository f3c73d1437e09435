use std::iter;

use anyhow::Context;
use winit::{
    dpi::PhysicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

use learn_raytracing_with_rust::{
    config::SampleConfig,
    fullscreen::FullscreenBlitter,
    input::InputEvent,
    passes::{ConstantColorPass, CopyToOutputPass, SimpleAccumulationPass},
    resource_manager::OUTPUT_CHANNEL,
    shared,
    texture::{ChannelUsages, Texture, TextureDesc},
    wgpu_context::WgpuContext,
    RenderingPipeline,
};

// We need a place to put the objects/data related to the global state into
struct App {
    window: Window,
    // we need to keep the size here so that we can reconfigure the surface
    // when it gets lost
    window_size: PhysicalSize<u32>,
    // the connection of the gpu with the window so that the GPU can draw stuff
    surface_config: wgpu::SurfaceConfiguration,
    surface: wgpu::Surface,
    // the logical connection to the GPU and the queue the commands of a frame
    // are submitted to
    device: wgpu::Device,
    queue: wgpu::Queue,

    // copies textures around, shared by every frame's render context
    blitter: FullscreenBlitter,
    // the passes that produce the image and everything they share
    pipeline: RenderingPipeline,

    // this is all the egui stuff we need to have a UI visible
    ui_context: egui::Context,
    ui_painter: egui_wgpu::renderer::Renderer,
    ui_state: egui_winit::State,
}

impl App {
    async fn new(window: Window, config: &SampleConfig) -> anyhow::Result<Self> {
        let window_size = window.inner_size();

        // The instance is the object that represents the GPU environment on the
        // current machine, everything else is requested from it.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: wgpu::Dx12Compiler::Fxc,
            flags: wgpu::InstanceFlags::default(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        // The window has to outlive the surface, which it does since both
        // live in the App and the window is never replaced.
        let surface = unsafe { instance.create_surface(&window) }.context("can't create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter can draw to this window")?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("can't open the GPU device")?;
        log::info!("rendering with {:?}", adapter.get_info());

        // we prefer a surface with a srgb format but take what we get
        let surface_capabilities = surface.get_capabilities(&adapter);
        let surface_format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("the surface doesn't support any format")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: config.present_mode(),
            alpha_mode: surface_capabilities.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        let ui_context = egui::Context::default();
        let ui_state = egui_winit::State::new(ui_context.viewport_id(), &window, Some(window.scale_factor() as f32), None);
        let ui_painter = egui_wgpu::renderer::Renderer::new(&device, surface_format, None, 1);

        let mut blitter = FullscreenBlitter::new(&device);

        // The pipeline of this sample: a constant color, averaged over time and
        // shown on the screen. The copy pass can be picked from the GUI to
        // look at any other channel.
        let mut ctx = WgpuContext::new(&device, &queue, &mut blitter);
        let mut pipeline = RenderingPipeline::new();
        if let Some(scene) = &config.default_scene {
            pipeline.resources_mut().set_default_scene_name(scene.clone());
        }
        pipeline.set_pass(&mut ctx, 0, Some(shared(ConstantColorPass::new())), true, true);
        pipeline.set_pass(&mut ctx, 1, Some(shared(SimpleAccumulationPass::new(OUTPUT_CHANNEL))), true, true);
        pipeline.add_pass(&mut ctx, shared(CopyToOutputPass::new()));
        pipeline.add_pipe_instructions("Move the camera with W A S D, Q and E.");
        pipeline.add_pipe_instructions("Hold the right mouse button to look around.");

        pipeline.on_resize(&mut ctx, window_size.width, window_size.height);
        pipeline.on_load(&mut ctx);
        if let Some(environment_map) = &config.environment_map {
            pipeline.load_environment_map(&mut ctx, environment_map);
        }
        queue.submit(iter::once(ctx.finish()));

        Ok(App {
            window,
            window_size,
            surface_config,
            surface,
            device,
            queue,
            blitter,
            pipeline,
            ui_context,
            ui_painter,
            ui_state,
        })
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            log::info!("resized to {}x{}", new_size.width, new_size.height);
            self.window_size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);

            let mut ctx = WgpuContext::new(&self.device, &self.queue, &mut self.blitter);
            self.pipeline.on_resize(&mut ctx, new_size.width, new_size.height);
            self.queue.submit(iter::once(ctx.finish()));
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // This is the texture we are going to render the output to. We get the
        // texture from the surface meaning it will be a texture that is part of
        // the swapchain.
        let output = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            // The window is minimized, nothing to draw.
            Err(wgpu::SurfaceError::Outdated) => return Ok(()),
            Err(e) => {
                log::warn!("dropped frame: {}", e);
                return Err(e);
            }
        };
        let target_desc = TextureDesc::new(
            "Swapchain frame",
            self.surface_config.width,
            self.surface_config.height,
            self.surface_config.format,
            ChannelUsages::RENDER_TARGET,
        );
        let target = Texture::from_view(&target_desc, output.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let ui_view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let ui_input = self.ui_state.take_egui_input(&self.window);

        let mut ctx = WgpuContext::new(&self.device, &self.queue, &mut self.blitter);
        self.pipeline.on_frame_render(&mut ctx, Some(&*target));
        let pipeline = &mut self.pipeline;
        let ui_output = self.ui_context.run(ui_input, |egui_ctx| pipeline.on_gui_render(&mut ctx, egui_ctx));

        self.ui_state.handle_platform_output(&self.window, &self.ui_context, ui_output.platform_output);
        let ui_primitives = self.ui_context.tessellate(ui_output.shapes, ui_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: ui_output.pixels_per_point,
        };

        for (id, image_delta) in &ui_output.textures_delta.set {
            self.ui_painter.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let ui_commands =
            self.ui_painter
                .update_buffers(&self.device, &self.queue, ctx.encoder(), &ui_primitives, &screen_descriptor);
        {
            // the pipeline output is already on the frame, the ui goes on top
            let mut render_pass = ctx.encoder().begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("UI pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &ui_view,
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
            self.ui_painter.render(&mut render_pass, &ui_primitives, &screen_descriptor);
        }
        for id in &ui_output.textures_delta.free {
            self.ui_painter.free_texture(id);
        }

        let frame_commands = ctx.finish();
        self.queue.submit(ui_commands.into_iter().chain(iter::once(frame_commands)));
        drop(target);
        drop(ui_view);
        output.present();
        Ok(())
    }

    fn exit(&mut self, control_flow: &mut ControlFlow) {
        self.pipeline.on_shutdown();
        *control_flow = ControlFlow::Exit;
    }

    fn on_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) {
        if *control_flow == ControlFlow::Exit {
            return;
        }
        match event {
            Event::WindowEvent { window_id, event, .. } if *window_id == self.window.id() => {
                // the ui gets the first look at the input, the passes and the
                // camera get what it doesn't want
                let response = self.ui_state.on_window_event(&self.ui_context, event);
                if !response.consumed {
                    if let Some(input) = InputEvent::from_window_event(event) {
                        self.pipeline.on_input_event(&input);
                    }
                }

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => self.exit(control_flow),
                    WindowEvent::Resized(physical_size) => self.resize(*physical_size),
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        // new_inner_size is &mut so w have to dereference it twice
                        self.resize(**new_inner_size);
                    }
                    _ => {}
                }
            }
            Event::DeviceEvent { event, .. } => {
                if !self.ui_context.wants_pointer_input() {
                    if let Some(input) = InputEvent::from_device_event(event) {
                        self.pipeline.on_input_event(&input);
                    }
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.window.id() => match self.render() {
                Ok(_) => {}
                // Reconfigure the surface if it's lost or outdated
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => self.resize(self.window_size),
                // The system is out of memory, we should probably quit
                Err(wgpu::SurfaceError::OutOfMemory) => self.exit(control_flow),
                // We're ignoring timeouts
                Err(wgpu::SurfaceError::Timeout) => log::warn!("Surface timeout"),
            },
            Event::MainEventsCleared => {
                // RedrawRequested will only trigger once, unless we manually
                // request it.
                self.window.request_redraw();
            }
            _ => {}
        }
    }
}

async fn run(config: SampleConfig) -> anyhow::Result<()> {
    // first of all we create the event loop that gathers the events like
    // button presses and mouse movements from the window
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .build(&event_loop)
        .context("can't open a window")?;
    let mut app = App::new(window, &config).await?;
    event_loop.run(move |event, _, control_flow| app.on_event(&event, control_flow));
}

fn main() {
    // This sets up a logger so that we can track what we are doing
    env_logger::init();

    // prints help or the argument error and exits
    let config = SampleConfig::from_args(std::env::args_os().skip(1)).unwrap_or_else(|e| e.exit());

    if let Err(e) = pollster::block_on(run(config)) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
