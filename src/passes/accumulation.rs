use cgmath::Matrix4;

use crate::context::RenderContext;
use crate::render_pass::{FrameContext, PassBase, RenderPass};
use crate::resource_manager::ResourceManager;
use crate::scene::SceneHandle;
use crate::texture::{ChannelUsages, TextureDesc, TextureHandle, DEFAULT_CHANNEL_FORMAT};

/**
Averages a channel over time.

Every frame the current contents of the channel are blended into a history
texture with weight `1 / (frames + 1)` and the average is written back into
the channel. The history starts over whenever some pass in the pipeline asks
for a refresh, the window is resized or the camera moves.
*/
pub struct SimpleAccumulationPass {
    base: PassBase,
    channel: String,
    accum_count: u32,
    do_accumulation: bool,
    last_frame: Option<TextureHandle>,
    scene: Option<SceneHandle>,
    last_camera_matrix: Option<Matrix4<f32>>,
}

impl SimpleAccumulationPass {
    pub fn new(channel: &str) -> Self {
        Self {
            base: PassBase::new("Accumulation Pass", "Accumulation Options"),
            channel: channel.to_string(),
            accum_count: 0,
            do_accumulation: true,
            last_frame: None,
            scene: None,
            last_camera_matrix: None,
        }
    }

    /// How many frames are in the current average.
    pub fn accumulated_frames(&self) -> u32 {
        self.accum_count
    }

    pub fn set_accumulation(&mut self, enabled: bool) {
        if self.do_accumulation != enabled {
            self.do_accumulation = enabled;
            self.accum_count = 0;
            self.base.set_refresh_flag();
        }
    }

    fn current_camera_matrix(&self) -> Option<Matrix4<f32>> {
        self.scene.as_ref().map(|s| s.borrow().camera.view_matrix())
    }

    fn has_camera_moved(&self) -> bool {
        match (self.current_camera_matrix(), self.last_camera_matrix) {
            (Some(current), Some(last)) => current != last,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl RenderPass for SimpleAccumulationPass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn initialize(&mut self, _ctx: &mut dyn RenderContext, resources: &mut ResourceManager) -> anyhow::Result<()> {
        resources.request_channel(&self.channel)?;
        Ok(())
    }

    fn init_scene(&mut self, _ctx: &mut dyn RenderContext, scene: Option<&SceneHandle>) {
        self.accum_count = 0;
        self.scene = scene.cloned();
        self.last_camera_matrix = self.current_camera_matrix();
    }

    fn resize(&mut self, _width: u32, _height: u32) {
        // the history is reallocated on the next frame
        self.last_frame = None;
        self.accum_count = 0;
    }

    fn render_gui(&mut self, ui: &mut egui::Ui) {
        ui.label(format!("Accumulating buffer:   {}", self.channel));
        ui.label("");

        let mut enabled = self.do_accumulation;
        let text = if enabled { "Accumulating samples temporally" } else { "No temporal accumulation" };
        if ui.checkbox(&mut enabled, text).changed() {
            self.set_accumulation(enabled);
        }

        ui.label("");
        ui.label(format!("Frames accumulated: {}", self.accum_count));
    }

    fn execute(&mut self, frame: &mut FrameContext) {
        let Some(input) = frame.resources.get_texture(&self.channel) else { return };
        if !self.do_accumulation {
            return;
        }

        if self.has_camera_moved() {
            self.accum_count = 0;
            self.last_camera_matrix = self.current_camera_matrix();
        }

        let last_frame = match &self.last_frame {
            Some(texture) if texture.size() == input.size() => texture.clone(),
            _ => {
                let desc = TextureDesc::new(
                    "AccumulationHistory",
                    input.width,
                    input.height,
                    DEFAULT_CHANNEL_FORMAT,
                    ChannelUsages::DEFAULT,
                );
                let texture = frame.render.create_texture(&desc);
                self.last_frame = Some(texture.clone());
                self.accum_count = 0;
                texture
            }
        };

        let weight = 1.0 / (self.accum_count as f32 + 1.0);
        frame.render.blend(&input, &last_frame, weight);
        frame.render.blit(&last_frame, &input);
        self.accum_count += 1;
    }

    fn state_refreshed(&mut self) {
        self.accum_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;

    fn run_frame(pass: &mut SimpleAccumulationPass, ctx: &mut HeadlessContext, resources: &mut ResourceManager) {
        let pass: &mut dyn RenderPass = pass;
        let mut frame = FrameContext { render: ctx, resources, scene: None, time: 0.0 };
        pass.on_execute(&mut frame);
    }

    #[test]
    fn averages_frames_until_refreshed() {
        let mut ctx = HeadlessContext::new();
        let mut resources = ResourceManager::new(2, 2);
        let mut pass = SimpleAccumulationPass::new("Color");
        pass.initialize(&mut ctx, &mut resources).unwrap();
        resources.initialize_resources(&mut ctx);
        let color = resources.get_texture("Color").unwrap();

        ctx.clear_texture(&color, [1.0, 1.0, 1.0, 1.0]);
        run_frame(&mut pass, &mut ctx, &mut resources);
        assert_eq!(color.texel(0, 0), Some([1.0, 1.0, 1.0, 1.0]));

        ctx.clear_texture(&color, [0.0, 0.0, 0.0, 1.0]);
        run_frame(&mut pass, &mut ctx, &mut resources);
        assert_eq!(color.texel(1, 1), Some([0.5, 0.5, 0.5, 1.0]));
        assert_eq!(pass.accumulated_frames(), 2);

        pass.state_refreshed();
        ctx.clear_texture(&color, [0.25, 0.25, 0.25, 1.0]);
        run_frame(&mut pass, &mut ctx, &mut resources);
        assert_eq!(color.texel(0, 1), Some([0.25, 0.25, 0.25, 1.0]));
    }

    #[test]
    fn disabled_accumulation_leaves_channel_alone() {
        let mut ctx = HeadlessContext::new();
        let mut resources = ResourceManager::new(2, 2);
        let mut pass = SimpleAccumulationPass::new("Color");
        pass.initialize(&mut ctx, &mut resources).unwrap();
        resources.initialize_resources(&mut ctx);
        pass.set_accumulation(false);
        assert!((&pass as &dyn RenderPass).is_refresh_flag_set());

        let color = resources.get_texture("Color").unwrap();
        ctx.clear_texture(&color, [0.3, 0.3, 0.3, 1.0]);
        run_frame(&mut pass, &mut ctx, &mut resources);
        assert_eq!(color.texel(0, 0), Some([0.3, 0.3, 0.3, 1.0]));
        assert_eq!(pass.accumulated_frames(), 0);
    }
}
