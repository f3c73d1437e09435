use crate::context::RenderContext;
use crate::render_pass::{FrameContext, PassBase, RenderPass};
use crate::resource_manager::{ResourceManager, OUTPUT_CHANNEL};

/// Fills the output channel with a single color. The simplest pass there is.
pub struct ConstantColorPass {
    base: PassBase,
    pub color: [f32; 3],
}

impl ConstantColorPass {
    pub fn new() -> Self {
        Self::with_color([0.8, 0.4, 0.4])
    }

    pub fn with_color(color: [f32; 3]) -> Self {
        Self {
            base: PassBase::new("Constant Color Pass", "Constant Color Options"),
            color,
        }
    }
}

impl Default for ConstantColorPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for ConstantColorPass {
    fn base(&self) -> &PassBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PassBase {
        &mut self.base
    }

    fn initialize(&mut self, _ctx: &mut dyn RenderContext, resources: &mut ResourceManager) -> anyhow::Result<()> {
        resources.request_channel(OUTPUT_CHANNEL)?;
        Ok(())
    }

    fn render_gui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Color");
            if ui.color_edit_button_rgb(&mut self.color).changed() {
                self.base.set_refresh_flag();
            }
        });
    }

    fn execute(&mut self, frame: &mut FrameContext) {
        let [r, g, b] = self.color;
        let Some(fbo) = frame.resources.create_managed_fbo_by_name(&*frame.render, &[OUTPUT_CHANNEL], None) else {
            return;
        };
        frame.render.clear_fbo(&fbo, [r, g, b, 1.0], 1.0);
    }

    fn has_animation(&self) -> bool {
        false
    }
}
