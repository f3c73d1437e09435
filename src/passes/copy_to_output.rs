use crate::context::RenderContext;
use crate::render_pass::{FrameContext, PassBase, RenderPass};
use crate::resource_manager::{ChannelId, ResourceManager, OUTPUT_CHANNEL};

/// Shows any channel on screen by copying it into the output channel. Which
/// one is picked in the GUI.
pub struct CopyToOutputPass {
    base: PassBase,
    // every channel except the output itself, rebuilt whenever the pipeline changes
    displayable: Vec<(ChannelId, String)>,
    selected: Option<ChannelId>,
}

impl CopyToOutputPass {
    pub fn new() -> Self {
        Self {
            base: PassBase::new("Copy To Output Pass", "Copy-to-Output Options"),
            displayable: Vec::new(),
            selected: None,
        }
    }

    pub fn selected_channel(&self) -> Option<ChannelId> {
        self.selected
    }

    /// Show the channel `name`. Returns false if it isn't one we can show.
    pub fn select_channel(&mut self, name: &str) -> bool {
        match self.displayable.iter().find(|(_, n)| n == name) {
            Some((id, _)) => {
                self.selected = Some(*id);
                true
            }
            None => false,
        }
    }

    pub fn displayable_channels(&self) -> impl Iterator<Item = &str> {
        self.displayable.iter().map(|(_, name)| name.as_str())
    }
}

impl Default for CopyToOutputPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for CopyToOutputPass {
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

    fn pipeline_updated(&mut self, resources: &ResourceManager) {
        let output = resources.texture_index(OUTPUT_CHANNEL);
        self.displayable = resources
            .channels()
            .filter(|(id, _)| Some(*id) != output)
            .map(|(id, name)| (id, name.to_string()))
            .collect();

        let still_there = self.selected.is_some_and(|s| self.displayable.iter().any(|(id, _)| *id == s));
        if !still_there {
            self.selected = self.displayable.first().map(|(id, _)| *id);
        }
    }

    fn render_gui(&mut self, ui: &mut egui::Ui) {
        let selected_name = self
            .displayable
            .iter()
            .find(|(id, _)| Some(*id) == self.selected)
            .map(|(_, name)| name.as_str())
            .unwrap_or("< None >");
        let mut choice = None;
        egui::ComboBox::from_label("Displayed").selected_text(selected_name).show_ui(ui, |ui| {
            for (id, name) in &self.displayable {
                if ui.selectable_label(Some(*id) == self.selected, name.as_str()).clicked() {
                    choice = Some(*id);
                }
            }
        });
        if choice.is_some() {
            self.selected = choice;
        }
    }

    fn execute(&mut self, frame: &mut FrameContext) {
        let Some(output) = frame.resources.get_texture(OUTPUT_CHANNEL) else { return };

        match frame.resources.get_texture(self.selected) {
            Some(input) => frame.render.blit(&input, &output),
            None => frame.render.clear_texture(&output, [0.0, 0.0, 0.0, 1.0]),
        }
    }

    fn has_animation(&self) -> bool {
        false
    }
}
