/// The contract every stage of a rendering pipeline implements.
///
/// A pass is a small unit of GPU work, e.g. filling a G-buffer, shooting
/// ambient occlusion rays or averaging frames over time. Passes know nothing
/// about each other. They exchange data through named channels of the
/// `ResourceManager` and tell the pipeline what they need through the
/// capability queries below.
///
/// Lifecycle: `initialize` once, then any number of `init_scene`, `resize`,
/// activations and frames, then `shutdown` once.
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::RenderContext;
use crate::input::InputEvent;
use crate::resource_manager::ResourceManager;
use crate::scene::SceneHandle;

/// How passes are held by the pipeline. The same pass can sit in the list of
/// available passes and in a slot at the same time.
pub type SharedPass = Rc<RefCell<dyn RenderPass>>;

/// Wrap a pass so it can be handed to the pipeline.
pub fn shared<P: RenderPass + 'static>(pass: P) -> SharedPass {
    Rc::new(RefCell::new(pass))
}

/// Smallest size a GUI window is assumed to have when stacking them.
const MIN_GUI_EXTENT: i32 = 32;

/// State every pass carries around. Passes embed one of these and hand it
/// out through `RenderPass::base`.
#[derive(Debug, Clone)]
pub struct PassBase {
    name: String,
    gui_name: String,
    /// Where the GUI window goes. Negative coordinates count from the right
    /// and bottom edges of the window.
    pub gui_position: [i32; 2],
    pub gui_size: [i32; 2],
    initialized: bool,
    refresh: bool,
    rebind: bool,
}

impl PassBase {
    pub fn new(name: &str, gui_name: &str) -> Self {
        Self {
            name: name.to_string(),
            gui_name: gui_name.to_string(),
            gui_position: [-270, 30],
            gui_size: [250, 160],
            initialized: false,
            // every pass starts out asking for both so the first frame
            // tells everyone about the initial state
            refresh: true,
            rebind: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gui_name(&self) -> &str {
        &self.gui_name
    }

    pub fn set_gui_name(&mut self, gui_name: &str) {
        self.gui_name = gui_name.to_string();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Temporal history (e.g. accumulated frames) is invalid. Every active
    /// pass gets `state_refreshed` at the top of the next frame.
    pub fn set_refresh_flag(&mut self) {
        self.refresh = true;
    }

    /// The shared resources must be looked up again. Every active pass gets
    /// `pipeline_updated` at the top of the next frame.
    pub fn set_rebind_flag(&mut self) {
        self.rebind = true;
    }

    /// Remember where the user moved the GUI window and how big it ended up.
    pub fn record_gui_rect(&mut self, position: [f32; 2], size: [f32; 2]) {
        self.gui_position = [position[0].round() as i32, position[1].round() as i32];
        self.gui_size = [
            (size[0].round() as i32).max(MIN_GUI_EXTENT),
            (size[1].round() as i32).max(MIN_GUI_EXTENT),
        ];
    }
}

/// Everything a pass may touch while it renders a frame.
pub struct FrameContext<'a> {
    pub render: &'a mut dyn RenderContext,
    pub resources: &'a mut ResourceManager,
    pub scene: Option<&'a SceneHandle>,
    /// Seconds of scene time. Stands still while animations are frozen.
    pub time: f32,
}

pub trait RenderPass {
    fn base(&self) -> &PassBase;
    fn base_mut(&mut self) -> &mut PassBase;

    /// Request channels and set up whatever the pass needs. Returning an
    /// error keeps the pass out of the pipeline for good.
    fn initialize(&mut self, ctx: &mut dyn RenderContext, resources: &mut ResourceManager) -> anyhow::Result<()>;

    /// A new scene was loaded. Called on every registered pass, active or not.
    fn init_scene(&mut self, _ctx: &mut dyn RenderContext, _scene: Option<&SceneHandle>) {}

    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Channels were added or reallocated, or some pass asked for a rebind.
    /// Texture handles kept from earlier frames are stale now.
    fn pipeline_updated(&mut self, _resources: &ResourceManager) {}

    /// Returns true if the event was consumed.
    fn process_input(&mut self, _event: &InputEvent) -> bool {
        false
    }

    fn render_gui(&mut self, _ui: &mut egui::Ui) {}

    fn execute(&mut self, frame: &mut FrameContext);

    fn shutdown(&mut self) {}

    /// Some pass in the pipeline changed state; restart anything temporal.
    fn state_refreshed(&mut self) {}

    fn activate_pass(&mut self) {}

    fn deactivate_pass(&mut self) {}

    fn requires_scene(&self) -> bool {
        false
    }

    /// Load the default scene on the first frame
    fn load_default_scene(&self) -> bool {
        false
    }

    fn uses_rasterization(&self) -> bool {
        false
    }

    fn uses_ray_tracing(&self) -> bool {
        false
    }

    fn uses_compute(&self) -> bool {
        false
    }

    fn applies_postprocess(&self) -> bool {
        false
    }

    fn uses_environment_map(&self) -> bool {
        false
    }

    /// Decides whether the pipeline shows animation controls, should generally stay true
    fn has_animation(&self) -> bool {
        true
    }
}

// The pipeline drives passes through these instead of calling the hooks
// directly, so the bookkeeping in `PassBase` stays consistent.
impl<'a> dyn RenderPass + 'a {
    pub fn name(&self) -> &str {
        self.base().name()
    }

    pub fn gui_name(&self) -> &str {
        self.base().gui_name()
    }

    pub fn is_initialized(&self) -> bool {
        self.base().initialized
    }

    pub fn on_initialize(&mut self, ctx: &mut dyn RenderContext, resources: &mut ResourceManager) -> anyhow::Result<()> {
        debug_assert!(!self.base().initialized, "pass '{}' initialized twice", self.name());
        let result = self.initialize(ctx, resources);
        self.base_mut().initialized = result.is_ok();
        result
    }

    pub fn on_init_scene(&mut self, ctx: &mut dyn RenderContext, scene: Option<&SceneHandle>) {
        self.init_scene(ctx, scene);
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.resize(width, height);
    }

    pub fn on_pipeline_update(&mut self, resources: &ResourceManager) {
        self.pipeline_updated(resources);
    }

    pub fn on_state_refresh(&mut self) {
        self.state_refreshed();
    }

    pub fn on_input_event(&mut self, event: &InputEvent) -> bool {
        self.process_input(event)
    }

    /// `ui` is the content of the pass's window. Its placement is recorded
    /// before the pass draws into it.
    pub fn on_render_gui(&mut self, ui: &mut egui::Ui) {
        let rect = ui.max_rect();
        self.base_mut().record_gui_rect([rect.min.x, rect.min.y], [rect.width(), rect.height()]);
        self.render_gui(ui);
    }

    /// Refresh is cleared before `execute` runs, so a pass that sets it while
    /// rendering has it seen on the next frame.
    pub fn on_execute(&mut self, frame: &mut FrameContext) {
        self.base_mut().refresh = false;
        self.execute(frame);
    }

    pub fn on_shutdown(&mut self) {
        debug_assert!(self.base().initialized, "shutdown of pass '{}' that isn't initialized", self.name());
        if self.base().initialized {
            self.shutdown();
        }
        self.base_mut().initialized = false;
    }

    pub fn on_pass_activation(&mut self) {
        self.activate_pass();
    }

    pub fn on_pass_deactivation(&mut self) {
        self.deactivate_pass();
    }

    pub fn is_refresh_flag_set(&self) -> bool {
        self.base().refresh
    }

    pub fn is_rebind_flag_set(&self) -> bool {
        self.base().rebind
    }

    pub fn reset_rebind_flag(&mut self) {
        self.base_mut().rebind = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;

    struct Flaky {
        base: PassBase,
        fail: bool,
        executed: usize,
        shut_down: usize,
    }

    impl Flaky {
        fn new(fail: bool) -> Self {
            Self { base: PassBase::new("Flaky", "Flaky Options"), fail, executed: 0, shut_down: 0 }
        }
    }

    impl RenderPass for Flaky {
        fn base(&self) -> &PassBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut PassBase {
            &mut self.base
        }

        fn initialize(&mut self, _ctx: &mut dyn RenderContext, _resources: &mut ResourceManager) -> anyhow::Result<()> {
            anyhow::ensure!(!self.fail, "asked to fail");
            Ok(())
        }

        fn execute(&mut self, _frame: &mut FrameContext) {
            self.executed += 1;
            // ask for a refresh every frame, like a pass that detected motion
            self.base.set_refresh_flag();
        }

        fn shutdown(&mut self) {
            self.shut_down += 1;
        }
    }

    #[test]
    fn new_passes_request_refresh_and_rebind() {
        let mut flaky = Flaky::new(false);
        let pass: &mut dyn RenderPass = &mut flaky;
        assert!(pass.is_refresh_flag_set());
        assert!(pass.is_rebind_flag_set());
        pass.reset_rebind_flag();
        assert!(!pass.is_rebind_flag_set());
        assert_eq!(pass.base().gui_position, [-270, 30]);
        assert!(pass.has_animation());
        assert!(!pass.requires_scene());
    }

    #[test]
    fn initialization_result_is_recorded() {
        let mut ctx = HeadlessContext::new();
        let mut resources = ResourceManager::new(4, 4);

        let mut good = Flaky::new(false);
        let pass: &mut dyn RenderPass = &mut good;
        assert!(pass.on_initialize(&mut ctx, &mut resources).is_ok());
        assert!(pass.is_initialized());

        let mut bad = Flaky::new(true);
        let pass: &mut dyn RenderPass = &mut bad;
        assert!(pass.on_initialize(&mut ctx, &mut resources).is_err());
        assert!(!pass.is_initialized());
    }

    #[test]
    fn refresh_set_during_execute_survives_the_call() {
        let mut ctx = HeadlessContext::new();
        let mut resources = ResourceManager::new(4, 4);
        let mut flaky = Flaky::new(false);
        let pass: &mut dyn RenderPass = &mut flaky;
        let mut frame = FrameContext { render: &mut ctx, resources: &mut resources, scene: None, time: 0.0 };
        pass.on_execute(&mut frame);
        assert!(pass.is_refresh_flag_set());
        assert_eq!(flaky.executed, 1);
    }

    #[test]
    fn shutdown_runs_once_and_uninitializes() {
        let mut ctx = HeadlessContext::new();
        let mut resources = ResourceManager::new(4, 4);
        let mut flaky = Flaky::new(false);
        {
            let pass: &mut dyn RenderPass = &mut flaky;
            pass.on_initialize(&mut ctx, &mut resources).unwrap();
            pass.on_shutdown();
            assert!(!pass.is_initialized());
        }
        assert_eq!(flaky.shut_down, 1);
    }

    #[test]
    fn gui_rect_has_a_minimum_size() {
        let mut base = PassBase::new("a", "b");
        base.record_gui_rect([10.4, 20.6], [5.0, 300.0]);
        assert_eq!(base.gui_position, [10, 21]);
        assert_eq!(base.gui_size, [32, 300]);
    }
}
