/**
The rendering pipeline: an ordered, editable list of render passes.

The pipeline owns the resource manager, the scene and every pass it knows
about. Passes are placed into slots; the passes sitting in slots are the
active ones and are executed in slot order every frame. Slots can be changed,
added and removed at runtime from the GUI.

Every frame the pipeline first looks for changes (passes asking for a rebind,
channels that were added or reallocated) and tells all active passes about
them, then tells them to drop their temporal history if anyone asked for a
refresh, then executes them and finally copies the output channel to the
screen.
*/
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::camera::CameraController;
use crate::context::RenderContext;
use crate::input::InputEvent;
use crate::render_pass::{FrameContext, RenderPass, SharedPass};
use crate::resource_manager::{ChannelId, ResourceManager, OUTPUT_CHANNEL};
use crate::resources;
use crate::scene::{self, SceneHandle};
use crate::texture::Texture;

/// Shown in the pass selectors for an empty slot.
pub const NULL_PASS_NAME: &str = "< None >";

/// Minimum ray distances offered in the GUI.
pub const MIN_T_OPTIONS: [f32; 8] = [0.1, 0.01, 0.001, 1.0e-4, 1.0e-5, 1.0e-6, 1.0e-7, 0.0];
const DEFAULT_MIN_T_OPTION: usize = 3;

/// An HDR environment map offered in the GUI if it's found on disk.
const DESERT_ENVIRONMENT: &str = "MonValley_G_DirtRoad_3k.hdr";

const SKY_BLUE_LABEL: &str = "Sky blue (i.e., [0.5, 0.5, 0.8])";
const BLACK_LABEL: &str = "Black (i.e., [0.0, 0.0, 0.0])";

/// What the active passes need from the pipeline, combined over all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineRequirements {
    pub requires_scene: bool,
    pub requires_rasterization: bool,
    pub requires_ray_tracing: bool,
    pub applies_postprocess: bool,
    pub uses_compute: bool,
    pub uses_environment_map: bool,
    pub needs_default_scene: bool,
    pub has_animation: bool,
}

impl PipelineRequirements {
    fn include(&mut self, pass: &dyn RenderPass) {
        self.requires_scene |= pass.requires_scene();
        self.requires_rasterization |= pass.uses_rasterization();
        self.requires_ray_tracing |= pass.uses_ray_tracing();
        self.applies_postprocess |= pass.applies_postprocess();
        self.uses_compute |= pass.uses_compute();
        self.uses_environment_map |= pass.uses_environment_map();
        self.needs_default_scene |= pass.load_default_scene();
        self.has_animation |= pass.has_animation();
    }
}

/// How long one pass spent in `execute` on the last frame. With a GPU engine
/// this is the time to record its commands, not the time the GPU takes.
#[derive(Debug, Clone, PartialEq)]
pub struct PassTiming {
    pub name: String,
    pub cpu_time: Duration,
}

struct PassSlot {
    active: Option<SharedPass>,
    /// Ids of the passes the user can pick for this slot. `None` offers every
    /// available pass.
    options: Option<Vec<usize>>,
    show_gui: bool,
    can_remove: bool,
    can_add_after: bool,
}

impl Default for PassSlot {
    fn default() -> Self {
        Self {
            active: None,
            options: None,
            show_gui: false,
            can_remove: true,
            can_add_after: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvironmentChoice {
    LoadFile,
    Black,
    SkyBlue,
    Desert,
}

impl EnvironmentChoice {
    fn label(self) -> &'static str {
        match self {
            EnvironmentChoice::LoadFile => "< Load new map... >",
            EnvironmentChoice::Black => "Switch -> black environment",
            EnvironmentChoice::SkyBlue => "Switch -> sky blue environment",
            EnvironmentChoice::Desert => "Switch -> desert HDR environment",
        }
    }
}

// Things clicked in the GUI. They're applied once all windows are drawn.
enum GuiAction {
    LoadScene,
    Environment(EnvironmentChoice),
    MinT(usize),
    ChangePass { slot: usize, pass_id: Option<usize> },
    RemovePass(usize),
    InsertPassAfter(usize),
}

pub struct RenderingPipeline {
    // every pass ever registered; failed passes leave a hole so ids stay stable
    available: Vec<Option<SharedPass>>,
    slots: Vec<PassSlot>,
    resources: ResourceManager,
    output_channel: Option<ChannelId>,
    scene: Option<SceneHandle>,
    camera_controller: CameraController,
    requirements: PipelineRequirements,
    last_known_size: (u32, u32),
    pipeline_changed: bool,
    global_refresh: bool,
    initialized: bool,
    first_frame: bool,
    last_frame: Instant,
    time: f32,
    freeze_time: bool,
    instructions: Vec<String>,
    environment_label: String,
    environment_choices: Vec<EnvironmentChoice>,
    min_t_selection: usize,
    pass_timings: Vec<PassTiming>,
}

impl Default for RenderingPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderingPipeline {
    pub fn new() -> Self {
        let mut resources = ResourceManager::new(0, 0);
        resources.set_min_t_dist(MIN_T_OPTIONS[DEFAULT_MIN_T_OPTION]);
        Self {
            available: Vec::new(),
            slots: Vec::new(),
            resources,
            output_channel: None,
            scene: None,
            camera_controller: CameraController::default(),
            requirements: PipelineRequirements::default(),
            last_known_size: (0, 0),
            pipeline_changed: true,
            global_refresh: false,
            initialized: false,
            first_frame: true,
            last_frame: Instant::now(),
            time: 0.0,
            freeze_time: false,
            instructions: Vec::new(),
            environment_label: String::new(),
            environment_choices: Vec::new(),
            min_t_selection: DEFAULT_MIN_T_OPTION,
            pass_timings: Vec::new(),
        }
    }

    /// Make a pass available to the pipeline without placing it in a slot.
    /// Returns the id the pass is known by.
    ///
    /// After `on_load` the pass is initialized right away. If that fails it is
    /// dropped like any other pass that fails to initialize, and its id stays
    /// reserved.
    pub fn add_pass(&mut self, ctx: &mut dyn RenderContext, pass: SharedPass) -> usize {
        self.available.push(Some(pass));
        let id = self.available.len() - 1;
        // channels it asks for late still need their textures
        if self.initialized && self.initialize_pass(ctx, id) && self.resources.is_initialized() {
            self.resources.initialize_resources(ctx);
        }
        id
    }

    // the id of `pass`, registering it first if we haven't seen it yet
    fn register(&mut self, ctx: &mut dyn RenderContext, pass: &SharedPass) -> usize {
        let known = self
            .available
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| Rc::ptr_eq(p, pass)));
        match known {
            Some(id) => id,
            None => self.add_pass(ctx, pass.clone()),
        }
    }

    // Returns false if the pass failed, in which case it is gone from the
    // available list and from every slot.
    fn initialize_pass(&mut self, ctx: &mut dyn RenderContext, id: usize) -> bool {
        let Some(pass) = self.available[id].clone() else { return false };
        let result = pass.borrow_mut().on_initialize(ctx, &mut self.resources);
        let Err(e) = result else { return true };

        log::warn!("disabling pass '{}', it failed to initialize: {:#}", pass.borrow().name(), e);
        self.available[id] = None;
        for slot in self.slots.iter_mut() {
            if slot.active.as_ref().is_some_and(|p| Rc::ptr_eq(p, &pass)) {
                slot.active = None;
            }
        }
        false
    }

    fn pad_slots(&mut self, slot: usize) {
        while self.slots.len() <= slot {
            self.insert_pass_into_pipeline(self.slots.len());
        }
    }

    /// Put `pass` into `slot`, adding empty slots up to it if needed.
    ///
    /// Before `on_load` this only records the pass; it is resized and
    /// activated once the pipeline is loaded. Afterwards the pass is
    /// initialized if it is new and swapped in right away.
    pub fn set_pass(&mut self, ctx: &mut dyn RenderContext, slot: usize, pass: Option<SharedPass>, can_add_after: bool, can_remove: bool) {
        self.pad_slots(slot);

        let id = pass.as_ref().map(|p| self.register(ctx, p));
        let entry = &mut self.slots[slot];
        entry.options = Some(id.into_iter().collect());
        entry.can_add_after = can_add_after;
        entry.can_remove = can_remove;

        if self.initialized {
            let pass = id.and_then(|id| self.available_pass(id));
            self.change_pass(slot, pass);
        } else {
            self.slots[slot].active = pass;
        }
        self.pipeline_changed = true;
    }

    /// Let the user choose between `passes` for `slot`, starting with the first.
    pub fn set_pass_options(&mut self, ctx: &mut dyn RenderContext, slot: usize, passes: Vec<SharedPass>) {
        self.pad_slots(slot);
        if passes.is_empty() {
            return;
        }

        let ids: Vec<usize> = passes.iter().map(|p| self.register(ctx, p)).collect();
        let first = self.available_pass(ids[0]);
        let entry = &mut self.slots[slot];
        entry.options = Some(ids);
        entry.can_add_after = false;
        entry.can_remove = false;

        if self.initialized {
            self.change_pass(slot, first);
        } else {
            self.slots[slot].active = first;
        }
        self.pipeline_changed = true;
    }

    /// Add an empty slot after `after` (or at the end if `after` is past it).
    pub fn insert_pass_into_pipeline(&mut self, after: usize) {
        let location = if after < self.slots.len() { after + 1 } else { self.slots.len() };
        self.slots.insert(location, PassSlot::default());
    }

    /// Swap the pass in `slot`. Putting the pass that is already there back is
    /// a no-op. Once the pipeline is loaded only initialized passes are
    /// accepted; use `set_pass` for new ones.
    pub fn change_pass(&mut self, slot: usize, pass: Option<SharedPass>) {
        if self.initialized && pass.as_ref().is_some_and(|p| !p.borrow().is_initialized()) {
            log::warn!("not putting an uninitialized pass into slot {}", slot);
            return;
        }
        let Some(entry) = self.slots.get_mut(slot) else {
            log::warn!("no slot {} to change the pass of", slot);
            return;
        };
        if let (Some(current), Some(new)) = (&entry.active, &pass) {
            if Rc::ptr_eq(current, new) {
                return;
            }
        }

        if let Some(old) = entry.active.take() {
            old.borrow_mut().on_pass_deactivation();
        }
        if let Some(new) = &pass {
            let mut new = new.borrow_mut();
            new.on_resize(self.last_known_size.0, self.last_known_size.1);
            new.on_pass_activation();
            log::debug!("slot {} now runs '{}'", slot, new.name());
        }
        entry.active = pass;

        self.update_requirements();
        self.pipeline_changed = true;
    }

    /// Activate the available pass with id `pass_id` in `slot`, `None` empties
    /// the slot.
    pub fn select_pass_option(&mut self, slot: usize, pass_id: Option<usize>) {
        let pass = pass_id.and_then(|id| self.available.get(id).cloned().flatten());
        self.change_pass(slot, pass);
    }

    /// Remove a slot, moving the ones after it up. The last remaining slot
    /// can't be removed. Returns true if the slot was removed.
    pub fn remove_pass_from_pipeline(&mut self, slot: usize) -> bool {
        if self.slots.len() <= 1 || slot >= self.slots.len() {
            return false;
        }

        let removed = self.slots.remove(slot);
        if let Some(pass) = removed.active {
            pass.borrow_mut().on_pass_deactivation();
        }

        self.update_requirements();
        self.pipeline_changed = true;
        true
    }

    /// A line of text shown at the top of the pipeline GUI.
    pub fn add_pipe_instructions(&mut self, text: &str) {
        self.instructions.push(text.to_string());
    }

    fn active(&self) -> impl Iterator<Item = &SharedPass> {
        self.slots.iter().filter_map(|s| s.active.as_ref())
    }

    fn update_requirements(&mut self) {
        let mut requirements = PipelineRequirements {
            needs_default_scene: self.resources.user_set_default_scene(),
            ..Default::default()
        };
        for pass in self.active() {
            requirements.include(&*pass.borrow());
        }
        requirements.requires_scene |= requirements.needs_default_scene;
        self.requirements = requirements;
    }

    /**
    Initialize every registered pass and get ready for the first frame.

    Passes that fail to initialize are logged and dropped for the rest of
    the run, including from any slot they were placed in. Passes placed in
    slots before this call get their resize and activation now.
    */
    pub fn on_load(&mut self, ctx: &mut dyn RenderContext) {
        self.output_channel = match self.resources.request_channel(OUTPUT_CHANNEL) {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("can't create the output channel: {}", e);
                None
            }
        };

        for id in 0..self.available.len() {
            self.initialize_pass(ctx, id);
        }

        // there always has to be something to pick passes from
        if self.slots.is_empty() {
            self.insert_pass_into_pipeline(0);
        }

        let (width, height) = self.last_known_size;
        if width > 0 && height > 0 {
            self.resources.resize(ctx, width, height);
        }
        for pass in self.active() {
            let mut pass = pass.borrow_mut();
            pass.on_resize(width, height);
            pass.on_pass_activation();
        }

        self.update_requirements();
        if self.requirements.uses_environment_map {
            self.create_environment_selector(ctx);
        }

        self.pipeline_changed = true;
        self.initialized = true;
        log::info!("pipeline loaded with {} slots", self.slots.len());
    }

    fn create_environment_selector(&mut self, ctx: &mut dyn RenderContext) {
        if self.resources.environment_map().is_none() {
            match self.resources.update_environment_map(ctx, "") {
                Ok(()) => self.environment_label = SKY_BLUE_LABEL.to_string(),
                Err(e) => log::error!("can't create the default environment map: {:#}", e),
            }
        } else if !self.resources.environment_map_name().is_empty() {
            self.environment_label = self.resources.environment_map_name().to_string();
        } else {
            self.environment_label = "Constant color".to_string();
        }

        self.environment_choices = vec![EnvironmentChoice::LoadFile, EnvironmentChoice::Black, EnvironmentChoice::SkyBlue];
        if resources::find_file_in_data_directories(Path::new(DESERT_ENVIRONMENT)).is_some() {
            self.environment_choices.push(EnvironmentChoice::Desert);
        }
    }

    /// Replace the environment map with a constant color preset or an image
    /// file. Returns false (and keeps the current map) if that didn't work.
    pub fn load_environment_map(&mut self, ctx: &mut dyn RenderContext, source: &str) -> bool {
        match self.resources.update_environment_map(ctx, source) {
            Ok(()) => {
                self.environment_label = match source {
                    "" => SKY_BLUE_LABEL.to_string(),
                    "Black" => BLACK_LABEL.to_string(),
                    "Carolina sky blue" => source.to_string(),
                    _ => self.resources.environment_map_name().to_string(),
                };
                self.global_refresh = true;
                true
            }
            Err(e) => {
                log::error!("failed to load environment map {}: {:#}", source, e);
                false
            }
        }
    }

    fn apply_environment_choice(&mut self, ctx: &mut dyn RenderContext, choice: EnvironmentChoice) {
        match choice {
            EnvironmentChoice::LoadFile => {
                if let Some(path) = resources::pick_texture_file() {
                    self.load_environment_map(ctx, &path.to_string_lossy());
                }
            }
            EnvironmentChoice::Black => {
                self.load_environment_map(ctx, "Black");
            }
            EnvironmentChoice::SkyBlue => {
                self.load_environment_map(ctx, "");
            }
            EnvironmentChoice::Desert => {
                if self.load_environment_map(ctx, DESERT_ENVIRONMENT) {
                    self.environment_label = "Desert HDR environment".to_string();
                }
            }
        }
        self.global_refresh = true;
    }

    fn on_first_run(&mut self, ctx: &mut dyn RenderContext) {
        if self.requirements.needs_default_scene {
            let path = self.resources.default_scene_name().to_path_buf();
            if let Some(scene) = scene::load_scene(self.last_known_size, Some(&path)) {
                self.on_init_new_scene(ctx, scene);
            }
        }
        self.first_frame = false;
    }

    // Collects rebind requests and resource changes into `pipeline_changed`.
    fn any_requested_pipeline_changes(&mut self) -> bool {
        for pass in self.slots.iter().filter_map(|s| s.active.as_ref()) {
            let mut pass = pass.borrow_mut();
            if pass.is_rebind_flag_set() {
                self.pipeline_changed = true;
                pass.reset_rebind_flag();
            }
        }

        if self.resources.have_resources_changed() {
            self.pipeline_changed = true;
            self.resources.reset_dirty_flag();
        }

        self.pipeline_changed
    }

    fn have_passes_set_refresh_flag(&self) -> bool {
        self.active().any(|p| p.borrow().is_refresh_flag_set())
    }

    /// Render one frame and copy the output channel into `target`, if given.
    pub fn on_frame_render(&mut self, ctx: &mut dyn RenderContext, target: Option<&Texture>) {
        if self.first_frame {
            self.on_first_run(ctx);
        }

        if !self.resources.is_initialized() {
            self.resources.initialize_resources(ctx);
        }

        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;
        if !self.freeze_time {
            self.time += dt.as_secs_f32();
        }

        if let Some(scene) = &self.scene {
            self.camera_controller.update(&mut scene.borrow_mut().camera, dt);
        }

        let updated = self.any_requested_pipeline_changes();
        if updated {
            for pass in self.active() {
                pass.borrow_mut().on_pipeline_update(&self.resources);
            }
            self.update_requirements();
        }

        if updated || self.global_refresh || self.have_passes_set_refresh_flag() {
            for pass in self.active() {
                pass.borrow_mut().on_state_refresh();
            }
            self.global_refresh = false;
        }

        let mut frame = FrameContext {
            render: &mut *ctx,
            resources: &mut self.resources,
            scene: self.scene.as_ref(),
            time: self.time,
        };
        let mut timings = Vec::with_capacity(self.slots.len());
        for pass in self.slots.iter().filter_map(|s| s.active.as_ref()) {
            let mut pass = pass.borrow_mut();
            let started = Instant::now();
            pass.on_execute(&mut frame);
            let cpu_time = started.elapsed();
            log::trace!("'{}' executed in {:?}", pass.name(), cpu_time);
            timings.push(PassTiming { name: pass.name().to_string(), cpu_time });
        }
        self.pass_timings = timings;

        if let (Some(target), Some(output)) = (target, self.resources.get_texture(self.output_channel)) {
            ctx.blit(&output, target);
        }

        self.pipeline_changed = false;
    }

    /// Install a new scene and hand it to every registered pass, whether it
    /// sits in a slot or not.
    pub fn on_init_new_scene(&mut self, ctx: &mut dyn RenderContext, scene: SceneHandle) {
        {
            let mut loaded = scene.borrow_mut();
            self.camera_controller.speed = loaded.camera_speed;
            loaded.camera.resize(self.last_known_size.0, self.last_known_size.1);
        }
        self.scene = Some(scene);

        for pass in self.available.iter().flatten() {
            pass.borrow_mut().on_init_scene(ctx, self.scene.as_ref());
        }
    }

    /// Load a scene, asking the user for a file if `path` is `None`. On
    /// failure the current scene stays. Returns true if a scene was loaded.
    pub fn load_scene(&mut self, ctx: &mut dyn RenderContext, path: Option<&Path>) -> bool {
        match scene::load_scene(self.last_known_size, path) {
            Some(scene) => {
                self.on_init_new_scene(ctx, scene);
                self.global_refresh = true;
                true
            }
            None => false,
        }
    }

    pub fn on_resize(&mut self, ctx: &mut dyn RenderContext, width: u32, height: u32) {
        self.last_known_size = (width, height);

        // no real screen yet, wait for one
        if width == 0 || height == 0 {
            return;
        }
        // on_load takes it from here
        if !self.initialized {
            return;
        }

        self.resources.resize(ctx, width, height);
        if let Some(scene) = &self.scene {
            scene.borrow_mut().camera.resize(width, height);
        }
        // inactive passes get resized when they are activated
        for pass in self.active() {
            pass.borrow_mut().on_resize(width, height);
        }
    }

    pub fn on_shutdown(&mut self) {
        for pass in self.available.iter().flatten() {
            let mut pass = pass.borrow_mut();
            if pass.is_initialized() {
                pass.on_shutdown();
            }
        }
    }

    /// Offer an input event to the active passes in order, then to the camera.
    /// Returns true if someone used it.
    pub fn on_input_event(&mut self, event: &InputEvent) -> bool {
        for pass in self.slots.iter().filter_map(|s| s.active.as_ref()) {
            if pass.borrow_mut().on_input_event(event) {
                return true;
            }
        }
        self.camera_controller.process_event(event)
    }

    /// Draw the pipeline controls and the windows of the active passes.
    pub fn on_gui_render(&mut self, ctx: &mut dyn RenderContext, egui_ctx: &egui::Context) {
        let mut actions = Vec::new();

        let pass_name = |id: usize| self.available.get(id).and_then(Option::as_ref).map(|p| p.borrow().name().to_string());
        let slot_views: Vec<(String, Vec<(usize, String)>)> = self
            .slots
            .iter()
            .map(|slot| {
                let selected = match &slot.active {
                    Some(pass) => pass.borrow().name().to_string(),
                    None => NULL_PASS_NAME.to_string(),
                };
                let ids: Vec<usize> = match &slot.options {
                    Some(ids) => ids.clone(),
                    None => (0..self.available.len()).collect(),
                };
                let options = ids.into_iter().filter_map(|id| pass_name(id).map(|name| (id, name))).collect();
                (selected, options)
            })
            .collect();

        let requirements = self.requirements;
        let slot_count = self.slots.len();
        let slots = &mut self.slots;
        let freeze_time = &mut self.freeze_time;
        let instructions = &self.instructions;
        let environment_label = &self.environment_label;
        let environment_choices = &self.environment_choices;
        let min_t_selection = self.min_t_selection;
        let pass_timings = &self.pass_timings;

        egui::Window::new("Rendering pipeline")
            .default_pos([10.0, 10.0])
            .default_width(300.0)
            .show(egui_ctx, |ui| {
                if requirements.requires_scene {
                    ui.label("Need to open a new scene?  Click below:");
                    if ui.button("Load Scene").clicked() {
                        actions.push(GuiAction::LoadScene);
                    }
                    ui.separator();
                }

                if requirements.uses_environment_map {
                    ui.label("Current environment map:");
                    egui::ComboBox::from_id_source("environment-map")
                        .selected_text(environment_label.as_str())
                        .show_ui(ui, |ui| {
                            for choice in environment_choices {
                                if ui.selectable_label(false, choice.label()).clicked() {
                                    actions.push(GuiAction::Environment(*choice));
                                }
                            }
                        });
                    ui.separator();
                }

                if requirements.requires_ray_tracing {
                    ui.label("Set ray tracing min traversal distance:");
                    egui::ComboBox::from_id_source("min-t")
                        .selected_text(format!("{}", MIN_T_OPTIONS[min_t_selection]))
                        .show_ui(ui, |ui| {
                            for (i, min_t) in MIN_T_OPTIONS.iter().enumerate() {
                                if ui.selectable_label(i == min_t_selection, format!("{}", min_t)).clicked() {
                                    actions.push(GuiAction::MinT(i));
                                }
                            }
                        });
                    ui.separator();
                }

                if !instructions.is_empty() {
                    for line in instructions {
                        ui.label(line.as_str());
                    }
                    ui.label("");
                }

                ui.label("Ordered list of passes in rendering pipeline:");
                ui.label("       (Click the boxes at left to toggle GUIs)");
                for (i, (slot, (selected, options))) in slots.iter_mut().zip(slot_views.iter()).enumerate() {
                    ui.horizontal(|ui| {
                        ui.checkbox(&mut slot.show_gui, "");
                        egui::ComboBox::from_id_source(("pass-selector", i))
                            .selected_text(selected.as_str())
                            .show_ui(ui, |ui| {
                                if ui.selectable_label(slot.active.is_none(), NULL_PASS_NAME).clicked() {
                                    actions.push(GuiAction::ChangePass { slot: i, pass_id: None });
                                }
                                for (id, name) in options {
                                    if ui.selectable_label(name == selected, name.as_str()).clicked() {
                                        actions.push(GuiAction::ChangePass { slot: i, pass_id: Some(*id) });
                                    }
                                }
                            });
                        if slot.can_add_after && ui.small_button("+").clicked() {
                            actions.push(GuiAction::InsertPassAfter(i));
                        }
                        if slot.can_remove && slot_count > 1 && ui.small_button("-").clicked() {
                            actions.push(GuiAction::RemovePass(i));
                        }
                    });
                }

                if requirements.has_animation {
                    ui.separator();
                    ui.checkbox(freeze_time, "Freeze all scene animations");
                }

                ui.collapsing("Pass timings", |ui| {
                    for timing in pass_timings {
                        ui.label(format!("{}: {:.3} ms", timing.name, timing.cpu_time.as_secs_f64() * 1000.0));
                    }
                });
            });

        self.render_pass_windows(egui_ctx);

        for action in actions {
            match action {
                GuiAction::LoadScene => {
                    self.load_scene(ctx, None);
                }
                GuiAction::Environment(choice) => self.apply_environment_choice(ctx, choice),
                GuiAction::MinT(i) => {
                    self.min_t_selection = i;
                    self.resources.set_min_t_dist(MIN_T_OPTIONS[i]);
                    self.global_refresh = true;
                }
                GuiAction::ChangePass { slot, pass_id } => self.select_pass_option(slot, pass_id),
                GuiAction::RemovePass(slot) => {
                    self.remove_pass_from_pipeline(slot);
                }
                GuiAction::InsertPassAfter(slot) => self.insert_pass_into_pipeline(slot),
            }
        }
    }

    // One window per active pass, stacked so they don't cover each other.
    fn render_pass_windows(&mut self, egui_ctx: &egui::Context) {
        let pixels_per_point = egui_ctx.pixels_per_point();
        let screen_width = (self.last_known_size.0 as f32 / pixels_per_point) as i32;
        let screen_height = (self.last_known_size.1 as f32 / pixels_per_point) as i32;

        let mut y_offset = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(pass) = &slot.active else { continue };

            if slot.show_gui {
                let (title, mut position, size) = {
                    let pass = pass.borrow();
                    (pass.gui_name().to_string(), pass.base().gui_position, pass.base().gui_size)
                };
                // negative positions are relative to the right and bottom edges
                if position[0] < 0 {
                    position[0] += screen_width;
                }
                if position[1] < 0 {
                    position[1] += screen_height;
                }
                position[1] = (position[1] + y_offset).min(screen_height - 100);

                egui::Window::new(title)
                    .id(egui::Id::new(("pass-gui", i)))
                    .default_pos([position[0] as f32, position[1] as f32])
                    .default_size([size[0] as f32, size[1] as f32])
                    .show(egui_ctx, |ui| pass.borrow_mut().on_render_gui(ui));
            }

            y_offset += pass.borrow().base().gui_size[1];
        }
    }

    /// Request a refresh of every active pass on the next frame.
    pub fn request_global_refresh(&mut self) {
        self.global_refresh = true;
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn active_pass(&self, slot: usize) -> Option<SharedPass> {
        self.slots.get(slot).and_then(|s| s.active.clone())
    }

    pub fn active_passes(&self) -> Vec<SharedPass> {
        self.active().cloned().collect()
    }

    /// The pass registered under `id`, `None` if it failed to initialize.
    pub fn available_pass(&self, id: usize) -> Option<SharedPass> {
        self.available.get(id).cloned().flatten()
    }

    /// Show or hide the GUI window of the pass in `slot`, like the checkbox
    /// next to it does.
    pub fn show_pass_gui(&mut self, slot: usize, show: bool) {
        if let Some(slot) = self.slots.get_mut(slot) {
            slot.show_gui = show;
        }
    }

    pub fn can_remove_pass(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.can_remove)
    }

    pub fn can_add_pass_after(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.can_add_after)
    }

    pub fn requirements(&self) -> PipelineRequirements {
        self.requirements
    }

    pub fn has_pipeline_changed(&self) -> bool {
        self.pipeline_changed
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    pub fn scene(&self) -> Option<&SceneHandle> {
        self.scene.as_ref()
    }

    pub fn last_known_size(&self) -> (u32, u32) {
        self.last_known_size
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_freeze_time(&mut self, freeze: bool) {
        self.freeze_time = freeze;
    }

    /// Per pass execution times of the last frame, in slot order.
    pub fn pass_timings(&self) -> &[PassTiming] {
        &self.pass_timings
    }

    /// Seconds of scene time passed so far.
    pub fn time(&self) -> f32 {
        self.time
    }
}
