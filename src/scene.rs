/// The scene shared by all passes: geometry, a camera and some lights.
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use cgmath::*;

use crate::camera::Camera;
use crate::model::{Bounds, Mesh};
use crate::resources;

/// Passes share one scene, the pipeline holds on to it and hands out clones
/// of the handle.
pub type SceneHandle = Rc<RefCell<Scene>>;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub name: String,
    pub direction: Vector3<f32>,
    pub intensity: Vector3<f32>,
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub camera: Camera,
    pub lights: Vec<DirectionalLight>,
    /// How fast the camera controller should move through this scene
    pub camera_speed: f32,
    bounds: Option<Bounds>,
}

impl Scene {
    /// Build a scene around `meshes`, with a camera looking at all of them
    /// from the front and a single directional light.
    pub fn new(name: &str, meshes: Vec<Mesh>, screen_size: (u32, u32)) -> Self {
        let bounds = Bounds::of_meshes(&meshes);
        let (center, radius) = match bounds {
            Some(b) => (b.center(), b.radius().max(1.0e-3)),
            None => (Point3::new(0.0, 0.0, 0.0), 1.0),
        };

        let mut camera = Camera::new(
            center + Vector3::new(0.0, 0.0, 3.0 * radius),
            Deg(-90.0),
            Deg(0.0),
            Deg(45.0),
            screen_size.0,
            screen_size.1,
            (radius / 750.0).max(0.1),
            radius * 10.0,
        );
        camera.look_at(center);

        Self {
            name: name.to_string(),
            meshes,
            camera,
            lights: vec![DirectionalLight {
                name: "DirLight".to_string(),
                direction: Vector3::new(-0.189, -0.861, -0.471),
                intensity: Vector3::new(1.0, 1.0, 0.985) * 10.0,
            }],
            camera_speed: radius * 0.25,
            bounds,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn into_handle(self) -> SceneHandle {
        Rc::new(RefCell::new(self))
    }
}

/// Load a scene from `file_name`, or from a file the user picks if no name
/// is given.
///
/// Returns `None` if the dialog was cancelled or the file couldn't be loaded;
/// the reason is logged.
pub fn load_scene(screen_size: (u32, u32), file_name: Option<&Path>) -> Option<SceneHandle> {
    let path = match file_name {
        Some(name) => match resources::find_file_in_data_directories(name) {
            Some(path) => path,
            None => {
                log::error!("scene file {:?} not found", name);
                return None;
            }
        },
        None => resources::pick_scene_file()?,
    };

    match pollster::block_on(resources::load_obj_meshes(&path)) {
        Ok(meshes) => {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            log::info!("loaded scene {} with {} meshes", name, meshes.len());
            Some(Scene::new(&name, meshes, screen_size).into_handle())
        }
        Err(e) => {
            log::error!("failed to load scene {:?}: {:#}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_still_has_camera_and_light() {
        let scene = Scene::new("empty", Vec::new(), (800, 600));
        assert!(scene.bounds().is_none());
        assert_eq!(scene.lights.len(), 1);
        assert!((scene.camera.position.z - 3.0).abs() < 1e-5);
    }

    #[test]
    fn default_scene_loads() {
        let scene = load_scene((640, 480), Some(Path::new("cube.obj"))).unwrap();
        let scene = scene.borrow();
        assert_eq!(scene.name, "cube.obj");
        let bounds = scene.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn missing_scene_is_none() {
        assert!(load_scene((640, 480), Some(Path::new("missing.obj"))).is_none());
    }
}
