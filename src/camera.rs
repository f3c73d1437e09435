// This import allows us to use the useful definitions from cgmath
// The e.g. define a function to construct the view transformation
// matrix
use cgmath::*;
use winit::event::{MouseButton, VirtualKeyCode};

use crate::input::InputEvent;

// This is a transform between different reference frames. This is due to
// differing standard coordinate frames in openGL and WebGPU
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// keep the camera from flipping over when looking straight up or down
const SAFE_FRAC_PI_2: f32 = std::f32::consts::FRAC_PI_2 - 0.0001;

// This is the camera struct
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    // This is the position of the camera in world space
    pub position: Point3<f32>,
    // The viewing direction is going to be defined by pitch
    // and yaw
    pub pitch: Rad<f32>,
    pub yaw: Rad<f32>,
    pub field_of_view: Rad<f32>,
    // this is the aspect ratio of our screen, which we need to generate
    // the projection matrix
    pub aspect_ratio: f32,
    // these are needed to determin clipping of objects to be rendered
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, Y: Into<Rad<f32>>, Pi: Into<Rad<f32>>, F: Into<Rad<f32>>>(
        position: P,
        yaw: Y,
        pitch: Pi,
        field_of_view: F,
        width: u32,
        height: u32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        let mut camera = Self {
            position: position.into(),
            pitch: pitch.into(),
            yaw: yaw.into(),
            field_of_view: field_of_view.into(),
            aspect_ratio: 1.0,
            znear,
            zfar,
        };
        camera.resize(width, height);
        camera
    }

    /// The unit vector the camera looks along
    pub fn direction(&self) -> Vector3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize()
    }

    /// Turn the camera so that it looks at `target`
    pub fn look_at(&mut self, target: Point3<f32>) {
        let to_target = target - self.position;
        if to_target.magnitude2() == 0.0 {
            return;
        }
        let dir = to_target.normalize();
        self.pitch = Rad(dir.y.asin().clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
        self.yaw = Rad(dir.z.atan2(dir.x));
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.direction(), Vector3::unit_y())
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.field_of_view, self.aspect_ratio, self.znear, self.zfar)
    }

    pub fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// the aspect ratio follows the size of the screen
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }
}

/// First person controls: WASD to move, Q/E down and up, drag with the right
/// mouse button to look around, scroll to change speed.
#[derive(Debug, Clone)]
pub struct CameraController {
    pub speed: f32,
    pub sensitivity: f32,
    forward: f32,
    backward: f32,
    left: f32,
    right: f32,
    up: f32,
    down: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    looking: bool,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            forward: 0.0,
            backward: 0.0,
            left: 0.0,
            right: 0.0,
            up: 0.0,
            down: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            looking: false,
        }
    }

    /// Returns true if the event was used to control the camera
    pub fn process_event(&mut self, event: &InputEvent) -> bool {
        match *event {
            InputEvent::Key { key, pressed } => {
                let amount = if pressed { 1.0 } else { 0.0 };
                match key {
                    VirtualKeyCode::W | VirtualKeyCode::Up => self.forward = amount,
                    VirtualKeyCode::S | VirtualKeyCode::Down => self.backward = amount,
                    VirtualKeyCode::A | VirtualKeyCode::Left => self.left = amount,
                    VirtualKeyCode::D | VirtualKeyCode::Right => self.right = amount,
                    VirtualKeyCode::E => self.up = amount,
                    VirtualKeyCode::Q => self.down = amount,
                    _ => return false,
                }
                true
            }
            InputEvent::MouseButton { button: MouseButton::Right, pressed } => {
                self.looking = pressed;
                true
            }
            InputEvent::MouseMotion { dx, dy } if self.looking => {
                self.rotate_horizontal += dx as f32;
                self.rotate_vertical += dy as f32;
                true
            }
            InputEvent::MouseWheel { delta } => {
                self.speed = (self.speed * (1.0 + 0.1 * delta)).max(0.01);
                true
            }
            _ => false,
        }
    }

    /// Move the camera according to the keys held down. Returns true if the
    /// camera moved.
    pub fn update(&mut self, camera: &mut Camera, dt: std::time::Duration) -> bool {
        let dt = dt.as_secs_f32();
        let before = (camera.position, camera.yaw, camera.pitch);

        let (yaw_sin, yaw_cos) = camera.yaw.0.sin_cos();
        let forward = Vector3::new(yaw_cos, 0.0, yaw_sin).normalize();
        let right = Vector3::new(-yaw_sin, 0.0, yaw_cos).normalize();
        camera.position += forward * (self.forward - self.backward) * self.speed * dt;
        camera.position += right * (self.right - self.left) * self.speed * dt;
        camera.position.y += (self.up - self.down) * self.speed * dt;

        camera.yaw += Rad(self.rotate_horizontal) * self.sensitivity * dt;
        camera.pitch += Rad(-self.rotate_vertical) * self.sensitivity * dt;
        camera.pitch = Rad(camera.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        before != (camera.position, camera.yaw, camera.pitch)
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(4.0, 0.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn camera() -> Camera {
        Camera::new((0.0, 0.0, 5.0), Deg(-90.0), Deg(0.0), Deg(45.0), 800, 600, 0.1, 100.0)
    }

    #[test]
    fn look_at_points_the_camera_at_the_target() {
        let mut camera = camera();
        camera.look_at(Point3::new(5.0, 0.0, 5.0));
        let dir = camera.direction();
        assert!((dir.x - 1.0).abs() < 1e-5);
        assert!(dir.z.abs() < 1e-5);
    }

    #[test]
    fn aspect_ratio_follows_resize() {
        let mut camera = camera();
        assert!((camera.aspect_ratio - 800.0 / 600.0).abs() < 1e-6);
        camera.resize(0, 10);
        assert!((camera.aspect_ratio - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn controller_moves_only_while_keys_are_held() {
        let mut camera = camera();
        let mut controller = CameraController::default();
        assert!(!controller.update(&mut camera, Duration::from_millis(16)));

        assert!(controller.process_event(&InputEvent::Key { key: VirtualKeyCode::W, pressed: true }));
        assert!(controller.update(&mut camera, Duration::from_millis(16)));
        assert!(camera.position.z < 5.0);

        controller.process_event(&InputEvent::Key { key: VirtualKeyCode::W, pressed: false });
        assert!(!controller.update(&mut camera, Duration::from_millis(16)));
    }

    #[test]
    fn unrelated_keys_are_not_consumed() {
        let mut controller = CameraController::default();
        assert!(!controller.process_event(&InputEvent::Key { key: VirtualKeyCode::P, pressed: true }));
        assert!(!controller.process_event(&InputEvent::MouseMotion { dx: 1.0, dy: 1.0 }));
    }
}
