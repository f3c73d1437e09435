/// Input events as the pipeline and its passes see them.
///
/// winit delivers keyboard and mouse input spread over window and device
/// events. We boil them down to the few things passes and the camera
/// controller react to.
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, VirtualKeyCode, WindowEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { key: VirtualKeyCode, pressed: bool },
    MouseButton { button: MouseButton, pressed: bool },
    /// Raw mouse movement, not tied to the cursor position.
    MouseMotion { dx: f64, dy: f64 },
    /// Scroll amount in lines.
    MouseWheel { delta: f32 },
}

impl InputEvent {
    pub fn from_window_event(event: &WindowEvent) -> Option<Self> {
        match event {
            WindowEvent::KeyboardInput { input, .. } => input.virtual_keycode.map(|key| InputEvent::Key {
                key,
                pressed: input.state == ElementState::Pressed,
            }),
            WindowEvent::MouseInput { state, button, .. } => Some(InputEvent::MouseButton {
                button: *button,
                pressed: *state == ElementState::Pressed,
            }),
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    // a line is roughly 20 pixels
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 20.0,
                };
                Some(InputEvent::MouseWheel { delta })
            }
            _ => None,
        }
    }

    pub fn from_device_event(event: &DeviceEvent) -> Option<Self> {
        match event {
            DeviceEvent::MouseMotion { delta } => Some(InputEvent::MouseMotion { dx: delta.0, dy: delta.1 }),
            _ => None,
        }
    }
}
