use crate::camera::FollowCamera;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

const ZOOM_SENSITIVITY: f32 = 0.5;
const MIN_PITCH: f32 = 5.0;
const MAX_PITCH: f32 = 89.0;
const MIN_DISTANCE: f32 = 2.0;
const MAX_DISTANCE: f32 = 50.0;

/// Collects camera input over a frame and applies it in one step.
#[derive(Default)]
pub struct CameraController {
    is_left_pressed: bool,
    is_right_pressed: bool,
    is_middle_mouse_pressed: bool,

    rotation_speed: f32,
    mouse_sensitivity: f32,

    mouse_delta_x: f32,
    mouse_delta_y: f32,
    zoom_delta: f32,
}

impl CameraController {
    pub fn new(rotation_speed: f32, mouse_sensitivity: f32) -> Self {
        Self {
            rotation_speed,
            mouse_sensitivity,
            ..Default::default()
        }
    }

    pub fn process_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event: key_event, .. } => {
                match &key_event.logical_key {
                    Key::Named(NamedKey::ArrowLeft) => {
                        self.is_left_pressed = key_event.state == ElementState::Pressed;
                        true
                    }
                    Key::Named(NamedKey::ArrowRight) => {
                        self.is_right_pressed = key_event.state == ElementState::Pressed;
                        true
                    }
                    _ => false,
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.zoom_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y * -1.0,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * -0.1,
                };
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if *button == MouseButton::Middle {
                    self.is_middle_mouse_pressed = *state == ElementState::Pressed;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn process_mouse_motion(&mut self, delta_x: f64, delta_y: f64) {
        self.mouse_delta_x += delta_x as f32;
        self.mouse_delta_y += delta_y as f32;
    }

    pub fn update_camera(&mut self, camera: &mut FollowCamera) {
        if self.is_left_pressed {
            camera.yaw -= self.rotation_speed;
        }
        if self.is_right_pressed {
            camera.yaw += self.rotation_speed;
        }

        if self.is_middle_mouse_pressed {
            camera.yaw += self.mouse_delta_x * self.mouse_sensitivity;
            camera.pitch -= self.mouse_delta_y * self.mouse_sensitivity;
            camera.pitch = camera.pitch.clamp(MIN_PITCH, MAX_PITCH);
        }

        camera.distance += self.zoom_delta * ZOOM_SENSITIVITY;
        camera.distance = camera.distance.clamp(MIN_DISTANCE, MAX_DISTANCE);

        self.zoom_delta = 0.0;
        self.mouse_delta_x = 0.0;
        self.mouse_delta_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn orbit_drag_clamps_pitch() {
        let mut controller = CameraController::new(1.0, 1.0);
        let mut camera = FollowCamera::new(Vec3::ZERO);
        controller.is_middle_mouse_pressed = true;
        controller.process_mouse_motion(0.0, -500.0);
        controller.update_camera(&mut camera);
        assert_eq!(camera.pitch, MAX_PITCH);
    }

    #[test]
    fn zoom_clamps_distance_and_resets_delta() {
        let mut controller = CameraController::new(1.0, 1.0);
        let mut camera = FollowCamera::new(Vec3::ZERO);
        controller.zoom_delta = 1000.0;
        controller.update_camera(&mut camera);
        assert_eq!(camera.distance, MAX_DISTANCE);
        controller.update_camera(&mut camera);
        assert_eq!(camera.distance, MAX_DISTANCE);
    }
}
