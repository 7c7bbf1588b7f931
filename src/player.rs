use glam::{Mat4, Vec3};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::streaming::TerrainStreamer;

/// Ground speed in world units per second.
pub const WALK_SPEED: f32 = 4.0;
/// Where the follow camera aims, above the character's feet.
pub const EYE_HEIGHT: f32 = 1.5;

pub struct Player {
    pub position: Vec3,
    /// Facing angle in radians around Y; the model turns toward its motion.
    pub heading: f32,
}

impl Player {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            heading: 0.0,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_rotation_y(self.heading)
    }

    pub fn focus_point(&self) -> Vec3 {
        self.position + Vec3::new(0.0, EYE_HEIGHT, 0.0)
    }
}

/// WASD state, applied each tick relative to the camera yaw.
#[derive(Default)]
pub struct PlayerController {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
}

impl PlayerController {
    pub fn process_events(&mut self, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    ..
                },
            ..
        } = event
        else {
            return false;
        };
        self.press(*code, *state == ElementState::Pressed)
    }

    fn press(&mut self, code: KeyCode, pressed: bool) -> bool {
        match code {
            KeyCode::KeyW => self.forward = pressed,
            KeyCode::KeyS => self.backward = pressed,
            KeyCode::KeyA => self.left = pressed,
            KeyCode::KeyD => self.right = pressed,
            _ => return false,
        }
        true
    }

    /// Advance the player by one tick: integrate the pressed keys in the
    /// camera's ground-plane frame, then clamp the feet to the terrain.
    pub fn update_player(
        &self,
        player: &mut Player,
        camera_forward: Vec3,
        terrain: &TerrainStreamer,
        dt: f32,
    ) {
        let right = Vec3::new(-camera_forward.z, 0.0, camera_forward.x);

        let mut direction = Vec3::ZERO;
        if self.forward {
            direction += camera_forward;
        }
        if self.backward {
            direction -= camera_forward;
        }
        if self.right {
            direction += right;
        }
        if self.left {
            direction -= right;
        }

        if direction.length_squared() > 0.0 {
            let direction = direction.normalize();
            player.position += direction * WALK_SPEED * dt;
            player.heading = direction.x.atan2(direction.z);
        }

        player.position.y = terrain.height_at(player.position.x, player.position.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::HeightField;

    fn terrain() -> TerrainStreamer {
        TerrainStreamer::new(HeightField::default())
    }

    #[test]
    fn press_only_claims_movement_keys() {
        let mut controller = PlayerController::default();
        assert!(controller.press(KeyCode::KeyW, true));
        assert!(controller.forward);
        assert!(!controller.press(KeyCode::KeyQ, true));
        assert!(controller.press(KeyCode::KeyW, false));
        assert!(!controller.forward);
    }

    #[test]
    fn diagonal_movement_is_not_faster() {
        let terrain = terrain();
        let forward = Vec3::new(0.0, 0.0, -1.0);

        let mut straight = Player::new(Vec3::ZERO);
        let mut controller = PlayerController::default();
        controller.press(KeyCode::KeyW, true);
        controller.update_player(&mut straight, forward, &terrain, 1.0);

        let mut diagonal = Player::new(Vec3::ZERO);
        controller.press(KeyCode::KeyD, true);
        controller.update_player(&mut diagonal, forward, &terrain, 1.0);

        let straight_dist = Vec3::new(straight.position.x, 0.0, straight.position.z).length();
        let diagonal_dist = Vec3::new(diagonal.position.x, 0.0, diagonal.position.z).length();
        assert!((straight_dist - WALK_SPEED).abs() < 1e-4);
        assert!((diagonal_dist - WALK_SPEED).abs() < 1e-4);
    }

    #[test]
    fn idle_player_still_sticks_to_the_ground() {
        let terrain = terrain();
        let mut player = Player::new(Vec3::new(7.0, 100.0, -3.0));
        let controller = PlayerController::default();
        controller.update_player(&mut player, Vec3::NEG_Z, &terrain, 0.016);
        assert_eq!(player.position.y, terrain.height_at(7.0, -3.0));
        assert_eq!(player.position.x, 7.0);
        assert_eq!(player.position.z, -3.0);
    }

    #[test]
    fn heading_turns_toward_motion() {
        let terrain = terrain();
        let mut player = Player::new(Vec3::ZERO);
        let mut controller = PlayerController::default();
        controller.press(KeyCode::KeyW, true);
        // camera looking down -Z: atan2(0, -1) = pi
        controller.update_player(&mut player, Vec3::NEG_Z, &terrain, 0.1);
        assert!((player.heading.abs() - std::f32::consts::PI).abs() < 1e-5);
    }
}
