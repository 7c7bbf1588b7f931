use glam::{Mat4, Quat, Vec3};

/// Third-person orbit camera that tracks the player.
pub struct FollowCamera {
    pub focus: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl FollowCamera {
    pub fn new(focus: Vec3) -> Self {
        Self {
            focus,
            yaw: 0.0,
            pitch: 40.0,
            distance: 12.0,
        }
    }

    /// Re-centre the orbit, keeping yaw/pitch/distance.
    pub fn follow(&mut self, focus: Vec3) {
        self.focus = focus;
    }

    fn orbit_rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw.to_radians())
            * Quat::from_rotation_x(-self.pitch.to_radians())
    }

    pub fn eye_position(&self) -> Vec3 {
        self.focus + self.orbit_rotation() * Vec3::new(0.0, 0.0, self.distance)
    }

    /// View direction projected onto the ground plane, for camera-relative
    /// movement. Unit length for any yaw.
    pub fn forward_xz(&self) -> Vec3 {
        let yaw_rad = self.yaw.to_radians();
        Vec3::new(-yaw_rad.sin(), 0.0, -yaw_rad.cos())
    }

    pub fn build_view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.focus, Vec3::Y)
    }
}

pub struct Projection {
    aspect: f32,
    fovy: f32,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy_degrees: f32, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy_degrees.to_radians(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn build_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_keeps_orbit_distance() {
        let mut camera = FollowCamera::new(Vec3::new(3.0, 1.0, -8.0));
        camera.yaw = 73.0;
        camera.pitch = 25.0;
        let d = (camera.eye_position() - camera.focus).length();
        assert!((d - camera.distance).abs() < 1e-4);
    }

    #[test]
    fn forward_is_level_and_unit_length() {
        let mut camera = FollowCamera::new(Vec3::ZERO);
        for yaw in [0.0, 45.0, 133.7, -290.0] {
            camera.yaw = yaw;
            let f = camera.forward_xz();
            assert_eq!(f.y, 0.0);
            assert!((f.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn at_zero_yaw_the_eye_sits_behind_the_view() {
        let camera = FollowCamera::new(Vec3::ZERO);
        let f = camera.forward_xz();
        assert!((f - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
        assert!(camera.eye_position().z > 0.0);
    }
}
