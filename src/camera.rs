//! Perspective camera with orbit controls
//!
//! Dragging orbits around the target at a fixed distance; the wheel changes
//! that distance. Orientation is kept as yaw/pitch so it can never flip.

use glam::{Mat4, Vec3};

use crate::consts::*;

const MIN_DISTANCE: f32 = 2.0;
const MAX_DISTANCE: f32 = 20.0;
/// Keeps the camera off the poles
const MAX_PITCH: f32 = 1.45;

/// Radians of orbit per dragged pixel
pub const ORBIT_SENSITIVITY: f32 = 0.005;
/// Distance change per wheel unit
pub const ZOOM_SENSITIVITY: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: CAMERA_START,
            target: Vec3::ZERO,
            fov_y: CAMERA_FOV_DEGREES,
            aspect: sanitize_aspect(aspect),
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
        }
    }

    /// Recompute the aspect ratio after a resize
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = sanitize_aspect(width as f32 / height as f32);
        }
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Tangent of half the vertical fov, used by the raymarcher
    pub fn half_fov_tan(&self) -> f32 {
        (self.fov_y.to_radians() * 0.5).tan()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Rotate around the target by dragged pixels
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        let (yaw, pitch, distance) = self.spherical();
        let yaw = yaw - dx * ORBIT_SENSITIVITY;
        let pitch = (pitch + dy * ORBIT_SENSITIVITY).clamp(-MAX_PITCH, MAX_PITCH);
        self.set_spherical(yaw, pitch, distance);
    }

    /// Positive deltas move away from the target, negative towards it
    pub fn zoom(&mut self, delta: f32) {
        let (yaw, pitch, distance) = self.spherical();
        let distance = (distance + delta * ZOOM_SENSITIVITY).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.set_spherical(yaw, pitch, distance);
    }

    /// (yaw around Y, pitch above the XZ plane, distance) of the eye
    fn spherical(&self) -> (f32, f32, f32) {
        let offset = self.position - self.target;
        let distance = offset.length().max(f32::EPSILON);
        let yaw = offset.x.atan2(offset.z);
        let pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();
        (yaw, pitch, distance)
    }

    fn set_spherical(&mut self, yaw: f32, pitch: f32, distance: f32) {
        let offset = Vec3::new(
            distance * pitch.cos() * yaw.sin(),
            distance * pitch.sin(),
            distance * pitch.cos() * yaw.cos(),
        );
        self.position = self.target + offset;
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view() {
        let camera = Camera::new(16.0 / 9.0);
        assert_eq!(camera.position, Vec3::new(0.0, 1.5, 4.5));
        assert_eq!(camera.target, Vec3::ZERO);
        assert!((camera.half_fov_tan() - (37.5f32).to_radians().tan()).abs() < 1e-6);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = Camera::new(1.0);
        camera.resize(1920, 1080);
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
        // Zero-sized canvas keeps the last valid aspect
        camera.resize(0, 1080);
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::new(1.0);
        let d = camera.distance();
        camera.orbit(120.0, -40.0);
        assert!((camera.distance() - d).abs() < 1e-4);
        assert_ne!(camera.position, CAMERA_START);
    }

    #[test]
    fn test_orbit_round_trip_returns_home() {
        let mut camera = Camera::new(1.0);
        camera.orbit(50.0, 20.0);
        camera.orbit(-50.0, -20.0);
        assert!((camera.position - CAMERA_START).length() < 1e-4);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::new(1.0);
        camera.orbit(0.0, 10_000.0);
        let offset = (camera.position - camera.target).normalize();
        assert!(offset.y < 1.0);
        assert!(offset.y.asin() <= MAX_PITCH + 1e-4);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::new(1.0);
        camera.zoom(-100_000.0);
        assert!((camera.distance() - MIN_DISTANCE).abs() < 1e-4);
        camera.zoom(100_000.0);
        assert!((camera.distance() - MAX_DISTANCE).abs() < 1e-3);
    }

    #[test]
    fn test_view_projection_maps_target_inside_clip() {
        let camera = Camera::new(1.0);
        let clip = camera.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
