//! Perspective camera with explicit matrix updates.

use glam::{Mat4, Vec3};

/// Closest an orbiting camera may get to the poles, in radians.
const MAX_ELEVATION: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A perspective camera looking at a target point.
///
/// View and projection matrices are recomputed only by [`Camera::update`],
/// which the caller invokes once per frame before rendering.
#[derive(Debug, Clone)]
pub struct Camera {
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Vec3,
    target: Vec3,
    up: Vec3,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    /// Creates a camera with a 45 degree vertical field of view.
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            fov_y: 45.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 2.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    /// Sets the eye position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the look-at target.
    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_fov_degrees(&mut self, fov: f32) {
        self.fov_y = fov.to_radians();
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
    }

    /// Update the aspect ratio.
    pub fn update_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Recomputes the view and projection matrices.
    pub fn update(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.target, self.up);
        self.projection = Mat4::perspective_rh_gl(self.fov_y, self.aspect, self.near, self.far);
    }

    /// View matrix as of the last [`update`](Self::update).
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// Projection matrix as of the last [`update`](Self::update).
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Distance from the eye to the target.
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Horizontal angle of the eye around the target, in radians.
    pub fn azimuth(&self) -> f32 {
        let offset = self.position - self.target;
        offset.x.atan2(offset.z)
    }

    /// Vertical angle of the eye above the target, in radians.
    pub fn elevation(&self) -> f32 {
        let offset = self.position - self.target;
        let horizontal = (offset.x * offset.x + offset.z * offset.z).sqrt();
        offset.y.atan2(horizontal)
    }

    /// Moves the eye around the target, keeping the distance.
    pub fn orbit(&mut self, delta_azimuth: f32, delta_elevation: f32) {
        let distance = self.distance();
        let azimuth = self.azimuth() + delta_azimuth;
        let elevation = (self.elevation() + delta_elevation).clamp(-MAX_ELEVATION, MAX_ELEVATION);
        let offset = Vec3::new(
            distance * elevation.cos() * azimuth.sin(),
            distance * elevation.sin(),
            distance * elevation.cos() * azimuth.cos(),
        );
        self.position = self.target + offset;
    }

    /// Moves the eye towards (`factor < 1`) or away from the target.
    pub fn dolly(&mut self, factor: f32) {
        let offset = (self.position - self.target) * factor.max(f32::EPSILON);
        self.position = self.target + offset;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}
