use crate::scene::Aabb;
use glam::{Mat4, Vec3};

pub const DEFAULT_FOV_DEGREES: f32 = 45.0;
/// Zoom-out applied on top of the exact fit distance.
pub const FRAMING_MARGIN: f32 = 1.7;
/// Camera height above the centroid, as a fraction of the largest extent.
pub const UPWARD_BIAS: f32 = 0.3;
pub const MIN_EXTENT: f32 = 1e-4;

const MIN_FOV: f32 = 1e-3;
const MAX_FOV: f32 = std::f32::consts::PI - 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPose {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
}

impl ViewPose {
    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }
}

impl Default for ViewPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            fov_y: DEFAULT_FOV_DEGREES.to_radians(),
        }
    }
}

/// Pose that fits `bounds` into a vertical field of view of `fov_y` radians,
/// looking down -Z at the centroid.
pub fn frame(bounds: &Aabb, fov_y: f32) -> ViewPose {
    let fov_y = if fov_y.is_finite() {
        fov_y.clamp(MIN_FOV, MAX_FOV)
    } else {
        DEFAULT_FOV_DEGREES.to_radians()
    };
    let center = bounds.center();
    let max_extent = bounds.max_extent();
    let max_extent = if max_extent.is_finite() {
        max_extent.max(MIN_EXTENT)
    } else {
        MIN_EXTENT
    };

    let distance = (max_extent / (2.0 * (fov_y * 0.5).tan())).abs() * FRAMING_MARGIN;
    ViewPose {
        position: Vec3::new(
            center.x,
            center.y + max_extent * UPWARD_BIAS,
            center.z + distance,
        ),
        target: center,
        fov_y,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub pose: ViewPose,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(fov_y: f32, aspect: f32) -> Self {
        Self {
            pose: ViewPose {
                fov_y,
                ..ViewPose::default()
            },
            aspect: sanitize_aspect(aspect),
            near: 0.1,
            far: 2000.0,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = sanitize_aspect(aspect);
    }

    pub fn view_matrix(&self) -> Mat4 {
        let forward = self.pose.target - self.pose.position;
        let up = if forward.normalize_or_zero().cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.pose.position, self.pose.target, up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.pose.fov_y, self.aspect, self.near, self.far)
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

/// Orbit-style camera manipulation around a target point.
///
/// Input is accumulated between frames and applied by [`OrbitControls::update`].
#[derive(Debug, Clone, Copy)]
pub struct OrbitControls {
    pub target: Vec3,
    pub rotate_speed: f32,
    pub zoom_scale: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    pending_dolly: f32,
    retarget: bool,
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            rotate_speed: 1.0,
            zoom_scale: 0.95,
            min_distance: 1e-3,
            max_distance: 1500.0,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_dolly: 0.0,
            retarget: true,
        }
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.retarget = true;
    }

    /// Drag expressed as a fraction of the viewport height; a full-height drag
    /// turns the camera by one revolution.
    pub fn rotate(&mut self, dx_fraction: f32, dy_fraction: f32) {
        const TWO_PI: f32 = std::f32::consts::PI * 2.0;
        self.pending_yaw += TWO_PI * dx_fraction * self.rotate_speed;
        self.pending_pitch += TWO_PI * dy_fraction * self.rotate_speed;
    }

    /// Positive steps move the camera closer.
    pub fn dolly(&mut self, steps: f32) {
        if steps.is_finite() {
            self.pending_dolly += steps;
        }
    }

    /// Applies pending input to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let idle = self.pending_yaw == 0.0 && self.pending_pitch == 0.0 && self.pending_dolly == 0.0;
        if idle && !self.retarget {
            return false;
        }

        let offset = camera.pose.position - self.target;
        let distance = offset.length().max(self.min_distance);
        let (mut yaw, mut pitch) = offset_to_yaw_pitch(offset);
        yaw -= self.pending_yaw;
        pitch += self.pending_pitch;
        wrap_angles(&mut yaw, &mut pitch);

        let distance = (distance * self.zoom_scale.powf(self.pending_dolly))
            .clamp(self.min_distance, self.max_distance);
        let cos_pitch = pitch.cos();
        let direction = Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch);

        camera.pose.position = self.target + direction * distance;
        camera.pose.target = self.target;
        self.pending_yaw = 0.0;
        self.pending_pitch = 0.0;
        self.pending_dolly = 0.0;
        self.retarget = false;
        true
    }
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let len = offset.length().max(1e-6);
    let n = offset / len;
    let yaw = n.z.atan2(n.x);
    let pitch = n.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}

fn wrap_angles(yaw: &mut f32, pitch: &mut f32) {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 1e-3;
    if yaw.is_finite() {
        *yaw = (*yaw + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    } else {
        *yaw = 0.0;
    }
    if pitch.is_finite() {
        *pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    } else {
        *pitch = 0.0;
    }
}
