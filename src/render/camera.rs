use glam::{Mat4, Vec2, Vec3, Vec4};

/// Where a recenter puts the camera, looking at the origin.
pub const HOME_POSITION: [f32; 3] = [5.0, 5.0, 5.0];

const FOV_Y_DEG: f32 = 50.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 1000.0;
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 200.0;
const PITCH_LIMIT: f32 = 1.55;
const ORBIT_SPEED: f32 = 0.008;
const ZOOM_SPEED: f32 = 0.0015;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Orbit camera around a target point. Yaw/pitch describe the direction from
/// the target to the eye.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::home()
    }
}

impl OrbitCamera {
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let distance = offset.length().max(MIN_DISTANCE);
        let (yaw, pitch) = offset_to_yaw_pitch(offset);
        Self {
            target,
            yaw,
            pitch,
            distance,
        }
    }

    pub fn home() -> Self {
        Self::looking_at(Vec3::from_array(HOME_POSITION), Vec3::ZERO)
    }

    pub fn recenter(&mut self) {
        *self = Self::home();
    }

    pub fn eye(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        self.target
            + Vec3::new(
                self.yaw.cos() * cos_pitch,
                self.pitch.sin(),
                self.yaw.sin() * cos_pitch,
            ) * self.distance
    }

    /// Drag delta in points, as reported by the UI.
    pub fn orbit(&mut self, drag: Vec2) {
        self.yaw += drag.x * ORBIT_SPEED;
        self.pitch = (self.pitch + drag.y * ORBIT_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        wrap_angle(&mut self.yaw);
    }

    /// Positive scroll moves the camera towards the target.
    pub fn zoom(&mut self, scroll: f32) {
        if scroll == 0.0 {
            return;
        }
        let factor = (-scroll * ZOOM_SPEED).exp();
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(FOV_Y_DEG.to_radians(), aspect.max(1e-3), NEAR, FAR)
    }
}

/// Camera snapshot bound to a viewport rectangle, used for projecting and
/// unprojecting during one frame.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub rect: egui::Rect,
    pub eye: Vec3,
    view: Mat4,
    proj: Mat4,
    view_proj: Mat4,
    inv_view_proj: Mat4,
}

impl Viewport {
    pub fn new(camera: &OrbitCamera, rect: egui::Rect) -> Self {
        let aspect = rect.width() / rect.height().max(1.0);
        let view = camera.view();
        let proj = camera.projection(aspect);
        let view_proj = proj * view;
        Self {
            rect,
            eye: camera.eye(),
            view,
            proj,
            view_proj,
            inv_view_proj: view_proj.inverse(),
        }
    }

    /// Screen position of a world point, or `None` behind the camera.
    pub fn project(&self, world: Vec3) -> Option<egui::Pos2> {
        let clip = self.view_proj * world.extend(1.0);
        if clip.w <= NEAR {
            return None;
        }
        Some(self.ndc_to_screen(clip.truncate() / clip.w))
    }

    /// Segment clipped against the near plane, then projected.
    pub fn project_segment(&self, a: Vec3, b: Vec3) -> Option<[egui::Pos2; 2]> {
        let va = self.view.transform_point3(a);
        let vb = self.view.transform_point3(b);
        // View space looks down -Z; keep a margin in front of the near plane.
        let limit = -NEAR * 2.0;
        if va.z > limit && vb.z > limit {
            return None;
        }
        let clip_to_near = |front: Vec3, back: Vec3| {
            let t = (limit - front.z) / (back.z - front.z);
            front + (back - front) * t
        };
        let (ca, cb) = if va.z > limit {
            (clip_to_near(vb, va), vb)
        } else if vb.z > limit {
            (va, clip_to_near(va, vb))
        } else {
            (va, vb)
        };
        Some([self.project_view_space(ca)?, self.project_view_space(cb)?])
    }

    fn project_view_space(&self, point: Vec3) -> Option<egui::Pos2> {
        let clip = self.proj * point.extend(1.0);
        if clip.w <= NEAR {
            return None;
        }
        Some(self.ndc_to_screen(clip.truncate() / clip.w))
    }

    pub fn ray(&self, screen: egui::Pos2) -> Ray {
        let ndc_x = (screen.x - self.rect.left()) / self.rect.width() * 2.0 - 1.0;
        let ndc_y = 1.0 - (screen.y - self.rect.top()) / self.rect.height() * 2.0;
        let near = self.inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = self.inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        Ray {
            origin: self.eye,
            direction: (far - near).normalize_or_zero(),
        }
    }

    /// World length that spans roughly `pixels` on screen at `point`.
    pub fn world_size_for_pixels(&self, point: Vec3, pixels: f32) -> f32 {
        let depth = (point - self.eye).length().max(NEAR);
        let fov = FOV_Y_DEG.to_radians();
        let world_per_pixel = 2.0 * depth * (fov * 0.5).tan() / self.rect.height().max(1.0);
        world_per_pixel * pixels
    }

    fn ndc_to_screen(&self, ndc: Vec3) -> egui::Pos2 {
        egui::pos2(
            self.rect.left() + (ndc.x * 0.5 + 0.5) * self.rect.width(),
            self.rect.top() + (0.5 - ndc.y * 0.5) * self.rect.height(),
        )
    }
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let n = offset.normalize_or_zero();
    if n == Vec3::ZERO {
        return (0.0, 0.0);
    }
    (n.z.atan2(n.x), n.y.clamp(-1.0, 1.0).asin())
}

fn wrap_angle(angle: &mut f32) {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        *angle = (*angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    }
}
