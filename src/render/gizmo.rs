use super::camera::Viewport;
use super::pick::ray_plane;
use crate::scene::{ControlMode, ObjectId};
use egui::{Color32, Pos2, Stroke};
use glam::{EulerRot, Quat, Vec3};

/// On-screen length of the gizmo axes, in points.
const GIZMO_PIXELS: f32 = 90.0;
const HIT_THRESHOLD: f32 = 8.0;
const RING_SEGMENTS: usize = 48;

const COLOR_X: Color32 = Color32::from_rgb(230, 70, 70);
const COLOR_Y: Color32 = Color32::from_rgb(90, 200, 90);
const COLOR_Z: Color32 = Color32::from_rgb(80, 130, 240);
const COLOR_ACTIVE: Color32 = Color32::from_rgb(250, 210, 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
}

impl GizmoAxis {
    pub const ALL: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

    fn unit(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
        }
    }

    fn color(self) -> Color32 {
        match self {
            GizmoAxis::X => COLOR_X,
            GizmoAxis::Y => COLOR_Y,
            GizmoAxis::Z => COLOR_Z,
        }
    }
}

/// Pose of the selected object as the gizmo sees it.
#[derive(Debug, Clone, Copy)]
pub struct GizmoTarget {
    pub position: Vec3,
    pub rotation: Quat,
    /// Lowest allowed Y for `position`.
    pub rest_offset: f32,
}

impl GizmoTarget {
    /// Axis in world space, following the object's local frame.
    fn axis_world(&self, axis: GizmoAxis) -> Vec3 {
        (self.rotation * axis.unit()).normalize_or_zero()
    }
}

#[derive(Debug, Clone)]
struct GizmoDrag {
    id: ObjectId,
    mode: ControlMode,
    axis: GizmoAxis,
    axis_world: Vec3,
    start_mouse: Pos2,
    start: GizmoTarget,
    start_vec: Option<Vec3>,
}

/// Pose produced by a gizmo drag, already clamped above the ground.
#[derive(Debug, Clone, PartialEq)]
pub struct GizmoUpdate {
    pub id: ObjectId,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

#[derive(Default)]
pub struct TransformGizmo {
    drag: Option<GizmoDrag>,
}

impl TransformGizmo {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragged_object(&self) -> Option<&ObjectId> {
        self.drag.as_ref().map(|drag| &drag.id)
    }

    pub fn active_axis(&self) -> Option<GizmoAxis> {
        self.drag.as_ref().map(|drag| drag.axis)
    }

    pub fn hit_test(
        &self,
        viewport: &Viewport,
        target: &GizmoTarget,
        mode: ControlMode,
        mouse: Pos2,
    ) -> Option<GizmoAxis> {
        let scale = viewport.world_size_for_pixels(target.position, GIZMO_PIXELS);
        let mut best = None;
        let mut best_dist = f32::INFINITY;
        for axis in GizmoAxis::ALL {
            let dist = match mode {
                ControlMode::Translate => {
                    let end = target.position + target.axis_world(axis) * scale;
                    match viewport.project_segment(target.position, end) {
                        Some([a, b]) => distance_to_segment(mouse, a, b),
                        None => continue,
                    }
                }
                ControlMode::Rotate => ring_points(target, axis, scale)
                    .windows(2)
                    .filter_map(|pair| viewport.project_segment(pair[0], pair[1]))
                    .map(|[a, b]| distance_to_segment(mouse, a, b))
                    .fold(f32::INFINITY, f32::min),
            };
            if dist < best_dist {
                best_dist = dist;
                best = Some(axis);
            }
        }
        best.filter(|_| best_dist <= HIT_THRESHOLD)
    }

    pub fn begin(
        &mut self,
        viewport: &Viewport,
        id: ObjectId,
        target: GizmoTarget,
        mode: ControlMode,
        axis: GizmoAxis,
        mouse: Pos2,
    ) {
        let axis_world = target.axis_world(axis);
        let start_vec = match mode {
            ControlMode::Translate => None,
            ControlMode::Rotate => ray_plane(&viewport.ray(mouse), target.position, axis_world)
                .map(|hit| (hit - target.position).normalize_or_zero()),
        };
        log::debug!("Gizmo {:?} drag on {:?} axis of {}", mode, axis, id);
        self.drag = Some(GizmoDrag {
            id,
            mode,
            axis,
            axis_world,
            start_mouse: mouse,
            start: target,
            start_vec,
        });
    }

    pub fn end(&mut self) {
        self.drag = None;
    }

    /// New pose for the current pointer position, or `None` if nothing can be
    /// derived this frame (axis edge-on, pointer off the rotation plane).
    pub fn update(&self, viewport: &Viewport, mouse: Pos2) -> Option<GizmoUpdate> {
        let drag = self.drag.as_ref()?;
        let (position, rotation) = match drag.mode {
            ControlMode::Translate => {
                let delta = axis_drag_delta(viewport, drag, mouse)?;
                (drag.start.position + drag.axis_world * delta, drag.start.rotation)
            }
            ControlMode::Rotate => {
                let start_vec = drag.start_vec?;
                let hit = ray_plane(&viewport.ray(mouse), drag.start.position, drag.axis_world)?;
                let current = (hit - drag.start.position).normalize_or_zero();
                let angle = start_vec
                    .cross(current)
                    .dot(drag.axis_world)
                    .atan2(start_vec.dot(current).clamp(-1.0, 1.0));
                let turn = Quat::from_axis_angle(drag.axis_world, angle);
                (drag.start.position, (turn * drag.start.rotation).normalize())
            }
        };
        let position = clamp_to_rest(position, drag.start.rest_offset);
        Some(GizmoUpdate {
            id: drag.id.clone(),
            position: position.to_array(),
            rotation: euler_from_quat(rotation),
        })
    }

    pub fn draw(
        &self,
        painter: &egui::Painter,
        viewport: &Viewport,
        target: &GizmoTarget,
        mode: ControlMode,
        hovered: Option<GizmoAxis>,
    ) {
        let scale = viewport.world_size_for_pixels(target.position, GIZMO_PIXELS);
        let highlighted = self.active_axis().or(hovered);
        for axis in GizmoAxis::ALL {
            let color = if highlighted == Some(axis) {
                COLOR_ACTIVE
            } else {
                axis.color()
            };
            let stroke = Stroke::new(3.0, color);
            match mode {
                ControlMode::Translate => {
                    let end = target.position + target.axis_world(axis) * scale;
                    if let Some([a, b]) = viewport.project_segment(target.position, end) {
                        painter.line_segment([a, b], stroke);
                        painter.circle_filled(b, 5.0, color);
                    }
                }
                ControlMode::Rotate => {
                    for pair in ring_points(target, axis, scale).windows(2) {
                        if let Some(segment) = viewport.project_segment(pair[0], pair[1]) {
                            painter.line_segment(segment, stroke);
                        }
                    }
                }
            }
        }
        if let Some(center) = viewport.project(target.position) {
            painter.circle_filled(center, 3.5, Color32::WHITE);
        }
    }
}

/// Keeps a dragged object from sinking below its resting height.
pub fn clamp_to_rest(position: Vec3, rest_offset: f32) -> Vec3 {
    Vec3::new(position.x, position.y.max(rest_offset), position.z)
}

pub fn quat_from_euler(rotation: [f32; 3]) -> Quat {
    Quat::from_euler(EulerRot::XYZ, rotation[0], rotation[1], rotation[2])
}

pub fn euler_from_quat(rotation: Quat) -> [f32; 3] {
    let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
    [x, y, z]
}

fn axis_drag_delta(viewport: &Viewport, drag: &GizmoDrag, mouse: Pos2) -> Option<f32> {
    let origin = drag.start.position;
    let scale = viewport.world_size_for_pixels(origin, GIZMO_PIXELS);
    let origin_screen = viewport.project(origin)?;
    let end_screen = viewport.project(origin + drag.axis_world * scale)?;
    let axis_screen = end_screen - origin_screen;
    let axis_screen_len = axis_screen.length();
    if axis_screen_len <= 1.0e-3 {
        return None;
    }
    let along = (mouse - drag.start_mouse).dot(axis_screen / axis_screen_len);
    Some(along * scale / axis_screen_len)
}

fn ring_points(target: &GizmoTarget, axis: GizmoAxis, radius: f32) -> Vec<Vec3> {
    let normal = target.axis_world(axis);
    let (u, v) = normal.any_orthonormal_pair();
    (0..=RING_SEGMENTS)
        .map(|i| {
            let angle = i as f32 / RING_SEGMENTS as f32 * std::f32::consts::TAU;
            target.position + (u * angle.cos() + v * angle.sin()) * radius
        })
        .collect()
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::OrbitCamera;

    fn viewport() -> Viewport {
        Viewport::new(
            &OrbitCamera::home(),
            egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0)),
        )
    }

    fn resting_target() -> GizmoTarget {
        GizmoTarget {
            position: Vec3::new(0.0, 0.51, 0.0),
            rotation: Quat::IDENTITY,
            rest_offset: 0.51,
        }
    }

    fn point_on_axis(viewport: &Viewport, target: &GizmoTarget, axis: GizmoAxis) -> Pos2 {
        let scale = viewport.world_size_for_pixels(target.position, GIZMO_PIXELS);
        viewport
            .project(target.position + target.axis_world(axis) * scale * 0.7)
            .unwrap()
    }

    #[test]
    fn clamp_never_goes_below_rest_offset() {
        let clamped = clamp_to_rest(Vec3::new(1.0, -3.0, 2.0), 0.51);
        assert_eq!(clamped, Vec3::new(1.0, 0.51, 2.0));
        let untouched = clamp_to_rest(Vec3::new(1.0, 2.0, 2.0), 0.51);
        assert_eq!(untouched.y, 2.0);
    }

    #[test]
    fn hit_test_finds_vertical_axis() {
        let viewport = viewport();
        let target = resting_target();
        let gizmo = TransformGizmo::default();
        let mouse = point_on_axis(&viewport, &target, GizmoAxis::Y);
        assert_eq!(
            gizmo.hit_test(&viewport, &target, ControlMode::Translate, mouse),
            Some(GizmoAxis::Y)
        );
        assert_eq!(
            gizmo.hit_test(&viewport, &target, ControlMode::Translate, egui::pos2(5.0, 5.0)),
            None
        );
    }

    #[test]
    fn dragging_down_through_ground_reports_rest_offset() {
        let viewport = viewport();
        let target = resting_target();
        let mut gizmo = TransformGizmo::default();
        let start = point_on_axis(&viewport, &target, GizmoAxis::Y);
        gizmo.begin(
            &viewport,
            ObjectId::new("car"),
            target,
            ControlMode::Translate,
            GizmoAxis::Y,
            start,
        );

        let update = gizmo.update(&viewport, start + egui::vec2(0.0, 250.0)).unwrap();
        assert_eq!(update.position[1], 0.51);
        assert_eq!(update.id, ObjectId::new("car"));

        let up = gizmo.update(&viewport, start - egui::vec2(0.0, 100.0)).unwrap();
        assert!(up.position[1] > 0.51);
    }

    #[test]
    fn translate_follows_local_frame() {
        let viewport = viewport();
        let target = GizmoTarget {
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            ..resting_target()
        };
        let mut gizmo = TransformGizmo::default();
        let start = point_on_axis(&viewport, &target, GizmoAxis::X);
        gizmo.begin(
            &viewport,
            ObjectId::new("car"),
            target,
            ControlMode::Translate,
            GizmoAxis::X,
            start,
        );
        let end = point_on_axis(&viewport, &target, GizmoAxis::X);
        let further = end + (end - viewport.project(target.position).unwrap());
        let update = gizmo.update(&viewport, further).unwrap();
        // Local +X points between world +X and -Z after an eighth turn about Y.
        assert!(update.position[0] > 0.0);
        assert!((update.position[0] + update.position[2]).abs() < 1e-3);
        assert!((update.rotation[1] - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    }

    #[test]
    fn rotate_drag_turns_about_local_axis_and_keeps_position() {
        let viewport = viewport();
        let target = resting_target();
        let mut gizmo = TransformGizmo::default();
        let center = viewport.project(target.position).unwrap();
        let start = center + egui::vec2(60.0, 0.0);
        gizmo.begin(
            &viewport,
            ObjectId::new("car"),
            target,
            ControlMode::Rotate,
            GizmoAxis::Y,
            start,
        );
        let update = gizmo.update(&viewport, center + egui::vec2(40.0, 40.0)).unwrap();
        assert_eq!(update.position, [0.0, 0.51, 0.0]);
        assert!(update.rotation[1].abs() > 0.1);
        assert!(update.rotation[0].abs() < 1e-4);
        assert!(update.rotation[2].abs() < 1e-4);
    }

    #[test]
    fn euler_round_trip() {
        let rotation = [0.2, -0.4, 1.1];
        let back = euler_from_quat(quat_from_euler(rotation));
        for (a, b) in rotation.iter().zip(back) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
