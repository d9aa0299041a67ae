mod camera;
mod gizmo;
pub mod pick;

use camera::{OrbitCamera, Viewport};

use crate::assets::{resting_offset, Aabb, AssetGeometry, AssetLibrary, AssetSlot, BOX_EDGES};
use crate::backend::BackendClient;
use crate::scene::{ControlMode, ObjectId, SceneObject};
use egui::{Align2, Color32, FontId, Sense, Stroke};
use gizmo::{quat_from_euler, GizmoTarget, TransformGizmo};
use glam::{Mat4, Vec2, Vec3};
use pick::{PickHit, Pickable};
use std::sync::Arc;

const GRID_HALF_CELLS: i32 = 20;
const GRID_SECTION: i32 = 5;

const COLOR_SKY: Color32 = Color32::from_rgb(28, 30, 38);
const COLOR_GRID: Color32 = Color32::from_rgb(52, 56, 66);
const COLOR_GRID_SECTION: Color32 = Color32::from_rgb(80, 86, 100);
const COLOR_PROXY: Color32 = Color32::from_rgb(200, 205, 215);
const COLOR_SELECTED: Color32 = Color32::from_rgb(255, 174, 61);
const COLOR_PENDING: Color32 = Color32::from_rgb(130, 135, 150);
const COLOR_FAILED: Color32 = Color32::from_rgb(220, 80, 80);

/// Stand-in bounds for models whose geometry has not arrived yet.
const PLACEHOLDER_BOUNDS: Aabb = Aabb {
    min: Vec3::new(-0.5, -0.5, -0.5),
    max: Vec3::new(0.5, 0.5, 0.5),
};

/// One-shot requests from the controller to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    /// Carries a monotonically increasing sequence number; each value is
    /// honoured once.
    RecenterCamera { seq: u64 },
}

/// Interactions the viewport reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Select(Option<ObjectId>),
    Transform {
        id: ObjectId,
        position: [f32; 3],
        rotation: [f32; 3],
    },
}

/// Drawable stand-in for a scene object. Geometry is shared between every
/// proxy that points at the same URL.
#[derive(Debug, Clone)]
pub struct VisualProxy {
    pub id: ObjectId,
    pub name: String,
    pub geometry: Option<Arc<AssetGeometry>>,
    pub failed: bool,
    position: Option<Vec3>,
    rotation: Option<Vec3>,
}

impl VisualProxy {
    pub fn bounds(&self) -> Aabb {
        self.geometry
            .as_ref()
            .map(|geometry| geometry.bounds)
            .unwrap_or(PLACEHOLDER_BOUNDS)
    }

    pub fn rest_offset(&self) -> f32 {
        resting_offset(&self.bounds())
    }

    /// Position used for drawing; objects that were never moved rest on the
    /// ground at the origin.
    pub fn position(&self) -> Vec3 {
        self.position
            .unwrap_or_else(|| Vec3::new(0.0, self.rest_offset(), 0.0))
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation.unwrap_or(Vec3::ZERO)
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(
            quat_from_euler(self.rotation().to_array()),
            self.position(),
        )
    }

    fn gizmo_target(&self) -> GizmoTarget {
        GizmoTarget {
            position: self.position(),
            rotation: quat_from_euler(self.rotation().to_array()),
            rest_offset: self.rest_offset(),
        }
    }
}

/// Owns the camera, the asset cache and one proxy per scene object, and draws
/// the viewport with the egui painter.
pub struct SceneRenderer {
    camera: OrbitCamera,
    assets: AssetLibrary,
    proxies: Vec<VisualProxy>,
    gizmo: TransformGizmo,
    last_recenter_seq: u64,
}

impl SceneRenderer {
    pub fn new(client: BackendClient) -> Self {
        Self {
            camera: OrbitCamera::home(),
            assets: AssetLibrary::new(client),
            proxies: Vec::new(),
            gizmo: TransformGizmo::default(),
            last_recenter_seq: 0,
        }
    }

    pub fn apply_command(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::RecenterCamera { seq } => {
                if seq <= self.last_recenter_seq {
                    log::debug!("Ignoring stale recenter request {}", seq);
                    return;
                }
                self.last_recenter_seq = seq;
                self.camera.recenter();
                log::info!("Camera recentered");
            }
        }
    }

    /// Rebuilds proxies so there is exactly one per object, requesting any
    /// geometry not yet cached.
    pub fn sync(&mut self, objects: &[SceneObject]) {
        self.proxies = objects
            .iter()
            .map(|object| {
                if self.assets.slot(&object.url).is_none() {
                    self.assets.request(&object.url);
                }
                VisualProxy {
                    id: object.id.clone(),
                    name: object.name.clone(),
                    geometry: self.assets.geometry(&object.url),
                    failed: matches!(self.assets.slot(&object.url), Some(AssetSlot::Failed)),
                    position: object.position.map(Vec3::from_array),
                    rotation: object.rotation.map(Vec3::from_array),
                }
            })
            .collect();
        if let Some(id) = self.gizmo.dragged_object() {
            if !self.proxies.iter().any(|proxy| &proxy.id == id) {
                self.gizmo.end();
            }
        }
    }

    pub fn poll_assets(&mut self) -> bool {
        self.assets.poll()
    }

    pub fn is_loading_assets(&self) -> bool {
        self.assets.is_loading()
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        selected: Option<&ObjectId>,
        mode: ControlMode,
    ) -> (egui::Response, Vec<SceneEvent>) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let mut events = Vec::new();

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            self.camera.zoom(scroll);
        }

        let viewport = Viewport::new(&self.camera, response.rect);
        let selected_proxy = selected.and_then(|id| self.proxies.iter().find(|p| &p.id == id));
        let target = selected_proxy.map(|proxy| (proxy.id.clone(), proxy.gizmo_target()));

        let hovered_axis = match (&target, response.hover_pos()) {
            (Some((_, target)), Some(pos)) if !self.gizmo.is_dragging() => {
                self.gizmo.hit_test(&viewport, target, mode, pos)
            }
            _ => None,
        };

        if response.drag_started() {
            let press = ui.input(|i| i.pointer.press_origin());
            if let (Some((id, target)), Some(press)) = (&target, press) {
                if let Some(axis) = self.gizmo.hit_test(&viewport, target, mode, press) {
                    self.gizmo
                        .begin(&viewport, id.clone(), *target, mode, axis, press);
                }
            }
        }

        if response.dragged() {
            if self.gizmo.is_dragging() {
                if let Some(update) = response
                    .interact_pointer_pos()
                    .and_then(|pos| self.gizmo.update(&viewport, pos))
                {
                    events.push(SceneEvent::Transform {
                        id: update.id,
                        position: update.position,
                        rotation: update.rotation,
                    });
                }
            } else {
                let delta = response.drag_delta();
                self.camera.orbit(Vec2::new(delta.x, delta.y));
            }
        }

        if response.drag_stopped() {
            self.gizmo.end();
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                match self.pick(&viewport, pos) {
                    PickHit::Object { id, .. } => events.push(SceneEvent::Select(Some(id))),
                    PickHit::Ground { .. } => events.push(SceneEvent::Select(None)),
                    PickHit::None => {}
                }
            }
        }

        painter.rect_filled(response.rect, 0.0, COLOR_SKY);
        draw_grid(&painter, &viewport);
        for proxy in &self.proxies {
            draw_proxy(&painter, &viewport, proxy, selected == Some(&proxy.id));
        }
        if let Some((_, target)) = &target {
            self.gizmo
                .draw(&painter, &viewport, target, mode, hovered_axis);
        }

        (response, events)
    }

    fn pick(&self, viewport: &Viewport, screen: egui::Pos2) -> PickHit {
        let ray = viewport.ray(screen);
        pick::pick(
            &ray,
            self.proxies.iter().map(|proxy| Pickable {
                id: &proxy.id,
                bounds: proxy.bounds(),
                world: proxy.world_matrix(),
            }),
        )
    }
}

fn draw_grid(painter: &egui::Painter, viewport: &Viewport) {
    let extent = GRID_HALF_CELLS as f32;
    for i in -GRID_HALF_CELLS..=GRID_HALF_CELLS {
        let offset = i as f32;
        let stroke = if i == 0 {
            Stroke::new(1.5, COLOR_GRID_SECTION)
        } else if i % GRID_SECTION == 0 {
            Stroke::new(1.0, COLOR_GRID_SECTION)
        } else {
            Stroke::new(1.0, COLOR_GRID)
        };
        let lines = [
            (Vec3::new(offset, 0.0, -extent), Vec3::new(offset, 0.0, extent)),
            (Vec3::new(-extent, 0.0, offset), Vec3::new(extent, 0.0, offset)),
        ];
        for (a, b) in lines {
            if let Some(segment) = viewport.project_segment(a, b) {
                painter.line_segment(segment, stroke);
            }
        }
    }
}

fn draw_proxy(painter: &egui::Painter, viewport: &Viewport, proxy: &VisualProxy, selected: bool) {
    let color = if selected {
        COLOR_SELECTED
    } else if proxy.failed {
        COLOR_FAILED
    } else if proxy.geometry.is_none() {
        COLOR_PENDING
    } else {
        COLOR_PROXY
    };
    let width = if selected { 2.5 } else { 1.2 };
    let world = proxy.world_matrix();
    let bounds = proxy.bounds();
    let corners = bounds.corners().map(|corner| world.transform_point3(corner));
    for (a, b) in BOX_EDGES {
        if let Some(segment) = viewport.project_segment(corners[a], corners[b]) {
            painter.line_segment(segment, Stroke::new(width, color));
        }
    }

    let top = world.transform_point3(Vec3::new(
        bounds.center().x,
        bounds.max.y,
        bounds.center().z,
    ));
    if let Some(anchor) = viewport.project(top) {
        let label = if proxy.failed {
            format!("{} (unavailable)", proxy.name)
        } else if proxy.geometry.is_none() {
            format!("{} (loading)", proxy.name)
        } else {
            proxy.name.clone()
        };
        painter.text(
            anchor - egui::vec2(0.0, 4.0),
            Align2::CENTER_BOTTOM,
            label,
            FontId::proportional(12.0),
            color,
        );
    }
}
