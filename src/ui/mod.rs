use crate::assets::thumbnails::ThumbnailCache;
use crate::scene::{ControlMode, SceneObject, SearchResult};
use egui::{Key, RichText, TextEdit};

const THUMBNAIL_SIZE: egui::Vec2 = egui::vec2(56.0, 32.0);

/// What the user asked for through the side panel this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Search(String),
    Save,
    Load,
    ResetCamera,
    SetMode(ControlMode),
    DeleteSelected,
}

/// Read-only snapshot of editor state needed to draw the panel.
pub struct PanelView<'a> {
    pub project_name: &'a str,
    pub object_count: usize,
    pub results: &'a [SearchResult],
    pub searching: bool,
    pub selected: Option<&'a SceneObject>,
    pub mode: ControlMode,
}

#[derive(Default)]
pub struct UiState {
    query: String,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side_panel(
        &mut self,
        ui: &mut egui::Ui,
        view: &PanelView<'_>,
        thumbnails: &mut ThumbnailCache,
    ) -> Vec<UiAction> {
        let mut actions = Vec::new();

        ui.heading(view.project_name);
        ui.label(format!("{} object(s) in scene", view.object_count));
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                actions.push(UiAction::Save);
            }
            if ui.button("Open").clicked() {
                actions.push(UiAction::Load);
            }
            if ui.button("Recenter").on_hover_text("F").clicked() {
                actions.push(UiAction::ResetCamera);
            }
        });
        ui.separator();

        ui.horizontal(|ui| {
            let field = ui.add(
                TextEdit::singleline(&mut self.query)
                    .hint_text("Search vehicles")
                    .desired_width(ui.available_width() - 40.0),
            );
            let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
            if ui.button("OK").clicked() || submitted {
                actions.push(UiAction::Search(self.query.clone()));
            }
        });
        if view.searching {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Searching…");
            });
        }

        if let Some(object) = view.selected {
            ui.separator();
            selection_section(ui, object, view.mode, &mut actions);
        }

        ui.separator();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if view.results.is_empty() && !view.searching {
                    ui.weak("No results");
                }
                for result in view.results {
                    result_row(ui, result, thumbnails);
                }
            });

        actions
    }
}

/// A catalogue entry that can be dragged into the viewport.
fn result_row(ui: &mut egui::Ui, result: &SearchResult, thumbnails: &mut ThumbnailCache) {
    let id = egui::Id::new(("search-result", result.uid.as_str()));
    ui.dnd_drag_source(id, result.clone(), |ui| {
        ui.horizontal(|ui| {
            match thumbnails.get(&result.image) {
                Some(texture) => {
                    ui.image((texture.id(), THUMBNAIL_SIZE));
                }
                None => {
                    ui.allocate_space(THUMBNAIL_SIZE);
                }
            }
            ui.vertical(|ui| {
                ui.label(RichText::new(&result.name).strong());
                if !result.author.is_empty() {
                    ui.weak(&result.author);
                }
            });
        });
    })
    .response
    .on_hover_text("Drag into the viewport to add");
}

fn selection_section(
    ui: &mut egui::Ui,
    object: &SceneObject,
    mode: ControlMode,
    actions: &mut Vec<UiAction>,
) {
    ui.label(RichText::new(&object.name).strong());
    if let Some([x, y, z]) = object.position {
        ui.weak(format!("Position {x:.2}, {y:.2}, {z:.2}"));
    }
    ui.horizontal(|ui| {
        for candidate in [ControlMode::Translate, ControlMode::Rotate] {
            if ui
                .selectable_label(mode == candidate, candidate.label())
                .clicked()
                && mode != candidate
            {
                actions.push(UiAction::SetMode(candidate));
            }
        }
    });
    if ui.button("Delete").on_hover_text("Delete").clicked() {
        actions.push(UiAction::DeleteSelected);
    }
}
