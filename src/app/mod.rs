mod controller;
mod input;

use crate::assets::thumbnails::ThumbnailCache;
use crate::backend::{BackendClient, BackendDispatcher};
use crate::config::EditorConfig;
use crate::render::{SceneEvent, SceneRenderer};
use crate::scene::SearchResult;
use crate::ui::{PanelView, UiAction, UiState};
use controller::{EditorController, Notice, NoticeLevel};
use input::InputAction;

use egui::{Align2, Color32, FontId};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::time::{Duration, Instant};

const APP_TITLE: &str = "Recon Scene Editor";
const BUSY_REPAINT_INTERVAL: Duration = Duration::from_millis(50);

pub struct EditorApp {
    controller: EditorController<BackendDispatcher>,
    renderer: SceneRenderer,
    ui: UiState,
    thumbnails: ThumbnailCache,
}

impl EditorApp {
    pub fn new(config: &EditorConfig) -> Self {
        let client = BackendClient::new(config);
        Self {
            controller: EditorController::new(
                BackendDispatcher::new(client.clone()),
                config.recenter_delay,
            ),
            renderer: SceneRenderer::new(client.clone()),
            ui: UiState::new(),
            thumbnails: ThumbnailCache::new(client),
        }
    }

    fn handle_ui_action(&mut self, action: UiAction) {
        match action {
            UiAction::Search(query) => self.controller.search(&query),
            UiAction::Save => self.controller.save(),
            UiAction::Load => {
                self.controller.load(confirm_replace_scene);
            }
            UiAction::ResetCamera => self.controller.reset_camera(),
            UiAction::SetMode(mode) => self.controller.set_control_mode(mode),
            UiAction::DeleteSelected => self.controller.delete_selected(),
        }
    }

    fn handle_input_action(&mut self, action: InputAction) {
        match action {
            InputAction::DeleteSelected => self.controller.delete_selected(),
            InputAction::SetMode(mode) => self.controller.set_control_mode(mode),
            InputAction::RecenterCamera => self.controller.reset_camera(),
        }
    }

    fn handle_scene_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::Select(id) => self.controller.select(id),
            SceneEvent::Transform {
                id,
                position,
                rotation,
            } => self.controller.update_object_transform(&id, position, rotation),
        }
    }

    /// Mirrors egui's drag-and-drop payload into the controller.
    fn track_drag(&mut self, ctx: &egui::Context) {
        let payload = egui::DragAndDrop::payload::<SearchResult>(ctx);
        match (payload, self.controller.dragging().is_some()) {
            (Some(result), false) => self.controller.begin_drag(&result),
            (None, true) => self.controller.cancel_drag(),
            _ => {}
        }
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        let actions = egui::SidePanel::left("library")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                let scene = self.controller.scene();
                let view = PanelView {
                    project_name: scene.project_name(),
                    object_count: scene.len(),
                    results: self.controller.search_results(),
                    searching: self.controller.is_searching(),
                    selected: scene.selected_object(),
                    mode: self.controller.control_mode(),
                };
                self.ui.side_panel(ui, &view, &mut self.thumbnails)
            })
            .inner;
        for action in actions {
            self.handle_ui_action(action);
        }
    }

    fn viewport(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::default())
            .show(ctx, |ui| {
                self.renderer.sync(self.controller.scene().objects());
                let selected = self.controller.scene().selected().cloned();
                let (response, events) =
                    self.renderer
                        .show(ui, selected.as_ref(), self.controller.control_mode());

                if let Some(result) = response.dnd_release_payload::<SearchResult>() {
                    log::info!("Dropped '{}' into the scene", result.name);
                    self.controller.complete_drop(&result.uid, &result.name);
                }
                for event in events {
                    self.handle_scene_event(event);
                }

                if self.controller.is_loading_model() {
                    ui.painter().text(
                        response.rect.center_top() + egui::vec2(0.0, 16.0),
                        Align2::CENTER_TOP,
                        "Downloading model…",
                        FontId::proportional(16.0),
                        Color32::WHITE,
                    );
                }
            });
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.controller.poll_replies(now);
        self.controller.tick(now);
        for command in self.controller.drain_commands() {
            self.renderer.apply_command(command);
        }
        self.renderer.poll_assets();
        self.thumbnails.poll(ctx);

        for notice in self.controller.take_notices() {
            show_notice(&notice);
        }

        self.track_drag(ctx);
        for action in input::collect_actions(ctx) {
            self.handle_input_action(action);
        }

        self.side_panel(ctx);
        self.viewport(ctx);

        if self.controller.is_busy()
            || self.renderer.is_loading_assets()
            || self.thumbnails.is_loading()
        {
            ctx.request_repaint_after(BUSY_REPAINT_INTERVAL);
        }
    }
}

fn show_notice(notice: &Notice) {
    let level = match notice.level {
        NoticeLevel::Info => MessageLevel::Info,
        NoticeLevel::Error => MessageLevel::Error,
    };
    MessageDialog::new()
        .set_level(level)
        .set_title(APP_TITLE)
        .set_description(notice.message.as_str())
        .set_buttons(MessageButtons::Ok)
        .show();
}

fn confirm_replace_scene() -> bool {
    let answer = MessageDialog::new()
        .set_level(MessageLevel::Warning)
        .set_title(APP_TITLE)
        .set_description("Opening the saved scene replaces the current one. Continue?")
        .set_buttons(MessageButtons::YesNo)
        .show();
    matches!(answer, MessageDialogResult::Yes)
}

pub fn run(config: EditorConfig) -> Result<(), eframe::Error> {
    log::info!("Starting editor against {}", config.backend_url);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    let result = eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(EditorApp::new(&config)))),
    );

    log::info!("Editor closed");
    result
}
