use crate::backend::{BackendReply, BackendRequest, RequestSink, Ticket};
use crate::render::RenderCommand;
use crate::scene::serialization::{is_ok_status, SaveSceneRequest};
use crate::scene::{ControlMode, ObjectId, SceneState, SearchResult};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

const LOADED_PROJECT_FALLBACK_NAME: &str = "Project";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Something the user must be told about. The shell shows these as dialogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Owns the editor state and folds backend replies into it.
///
/// Search and load only honour the reply of the latest request of their kind;
/// downloads are independent and each one that succeeds adds an object.
pub struct EditorController<S: RequestSink> {
    scene: SceneState,
    search_results: Vec<SearchResult>,
    dragging: Option<SearchResult>,
    latest_search: Option<Ticket>,
    latest_load: Option<Ticket>,
    pending_downloads: HashSet<Ticket>,
    pending_saves: HashSet<Ticket>,
    next_ticket: Ticket,
    commands: VecDeque<RenderCommand>,
    recenter_seq: u64,
    recenter_due: Option<Instant>,
    recenter_delay: Duration,
    notices: VecDeque<Notice>,
    sink: S,
}

impl<S: RequestSink> EditorController<S> {
    pub fn new(sink: S, recenter_delay: Duration) -> Self {
        Self {
            scene: SceneState::new(),
            search_results: Vec::new(),
            dragging: None,
            latest_search: None,
            latest_load: None,
            pending_downloads: HashSet::new(),
            pending_saves: HashSet::new(),
            next_ticket: 1,
            commands: VecDeque::new(),
            recenter_seq: 0,
            recenter_due: None,
            recenter_delay,
            notices: VecDeque::new(),
            sink,
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    pub fn dragging(&self) -> Option<&SearchResult> {
        self.dragging.as_ref()
    }

    pub fn is_searching(&self) -> bool {
        self.latest_search.is_some()
    }

    pub fn is_loading_model(&self) -> bool {
        !self.pending_downloads.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.is_searching()
            || self.is_loading_model()
            || self.latest_load.is_some()
            || !self.pending_saves.is_empty()
            || self.recenter_due.is_some()
    }

    fn issue(&mut self, request: BackendRequest) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.sink.submit(ticket, request);
        ticket
    }

    pub fn search(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        let ticket = self.issue(BackendRequest::Search {
            query: query.to_string(),
        });
        self.latest_search = Some(ticket);
    }

    pub fn begin_drag(&mut self, result: &SearchResult) {
        log::debug!("Dragging '{}' ({})", result.name, result.uid);
        self.dragging = Some(result.clone());
    }

    pub fn cancel_drag(&mut self) {
        self.dragging = None;
    }

    pub fn complete_drop(&mut self, uid: &str, name: &str) {
        self.dragging = None;
        if uid.is_empty() {
            return;
        }
        let ticket = self.issue(BackendRequest::Download {
            uid: uid.to_string(),
            name: name.to_string(),
        });
        self.pending_downloads.insert(ticket);
    }

    pub fn select(&mut self, id: Option<ObjectId>) {
        if !self.scene.select(id) {
            log::debug!("Ignoring selection of an object that no longer exists");
        }
    }

    pub fn update_object_transform(&mut self, id: &ObjectId, position: [f32; 3], rotation: [f32; 3]) {
        if !self.scene.update_transform(id, position, rotation) {
            log::debug!("Transform update for unknown object {}", id);
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(removed) = self.scene.delete_selected() {
            log::info!("Removed '{}' ({})", removed.name, removed.id);
        }
    }

    pub fn save(&mut self) {
        let request = SaveSceneRequest::from_objects(self.scene.objects());
        let ticket = self.issue(BackendRequest::Save(request));
        self.pending_saves.insert(ticket);
    }

    /// Replaces the scene with the backend's saved one. `confirm` is only
    /// asked when the current scene has objects; returns whether a request
    /// was issued.
    pub fn load<F>(&mut self, confirm: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        if !self.scene.is_empty() && !confirm() {
            log::info!("Load cancelled");
            return false;
        }
        let ticket = self.issue(BackendRequest::Load);
        self.latest_load = Some(ticket);
        true
    }

    pub fn reset_camera(&mut self) {
        self.recenter_seq += 1;
        self.commands.push_back(RenderCommand::RecenterCamera {
            seq: self.recenter_seq,
        });
    }

    pub fn control_mode(&self) -> ControlMode {
        self.scene.control_mode()
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.scene.set_control_mode(mode);
    }

    /// Fires the delayed recenter scheduled by a finished load.
    pub fn tick(&mut self, now: Instant) {
        if self.recenter_due.is_some_and(|due| now >= due) {
            self.recenter_due = None;
            self.reset_camera();
        }
    }

    pub fn poll_replies(&mut self, now: Instant) {
        for (ticket, reply) in self.sink.poll() {
            self.handle_reply(ticket, reply, now);
        }
    }

    pub fn handle_reply(&mut self, ticket: Ticket, reply: BackendReply, now: Instant) {
        match reply {
            BackendReply::Search(result) => {
                if self.latest_search != Some(ticket) {
                    log::debug!("Dropping stale search reply {}", ticket);
                    return;
                }
                self.latest_search = None;
                match result {
                    Ok(results) => {
                        log::info!("Search returned {} results", results.len());
                        self.search_results = results;
                    }
                    Err(err) => {
                        log::warn!("Search failed: {}", err);
                        self.notices.push_back(Notice::error("Search failed."));
                    }
                }
            }
            BackendReply::Download { uid, name, result } => {
                self.pending_downloads.remove(&ticket);
                match result {
                    Ok(download) => {
                        let id = self.scene.add_object(uid, download.url, name);
                        log::info!("Placed {} at its resting pose", id);
                    }
                    Err(err) => {
                        log::warn!("Download of {} failed: {}", uid, err);
                        self.notices
                            .push_back(Notice::error(format!("Could not download '{name}'.")));
                    }
                }
            }
            BackendReply::Save(result) => {
                self.pending_saves.remove(&ticket);
                match result {
                    Ok(response) if is_ok_status(&response.status) => {
                        if let Some(filename) = response.filename {
                            self.scene.set_project_name(filename);
                        }
                        let message = response
                            .message
                            .unwrap_or_else(|| "Scene saved.".to_string());
                        log::info!("Save succeeded: {}", message);
                        self.notices.push_back(Notice::info(message));
                    }
                    Ok(response) => {
                        log::warn!("Save rejected with status '{}'", response.status);
                        let message = response
                            .message
                            .unwrap_or_else(|| format!("Save rejected ({}).", response.status));
                        self.notices.push_back(Notice::error(message));
                    }
                    Err(err) => {
                        log::warn!("Save failed: {}", err);
                        self.notices.push_back(Notice::error("Save failed!"));
                    }
                }
            }
            BackendReply::Load(result) => {
                if self.latest_load != Some(ticket) {
                    log::debug!("Dropping stale load reply {}", ticket);
                    return;
                }
                self.latest_load = None;
                match result.map(|response| response.into_models()) {
                    Ok(Some((models, filename))) => {
                        log::info!("Loaded {} objects", models.len());
                        self.scene.replace_objects(models);
                        self.scene.set_project_name(
                            filename.unwrap_or_else(|| LOADED_PROJECT_FALLBACK_NAME.to_string()),
                        );
                        self.recenter_due = Some(now + self.recenter_delay);
                    }
                    Ok(None) => {
                        log::warn!("Load response carried no scene");
                    }
                    Err(err) => {
                        log::warn!("Load failed: {}", err);
                        self.notices.push_back(Notice::error("Load failed!"));
                    }
                }
            }
        }
    }

    pub fn drain_commands(&mut self) -> impl Iterator<Item = RenderCommand> + '_ {
        self.commands.drain(..)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    #[cfg(test)]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::scene::serialization::{DownloadResponse, LoadSceneResponse, SaveSceneResponse};
    use crate::scene::SceneObject;

    #[derive(Default)]
    struct RecordingSink {
        submitted: Vec<(Ticket, BackendRequest)>,
    }

    impl RequestSink for RecordingSink {
        fn submit(&mut self, ticket: Ticket, request: BackendRequest) {
            self.submitted.push((ticket, request));
        }

        fn poll(&mut self) -> Vec<(Ticket, BackendReply)> {
            Vec::new()
        }
    }

    fn controller() -> EditorController<RecordingSink> {
        EditorController::new(RecordingSink::default(), Duration::from_millis(100))
    }

    fn last_ticket(controller: &mut EditorController<RecordingSink>) -> Ticket {
        controller.sink_mut().submitted.last().map(|(t, _)| *t).unwrap()
    }

    fn transport_error() -> BackendError {
        BackendError::Transport {
            url: "http://127.0.0.1:8001/api".to_string(),
            message: "connection refused".to_string(),
        }
    }

    fn result(uid: &str) -> SearchResult {
        SearchResult {
            uid: uid.to_string(),
            name: format!("Model {uid}"),
            image: String::new(),
            author: "someone".to_string(),
        }
    }

    fn drop_and_resolve(controller: &mut EditorController<RecordingSink>, uid: &str) -> ObjectId {
        controller.complete_drop(uid, "Hatchback");
        let ticket = last_ticket(controller);
        controller.handle_reply(
            ticket,
            BackendReply::Download {
                uid: uid.to_string(),
                name: "Hatchback".to_string(),
                result: Ok(DownloadResponse {
                    url: format!("http://127.0.0.1:8001/models/{uid}/scene.gltf"),
                }),
            },
            Instant::now(),
        );
        controller.scene().selected().cloned().unwrap()
    }

    fn loaded_object(id: &str) -> SceneObject {
        SceneObject {
            id: ObjectId::new(id),
            uid: "u".to_string(),
            url: "http://m/scene.gltf".to_string(),
            name: "Van".to_string(),
            position: Some([2.0, 0.4, 1.0]),
            rotation: Some([0.0, 0.3, 0.0]),
        }
    }

    #[test]
    fn empty_search_is_a_noop() {
        let mut controller = controller();
        controller.search("");
        controller.search("   ");
        assert!(controller.sink_mut().submitted.is_empty());
        assert!(!controller.is_searching());
    }

    #[test]
    fn search_replaces_results_and_failure_keeps_them() {
        let mut controller = controller();
        controller.search("golf");
        assert!(controller.is_searching());
        let ticket = last_ticket(&mut controller);
        controller.handle_reply(
            ticket,
            BackendReply::Search(Ok(vec![result("a"), result("b")])),
            Instant::now(),
        );
        assert!(!controller.is_searching());
        assert_eq!(controller.search_results().len(), 2);

        controller.search("polo");
        let ticket = last_ticket(&mut controller);
        controller.handle_reply(ticket, BackendReply::Search(Err(transport_error())), Instant::now());
        assert_eq!(controller.search_results().len(), 2);
        let notices = controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(!controller.is_searching());
    }

    #[test]
    fn stale_search_reply_is_dropped() {
        let mut controller = controller();
        controller.search("first");
        let first = last_ticket(&mut controller);
        controller.search("second");
        let second = last_ticket(&mut controller);

        controller.handle_reply(second, BackendReply::Search(Ok(vec![result("new")])), Instant::now());
        controller.handle_reply(first, BackendReply::Search(Ok(vec![result("old")])), Instant::now());
        assert_eq!(controller.search_results()[0].uid, "new");
    }

    #[test]
    fn successful_drop_adds_and_selects_in_resting_pose() {
        let mut controller = controller();
        controller.begin_drag(&result("abc"));
        assert!(controller.dragging().is_some());
        controller.complete_drop("abc", "Hatchback");
        assert!(controller.dragging().is_none());
        assert!(controller.is_loading_model());

        let ticket = last_ticket(&mut controller);
        controller.handle_reply(
            ticket,
            BackendReply::Download {
                uid: "abc".to_string(),
                name: "Hatchback".to_string(),
                result: Ok(DownloadResponse {
                    url: "http://127.0.0.1:8001/models/abc/scene.gltf".to_string(),
                }),
            },
            Instant::now(),
        );

        assert!(!controller.is_loading_model());
        let placed = controller.scene().selected_object().unwrap();
        assert_eq!(placed.uid, "abc");
        assert_eq!(placed.url, "http://127.0.0.1:8001/models/abc/scene.gltf");
        assert_eq!(placed.position, None);
    }

    #[test]
    fn failed_drop_mutates_nothing_and_clears_indicator() {
        let mut controller = controller();
        controller.complete_drop("abc", "Hatchback");
        let ticket = last_ticket(&mut controller);
        controller.handle_reply(
            ticket,
            BackendReply::Download {
                uid: "abc".to_string(),
                name: "Hatchback".to_string(),
                result: Err(BackendError::Status {
                    url: "http://127.0.0.1:8001/api/download/abc".to_string(),
                    status: 400,
                }),
            },
            Instant::now(),
        );
        assert!(!controller.is_loading_model());
        assert!(controller.scene().is_empty());
        assert!(controller.scene().selected().is_none());
        assert_eq!(controller.take_notices().len(), 1);
    }

    #[test]
    fn drop_without_uid_is_ignored() {
        let mut controller = controller();
        controller.complete_drop("", "Nothing");
        assert!(controller.sink_mut().submitted.is_empty());
        assert!(!controller.is_loading_model());
    }

    #[test]
    fn delete_selected_clears_selection() {
        let mut controller = controller();
        drop_and_resolve(&mut controller, "a");
        drop_and_resolve(&mut controller, "b");
        controller.delete_selected();
        assert!(controller.scene().selected().is_none());
        assert_eq!(controller.scene().len(), 1);
        controller.delete_selected();
        assert_eq!(controller.scene().len(), 1);
    }

    #[test]
    fn save_sends_zero_pose_and_adopts_filename() {
        let mut controller = controller();
        let id = drop_and_resolve(&mut controller, "a");
        drop_and_resolve(&mut controller, "b");
        controller.update_object_transform(&id, [1.0, 0.6, 0.0], [0.0, 0.2, 0.0]);
        controller.save();

        let (ticket, request) = controller.sink_mut().submitted.last().cloned().unwrap();
        let BackendRequest::Save(body) = request else {
            panic!("expected a save request");
        };
        assert_eq!(body.models.len(), 2);
        assert_eq!(body.models[0].position, [1.0, 0.6, 0.0]);
        assert_eq!(body.models[1].position, [0.0; 3]);
        assert_eq!(body.models[1].rotation, [0.0; 3]);

        controller.handle_reply(
            ticket,
            BackendReply::Save(Ok(SaveSceneResponse {
                status: "ok".to_string(),
                message: Some("Saved".to_string()),
                filename: Some("junction.json".to_string()),
            })),
            Instant::now(),
        );
        assert_eq!(controller.scene().project_name(), "junction.json");
        let notices = controller.take_notices();
        assert_eq!(notices, vec![Notice::info("Saved")]);
    }

    #[test]
    fn load_over_non_empty_scene_requires_confirmation() {
        let mut controller = controller();
        assert!(controller.load(|| panic!("empty scene must not ask")));

        drop_and_resolve(&mut controller, "a");
        let before = controller.sink_mut().submitted.len();
        assert!(!controller.load(|| false));
        assert_eq!(controller.sink_mut().submitted.len(), before);
        assert!(controller.load(|| true));
        assert_eq!(controller.sink_mut().submitted.len(), before + 1);
    }

    #[test]
    fn load_replaces_scene_and_recenters_after_delay() {
        let mut controller = controller();
        drop_and_resolve(&mut controller, "a");
        assert!(controller.load(|| true));
        let ticket = last_ticket(&mut controller);

        let start = Instant::now();
        controller.handle_reply(
            ticket,
            BackendReply::Load(Ok(LoadSceneResponse {
                status: Some("ok".to_string()),
                models: Some(vec![loaded_object("1"), loaded_object("2")]),
                filename: None,
            })),
            start,
        );
        assert_eq!(controller.scene().len(), 2);
        assert!(controller.scene().selected().is_none());
        assert_eq!(controller.scene().project_name(), "Project");

        controller.tick(start + Duration::from_millis(50));
        assert_eq!(controller.drain_commands().count(), 0);
        controller.tick(start + Duration::from_millis(100));
        let commands: Vec<_> = controller.drain_commands().collect();
        assert_eq!(commands, vec![RenderCommand::RecenterCamera { seq: 1 }]);
        controller.tick(start + Duration::from_millis(500));
        assert_eq!(controller.drain_commands().count(), 0);
    }

    #[test]
    fn failed_load_keeps_scene() {
        let mut controller = controller();
        let id = drop_and_resolve(&mut controller, "a");
        controller.load(|| true);
        let ticket = last_ticket(&mut controller);
        controller.handle_reply(ticket, BackendReply::Load(Err(transport_error())), Instant::now());
        assert_eq!(controller.scene().len(), 1);
        assert_eq!(controller.scene().selected(), Some(&id));
        assert_eq!(controller.take_notices().len(), 1);
    }

    #[test]
    fn reset_twice_yields_two_distinct_commands() {
        let mut controller = controller();
        controller.reset_camera();
        controller.reset_camera();
        let commands: Vec<_> = controller.drain_commands().collect();
        assert_eq!(
            commands,
            vec![
                RenderCommand::RecenterCamera { seq: 1 },
                RenderCommand::RecenterCamera { seq: 2 },
            ]
        );
        assert_eq!(controller.drain_commands().count(), 0);
    }

    #[test]
    fn control_mode_toggle_has_no_data_side_effects() {
        let mut controller = controller();
        drop_and_resolve(&mut controller, "a");
        let before = controller.scene().objects().to_vec();
        controller.set_control_mode(ControlMode::Rotate);
        assert_eq!(controller.control_mode(), ControlMode::Rotate);
        assert_eq!(controller.scene().objects(), before.as_slice());
    }
}
