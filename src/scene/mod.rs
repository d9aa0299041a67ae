pub mod serialization;

use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_PROJECT_NAME: &str = "Untitled";

/// Locally generated identifier of a placed object. Unique within a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalogue search hit. Also used as the drag-and-drop payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub author: String,
}

/// A model placed in the scene.
///
/// `position` and `rotation` stay `None` until the object is first
/// manipulated; the renderer then uses the resting pose of the asset.
/// Rotation is Euler XYZ in radians.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub uid: String,
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    #[default]
    Translate,
    Rotate,
}

impl ControlMode {
    pub fn label(self) -> &'static str {
        match self {
            ControlMode::Translate => "Move",
            ControlMode::Rotate => "Rotate",
        }
    }
}

pub struct SceneState {
    objects: Vec<SceneObject>,
    selected: Option<ObjectId>,
    control_mode: ControlMode,
    project_name: String,
    next_id: u64,
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneState {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            selected: None,
            control_mode: ControlMode::default(),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            next_id: 1,
        }
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: &ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|object| &object.id == id)
    }

    pub fn selected(&self) -> Option<&ObjectId> {
        self.selected.as_ref()
    }

    pub fn selected_object(&self) -> Option<&SceneObject> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.control_mode = mode;
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.project_name = name.into();
    }

    /// Next free `obj-<n>` id. Ids already used by loaded objects are skipped.
    pub fn allocate_id(&mut self) -> ObjectId {
        loop {
            let candidate = ObjectId::new(format!("obj-{}", self.next_id));
            self.next_id += 1;
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Appends a freshly dropped object in its resting pose and selects it.
    pub fn add_object(&mut self, uid: String, url: String, name: String) -> ObjectId {
        let id = self.allocate_id();
        self.objects.push(SceneObject {
            id: id.clone(),
            uid,
            url,
            name,
            position: None,
            rotation: None,
        });
        self.selected = Some(id.clone());
        id
    }

    /// Returns false when `id` names no object; the selection is then untouched.
    pub fn select(&mut self, id: Option<ObjectId>) -> bool {
        match id {
            Some(id) if self.get(&id).is_none() => false,
            other => {
                self.selected = other;
                true
            }
        }
    }

    pub fn update_transform(&mut self, id: &ObjectId, position: [f32; 3], rotation: [f32; 3]) -> bool {
        match self.objects.iter_mut().find(|object| &object.id == id) {
            Some(object) => {
                object.position = Some(position);
                object.rotation = Some(rotation);
                true
            }
            None => false,
        }
    }

    pub fn delete_selected(&mut self) -> Option<SceneObject> {
        let id = self.selected.take()?;
        let index = self.objects.iter().position(|object| object.id == id)?;
        Some(self.objects.remove(index))
    }

    /// Swaps in a loaded collection. Duplicate ids are re-keyed so every id
    /// stays unique, and the selection is cleared.
    pub fn replace_objects(&mut self, objects: Vec<SceneObject>) {
        self.selected = None;
        self.objects = Vec::with_capacity(objects.len());

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for object in objects {
            if seen.insert(object.id.clone()) {
                self.objects.push(object);
            } else {
                duplicates.push(object);
            }
        }
        for mut object in duplicates {
            let fresh = self.allocate_id();
            log::warn!("Duplicate object id '{}' re-keyed to '{}'", object.id, fresh);
            object.id = fresh;
            self.objects.push(object);
        }
    }
}
