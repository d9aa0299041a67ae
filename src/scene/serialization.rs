//! Wire formats exchanged with the scene backend.

use crate::scene::{ObjectId, SceneObject};

const ZERO_POSE: [f32; 3] = [0.0, 0.0, 0.0];

/// One entry of a save request. Unlike [`SceneObject`] the pose is mandatory.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SavedObject {
    pub id: ObjectId,
    pub uid: String,
    pub url: String,
    pub name: String,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SaveSceneRequest {
    pub models: Vec<SavedObject>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SaveSceneResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct LoadSceneResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<SceneObject>>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct DownloadResponse {
    pub url: String,
}

impl SaveSceneRequest {
    /// Objects still in their resting pose are written with a zero pose.
    pub fn from_objects(objects: &[SceneObject]) -> Self {
        Self {
            models: objects
                .iter()
                .map(|object| SavedObject {
                    id: object.id.clone(),
                    uid: object.uid.clone(),
                    url: object.url.clone(),
                    name: object.name.clone(),
                    position: object.position.unwrap_or(ZERO_POSE),
                    rotation: object.rotation.unwrap_or(ZERO_POSE),
                })
                .collect(),
        }
    }
}

pub fn is_ok_status(status: &str) -> bool {
    status.eq_ignore_ascii_case("ok")
}

impl LoadSceneResponse {
    /// The loaded models, or `None` when the backend reported a failure.
    ///
    /// A missing `status` is accepted: the reference backend returns the raw
    /// saved document, which has no status field.
    pub fn into_models(self) -> Option<(Vec<SceneObject>, Option<String>)> {
        if let Some(status) = &self.status {
            if !is_ok_status(status) {
                return None;
            }
        }
        let models = self.models?;
        Some((models, self.filename))
    }
}
