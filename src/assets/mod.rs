pub mod thumbnails;

use crate::backend::{BackendClient, BackendError};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// Gap kept between a model's lowest point and the ground plane.
pub const GROUND_CLEARANCE: f32 = 0.01;

/// Guards against cyclic node graphs.
const MAX_NODE_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to fetch asset: {0}")]
    Fetch(#[from] BackendError),
    #[error("failed to parse glTF from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF at {url} references a missing scene, node, mesh or accessor")]
    BrokenReference { url: String },
    #[error("glTF at {url} has no positioned geometry")]
    NoGeometry { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |acc, point| {
            Self::new(acc.min.min(point), acc.max.max(point))
        }))
    }

    pub fn union(self, other: Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, b.y, b.z),
            Vec3::new(a.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after `matrix` is applied to its corners.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self::from_points(self.corners().map(|corner| matrix.transform_point3(corner)))
            .unwrap_or(*self)
    }
}

/// Index pairs into [`Aabb::corners`] forming the twelve box edges.
pub const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Immutable geometry summary of a catalogue asset, shared by every placement.
#[derive(Debug, Clone)]
pub struct AssetGeometry {
    pub bounds: Aabb,
    pub mesh_count: usize,
}

impl AssetGeometry {
    /// Parses glTF JSON or GLB bytes. Only the document is read; buffers are
    /// not needed because POSITION accessors carry their own min/max.
    ///
    ///
    /// Full validation is skipped: it rejects any `extensionsRequired` entry
    /// the gltf crate was built without. Only the references walked below are
    /// checked.
    pub fn from_gltf_bytes(url: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let document =
            gltf::Gltf::from_slice_without_validation(bytes).map_err(|source| AssetError::Parse {
                url: url.to_string(),
                source,
            })?;
        if !references_in_range(document.as_json()) {
            return Err(AssetError::BrokenReference {
                url: url.to_string(),
            });
        }

        let mut bounds: Option<Aabb> = None;
        let mut mesh_count = 0;
        let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
            Some(scene) => scene.nodes().collect(),
            None => document.nodes().collect(),
        };
        for node in roots {
            accumulate_node_bounds(&node, Mat4::IDENTITY, 0, &mut bounds, &mut mesh_count);
        }

        let bounds = bounds.ok_or_else(|| AssetError::NoGeometry {
            url: url.to_string(),
        })?;
        Ok(Self {
            bounds,
            mesh_count,
        })
    }

    pub fn resting_offset(&self) -> f32 {
        resting_offset(&self.bounds)
    }
}

/// Vertical offset that puts the lowest point of `bounds` just above y = 0.
pub fn resting_offset(bounds: &Aabb) -> f32 {
    -bounds.min.y + GROUND_CLEARANCE
}

/// Node indices, mesh indices and POSITION accessors must exist before the
/// document is walked.
fn references_in_range(root: &gltf::json::Root) -> bool {
    let node_count = root.nodes.len();
    let in_nodes = |index: &gltf::json::Index<gltf::json::Node>| index.value() < node_count;
    root.scene.map_or(true, |scene| scene.value() < root.scenes.len())
        && root.scenes.iter().all(|scene| scene.nodes.iter().all(in_nodes))
        && root.nodes.iter().all(|node| {
            node.mesh.map_or(true, |mesh| mesh.value() < root.meshes.len())
                && node.children.iter().flatten().all(in_nodes)
        })
        && root.meshes.iter().all(|mesh| {
            mesh.primitives.iter().all(|primitive| {
                primitive
                    .attributes
                    .values()
                    .all(|accessor| accessor.value() < root.accessors.len())
            })
        })
}

fn accumulate_node_bounds(
    node: &gltf::Node,
    parent: Mat4,
    depth: usize,
    bounds: &mut Option<Aabb>,
    mesh_count: &mut usize,
) {
    if depth > MAX_NODE_DEPTH {
        log::warn!("Node hierarchy deeper than {} levels; ignoring the rest", MAX_NODE_DEPTH);
        return;
    }
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        *mesh_count += 1;
        for primitive in mesh.primitives() {
            let Some(accessor) = primitive.get(&gltf::Semantic::Positions) else {
                continue;
            };
            let (Some(min), Some(max)) = (
                accessor.min().as_ref().and_then(json_vec3),
                accessor.max().as_ref().and_then(json_vec3),
            ) else {
                log::debug!("POSITION accessor {} has no bounds", accessor.index());
                continue;
            };
            let local = Aabb::new(min, max).transformed(&world);
            *bounds = Some(match *bounds {
                Some(existing) => existing.union(local),
                None => local,
            });
        }
    }

    for child in node.children() {
        accumulate_node_bounds(&child, world, depth + 1, bounds, mesh_count);
    }
}

fn json_vec3(value: &gltf::json::Value) -> Option<Vec3> {
    let values = value.as_array()?;
    if values.len() < 3 {
        return None;
    }
    let x = values[0].as_f64()? as f32;
    let y = values[1].as_f64()? as f32;
    let z = values[2].as_f64()? as f32;
    Some(Vec3::new(x, y, z))
}

#[derive(Debug, Clone)]
pub enum AssetSlot {
    Loading,
    Ready(Arc<AssetGeometry>),
    Failed,
}

/// Loads asset geometry in the background and caches it by URL.
pub struct AssetLibrary {
    client: BackendClient,
    slots: HashMap<String, AssetSlot>,
    result_tx: Sender<(String, Result<AssetGeometry, AssetError>)>,
    result_rx: Receiver<(String, Result<AssetGeometry, AssetError>)>,
}

impl AssetLibrary {
    pub fn new(client: BackendClient) -> Self {
        let (result_tx, result_rx) = mpsc::channel();
        Self {
            client,
            slots: HashMap::new(),
            result_tx,
            result_rx,
        }
    }

    /// Starts loading `url` unless it is already cached or in flight.
    pub fn request(&mut self, url: &str) {
        if self.slots.contains_key(url) {
            return;
        }
        self.slots.insert(url.to_string(), AssetSlot::Loading);

        let client = self.client.clone();
        let result_tx = self.result_tx.clone();
        let url = url.to_string();
        log::info!("Loading asset geometry from {}", url);
        let spawned = thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn({
                let url = url.clone();
                move || {
                    let result = client
                        .fetch_bytes(&url)
                        .map_err(AssetError::from)
                        .and_then(|bytes| AssetGeometry::from_gltf_bytes(&url, &bytes));
                    let _ = result_tx.send((url, result));
                }
            });
        if let Err(err) = spawned {
            log::error!("Failed to spawn asset loader for {}: {}", url, err);
            self.slots.insert(url, AssetSlot::Failed);
        }
    }

    /// Moves finished loads into the cache. Returns true if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        for (url, result) in self.result_rx.try_iter() {
            let slot = match result {
                Ok(geometry) => {
                    log::info!(
                        "Asset {} ready: {} meshes, resting offset {:.3}",
                        url,
                        geometry.mesh_count,
                        geometry.resting_offset()
                    );
                    AssetSlot::Ready(Arc::new(geometry))
                }
                Err(err) => {
                    log::warn!("Asset {} failed to load: {}", url, err);
                    AssetSlot::Failed
                }
            };
            self.slots.insert(url, slot);
            changed = true;
        }
        changed
    }

    pub fn slot(&self, url: &str) -> Option<&AssetSlot> {
        self.slots.get(url)
    }

    pub fn geometry(&self, url: &str) -> Option<Arc<AssetGeometry>> {
        match self.slots.get(url) {
            Some(AssetSlot::Ready(geometry)) => Some(Arc::clone(geometry)),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.slots
            .values()
            .any(|slot| matches!(slot, AssetSlot::Loading))
    }

    #[cfg(test)]
    pub fn insert_ready(&mut self, url: &str, geometry: AssetGeometry) {
        self.slots
            .insert(url.to_string(), AssetSlot::Ready(Arc::new(geometry)));
    }
}
