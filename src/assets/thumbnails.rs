use crate::backend::{BackendClient, BackendError};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Fetch(#[from] BackendError),
    #[error("failed to decode thumbnail: {0}")]
    Decode(#[from] image::ImageError),
}

enum ThumbnailSlot {
    Loading,
    Ready(egui::TextureHandle),
    Failed,
}

/// Catalogue thumbnails keyed by image URL, uploaded as egui textures.
pub struct ThumbnailCache {
    client: BackendClient,
    slots: HashMap<String, ThumbnailSlot>,
    decoded_tx: Sender<(String, Result<egui::ColorImage, ThumbnailError>)>,
    decoded_rx: Receiver<(String, Result<egui::ColorImage, ThumbnailError>)>,
}

impl ThumbnailCache {
    pub fn new(client: BackendClient) -> Self {
        let (decoded_tx, decoded_rx) = mpsc::channel();
        Self {
            client,
            slots: HashMap::new(),
            decoded_tx,
            decoded_rx,
        }
    }

    /// Texture for `url`, starting a fetch on first use.
    pub fn get(&mut self, url: &str) -> Option<&egui::TextureHandle> {
        if url.is_empty() {
            return None;
        }
        if !self.slots.contains_key(url) {
            self.spawn_fetch(url);
        }
        match self.slots.get(url) {
            Some(ThumbnailSlot::Ready(texture)) => Some(texture),
            _ => None,
        }
    }

    fn spawn_fetch(&mut self, url: &str) {
        self.slots.insert(url.to_string(), ThumbnailSlot::Loading);
        let client = self.client.clone();
        let decoded_tx = self.decoded_tx.clone();
        let url = url.to_string();
        let spawned = thread::Builder::new()
            .name("thumbnail".to_string())
            .spawn({
                let url = url.clone();
                move || {
                    let result = fetch_and_decode(&client, &url);
                    let _ = decoded_tx.send((url, result));
                }
            });
        if let Err(err) = spawned {
            log::warn!("Failed to spawn thumbnail fetch: {}", err);
            self.slots.insert(url, ThumbnailSlot::Failed);
        }
    }

    pub fn poll(&mut self, ctx: &egui::Context) {
        for (url, result) in self.decoded_rx.try_iter() {
            let slot = match result {
                Ok(image) => {
                    let texture = ctx.load_texture(url.as_str(), image, egui::TextureOptions::LINEAR);
                    ThumbnailSlot::Ready(texture)
                }
                Err(err) => {
                    log::warn!("Thumbnail {} unavailable: {}", url, err);
                    ThumbnailSlot::Failed
                }
            };
            self.slots.insert(url, slot);
        }
    }

    pub fn is_loading(&self) -> bool {
        self.slots
            .values()
            .any(|slot| matches!(slot, ThumbnailSlot::Loading))
    }
}

fn fetch_and_decode(client: &BackendClient, url: &str) -> Result<egui::ColorImage, ThumbnailError> {
    let bytes = client.fetch_bytes(url)?;
    decode_thumbnail(&bytes)
}

fn decode_thumbnail(bytes: &[u8]) -> Result<egui::ColorImage, ThumbnailError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}
