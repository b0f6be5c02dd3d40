//! Asynchronously loaded assets
//!
//! Every loadable thing is an [`AssetState`]: callers act on it only once it
//! is `Ready`. A failed load is logged and the asset simply never shows up.

use glam::{Mat4, Vec3};
use image::imageops::FilterType;
use thiserror::Error;

use crate::sim::CollectibleKind;

/// Why an asset could not be loaded
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("request for {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is not a valid glTF model: {source}")]
    Gltf {
        url: String,
        #[source]
        source: gltf::Error,
    },
    #[error("{url} has no mesh with position bounds")]
    EmptyModel { url: String },
    #[error("{url} is not a readable image: {source}")]
    Image {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("could not decode audio from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("audio output unavailable")]
    NoAudio,
}

/// Load progress of one asset
#[derive(Debug)]
pub enum AssetState<T> {
    Pending,
    Ready(T),
    Failed(AssetError),
}

impl<T> Default for AssetState<T> {
    fn default() -> Self {
        AssetState::Pending
    }
}

impl<T> AssetState<T> {
    /// Record the outcome of a load, logging failures
    pub fn from_result(name: &str, result: Result<T, AssetError>) -> Self {
        match result {
            Ok(value) => {
                log::info!("Loaded {}", name);
                AssetState::Ready(value)
            }
            Err(err) => {
                log::error!("Failed to load {}: {}", name, err);
                AssetState::Failed(err)
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            AssetState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AssetState::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AssetState::Pending)
    }
}

/// How a loaded model is presented
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelStyle {
    pub name: &'static str,
    /// Uniform scale applied to the model
    pub scale: f32,
    /// Hex colour replacing the model's base colour
    pub color: Option<&'static str>,
}

impl ModelStyle {
    pub const PIANO: Self = Self {
        name: "piano",
        scale: 0.015,
        color: None,
    };
    pub const BONUS_NOTE: Self = Self {
        name: "bonus-note",
        scale: 1.0,
        color: Some("#74C365"),
    };
    pub const PENALTY_NOTE: Self = Self {
        name: "penalty-note",
        scale: 1.0,
        color: Some("#D84EBC"),
    };
}

/// Used when the model leaves roughness or metalness at zero
const FALLBACK_ROUGHNESS: f32 = 0.9;
const FALLBACK_METALNESS: f32 = 0.1;

/// A model reduced to what the raymarcher draws: bounds and one material
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDesc {
    pub name: String,
    /// Unscaled bounds in model space
    pub min: Vec3,
    pub max: Vec3,
    pub scale: f32,
    /// Linear RGBA
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
}

impl ModelDesc {
    /// Read a `.glb` (or `.gltf` JSON) model
    ///
    /// Bounds come from the POSITION accessors' min/max under each node's
    /// transform; no buffer data is needed.
    pub fn from_glb(url: &str, bytes: &[u8], style: &ModelStyle) -> Result<Self, AssetError> {
        let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| AssetError::Gltf {
            url: url.to_string(),
            source,
        })?;

        let mut bounds: Option<(Vec3, Vec3)> = None;
        let mut material = None;
        let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
        let roots: Vec<gltf::Node> = match scene {
            Some(scene) => scene.nodes().collect(),
            None => gltf.nodes().collect(),
        };
        for node in roots {
            visit_node(&node, Mat4::IDENTITY, &mut bounds, &mut material);
        }

        let (min, max) = bounds.ok_or_else(|| AssetError::EmptyModel {
            url: url.to_string(),
        })?;
        let (base_color, roughness, metalness) = material.unwrap_or(([1.0; 4], 0.0, 0.0));
        let color = style
            .color
            .and_then(parse_hex_color)
            .unwrap_or(base_color);

        Ok(Self {
            name: style.name.to_string(),
            min,
            max,
            scale: style.scale,
            color,
            roughness: if roughness > 0.0 { roughness } else { FALLBACK_ROUGHNESS },
            metalness: if metalness > 0.0 { metalness } else { FALLBACK_METALNESS },
        })
    }

    /// Scaled half size of the bounds
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5 * self.scale
    }

    /// Scaled bounds centre relative to the model origin
    pub fn center(&self) -> Vec3 {
        (self.max + self.min) * 0.5 * self.scale
    }
}

type MaterialFactors = ([f32; 4], f32, f32);

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    bounds: &mut Option<(Vec3, Vec3)>,
    material: &mut Option<MaterialFactors>,
) {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let Some(accessor) = primitive.get(&gltf::Semantic::Positions) else {
                continue;
            };
            let (Some(min), Some(max)) = (
                accessor.min().as_ref().and_then(json_vec3),
                accessor.max().as_ref().and_then(json_vec3),
            ) else {
                continue;
            };
            for corner in box_corners(min, max) {
                let p = transform.transform_point3(corner);
                *bounds = Some(match *bounds {
                    Some((lo, hi)) => (lo.min(p), hi.max(p)),
                    None => (p, p),
                });
            }
            if material.is_none() {
                let pbr = primitive.material().pbr_metallic_roughness();
                *material = Some((
                    pbr.base_color_factor(),
                    pbr.roughness_factor(),
                    pbr.metallic_factor(),
                ));
            }
        }
    }

    for child in node.children() {
        visit_node(&child, transform, bounds, material);
    }
}

fn json_vec3(value: &gltf::json::Value) -> Option<Vec3> {
    let values = value.as_array()?;
    let axis = |i: usize| values.get(i).and_then(|v| v.as_f64()).map(|v| v as f32);
    Some(Vec3::new(axis(0)?, axis(1)?, axis(2)?))
}

fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}

/// Largest texture edge accepted by WebGL2-class devices
pub const MAX_TEXTURE_SIZE: u32 = 2048;

/// Decoded RGBA8 pixels ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TextureImage {
    /// Decode a PNG or JPEG, shrinking it to fit [`MAX_TEXTURE_SIZE`]
    pub fn from_bytes(url: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let mut img = image::load_from_memory(bytes).map_err(|source| AssetError::Image {
            url: url.to_string(),
            source,
        })?;
        if img.width() > MAX_TEXTURE_SIZE || img.height() > MAX_TEXTURE_SIZE {
            log::debug!("Shrinking {} from {}x{}", url, img.width(), img.height());
            img = img.resize(MAX_TEXTURE_SIZE, MAX_TEXTURE_SIZE, FilterType::Triangle);
        }
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Decoded {} ({}x{})", url, width, height);
        Ok(Self {
            width,
            height,
            data: rgba.into_raw(),
        })
    }
}

/// Parse `#RRGGBB` (sRGB) into linear RGBA
pub fn parse_hex_color(hex: &str) -> Option<[f32; 4]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| -> Option<f32> {
        let byte = u8::from_str_radix(digits.get(i..i + 2)?, 16).ok()?;
        Some(srgb_to_linear(byte as f32 / 255.0))
    };
    Some([channel(0)?, channel(2)?, channel(4)?, 1.0])
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Asset locations
pub mod paths {
    pub const PLAYER_MODEL: &str = "assets/piano.glb";
    /// Shared by both note kinds; only the colour differs
    pub const NOTE_MODEL: &str = "assets/note.glb";
    pub const GROUND_TEXTURE: &str = "assets/tiles.jpg";
    pub const BACKGROUND_TEXTURE: &str = "assets/bg.jpg";
    pub const BONUS_SOUND: &str = "assets/powerup.mp3";
    pub const PENALTY_SOUND: &str = "assets/powerdown.mp3";
    pub const MUSIC: &str = "assets/music.mp3";
}

/// The three visual models the scene needs
#[derive(Debug, Default)]
pub struct Models {
    pub player: AssetState<ModelDesc>,
    pub bonus: AssetState<ModelDesc>,
    pub penalty: AssetState<ModelDesc>,
}

impl Models {
    pub fn for_kind(&self, kind: CollectibleKind) -> &AssetState<ModelDesc> {
        match kind {
            CollectibleKind::Bonus => &self.bonus,
            CollectibleKind::Penalty => &self.penalty,
        }
    }
}

/// Ground tiles and scene background
#[derive(Debug, Default)]
pub struct Textures {
    pub ground: AssetState<TextureImage>,
    pub background: AssetState<TextureImage>,
}

/// Browser fetch helpers
#[cfg(target_arch = "wasm32")]
pub mod web {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::Response;

    use super::{AssetError, ModelDesc, ModelStyle, TextureImage};

    fn fetch_error(url: &str, err: wasm_bindgen::JsValue) -> AssetError {
        AssetError::Fetch {
            url: url.to_string(),
            reason: format!("{:?}", err),
        }
    }

    async fn fetch(url: &str) -> Result<Response, AssetError> {
        let window = web_sys::window().ok_or_else(|| AssetError::Fetch {
            url: url.to_string(),
            reason: "no window".into(),
        })?;
        let value = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(|e| fetch_error(url, e))?;
        let response: Response = value.dyn_into().map_err(|e| fetch_error(url, e))?;
        if !response.ok() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }

    pub async fn fetch_array_buffer(url: &str) -> Result<js_sys::ArrayBuffer, AssetError> {
        let response = fetch(url).await?;
        let promise = response.array_buffer().map_err(|e| fetch_error(url, e))?;
        let buffer = JsFuture::from(promise)
            .await
            .map_err(|e| fetch_error(url, e))?;
        buffer.dyn_into().map_err(|e| fetch_error(url, e))
    }

    pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, AssetError> {
        let buffer = fetch_array_buffer(url).await?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    pub async fn load_model(url: &str, style: &ModelStyle) -> Result<ModelDesc, AssetError> {
        let bytes = fetch_bytes(url).await?;
        ModelDesc::from_glb(url, &bytes, style)
    }

    pub async fn load_texture(url: &str) -> Result<TextureImage, AssetError> {
        let bytes = fetch_bytes(url).await?;
        TextureImage::from_bytes(url, &bytes)
    }
}
