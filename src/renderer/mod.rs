//! WebGPU rendering module
//!
//! The scene is raymarched in the fragment shader from a flat list of
//! primitives. Building that list is pure so the visibility rules can be
//! tested without a GPU.

pub mod sdf_pipeline;

pub use sdf_pipeline::{MAX_OBJECTS, RenderError, SceneRenderer, TextureSlot};

use glam::Vec3;

use crate::assets::{ModelDesc, Models};
use crate::consts::*;
use crate::sim::GameState;

/// Distance-field primitive standing in for a model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    RoundBox { half_extents: Vec3, rounding: f32 },
    /// Eighth note: ball head, stem and flag
    Note { head_radius: f32, stem_height: f32 },
}

/// Surface treatment applied in the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    /// Flat colour from the model
    Plain,
    /// Ground texture repeated over the top face
    Tiled,
}

/// One drawable primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    pub position: Vec3,
    pub shape: Primitive,
    /// Linear RGBA
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub material: Material,
}

impl SceneObject {
    /// Rounded box filling the model bounds
    fn boxed(position: Vec3, model: &ModelDesc) -> Self {
        let half = model.half_extents();
        Self {
            position: position + model.center(),
            shape: Primitive::RoundBox {
                half_extents: half,
                rounding: half.min_element() * 0.1,
            },
            color: model.color,
            roughness: model.roughness,
            metalness: model.metalness,
            material: Material::Plain,
        }
    }

    /// Note glyph fitted into the model bounds, head in the lower left
    fn note(position: Vec3, model: &ModelDesc) -> Self {
        let half = model.half_extents();
        let head_radius = half.x.min(half.y) * 0.45;
        let stem_height = (2.0 * half.y - 2.0 * head_radius).max(head_radius);
        let head = model.center() + Vec3::new(head_radius - half.x, head_radius - half.y, 0.0);
        Self {
            position: position + head,
            shape: Primitive::Note {
                head_radius,
                stem_height,
            },
            color: model.color,
            roughness: model.roughness,
            metalness: model.metalness,
            material: Material::Plain,
        }
    }
}

/// Ground tint (linear), multiplied with the tile texture
const GROUND_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Everything visible this frame
///
/// The ground is always drawn. The player and each note kind appear only once
/// their model has loaded; a failed model stays invisible.
pub fn collect_scene(state: &GameState, models: &Models) -> Vec<SceneObject> {
    let mut objects = Vec::with_capacity(2 + state.bonus.len() + state.penalty.len());

    objects.push(SceneObject {
        position: state.world.position(state.ground),
        shape: Primitive::RoundBox {
            half_extents: GROUND_HALF_EXTENTS,
            rounding: 0.0,
        },
        color: GROUND_COLOR,
        roughness: 1.0,
        metalness: 0.0,
        material: Material::Tiled,
    });

    if let Some(model) = models.player.ready() {
        objects.push(SceneObject::boxed(state.player.mesh.position, model));
    }

    for collectible in state.collectibles() {
        if let Some(model) = models.for_kind(collectible.kind).ready() {
            objects.push(SceneObject::note(collectible.mesh.position, model));
        }
    }

    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, AssetState, parse_hex_color};

    fn model(name: &str, color: [f32; 4], half: f32) -> ModelDesc {
        ModelDesc {
            name: name.to_string(),
            min: Vec3::splat(-half),
            max: Vec3::splat(half),
            scale: 1.0,
            color,
            roughness: 0.9,
            metalness: 0.1,
        }
    }

    fn all_ready() -> Models {
        let bonus = parse_hex_color("#74C365").unwrap();
        let penalty = parse_hex_color("#D84EBC").unwrap();
        Models {
            player: AssetState::Ready(model("piano", [1.0; 4], 0.4)),
            bonus: AssetState::Ready(model("bonus", bonus, 0.3)),
            penalty: AssetState::Ready(model("penalty", penalty, 0.3)),
        }
    }

    #[test]
    fn test_pending_models_draw_only_ground() {
        let state = GameState::new(1);
        let scene = collect_scene(&state, &Models::default());
        assert_eq!(scene.len(), 1);
        assert_eq!(scene[0].material, Material::Tiled);
        assert_eq!(scene[0].position.y, GROUND_Y);
    }

    #[test]
    fn test_everything_ready() {
        let state = GameState::new(1);
        let scene = collect_scene(&state, &all_ready());
        let expected = 2 + 2 * state.tuning.collectibles_per_kind;
        assert_eq!(scene.len(), expected);
        assert!(scene.len() <= MAX_OBJECTS);
        assert!(matches!(scene[1].shape, Primitive::RoundBox { .. }));
        assert!(
            scene
                .iter()
                .skip(2)
                .all(|o| matches!(o.shape, Primitive::Note { .. }))
        );
    }

    #[test]
    fn test_failed_kind_is_skipped() {
        let state = GameState::new(1);
        let mut models = all_ready();
        models.penalty = AssetState::Failed(AssetError::NoAudio);
        let scene = collect_scene(&state, &models);
        assert_eq!(scene.len(), 2 + state.bonus.len());

        let bonus_color = parse_hex_color("#74C365").unwrap();
        assert!(scene.iter().skip(2).all(|o| o.color == bonus_color));
    }

    #[test]
    fn test_player_box_matches_model_bounds() {
        let state = GameState::new(9);
        let scene = collect_scene(&state, &all_ready());
        assert_eq!(scene[1].position, state.player.mesh.position);
        match scene[1].shape {
            Primitive::RoundBox { half_extents, .. } => {
                assert_eq!(half_extents, Vec3::splat(0.4));
            }
            other => panic!("unexpected player shape {other:?}"),
        }
        assert_eq!(scene[1].roughness, 0.9);
    }

    #[test]
    fn test_notes_follow_meshes_inside_bounds() {
        let state = GameState::new(9);
        let scene = collect_scene(&state, &all_ready());
        for (object, collectible) in scene.iter().skip(2).zip(state.collectibles()) {
            let offset = object.position - collectible.mesh.position;
            assert!(offset.abs().max_element() <= 0.3 + 1e-6);
        }
    }
}
