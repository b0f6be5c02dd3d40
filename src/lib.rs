//! Note Dash - a 3D browser arcade game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics world, game loop, scoring)
//! - `camera`: Perspective camera with orbit controls
//! - `renderer`: WebGPU raymarching pipeline
//! - `assets`: Async asset state, glTF models and textures
//! - `audio`: Sound cues and background music
//! - `platform`: Browser input mapping
//! - `ui`: HUD text
//! - `settings` / `tuning`: User preferences and game balance

pub mod assets;
pub mod audio;
pub mod camera;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod tuning;
pub mod ui;

pub use camera::Camera;
pub use settings::Settings;
pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    use glam::Vec3;

    /// Fixed simulation timestep, one per rendered frame
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// World gravity along Y
    pub const GRAVITY: f32 = -9.82;

    /// Ground slab
    pub const GROUND_HALF_EXTENTS: Vec3 = Vec3::new(15.0, 0.5, 15.0);
    pub const GROUND_Y: f32 = -1.0;

    /// Player box
    pub const PLAYER_HALF_EXTENT: f32 = 0.4;
    pub const PLAYER_MASS: f32 = 1.0;
    pub const PLAYER_DAMPING: f32 = 0.9;

    /// Note bodies
    pub const COLLECTIBLE_RADIUS: f32 = 0.3;
    pub const COLLECTIBLE_HEIGHT: f32 = 0.0;

    /// Camera defaults
    pub const CAMERA_START: Vec3 = Vec3::new(0.0, 1.5, 4.5);
    pub const CAMERA_FOV_DEGREES: f32 = 75.0;
    pub const CAMERA_NEAR: f32 = 0.1;
    pub const CAMERA_FAR: f32 = 1000.0;
}
