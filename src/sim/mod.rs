//! Deterministic simulation module
//!
//! All gameplay logic lives here:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Contact events drained at one fixed point per frame
//! - No rendering or platform dependencies

pub mod physics;
pub mod state;
pub mod tick;

pub use physics::{BodyDesc, BodyHandle, ContactEvent, PhysicsWorld, Shape};
pub use state::{
    Collectible, CollectibleKind, GameEvent, GamePhase, GameState, Player, Transform,
    random_ground_position, reposition,
};
pub use tick::{Action, FrameInput, LoopControl, apply_action, frame, resolve_contacts};
