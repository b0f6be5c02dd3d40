//! Game state and core simulation types
//!
//! Score, phase and jump gate are only changed through the operations on
//! [`GameState`]; the loop and the input handler never poke the fields.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::physics::{BodyDesc, BodyHandle, PhysicsWorld, Shape};
use crate::consts::*;
use crate::tuning::{SpawnBounds, Tuning};

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Start page showing, loop not running
    NotStarted,
    /// Active gameplay
    Running,
    /// Score dropped to zero
    GameOver,
}

/// Which collection a collectible belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectibleKind {
    /// Green note, +1 point
    Bonus,
    /// Pink note, -1 point
    Penalty,
}

/// Something the outer shell should react to (sound, HUD, loop control)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    BonusCollected,
    PenaltyCollected,
    GameOver,
    Restarted,
}

/// Visual transform of a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

/// A physics body paired with the mesh that draws it
#[derive(Debug, Clone)]
pub struct Collectible {
    pub kind: CollectibleKind,
    pub body: BodyHandle,
    pub mesh: Transform,
}

impl Collectible {
    /// Copy the body's transform onto the mesh
    pub fn sync_mesh(&mut self, world: &PhysicsWorld) {
        self.mesh = Transform {
            position: world.position(self.body),
            rotation: world.rotation(self.body),
        };
    }
}

/// The player-controlled piano
#[derive(Debug, Clone)]
pub struct Player {
    pub body: BodyHandle,
    pub mesh: Transform,
}

/// Pick an integer position inside `bounds`, independently per axis
pub fn random_ground_position(rng: &mut Pcg32, bounds: &SpawnBounds) -> (f32, f32) {
    let x = rng.random_range(bounds.min_x..=bounds.max_x);
    let z = rng.random_range(bounds.min_z..=bounds.max_z);
    (x as f32, z as f32)
}

/// Teleport a collectible's body within `bounds` (y untouched) and sync its mesh
pub fn reposition(
    collectible: &mut Collectible,
    world: &mut PhysicsWorld,
    rng: &mut Pcg32,
    bounds: &SpawnBounds,
) {
    let (x, z) = random_ground_position(rng, bounds);
    let y = world.position(collectible.body).y;
    world.set_position(collectible.body, Vec3::new(x, y, z));
    collectible.sync_mesh(world);
}

/// Complete session state
#[derive(Debug)]
pub struct GameState {
    /// Seed the RNG was created from
    pub seed: u64,
    pub tuning: Tuning,
    pub world: PhysicsWorld,
    pub ground: BodyHandle,
    pub player: Player,
    pub bonus: Vec<Collectible>,
    pub penalty: Vec<Collectible>,
    /// Frames simulated since the session started
    pub frame_count: u64,
    pub(crate) rng: Pcg32,
    score: i32,
    phase: GamePhase,
    can_jump: bool,
    events: Vec<GameEvent>,
}

impl GameState {
    /// Build the world with default tuning
    pub fn new(seed: u64) -> Self {
        Self::with_tuning(seed, Tuning::default())
    }

    /// Build every body and mesh once; they live for the whole session
    pub fn with_tuning(seed: u64, tuning: Tuning) -> Self {
        let tuning = tuning.normalized();
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut world = PhysicsWorld::new(Vec3::new(0.0, GRAVITY, 0.0));

        let ground = world.add_body(BodyDesc::fixed(
            Shape::Cuboid {
                half_extents: GROUND_HALF_EXTENTS,
            },
            Vec3::new(0.0, GROUND_Y, 0.0),
        ));

        let player_body = world.add_body(BodyDesc {
            shape: Shape::Cuboid {
                half_extents: Vec3::splat(PLAYER_HALF_EXTENT),
            },
            mass: PLAYER_MASS,
            position: Vec3::ZERO,
            fixed_rotation: true,
            linear_damping: PLAYER_DAMPING,
            angular_damping: PLAYER_DAMPING,
        });

        let mut spawn = |kind: CollectibleKind, world: &mut PhysicsWorld| -> Vec<Collectible> {
            (0..tuning.collectibles_per_kind)
                .map(|_| {
                    let (x, z) = random_ground_position(&mut rng, &tuning.spawn_bounds);
                    let position = Vec3::new(x, COLLECTIBLE_HEIGHT, z);
                    let body = world.add_body(BodyDesc::fixed(
                        Shape::Sphere {
                            radius: COLLECTIBLE_RADIUS,
                        },
                        position,
                    ));
                    Collectible {
                        kind,
                        body,
                        mesh: Transform::at(position),
                    }
                })
                .collect()
        };
        let bonus = spawn(CollectibleKind::Bonus, &mut world);
        let penalty = spawn(CollectibleKind::Penalty, &mut world);

        log::debug!(
            "World built: {} bodies, {} bonus, {} penalty",
            world.len(),
            bonus.len(),
            penalty.len()
        );

        Self {
            seed,
            score: tuning.start_score,
            tuning,
            world,
            ground,
            player: Player {
                body: player_body,
                mesh: Transform::IDENTITY,
            },
            bonus,
            penalty,
            frame_count: 0,
            rng,
            phase: GamePhase::NotStarted,
            can_jump: false,
            events: Vec::new(),
        }
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn can_jump(&self) -> bool {
        self.can_jump
    }

    /// Leave the start page; no effect once the session has begun
    pub fn start(&mut self) {
        if self.phase == GamePhase::NotStarted {
            self.phase = GamePhase::Running;
            log::info!("Game started (seed {})", self.seed);
        }
    }

    pub fn apply_bonus(&mut self) {
        self.score += 1;
        self.events.push(GameEvent::BonusCollected);
    }

    pub fn apply_penalty(&mut self) {
        self.score -= 1;
        self.events.push(GameEvent::PenaltyCollected);
    }

    pub fn set_jump_available(&mut self, available: bool) {
        self.can_jump = available;
    }

    /// Enter the terminal phase (idempotent)
    pub fn set_game_over(&mut self) {
        if self.phase != GamePhase::GameOver {
            self.phase = GamePhase::GameOver;
            self.events.push(GameEvent::GameOver);
            log::info!("Game over after {} frames", self.frame_count);
        }
    }

    /// Reset score, phase, player and every collectible
    pub fn restart(&mut self) {
        self.score = self.tuning.start_score;
        self.phase = GamePhase::Running;

        let player = self.player.body;
        self.world.set_position(player, Vec3::ZERO);
        self.world.set_velocity(player, Vec3::ZERO);
        self.world.set_angular_velocity(player, Vec3::ZERO);

        let bounds = self.tuning.spawn_bounds;
        for collectible in self.bonus.iter_mut().chain(self.penalty.iter_mut()) {
            reposition(collectible, &mut self.world, &mut self.rng, &bounds);
        }

        self.events.push(GameEvent::Restarted);
        log::info!("Game restarted");
    }

    /// Take events raised since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Every collectible of both kinds, bonus first
    pub fn collectibles(&self) -> impl Iterator<Item = &Collectible> {
        self.bonus.iter().chain(self.penalty.iter())
    }
}
