//! Rigid-body world backed by rapier
//!
//! The game only talks to bodies through [`BodyHandle`]s and glam vectors.
//! Contact starts reported by rapier's channel collector are moved into a
//! queue after each step; the frame loop drains that queue once per frame.

use std::collections::VecDeque;
use std::fmt;

use crossbeam_channel::Receiver;
use glam::{Quat, Vec3};
use rapier3d::prelude::*;

/// Handle of a body inside its [`PhysicsWorld`]
pub type BodyHandle = RigidBodyHandle;

/// Collision shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Cuboid { half_extents: Vec3 },
    Sphere { radius: f32 },
}

/// Construction parameters for a body
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub shape: Shape,
    /// 0 = fixed
    pub mass: f32,
    pub position: Vec3,
    pub fixed_rotation: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDesc {
    pub fn fixed(shape: Shape, position: Vec3) -> Self {
        Self {
            shape,
            mass: 0.0,
            position,
            fixed_rotation: true,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }
}

/// Two bodies that started touching during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl ContactEvent {
    /// The other participant if `body` took part in this contact
    pub fn other(&self, body: BodyHandle) -> Option<BodyHandle> {
        if self.a == body {
            Some(self.b)
        } else if self.b == body {
            Some(self.a)
        } else {
            None
        }
    }
}

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Container stepping all bodies together
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    collector: ChannelEventCollector,
    collision_events: Receiver<CollisionEvent>,
    force_events: Receiver<ContactForceEvent>,
    contacts: VecDeque<ContactEvent>,
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity())
            .field("bodies", &self.bodies.len())
            .field("pending_contacts", &self.contacts.len())
            .finish()
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        let (collision_send, collision_events) = crossbeam_channel::unbounded();
        let (force_send, force_events) = crossbeam_channel::unbounded();
        Self {
            gravity: to_vector(gravity),
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            collector: ChannelEventCollector::new(collision_send, force_send),
            collision_events,
            force_events,
            contacts: VecDeque::new(),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        to_vec3(&self.gravity)
    }

    /// Create a body and its single collider
    ///
    /// Dynamic bodies never sleep: fixed notes are teleported into them and
    /// the pair must still be checked.
    pub fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let builder = if desc.mass > 0.0 {
            RigidBodyBuilder::dynamic()
                .linear_damping(desc.linear_damping)
                .angular_damping(desc.angular_damping)
                .can_sleep(false)
        } else {
            RigidBodyBuilder::fixed()
        };
        let mut builder = builder.translation(to_vector(desc.position));
        if desc.fixed_rotation {
            builder = builder.lock_rotations();
        }
        let handle = self.bodies.insert(builder.build());

        let collider = match desc.shape {
            Shape::Cuboid { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
            Shape::Sphere { radius } => ColliderBuilder::ball(radius),
        };
        let collider = collider
            .mass(desc.mass.max(0.0))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn is_fixed(&self, handle: BodyHandle) -> bool {
        self.bodies.get(handle).is_some_and(|b| b.is_fixed())
    }

    pub fn position(&self, handle: BodyHandle) -> Vec3 {
        self.bodies
            .get(handle)
            .map(|b| to_vec3(b.translation()))
            .unwrap_or_default()
    }

    pub fn rotation(&self, handle: BodyHandle) -> Quat {
        self.bodies
            .get(handle)
            .map(|b| {
                let q = b.rotation();
                Quat::from_xyzw(q.i, q.j, q.k, q.w)
            })
            .unwrap_or_default()
    }

    pub fn velocity(&self, handle: BodyHandle) -> Vec3 {
        self.bodies
            .get(handle)
            .map(|b| to_vec3(b.linvel()))
            .unwrap_or_default()
    }

    /// Teleport a body; fixed bodies included
    pub fn set_position(&mut self, handle: BodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_translation(to_vector(position), true);
        }
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(to_vector(velocity), true);
        }
    }

    pub fn set_angular_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_angvel(to_vector(velocity), true);
        }
    }

    /// Contacts recorded since the last drain
    pub fn pending_contacts(&self) -> usize {
        self.contacts.len()
    }

    /// Take every queued contact event, oldest first
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        self.contacts.drain(..).collect()
    }

    /// Advance the world by a fixed timestep
    pub fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.collector,
        );

        while let Ok(event) = self.collision_events.try_recv() {
            if let CollisionEvent::Started(a, b, _) = event {
                if let (Some(a), Some(b)) = (self.body_of(a), self.body_of(b)) {
                    self.contacts.push_back(ContactEvent { a, b });
                }
            }
        }
        while self.force_events.try_recv().is_ok() {}
    }

    fn body_of(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        self.colliders.get(collider).and_then(|c| c.parent())
    }
}
