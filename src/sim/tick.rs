//! Per-frame game loop, collision outcomes and input effects
//!
//! One call to [`frame`] per display refresh. The physics world advances by a
//! fixed step each call regardless of wall-clock time.

use glam::Vec3;

use super::physics::BodyHandle;
use super::state::{GamePhase, GameState, reposition};
use crate::consts::SIM_DT;

/// Per-frame inputs from the shell
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    /// Camera position along the forward axis; notes past it get recycled
    pub camera_z: f32,
    /// Player model finished loading, so its mesh may be moved
    pub player_model_ready: bool,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            camera_z: crate::consts::CAMERA_START.z,
            player_model_ready: true,
        }
    }
}

/// What the driver should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Request another animation frame
    Continue,
    /// Stop requesting frames until restart
    Stop,
}

/// Discrete player commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveRight,
    MoveLeft,
    Jump,
    Restart,
}

/// Run one frame: advance notes, render, step physics, resolve contacts, sync
pub fn frame<R>(state: &mut GameState, input: &FrameInput, mut render: R) -> LoopControl
where
    R: FnMut(&GameState),
{
    if state.phase() == GamePhase::NotStarted {
        return LoopControl::Stop;
    }

    // Score is sampled once at frame entry; contacts resolved below are
    // seen by the next frame.
    let running = state.score() > 0;
    if running {
        advance_collectibles(state, input.camera_z);
    } else {
        state.set_game_over();
    }

    render(state);

    state.world.step(SIM_DT);
    if running {
        resolve_contacts(state);
    } else {
        // The session is over: contacts from the last step change nothing
        state.world.drain_contacts();
    }

    if input.player_model_ready {
        let player = state.player.body;
        state.player.mesh.position = state.world.position(player);
        state.player.mesh.rotation = state.world.rotation(player);
    }

    state.frame_count += 1;

    if state.phase() == GamePhase::GameOver {
        LoopControl::Stop
    } else {
        LoopControl::Continue
    }
}

/// Slide every note towards the camera, recycling the ones that passed it
fn advance_collectibles(state: &mut GameState, camera_z: f32) {
    let speed = state.tuning.collectible_speed;
    let bounds = state.tuning.recycle_bounds;

    for collectible in state.bonus.iter_mut().chain(state.penalty.iter_mut()) {
        let position = state.world.position(collectible.body) + Vec3::new(0.0, 0.0, speed);
        state.world.set_position(collectible.body, position);
        if position.z > camera_z {
            reposition(collectible, &mut state.world, &mut state.rng, &bounds);
        } else {
            collectible.sync_mesh(&state.world);
        }
    }
}

/// Drain the contact queue and apply outcomes for contacts touching the player
pub fn resolve_contacts(state: &mut GameState) {
    let player = state.player.body;
    for contact in state.world.drain_contacts() {
        if let Some(other) = contact.other(player) {
            on_player_contact(state, other);
        }
    }
}

/// Bonus entries, then penalty entries, then ground; every match applies
fn on_player_contact(state: &mut GameState, other: BodyHandle) {
    let bounds = state.tuning.spawn_bounds;

    let mut bonus_hits = 0;
    for collectible in state.bonus.iter_mut().filter(|c| c.body == other) {
        log::debug!("Collision with bonus note");
        reposition(collectible, &mut state.world, &mut state.rng, &bounds);
        bonus_hits += 1;
    }
    for _ in 0..bonus_hits {
        state.apply_bonus();
    }

    let mut penalty_hits = 0;
    for collectible in state.penalty.iter_mut().filter(|c| c.body == other) {
        log::debug!("Collision with penalty note");
        reposition(collectible, &mut state.world, &mut state.rng, &bounds);
        penalty_hits += 1;
    }
    for _ in 0..penalty_hits {
        state.apply_penalty();
    }

    if other == state.ground {
        state.set_jump_available(true);
    }
}

/// Apply one key press. Works in every phase.
pub fn apply_action(state: &mut GameState, action: Action) {
    match action {
        Action::MoveRight => {
            let step = state.tuning.move_step;
            nudge_player(state, step);
        }
        Action::MoveLeft => {
            let step = state.tuning.move_step;
            nudge_player(state, -step);
        }
        Action::Jump => {
            if state.can_jump() {
                let player = state.player.body;
                let velocity = state.world.velocity(player);
                let jump = state.tuning.jump_velocity;
                state
                    .world
                    .set_velocity(player, Vec3::new(velocity.x, jump, velocity.z));
                state.set_jump_available(false);
            }
        }
        Action::Restart => state.restart(),
    }
}

/// Movement is positional: horizontal velocity is cleared, not set
fn nudge_player(state: &mut GameState, dx: f32) {
    let player = state.player.body;
    let velocity = state.world.velocity(player);
    let position = state.world.position(player);
    state
        .world
        .set_velocity(player, Vec3::new(0.0, velocity.y, velocity.z));
    state
        .world
        .set_position(player, position + Vec3::new(dx, 0.0, 0.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{CollectibleKind, GameEvent};
    use crate::tuning::SpawnBounds;
    use proptest::prelude::*;

    fn running(seed: u64) -> GameState {
        let mut state = GameState::new(seed);
        state.start();
        state
    }

    /// Put the player back at the origin with a note inside it, so the next
    /// step reports a contact
    fn place_on_player(state: &mut GameState, kind: CollectibleKind, index: usize) {
        let body = match kind {
            CollectibleKind::Bonus => state.bonus[index].body,
            CollectibleKind::Penalty => state.penalty[index].body,
        };
        let player = state.player.body;
        state.world.set_position(player, Vec3::ZERO);
        state.world.set_velocity(player, Vec3::ZERO);
        state.world.set_position(body, Vec3::ZERO);
    }

    /// One step with the queue discarded, so a repositioned note separates
    /// from the player before it is placed again
    fn separate(state: &mut GameState) {
        state.world.step(SIM_DT);
        state.world.drain_contacts();
    }

    /// Frames until the player has settled on the ground
    fn settle(state: &mut GameState) {
        // Park the notes far away so nothing but the ground is touched
        for c in state.bonus.iter().chain(state.penalty.iter()) {
            state.world.set_position(c.body, Vec3::new(100.0, 0.0, -100.0));
        }
        for _ in 0..120 {
            state.world.step(SIM_DT);
            resolve_contacts(state);
        }
        state.drain_events();
    }

    #[test]
    fn test_not_started_does_nothing() {
        let mut state = GameState::new(1);
        let mut renders = 0;
        let control = frame(&mut state, &FrameInput::default(), |_| renders += 1);
        assert_eq!(control, LoopControl::Stop);
        assert_eq!(renders, 0);
        assert_eq!(state.frame_count, 0);
    }

    #[test]
    fn test_frame_renders_once_and_syncs_meshes() {
        let mut state = running(11);
        let mut renders = 0;
        for _ in 0..30 {
            let control = frame(&mut state, &FrameInput::default(), |_| renders += 1);
            assert_eq!(control, LoopControl::Continue);
            for c in state.collectibles() {
                assert_eq!(c.mesh.position, state.world.position(c.body));
                assert_eq!(c.mesh.rotation, state.world.rotation(c.body));
            }
        }
        assert_eq!(renders, 30);
        assert_eq!(
            state.player.mesh.position,
            state.world.position(state.player.body)
        );
    }

    #[test]
    fn test_render_sees_advanced_notes_before_physics_step() {
        let mut state = running(5);
        let before: Vec<f32> = state.collectibles().map(|c| c.mesh.position.z).collect();
        let mut seen = Vec::new();
        frame(&mut state, &FrameInput::default(), |s| {
            seen = s.collectibles().map(|c| c.mesh.position.z).collect();
        });
        for (b, s) in before.iter().zip(&seen) {
            assert!((s - (b + 0.1)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_player_mesh_waits_for_model() {
        let mut state = running(2);
        let input = FrameInput {
            player_model_ready: false,
            ..FrameInput::default()
        };
        for _ in 0..10 {
            frame(&mut state, &input, |_| {});
        }
        assert_eq!(state.player.mesh, crate::sim::state::Transform::IDENTITY);
        assert_ne!(state.world.position(state.player.body), Vec3::ZERO);
    }

    #[test]
    fn test_note_past_camera_is_recycled() {
        let mut state = running(8);
        let body = state.bonus[0].body;
        let start = state.world.position(body);
        state.world.set_position(body, Vec3::new(start.x, start.y, 4.45));

        frame(&mut state, &FrameInput::default(), |_| {});

        let pos = state.world.position(body);
        assert!(state.tuning.recycle_bounds.contains(pos.x, pos.z));
        assert_eq!(state.bonus[0].mesh.position, pos);
    }

    #[test]
    fn test_bonus_contact_scores_and_repositions() {
        let mut state = running(21);
        place_on_player(&mut state, CollectibleKind::Bonus, 2);
        state.world.step(SIM_DT);
        resolve_contacts(&mut state);

        assert_eq!(state.score(), 6);
        assert!(state.drain_events().contains(&GameEvent::BonusCollected));
        let pos = state.world.position(state.bonus[2].body);
        assert!(state.tuning.spawn_bounds.contains(pos.x, pos.z));
        assert_eq!(state.bonus[2].mesh.position, pos);
    }

    #[test]
    fn test_penalty_contact_costs_a_point() {
        let mut state = running(22);
        place_on_player(&mut state, CollectibleKind::Penalty, 0);
        state.world.step(SIM_DT);
        resolve_contacts(&mut state);
        assert_eq!(state.score(), 4);
        assert!(state.drain_events().contains(&GameEvent::PenaltyCollected));
    }

    #[test]
    fn test_ground_contact_enables_jump() {
        let mut state = running(4);
        assert!(!state.can_jump());
        settle(&mut state);
        assert!(state.can_jump());
    }

    #[test]
    fn test_jump_only_when_available() {
        let mut state = running(4);
        let player = state.player.body;
        apply_action(&mut state, Action::Jump);
        assert!(state.world.velocity(player).y <= 0.0);

        settle(&mut state);
        let vx = 0.25;
        state.world.set_velocity(player, Vec3::new(vx, 0.0, 0.0));
        apply_action(&mut state, Action::Jump);
        let v = state.world.velocity(player);
        assert_eq!(v.y, 4.0);
        assert_eq!(v.x, vx);
        assert!(!state.can_jump());

        // Second press in mid-air is ignored
        state.world.set_velocity(player, Vec3::new(0.0, 1.0, 0.0));
        apply_action(&mut state, Action::Jump);
        assert_eq!(state.world.velocity(player).y, 1.0);
    }

    #[test]
    fn test_jump_leaves_ground_then_lands_again() {
        let mut state = running(4);
        settle(&mut state);
        apply_action(&mut state, Action::Jump);
        state.world.step(SIM_DT);
        resolve_contacts(&mut state);
        assert!(!state.can_jump());
        for _ in 0..180 {
            state.world.step(SIM_DT);
            resolve_contacts(&mut state);
        }
        assert!(state.can_jump());
    }

    #[test]
    fn test_moves_are_positional_steps() {
        let mut state = running(6);
        let player = state.player.body;
        state.world.set_velocity(player, Vec3::new(3.0, 0.0, 0.0));
        apply_action(&mut state, Action::MoveRight);
        apply_action(&mut state, Action::MoveRight);
        assert!((state.world.position(player).x - 0.2).abs() < 1e-6);
        assert_eq!(state.world.velocity(player).x, 0.0);

        apply_action(&mut state, Action::MoveLeft);
        assert!((state.world.position(player).x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_last_penalty_ends_game_on_next_frame() {
        let mut state = running(30);
        for _ in 0..4 {
            state.apply_penalty();
        }
        assert_eq!(state.score(), 1);

        place_on_player(&mut state, CollectibleKind::Penalty, 1);
        let control = frame(&mut state, &FrameInput::default(), |_| {});
        assert_eq!(state.score(), 0);
        // Contact resolved after the score check: still running this frame
        assert_eq!(state.phase(), GamePhase::Running);
        assert_eq!(control, LoopControl::Continue);

        let control = frame(&mut state, &FrameInput::default(), |_| {});
        assert_eq!(state.phase(), GamePhase::GameOver);
        assert_eq!(control, LoopControl::Stop);
    }

    #[test]
    fn test_game_over_freezes_notes() {
        let mut state = running(31);
        for _ in 0..5 {
            state.apply_penalty();
        }
        frame(&mut state, &FrameInput::default(), |_| {});
        assert_eq!(state.phase(), GamePhase::GameOver);

        let before: Vec<_> = state.collectibles().map(|c| c.mesh.position).collect();
        frame(&mut state, &FrameInput::default(), |_| {});
        let after: Vec<_> = state.collectibles().map(|c| c.mesh.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_contact_in_terminal_frame_is_ignored() {
        let mut state = running(33);
        for _ in 0..5 {
            state.apply_penalty();
        }
        state.drain_events();
        assert_eq!(state.score(), 0);

        place_on_player(&mut state, CollectibleKind::Bonus, 0);
        let note = state.bonus[0].body;
        let control = frame(&mut state, &FrameInput::default(), |_| {});

        assert_eq!(control, LoopControl::Stop);
        assert_eq!(state.phase(), GamePhase::GameOver);
        assert_eq!(state.score(), 0);
        assert_eq!(state.world.position(note), Vec3::ZERO);
        assert_eq!(state.world.pending_contacts(), 0);
        assert_eq!(state.drain_events(), vec![GameEvent::GameOver]);
        assert_eq!(crate::ui::hud_text(&state), crate::ui::GAME_OVER_TEXT);
    }

    #[test]
    fn test_restart_from_game_over_resumes_notes() {
        let mut state = running(32);
        for _ in 0..5 {
            state.apply_penalty();
        }
        frame(&mut state, &FrameInput::default(), |_| {});
        assert_eq!(state.phase(), GamePhase::GameOver);

        apply_action(&mut state, Action::Restart);
        assert_eq!(state.score(), 5);
        assert_eq!(state.phase(), GamePhase::Running);

        let before: Vec<f32> = state.collectibles().map(|c| c.mesh.position.z).collect();
        let control = frame(&mut state, &FrameInput::default(), |_| {});
        assert_eq!(control, LoopControl::Continue);
        let after: Vec<f32> = state.collectibles().map(|c| c.mesh.position.z).collect();
        assert_ne!(before, after);
    }

    #[test]
    fn test_determinism() {
        let mut a = running(99999);
        let mut b = running(99999);
        let actions = [Action::MoveRight, Action::Jump, Action::MoveLeft];
        for i in 0..300 {
            if i % 25 == 0 {
                let action = actions[(i / 25) % actions.len()];
                apply_action(&mut a, action);
                apply_action(&mut b, action);
            }
            frame(&mut a, &FrameInput::default(), |_| {});
            frame(&mut b, &FrameInput::default(), |_| {});
        }
        assert_eq!(a.score(), b.score());
        let pa: Vec<_> = a.collectibles().map(|c| c.mesh.position).collect();
        let pb: Vec<_> = b.collectibles().map(|c| c.mesh.position).collect();
        assert_eq!(pa, pb);
    }

    proptest! {
        #[test]
        fn prop_restart_always_yields_valid_state(seed in any::<u64>(), penalties in 0i32..12) {
            let mut state = running(seed);
            for _ in 0..penalties {
                state.apply_penalty();
            }
            frame(&mut state, &FrameInput::default(), |_| {});
            apply_action(&mut state, Action::Restart);

            prop_assert_eq!(state.score(), 5);
            prop_assert_eq!(state.phase(), GamePhase::Running);
            let bounds = state.tuning.spawn_bounds;
            for c in state.collectibles() {
                let p = state.world.position(c.body);
                prop_assert!(bounds.contains(p.x, p.z));
                prop_assert_eq!(p.x.fract(), 0.0);
                prop_assert_eq!(p.z.fract(), 0.0);
            }
        }

        #[test]
        fn prop_score_tracks_contacts(seed in any::<u64>(), hits in proptest::collection::vec(any::<bool>(), 0..8)) {
            let mut state = running(seed);
            let mut expected = state.score();
            for bonus in hits {
                let kind = if bonus { CollectibleKind::Bonus } else { CollectibleKind::Penalty };
                place_on_player(&mut state, kind, 0);
                state.world.step(SIM_DT);
                resolve_contacts(&mut state);
                expected += if bonus { 1 } else { -1 };
                prop_assert_eq!(state.score(), expected);
                separate(&mut state);
            }
        }

        #[test]
        fn prop_recycled_positions_stay_in_bounds(
            min_x in -20i32..0, span_x in 0i32..20, min_z in -30i32..-10, span_z in 0i32..10,
        ) {
            let mut state = running(77);
            state.tuning.recycle_bounds = SpawnBounds::new(min_x, min_x + span_x, min_z, min_z + span_z);
            for c in state.bonus.iter() {
                let p = state.world.position(c.body);
                state.world.set_position(c.body, Vec3::new(p.x, p.y, 10.0));
            }
            frame(&mut state, &FrameInput::default(), |_| {});
            for c in state.bonus.iter() {
                let p = state.world.position(c.body);
                prop_assert!(state.tuning.recycle_bounds.contains(p.x, p.z));
            }
        }
    }
}
