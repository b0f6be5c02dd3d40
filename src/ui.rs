//! HUD text and page toggling
//!
//! The page owns the elements; we only swap text and the `hide` class.

use crate::sim::{GamePhase, GameState};

/// Text shown in the terminal state
pub const GAME_OVER_TEXT: &str = "GAME OVER";

/// Element ids in `index.html`
pub mod ids {
    pub const POINTS: &str = "points";
    pub const START_BUTTON: &str = "startButton";
    pub const START_PAGE: &str = "startPage";
    pub const GAME_UI: &str = "ui";
    pub const CANVAS: &str = "canvas";
}

/// Class that hides an element
pub const HIDE_CLASS: &str = "hide";

/// What the points element should read
pub fn hud_text(state: &GameState) -> String {
    match state.phase() {
        GamePhase::GameOver => GAME_OVER_TEXT.to_string(),
        GamePhase::NotStarted | GamePhase::Running => state.score().to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
pub mod dom {
    use super::{HIDE_CLASS, ids};

    fn element(id: &str) -> Option<web_sys::Element> {
        web_sys::window()?.document()?.get_element_by_id(id)
    }

    /// Write the points text, skipping the DOM write when unchanged
    pub fn set_points_text(text: &str) {
        if let Some(el) = element(ids::POINTS) {
            if el.text_content().as_deref() != Some(text) {
                el.set_text_content(Some(text));
            }
        }
    }

    /// Hide the start page and reveal the in-game UI
    pub fn show_game_ui() {
        if let Some(el) = element(ids::START_PAGE) {
            let _ = el.class_list().add_1(HIDE_CLASS);
        }
        if let Some(el) = element(ids::GAME_UI) {
            let _ = el.class_list().remove_1(HIDE_CLASS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Action, FrameInput, apply_action, frame};

    #[test]
    fn test_text_follows_score_while_running() {
        let mut state = GameState::new(1);
        assert_eq!(hud_text(&state), "5");
        state.start();
        state.apply_bonus();
        assert_eq!(hud_text(&state), "6");
        state.apply_penalty();
        state.apply_penalty();
        assert_eq!(hud_text(&state), "4");
    }

    #[test]
    fn test_game_over_then_restart_text() {
        let mut state = GameState::new(2);
        state.start();
        for _ in 0..5 {
            state.apply_penalty();
        }
        assert_eq!(hud_text(&state), "0");
        frame(&mut state, &FrameInput::default(), |_| {});
        assert_eq!(hud_text(&state), GAME_OVER_TEXT);

        apply_action(&mut state, Action::Restart);
        assert_eq!(hud_text(&state), "5");
    }
}
