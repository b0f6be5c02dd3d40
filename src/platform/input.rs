//! Keyboard mapping
//!
//! Keys are matched on `KeyboardEvent.key` values. Every key-down maps to at
//! most one command and there is no debouncing: auto-repeat repeats the effect.

use crate::sim::Action;

/// A command produced by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Goes to the simulation
    Game(Action),
    /// Handled by the shell: flip the mute setting
    ToggleMute,
}

pub fn command_for_key(key: &str) -> Option<Command> {
    let command = match key {
        "d" | "D" | "ArrowRight" => Command::Game(Action::MoveRight),
        "a" | "A" | "ArrowLeft" => Command::Game(Action::MoveLeft),
        " " => Command::Game(Action::Jump),
        "r" | "R" => Command::Game(Action::Restart),
        "m" | "M" => Command::ToggleMute,
        _ => return None,
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_keys() {
        for key in ["d", "D", "ArrowRight"] {
            assert_eq!(command_for_key(key), Some(Command::Game(Action::MoveRight)));
        }
        for key in ["a", "A", "ArrowLeft"] {
            assert_eq!(command_for_key(key), Some(Command::Game(Action::MoveLeft)));
        }
    }

    #[test]
    fn test_jump_restart_and_mute() {
        assert_eq!(command_for_key(" "), Some(Command::Game(Action::Jump)));
        assert_eq!(command_for_key("r"), Some(Command::Game(Action::Restart)));
        assert_eq!(command_for_key("R"), Some(Command::Game(Action::Restart)));
        assert_eq!(command_for_key("M"), Some(Command::ToggleMute));
    }

    #[test]
    fn test_unmapped_keys_ignored() {
        for key in ["Space", "w", "ArrowUp", "Enter", ""] {
            assert_eq!(command_for_key(key), None);
        }
    }
}
