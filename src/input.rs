//! Key bindings: normal and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Direction for cursor movement and swipe-swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Left,
    Right,
    Up,
    Down,
}

impl Dir {
    /// Apply to a board coordinate, clamped to `0..size` on each axis.
    pub fn applied_to(self, (x, y): (usize, usize), size: usize) -> (usize, usize) {
        match self {
            Self::Left => (x.saturating_sub(1), y),
            Self::Right => ((x + 1).min(size - 1), y),
            Self::Up => (x, y.saturating_sub(1)),
            Self::Down => (x, (y + 1).min(size - 1)),
        }
    }
}

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(Dir),
    /// Select the cursor tile (or swap with the prior selection).
    Select,
    /// Swipe gesture: swap the cursor tile with its neighbour.
    Swap(Dir),
    Shuffle,
    Bomb,
    ExtraTime,
    Pause,
    Quit,
    None,
}

/// Map key event to game action. Supports both normal (arrows, space,
/// shift+arrows to swap) and vim (hjkl / HJKL).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    let shifted = modifiers == KeyModifiers::SHIFT;
    match code {
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('p') | KeyCode::Char(' ') if modifiers == KeyModifiers::CONTROL => {
            Action::Pause
        }
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Left if shifted => Action::Swap(Dir::Left),
        KeyCode::Right if shifted => Action::Swap(Dir::Right),
        KeyCode::Up if shifted => Action::Swap(Dir::Up),
        KeyCode::Down if shifted => Action::Swap(Dir::Down),
        KeyCode::Char('H') => Action::Swap(Dir::Left),
        KeyCode::Char('L') => Action::Swap(Dir::Right),
        KeyCode::Char('K') => Action::Swap(Dir::Up),
        KeyCode::Char('J') => Action::Swap(Dir::Down),
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::Move(Dir::Left),
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::Move(Dir::Right),
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::Move(Dir::Up),
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::Move(Dir::Down),
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Select,
        KeyCode::Char('1') if no_mod => Action::Shuffle,
        KeyCode::Char('2') if no_mod => Action::Bomb,
        KeyCode::Char('3') if no_mod => Action::ExtraTime,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    #[test]
    fn shift_arrow_swaps() {
        let key = KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT);
        assert_eq!(key_to_action(key), Action::Swap(Dir::Left));
    }

    #[test]
    fn dir_clamps_at_edges() {
        assert_eq!(Dir::Left.applied_to((0, 3), 6), (0, 3));
        assert_eq!(Dir::Right.applied_to((5, 3), 6), (5, 3));
        assert_eq!(Dir::Down.applied_to((2, 5), 6), (2, 5));
        assert_eq!(Dir::Up.applied_to((2, 0), 6), (2, 0));
    }
}
