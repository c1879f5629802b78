//! Actions that change a board: a player's slide or the environment's tile placement.
//!
//! Besides the enum itself this module owns the two boundary encodings used by
//! external drivers:
//! - a packed `u32` code (type tag in the top byte, payload below), and
//! - a two-character text code: `#U #R #D #L` for slides, `<pos><tile>` in
//!   base 36 for placements (e.g. `5A` places rank 10 on cell 5).
//!
//! Decoding either form never coerces bad input; it returns [`ActionError`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::{Board, Direction, Reward};

const SLIDE_TAG: u32 = (b's' as u32) << 24;
const PLACE_TAG: u32 = (b'p' as u32) << 24;
const TAG_MASK: u32 = 0xff00_0000;

/// Exclusive upper bound for a placement's tile rank.
pub const TILE_LIMIT: u8 = 36;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SLIDE_CHARS: &[u8; 4] = b"URDL";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown action tag {0:#010x}")]
    UnknownTag(u32),
    #[error("slide opcode {0} out of range")]
    SlideOpcode(u32),
    #[error("placement position {0} out of range")]
    Position(u32),
    #[error("placement tile {0} out of range")]
    Tile(u32),
    #[error("malformed action code {0:?}")]
    Malformed(String),
}

/// Which agent role an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Slide,
    Place,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Slide(Direction),
    /// `position` in `0..16`, `tile` rank in `0..36`.
    Place { position: u8, tile: u8 },
}

impl Action {
    #[inline]
    pub fn slide(dir: Direction) -> Self { Action::Slide(dir) }

    /// Checked constructor for a placement.
    pub fn place(position: u8, tile: u8) -> Result<Self, ActionError> {
        if position >= 16 {
            return Err(ActionError::Position(position as u32));
        }
        if tile >= TILE_LIMIT {
            return Err(ActionError::Tile(tile as u32));
        }
        Ok(Action::Place { position, tile })
    }

    #[inline]
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Slide(_) => ActionKind::Slide,
            Action::Place { .. } => ActionKind::Place,
        }
    }

    /// Apply to `board`, returning the reward or [`crate::engine::ILLEGAL`].
    ///
    /// ```
    /// use tdl_2048::action::Action;
    /// use tdl_2048::engine::{Board, ILLEGAL};
    /// let mut b = Board::EMPTY;
    /// let put = Action::place(3, 1).unwrap();
    /// assert_eq!(put.apply(&mut b), 0);
    /// assert_eq!(put.apply(&mut b), ILLEGAL);
    /// ```
    pub fn apply(&self, board: &mut Board) -> Reward {
        match *self {
            Action::Slide(dir) => board.slide(dir),
            Action::Place { position, tile } => board.place(position as usize, tile),
        }
    }

    /// Human readable description.
    pub fn name(&self) -> String {
        match *self {
            Action::Slide(dir) => format!("slide {}", format!("{dir:?}").to_lowercase()),
            Action::Place { position, tile } => format!("place {tile}-index at position {position}"),
        }
    }

    /// Packed code: tag byte (`'s'` or `'p'`) in bits 24..32, payload below.
    pub fn code(&self) -> u32 {
        match *self {
            Action::Slide(dir) => SLIDE_TAG | dir.code() as u32,
            Action::Place { position, tile } => PLACE_TAG | (position as u32 & 0x0f) | ((tile as u32) << 4),
        }
    }
}

impl TryFrom<u32> for Action {
    type Error = ActionError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        let event = code & !TAG_MASK;
        match code & TAG_MASK {
            SLIDE_TAG => Direction::from_code(event as u8)
                .filter(|_| event < 4)
                .map(Action::Slide)
                .ok_or(ActionError::SlideOpcode(event)),
            PLACE_TAG => {
                let tile = event >> 4;
                if tile >= TILE_LIMIT as u32 {
                    return Err(ActionError::Tile(tile));
                }
                Action::place((event & 0x0f) as u8, tile as u8)
            }
            tag => Err(ActionError::UnknownTag(tag)),
        }
    }
}

impl From<Action> for u32 {
    fn from(a: Action) -> Self { a.code() }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Action::Slide(dir) => write!(f, "#{}", SLIDE_CHARS[dir.code() as usize] as char),
            Action::Place { position, tile } => write!(
                f,
                "{}{}",
                BASE36[position as usize] as char,
                BASE36[tile as usize] as char
            ),
        }
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        let malformed = || ActionError::Malformed(s.to_string());
        if bytes.len() != 2 {
            return Err(malformed());
        }
        let (a, b) = (bytes[0].to_ascii_uppercase(), bytes[1].to_ascii_uppercase());
        if a == b'#' {
            let op = SLIDE_CHARS.iter().position(|&c| c == b).ok_or_else(malformed)?;
            return Direction::from_code(op as u8).map(Action::Slide).ok_or_else(malformed);
        }
        let position = BASE36[..16].iter().position(|&c| c == a).ok_or_else(malformed)?;
        let tile = BASE36.iter().position(|&c| c == b).ok_or_else(malformed)?;
        Action::place(position as u8, tile as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ILLEGAL;

    #[test]
    fn text_codes_round_trip() {
        for dir in Direction::ALL {
            let a = Action::slide(dir);
            assert_eq!(a.to_string().parse::<Action>(), Ok(a));
        }
        let p = Action::place(15, 35).unwrap();
        assert_eq!(p.to_string(), "FZ");
        assert_eq!("FZ".parse::<Action>(), Ok(p));
        assert_eq!("#L".parse::<Action>(), Ok(Action::Slide(Direction::Left)));
        assert_eq!("a1".parse::<Action>(), Ok(Action::Place { position: 10, tile: 1 }));
    }

    #[test]
    fn malformed_text_is_rejected() {
        for bad in ["", "#", "#X", "G1", "1?", "#UU", "??"] {
            assert!(bad.parse::<Action>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn packed_codes_decode_or_error() {
        let slide = Action::Slide(Direction::Down);
        assert_eq!(Action::try_from(slide.code()), Ok(slide));
        let place = Action::place(7, 2).unwrap();
        assert_eq!(Action::try_from(u32::from(place)), Ok(place));

        assert_eq!(Action::try_from(SLIDE_TAG | 4), Err(ActionError::SlideOpcode(4)));
        assert_eq!(Action::try_from(SLIDE_TAG | 0x100), Err(ActionError::SlideOpcode(0x100)));
        assert_eq!(Action::try_from(PLACE_TAG | (36 << 4)), Err(ActionError::Tile(36)));
        assert_eq!(Action::try_from(u32::MAX), Err(ActionError::UnknownTag(0xff00_0000)));
        assert_eq!(Action::try_from(0), Err(ActionError::UnknownTag(0)));
    }

    #[test]
    fn checked_place_constructor() {
        assert_eq!(Action::place(16, 1), Err(ActionError::Position(16)));
        assert_eq!(Action::place(0, 36), Err(ActionError::Tile(36)));
    }

    #[test]
    fn occupied_placement_is_illegal_and_board_unmodified() {
        let mut b = Board::from_ranks([3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let before = b;
        let a = Action::place(0, 1).unwrap();
        assert_eq!(a.apply(&mut b), ILLEGAL);
        assert_eq!(b, before);
    }

    #[test]
    fn oversized_tile_cannot_be_placed() {
        let mut b = Board::EMPTY;
        assert_eq!(Action::place(0, 20).unwrap().apply(&mut b), ILLEGAL);
        assert_eq!(b, Board::EMPTY);
    }

    #[test]
    fn names_and_kinds() {
        assert_eq!(Action::Slide(Direction::Up).name(), "slide up");
        assert_eq!(Action::place(4, 1).unwrap().name(), "place 1-index at position 4");
        assert_eq!(Action::Slide(Direction::Up).kind(), ActionKind::Slide);
        assert_eq!(Action::place(4, 1).unwrap().kind(), ActionKind::Place);
    }
}
