use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Reward earned by a move. Merges award the value of the produced tile.
pub type Reward = i32;

/// Sentinel reward for a move that leaves the board unchanged, or a placement
/// onto an occupied cell.
pub const ILLEGAL: Reward = -1;

/// Largest rank a cell can hold (tile 32768).
pub const MAX_RANK: u8 = 15;

/// A direction to slide/merge tiles.
///
/// Numeric codes follow the wire order `0=Up, 1=Right, 2=Down, 3=Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

struct Stores {
    slide_left: Box<[u16]>,
    slide_right: Box<[u16]>,
    reward_left: Box<[u32]>,
    reward_right: Box<[u32]>,
}

type BoardRaw = u64;
type Line = u16;

/// Packed 4x4 2048 board as 16 4-bit ranks in a `u64`.
///
/// Cell `i` (row-major, `0..16`) lives in bits `[4i, 4i + 4)`, so the board
/// whose cell `i` holds `i` is `0xfedc_ba98_7654_3210` ([`Board::IDENTITY`]).
///
/// ```text
///  0  1  2  3
///  4  5  6  7
///  8  9 10 11
/// 12 13 14 15
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Cell `i` holds rank `i`. Used to derive pattern isomorphisms.
    pub const IDENTITY: Board = Board(0xfedc_ba98_7654_3210);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from 16 ranks in cell order. Ranks are truncated to 4 bits.
    ///
    /// ```
    /// use tdl_2048::engine::Board;
    /// let b = Board::from_ranks([1, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// assert_eq!(b.at(2), 2);
    /// assert_eq!(b.ranks()[0], 1);
    /// ```
    pub fn from_ranks(ranks: [u8; 16]) -> Self {
        let raw = ranks
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &r)| acc | (((r & 0xf) as u64) << (4 * i)));
        Board(raw)
    }

    /// All 16 ranks in cell order.
    pub fn ranks(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.at(i);
        }
        out
    }

    /// Rank at cell `i` (0 means empty).
    #[inline]
    pub fn at(self, i: usize) -> u8 {
        debug_assert!(i < 16);
        ((self.0 >> (4 * i)) & 0xf) as u8
    }

    /// Overwrite the rank at cell `i`.
    #[inline]
    pub fn set(&mut self, i: usize, rank: u8) {
        debug_assert!(i < 16 && rank <= MAX_RANK);
        let shift = 4 * i;
        self.0 = (self.0 & !(0xf << shift)) | (((rank & 0xf) as u64) << shift);
    }

    /// Apply a slide in `dir` through the canonical left-slide.
    ///
    /// The board is normalized so that `dir` becomes "left", slid, then
    /// restored with the inverse transform. Returns the merge reward, or
    /// [`ILLEGAL`] when the board did not change (the board is then untouched).
    ///
    /// ```
    /// use tdl_2048::engine::{Board, Direction, ILLEGAL};
    /// let mut b = Board::from_ranks([1, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// assert_eq!(b.slide(Direction::Left), 4);
    /// assert_eq!(&b.ranks()[..4], &[2, 2, 0, 0]);
    /// let mut empty = Board::EMPTY;
    /// assert_eq!(empty.slide(Direction::Up), ILLEGAL);
    /// ```
    pub fn slide(&mut self, dir: Direction) -> Reward {
        match dir {
            Direction::Left => self.slide_left(),
            Direction::Right => {
                self.mirror();
                let reward = self.slide_left();
                self.mirror();
                reward
            }
            Direction::Up => {
                self.transpose();
                let reward = self.slide_left();
                self.transpose();
                reward
            }
            Direction::Down => {
                self.transpose();
                self.mirror();
                let reward = self.slide_left();
                self.mirror();
                self.transpose();
                reward
            }
        }
    }

    /// Slide every row toward column 0.
    pub fn slide_left(&mut self) -> Reward {
        let s = stores();
        let mut moved: BoardRaw = 0;
        let mut reward: u32 = 0;
        for row_idx in 0..4 {
            let row = extract_row(self.0, row_idx) as usize;
            moved |= (get_line_entry(&s.slide_left, row) as u64) << (16 * row_idx);
            reward += s.reward_left[row];
        }
        if moved == self.0 {
            return ILLEGAL;
        }
        self.0 = moved;
        reward as Reward
    }

    /// Per-direction slide straight from the row/column tables, without
    /// normalizing the board first. Returns the moved board and merge reward;
    /// an unchanged board means the move is illegal.
    pub fn shift(self, dir: Direction) -> (Board, u32) {
        match dir {
            Direction::Left | Direction::Right => shift_rows(self, dir),
            Direction::Up | Direction::Down => shift_cols(self, dir),
        }
    }

    /// Place `rank` on `position` if that cell is empty.
    ///
    /// Returns 0 on success and [`ILLEGAL`] (leaving the board untouched) when
    /// the cell is occupied, the position is off-board or the rank cannot be
    /// stored in a cell.
    pub fn place(&mut self, position: usize, rank: u8) -> Reward {
        if position >= 16 || rank > MAX_RANK || self.at(position) != 0 {
            return ILLEGAL;
        }
        self.set(position, rank);
        0
    }

    /// Swap rows and columns (reflect in the main diagonal).
    #[inline]
    pub fn transpose(&mut self) { self.0 = transpose(self.0); }

    /// Reflect horizontally: column `c` swaps with column `3 - c`.
    #[inline]
    pub fn mirror(&mut self) {
        let b = self.0;
        self.0 = ((b & 0x000f_000f_000f_000f) << 12)
            | ((b & 0x00f0_00f0_00f0_00f0) << 4)
            | ((b & 0x0f00_0f00_0f00_0f00) >> 4)
            | ((b & 0xf000_f000_f000_f000) >> 12);
    }

    /// Reflect vertically: row `r` swaps with row `3 - r`.
    #[inline]
    pub fn flip(&mut self) {
        let b = self.0;
        self.0 = ((b & 0x0000_0000_0000_ffff) << 48)
            | ((b & 0x0000_0000_ffff_0000) << 16)
            | ((b & 0x0000_ffff_0000_0000) >> 16)
            | ((b & 0xffff_0000_0000_0000) >> 48);
    }

    #[inline]
    pub fn rotate_clockwise(&mut self) {
        self.transpose();
        self.mirror();
    }

    #[inline]
    pub fn rotate_counterclockwise(&mut self) {
        self.transpose();
        self.flip();
    }

    /// Rotate by 180 degrees.
    #[inline]
    pub fn reverse(&mut self) {
        self.mirror();
        self.flip();
    }

    /// Rotate clockwise by `turns` quarter turns (negative turns rotate back).
    pub fn rotate(&mut self, turns: i32) {
        match turns.rem_euclid(4) {
            1 => self.rotate_clockwise(),
            2 => self.reverse(),
            3 => self.rotate_counterclockwise(),
            _ => {}
        }
    }

    /// Pure variant of [`Board::rotate`].
    #[inline]
    pub fn rotated(mut self, turns: i32) -> Board {
        self.rotate(turns);
        self
    }

    /// Pure variant of [`Board::mirror`].
    #[inline]
    pub fn mirrored(mut self) -> Board {
        self.mirror();
        self
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { 16 - count_non_empty(self.0) }

    /// Indices of empty cells in ascending order.
    pub fn empty_cells(self) -> Vec<usize> {
        (0..16).filter(|&i| self.at(i) == 0).collect()
    }

    /// Highest rank on the board.
    pub fn max_rank(self) -> u8 {
        (0..16).map(|i| self.at(i)).max().unwrap_or(0)
    }

    /// Return true if no slide in any direction changes the board.
    pub fn is_game_over(self) -> bool {
        Direction::ALL.iter().all(|&dir| self.shift(dir).0 == self)
    }
}

impl PartialOrd for Board {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// Lexicographic over the ranks of cells `0..16`.
impl Ord for Board {
    fn cmp(&self, other: &Self) -> Ordering { self.ranks().cmp(&other.ranks()) }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "+------------------------+")?;
        for row in 0..4 {
            write!(f, "|")?;
            for col in 0..4 {
                write!(f, "{}", format_val(self.at(4 * row + col)))?;
            }
            writeln!(f, "|")?;
        }
        writeln!(f, "+------------------------+")
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.raw() } }

/// Initialize the line tables ahead of first use. Safe to call multiple times.
pub fn warm() {
    let _ = stores();
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[inline]
fn extract_row(board: BoardRaw, row_idx: usize) -> Line {
    ((board >> (16 * row_idx)) & 0xffff) as Line
}

#[inline]
fn extract_col(board: BoardRaw, col_idx: usize) -> Line {
    (0..4).fold(0, |line, j| line | ((((board >> (4 * (4 * j + col_idx))) & 0xf) as Line) << (4 * j)))
}

#[inline]
fn scatter_col(line: Line, col_idx: usize) -> BoardRaw {
    (0..4).fold(0, |board, j| board | ((((line >> (4 * j)) & 0xf) as u64) << (4 * (4 * j + col_idx))))
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut slide_left = vec![0u16; LINE_TABLE_SIZE];
    let mut slide_right = vec![0u16; LINE_TABLE_SIZE];
    let mut reward_left = vec![0u32; LINE_TABLE_SIZE];
    let mut reward_right = vec![0u32; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let tiles = line_to_tiles(val as Line);
        let (left, r_left) = slide_tiles_left(tiles);
        slide_left[val] = tiles_to_line(left);
        reward_left[val] = r_left;

        let mut rev = tiles;
        rev.reverse();
        let (mut right, r_right) = slide_tiles_left(rev);
        right.reverse();
        slide_right[val] = tiles_to_line(right);
        reward_right[val] = r_right;
    }

    Stores {
        slide_left: slide_left.into_boxed_slice(),
        slide_right: slide_right.into_boxed_slice(),
        reward_left: reward_left.into_boxed_slice(),
        reward_right: reward_right.into_boxed_slice(),
    }
}

#[inline(always)]
fn get_line_entry(table: &[u16], idx: usize) -> u16 {
    debug_assert!(idx < LINE_TABLE_SIZE);
    table[idx]
}

fn shift_rows(board: Board, dir: Direction) -> (Board, u32) {
    let s = stores();
    let (table, rewards): (&[u16], &[u32]) = match dir {
        Direction::Left => (&s.slide_left, &s.reward_left),
        Direction::Right => (&s.slide_right, &s.reward_right),
        _ => unreachable!("shift_rows only handles horizontal moves"),
    };
    (0..4).fold((Board::EMPTY, 0), |(acc, reward), row_idx| {
        let row = extract_row(board.0, row_idx) as usize;
        let moved = (get_line_entry(table, row) as u64) << (16 * row_idx);
        (Board(acc.0 | moved), reward + rewards[row])
    })
}

fn shift_cols(board: Board, dir: Direction) -> (Board, u32) {
    let s = stores();
    // Column lines keep row 0 in the low nibble, so "up" reuses the left table.
    let (table, rewards): (&[u16], &[u32]) = match dir {
        Direction::Up => (&s.slide_left, &s.reward_left),
        Direction::Down => (&s.slide_right, &s.reward_right),
        _ => unreachable!("shift_cols only handles vertical moves"),
    };
    (0..4).fold((Board::EMPTY, 0), |(acc, reward), col_idx| {
        let col = extract_col(board.0, col_idx) as usize;
        let moved = scatter_col(get_line_entry(table, col), col_idx);
        (Board(acc.0 | moved), reward + rewards[col])
    })
}

fn line_to_tiles(line: Line) -> [u8; 4] {
    [
        (line & 0xf) as u8,
        ((line >> 4) & 0xf) as u8,
        ((line >> 8) & 0xf) as u8,
        ((line >> 12) & 0xf) as u8,
    ]
}

fn tiles_to_line(tiles: [u8; 4]) -> Line {
    tiles[0] as Line | (tiles[1] as Line) << 4 | (tiles[2] as Line) << 8 | (tiles[3] as Line) << 12
}

/// Slide one line toward index 0, merging each pair at most once.
/// Two [`MAX_RANK`] tiles never merge.
fn slide_tiles_left(tiles: [u8; 4]) -> ([u8; 4], u32) {
    let mut out = [0u8; 4];
    let mut len = 0;
    let mut hold = 0u8;
    let mut reward = 0u32;
    for &tile in tiles.iter().filter(|&&t| t != 0) {
        if hold == tile && tile < MAX_RANK {
            out[len] = tile + 1;
            len += 1;
            reward += 1 << (tile + 1);
            hold = 0;
        } else {
            if hold != 0 {
                out[len] = hold;
                len += 1;
            }
            hold = tile;
        }
    }
    if hold != 0 {
        out[len] = hold;
    }
    (out, reward)
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(board: BoardRaw) -> u32 {
    let mut board_copy = board;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones()
}

fn format_val(rank: u8) -> String {
    match rank {
        0 => String::from("      "),
        r => format!("{:>6}", 1u32 << r),
    }
}
