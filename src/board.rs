//! Board model: tiles, the 6×6 grid, and the tile factory / randomizer.

use crate::matcher;

/// Board edge length. The whole game is balanced around 6×6 with 6 symbols.
pub const BOARD_SIZE: usize = 6;

/// Number of symbols in every level palette.
pub const SYMBOL_COUNT: u8 = 6;

/// Rejection-sampling retry cap for board generation. A random 6-symbol 6×6
/// board is run-free within a handful of attempts; exhausting this many means
/// the generator or detector is broken.
const GENERATION_RETRY_CAP: u32 = 1_000;

/// Palette symbol index (0..6). Display name and colour come from the level
/// palette and theme; the engine only compares indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub u8);

/// Special destruction behaviour carried by a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusKind {
    /// Detonates a 3×3 neighbourhood around itself.
    Bomb,
    /// Clears every tile sharing the symbol of the tile it was swapped with.
    SuperBomb,
}

/// One tile on the board. Position is owned by the board; the tile only
/// carries identity and gameplay attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub id: u32,
    pub symbol: Symbol,
    pub bonus: Option<BonusKind>,
    pub matched: bool,
    /// Rows fallen in the last compaction/refill. Animation timing only.
    pub fall_distance: u8,
}

impl Tile {
    pub fn new(id: u32, symbol: Symbol) -> Self {
        Self {
            id,
            symbol,
            bonus: None,
            matched: false,
            fall_distance: 0,
        }
    }
}

/// 6×6 grid of cells. A cell is `None` only transiently between the Removing
/// and Refilling phases of a cascade; every settled board is fully populated.
/// Stored column-major so per-column compaction walks contiguous cells.
#[derive(Debug, Clone)]
pub struct Board {
    cells: Vec<Option<Tile>>,
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: vec![None; BOARD_SIZE * BOARD_SIZE],
        }
    }

    #[inline]
    fn idx(x: usize, y: usize) -> usize {
        x * BOARD_SIZE + y
    }

    /// Callers pass validated coordinates; out-of-range is a programmer error.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&Tile> {
        self.cells[Self::idx(x, y)].as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Tile> {
        self.cells[Self::idx(x, y)].as_mut()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, tile: Option<Tile>) {
        self.cells[Self::idx(x, y)] = tile;
    }

    #[inline]
    pub fn take(&mut self, x: usize, y: usize) -> Option<Tile> {
        self.cells[Self::idx(x, y)].take()
    }

    /// Pure cell exchange, no validation.
    pub fn swap(&mut self, a: (usize, usize), b: (usize, usize)) {
        let ia = Self::idx(a.0, a.1);
        let ib = Self::idx(b.0, b.1);
        self.cells.swap(ia, ib);
    }

    pub fn symbol_at(&self, x: usize, y: usize) -> Option<Symbol> {
        self.get(x, y).map(|t| t.symbol)
    }

    /// Visit every cell as `(x, y, tile)`.
    pub fn for_each_cell<F: FnMut(usize, usize, Option<&Tile>)>(&self, mut f: F) {
        for x in 0..BOARD_SIZE {
            for y in 0..BOARD_SIZE {
                f(x, y, self.get(x, y));
            }
        }
    }

    /// Coordinates of every tile carrying a bonus kind.
    pub fn bonus_positions(&self) -> Vec<(usize, usize, Symbol, BonusKind)> {
        let mut out = Vec::new();
        self.for_each_cell(|x, y, tile| {
            if let Some(t) = tile {
                if let Some(kind) = t.bonus {
                    out.push((x, y, t.symbol, kind));
                }
            }
        });
        out
    }

    /// True if every cell holds a tile (settled state).
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}

/// Seedable xorshift64 PRNG. Deterministic so boards are reproducible under
/// a `--seed` and in tests.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Random number in `[0, upper_bound)`.
    pub fn next_int(&mut self, upper_bound: u32) -> u32 {
        (self.next_u64() % u64::from(upper_bound)) as u32
    }
}

/// Produces tiles with uniformly random symbols and fresh ids.
#[derive(Debug, Clone)]
pub struct TileFactory {
    rng: Rng,
    next_id: u32,
}

impl TileFactory {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rng::new(seed),
            next_id: 0,
        }
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Uniformly random tile from the 6-symbol palette.
    pub fn random_tile(&mut self) -> Tile {
        let symbol = Symbol(self.rng.next_int(u32::from(SYMBOL_COUNT)) as u8);
        Tile::new(self.fresh_id(), symbol)
    }

    /// Tile seeded with a specific symbol and bonus kind (special-piece refill).
    pub fn bonus_tile(&mut self, symbol: Symbol, kind: BonusKind) -> Tile {
        let mut tile = Tile::new(self.fresh_id(), symbol);
        tile.bonus = Some(kind);
        tile
    }

    /// Full board via rejection sampling: regenerate until no run of 3+
    /// exists anywhere. `keep_bonuses` re-seeds surviving bonus tiles at
    /// their coordinates before the run check (shuffle booster contract).
    ///
    /// Panics when the retry cap is exhausted — with 6 symbols on a 6×6 grid
    /// that means the generator or detector is broken, not bad luck.
    pub fn build_board(&mut self, keep_bonuses: &[(usize, usize, Symbol, BonusKind)]) -> Board {
        for _ in 0..GENERATION_RETRY_CAP {
            let mut board = Board::empty();
            for x in 0..BOARD_SIZE {
                for y in 0..BOARD_SIZE {
                    board.set(x, y, Some(self.random_tile()));
                }
            }
            for &(x, y, symbol, kind) in keep_bonuses {
                board.set(x, y, Some(self.bonus_tile(symbol, kind)));
            }
            if !matcher::has_any_run3(&board) {
                return board;
            }
        }
        panic!("board generation failed to produce a run-free board in {GENERATION_RETRY_CAP} attempts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_deterministic() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_int(6), b.next_int(6));
        }
    }

    #[test]
    fn generated_boards_are_run_free() {
        for seed in 1..=20u64 {
            let mut factory = TileFactory::new(seed);
            let board = factory.build_board(&[]);
            assert!(board.is_full());
            assert!(!matcher::has_any_run3(&board), "seed {seed} produced a run");
        }
    }

    #[test]
    fn swap_exchanges_cells() {
        let mut factory = TileFactory::new(7);
        let mut board = factory.build_board(&[]);
        let a = *board.get(0, 0).unwrap();
        let b = *board.get(1, 0).unwrap();
        board.swap((0, 0), (1, 0));
        assert_eq!(board.get(0, 0).unwrap().id, b.id);
        assert_eq!(board.get(1, 0).unwrap().id, a.id);
    }

    #[test]
    fn build_board_reseeds_bonuses() {
        let mut factory = TileFactory::new(3);
        let keep = [(2, 4, Symbol(1), BonusKind::Bomb)];
        let board = factory.build_board(&keep);
        let tile = board.get(2, 4).unwrap();
        assert_eq!(tile.symbol, Symbol(1));
        assert_eq!(tile.bonus, Some(BonusKind::Bomb));
    }

    #[test]
    fn random_symbols_roughly_uniform() {
        // Statistical uniformity: over many draws every symbol should land
        // near 1/6 of the total. Loose bounds keep this robust to the seed.
        let mut factory = TileFactory::new(99);
        let mut counts = [0u32; SYMBOL_COUNT as usize];
        let draws = 60_000;
        for _ in 0..draws {
            counts[factory.random_tile().symbol.0 as usize] += 1;
        }
        let expected = draws / u32::from(SYMBOL_COUNT);
        for (i, &c) in counts.iter().enumerate() {
            assert!(
                c > expected * 9 / 10 && c < expected * 11 / 10,
                "symbol {i} count {c} far from expected {expected}"
            );
        }
    }
}
