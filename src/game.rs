//! Engine: swap validation, cascade resolver state machine, boosters, combo.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::board::{BOARD_SIZE, Board, BonusKind, TileFactory};
use crate::matcher::{self, MatchScan};

/// Base score per removed tile, before the combo multiplier.
pub const POINTS_PER_TILE: u32 = 10;

/// Combo step per resolved match batch.
const COMBO_STEP: f32 = 0.5;
/// Combo multiplier cap.
pub const COMBO_CAP: f32 = 4.0;
/// The multiplier resets when this long passes without a new match batch.
pub const COMBO_WINDOW: Duration = Duration::from_secs(3);

/// Defensive cascade cap. Chains terminate naturally; hitting this means the
/// detector or resolver is broken.
const MAX_CASCADE_CYCLES: u32 = 64;

/// Structured events for the host layer, drained once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Combo-multiplied points, one per resolved batch.
    ScoreDelta(u32),
    MatchResolved {
        cells: Vec<(usize, usize)>,
        points: u32,
    },
    BonusCreated {
        x: usize,
        y: usize,
        kind: BonusKind,
    },
    BonusActivated {
        kind: BonusKind,
        removed: usize,
    },
    BoardShuffled,
}

/// Resolver phase. `Idle` is the only state accepting player input.
#[derive(Debug, Clone)]
enum Phase {
    Idle,
    /// Scan the settled board; decides between Removing and Reverting.
    Matching,
    /// Marked cells are scored and removed; bonus spawns are seeded in place.
    Removing(MatchScan),
    Falling,
    Refilling,
    Rescanning,
    /// Matchless swap: restore the prior positions after one observation step.
    Reverting((usize, usize), (usize, usize)),
}

/// The match-cascade engine. Board, selection, resolver phase and combo are
/// explicit state, mutated only through the methods below; presentation is
/// driven by the drained event queue.
pub struct Engine {
    board: Board,
    factory: TileFactory,
    level: u32,
    selected: Option<(usize, usize)>,
    phase: Phase,
    /// Set when a swap lands on the board; consumed on the first match scan.
    pending_revert: Option<((usize, usize), (usize, usize))>,
    combo: f32,
    combo_deadline: Option<Instant>,
    cycles: u32,
    score: u32,
    events: Vec<EngineEvent>,
}

fn in_bounds(p: (usize, usize)) -> bool {
    p.0 < BOARD_SIZE && p.1 < BOARD_SIZE
}

fn adjacent(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1) == 1
}

impl Engine {
    pub fn new(level: u32, seed: u64) -> Self {
        let mut factory = TileFactory::new(seed ^ u64::from(level).wrapping_mul(0x9E37_79B9));
        let board = factory.build_board(&[]);
        Self {
            board,
            factory,
            level,
            selected: None,
            phase: Phase::Idle,
            pending_revert: None,
            combo: 1.0,
            combo_deadline: None,
            cycles: 0,
            score: 0,
            events: Vec::new(),
        }
    }

    #[cfg(test)]
    fn with_board(board: Board, seed: u64) -> Self {
        let mut engine = Self::new(1, seed);
        engine.board = board;
        engine
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn selected(&self) -> Option<(usize, usize)> {
        self.selected
    }

    pub fn combo(&self) -> f32 {
        self.combo
    }

    /// Fraction of the combo window still remaining (sidebar gauge).
    pub fn combo_ratio(&self, now: Instant) -> f64 {
        self.combo_deadline.map_or(0.0, |deadline| {
            let left = deadline.saturating_duration_since(now).as_secs_f64();
            (left / COMBO_WINDOW.as_secs_f64()).min(1.0)
        })
    }

    /// True while a resolution sequence is in flight; player input is
    /// ignored until the resolver returns to `Idle`.
    pub fn processing(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fresh board and round state for a level.
    pub fn set_level(&mut self, level: u32) {
        self.level = level;
        self.board = self.factory.build_board(&[]);
        self.selected = None;
        self.phase = Phase::Idle;
        self.pending_revert = None;
        self.combo = 1.0;
        self.combo_deadline = None;
        self.score = 0;
        self.events.clear();
    }

    /// Real-time upkeep independent of the resolver: combo decay.
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.combo_deadline {
            if now >= deadline {
                self.combo = 1.0;
                self.combo_deadline = None;
            }
        }
    }

    /// Click-select gesture: first click selects, clicking the selection
    /// deselects, a second click elsewhere attempts the swap and always
    /// clears the selection.
    pub fn select_tile(&mut self, x: usize, y: usize, now: Instant) {
        if self.processing() || !in_bounds((x, y)) {
            return;
        }
        match self.selected.take() {
            None => self.selected = Some((x, y)),
            Some(sel) if sel == (x, y) => {}
            Some(sel) => {
                self.request_swap(sel, (x, y), now);
            }
        }
    }

    /// Swap request (click-adjacent or swipe). Returns true when accepted.
    ///
    /// Rejected while processing, for a == b, and for non-adjacent cells,
    /// unless either tile carries a bonus kind: a bonus swap activates
    /// destruction instead and bypasses the adjacency/match requirement.
    pub fn request_swap(&mut self, a: (usize, usize), b: (usize, usize), now: Instant) -> bool {
        if self.processing() || a == b || !in_bounds(a) || !in_bounds(b) {
            return false;
        }
        let bonus_involved = self.board.get(a.0, a.1).is_some_and(|t| t.bonus.is_some())
            || self.board.get(b.0, b.1).is_some_and(|t| t.bonus.is_some());
        if bonus_involved {
            self.activate_bonuses(a, b, now);
            return true;
        }
        if !adjacent(a, b) {
            return false;
        }
        self.board.swap(a, b);
        self.pending_revert = Some((a, b));
        self.cycles = 0;
        self.phase = Phase::Matching;
        true
    }

    /// Bomb booster: destroy the edge-clipped 3×3 around the target, score
    /// it, then fall/refill/rescan like any other batch. The host checks and
    /// decrements the inventory before calling this.
    pub fn bomb_at(&mut self, x: usize, y: usize, now: Instant) {
        if self.processing() || !in_bounds((x, y)) {
            return;
        }
        let cells = neighbourhood_3x3(x, y);
        self.events.push(EngineEvent::BonusActivated {
            kind: BonusKind::Bomb,
            removed: cells.len(),
        });
        self.destroy_cells(&cells, now);
    }

    /// Shuffle booster: regenerate via rejection sampling, preserving the
    /// symbol and bonus kind of every bonus tile at its coordinate.
    pub fn reshuffle(&mut self) {
        if self.processing() {
            return;
        }
        let keep = self.board.bonus_positions();
        self.board = self.factory.build_board(&keep);
        self.selected = None;
        self.events.push(EngineEvent::BoardShuffled);
    }

    /// Advance the resolver one phase. The app steps this on a fixed cadence
    /// so removal/fall/refill stay visible; `run_to_idle` collapses the
    /// pacing when animation is off.
    pub fn step(&mut self, now: Instant) {
        self.tick(now);
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {}
            Phase::Matching => {
                let scan = matcher::find_matches(&self.board);
                if scan.is_empty() {
                    if let Some((a, b)) = self.pending_revert.take() {
                        self.phase = Phase::Reverting(a, b);
                    }
                } else {
                    self.pending_revert = None;
                    self.mark_matched(&scan);
                    self.phase = Phase::Removing(scan);
                }
            }
            Phase::Removing(scan) => {
                self.resolve_removal(&scan, now);
                self.phase = Phase::Falling;
            }
            Phase::Falling => {
                self.apply_gravity();
                self.phase = Phase::Refilling;
            }
            Phase::Refilling => {
                self.refill();
                self.phase = Phase::Rescanning;
            }
            Phase::Rescanning => {
                self.cycles += 1;
                assert!(
                    self.cycles < MAX_CASCADE_CYCLES,
                    "cascade failed to reach a stable board"
                );
                let scan = matcher::find_matches(&self.board);
                if scan.is_empty() {
                    self.finish_resolution();
                } else {
                    self.mark_matched(&scan);
                    self.phase = Phase::Removing(scan);
                }
            }
            Phase::Reverting(a, b) => {
                self.board.swap(a, b);
            }
        }
    }

    /// Run the resolver to completion (no-animation mode and tests).
    pub fn run_to_idle(&mut self, now: Instant) {
        while self.processing() {
            self.step(now);
        }
    }

    fn finish_resolution(&self) {
        debug_assert!(self.board.is_full());
        debug_assert!(!matcher::has_any_run3(&self.board));
    }

    fn mark_matched(&mut self, scan: &MatchScan) {
        for (x, y) in scan.removal_set() {
            if let Some(tile) = self.board.get_mut(x, y) {
                tile.matched = true;
            }
        }
    }

    /// The Removing phase: one score event per cycle, then clear the union of
    /// matched and line-match cells. Bonus spawns take the place of their
    /// matched tile so they fall through compaction like ordinary tiles and
    /// are skipped by the random refill.
    fn resolve_removal(&mut self, scan: &MatchScan, now: Instant) {
        let removal = scan.removal_set();
        let points = self.batch_points(removal.len());
        self.score += points;
        let mut cells: Vec<(usize, usize)> = removal.iter().copied().collect();
        cells.sort_unstable();
        self.events.push(EngineEvent::ScoreDelta(points));
        self.events.push(EngineEvent::MatchResolved { cells, points });
        self.bump_combo(now);

        for &(x, y) in &removal {
            self.board.take(x, y);
        }
        for spawn in &scan.bonus_spawns {
            let tile = self.factory.bonus_tile(spawn.symbol, spawn.kind);
            self.board.set(spawn.x, spawn.y, Some(tile));
            self.events.push(EngineEvent::BonusCreated {
                x: spawn.x,
                y: spawn.y,
                kind: spawn.kind,
            });
        }
    }

    /// Out-of-band destruction (boosters, bonus activation): score the batch
    /// and enter the Falling phase directly.
    fn destroy_cells(&mut self, cells: &HashSet<(usize, usize)>, now: Instant) {
        let points = self.batch_points(cells.len());
        self.score += points;
        let mut sorted: Vec<(usize, usize)> = cells.iter().copied().collect();
        sorted.sort_unstable();
        self.events.push(EngineEvent::ScoreDelta(points));
        self.events.push(EngineEvent::MatchResolved {
            cells: sorted,
            points,
        });
        self.bump_combo(now);

        for &(x, y) in cells {
            self.board.take(x, y);
        }
        self.cycles = 0;
        self.phase = Phase::Falling;
    }

    fn batch_points(&self, removed: usize) -> u32 {
        (removed as f32 * POINTS_PER_TILE as f32 * self.combo).floor() as u32
    }

    fn bump_combo(&mut self, now: Instant) {
        self.combo = (self.combo + COMBO_STEP).min(COMBO_CAP);
        self.combo_deadline = Some(now + COMBO_WINDOW);
    }

    /// Swapping onto a bonus tile activates it instead of the revert-checked
    /// swap. Destruction sets from both tiles of the pair are unioned by
    /// coordinate; the pair cells themselves are always included.
    fn activate_bonuses(&mut self, a: (usize, usize), b: (usize, usize), now: Instant) {
        let mut cells: HashSet<(usize, usize)> = [a, b].into_iter().collect();
        for (pos, partner) in [(a, b), (b, a)] {
            let Some(kind) = self.board.get(pos.0, pos.1).and_then(|t| t.bonus) else {
                continue;
            };
            let set = match kind {
                BonusKind::Bomb => neighbourhood_3x3(pos.0, pos.1),
                // The partner's symbol is the destruction filter, not the
                // super bomb's own (see DESIGN.md).
                BonusKind::SuperBomb => {
                    let mut set = HashSet::new();
                    if let Some(symbol) = self.board.symbol_at(partner.0, partner.1) {
                        self.board.for_each_cell(|x, y, tile| {
                            if tile.is_some_and(|t| t.symbol == symbol) {
                                set.insert((x, y));
                            }
                        });
                    }
                    set.insert(pos);
                    set
                }
            };
            self.events.push(EngineEvent::BonusActivated {
                kind,
                removed: set.len(),
            });
            cells.extend(set);
        }
        self.selected = None;
        self.destroy_cells(&cells, now);
    }

    /// Per-column stable compaction: surviving tiles keep their relative
    /// order and record how far they fell (animation only).
    fn apply_gravity(&mut self) {
        for x in 0..BOARD_SIZE {
            let mut write = BOARD_SIZE;
            for y in (0..BOARD_SIZE).rev() {
                if let Some(mut tile) = self.board.take(x, y) {
                    write -= 1;
                    tile.fall_distance = (write - y) as u8;
                    tile.matched = false;
                    self.board.set(x, write, Some(tile));
                }
            }
        }
    }

    /// Fill the vacated top cells with fresh random tiles. Bonus spawns were
    /// seeded before compaction, so every remaining hole refills randomly.
    fn refill(&mut self) {
        for x in 0..BOARD_SIZE {
            let vacant = (0..BOARD_SIZE)
                .filter(|&y| self.board.get(x, y).is_none())
                .count() as u8;
            for y in 0..BOARD_SIZE {
                if self.board.get(x, y).is_none() {
                    let mut tile = self.factory.random_tile();
                    tile.fall_distance = vacant;
                    self.board.set(x, y, Some(tile));
                }
            }
        }
    }
}

/// Edge-clipped 3×3 neighbourhood around a cell.
fn neighbourhood_3x3(x: usize, y: usize) -> HashSet<(usize, usize)> {
    let mut set = HashSet::new();
    for dx in -1i32..=1 {
        for dy in -1i32..=1 {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx >= 0 && ny >= 0 && (nx as usize) < BOARD_SIZE && (ny as usize) < BOARD_SIZE {
                set.insert((nx as usize, ny as usize));
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Symbol, Tile};

    fn board_from(grid: [[u8; BOARD_SIZE]; BOARD_SIZE]) -> Board {
        let mut board = Board::empty();
        let mut id = 0;
        for (y, row) in grid.iter().enumerate() {
            for (x, &s) in row.iter().enumerate() {
                board.set(x, y, Some(Tile::new(id, Symbol(s))));
                id += 1;
            }
        }
        board
    }

    fn latin() -> [[u8; BOARD_SIZE]; BOARD_SIZE] {
        let mut grid = [[0u8; BOARD_SIZE]; BOARD_SIZE];
        for (y, row) in grid.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = ((x + y) % BOARD_SIZE) as u8;
            }
        }
        grid
    }

    fn symbols(board: &Board) -> Vec<Option<Symbol>> {
        let mut out = Vec::new();
        board.for_each_cell(|_, _, t| out.push(t.map(|t| t.symbol)));
        out
    }

    fn first_score(events: &[EngineEvent]) -> Option<u32> {
        events.iter().find_map(|e| match e {
            EngineEvent::ScoreDelta(p) => Some(*p),
            _ => None,
        })
    }

    /// Board where swapping (2,2) and (2,3) completes a horizontal run of
    /// exactly 3 at row 2, columns 1..=3.
    fn swap_scenario() -> Board {
        let mut grid = latin();
        grid[2][1] = 1;
        grid[2][3] = 1;
        grid[3][2] = 1;
        board_from(grid)
    }

    #[test]
    fn swap_creating_run_of_three_scores_thirty() {
        let now = Instant::now();
        let mut engine = Engine::with_board(swap_scenario(), 11);
        assert!(engine.request_swap((2, 2), (2, 3), now));
        assert!(engine.processing());
        engine.run_to_idle(now);
        let events = engine.drain_events();
        assert_eq!(first_score(&events), Some(30));
        assert!(engine.board().is_full());
        assert!(!matcher::has_any_run3(engine.board()));
    }

    #[test]
    fn non_adjacent_swap_is_a_noop() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 5);
        let before = symbols(engine.board());
        assert!(!engine.request_swap((0, 0), (3, 3), now));
        assert!(!engine.processing());
        assert_eq!(symbols(engine.board()), before);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn swap_to_self_is_rejected() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 5);
        assert!(!engine.request_swap((2, 2), (2, 2), now));
    }

    #[test]
    fn matchless_swap_reverts_after_observation_step() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 5);
        let before = symbols(engine.board());
        assert!(engine.request_swap((0, 0), (1, 0), now));
        engine.run_to_idle(now);
        assert_eq!(symbols(engine.board()), before);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn input_ignored_while_processing() {
        let now = Instant::now();
        let mut engine = Engine::with_board(swap_scenario(), 11);
        assert!(engine.request_swap((2, 2), (2, 3), now));
        assert!(!engine.request_swap((0, 0), (1, 0), now));
        engine.select_tile(0, 0, now);
        assert_eq!(engine.selected(), None);
    }

    #[test]
    fn run_of_four_clears_the_whole_row() {
        // Swapping (2,2)/(2,3) turns row 2 into [2,3,3,3,3,1]: a run of 4
        // whose line match removes all 6 cells of the row.
        let now = Instant::now();
        let mut grid = latin();
        grid[2][3] = 3;
        grid[2][4] = 3;
        grid[3][2] = 3;
        let mut engine = Engine::with_board(board_from(grid), 23);
        assert!(engine.request_swap((2, 2), (2, 3), now));
        engine.step(now); // Matching
        engine.step(now); // Removing
        let events = engine.drain_events();
        assert_eq!(first_score(&events), Some(60));
        let cells = events
            .iter()
            .find_map(|e| match e {
                EngineEvent::MatchResolved { cells, .. } => Some(cells.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(cells.len(), BOARD_SIZE);
        engine.run_to_idle(now);
        assert!(!matcher::has_any_run3(engine.board()));
    }

    #[test]
    fn super_bomb_clears_partner_symbol_only() {
        let now = Instant::now();
        let mut board = board_from(latin());
        let mut super_tile = Tile::new(1000, Symbol(0));
        super_tile.bonus = Some(BonusKind::SuperBomb);
        board.set(2, 2, Some(super_tile));
        // Partner (3,2) carries symbol 5; the latin base holds six 5s.
        let mut engine = Engine::with_board(board, 31);
        assert!(engine.request_swap((2, 2), (3, 2), now));
        // Destruction is synchronous; fall/refill is still pending.
        let mut remaining = 0;
        engine.board().for_each_cell(|_, _, tile| {
            if let Some(t) = tile {
                assert_ne!(t.symbol, Symbol(5));
                remaining += 1;
            }
        });
        // Six partner-symbol tiles plus the super bomb itself.
        assert_eq!(remaining, BOARD_SIZE * BOARD_SIZE - 7);
        engine.run_to_idle(now);
        assert!(engine.board().is_full());
        assert!(!matcher::has_any_run3(engine.board()));
    }

    #[test]
    fn bomb_bonus_clips_at_the_corner() {
        let now = Instant::now();
        let mut board = board_from(latin());
        let mut bomb_tile = Tile::new(1000, Symbol(3));
        bomb_tile.bonus = Some(BonusKind::Bomb);
        board.set(0, 0, Some(bomb_tile));
        let mut engine = Engine::with_board(board, 13);
        assert!(engine.request_swap((0, 0), (1, 0), now));
        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::BonusActivated {
            kind: BonusKind::Bomb,
            removed: 4,
        }));
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert!(engine.board().get(x, y).is_none());
        }
        engine.run_to_idle(now);
        assert!(engine.board().is_full());
    }

    #[test]
    fn bomb_booster_scores_and_refills() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 17);
        engine.bomb_at(3, 3, now);
        engine.run_to_idle(now);
        let events = engine.drain_events();
        // 9 tiles at multiplier 1.0.
        assert_eq!(first_score(&events), Some(90));
        assert!(engine.board().is_full());
        assert!(!matcher::has_any_run3(engine.board()));
    }

    #[test]
    fn combo_steps_and_caps() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 3);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(engine.combo());
            engine.bump_combo(now);
        }
        assert_eq!(seen, vec![1.0, 1.5, 2.0, 2.5]);
        for _ in 0..20 {
            engine.bump_combo(now);
        }
        assert!((engine.combo() - COMBO_CAP).abs() < f32::EPSILON);
    }

    #[test]
    fn combo_resets_after_idle_window() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 3);
        engine.bump_combo(now);
        engine.tick(now + Duration::from_secs(2));
        assert!((engine.combo() - 1.5).abs() < f32::EPSILON);
        engine.tick(now + Duration::from_secs(4));
        assert!((engine.combo() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn batch_score_is_floored_after_multiplying() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 3);
        engine.bump_combo(now); // combo now 1.5
        engine.destroy_cells(&[(0, 5), (1, 5), (2, 5)].into_iter().collect(), now);
        let events = engine.drain_events();
        // floor(3 * 10 * 1.5) = 45
        assert_eq!(first_score(&events), Some(45));
    }

    #[test]
    fn gravity_is_stable_and_annotates_fall_distance() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 3);
        let above = engine.board().get(0, 4).unwrap().id;
        engine.destroy_cells(&[(0, 5)].into_iter().collect(), now);
        engine.step(now); // Falling
        let landed = engine.board().get(0, 5).unwrap();
        assert_eq!(landed.id, above);
        assert_eq!(landed.fall_distance, 1);
        engine.run_to_idle(now);
        assert!(engine.board().is_full());
    }

    #[test]
    fn reshuffle_preserves_bonus_tiles() {
        let mut board = board_from(latin());
        let mut bomb_tile = Tile::new(1000, Symbol(1));
        bomb_tile.bonus = Some(BonusKind::Bomb);
        board.set(2, 4, Some(bomb_tile));
        let mut engine = Engine::with_board(board, 41);
        engine.reshuffle();
        let kept = engine.board().get(2, 4).unwrap();
        assert_eq!(kept.symbol, Symbol(1));
        assert_eq!(kept.bonus, Some(BonusKind::Bomb));
        assert!(!matcher::has_any_run3(engine.board()));
        assert!(engine.drain_events().contains(&EngineEvent::BoardShuffled));
    }

    #[test]
    fn select_then_distant_click_moves_nothing() {
        let now = Instant::now();
        let mut engine = Engine::with_board(board_from(latin()), 5);
        let before = symbols(engine.board());
        engine.select_tile(1, 1, now);
        assert_eq!(engine.selected(), Some((1, 1)));
        engine.select_tile(4, 4, now);
        assert_eq!(engine.selected(), None);
        assert_eq!(symbols(engine.board()), before);
    }
}
