//! Match detection: maximal runs, line matches, and bonus-tile proposals.

use std::collections::HashSet;

use crate::board::{BOARD_SIZE, Board, BonusKind, Symbol};

/// Scan direction for runs and line matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

/// A run of exactly 4: resolving it clears the whole row/column, not just
/// the matched cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMatch {
    pub axis: Axis,
    pub index: usize,
    pub symbol: Symbol,
}

/// Request to seed a bonus tile during refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusSpawn {
    pub x: usize,
    pub y: usize,
    pub kind: BonusKind,
    pub symbol: Symbol,
}

/// Maximal contiguous same-symbol sequence along one line.
#[derive(Debug, Clone, Copy)]
struct Run {
    axis: Axis,
    index: usize,
    start: usize,
    len: usize,
    symbol: Symbol,
}

impl Run {
    fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.start..self.start + self.len).map(move |i| match self.axis {
            Axis::Row => (i, self.index),
            Axis::Column => (self.index, i),
        })
    }
}

/// Result of scanning a settled board.
#[derive(Debug, Clone, Default)]
pub struct MatchScan {
    /// Union of all run-length-≥3 memberships.
    pub cells: HashSet<(usize, usize)>,
    pub line_matches: Vec<LineMatch>,
    /// De-duplicated by coordinate; at most one spawn per cell.
    pub bonus_spawns: Vec<BonusSpawn>,
}

impl MatchScan {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Matched cells plus every cell of each line match's full row/column.
    pub fn removal_set(&self) -> HashSet<(usize, usize)> {
        let mut set = self.cells.clone();
        for lm in &self.line_matches {
            for i in 0..BOARD_SIZE {
                match lm.axis {
                    Axis::Row => set.insert((i, lm.index)),
                    Axis::Column => set.insert((lm.index, i)),
                };
            }
        }
        set
    }
}

fn symbol_along(board: &Board, axis: Axis, index: usize, i: usize) -> Option<Symbol> {
    match axis {
        Axis::Row => board.symbol_at(i, index),
        Axis::Column => board.symbol_at(index, i),
    }
}

/// All maximal runs of length ≥ `min_len` along one axis. Empty cells break
/// runs (the detector only runs on settled boards; this keeps it total).
fn maximal_runs(board: &Board, axis: Axis, min_len: usize) -> Vec<Run> {
    let mut runs = Vec::new();
    for index in 0..BOARD_SIZE {
        let mut start = 0;
        let mut current: Option<Symbol> = symbol_along(board, axis, index, 0);
        for i in 1..=BOARD_SIZE {
            let next = if i < BOARD_SIZE {
                symbol_along(board, axis, index, i)
            } else {
                None
            };
            if next != current || current.is_none() {
                if let Some(symbol) = current {
                    let len = i - start;
                    if len >= min_len {
                        runs.push(Run {
                            axis,
                            index,
                            start,
                            len,
                            symbol,
                        });
                    }
                }
                start = i;
                current = next;
            }
        }
    }
    runs
}

/// Length of the contiguous same-symbol stretch through `(x, y)` along the
/// given axis (the cell itself included).
fn contiguous_len_through(board: &Board, axis: Axis, x: usize, y: usize) -> usize {
    let Some(symbol) = board.symbol_at(x, y) else {
        return 0;
    };
    let (index, pos) = match axis {
        Axis::Row => (y, x),
        Axis::Column => (x, y),
    };
    let mut len = 1;
    let mut i = pos;
    while i > 0 && symbol_along(board, axis, index, i - 1) == Some(symbol) {
        len += 1;
        i -= 1;
    }
    let mut i = pos;
    while i + 1 < BOARD_SIZE && symbol_along(board, axis, index, i + 1) == Some(symbol) {
        len += 1;
        i += 1;
    }
    len
}

/// True if any row or column holds a run of 3+. Used by board generation
/// (rejection sampling) and by the stability property.
pub fn has_any_run3(board: &Board) -> bool {
    !maximal_runs(board, Axis::Row, 3).is_empty()
        || !maximal_runs(board, Axis::Column, 3).is_empty()
}

/// Full scan of a settled board.
///
/// Runs of 3+ mark their cells; a run of exactly 4 records a line match;
/// a run of 5+ records one run-centered superBomb spawn. Runs of exactly 3
/// on one axis whose cells also sit on a perpendicular run of 3+ record a
/// bomb spawn at the shared cell — scanned from both axes, so an L/T shape
/// anchored either way is caught. Overlapping proposals for the same cell
/// collapse to the first one recorded (superBomb before bomb).
pub fn find_matches(board: &Board) -> MatchScan {
    let mut scan = MatchScan::default();
    let runs: Vec<Run> = maximal_runs(board, Axis::Row, 3)
        .into_iter()
        .chain(maximal_runs(board, Axis::Column, 3))
        .collect();

    for run in &runs {
        scan.cells.extend(run.cells());
        if run.len == 4 {
            scan.line_matches.push(LineMatch {
                axis: run.axis,
                index: run.index,
                symbol: run.symbol,
            });
        }
        if run.len >= 5 {
            let center = run.start + run.len / 2;
            let (x, y) = match run.axis {
                Axis::Row => (center, run.index),
                Axis::Column => (run.index, center),
            };
            scan.bonus_spawns.push(BonusSpawn {
                x,
                y,
                kind: BonusKind::SuperBomb,
                symbol: run.symbol,
            });
        }
    }

    for run in runs.iter().filter(|r| r.len == 3) {
        let cross = match run.axis {
            Axis::Row => Axis::Column,
            Axis::Column => Axis::Row,
        };
        for (x, y) in run.cells() {
            if contiguous_len_through(board, cross, x, y) >= 3 {
                scan.bonus_spawns.push(BonusSpawn {
                    x,
                    y,
                    kind: BonusKind::Bomb,
                    symbol: run.symbol,
                });
            }
        }
    }

    dedup_by_coordinate(&mut scan.bonus_spawns);
    scan
}

fn dedup_by_coordinate(spawns: &mut Vec<BonusSpawn>) {
    let mut seen = HashSet::new();
    spawns.retain(|s| seen.insert((s.x, s.y)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Tile;

    /// Build a board from `grid[y][x]` symbol indices.
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

    /// Latin-square base: no run of 2+ anywhere.
    fn latin() -> [[u8; BOARD_SIZE]; BOARD_SIZE] {
        let mut grid = [[0u8; BOARD_SIZE]; BOARD_SIZE];
        for (y, row) in grid.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = ((x + y) % BOARD_SIZE) as u8;
            }
        }
        grid
    }

    #[test]
    fn latin_board_has_no_runs() {
        assert!(!has_any_run3(&board_from(latin())));
        assert!(find_matches(&board_from(latin())).is_empty());
    }

    #[test]
    fn run_of_three_marks_exactly_those_cells() {
        let mut grid = latin();
        // Row 2 becomes [2,3,3,3,0,1]: run of exactly 3 at x=1..=3.
        grid[2][2] = 3;
        grid[2][3] = 3;
        let scan = find_matches(&board_from(grid));
        let expected: HashSet<_> = [(1, 2), (2, 2), (3, 2)].into_iter().collect();
        assert_eq!(scan.cells, expected);
        assert!(scan.line_matches.is_empty());
        assert!(scan.bonus_spawns.is_empty());
    }

    #[test]
    fn run_of_four_records_line_match() {
        let mut grid = latin();
        // Row 2 becomes [2,3,3,3,3,1]: run of exactly 4 at x=1..=4.
        grid[2][2] = 3;
        grid[2][3] = 3;
        grid[2][4] = 3;
        let scan = find_matches(&board_from(grid));
        assert_eq!(scan.cells.len(), 4);
        assert_eq!(
            scan.line_matches,
            vec![LineMatch {
                axis: Axis::Row,
                index: 2,
                symbol: Symbol(3)
            }]
        );
        assert!(scan.bonus_spawns.is_empty());
        // The resolved effect clears the whole row, not just the run.
        assert_eq!(scan.removal_set().len(), BOARD_SIZE);
    }

    #[test]
    fn run_of_five_records_single_super_bomb() {
        let mut grid = latin();
        // Row 2 becomes [2,3,3,3,3,3]: run of 5 at x=1..=5.
        for x in 2..=5 {
            grid[2][x] = 3;
        }
        let scan = find_matches(&board_from(grid));
        assert_eq!(scan.cells.len(), 5);
        assert!(scan.line_matches.is_empty());
        assert_eq!(
            scan.bonus_spawns,
            vec![BonusSpawn {
                x: 3,
                y: 2,
                kind: BonusKind::SuperBomb,
                symbol: Symbol(3)
            }]
        );
    }

    #[test]
    fn l_shape_records_one_bomb_at_shared_cell() {
        let mut grid = latin();
        // Vertical run col 2 y=0..=2 and horizontal run row 2 x=0..=2,
        // sharing the corner (2, 2). Both scans propose the corner; the
        // duplicates collapse to one.
        grid[0][2] = 0;
        grid[1][2] = 0;
        grid[2][2] = 0;
        grid[2][0] = 0;
        grid[2][1] = 0;
        let scan = find_matches(&board_from(grid));
        let expected: HashSet<_> = [(2, 0), (2, 1), (2, 2), (0, 2), (1, 2)]
            .into_iter()
            .collect();
        assert_eq!(scan.cells, expected);
        assert!(scan.line_matches.is_empty());
        assert_eq!(
            scan.bonus_spawns,
            vec![BonusSpawn {
                x: 2,
                y: 2,
                kind: BonusKind::Bomb,
                symbol: Symbol(0)
            }]
        );
    }

    #[test]
    fn has_any_run3_detects_vertical() {
        let mut grid = latin();
        grid[1][4] = 5;
        grid[2][4] = 5;
        grid[3][4] = 5;
        assert!(has_any_run3(&board_from(grid)));
    }
}
