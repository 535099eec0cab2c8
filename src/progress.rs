//! Persist player progress to disk (XDG config or ~/.config/glowmatch):
//! unlocked levels, per-level best scores, booster inventory.

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const FILENAME: &str = "progress";

/// Number of themed levels.
pub const LEVEL_COUNT: usize = 7;

/// Boosters granted to a fresh profile.
const STARTING_BOOSTERS: u32 = 3;

/// Booster inventory. Counts are decremented exactly once per granted use
/// and only by the host, before the engine effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boosters {
    pub shuffle: u32,
    pub bomb: u32,
    pub extra_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Levels playable so far, 1..=LEVEL_COUNT.
    pub unlocked: u32,
    pub best: [u32; LEVEL_COUNT],
    pub boosters: Boosters,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            unlocked: 1,
            best: [0; LEVEL_COUNT],
            boosters: Boosters {
                shuffle: STARTING_BOOSTERS,
                bomb: STARTING_BOOSTERS,
                extra_time: STARTING_BOOSTERS,
            },
        }
    }
}

impl Progress {
    /// Score needed to complete a level and unlock the next.
    pub fn goal_for(level: u32) -> u32 {
        level * 500
    }

    /// Record a finished round: update the best score, unlock the next level
    /// when the goal was met, and award one of each booster per completion.
    /// Returns true when the round completed its level.
    pub fn record_round(&mut self, level: u32, score: u32) -> bool {
        if let Some(best) = self.best.get_mut(level as usize - 1) {
            *best = (*best).max(score);
        }
        let completed = score >= Self::goal_for(level);
        if completed {
            if level == self.unlocked && (self.unlocked as usize) < LEVEL_COUNT {
                self.unlocked += 1;
            }
            self.boosters.shuffle += 1;
            self.boosters.bomb += 1;
            self.boosters.extra_time += 1;
        }
        completed
    }
}

/// Returns the path to the progress file (config dir / glowmatch / progress).
fn config_path() -> Result<PathBuf> {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if xdg.is_empty() {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        } else {
            PathBuf::from(xdg)
        }
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    Ok(base.join("glowmatch").join(FILENAME))
}

/// Load progress from disk. Missing or unparseable file yields a fresh profile.
pub fn load_progress() -> Progress {
    let path = match config_path() {
        Ok(p) => p,
        Err(_) => return Progress::default(),
    };
    match fs::read_to_string(path) {
        Ok(content) => parse_progress(&content),
        Err(_) => Progress::default(),
    }
}

/// Save progress to disk. Creates the config directory if needed.
pub fn save_progress(progress: &Progress) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    f.write_all(serialize_progress(progress).as_bytes())?;
    Ok(())
}

/// `key=value` lines; unknown keys are ignored, missing keys keep defaults.
fn parse_progress(s: &str) -> Progress {
    let mut progress = Progress::default();
    for line in s.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "unlocked" => {
                if let Ok(n) = value.parse::<u32>() {
                    progress.unlocked = n.clamp(1, LEVEL_COUNT as u32);
                }
            }
            "best" => {
                for (i, field) in value.split(',').take(LEVEL_COUNT).enumerate() {
                    progress.best[i] = field.trim().parse().unwrap_or(0);
                }
            }
            "shuffle" => progress.boosters.shuffle = value.parse().unwrap_or(0),
            "bomb" => progress.boosters.bomb = value.parse().unwrap_or(0),
            "extra_time" => progress.boosters.extra_time = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    progress
}

fn serialize_progress(progress: &Progress) -> String {
    let best: Vec<String> = progress.best.iter().map(ToString::to_string).collect();
    format!(
        "unlocked={}\nbest={}\nshuffle={}\nbomb={}\nextra_time={}\n",
        progress.unlocked,
        best.join(","),
        progress.boosters.shuffle,
        progress.boosters.bomb,
        progress.boosters.extra_time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut progress = Progress::default();
        progress.unlocked = 3;
        progress.best = [700, 1200, 400, 0, 0, 0, 0];
        progress.boosters.bomb = 5;
        assert_eq!(parse_progress(&serialize_progress(&progress)), progress);
    }

    #[test]
    fn parse_garbage_yields_fresh_profile() {
        assert_eq!(parse_progress("not a progress file"), Progress::default());
        assert_eq!(parse_progress(""), Progress::default());
    }

    #[test]
    fn completing_current_level_unlocks_next_and_awards_boosters() {
        let mut progress = Progress::default();
        assert!(progress.record_round(1, 600));
        assert_eq!(progress.unlocked, 2);
        assert_eq!(progress.best[0], 600);
        assert_eq!(progress.boosters.shuffle, STARTING_BOOSTERS + 1);
    }

    #[test]
    fn failed_round_keeps_best_but_not_unlock() {
        let mut progress = Progress::default();
        assert!(!progress.record_round(1, 300));
        assert_eq!(progress.unlocked, 1);
        assert_eq!(progress.best[0], 300);
        progress.record_round(1, 200);
        assert_eq!(progress.best[0], 300);
    }

    #[test]
    fn unlock_caps_at_level_count() {
        let mut progress = Progress::default();
        progress.unlocked = LEVEL_COUNT as u32;
        assert!(progress.record_round(LEVEL_COUNT as u32, 10_000));
        assert_eq!(progress.unlocked, LEVEL_COUNT as u32);
    }
}
