//! Glowmatch — match-three puzzle in the terminal.

mod app;
mod board;
mod game;
mod input;
mod matcher;
mod progress;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that affect game behaviour.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub time_limit: u32,
    pub initial_level: u32,
    pub no_animation: bool,
    pub no_menu: bool,
    pub seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let seed = args.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(1, |d| d.as_nanos() as u64)
    });
    let config = GameConfig {
        time_limit: args.time_limit,
        initial_level: args.level,
        no_animation: args.no_animation,
        no_menu: args.no_menu,
        seed,
    };
    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// Match-three puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "glowmatch",
    version,
    about = "Match-three puzzle in the terminal. Swap adjacent tiles to line up 3+, chain cascades, beat the clock.",
    long_about = "Glowmatch is a terminal match-three puzzle game.\n\n\
        Swap adjacent tiles to line up 3 or more of a symbol. A run of 4 clears its whole \
        row or column; a run of 5 leaves a super bomb; an L or T shape leaves a bomb. \
        Chain cascades to build the combo multiplier and beat each level's score goal \
        before time runs out.\n\n\
        CONTROLS (normal):\n  Arrows       Move cursor   Shift+Arrows  Swap\n  Enter/Space  Select/Swap   1/2/3         Shuffle/Bomb/+Time\n  P            Pause         Q / Esc       Quit\n\n\
        CONTROLS (vim):\n  h/j/k/l      Move cursor   H/J/K/L       Swap\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Starting level (clamped to the highest unlocked level).
    #[arg(short, long, default_value = "1", value_name = "N")]
    pub level: u32,

    /// Round length in seconds (the extra-time booster extends it).
    #[arg(long, default_value = "60", value_name = "SECS")]
    pub time_limit: u32,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable cascade animation (matches resolve instantly).
    #[arg(long)]
    pub no_animation: bool,

    /// Skip the level-select menu and start playing immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Board RNG seed (reproducible boards). Random when not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
