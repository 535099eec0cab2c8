//! App: terminal init, main loop, round timer, screens and key handling.

use crate::GameConfig;
use crate::board::BOARD_SIZE;
use crate::game::{Engine, EngineEvent};
use crate::input::{Action, key_to_action};
use crate::progress::{self, LEVEL_COUNT, Progress};
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Resolver cadence: one cascade phase per interval, so removal, fall and
/// refill stay visible.
const STEP_INTERVAL_MS: u64 = 120;

/// Floating score popup lifetime.
const POPUP_TTL_MS: u64 = 900;

/// Extra-time booster grant.
const EXTRA_TIME: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    RoundOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

/// Floating label over a board cell (score deltas, bonus callouts).
#[derive(Debug, Clone)]
pub struct Popup {
    pub cell: (usize, usize),
    pub label: String,
    pub born: Instant,
}

/// Outcome of a finished round, shown on the round-over screen.
#[derive(Debug, Clone, Copy)]
pub struct RoundResult {
    pub level: u32,
    pub score: u32,
    pub completed: bool,
    pub best: u32,
    pub new_best: bool,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    engine: Engine,
    progress: Progress,
    screen: Screen,
    cursor: (usize, usize),
    menu_selected: u32,
    quit_selected: QuitOption,
    paused: bool,
    /// When the clock stopped (pause or quit menu); the deadline is pushed
    /// forward by the stopped span on resume.
    clock_stopped: Option<Instant>,
    round_deadline: Instant,
    round_result: Option<RoundResult>,
    next_step: Instant,
    match_effect: Option<Effect>,
    match_effect_process_time: Option<Instant>,
    popups: Vec<Popup>,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        let progress = progress::load_progress();
        let level = config.initial_level.clamp(1, progress.unlocked);
        let engine = Engine::new(level, config.seed);
        let now = Instant::now();
        let mut app = Self {
            config,
            theme,
            engine,
            progress,
            screen: Screen::Menu,
            cursor: (BOARD_SIZE / 2, BOARD_SIZE / 2),
            menu_selected: level,
            quit_selected: QuitOption::Resume,
            paused: false,
            clock_stopped: None,
            round_deadline: now,
            round_result: None,
            next_step: now,
            match_effect: None,
            match_effect_process_time: None,
            popups: Vec::new(),
        };
        if app.config.no_menu {
            app.start_round(level, now);
        }
        app
    }

    fn start_round(&mut self, level: u32, now: Instant) {
        self.engine.set_level(level);
        self.cursor = (BOARD_SIZE / 2, BOARD_SIZE / 2);
        self.round_deadline = now + Duration::from_secs(u64::from(self.config.time_limit));
        self.next_step = now;
        self.round_result = None;
        self.paused = false;
        self.clock_stopped = None;
        self.popups.clear();
        self.match_effect = None;
        self.match_effect_process_time = None;
        self.menu_selected = level;
        self.screen = Screen::Playing;
    }

    fn stop_clock(&mut self, now: Instant) {
        if self.clock_stopped.is_none() {
            self.clock_stopped = Some(now);
        }
    }

    fn resume_clock(&mut self, now: Instant) {
        if let Some(stopped) = self.clock_stopped.take() {
            self.round_deadline += now.saturating_duration_since(stopped);
        }
    }

    fn round_remaining(&self, now: Instant) -> Duration {
        let reference = self.clock_stopped.unwrap_or(now);
        self.round_deadline.saturating_duration_since(reference)
    }

    fn push_popup(&mut self, cell: (usize, usize), label: String, now: Instant) {
        self.popups.push(Popup {
            cell,
            label,
            born: now,
        });
    }

    fn tick_popups(&mut self, now: Instant) {
        self.popups
            .retain(|p| now.saturating_duration_since(p.born) < Duration::from_millis(POPUP_TTL_MS));
    }

    fn consume_events(&mut self, now: Instant) {
        for event in self.engine.drain_events() {
            match event {
                EngineEvent::MatchResolved { cells, points } => {
                    if let Some(&cell) = cells.first() {
                        self.push_popup(cell, format!("+{points}"), now);
                    }
                    // New batch: rebuild the fade from the fresh matched set.
                    self.match_effect = None;
                    self.match_effect_process_time = None;
                }
                EngineEvent::BonusCreated { x, y, kind } => {
                    let label = match kind {
                        crate::board::BonusKind::Bomb => "Bomb!",
                        crate::board::BonusKind::SuperBomb => "Super!",
                    };
                    self.push_popup((x, y), label.to_string(), now);
                }
                EngineEvent::BoardShuffled => {
                    self.push_popup((1, 0), "Shuffled".to_string(), now);
                }
                EngineEvent::ScoreDelta(_) | EngineEvent::BonusActivated { .. } => {}
            }
        }
    }

    fn finish_round(&mut self, now: Instant) {
        // Let a cascade in flight settle so its score counts.
        self.engine.run_to_idle(now);
        self.consume_events(now);
        let level = self.engine.level();
        let score = self.engine.score();
        let prev_best = self.progress.best[level as usize - 1];
        let completed = self.progress.record_round(level, score);
        let _ = progress::save_progress(&self.progress);
        self.round_result = Some(RoundResult {
            level,
            score,
            completed,
            best: self.progress.best[level as usize - 1],
            new_best: score > prev_best,
        });
        if completed {
            self.menu_selected = self.progress.unlocked;
        }
        self.paused = false;
        self.clock_stopped = None;
        self.popups.clear();
        self.match_effect = None;
        self.match_effect_process_time = None;
        self.screen = Screen::RoundOver;
    }

    fn apply_play_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Move(dir) => self.cursor = dir.applied_to(self.cursor, BOARD_SIZE),
            Action::Select => self.engine.select_tile(self.cursor.0, self.cursor.1, now),
            Action::Swap(dir) => {
                let other = dir.applied_to(self.cursor, BOARD_SIZE);
                if other != self.cursor {
                    self.engine.request_swap(self.cursor, other, now);
                }
            }
            Action::Shuffle => {
                if self.progress.boosters.shuffle > 0 && !self.engine.processing() {
                    self.progress.boosters.shuffle -= 1;
                    self.engine.reshuffle();
                }
            }
            Action::Bomb => {
                if self.progress.boosters.bomb > 0 && !self.engine.processing() {
                    self.progress.boosters.bomb -= 1;
                    self.engine.bomb_at(self.cursor.0, self.cursor.1, now);
                }
            }
            Action::ExtraTime => {
                if self.progress.boosters.extra_time > 0 {
                    self.progress.boosters.extra_time -= 1;
                    self.round_deadline += EXTRA_TIME;
                    self.push_popup(self.cursor, "+15s".to_string(), now);
                }
            }
            Action::Pause | Action::Quit | Action::None => {}
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();

            if self.screen == Screen::Playing && !self.paused {
                self.engine.tick(now);
                if self.engine.processing() {
                    if self.config.no_animation {
                        self.engine.run_to_idle(now);
                    } else if now >= self.next_step {
                        self.engine.step(now);
                        self.next_step = now + Duration::from_millis(STEP_INTERVAL_MS);
                    }
                }
                self.consume_events(now);
                if self.round_remaining(now).is_zero() {
                    self.finish_round(now);
                }
            }

            self.tick_popups(now);
            if self.match_effect.as_ref().is_some_and(Effect::done) {
                self.match_effect = None;
                self.match_effect_process_time = None;
            }

            let round_remaining = self.round_remaining(now);
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.engine,
                    &self.theme,
                    &self.progress,
                    self.cursor,
                    self.menu_selected,
                    (self.screen == Screen::QuitMenu).then_some(self.quit_selected),
                    self.round_result.as_ref(),
                    round_remaining,
                    self.config.time_limit,
                    &self.popups,
                    &mut self.match_effect,
                    &mut self.match_effect_process_time,
                    now,
                    self.config.no_animation,
                    self.paused,
                )
            })?;

            // ~60 FPS polling
            let timeout = Duration::from_millis(16).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    let action = key_to_action(key);
                    let now = Instant::now();

                    match self.screen {
                        Screen::Menu => match action {
                            Action::Quit => return Ok(()),
                            Action::Move(crate::input::Dir::Up) => {
                                self.menu_selected = self.menu_selected.saturating_sub(1).max(1);
                            }
                            Action::Move(crate::input::Dir::Down) => {
                                self.menu_selected =
                                    (self.menu_selected + 1).min(self.progress.unlocked);
                            }
                            Action::Select => self.start_round(self.menu_selected, now),
                            _ => {}
                        },
                        Screen::Playing => {
                            if self.paused {
                                match action {
                                    Action::Pause => {
                                        self.paused = false;
                                        self.resume_clock(now);
                                    }
                                    Action::Quit => {
                                        self.screen = Screen::QuitMenu;
                                        self.quit_selected = QuitOption::Resume;
                                        self.paused = false;
                                    }
                                    _ => {}
                                }
                            } else {
                                match action {
                                    Action::Pause => {
                                        self.paused = true;
                                        self.stop_clock(now);
                                    }
                                    Action::Quit => {
                                        self.screen = Screen::QuitMenu;
                                        self.quit_selected = QuitOption::Resume;
                                        self.stop_clock(now);
                                    }
                                    other => self.apply_play_action(other, now),
                                }
                            }
                        }
                        Screen::QuitMenu => match action {
                            Action::Move(crate::input::Dir::Down) => {
                                self.quit_selected = match self.quit_selected {
                                    QuitOption::Resume => QuitOption::MainMenu,
                                    QuitOption::MainMenu => QuitOption::Exit,
                                    QuitOption::Exit => QuitOption::Resume,
                                };
                            }
                            Action::Move(crate::input::Dir::Up) => {
                                self.quit_selected = match self.quit_selected {
                                    QuitOption::Resume => QuitOption::Exit,
                                    QuitOption::MainMenu => QuitOption::Resume,
                                    QuitOption::Exit => QuitOption::MainMenu,
                                };
                            }
                            Action::Select => match self.quit_selected {
                                QuitOption::Resume => {
                                    self.screen = Screen::Playing;
                                    self.resume_clock(now);
                                }
                                QuitOption::MainMenu => {
                                    let _ = progress::save_progress(&self.progress);
                                    self.screen = Screen::Menu;
                                }
                                QuitOption::Exit => {
                                    let _ = progress::save_progress(&self.progress);
                                    return Ok(());
                                }
                            },
                            Action::Pause | Action::Quit => {
                                self.screen = Screen::Playing;
                                self.resume_clock(now);
                            }
                            _ => {}
                        },
                        Screen::RoundOver => {
                            let result = self.round_result;
                            match key.code {
                                KeyCode::Char('r') | KeyCode::Char('R') => {
                                    if let Some(r) = result {
                                        self.start_round(r.level, now);
                                    }
                                }
                                KeyCode::Char('n') | KeyCode::Char('N') => {
                                    if let Some(r) = result {
                                        if r.completed && (r.level as usize) < LEVEL_COUNT {
                                            self.start_round(r.level + 1, now);
                                        }
                                    }
                                }
                                KeyCode::Char('m') | KeyCode::Char('M') => {
                                    self.screen = Screen::Menu;
                                }
                                _ => {
                                    if action == Action::Quit {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
