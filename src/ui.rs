//! Layout and drawing: menu, board, sidebar, quit and round-over popups.

use crate::app::{Popup, QuitOption, RoundResult, Screen};
use crate::board::{BOARD_SIZE, BonusKind};
use crate::game::{COMBO_CAP, Engine};
use crate::progress::{LEVEL_COUNT, Progress};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is drawn as a 4×2 block of terminal cells.
const CELL_W: u16 = 4;
const CELL_H: u16 = 2;

const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the match-clear fade (TachyonFX) in ms.
const MATCH_FADE_MS: u32 = 300;

/// Glyph per palette symbol index; colour alone is not enough for the
/// colorblind palette.
const SYMBOL_GLYPHS: [&str; 6] = ["●", "◆", "▲", "■", "★", "♥"];

const BOMB_GLYPH: &str = "◎";
const SUPER_BOMB_GLYPH: &str = "✹";

/// Themed display name per level.
pub fn level_name(level: u32) -> &'static str {
    match level {
        2 => "Wizards",
        3 => "Galaxy",
        4 => "Dragons",
        5 => "Winter",
        6 => "Safari",
        7 => "Voyage",
        _ => "Clinic",
    }
}

/// Board size in terminal cells (border included).
fn board_pixel_size() -> (u16, u16) {
    (
        BOARD_SIZE as u16 * CELL_W + 2,
        BOARD_SIZE as u16 * CELL_H + 2,
    )
}

/// Board inner rect (no border) for the given frame area; matches draw_game.
fn board_inner_rect(area: Rect) -> Rect {
    let (bw, bh) = board_pixel_size();
    let total_w = bw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(bh) / 2;
    Rect {
        x: x + 1,
        y: y + 1,
        width: (BOARD_SIZE as u16 * CELL_W).min(area.width.saturating_sub(2)),
        height: (BOARD_SIZE as u16 * CELL_H).min(area.height.saturating_sub(2)),
    }
}

/// Buffer positions covered by the given board cells.
fn cell_buffer_positions(board_rect: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(gx, gy) in cells {
        let x0 = board_rect.x + gx as u16 * CELL_W;
        let y0 = board_rect.y + gy as u16 * CELL_H;
        for bx in x0..(x0 + CELL_W).min(board_rect.x + board_rect.width) {
            for by in y0..(y0 + CELL_H).min(board_rect.y + board_rect.height) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Create or update the match-clear fade effect and process it (TachyonFX:
/// fade matched cells to bg).
#[allow(clippy::too_many_arguments)]
pub fn apply_match_effect(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    matched_cells: &[(usize, usize)],
    match_effect: &mut Option<Effect>,
    match_effect_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board_rect = board_inner_rect(area);
    let delta = match_effect_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u128::from(u32::MAX)) as u32);
    *match_effect_process_time = Some(now);

    if match_effect.is_none() {
        let matched_set = cell_buffer_positions(board_rect, matched_cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            matched_set.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (MATCH_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board_rect);
        *match_effect = Some(effect);
    }

    if let Some(effect) = match_effect {
        frame.render_effect(effect, board_rect, tfx_delta);
    }
}

/// Draw the current screen. The quit menu and pause overlay draw on top of
/// the game; the fade effect runs while any tile is marked matched.
#[allow(clippy::too_many_arguments)]
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    engine: &Engine,
    theme: &Theme,
    progress: &Progress,
    cursor: (usize, usize),
    menu_selected: u32,
    quit_selected: Option<QuitOption>,
    round_result: Option<&RoundResult>,
    round_remaining: Duration,
    time_limit: u32,
    popups: &[Popup],
    match_effect: &mut Option<Effect>,
    match_effect_process_time: &mut Option<Instant>,
    now: Instant,
    no_animation: bool,
    paused: bool,
) {
    let area = frame.area();
    match screen {
        Screen::Menu => draw_menu(frame, theme, progress, menu_selected, area),
        Screen::Playing | Screen::QuitMenu => {
            draw_game(
                frame,
                engine,
                theme,
                progress,
                cursor,
                round_remaining,
                time_limit,
                popups,
                now,
                area,
            );
            let matched = matched_cells(engine);
            if !matched.is_empty() && !no_animation {
                apply_match_effect(
                    frame,
                    theme,
                    area,
                    &matched,
                    match_effect,
                    match_effect_process_time,
                    now,
                );
            }
            if paused {
                draw_pause_overlay(frame, theme, area);
            }
            if let Some(opt) = quit_selected {
                draw_quit_menu(frame, theme, opt);
            }
        }
        Screen::RoundOver => {
            if let Some(result) = round_result {
                draw_round_over(frame, theme, result, area);
            }
        }
    }
}

fn matched_cells(engine: &Engine) -> Vec<(usize, usize)> {
    let mut cells = Vec::new();
    engine.board().for_each_cell(|x, y, tile| {
        if tile.is_some_and(|t| t.matched) {
            cells.push((x, y));
        }
    });
    cells
}

fn draw_menu(frame: &mut Frame, theme: &Theme, progress: &Progress, selected: u32, area: Rect) {
    let popup_w = 48u16;
    let popup_h = (LEVEL_COUNT as u16) + 12;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let title = Line::from(vec![
        Span::styled(" Glow ", Style::default().fg(theme.tile_color(4)).bold()),
        Span::styled("match ", Style::default().fg(theme.main_fg).bold()),
    ]);

    let highlight_style = Style::default().fg(Color::Black).bg(theme.tile_color(1)).bold();
    let normal_style = Style::default().fg(theme.main_fg);
    let locked_style = Style::default().fg(theme.inactive_fg);

    let mut lines = vec![Line::from(""), title, Line::from("")];
    for level in 1..=LEVEL_COUNT as u32 {
        let unlocked = level <= progress.unlocked;
        let best = progress.best[level as usize - 1];
        let label = if unlocked {
            format!(
                " Level {}  {:<8} best {:>5}  goal {:>5} ",
                level,
                level_name(level),
                best,
                Progress::goal_for(level),
            )
        } else {
            format!(" Level {}  locked {:>23} ", level, "")
        };
        let style = if level == selected {
            highlight_style
        } else if unlocked {
            normal_style
        } else {
            locked_style
        };
        lines.push(Line::from(Span::styled(label, style)));
    }
    lines.extend([
        Line::from(""),
        Line::from(vec![
            Span::styled(" ↕ ", Style::default().fg(theme.tile_color(3))),
            Span::from("SELECT LEVEL   "),
            Span::styled(" ENTER ", Style::default().fg(theme.tile_color(3))),
            Span::from("PLAY"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(Color::Rgb(255, 80, 80)),
        )),
    ]);

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

/// Draw game: board + sidebar; use the full area and center the pair.
#[allow(clippy::too_many_arguments)]
fn draw_game(
    frame: &mut Frame,
    engine: &Engine,
    theme: &Theme,
    progress: &Progress,
    cursor: (usize, usize),
    round_remaining: Duration,
    time_limit: u32,
    popups: &[Popup],
    now: Instant,
    area: Rect,
) {
    let (bw, bh) = board_pixel_size();
    let total_w = bw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bh),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let active_area = vert[1];

    let (board_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active_area);
        (inner[0], inner[1])
    };

    draw_board(frame, engine, theme, cursor, round_remaining, board_area);
    draw_popups(frame, theme, popups, area);
    draw_sidebar(
        frame,
        engine,
        theme,
        progress,
        round_remaining,
        time_limit,
        now,
        sidebar_area,
    );
}

fn draw_board(
    frame: &mut Frame,
    engine: &Engine,
    theme: &Theme,
    cursor: (usize, usize),
    round_remaining: Duration,
    area: Rect,
) {
    let secs = round_remaining.as_secs();
    let title = format!(
        " Glowmatch  L{} {}  {:02}:{:02} ",
        engine.level(),
        level_name(engine.level()),
        secs / 60,
        secs % 60,
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    engine.board().for_each_cell(|x, y, tile| {
        let x0 = inner.x + x as u16 * CELL_W;
        let y0 = inner.y + y as u16 * CELL_H;
        if x0 + CELL_W > inner.x + inner.width || y0 + CELL_H > inner.y + inner.height {
            return;
        }
        let (bg, glyph) = match tile {
            Some(t) if t.matched => (Color::White, SYMBOL_GLYPHS[t.symbol.0 as usize]),
            Some(t) => {
                let glyph = match t.bonus {
                    Some(BonusKind::Bomb) => BOMB_GLYPH,
                    Some(BonusKind::SuperBomb) => SUPER_BOMB_GLYPH,
                    None => SYMBOL_GLYPHS[t.symbol.0 as usize],
                };
                (theme.tile_color(t.symbol.0), glyph)
            }
            None => (theme.bg, " "),
        };
        let cell_style = Style::default().fg(Color::Black).bg(bg);
        for by in y0..y0 + CELL_H {
            for bx in x0..x0 + CELL_W {
                buf[(bx, by)].set_symbol(" ").set_style(cell_style);
            }
        }
        buf[(x0 + 1, y0)].set_symbol(glyph).set_style(cell_style);

        // Cursor and selection frames on the cell's edge columns.
        let frame_fg = if engine.selected() == Some((x, y)) {
            Some(Color::White)
        } else if cursor == (x, y) {
            Some(theme.title)
        } else {
            None
        };
        if let Some(fg) = frame_fg {
            let edge = Style::default().fg(fg).bg(bg);
            for by in y0..y0 + CELL_H {
                buf[(x0, by)].set_symbol("▌").set_style(edge);
                buf[(x0 + CELL_W - 1, by)].set_symbol("▐").set_style(edge);
            }
        }
    });
}

/// Floating score/info popups over the board.
fn draw_popups(frame: &mut Frame, theme: &Theme, popups: &[Popup], area: Rect) {
    let board_rect = board_inner_rect(area);
    for popup in popups {
        let (gx, gy) = popup.cell;
        let rx = board_rect.x + gx as u16 * CELL_W;
        let ry = board_rect.y + gy as u16 * CELL_H;
        if rx < board_rect.x + board_rect.width && ry < board_rect.y + board_rect.height {
            let style = Style::default().fg(theme.title).bg(theme.bg).bold();
            frame.buffer_mut().set_string(rx, ry, &popup.label, style);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_sidebar(
    frame: &mut Frame,
    engine: &Engine,
    theme: &Theme,
    progress: &Progress,
    round_remaining: Duration,
    time_limit: u32,
    now: Instant,
    area: Rect,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.inactive_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);
    let level = engine.level();
    let best = progress.best[level as usize - 1];

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Stats (score, best, goal)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Time gauge
            Constraint::Length(1), // gap
            Constraint::Length(4), // Combo gauge
            Constraint::Length(1), // gap
            Constraint::Length(5), // Boosters
        ])
        .split(area);

    // --- Stats ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(engine.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(best.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Goal:  ", title_style),
            Span::styled(Progress::goal_for(level).to_string(), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Time ---
    let time_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let time_inner = time_block.inner(chunks[2]);
    time_block.render(chunks[2], frame.buffer_mut());
    let time_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(time_inner);
    Paragraph::new(Line::from(Span::styled("Time", title_style)))
        .render(time_layout[0], frame.buffer_mut());
    // Extra time can push remaining past the base limit; the gauge saturates.
    let time_ratio = (round_remaining.as_secs_f64() / f64::from(time_limit.max(1))).min(1.0);
    let time_color = if time_ratio > 0.5 {
        Color::Green
    } else if time_ratio > 0.2 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(time_ratio)
        .gauge_style(Style::default().fg(time_color))
        .render(time_layout[1], frame.buffer_mut());

    // --- Combo ---
    let combo_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let combo_inner = combo_block.inner(chunks[4]);
    combo_block.render(chunks[4], frame.buffer_mut());
    let combo_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(combo_inner);
    let combo_label = if engine.combo() > 1.0 {
        format!("Combo x{:.1}", engine.combo())
    } else {
        "Combo".to_string()
    };
    let combo_style = if (engine.combo() - COMBO_CAP).abs() < f32::EPSILON {
        Style::default().fg(theme.tile_color(2)).bold()
    } else {
        title_style
    };
    Paragraph::new(Line::from(Span::styled(combo_label, combo_style)))
        .render(combo_layout[0], frame.buffer_mut());
    Gauge::default()
        .ratio(engine.combo_ratio(now))
        .gauge_style(Style::default().fg(theme.tile_color(1)))
        .render(combo_layout[1], frame.buffer_mut());

    // --- Boosters ---
    let boosters_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let boosters_inner = boosters_block.inner(chunks[6]);
    boosters_block.render(chunks[6], frame.buffer_mut());
    let booster_line = |key: &str, name: &str, count: u32| {
        let style = if count > 0 { fg_style } else { dim_style };
        Line::from(vec![
            Span::styled(format!("[{key}] "), title_style),
            Span::styled(format!("{name:<9} x{count}"), style),
        ])
    };
    let booster_lines = vec![
        booster_line("1", "Shuffle", progress.boosters.shuffle),
        booster_line("2", "Bomb", progress.boosters.bomb),
        booster_line("3", "ExtraTime", progress.boosters.extra_time),
    ];
    Paragraph::new(ratatui::text::Text::from(booster_lines))
        .render(boosters_inner, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_round_over(frame: &mut Frame, theme: &Theme, result: &RoundResult, area: Rect) {
    let popup_w = 40u16;
    let popup_h = 13u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let (title, title_style) = if result.completed {
        (
            " Level complete! ",
            Style::default().fg(Color::Black).bg(Color::Green),
        )
    } else {
        (
            " Time's up! ",
            Style::default().fg(Color::White).bg(Color::Red),
        )
    };
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(title, title_style)),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Level {}: {} ", result.level, level_name(result.level)),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Score: {} / {} ", result.score, Progress::goal_for(result.level)),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Best: {} ", result.best),
            Style::default().fg(theme.main_fg),
        )),
    ];
    if result.new_best {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }
    lines.push(Line::from(""));
    let next = if result.completed && (result.level as usize) < LEVEL_COUNT {
        "N — Next    "
    } else {
        ""
    };
    lines.push(Line::from(Span::styled(
        format!(" R — Retry    {}M — Menu    Q — Quit ", next),
        Style::default().fg(theme.main_fg),
    )));
    lines.push(Line::from(""));
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Glowmatch ", Style::default().fg(theme.title))),
    );
    p.render(popup, frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let qw = 24;
    let qh = 8;
    let quit_rect = Rect {
        x: area.x + area.width.saturating_sub(qw) / 2,
        y: area.y + area.height.saturating_sub(qh) / 2,
        width: qw,
        height: qh,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        frame.buffer_mut().set_string(rx, ry, label, style);
    }
}
