use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use portal_core::controls::DeviceControl;
use portal_core::state::ChatAuthor;
use portal_core::tiles::{self, AgentTile, Align, Placement, TileInputs, TileSize, GRID_COLUMNS, GRID_ROWS};
use portal_core::{CallState, ThemeMode, TrackSource};

use crate::app::{App, InputMode, LoginField, Screen};
use crate::landing::{self, FEATURES, STATS};

const PRE_CONNECT_HINT: &str = "Agent is listening, ask it a question";

/// Colors for the effective theme
#[derive(Debug, Clone, Copy)]
struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    border: Color,
    key_bg: Color,
    key_fg: Color,
    danger: Color,
}

impl Palette {
    fn for_theme(dark: bool) -> Self {
        if dark {
            Self {
                bg: Color::Black,
                fg: Color::White,
                muted: Color::DarkGray,
                accent: Color::LightMagenta,
                border: Color::Gray,
                key_bg: Color::DarkGray,
                key_fg: Color::White,
                danger: Color::LightRed,
            }
        } else {
            Self {
                bg: Color::White,
                fg: Color::Black,
                muted: Color::Gray,
                accent: Color::Magenta,
                border: Color::DarkGray,
                key_bg: Color::Gray,
                key_fg: Color::Black,
                danger: Color::Red,
            }
        }
    }

    fn key(&self) -> Style {
        Style::default().bg(self.key_bg).fg(self.key_fg)
    }

    fn label(&self) -> Style {
        Style::default().fg(self.fg)
    }
}

/// Word wrap to the given width, keeping at least one (possibly empty) line.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn hint<'a>(palette: &Palette, key: &'a str, label: &'a str) -> [Span<'a>; 2] {
    [
        Span::styled(format!(" {} ", key), palette.key()),
        Span::styled(format!(" {} ", label), palette.label()),
    ]
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

pub fn render(app: &App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.theme.is_dark());

    frame.render_widget(Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)), area);

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &palette, frame, header_area);

    match app.screen {
        Screen::Landing => render_landing(app, &palette, frame, body_area),
        Screen::Session => render_session(app, &palette, frame, body_area),
    }

    render_footer(app, &palette, frame, footer_area);

    if app.show_login {
        render_login(app, &palette, frame, area);
    }
    if app.toast.is_some() {
        render_toast(app, &palette, frame, area);
    }
}

fn render_header(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let theme_label = match (app.theme.get(), app.theme.is_dark()) {
        (ThemeMode::System, true) => "system (dark)",
        (ThemeMode::System, false) => "system (light)",
        (_, true) => "dark",
        (_, false) => "light",
    };

    let mut spans = vec![Span::styled(" Agent Portal ", Style::default().fg(palette.accent).bold())];
    if app.screen == Screen::Session {
        spans.push(Span::styled(
            format!("[{}] ", app.session.call_state().as_str()),
            Style::default().fg(palette.muted),
        ));
    }
    spans.push(Span::styled(format!("theme: {} ", theme_label), Style::default().fg(palette.muted)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_footer(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    if app.show_login {
        spans.extend(hint(palette, "Tab", "field"));
        spans.extend(hint(palette, "^R", "show password"));
        spans.extend(hint(palette, "Enter", "sign in"));
        spans.extend(hint(palette, "Esc", "close"));
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Landing, _) => {
                spans.extend(hint(palette, "Enter", "start"));
                spans.extend(hint(palette, "←/→", "stats"));
                spans.extend(hint(palette, "t", "theme"));
                spans.extend(hint(palette, "q", "quit"));
            }
            (Screen::Session, InputMode::Normal) => {
                spans.extend(hint(palette, "t", "theme"));
                spans.extend(hint(palette, "q", "quit"));
            }
            (Screen::Session, InputMode::Editing) => {
                spans.extend(hint(palette, "Enter", "send"));
                spans.extend(hint(palette, "Esc", "stop typing"));
            }
        }
    }
    if app.toast.is_some() && !app.show_login {
        spans.extend(hint(palette, "Esc", "dismiss"));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_landing(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let [left, right] = Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)])
        .margin(1)
        .areas(area);

    let now = tokio::time::Instant::now();
    let mut lines = vec![
        Line::from(Span::styled(
            landing::TAGLINE.to_uppercase(),
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(Span::styled(landing::HEADLINE, Style::default().bold())),
        Line::from(Span::styled(
            landing::HEADLINE_ACCENT,
            Style::default().fg(palette.accent).bold(),
        )),
        Line::default(),
        Line::from(Span::styled(landing::INTRO, Style::default().fg(palette.muted))),
        Line::default(),
    ];

    for feature in FEATURES.iter().take(app.landing.visible_features(now)) {
        lines.push(Line::from(vec![
            Span::styled("▸ ", Style::default().fg(palette.accent)),
            Span::styled(feature.title, Style::default().bold()),
        ]));
        lines.push(Line::from(Span::styled(
            format!("  {}", feature.description),
            Style::default().fg(palette.muted),
        )));
        lines.push(Line::default());
    }

    let button_style = if app.landing_disabled() {
        Style::default().fg(palette.muted)
    } else {
        Style::default().bg(palette.accent).fg(palette.bg).bold()
    };
    lines.push(Line::from(Span::styled(format!("  {}  ", app.start_button_text), button_style)));

    frame.render_widget(Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true }), left);

    let stat = app.landing.current_stat();
    let dots: Vec<Span> = (0..STATS.len())
        .map(|i| {
            if i == app.landing.stat_index() {
                Span::styled("━━ ", Style::default().fg(palette.accent))
            } else {
                Span::styled("• ", Style::default().fg(palette.muted))
            }
        })
        .collect();

    let stat_text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(stat.value, Style::default().fg(palette.accent).bold())),
        Line::from(Span::styled(stat.label, Style::default().bold())),
        Line::from(Span::styled(stat.sublabel, Style::default().fg(palette.muted))),
        Line::default(),
        Line::from(dots),
    ]);

    let stat_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.border));
    let stat_area = centered(right, right.width, 9);
    frame.render_widget(
        Paragraph::new(stat_text).alignment(Alignment::Center).block(stat_block),
        stat_area,
    );
}

fn render_login(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 50, 11);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.accent))
        .title(" Sign in ")
        .style(Style::default().bg(palette.bg));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let form = &app.login;
    let field = |label: &str, value: String, focused: bool| -> Line<'static> {
        let marker = if focused { "> " } else { "  " };
        let value_style = if focused {
            Style::default().fg(palette.accent)
        } else {
            Style::default().fg(palette.fg)
        };
        Line::from(vec![
            Span::raw(marker.to_string()),
            Span::styled(format!("{:<10}", label), Style::default().fg(palette.muted)),
            Span::styled(value, value_style),
        ])
    };

    let password = if form.show_password {
        form.password.clone()
    } else {
        "•".repeat(form.password.chars().count())
    };

    let mut lines = vec![
        field("Username", form.username.clone(), form.focus == LoginField::Username),
        Line::default(),
        field("Password", password, form.focus == LoginField::Password),
        Line::from(Span::styled(
            format!("  [{}] show password", if form.show_password { "x" } else { " " }),
            Style::default().fg(palette.muted),
        )),
        Line::default(),
    ];

    if form.loading {
        let dots = ".".repeat(app.animation_frame as usize % 3 + 1);
        lines.push(Line::from(Span::styled(
            format!("  Signing in{}", dots),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(format!("  {}", error), Style::default().fg(palette.danger))));
    }

    frame.render_widget(Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }), inner);

    if !form.loading {
        let (row, len) = match form.focus {
            LoginField::Username => (0, form.username.chars().count()),
            LoginField::Password => (2, form.password.chars().count()),
        };
        let x = inner.x + 12 + len as u16;
        if x < inner.x + inner.width {
            frame.set_cursor_position((x, inner.y + row));
        }
    }
}

fn render_toast(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let Some(toast) = &app.toast else {
        return;
    };

    let width = 56.min(area.width);
    let mut lines = vec![Line::from(Span::styled(toast.body.clone(), Style::default().fg(palette.fg)))];
    if let Some((text, link)) = &toast.link {
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", text), Style::default().fg(palette.muted)),
            Span::styled(link.clone(), Style::default().fg(palette.accent).add_modifier(Modifier::UNDERLINED)),
        ]));
    }
    let text_lines: usize = lines
        .iter()
        .map(|l| wrap_text_to_width(&l.to_string(), width.saturating_sub(2) as usize).len())
        .sum();
    // Sits one row below the top edge, so it gets one row less
    let height = (text_lines as u16 + 2).min(area.height.saturating_sub(1));
    if height == 0 || width == 0 {
        return;
    }

    let toast_area = Rect::new(area.x + area.width - width, area.y + 1, width, height);
    frame.render_widget(Clear, toast_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.danger))
        .title(format!(" {} ", toast.title))
        .style(Style::default().bg(palette.bg));
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block).wrap(Wrap { trim: true }), toast_area);
}

fn render_session(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let chat_open = app.controls.chat_open();
    let hint_height = u16::from(show_pre_connect_hint(app));

    let [media_area, hint_area, controls_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(hint_height),
        Constraint::Length(3),
    ])
    .areas(area);

    let tiles_area = if chat_open {
        let [tiles_area, chat_area] =
            Layout::vertical([Constraint::Length(8), Constraint::Min(0)]).areas(media_area);
        render_chat(app, palette, frame, chat_area);
        tiles_area
    } else {
        media_area
    };

    render_tiles(app, palette, frame, tiles_area);

    if hint_height > 0 {
        frame.render_widget(
            Paragraph::new(Span::styled(PRE_CONNECT_HINT, Style::default().fg(palette.muted)))
                .alignment(Alignment::Center),
            hint_area,
        );
    }

    render_controls(app, palette, frame, controls_area);
}

fn show_pre_connect_hint(app: &App) -> bool {
    app.session.capabilities().pre_connect_buffer_enabled
        && app.session.is_active()
        && app.session.feed_is_empty()
}

/// Cell range of `placement` within a `GRID_COLUMNS` x `GRID_ROWS` grid.
fn grid_rect(area: Rect, placement: &Placement) -> Rect {
    let cell_w = area.width / GRID_COLUMNS;
    let cell_h = area.height / GRID_ROWS;
    let x = area.x + cell_w * (placement.col - 1);
    let y = area.y + cell_h * (placement.row - 1);

    // The last column and row absorb the rounding remainder
    let width = if placement.col - 1 + placement.col_span >= GRID_COLUMNS {
        area.x + area.width - x
    } else {
        cell_w * placement.col_span
    };
    let height = if placement.row - 1 + placement.row_span >= GRID_ROWS {
        area.y + area.height - y
    } else {
        cell_h * placement.row_span
    };
    Rect::new(x, y, width, height)
}

fn aligned(area: Rect, width: u16, align: Align) -> Rect {
    let width = width.min(area.width);
    let x = match align {
        Align::Start => area.x,
        Align::Center => area.x + (area.width - width) / 2,
        Align::End => area.x + area.width - width,
    };
    Rect::new(x, area.y, width, area.height)
}

fn render_tiles(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let layout = tiles::layout(TileInputs {
        chat_open: app.controls.chat_open(),
        agent_state: app.session.call_state(),
        agent_video: app.session.agent_video_present(),
        camera_enabled: app.session.local_track_enabled(TrackSource::Camera),
        screen_share_enabled: app.session.local_track_enabled(TrackSource::ScreenShare),
    });

    let agent_cell = grid_rect(area, &layout.agent_placement);
    let agent_width = match layout.agent_size {
        TileSize::Compact => 30,
        TileSize::Full => agent_cell.width.saturating_sub(4).max(30),
    };
    let agent_rect = aligned(agent_cell, agent_width, layout.agent_placement.align);
    render_agent_tile(app, palette, frame, agent_rect, layout.agent);

    let Some(placement) = layout.second_placement else {
        return;
    };
    let cell = grid_rect(area, &placement);
    let rect = aligned(cell, 24 * layout.second.len() as u16, placement.align);
    frame.render_widget(Clear, rect);

    let constraints = vec![Constraint::Ratio(1, layout.second.len() as u32); layout.second.len()];
    let areas = Layout::horizontal(constraints).split(rect);
    for (source, tile_area) in layout.second.iter().zip(areas.iter()) {
        let label = match source {
            TrackSource::ScreenShare => "sharing your screen",
            _ => "your camera is on",
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(palette.border))
            .title(format!(" {} ", source.display_name()))
            .style(Style::default().bg(palette.bg));
        frame.render_widget(
            Paragraph::new(Span::styled(label, Style::default().fg(palette.muted)))
                .alignment(Alignment::Center)
                .block(block),
            *tile_area,
        );
    }
}

/// Bar heights for the audio visualizer at the given frame.
fn visualizer_bars(state: CallState, frame: u8) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let f = frame as usize;
    (0..5)
        .map(|i| {
            let level = match state {
                CallState::Speaking => (i * 3 + f * 5) % LEVELS.len(),
                CallState::Thinking => {
                    if i == f % 5 {
                        4
                    } else {
                        1
                    }
                }
                CallState::Listening => [1, 2, 3, 2, 1][i],
                _ => 0,
            };
            LEVELS[level]
        })
        .flat_map(|c| [c, ' '])
        .collect()
}

fn render_agent_tile(app: &App, palette: &Palette, frame: &mut Frame, area: Rect, tile: AgentTile) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.accent))
        .title(" Agent ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match tile {
        AgentTile::Avatar => vec![
            Line::from(Span::styled("◉", Style::default().fg(palette.accent).bold())),
            Line::from(Span::styled("avatar video", Style::default().fg(palette.muted))),
        ],
        AgentTile::Audio(state) => vec![
            Line::from(Span::styled(
                visualizer_bars(state, app.animation_frame),
                Style::default().fg(palette.accent),
            )),
            Line::from(Span::styled(state.as_str(), Style::default().fg(palette.muted))),
        ],
    };

    let top = inner.y + inner.height.saturating_sub(lines.len() as u16) / 2;
    let content = Rect::new(inner.x, top, inner.width, inner.height.min(lines.len() as u16));
    frame.render_widget(Paragraph::new(Text::from(lines)).alignment(Alignment::Center), content);
}

fn render_chat(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let [history_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title(" Chat ");
    let inner_width = history_area.width.saturating_sub(2) as usize;
    let inner_height = history_area.height.saturating_sub(2) as usize;

    let mut lines: Vec<Line> = Vec::new();
    if app.session.feed_is_empty() {
        lines.push(Line::from(Span::styled(
            "Start a conversation...",
            Style::default().fg(palette.muted),
        )));
    } else {
        for message in app.session.feed() {
            let author_style = match message.author {
                ChatAuthor::Local => Style::default().fg(palette.accent).bold(),
                ChatAuthor::Remote => Style::default().fg(palette.fg).bold(),
            };
            let time = message.timestamp.with_timezone(&Local).format("%H:%M");
            lines.push(Line::from(vec![
                Span::styled(message.author.label(), author_style),
                Span::styled(format!(" {}", time), Style::default().fg(palette.muted)),
            ]));
            for wrapped in wrap_text_to_width(&message.text, inner_width) {
                lines.push(Line::from(wrapped));
            }
            lines.push(Line::default());
        }
    }

    // Keep the newest entry in view
    let scroll = lines.len().saturating_sub(inner_height) as u16;
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block).scroll((scroll, 0)), history_area);

    let editing = app.input_mode == InputMode::Editing;
    let enabled = app.chat_input_enabled();
    let input_text = if app.session.is_sending() {
        Span::styled(
            format!("Sending{}", ".".repeat(app.animation_frame as usize % 3 + 1)),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )
    } else if let Some(status) = &app.chat_status {
        Span::styled(status.clone(), Style::default().fg(palette.danger))
    } else if app.chat_input.is_empty() && !editing {
        Span::styled("Type something...", Style::default().fg(palette.muted))
    } else {
        Span::raw(app.chat_input.clone())
    };
    let border = if editing && enabled { palette.accent } else { palette.border };
    let input = Paragraph::new(Line::from(input_text)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    frame.render_widget(input, input_area);

    if editing && enabled {
        let x = input_area.x + 1 + app.chat_input.chars().count() as u16;
        if x < input_area.x + input_area.width - 1 {
            frame.set_cursor_position((x, input_area.y + 1));
        }
    }
}

fn device_span<'a>(palette: &Palette, key: &'a str, name: &'a str, control: DeviceControl, usable: bool) -> Vec<Span<'a>> {
    let (state, style) = if !control.available {
        ("unavailable", Style::default().fg(palette.danger))
    } else if control.pending {
        ("…", Style::default().fg(palette.muted))
    } else if control.enabled {
        ("on", Style::default().fg(palette.accent).bold())
    } else {
        ("off", Style::default().fg(palette.muted))
    };
    let key_style = if usable {
        palette.key()
    } else {
        Style::default().fg(palette.muted)
    };
    vec![
        Span::styled(format!(" {} ", key), key_style),
        Span::styled(format!(" {} ", name), palette.label()),
        Span::styled(format!("{}  ", state), style),
    ]
}

fn render_controls(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let visible = app.controls.visible();
    let mut spans = Vec::new();

    spans.extend(device_span(
        palette,
        "m",
        "mic",
        app.controls.device(TrackSource::Microphone),
        app.controls.can_toggle(TrackSource::Microphone),
    ));
    if visible.camera {
        spans.extend(device_span(
            palette,
            "v",
            "camera",
            app.controls.device(TrackSource::Camera),
            app.controls.can_toggle(TrackSource::Camera),
        ));
    }
    if visible.screen_share {
        spans.extend(device_span(
            palette,
            "s",
            "screen",
            app.controls.device(TrackSource::ScreenShare),
            app.controls.can_toggle(TrackSource::ScreenShare),
        ));
    }
    if visible.chat {
        let chat_state = if app.controls.chat_open() { "open" } else { "closed" };
        let key_style = if app.session.agent_present() {
            palette.key()
        } else {
            Style::default().fg(palette.muted)
        };
        spans.push(Span::styled(" c ", key_style));
        spans.push(Span::styled(" chat ", palette.label()));
        spans.push(Span::styled(format!("{}  ", chat_state), Style::default().fg(palette.muted)));
    }
    if visible.leave {
        spans.push(Span::styled(" x ", Style::default().bg(palette.danger).fg(palette.bg)));
        spans.push(Span::styled(" end call ", Style::default().fg(palette.danger)));
    }

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(palette.border));
    frame.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center).block(block),
        area,
    );
}
