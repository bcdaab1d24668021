//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, mouse, resize)
//! - WidgetClient for orchestration
//! - DisplayState for rendering
//!
//! The App:
//! 1. Converts terminal events to `WidgetEvent`s
//! 2. Sends them to the embedded widget via `WidgetClient`
//! 3. Receives `WidgetMessage`s and updates `DisplayState`
//! 4. Renders based on `DisplayState`

use std::time::{Duration, Instant};

use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use widget_core::{Role, SendMode, View, WidgetApi};

use crate::display::DisplayState;
use crate::theme::{self, DIM_GRAY, ERROR_RED, TOOLTIP_BG, USER_GREEN};
use crate::widget_client::WidgetClient;

/// Chat input height (lines, including its separator)
const INPUT_HEIGHT: u16 = 4;

/// Widest the open panel gets
const PANEL_WIDTH: u16 = 52;

/// Launcher button size
const LAUNCHER_SIZE: (u16, u16) = (9, 3);

/// Placeholder when the server sends none
const DEFAULT_PLACEHOLDER: &str = "Type your message...";

/// Main application state
pub struct App<A: WidgetApi + 'static> {
    // === Core State ===
    /// Is the app still running?
    running: bool,

    // === Widget Integration ===
    /// Client for communicating with the embedded widget
    client: WidgetClient<A>,
    /// Display state derived from `WidgetMessage`s
    display: DisplayState,

    // === Input State ===
    /// Chat input buffer
    input_buffer: String,
    /// Scroll offset (lines from bottom, 0 = latest)
    scroll_offset: usize,
    /// Total rendered transcript lines (for scroll bounds)
    total_lines: usize,
    /// Where the launcher was last drawn (for mouse hit-testing)
    launcher: Rect,
    /// Pointer currently over the launcher
    hovering: bool,

    // === Misc State ===
    /// Last frame time (for timers)
    last_frame: Instant,
}

impl<A: WidgetApi + 'static> App<A> {
    /// Create a new App around an unmounted widget
    pub fn new(client: WidgetClient<A>) -> Self {
        Self {
            running: true,
            client,
            display: DisplayState::new(),
            input_buffer: String::new(),
            scroll_offset: 0,
            total_lines: 0,
            launcher: Rect::default(),
            hovering: false,
            last_frame: Instant::now(),
        }
    }

    /// Current display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Current chat input
    pub fn input(&self) -> &str {
        &self.input_buffer
    }

    /// Whether the app is still running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Mount the widget and pick up its first messages
    pub async fn start(&mut self) {
        self.client.mount().await;
        self.process_widget_messages();
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        // ~30 FPS is plenty for a chat panel
        let frame_duration = Duration::from_millis(33);

        // Create async event stream for non-blocking terminal events
        let mut event_stream = EventStream::new();

        // Render initial frame immediately so the visitor sees "Connecting..."
        self.render(terminal)?;
        self.start().await;

        while self.running {
            let frame_start = Instant::now();

            tokio::select! {
                biased;

                // Terminal events - highest priority
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => self.handle_terminal_event(event).await,
                        Some(Err(e)) => tracing::warn!("Terminal event error: {}", e),
                        None => self.running = false,
                    }
                }

                // Frame tick
                _ = tokio::time::sleep(Duration::from_millis(16)) => {}
            }

            self.tick().await;
            self.render(terminal)?;

            // Frame rate limiting
            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                tokio::time::sleep(frame_duration - elapsed).await;
            }
        }

        self.client.unmount().await;
        Ok(())
    }

    /// Process widget work and messages, then advance timers
    pub async fn tick(&mut self) {
        self.client.poll().await;
        self.process_widget_messages();

        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.display.update(delta);
    }

    /// Apply all pending messages from the widget
    fn process_widget_messages(&mut self) {
        for msg in self.client.recv_all() {
            self.display.apply_message(msg);
        }
    }

    async fn handle_terminal_event(&mut self, event: Event) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse).await,
            _ => {}
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Handle keyboard input
    pub async fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
                return;
            }
            // Launcher
            KeyCode::F(2) => {
                self.client.toggle_panel().await;
                return;
            }
            KeyCode::F(5) => {
                self.client.refresh().await;
                return;
            }
            _ => {}
        }

        if !self.display.panel_open {
            match key.code {
                KeyCode::Enter | KeyCode::Char(' ') => self.client.toggle_panel().await,
                KeyCode::Esc | KeyCode::Char('q') => self.running = false,
                _ => {}
            }
            return;
        }

        match self.display.view {
            Some(View::Form) => self.handle_form_key(key).await,
            Some(View::StarterQuestions) => self.handle_starter_key(key).await,
            Some(View::Chat) => self.handle_chat_key(key).await,
            None => {}
        }
    }

    async fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.client.toggle_panel().await,
            KeyCode::Tab | KeyCode::Down => self.display.form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.display.form.focus_prev(),
            KeyCode::Enter => self.client.submit_form().await,
            KeyCode::Char(c) => {
                if let Some((name, value)) = self.display.form.input(c) {
                    self.client.field_changed(&name, &value).await;
                }
            }
            KeyCode::Backspace => {
                if let Some((name, value)) = self.display.form.backspace() {
                    self.client.field_changed(&name, &value).await;
                }
            }
            _ => {}
        }
    }

    async fn handle_starter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.client.toggle_panel().await,
            KeyCode::Up => self.display.starters.select_prev(),
            KeyCode::Down => self.display.starters.select_next(),
            KeyCode::Enter => {
                if let Some(question) = self.display.starters.selected() {
                    let question = question.to_string();
                    self.client.choose_starter(question).await;
                }
            }
            KeyCode::Char('s') => self.client.skip_starters().await,
            _ => {}
        }
    }

    async fn handle_chat_key(&mut self, key: KeyEvent) {
        let busy = self.display.send_mode == SendMode::Cancel;
        match key.code {
            KeyCode::Esc if busy => self.client.cancel().await,
            KeyCode::Esc => self.client.toggle_panel().await,
            KeyCode::Enter if busy => self.client.cancel().await,
            KeyCode::Enter => {
                if self.display.input_enabled && !self.input_buffer.trim().is_empty() {
                    let text = std::mem::take(&mut self.input_buffer);
                    self.client.send_message(text).await;
                    self.scroll_offset = 0;
                }
            }
            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::PageUp => {
                let max_scroll = self.total_lines.saturating_sub(1);
                self.scroll_offset = (self.scroll_offset + 5).min(max_scroll);
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(5);
            }
            _ => {}
        }
    }

    /// Handle mouse input
    async fn handle_mouse(&mut self, mouse: MouseEvent) {
        let over_launcher = self.launcher.contains(Position::new(mouse.column, mouse.row));
        match mouse.kind {
            MouseEventKind::Moved => {
                if over_launcher && !self.hovering && !self.display.panel_open {
                    self.client.launcher_hovered().await;
                }
                self.hovering = over_launcher;
            }
            MouseEventKind::Down(MouseButton::Left) if over_launcher => {
                self.client.toggle_panel().await;
            }
            MouseEventKind::ScrollUp => {
                self.scroll_offset = (self.scroll_offset + 3).min(self.total_lines.saturating_sub(1));
            }
            MouseEventKind::ScrollDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
            }
            _ => {}
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the UI
    pub fn render<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        terminal.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [main, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());

        let accent = theme::accent(self.display.appearance.primary_color.as_deref());
        let left = self.display.appearance.left;

        self.launcher = corner_rect(main, LAUNCHER_SIZE.0, LAUNCHER_SIZE.1, left);
        let above_launcher = Rect {
            height: main.height.saturating_sub(self.launcher.height),
            ..main
        };

        if self.display.panel_open {
            let panel = corner_rect(above_launcher, PANEL_WIDTH, above_launcher.height, left);
            self.draw_panel(frame, panel, accent);
        } else if let Some(welcome) = &self.display.welcome {
            let width = (welcome.chars().count() as u16 + 4).min(above_launcher.width);
            let tooltip = corner_rect(above_launcher, width, 3, left);
            frame.render_widget(Clear, tooltip);
            frame.render_widget(
                Paragraph::new(welcome.as_str())
                    .block(Block::bordered().border_style(Style::default().fg(accent)))
                    .style(Style::default().bg(TOOLTIP_BG)),
                tooltip,
            );
        }

        let icon = if self.display.panel_open {
            "✕".to_string()
        } else {
            self.display
                .appearance
                .widget_icon
                .clone()
                .unwrap_or_else(|| "💬".to_string())
        };
        frame.render_widget(
            Paragraph::new(icon)
                .centered()
                .block(Block::bordered().border_style(Style::default().fg(accent))),
            self.launcher,
        );

        frame.render_widget(
            Paragraph::new(self.status_line()).style(Style::default().fg(DIM_GRAY)),
            status,
        );
    }

    fn draw_panel(&mut self, frame: &mut Frame, panel: Rect, accent: Color) {
        let look = &self.display.appearance;
        let avatar = if look.avatar_url.is_some() { "◉" } else { "●" };
        let block = Block::bordered()
            .border_style(Style::default().fg(accent))
            .title(Line::styled(
                format!(" {avatar} {} ", self.bot_name()),
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(panel);
        frame.render_widget(Clear, panel);
        frame.render_widget(block, panel);

        let header_height = u16::from(look.subheading.is_some());
        let footer_height = u16::from(look.show_branding);
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(header_height),
            Constraint::Min(1),
            Constraint::Length(footer_height),
        ])
        .areas(inner);

        if let Some(sub) = &look.subheading {
            frame.render_widget(
                Paragraph::new(sub.as_str()).style(Style::default().fg(DIM_GRAY)),
                header,
            );
        }
        if look.show_branding {
            frame.render_widget(
                Paragraph::new("powered by chatbot")
                    .right_aligned()
                    .style(Style::default().fg(DIM_GRAY)),
                footer,
            );
        }

        match self.display.view {
            Some(View::Form) => self.draw_form(frame, body, accent),
            Some(View::StarterQuestions) => self.draw_starters(frame, body, accent),
            Some(View::Chat) => self.draw_chat(frame, body, accent),
            None => {}
        }
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, accent: Color) {
        let form = &self.display.form;
        let mut lines = Vec::new();

        for (i, field) in form.fields.iter().enumerate() {
            let focused = i == form.focus;
            let label = if field.label.is_empty() {
                &field.name
            } else {
                &field.label
            };
            let marker = if field.required { " *" } else { "" };
            lines.push(Line::styled(
                format!("{label}{marker}"),
                Style::default().add_modifier(Modifier::BOLD),
            ));

            let value = form.value(&field.name);
            let (shown, style) = if focused {
                (format!("{value}_"), Style::default().fg(accent))
            } else if value.is_empty() {
                (
                    field.placeholder.clone().unwrap_or_default(),
                    Style::default().fg(DIM_GRAY),
                )
            } else {
                (value.to_string(), Style::default())
            };
            lines.push(Line::styled(format!("  > {shown}"), style));

            if let Some((name, message)) = &form.invalid {
                if name == &field.name {
                    lines.push(Line::styled(
                        format!("    {message}"),
                        Style::default().fg(ERROR_RED),
                    ));
                }
            }
            lines.push(Line::default());
        }

        let submit_style = if form.submitting {
            Style::default().fg(DIM_GRAY)
        } else if form.submit_focused() {
            Style::default().fg(Color::Black).bg(accent)
        } else {
            Style::default().fg(accent)
        };
        lines.push(Line::styled(format!("[ {} ]", form.label), submit_style));

        if let Some(error) = &form.error {
            lines.push(Line::styled(
                error.text.clone(),
                Style::default().fg(ERROR_RED),
            ));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
    }

    fn draw_starters(&self, frame: &mut Frame, area: Rect, accent: Color) {
        let starters = &self.display.starters;
        let mut lines = vec![
            Line::styled("Pick a question to get started:", Style::default().fg(DIM_GRAY)),
            Line::default(),
        ];
        for (i, question) in starters.questions.iter().enumerate() {
            if i == starters.cursor {
                lines.push(Line::styled(
                    format!("▸ {question}"),
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ));
            } else {
                lines.push(Line::from(format!("  {question}")));
            }
        }
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
    }

    fn draw_chat(&mut self, frame: &mut Frame, area: Rect, accent: Color) {
        let [history, input] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(INPUT_HEIGHT)]).areas(area);

        let name = self.bot_name();
        let width = usize::from(history.width.saturating_sub(1)).max(1);
        let mut lines: Vec<Line> = Vec::new();

        for entry in &self.display.transcript {
            let (prefix, style) = match entry.role {
                Role::User => ("You: ".to_string(), Style::default().fg(USER_GREEN)),
                Role::Assistant => (format!("{name}: "), Style::default().fg(accent)),
            };
            for line in textwrap::wrap(&format!("{prefix}{}", entry.content), width) {
                lines.push(Line::styled(line.into_owned(), style));
            }
            lines.push(Line::default());
        }
        if self.display.typing {
            lines.push(Line::styled(
                format!("{name} is typing..."),
                Style::default().fg(DIM_GRAY).add_modifier(Modifier::ITALIC),
            ));
        }

        self.total_lines = lines.len();
        let max_scroll = self.total_lines.saturating_sub(usize::from(history.height));
        self.scroll_offset = self.scroll_offset.min(max_scroll);
        let top = u16::try_from(max_scroll - self.scroll_offset).unwrap_or(u16::MAX);
        frame.render_widget(Paragraph::new(lines).scroll((top, 0)), history);

        let mode = self.display.send_mode;
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(DIM_GRAY))
            .title(Line::from(format!(" {} {} ", mode.glyph(), mode.title())).right_aligned());

        let (text, style) = if !self.display.input_enabled {
            ("Loading...".to_string(), Style::default().fg(DIM_GRAY))
        } else if self.input_buffer.is_empty() {
            let placeholder = self
                .display
                .appearance
                .input_placeholder
                .clone()
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());
            (placeholder, Style::default().fg(DIM_GRAY))
        } else {
            (format!("{}_", self.input_buffer), Style::default().fg(USER_GREEN))
        };
        frame.render_widget(
            Paragraph::new(text)
                .style(style)
                .wrap(Wrap { trim: false })
                .block(block),
            input,
        );
    }

    fn bot_name(&self) -> String {
        let title = &self.display.appearance.title;
        if title.is_empty() {
            "Bot".to_string()
        } else {
            title.clone()
        }
    }

    fn status_line(&self) -> String {
        let hints = if !self.display.panel_open {
            "F2/Enter open | Esc quit"
        } else {
            match self.display.view {
                Some(View::Form) => "Tab next field | Enter submit | Esc close",
                Some(View::StarterQuestions) => "Up/Down choose | Enter ask | s skip | Esc close",
                Some(View::Chat) if self.display.send_mode == SendMode::Cancel => {
                    "Enter/Esc stop | PgUp/PgDn scroll"
                }
                Some(View::Chat) => "Enter send | PgUp/PgDn scroll | Esc close",
                None => "Esc close",
            }
        };
        format!(" {} | {} | Ctrl+C quit", self.display.status(), hints)
    }
}

/// A `width` x `height` rect in the bottom-left or bottom-right of `area`
fn corner_rect(area: Rect, width: u16, height: u16, left: bool) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = if left {
        area.x
    } else {
        area.x + area.width - width
    };
    Rect::new(x, area.y + area.height - height, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_rect() {
        let area = Rect::new(0, 0, 80, 20);
        assert_eq!(corner_rect(area, 9, 3, false), Rect::new(71, 17, 9, 3));
        assert_eq!(corner_rect(area, 9, 3, true), Rect::new(0, 17, 9, 3));
        assert_eq!(corner_rect(Rect::new(0, 0, 5, 2), 9, 3, false), Rect::new(0, 0, 5, 2));
    }
}
