use crate::{
    binding::GameContract,
    game::{ConnectionState, FormState, GameController},
    sessions::{SessionRecord, guess_label},
};
use color_eyre::eyre::{Result, eyre};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use fuels::types::{Address, ContractId};
use ratatui::{prelude::*, widgets::*};
use std::io::stdout;

const SCROLL_PAGE: usize = 5;
const SESSIONS_HEIGHT: u16 = 14;

pub enum UserEvent {
    Quit,
    Redraw,
    Connect { password: String },
    Play,
    Reload,
}

pub type InputEventReceiver = EventStream;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    focus: Focus,
    session_scroll: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    PasswordModal(PasswordState),
    QuitModal,
}

#[derive(Clone, Debug, Default)]
struct PasswordState {
    input: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Focus {
    #[default]
    Wager,
    DisplayNumber,
    Guess,
    PlayButton,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Wager => Focus::DisplayNumber,
            Focus::DisplayNumber => Focus::Guess,
            Focus::Guess => Focus::PlayButton,
            Focus::PlayButton => Focus::Wager,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Wager => Focus::PlayButton,
            Focus::DisplayNumber => Focus::Wager,
            Focus::Guess => Focus::DisplayNumber,
            Focus::PlayButton => Focus::Guess,
        }
    }
}

/// Everything one frame needs, borrowed from the controller.
pub struct ViewModel<'a> {
    pub wallet_name: &'a str,
    pub network_url: &'a str,
    pub connecting: bool,
    pub connection: &'a ConnectionState,
    pub contract_id: Option<ContractId>,
    pub form: &'a FormState,
    pub sessions: &'a [SessionRecord],
    pub decimals: u32,
    pub status: &'a str,
    pub errors: &'a [String],
}

impl<'a> ViewModel<'a> {
    pub fn new<C: GameContract>(
        controller: &'a GameController<C>,
        wallet_name: &'a str,
        network_url: &'a str,
        connecting: bool,
    ) -> Self {
        Self {
            wallet_name,
            network_url,
            connecting,
            connection: controller.connection(),
            contract_id: controller.contract_id(),
            form: &controller.form,
            sessions: controller.sessions(),
            decimals: controller.decimals(),
            status: controller.status(),
            errors: controller.errors(),
        }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, view: &ViewModel) -> Result<()> {
    let visible = usize::from(SESSIONS_HEIGHT.saturating_sub(3));
    let max_scroll = view.sessions.len().saturating_sub(visible);
    state.session_scroll = state.session_scroll.min(max_scroll);
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, view))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a terminal event onto UI state and form edits. Returns the action the
/// loop has to carry out, if any.
pub fn interpret_event(
    state: &mut UiState,
    form: &mut FormState,
    connected: bool,
    event: Event,
) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    // raw mode swallows SIGINT
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }

    match &mut state.mode {
        Mode::QuitModal => {
            return match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::PasswordModal(ps) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let password = std::mem::take(&mut ps.input);
                    state.mode = Mode::Normal;
                    Some(UserEvent::Connect { password })
                }
                KeyCode::Backspace => {
                    ps.input.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) => {
                    ps.input.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    if matches!(k.code, KeyCode::Char('q') | KeyCode::Esc) {
        state.mode = Mode::QuitModal;
        return Some(UserEvent::Redraw);
    }

    if !connected {
        return match k.code {
            KeyCode::Enter => {
                state.mode = Mode::PasswordModal(PasswordState::default());
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }

    Some(match k.code {
        KeyCode::Tab => {
            state.focus = state.focus.next();
            UserEvent::Redraw
        }
        KeyCode::BackTab => {
            state.focus = state.focus.prev();
            UserEvent::Redraw
        }
        KeyCode::Enter => UserEvent::Play,
        KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => {
            form.toggle_guess();
            UserEvent::Redraw
        }
        KeyCode::Up => {
            state.session_scroll = state.session_scroll.saturating_sub(1);
            UserEvent::Redraw
        }
        KeyCode::Down => {
            state.session_scroll = state.session_scroll.saturating_add(1);
            UserEvent::Redraw
        }
        KeyCode::PageUp => {
            state.session_scroll = state.session_scroll.saturating_sub(SCROLL_PAGE);
            UserEvent::Redraw
        }
        KeyCode::PageDown => {
            state.session_scroll = state.session_scroll.saturating_add(SCROLL_PAGE);
            UserEvent::Redraw
        }
        KeyCode::Char('r') => UserEvent::Reload,
        KeyCode::Backspace => {
            match state.focus {
                Focus::Wager => form.pop_wager_char(),
                Focus::DisplayNumber => form.pop_display_char(),
                Focus::Guess | Focus::PlayButton => return None,
            }
            UserEvent::Redraw
        }
        KeyCode::Char(c) => {
            let accepted = match state.focus {
                Focus::Wager => form.push_wager_char(c),
                Focus::DisplayNumber => form.push_display_char(c),
                Focus::Guess | Focus::PlayButton => false,
            };
            if !accepted {
                return None;
            }
            UserEvent::Redraw
        }
        _ => return None,
    })
}

fn ui(f: &mut Frame, state: &UiState, view: &ViewModel) {
    f.render_widget(Clear, f.area());
    if view.connection.active {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),               // account
                Constraint::Length(3),               // play form
                Constraint::Length(SESSIONS_HEIGHT), // sessions
                Constraint::Min(4),                  // status/errors
                Constraint::Length(3),               // help
            ])
            .split(f.area());
        draw_account(f, chunks[0], view);
        draw_form(f, state, chunks[1], view);
        draw_sessions(f, state, chunks[2], view);
        draw_bottom(f, chunks[3], view);
        draw_help(f, chunks[4], true);
    } else {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // title
                Constraint::Length(5), // connect control
                Constraint::Min(4),    // status/errors
                Constraint::Length(3), // help
            ])
            .split(f.area());
        let title = Paragraph::new("Guess whether the mystery number is higher or lower")
            .block(Block::default().borders(Borders::ALL).title("Higher / Lower"));
        f.render_widget(title, chunks[0]);
        draw_connect(f, chunks[1], view);
        draw_bottom(f, chunks[2], view);
        draw_help(f, chunks[3], false);
    }
    draw_modals(f, state, view);
}

fn draw_connect(f: &mut Frame, area: Rect, view: &ViewModel) {
    let label = if view.connecting {
        "[ Connecting... ]"
    } else {
        "[ Connect Wallet ]"
    };
    let lines = vec![
        Line::styled(label, Style::default().fg(Color::Yellow).bold()),
        Line::from(format!("Wallet: {} | Node: {}", view.wallet_name, view.network_url)),
    ];
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_account(f: &mut Frame, area: Rect, view: &ViewModel) {
    let account = view
        .connection
        .account
        .as_ref()
        .map(format_address)
        .unwrap_or_default();
    let chain = view
        .connection
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| String::from("?"));
    let contract = match view.contract_id {
        Some(id) => format!("0x{}", hex::encode(id)),
        None => String::from("not configured"),
    };
    let lines = vec![
        Line::from(format!("Connected: {account}")),
        Line::from(format!("Chain: {chain} | Contract: {contract}")),
    ];
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(view.wallet_name));
    f.render_widget(widget, area);
}

fn draw_form(f: &mut Frame, state: &UiState, area: Rect, view: &ViewModel) {
    let form = view.form;
    let style_for = |focus: Focus| {
        if state.focus == focus {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default()
        }
    };
    let play_label = if form.is_submitting {
        "[ Playing... ]"
    } else {
        "[ Play ]"
    };
    let play_style = if form.is_submitting {
        Style::default().fg(Color::DarkGray)
    } else {
        style_for(Focus::PlayButton)
    };
    let line = Line::from(vec![
        Span::raw("Wager: "),
        Span::styled(field_text(&form.wager), style_for(Focus::Wager)),
        Span::raw(" | Number: "),
        Span::styled(field_text(&form.display_number), style_for(Focus::DisplayNumber)),
        Span::raw(" | Guess: "),
        Span::styled(guess_label(form.guess_higher), style_for(Focus::Guess)),
        Span::raw(" | "),
        Span::styled(play_label, play_style),
    ]);
    let widget =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Play"));
    f.render_widget(widget, area);
}

fn field_text(value: &str) -> String {
    if value.is_empty() {
        String::from("_")
    } else {
        value.to_string()
    }
}

fn draw_sessions(f: &mut Frame, state: &UiState, area: Rect, view: &ViewModel) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Player Sessions ({})", view.sessions.len()));
    if view.sessions.is_empty() {
        let empty = Paragraph::new(Line::styled(
            "No sessions found",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec!["Player", "Wager", "Number", "Mystery", "Guess", "Result"])
        .style(Style::default().bold());
    let rows = view.sessions.iter().skip(state.session_scroll).map(|s| {
        let result_style = match s.result_label() {
            "Win" => Style::default().fg(Color::Green),
            _ => Style::default().fg(Color::Red),
        };
        Row::new(vec![
            Cell::from(s.player_label()),
            Cell::from(s.wager_label(view.decimals)),
            Cell::from(s.player_number.to_string()),
            Cell::from(s.mystery_number.to_string()),
            Cell::from(s.guess_label()),
            Cell::from(s.result_label()).style(result_style),
        ])
    });
    let widths = [
        Constraint::Length(68),
        Constraint::Length(16),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(7),
        Constraint::Length(6),
    ];
    let table = Table::new(rows, widths).header(header).block(block);
    f.render_widget(table, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, view: &ViewModel) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let status = if view.status.trim().is_empty() {
        "Ready"
    } else {
        view.status
    };
    let status_widget = Paragraph::new(status)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(Style::default().fg(Color::Green));
    f.render_widget(status_widget, chunks[0]);

    // newest first
    let lines: Vec<Line> = view
        .errors
        .iter()
        .rev()
        .map(|e| Line::from(e.clone()))
        .collect();
    let errors_widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Errors"))
        .style(Style::default().fg(Color::Red));
    f.render_widget(errors_widget, chunks[1]);
}

fn draw_help(f: &mut Frame, area: Rect, connected: bool) {
    let text = if connected {
        "Tab/Shift-Tab field | Space/←/→ higher-lower | Enter play | ↑/↓ PgUp/PgDn scroll | r reload | q/Esc quit"
    } else {
        "Enter connect wallet | q/Esc quit"
    };
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, view: &ViewModel) {
    match &state.mode {
        Mode::PasswordModal(ps) => {
            let area = centered_rect(50, 20, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!("Unlock wallet '{}'", view.wallet_name));
            let lines = vec![
                Line::from(format!("Password: {}", "*".repeat(ps.input.chars().count()))),
                Line::from("(Enter=connect, Esc=cancel)"),
            ];
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the game? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::sessions::tests::round;
    use crossterm::event::KeyEvent;
    use ratatui::backend::TestBackend;

    fn view<'a>(
        connection: &'a ConnectionState,
        form: &'a FormState,
        sessions: &'a [SessionRecord],
    ) -> ViewModel<'a> {
        ViewModel {
            wallet_name: "amy",
            network_url: "http://localhost:4000/",
            connecting: false,
            connection,
            contract_id: Some(ContractId::from([7u8; 32])),
            form,
            sessions,
            decimals: 9,
            status: "Ready",
            errors: &[],
        }
    }

    fn render(state: &UiState, view: &ViewModel) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        terminal.draw(|f| ui(f, state, view)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn connected() -> ConnectionState {
        ConnectionState {
            active: true,
            account: Some(Address::from([9u8; 32])),
            chain_id: Some(0),
        }
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn ui__disconnected_renders_only_connect_control() {
        // given
        let connection = ConnectionState::default();
        let form = FormState::default();

        // when
        let screen = render(&UiState::default(), &view(&connection, &form, &[]));

        // then
        assert!(screen.contains("Connect Wallet"));
        assert!(!screen.contains("Connected:"));
        assert!(!screen.contains("Player Sessions"));
        assert!(!screen.contains("Wager:"));
    }

    #[test]
    fn ui__connected_without_sessions_shows_placeholder() {
        // given
        let connection = connected();
        let form = FormState::default();

        // when
        let screen = render(&UiState::default(), &view(&connection, &form, &[]));

        // then
        assert!(screen.contains(&format!("Connected: 0x{}", "09".repeat(32))));
        assert!(screen.contains("Player Sessions"));
        assert!(screen.contains("No sessions found"));
        assert!(!screen.contains("Connect Wallet"));
    }

    #[test]
    fn ui__lists_session_rows() {
        // given
        let connection = connected();
        let form = FormState::default();
        let sessions = vec![SessionRecord::from(round(0xab, 42))];

        // when
        let screen = render(&UiState::default(), &view(&connection, &form, &sessions));

        // then
        assert!(!screen.contains("No sessions found"));
        assert!(screen.contains(&format!("0x{}", "ab".repeat(32))));
        assert!(screen.contains("0.000001"));
        assert!(screen.contains("42"));
        assert!(screen.contains("Lower"));
        assert!(screen.contains("Lose"));
    }

    #[test]
    fn ui__submitting_form_shows_playing_label() {
        // given
        let connection = connected();
        let form = FormState {
            wager: "1".to_string(),
            display_number: "5".to_string(),
            guess_higher: true,
            is_submitting: true,
        };

        // when
        let screen = render(&UiState::default(), &view(&connection, &form, &[]));

        // then
        assert!(screen.contains("Playing..."));
        assert!(screen.contains("Higher"));
    }

    #[test]
    fn interpret_event__form_fields_accept_numeric_input_only() {
        // given
        let mut state = UiState::default();
        let mut form = FormState::default();

        // when
        for c in "1x.5".chars() {
            interpret_event(&mut state, &mut form, true, key(KeyCode::Char(c)));
        }
        interpret_event(&mut state, &mut form, true, key(KeyCode::Tab));
        for c in "7a".chars() {
            interpret_event(&mut state, &mut form, true, key(KeyCode::Char(c)));
        }

        // then
        assert_eq!(form.wager, "1.5");
        assert_eq!(form.display_number, "7");
    }

    #[test]
    fn interpret_event__connect_screen_prompts_for_password() {
        // given
        let mut state = UiState::default();
        let mut form = FormState::default();

        // when
        interpret_event(&mut state, &mut form, false, key(KeyCode::Enter));
        for c in "pw".chars() {
            interpret_event(&mut state, &mut form, false, key(KeyCode::Char(c)));
        }
        let event = interpret_event(&mut state, &mut form, false, key(KeyCode::Enter));

        // then
        assert!(matches!(event, Some(UserEvent::Connect { password }) if password == "pw"));
        assert!(matches!(state.mode, Mode::Normal));
    }

    #[test]
    fn interpret_event__disconnected_ignores_play_keys() {
        // given
        let mut state = UiState::default();
        let mut form = FormState::default();

        // when
        let reload = interpret_event(&mut state, &mut form, false, key(KeyCode::Char('r')));
        let digit = interpret_event(&mut state, &mut form, false, key(KeyCode::Char('1')));

        // then
        assert!(reload.is_none());
        assert!(digit.is_none());
        assert!(form.wager.is_empty());
    }

    #[test]
    fn interpret_event__quit_requires_confirmation() {
        // given
        let mut state = UiState::default();
        let mut form = FormState::default();

        // when
        let first = interpret_event(&mut state, &mut form, true, key(KeyCode::Char('q')));
        let cancel = interpret_event(&mut state, &mut form, true, key(KeyCode::Char('n')));
        interpret_event(&mut state, &mut form, true, key(KeyCode::Esc));
        let confirm = interpret_event(&mut state, &mut form, true, key(KeyCode::Char('y')));

        // then
        assert!(matches!(first, Some(UserEvent::Redraw)));
        assert!(matches!(cancel, Some(UserEvent::Redraw)));
        assert!(matches!(confirm, Some(UserEvent::Quit)));
    }

    #[test]
    fn interpret_event__enter_and_toggle_when_connected() {
        // given
        let mut state = UiState::default();
        let mut form = FormState::default();

        // when
        interpret_event(&mut state, &mut form, true, key(KeyCode::Char(' ')));
        let play = interpret_event(&mut state, &mut form, true, key(KeyCode::Enter));

        // then
        assert!(!form.guess_higher);
        assert!(matches!(play, Some(UserEvent::Play)));
    }
}
