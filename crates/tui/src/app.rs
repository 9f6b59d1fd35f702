use std::{cmp, io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use railway_core::{
    registry::{is_well_formed_pnr, normalize_pnr},
    Availability, AppConfig, Booking, BookingOutcome, BookingRequest, BookingStatistics,
    BookingStatus, CancellationOutcome, Reservations, SaveManager, StartupSource, TrainRegistry,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_INPUT_LEN: usize = 48;
const NAME_COLUMN: usize = 20;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

impl Theme {
    fn status_color(&self, status: &BookingStatus) -> Color {
        match status {
            BookingStatus::Confirmed { .. } => self.success,
            BookingStatus::Waitlisted => self.warning,
            BookingStatus::Cancelled => self.muted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Menu,
    Form,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Book,
    Cancel,
    Availability,
    LookupPnr,
    SearchName,
    AllBookings,
    Trains,
    Statistics,
    AddTrain,
    ConfigureSeats,
    Save,
    Exit,
}

impl MenuAction {
    const ALL: [MenuAction; 12] = [
        MenuAction::Book,
        MenuAction::Cancel,
        MenuAction::Availability,
        MenuAction::LookupPnr,
        MenuAction::SearchName,
        MenuAction::AllBookings,
        MenuAction::Trains,
        MenuAction::Statistics,
        MenuAction::AddTrain,
        MenuAction::ConfigureSeats,
        MenuAction::Save,
        MenuAction::Exit,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Book => "Book Ticket",
            Self::Cancel => "Cancel Ticket",
            Self::Availability => "Check Seat Availability",
            Self::LookupPnr => "Search Booking by PNR",
            Self::SearchName => "Search Booking by Name",
            Self::AllBookings => "View All Bookings (Admin)",
            Self::Trains => "View Train List",
            Self::Statistics => "System Statistics",
            Self::AddTrain => "Add Train (Admin)",
            Self::ConfigureSeats => "Configure Seats (Admin)",
            Self::Save => "Save Now",
            Self::Exit => "Exit & Save",
        }
    }

    fn form_fields(self, classes: &str) -> Option<Vec<TextInput>> {
        let admin = || TextInput::masked("Admin password");
        let fields = match self {
            Self::Book => vec![
                TextInput::new("Passenger name"),
                TextInput::new("Age (1-120)"),
                TextInput::new("Gender (M/F)"),
                TextInput::new("Train number"),
                TextInput::new(format!("Class ({classes})")),
            ],
            Self::Cancel | Self::LookupPnr => vec![TextInput::new("PNR")],
            Self::Availability => vec![
                TextInput::new("Train number"),
                TextInput::new(format!("Class ({classes})")),
            ],
            Self::SearchName => vec![TextInput::new("Name contains")],
            Self::AllBookings => vec![admin()],
            Self::AddTrain => vec![
                admin(),
                TextInput::new("Train number"),
                TextInput::new("Train name"),
            ],
            Self::ConfigureSeats => vec![
                admin(),
                TextInput::new("Train number"),
                TextInput::new(format!("Class ({classes})")),
                TextInput::new("Total seats"),
            ],
            Self::Trains | Self::Statistics | Self::Save | Self::Exit => return None,
        };
        Some(fields)
    }
}

#[derive(Debug, Clone)]
struct TextInput {
    label: String,
    input: String,
    cursor: usize,
    masked: bool,
}

impl TextInput {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            input: String::new(),
            cursor: 0,
            masked: false,
        }
    }

    fn masked(label: impl Into<String>) -> Self {
        Self {
            masked: true,
            ..Self::new(label)
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.input.len() as isize;
        let next = (self.cursor as isize + delta).clamp(0, len);
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    fn insert(&mut self, ch: char) {
        if self.input.len() >= MAX_INPUT_LEN {
            return;
        }
        if ch.is_ascii() && !ch.is_ascii_control() {
            self.input.insert(self.cursor, ch);
            self.cursor += ch.len_utf8();
        }
    }

    fn backspace(&mut self) {
        if self.cursor > 0 && self.cursor <= self.input.len() {
            self.cursor -= 1;
            self.input.remove(self.cursor);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.input.len() {
            self.input.remove(self.cursor);
        }
    }

    fn value(&self) -> &str {
        self.input.trim()
    }

    fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.input.len())
        } else {
            self.input.clone()
        }
    }
}

#[derive(Debug, Clone)]
struct FormModal {
    action: MenuAction,
    fields: Vec<TextInput>,
    focus: usize,
    error: Option<String>,
}

impl FormModal {
    fn new(action: MenuAction, fields: Vec<TextInput>) -> Self {
        Self {
            action,
            fields,
            focus: 0,
            error: None,
        }
    }

    fn focused(&mut self) -> Option<&mut TextInput> {
        self.fields.get_mut(self.focus)
    }

    fn move_focus(&mut self, delta: isize) {
        let last = self.fields.len().saturating_sub(1) as isize;
        self.focus = (self.focus as isize + delta).clamp(0, last) as usize;
    }

    fn on_last_field(&self) -> bool {
        self.focus + 1 >= self.fields.len()
    }

    fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(TextInput::value).unwrap_or_default()
    }
}

struct Report {
    title: String,
    lines: Vec<Line<'static>>,
    scroll: u16,
}

impl Report {
    fn new(title: impl Into<String>, lines: Vec<Line<'static>>) -> Self {
        Self {
            title: title.into(),
            lines,
            scroll: 0,
        }
    }

    fn scroll_by(&mut self, delta: i32) {
        let max = self.lines.len().saturating_sub(1) as i32;
        self.scroll = (self.scroll as i32 + delta).clamp(0, max) as u16;
    }
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Terminal front-end for the reservation system.
pub struct RailwayApp {
    config: AppConfig,
    store: SaveManager,
    reservations: Reservations,
    screen: Screen,
    menu_cursor: usize,
    form: Option<FormModal>,
    report: Option<Report>,
    status: String,
    dirty: bool,
    should_quit: bool,
    theme: Theme,
}

impl RailwayApp {
    pub fn new(
        config: AppConfig,
        store: SaveManager,
        reservations: Reservations,
        source: StartupSource,
    ) -> Self {
        let status = match &source {
            StartupSource::Restored => format!(
                "Loaded {} bookings from {}",
                reservations.bookings().len(),
                store.snapshot_path().display()
            ),
            StartupSource::Fresh => "No saved data found; starting with default trains".to_string(),
            StartupSource::Recovered(err) => {
                format!("Could not load saved data ({err}); starting with default trains")
            }
        };
        Self {
            config,
            store,
            reservations,
            screen: Screen::Menu,
            menu_cursor: 0,
            form: None,
            report: None,
            status,
            dirty: false,
            should_quit: false,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

        let outcome = self.event_loop(&mut terminal).await;
        let restored = restore_terminal(&mut terminal);
        self.finish(outcome).and(restored)
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                return Ok(());
            }
            match event_rx.recv().await {
                Some(AppEvent::Input(event)) => {
                    if let Err(err) = self.handle_input(event) {
                        error!(?err, "Input handling failed");
                        self.set_status(format!("Error: {err}"));
                    }
                }
                Some(AppEvent::Tick) => {}
                None => return Ok(()),
            }
        }
    }

    /// Autosave unsaved changes, whether or not the event loop failed.
    fn finish(&mut self, outcome: Result<()>) -> Result<()> {
        if self.config.autosave && self.dirty {
            let saved = self
                .reservations
                .save(&self.store)
                .with_context(|| format!("failed to save {}", self.store.snapshot_path().display()));
            match (&outcome, saved) {
                (_, Ok(())) => self.dirty = false,
                (Ok(()), Err(err)) => return Err(err),
                (Err(_), Err(err)) => error!(?err, "Autosave after failure did not complete"),
            }
        }
        outcome
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn class_hint(&self) -> String {
        self.reservations
            .trains()
            .classes()
            .iter()
            .map(|spec| spec.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }
        match self.screen {
            Screen::Menu => self.handle_menu_key(key),
            Screen::Form => self.handle_form_key(key),
            Screen::Report => {
                self.handle_report_key(key);
                Ok(())
            }
        }
    }

    fn handle_menu_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_menu_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_menu_cursor(-1),
            KeyCode::Char(ch @ '1'..='9') => {
                let index = ch as usize - '1' as usize;
                if index < MenuAction::ALL.len() {
                    self.menu_cursor = index;
                    self.activate(MenuAction::ALL[index])?;
                }
            }
            KeyCode::Enter => {
                if let Some(action) = MenuAction::ALL.get(self.menu_cursor).copied() {
                    self.activate(action)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn move_menu_cursor(&mut self, delta: isize) {
        let last = MenuAction::ALL.len() as isize - 1;
        self.menu_cursor = (self.menu_cursor as isize + delta).clamp(0, last) as usize;
    }

    fn activate(&mut self, action: MenuAction) -> Result<()> {
        info!(?action, "Menu action");
        if let Some(fields) = action.form_fields(&self.class_hint()) {
            self.form = Some(FormModal::new(action, fields));
            self.screen = Screen::Form;
            return Ok(());
        }
        match action {
            MenuAction::Trains => {
                let lines = train_lines(&self.theme, self.reservations.trains());
                self.show_report("Trains", lines);
            }
            MenuAction::Statistics => {
                let lines = self.statistics_lines();
                self.show_report("System Statistics", lines);
            }
            MenuAction::Save => self.save_now(),
            MenuAction::Exit => self.should_quit = true,
            _ => {}
        }
        Ok(())
    }

    fn show_report(&mut self, title: impl Into<String>, lines: Vec<Line<'static>>) {
        self.report = Some(Report::new(title, lines));
        self.form = None;
        self.screen = Screen::Report;
    }

    fn back_to_menu(&mut self) {
        self.form = None;
        self.report = None;
        self.screen = Screen::Menu;
    }

    fn save_now(&mut self) {
        match self.reservations.save(&self.store) {
            Ok(()) => {
                self.dirty = false;
                self.set_status(format!(
                    "All data saved to {}",
                    self.store.snapshot_path().display()
                ));
            }
            Err(err) => {
                error!(%err, "Save failed");
                self.set_status(format!("Save failed: {err}"));
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let mut submit = false;
        let mut cancel = false;
        if let Some(form) = self.form.as_mut() {
            match key.code {
                KeyCode::Esc => cancel = true,
                KeyCode::Tab | KeyCode::Down => form.move_focus(1),
                KeyCode::BackTab | KeyCode::Up => form.move_focus(-1),
                KeyCode::Enter => {
                    if form.on_last_field() {
                        submit = true;
                    } else {
                        form.move_focus(1);
                    }
                }
                code => {
                    if let Some(field) = form.focused() {
                        match code {
                            KeyCode::Left => field.move_cursor(-1),
                            KeyCode::Right => field.move_cursor(1),
                            KeyCode::Home => field.move_home(),
                            KeyCode::End => field.move_end(),
                            KeyCode::Backspace => field.backspace(),
                            KeyCode::Delete => field.delete(),
                            KeyCode::Char(ch) => {
                                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                                    field.insert(ch);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        if cancel {
            self.back_to_menu();
            self.set_status("Cancelled");
            return Ok(());
        }
        if submit {
            if let Some(form) = self.form.take() {
                self.submit(form)?;
            }
        }
        Ok(())
    }

    fn submit(&mut self, mut form: FormModal) -> Result<()> {
        let outcome = match form.action {
            MenuAction::Book => self.submit_booking(&form),
            MenuAction::Cancel => self.submit_cancellation(&form),
            MenuAction::Availability => self.submit_availability(&form),
            MenuAction::LookupPnr => self.submit_lookup(&form),
            MenuAction::SearchName => self.submit_search(&form),
            MenuAction::AllBookings => self.submit_all_bookings(&form),
            MenuAction::AddTrain => self.submit_add_train(&form),
            MenuAction::ConfigureSeats => self.submit_configure(&form),
            MenuAction::Trains | MenuAction::Statistics | MenuAction::Save | MenuAction::Exit => {
                Ok(())
            }
        };
        if let Err(message) = outcome {
            warn!(action = ?form.action, %message, "Request rejected");
            form.error = Some(message);
            self.form = Some(form);
            self.screen = Screen::Form;
        }
        Ok(())
    }

    fn submit_booking(&mut self, form: &FormModal) -> Result<(), String> {
        let age = form
            .value(1)
            .parse::<u32>()
            .map_err(|_| "Age must be a whole number.".to_string())?;
        let request = BookingRequest {
            name: form.value(0).to_string(),
            age,
            gender: form.value(2).to_string(),
            train: form.value(3).to_string(),
            class: form.value(4).to_string(),
        };
        let result = self
            .reservations
            .engine()
            .book(&request)
            .map_err(|err| format!("Booking failed: {err}"))?;
        self.dirty = true;

        let position = match result.outcome {
            BookingOutcome::Confirmed { .. } => None,
            BookingOutcome::Waitlisted { position } => Some(position),
        };
        let mut lines = vec![message_line(&self.theme, &result.message, result.is_confirmed())];
        lines.push(Line::from(""));
        lines.extend(booking_lines(&self.theme, &result.booking, position));
        self.set_status(result.message.clone());
        self.show_report("Booking", lines);
        Ok(())
    }

    fn submit_cancellation(&mut self, form: &FormModal) -> Result<(), String> {
        let pnr = checked_pnr(form.value(0))?;
        let result = self
            .reservations
            .engine()
            .cancel(&pnr)
            .map_err(|err| format!("Cancellation failed: {err}"))?;
        let cancelled = result.outcome == CancellationOutcome::Cancelled;
        if cancelled {
            self.dirty = true;
        }

        let mut lines = vec![message_line(&self.theme, &result.message, cancelled)];
        lines.push(Line::from(""));
        lines.extend(booking_lines(&self.theme, &result.booking, None));
        if let Some(promoted) = &result.promoted {
            lines.push(Line::from(""));
            lines.push(heading(&self.theme, "Promoted from waitlist"));
            lines.extend(booking_lines(&self.theme, promoted, None));
        }
        self.set_status(result.message.clone());
        self.show_report("Cancellation", lines);
        Ok(())
    }

    fn submit_availability(&mut self, form: &FormModal) -> Result<(), String> {
        let availability = self
            .reservations
            .engine()
            .check_availability(form.value(0), form.value(1))
            .map_err(|err| format!("Error checking availability: {err}"))?;
        let lines = availability_lines(&availability);
        self.set_status(format!(
            "{} seat(s) available in {} on {}",
            availability.available, availability.class, availability.train
        ));
        self.show_report("Seat Availability", lines);
        Ok(())
    }

    fn submit_lookup(&mut self, form: &FormModal) -> Result<(), String> {
        let pnr = checked_pnr(form.value(0))?;
        let engine = self.reservations.engine();
        let booking = engine.lookup(&pnr).map_err(|err| err.to_string())?.clone();
        let position = engine
            .waitlist_position(&pnr)
            .map_err(|err| err.to_string())?;
        let lines = booking_lines(&self.theme, &booking, position);
        self.set_status(format!("Found booking {}", booking.pnr));
        self.show_report("Booking Details", lines);
        Ok(())
    }

    fn submit_search(&mut self, form: &FormModal) -> Result<(), String> {
        let query = form.value(0);
        if query.is_empty() {
            return Err("Enter part of a passenger name.".to_string());
        }
        let matches = self.reservations.bookings().search_by_name(query, true);
        if matches.is_empty() {
            return Err(format!("No active bookings found for '{query}'."));
        }
        let count = matches.len();
        let lines = booking_table(&self.theme, matches.into_iter());
        self.set_status(format!("{count} booking(s) match '{query}'"));
        self.show_report(format!("Bookings matching '{query}'"), lines);
        Ok(())
    }

    fn submit_all_bookings(&mut self, form: &FormModal) -> Result<(), String> {
        self.require_admin(form)?;
        let bookings = self.reservations.bookings();
        let mut lines = if bookings.is_empty() {
            vec![Line::from("No bookings found.")]
        } else {
            booking_table(&self.theme, bookings.all())
        };
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Summary: {}", bookings.statistics())));
        self.set_status("Admin access granted");
        self.show_report("All Bookings", lines);
        Ok(())
    }

    fn submit_add_train(&mut self, form: &FormModal) -> Result<(), String> {
        self.require_admin(form)?;
        let number = form.value(1);
        let name = form.value(2);
        if number.is_empty() || name.is_empty() {
            return Err("Train number and name are required.".to_string());
        }
        if !self.reservations.trains_mut().add_default(number, name) {
            return Err(format!("Train '{number}' already exists."));
        }
        self.dirty = true;
        let lines = train_lines(&self.theme, self.reservations.trains());
        self.set_status(format!("Train {number} ({name}) added"));
        self.show_report("Trains", lines);
        Ok(())
    }

    fn submit_configure(&mut self, form: &FormModal) -> Result<(), String> {
        self.require_admin(form)?;
        let seats = form
            .value(3)
            .parse::<u32>()
            .map_err(|_| "Total seats must be a whole number.".to_string())?;
        self.reservations
            .trains_mut()
            .configure_seats(form.value(1), form.value(2), seats)
            .map_err(|err| err.to_string())?;
        self.dirty = true;
        let lines = train_lines(&self.theme, self.reservations.trains());
        self.set_status(format!("Train {} reconfigured", form.value(1)));
        self.show_report("Trains", lines);
        Ok(())
    }

    fn require_admin(&self, form: &FormModal) -> Result<(), String> {
        if self.config.verify_admin(form.value(0)) {
            Ok(())
        } else {
            warn!(action = ?form.action, "Admin password rejected");
            Err("Access denied. Invalid admin password.".to_string())
        }
    }

    fn statistics_lines(&self) -> Vec<Line<'static>> {
        let stats: BookingStatistics = self.reservations.statistics();
        let info = self.store.file_info();
        let size = |value: Option<u64>| {
            value
                .map(|bytes| format!("{bytes} bytes"))
                .unwrap_or_else(|| "not found".to_string())
        };
        vec![
            heading(&self.theme, "Bookings"),
            Line::from(stats.to_string()),
            Line::from(""),
            heading(&self.theme, "Trains"),
            Line::from(format!(
                "Total Trains: {}",
                self.reservations.trains().len()
            )),
            Line::from(""),
            heading(&self.theme, "Data Files"),
            Line::from(format!("Snapshot: {} ({})", info.path.display(), size(info.size))),
            Line::from(format!("Backup: {}", size(info.backup_size))),
            Line::from(format!(
                "Unsaved changes: {}",
                if self.dirty { "yes" } else { "no" }
            )),
        ]
    }

    fn handle_report_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.back_to_menu(),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_report(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_report(-1),
            KeyCode::PageDown => self.scroll_report(10),
            KeyCode::PageUp => self.scroll_report(-10),
            _ => {}
        }
    }

    fn scroll_report(&mut self, delta: i32) {
        if let Some(report) = self.report.as_mut() {
            report.scroll_by(delta);
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(4),
            ])
            .split(area);

        self.render_title(frame, layout[0]);
        match self.screen {
            Screen::Menu | Screen::Form => self.render_menu(frame, layout[1]),
            Screen::Report => self.render_report(frame, layout[1]),
        }
        self.render_status(frame, layout[2]);

        if let Some(form) = &self.form {
            self.render_form(frame, form);
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect) {
        let title = Paragraph::new(Line::from(Span::styled(
            "RAILWAY RESERVATION SYSTEM",
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        frame.render_widget(title, area);
    }

    fn render_menu(&self, frame: &mut Frame, area: Rect) {
        let height = (MenuAction::ALL.len() as u16 + 2).min(area.height);
        let width = 36.min(area.width.max(1));
        let menu_area = centered_rect(width, height, area);

        let lines: Vec<Line> = MenuAction::ALL
            .iter()
            .enumerate()
            .map(|(idx, action)| {
                let shortcut = if idx < 9 {
                    format!("{}.", idx + 1)
                } else {
                    "  ".to_string()
                };
                if idx == self.menu_cursor {
                    Line::from(Span::styled(
                        format!("▶ {shortcut} {}", action.label()),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("  {shortcut} {}", action.label()),
                        Style::default().fg(self.theme.primary_fg),
                    ))
                }
            })
            .collect();

        let menu = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Menu"));
        frame.render_widget(menu, menu_area);
    }

    fn render_report(&self, frame: &mut Frame, area: Rect) {
        let Some(report) = &self.report else {
            return;
        };
        let paragraph = Paragraph::new(report.lines.clone())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(report.title.clone()),
            )
            .scroll((report.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_form(&self, frame: &mut Frame, form: &FormModal) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(64_u16, frame_area.width.saturating_sub(4)), 30_u16);
        let height = (form.fields.len() as u16 * 2 + 5).min(frame_area.height);
        let area = centered_rect(width, height, frame_area);
        frame.render_widget(Clear, area);

        let mut lines = Vec::new();
        let mut cursor = None;
        for (idx, field) in form.fields.iter().enumerate() {
            let focused = idx == form.focus;
            let label_style = if focused {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.muted)
            };
            lines.push(Line::from(Span::styled(field.label.clone(), label_style)));
            if focused {
                cursor = Some((field.cursor as u16, lines.len() as u16));
            }
            lines.push(Line::from(vec![
                Span::styled("> ", Style::default().fg(self.theme.accent)),
                Span::raw(field.display()),
            ]));
        }
        lines.push(match &form.error {
            Some(message) => Line::from(Span::styled(
                message.clone(),
                Style::default().fg(self.theme.danger),
            )),
            None => Line::from(""),
        });
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" next/submit  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" switch  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(form.action.label()),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        if let Some((column, row)) = cursor {
            let x = (area.x + 3 + column).min(area.x + area.width.saturating_sub(2));
            let y = (area.y + 1 + row).min(area.y + area.height.saturating_sub(2));
            frame.set_cursor(x, y);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let stats = self.reservations.statistics();
        let secondary = format!(
            "{}  Trains: {}  Active bookings: {}  {}",
            Local::now().format("%H:%M"),
            self.reservations.trains().len(),
            stats.confirmed + stats.waitlisted,
            if self.dirty {
                "(unsaved changes)"
            } else {
                "(saved)"
            }
        );
        let paragraph = Paragraph::new(vec![
            Line::from(self.status.clone()),
            Line::from(Span::styled(secondary, Style::default().fg(self.theme.muted))),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn checked_pnr(input: &str) -> Result<String, String> {
    let pnr = normalize_pnr(input);
    if pnr.is_empty() {
        return Err("PNR cannot be empty.".to_string());
    }
    if !is_well_formed_pnr(&pnr) {
        return Err(format!("'{pnr}' is not a valid PNR (expected PNR followed by 7 digits)."));
    }
    Ok(pnr)
}

fn heading(theme: &Theme, text: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("=== {} ===", text.to_uppercase()),
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    ))
}

fn message_line(theme: &Theme, message: &str, positive: bool) -> Line<'static> {
    let color = if positive { theme.success } else { theme.warning };
    Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn booking_lines(theme: &Theme, booking: &Booking, position: Option<usize>) -> Vec<Line<'static>> {
    let mut lines = vec![
        heading(theme, "Booking Details"),
        Line::from(format!("PNR: {}", booking.pnr)),
        Line::from(format!("Passenger Name: {}", booking.name)),
        Line::from(format!("Age: {}", booking.age)),
        Line::from(format!("Gender: {}", booking.gender)),
        Line::from(format!("Train Number: {}", booking.train)),
        Line::from(format!("Class: {}", booking.class)),
        Line::from(format!(
            "Seat Number: {}",
            booking.seat().unwrap_or("Not Assigned")
        )),
        Line::from(vec![
            Span::raw("Status: "),
            Span::styled(
                booking.status.to_string(),
                Style::default().fg(theme.status_color(&booking.status)),
            ),
        ]),
        Line::from(format!(
            "Booked At: {}",
            booking.booked_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )),
    ];
    if let Some(position) = position {
        lines.push(Line::from(format!("Waitlist Position: {position}")));
    }
    lines
}

fn booking_table<'a>(theme: &Theme, bookings: impl Iterator<Item = &'a Booking>) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "{:<12} {:<20} {:<8} {:<8} {:<6} {:<11} {:<4} {:<6}",
                "PNR", "Name", "Train", "Class", "Seat", "Status", "Age", "Gender"
            ),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("-".repeat(82)),
    ];
    for booking in bookings {
        let row = format!(
            "{:<12} {:<20} {:<8} {:<8} {:<6} ",
            booking.pnr,
            truncate(&booking.name, NAME_COLUMN),
            booking.train,
            booking.class,
            booking.seat().unwrap_or("N/A"),
        );
        lines.push(Line::from(vec![
            Span::raw(row),
            Span::styled(
                format!("{:<11}", booking.status.label()),
                Style::default().fg(theme.status_color(&booking.status)),
            ),
            Span::raw(format!(" {:<4} {:<6}", booking.age, booking.gender)),
        ]));
    }
    lines
}

fn train_lines(theme: &Theme, trains: &TrainRegistry) -> Vec<Line<'static>> {
    if trains.is_empty() {
        return vec![Line::from("No trains available.")];
    }
    let classes: Vec<String> = trains
        .classes()
        .iter()
        .map(|spec| spec.name.clone())
        .collect();
    let mut header = format!("{:<10} {:<22}", "Train No.", "Train Name");
    for class in &classes {
        header.push_str(&format!(" {:<14}", format!("{class} (wl)")));
    }
    let mut lines = vec![
        Line::from(Span::styled(
            header,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from("-".repeat(33 + 15 * classes.len())),
    ];
    for train in trains.all() {
        let mut row = format!("{:<10} {:<22}", train.number, truncate(&train.name, 22));
        for class in &classes {
            let cell = train
                .occupancy(class)
                .map(|occ| format!("{}/{} ({})", occ.booked, occ.total, occ.waitlisted))
                .unwrap_or_else(|_| "-".to_string());
            row.push_str(&format!(" {cell:<14}"));
        }
        lines.push(Line::from(row));
    }
    lines
}

fn availability_lines(availability: &Availability) -> Vec<Line<'static>> {
    vec![
        Line::from(format!(
            "Train: {} ({})",
            availability.train_name, availability.train
        )),
        Line::from(format!("Class: {}", availability.class)),
        Line::from(format!("Total Seats: {}", availability.total)),
        Line::from(format!("Booked Seats: {}", availability.booked)),
        Line::from(format!("Available Seats: {}", availability.available)),
        Line::from(format!("Waitlist Count: {}", availability.waitlisted)),
    ]
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let kept: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        value.to_string()
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_input_edits_at_cursor() {
        let mut input = TextInput::new("Name");
        for ch in "Rma".chars() {
            input.insert(ch);
        }
        input.move_cursor(-2);
        input.insert('a');
        assert_eq!(input.value(), "Rama");
        input.move_end();
        input.backspace();
        input.move_home();
        input.delete();
        assert_eq!(input.value(), "am");
    }

    #[test]
    fn masked_input_hides_text() {
        let mut input = TextInput::masked("Password");
        for ch in "admin".chars() {
            input.insert(ch);
        }
        assert_eq!(input.display(), "*****");
        assert_eq!(input.value(), "admin");
    }

    #[test]
    fn pnr_input_is_normalised_and_checked() {
        assert_eq!(checked_pnr(" pnr1234567 ").as_deref(), Ok("PNR1234567"));
        assert!(checked_pnr("").is_err());
        assert!(checked_pnr("12345").is_err());
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("Short", 20), "Short");
        assert_eq!(
            truncate("A very long passenger name", 20),
            "A very long passe..."
        );
    }

    #[test]
    fn immediate_actions_have_no_form() {
        assert!(MenuAction::Trains.form_fields("AC").is_none());
        assert_eq!(
            MenuAction::Book.form_fields("AC/Sleeper").map(|fields| fields.len()),
            Some(5)
        );
    }

    fn app_in(dir: &std::path::Path, autosave: bool) -> RailwayApp {
        let config = AppConfig {
            data_dir: dir.to_path_buf(),
            autosave,
            ..AppConfig::default()
        };
        let store = config.save_manager();
        let reservations = Reservations::seeded(config.classes.clone());
        RailwayApp::new(config, store, reservations, StartupSource::Fresh)
    }

    #[test]
    fn failed_loop_still_autosaves() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut app = app_in(dir.path(), true);
        app.dirty = true;

        let outcome = app.finish(Err(anyhow::anyhow!("draw failed")));
        assert!(outcome.is_err());
        assert!(app.store.exists());
        assert!(!app.dirty);
        Ok(())
    }

    #[test]
    fn finish_respects_autosave_setting() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut app = app_in(dir.path(), false);
        app.dirty = true;

        app.finish(Ok(()))?;
        assert!(!app.store.exists());
        Ok(())
    }
}
