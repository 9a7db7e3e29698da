use anyhow::Result;
use clinic_records::{
    fetch_report, ClinicSession, RecordStore, Report, ReportFilter, VisitPage, VisitRecord,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Records,
    Reports,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Records => Page::Reports,
            Page::Reports => Page::Records,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Records => "Medical Records",
            Page::Reports => "Reports",
        }
    }
}

/// What keystrokes currently mean
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browse,
    /// Typing a search query
    Search,
    /// Waiting for y/n on deleting this visit
    ConfirmDelete(i64),
}

pub struct App<S: RecordStore> {
    pub session: ClinicSession<S>,
    pub visits: VisitPage,
    pub report: Report,
    pub state: TableState,
    pub current_page: Page,
    pub mode: Mode,
    pub query: String,
    pub show_detail: bool,
    pub status: Option<String>,
}

impl<S: RecordStore> App<S> {
    pub fn new(session: ClinicSession<S>) -> Result<Self> {
        let visits = session.list_visits(0)?;
        let report = fetch_report(session.store(), &ReportFilter::default())?;

        let mut state = TableState::default();
        if !visits.rows.is_empty() {
            state.select(Some(0));
        }

        Ok(Self {
            session,
            visits,
            report,
            state,
            current_page: Page::Records,
            mode: Mode::Browse,
            query: String::new(),
            show_detail: false,
            status: None,
        })
    }

    /// Reload a page of visits under the current search
    pub fn load_page(&mut self, page: usize) {
        match self.session.search_visits(&self.query, page) {
            Ok(visits) => {
                self.visits = visits;
                self.state
                    .select(if self.visits.rows.is_empty() { None } else { Some(0) });
            }
            Err(e) => self.status = Some(format!("❌ {}", e)),
        }
    }

    pub fn refresh_report(&mut self) {
        match fetch_report(self.session.store(), &ReportFilter::default()) {
            Ok(report) => self.report = report,
            Err(e) => self.status = Some(format!("❌ {}", e)),
        }
    }

    pub fn selected_visit(&self) -> Option<&VisitRecord> {
        self.state.selected().and_then(|i| self.visits.rows.get(i))
    }

    pub fn next(&mut self) {
        let len = self.visits.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visits.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn next_records_page(&mut self) {
        if self.visits.has_next() {
            self.load_page(self.visits.page + 1);
        }
    }

    pub fn previous_records_page(&mut self) {
        if self.visits.has_prev() {
            self.load_page(self.visits.page - 1);
        }
    }

    fn delete_confirmed(&mut self, visit_id: i64) {
        let after = self.visits.page_after_delete();
        match self.session.delete_visit(visit_id) {
            Ok(()) => {
                self.status = Some(format!("🗑️  Deleted visit #{}", visit_id));
                self.load_page(after);
                self.refresh_report();
            }
            Err(e) => self.status = Some(format!("❌ {}", e)),
        }
    }

    /// Apply one key press. Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode.clone() {
            Mode::Search => {
                match key.code {
                    KeyCode::Enter => {
                        self.mode = Mode::Browse;
                        self.load_page(0);
                    }
                    KeyCode::Esc => {
                        self.mode = Mode::Browse;
                        self.query.clear();
                        self.load_page(0);
                    }
                    KeyCode::Backspace => {
                        self.query.pop();
                    }
                    KeyCode::Char(c) => self.query.push(c),
                    _ => {}
                }
                false
            }
            Mode::ConfirmDelete(visit_id) => {
                self.mode = Mode::Browse;
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.delete_confirmed(visit_id);
                } else {
                    self.status = Some("Delete cancelled".to_string());
                }
                false
            }
            Mode::Browse => {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return true,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return true
                    }
                    KeyCode::Tab => {
                        self.current_page = self.current_page.next();
                        if self.current_page == Page::Reports {
                            self.refresh_report();
                        }
                    }
                    KeyCode::Enter if self.current_page == Page::Records => {
                        self.show_detail = !self.show_detail
                    }
                    KeyCode::Char('/') if self.current_page == Page::Records => {
                        self.mode = Mode::Search;
                        self.status = None;
                    }
                    KeyCode::Char('d') if self.current_page == Page::Records => {
                        if let Some(id) = self.selected_visit().map(|r| r.visit.id) {
                            self.mode = Mode::ConfirmDelete(id);
                        }
                    }
                    KeyCode::Char('r') => {
                        if let Err(e) = self.session.refresh_references() {
                            self.status = Some(format!("❌ {}", e));
                        }
                        self.load_page(self.visits.page);
                        self.refresh_report();
                    }
                    KeyCode::Right | KeyCode::Char('n') => self.next_records_page(),
                    KeyCode::Left | KeyCode::Char('p') => self.previous_records_page(),
                    KeyCode::Down | KeyCode::Char('j') => self.next(),
                    KeyCode::Up | KeyCode::Char('k') => self.previous(),
                    _ => {}
                }
                false
            }
        }
    }
}

pub fn run_ui<S: RecordStore>(app: &mut App<S>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: RecordStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui<S: RecordStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Records if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_table(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Records => render_table(f, chunks[1], app),
        Page::Reports => render_reports(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Records, Page::Reports].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Visits: {}", app.visits.total),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Citizens: {}", app.session.cache().citizens().len()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Nurses: {}", app.session.cache().nurses().len()),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_table<S: RecordStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let header_cells = ["Date", "Citizen", "Age", "Nurse", "Symptoms", "Diagnosis"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.visits.rows.iter().map(|record| {
        let visit = &record.visit;
        let citizen = record
            .citizen_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", visit.citizen_id));
        let nurse = record
            .nurse_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", visit.nurse_id));
        let age = record
            .citizen
            .as_ref()
            .map(|c| c.age.to_string())
            .unwrap_or_default();

        let diagnosis_color = if visit.diagnosis.is_some() {
            Color::Green
        } else {
            Color::DarkGray
        };

        Row::new(vec![
            Cell::from(visit.visit_date.format("%-m/%-d/%Y").to_string()),
            Cell::from(truncate(&citizen, 24)),
            Cell::from(age),
            Cell::from(truncate(&nurse, 22)),
            Cell::from(truncate(visit.symptoms.as_deref().unwrap_or("-"), 24)),
            Cell::from(truncate(visit.diagnosis.as_deref().unwrap_or("-"), 20))
                .style(Style::default().fg(diagnosis_color)),
        ])
        .height(1)
    });

    let title = format!(
        " Visits - page {}/{} ",
        app.visits.page + 1,
        app.visits.page_count().max(1)
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(26),
            Constraint::Length(5),
            Constraint::Length(24),
            Constraint::Length(26),
            Constraint::Length(22),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let status_spans = match &app.mode {
        Mode::Search => vec![
            Span::styled(" Search: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}█", app.query)),
            Span::raw("  ("),
            key("Enter"),
            Span::raw(" apply, "),
            key("Esc"),
            Span::raw(" clear)"),
        ],
        Mode::ConfirmDelete(id) => vec![Span::styled(
            format!(" Delete visit #{}? [y/N] ", id),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )],
        Mode::Browse => {
            let mut spans = Vec::new();
            if let Some(status) = &app.status {
                spans.push(Span::styled(
                    format!(" {} ", status),
                    Style::default().fg(Color::Green),
                ));
                spans.push(Span::raw("|"));
            }
            if !app.query.is_empty() {
                spans.push(Span::styled(
                    format!(" Filter: {} ", app.query),
                    Style::default().fg(Color::Green),
                ));
                spans.push(Span::raw("|"));
            }
            spans.extend([
                Span::raw(" "),
                key("/"),
                Span::raw(" Search | "),
                key("n/p"),
                Span::raw(" Page | "),
                key("Enter"),
                Span::raw(" Details | "),
                key("d"),
                Span::raw(" Delete | "),
                key("Tab"),
                Span::raw(" Reports | "),
                Span::styled("q", Style::default().fg(Color::Red)),
                Span::raw(" Quit"),
            ]);
            spans
        }
    };

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Visit Details ");

    let Some(record) = app.selected_visit() else {
        f.render_widget(Paragraph::new("No visit selected").block(block), area);
        return;
    };

    let label = |s: &'static str| {
        Span::styled(s, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    };
    let visit = &record.visit;
    let citizen = record.citizen.as_ref();
    let nurse = record.nurse.as_ref();

    let content = vec![
        Line::from(""),
        Line::from(vec![label("  Visit #: "), Span::raw(visit.id.to_string())]),
        Line::from(vec![
            label("  Date: "),
            Span::raw(visit.visit_date.format("%B %-d, %Y").to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            label("  Citizen: "),
            Span::raw(citizen.map(|c| c.name.clone()).unwrap_or_else(|| format!("#{}", visit.citizen_id))),
        ]),
        Line::from(vec![
            label("  Age: "),
            Span::raw(citizen.map(|c| c.age.to_string()).unwrap_or_default()),
        ]),
        Line::from(vec![
            label("  Address: "),
            Span::raw(citizen.map(|c| c.address.clone()).unwrap_or_default()),
        ]),
        Line::from(""),
        Line::from(vec![
            label("  Nurse: "),
            Span::raw(nurse.map(|n| n.name.clone()).unwrap_or_else(|| format!("#{}", visit.nurse_id))),
        ]),
        Line::from(vec![
            label("  Specialization: "),
            Span::raw(nurse.and_then(|n| n.specialization.clone()).unwrap_or_default()),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(vec![label("  Symptoms: "), Span::raw(visit.symptoms.clone().unwrap_or_default())]),
        Line::from(vec![label("  Diagnosis: "), Span::raw(visit.diagnosis.clone().unwrap_or_default())]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  NOTES",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                wrap_text(visit.notes.as_deref().unwrap_or(""), 35),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_reports<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let bars: Vec<(&str, u64)> = app
        .report
        .by_diagnosis
        .iter()
        .map(|(name, n)| (name.as_str(), *n as u64))
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" Visits by diagnosis ({} total) ", app.report.total)),
        )
        .data(bars.as_slice())
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, chunks[0]);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    render_tally(f, lower[0], " Visits by nurse ", "Nurse", &app.report.by_nurse);
    render_tally(f, lower[1], " Visits by patient ", "Patient", &app.report.by_patient);
}

fn render_tally(f: &mut Frame, area: Rect, title: &str, column: &str, tally: &[(String, usize)]) {
    let header = Row::new(vec![
        Cell::from(column.to_string()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Cell::from("Visits").style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    ])
    .style(Style::default().bg(Color::DarkGray));

    let rows = tally
        .iter()
        .map(|(name, n)| Row::new(vec![Cell::from(truncate(name, 28)), Cell::from(n.to_string())]));

    let table = Table::new(rows, [Constraint::Length(30), Constraint::Length(8)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title.to_string()),
        );

    f.render_widget(table, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines.join("\n  ")
}
