use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use simple_storage_engine::{Node, StoragePath};
use std::io::Stdout;

/// Terminal browser over the folders of one volume.
pub struct App {
    start_path: StoragePath,
    parents: Vec<Node>,
    current: Node,
    entries: Vec<Node>,
    list_state: ListState,
    status: Option<String>,
}

impl App {
    pub fn new(start: Node, start_path: &str) -> Self {
        let mut app = Self {
            start_path: StoragePath::parse(start_path),
            parents: Vec::new(),
            current: start,
            entries: Vec::new(),
            list_state: ListState::default(),
            status: None,
        };
        app.reload();
        app
    }

    /// Re-list the current folder and select its first entry.
    pub fn reload(&mut self) {
        match self.current.children() {
            Ok(children) => {
                self.entries = children;
                self.status = None;
            }
            Err(e) => {
                self.entries.clear();
                self.status = Some(format!("Error listing {}: {e}", self.location()));
            }
        }
        let first = if self.entries.is_empty() { None } else { Some(0) };
        self.list_state.select(first);
    }

    pub fn next(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1) % self.entries.len(),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.entries.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn selected(&self) -> Option<&Node> {
        self.list_state.selected().and_then(|i| self.entries.get(i))
    }

    /// Descend into the selected folder. Files stay selected.
    pub fn enter_selected(&mut self) {
        let Some(child) = self.selected().filter(|node| node.is_directory()).cloned() else {
            return;
        };
        let parent = std::mem::replace(&mut self.current, child);
        self.parents.push(parent);
        self.reload();
    }

    /// Go back to the folder this one was entered from.
    pub fn leave(&mut self) {
        if let Some(parent) = self.parents.pop() {
            self.current = parent;
            self.reload();
        }
    }

    /// `storage-id:path` of the current folder.
    pub fn location(&self) -> String {
        let mut path = self.start_path.clone();
        if let Some((_, entered)) = self.parents.split_first() {
            for node in entered.iter().chain(std::iter::once(&self.current)) {
                path = path.join(node.name());
            }
        }
        format!("{}:/{path}", self.current.storage_id())
    }

    pub fn details(&self) -> Vec<String> {
        if let Some(status) = &self.status {
            return vec![status.clone()];
        }
        let Some(node) = self.selected() else {
            return vec!["Empty folder".to_string()];
        };
        let kind = if node.is_directory() { "Folder" } else { "File" };
        vec![
            format!("{kind}: {}", node.name()),
            String::new(),
            format!("Id: {}", node.id()),
            format!("MIME type: {}", node.mime_type().unwrap_or("-")),
            format!("URI: {}", node.uri()),
        ]
    }
}

pub fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => app.enter_selected(),
                KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => app.leave(),
                KeyCode::Char('r') => app.reload(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(rows[0]);

    let items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|node| {
            let icon = if node.is_directory() { "📁 " } else { "📄 " };
            ListItem::new(vec![Line::from(vec![Span::raw(format!(
                "{icon}{}",
                node.name()
            ))])])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(app.location()))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));
    f.render_stateful_widget(list, chunks[0], &mut app.list_state);

    let details: Vec<Line> = app
        .details()
        .into_iter()
        .map(|line| Line::from(vec![Span::raw(line)]))
        .collect();
    let details = Paragraph::new(details)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    f.render_widget(details, chunks[1]);

    let help = Line::from(vec![
        Span::raw("q: Quit | "),
        Span::raw("↑/k: Previous | "),
        Span::raw("↓/j: Next | "),
        Span::raw("Enter/→: Open folder | ←/Backspace: Back | r: Reload"),
    ]);
    f.render_widget(Paragraph::new(vec![help]), rows[1]);
}
