use crate::app::{App, AppEvent, InputMode, Level, Pane, Screen};
use crate::forms::{EditableForm, Field, TaskForm, DATE_FORMAT};
use crate::models::{Priority, Task, TaskStatus};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hint(keys: &[(&'static str, &'static str)]) -> Text<'static> {
    let mut spans = Vec::new();
    for (key, action) in keys {
        spans.push(Span::styled(format!(" {} ", key), Style::default().fg(Color::Red)));
        spans.push(Span::raw(format!(": {} ", action)));
    }
    Text::from(Line::from(spans))
}

fn get_legend(app: &App) -> Text<'static> {
    match (&app.screen, &app.input_mode) {
        (Screen::Loading, _) => key_hint(&[("q", "Quit")]),
        (Screen::Login(_), _) => key_hint(&[
            ("Tab", "Next Field"),
            ("Enter", "Log In"),
            ("Ctrl+R", "Create Account"),
            ("Esc", "Quit"),
        ]),
        (Screen::Register(_), _) => key_hint(&[
            ("Tab", "Next Field"),
            ("Enter", "Create Account"),
            ("Ctrl+L", "Back to Login"),
            ("Esc", "Quit"),
        ]),
        (Screen::Tasks, InputMode::Normal) => key_hint(&[
            ("q", "Quit"),
            ("j/k", "Down/Up"),
            ("Tab", "Switch List"),
            ("a", "Add Task"),
            ("e", "Edit"),
            ("x", "Toggle Done"),
            ("d", "Delete"),
            ("c", "Show/Hide Completed"),
            ("r", "Refresh"),
            ("L", "Log Out"),
        ]),
        (Screen::Tasks, InputMode::Editing) => key_hint(&[
            ("Tab", "Next Field"),
            ("←/→", "Change Choice"),
            ("Enter", "Submit"),
            ("Esc", "Cancel"),
        ]),
        (Screen::Tasks, InputMode::ConfirmDelete) => {
            key_hint(&[("y", "Delete"), ("n", "Cancel")])
        }
    }
}

pub async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    mut events: UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| draw(f, &mut app))?;

        // Finished requests
        while let Ok(event) = events.try_recv() {
            app.handle_event(event);
        }

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_input(key) {
                    return Ok(());
                }
            }
        }
    }
}

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    // Split the main layout into body, notification line and footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let body_chunk = chunks[0];

    match &app.screen {
        Screen::Loading => {
            let area = centered_rect_absolute(20, 3, body_chunk);
            let loading = Paragraph::new("Loading...")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(loading, area);
        }
        Screen::Login(form) => {
            draw_form(f, body_chunk, "Log in to your account", form, app.submitting);
        }
        Screen::Register(form) => {
            draw_form(f, body_chunk, "Create a new account", form, app.submitting);
        }
        Screen::Tasks => {}
    }
    if matches!(app.screen, Screen::Tasks) {
        draw_tasks(f, body_chunk, app);
    }

    if let Some(notification) = &app.notification {
        let color = match notification.level {
            Level::Success => Color::Green,
            Level::Error => Color::Red,
        };
        let line = Paragraph::new(notification.message.clone())
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD));
        f.render_widget(line, chunks[1]);
    }

    // Render the legend in the footer
    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, chunks[2]);
}

fn draw_form<F: EditableForm>(f: &mut Frame, area: Rect, title: &str, form: &F, submitting: bool) {
    let fields = form.fields().to_vec();
    let height = fields.len() as u16 * 3 + 2;
    let popup_area = centered_rect_absolute(area.width.min(60), height, area);

    let title = if submitting {
        format!("{} (submitting...)", title)
    } else {
        title.to_string()
    };
    let outer = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));
    let inner = outer.inner(popup_area);
    f.render_widget(Clear, popup_area);
    f.render_widget(outer, popup_area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(3); fields.len()])
        .split(inner);

    for (i, field) in fields.iter().enumerate() {
        f.render_widget(field_widget(form, *field, i == form.focus()), rows[i]);
    }
}

fn field_widget<F: EditableForm>(form: &F, field: Field, focused: bool) -> Paragraph<'static> {
    let value = match field {
        Field::Password | Field::ConfirmPassword => {
            "*".repeat(form.display_value(field).chars().count())
        }
        _ => form.display_value(field),
    };
    let border = if focused { Color::Yellow } else { Color::Gray };
    let mut block = Block::default()
        .title(field.label())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    if let Some(err) = form.error_for(field) {
        block = block.title_bottom(Line::from(Span::styled(err, Style::default().fg(Color::Red))));
    }
    Paragraph::new(value)
        .style(Style::default().fg(Color::White))
        .block(block)
}

fn draw_tasks(f: &mut Frame, area: Rect, app: &mut App) {
    let greeting = match app.user() {
        Some(user) => format!("Hello, {}", user.name),
        None => String::new(),
    };
    let pending_count = app.tasks.pending().len();
    let completed_count = app.tasks.completed().len();
    let loading = if app.tasks.is_loading() { " (loading...)" } else { "" };

    let completed_height = if completed_count == 0 {
        0
    } else if app.tasks.show_completed {
        (completed_count as u16 + 3).min(area.height / 2)
    } else {
        3
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(completed_height),
            ]
            .as_ref(),
        )
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Tasks", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {}  ", greeting)),
        Span::styled(app.api_url().to_string(), Style::default().fg(Color::DarkGray)),
    ]));
    f.render_widget(header, chunks[0]);

    let pending_title = format!("Pending Tasks ({}){}", pending_count, loading);
    let pending_focused = app.pane == Pane::Pending;
    if pending_count == 0 {
        let empty = Paragraph::new("No pending tasks")
            .block(Block::default().borders(Borders::ALL).title(pending_title));
        f.render_widget(empty, chunks[1]);
    } else {
        let table = task_table(&app.tasks.pending(), pending_title, pending_focused);
        f.render_stateful_widget(table, chunks[1], &mut app.pending_state);
    }

    // The completed section only exists when there is something in it
    if completed_count > 0 {
        let title = format!("Completed Tasks ({})", completed_count);
        if app.tasks.show_completed {
            let focused = app.pane == Pane::Completed;
            let table = task_table(&app.tasks.completed(), title, focused);
            f.render_stateful_widget(table, chunks[2], &mut app.completed_state);
        } else {
            let collapsed = Paragraph::new("Press c to show")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(collapsed, chunks[2]);
        }
    }

    match app.input_mode {
        InputMode::Editing => {
            if let Some(form) = &app.task_form {
                draw_task_form(f, area, form, app.submitting);
            }
        }
        InputMode::ConfirmDelete => {
            if let Some(task) = &app.confirm_delete {
                let popup_area = centered_rect_absolute(area.width.min(50), 5, area);
                let prompt = Paragraph::new(format!("Delete \"{}\"?\n(y) Delete  (n) Cancel", task.title))
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(
                        Block::default()
                            .title("Delete Task")
                            .borders(Borders::ALL)
                            .style(Style::default().fg(Color::Red)),
                    );
                f.render_widget(Clear, popup_area);
                f.render_widget(prompt, popup_area);
            }
        }
        InputMode::Normal => {}
    }
}

fn priority_style(priority: Priority) -> Style {
    let color = match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    };
    Style::default().fg(color)
}

fn status_style(status: TaskStatus) -> Style {
    match status {
        TaskStatus::Completed => Style::default().fg(Color::Green),
        TaskStatus::Pending => Style::default().fg(Color::Blue),
    }
}

fn task_table(tasks: &[&Task], title: String, focused: bool) -> Table<'static> {
    let header = Row::new(vec![
        "Title",
        "Description",
        "Deadline",
        "Priority",
        "Status",
        "Created",
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = tasks
        .iter()
        .map(|task| {
            Row::new(vec![
                Cell::from(task.title.clone()),
                Cell::from(
                    task.description
                        .clone()
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(
                    task.deadline
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(Span::styled(task.priority.label(), priority_style(task.priority))),
                Cell::from(Span::styled(task.status.label(), status_style(task.status))),
                Cell::from(task.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Percentage(25),
        Constraint::Percentage(30),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Length(16),
    ];

    let border = if focused { Color::Yellow } else { Color::Gray };
    Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ")
}

fn draw_task_form(f: &mut Frame, area: Rect, form: &TaskForm, submitting: bool) {
    let title = match (form.is_editing(), submitting) {
        (_, true) => "Saving...",
        (true, false) => "Edit Task (Press Enter to Submit)",
        (false, false) => "New Task (Press Enter to Submit)",
    };
    draw_form(f, area, title, form, false);
}
