use crate::api::ApiClient;
use crate::auth::{
    authenticate, redirect_for, AuthController, AuthFlow, AuthRequest, AuthState, Route,
};
use crate::error::ApiError;
use crate::forms::{EditableForm, LoginForm, RegisterForm, TaskForm, ValidationError};
use crate::models::{AuthResponse, Task, User};
use crate::tasks::{fetch_tasks, run_op, Applied, OpOutcome, TaskOp, TaskView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::TableState;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

pub enum Screen {
    Loading,
    Login(LoginForm),
    Register(RegisterForm),
    Tasks,
}

pub enum InputMode {
    Normal,
    Editing,
    ConfirmDelete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pane {
    Pending,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    shown_at: Instant,
}

/// Results of spawned requests, delivered back to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    Authenticated {
        flow: AuthFlow,
        result: Result<AuthResponse, ApiError>,
    },
    TasksFetched {
        generation: u64,
        result: Result<Vec<Task>, ApiError>,
    },
    TaskOpFinished {
        generation: u64,
        outcome: OpOutcome,
    },
}

pub struct App {
    auth: AuthController,
    api: ApiClient,
    tx: UnboundedSender<AppEvent>,
    /// Bumped on logout. Task results tagged with an older value are dropped.
    generation: u64,
    pub screen: Screen,
    pub route: Route,
    pub tasks: TaskView,
    pub input_mode: InputMode,
    pub pane: Pane,
    pub pending_state: TableState,
    pub completed_state: TableState,
    pub task_form: Option<TaskForm>,
    pub confirm_delete: Option<Task>,
    pub submitting: bool,
    pub notification: Option<Notification>,
}

impl App {
    pub fn new(
        auth: AuthController,
        api: ApiClient,
        route: Route,
        tx: UnboundedSender<AppEvent>,
    ) -> App {
        App {
            auth,
            api,
            tx,
            generation: 0,
            screen: Screen::Loading,
            route,
            tasks: TaskView::default(),
            input_mode: InputMode::Normal,
            pane: Pane::Pending,
            pending_state: TableState::default(),
            completed_state: TableState::default(),
            task_form: None,
            confirm_delete: None,
            submitting: false,
            notification: None,
        }
    }

    pub fn api_url(&self) -> &str {
        self.api.base_url()
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    pub fn user(&self) -> Option<User> {
        match self.auth.state() {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Restores the stored session, then runs the route guard for the requested screen.
    pub fn start(&mut self) {
        self.auth.hydrate();
        self.navigate(self.route);
    }

    pub fn navigate(&mut self, route: Route) {
        let state = self.auth.state();
        if state == AuthState::Initializing {
            self.route = route;
            self.screen = Screen::Loading;
            return;
        }
        let target = redirect_for(&state, route).unwrap_or(route);
        debug!(?route, ?target, "navigating");
        self.route = target;
        self.submitting = false;
        self.input_mode = InputMode::Normal;
        self.task_form = None;
        self.confirm_delete = None;
        self.screen = match target {
            Route::Login => Screen::Login(LoginForm::default()),
            Route::Register => Screen::Register(RegisterForm::default()),
            Route::Tasks => {
                self.pane = Pane::Pending;
                self.refresh_tasks();
                Screen::Tasks
            }
        };
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) {
        self.notification = Some(Notification {
            level,
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    pub fn tick(&mut self) {
        if self
            .notification
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
    }

    fn refresh_tasks(&mut self) {
        self.tasks.begin();
        let api = self.api.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = fetch_tasks(&api).await;
            let _ = tx.send(AppEvent::TasksFetched { generation, result });
        });
    }

    fn dispatch_op(&mut self, op: TaskOp) {
        self.tasks.begin();
        let api = self.api.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let outcome = run_op(&api, op).await;
            let _ = tx.send(AppEvent::TaskOpFinished { generation, outcome });
        });
    }

    fn dispatch_auth(&mut self, request: AuthRequest) {
        self.submitting = true;
        let flow = request.flow();
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = authenticate(&api, &request).await;
            let _ = tx.send(AppEvent::Authenticated { flow, result });
        });
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Authenticated { flow, result } => {
                self.submitting = false;
                match self.auth.complete(result) {
                    Ok(route) => {
                        self.notify(Level::Success, flow.success_message());
                        self.navigate(route);
                    }
                    Err(err) => {
                        let message = format!("{}: {}", flow.failure_message(), err.user_message());
                        self.notify(Level::Error, message);
                    }
                }
            }
            AppEvent::TasksFetched { generation, result } => {
                if !self.accepts(generation) {
                    debug!(generation, "dropping task list from an earlier session");
                    return;
                }
                if let Err(err) = self.tasks.apply_fetch(result) {
                    self.notify(Level::Error, format!("Failed to load tasks: {}", err.user_message()));
                }
                self.clamp_selection();
            }
            AppEvent::TaskOpFinished { generation, outcome } => {
                if !self.accepts(generation) {
                    debug!(generation, "dropping task result from an earlier session");
                    return;
                }
                let from_form = matches!(outcome.op, TaskOp::Create(_) | TaskOp::Update { .. });
                match self.tasks.apply(outcome) {
                    Applied::Done(message) => {
                        if from_form {
                            self.close_task_form();
                        }
                        self.notify(Level::Success, message);
                    }
                    Applied::MutationFailed { context, message } => {
                        self.submitting = false;
                        self.notify(Level::Error, format!("{}: {}", context, message));
                    }
                    Applied::RefreshFailed { context, message } => {
                        if from_form {
                            self.close_task_form();
                        }
                        self.notify(Level::Error, format!("{}: {}", context, message));
                    }
                }
                self.clamp_selection();
            }
        }
    }

    fn accepts(&self, generation: u64) -> bool {
        generation == self.generation
            && matches!(self.screen, Screen::Tasks)
            && matches!(self.auth.state(), AuthState::Authenticated(_))
    }

    /// Returns true when the app should quit.
    pub fn handle_input(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        match self.screen {
            Screen::Loading => matches!(key.code, KeyCode::Char('q') | KeyCode::Esc),
            Screen::Login(_) | Screen::Register(_) => self.handle_auth_input(key),
            Screen::Tasks => self.handle_tasks_input(key),
        }
    }

    fn handle_auth_input(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Char('r') if ctrl && matches!(self.screen, Screen::Login(_)) => {
                self.navigate(Route::Register)
            }
            KeyCode::Char('l') if ctrl && matches!(self.screen, Screen::Register(_)) => {
                self.navigate(Route::Login)
            }
            KeyCode::Enter => self.submit_auth(),
            _ => match &mut self.screen {
                Screen::Login(form) => edit_form(form, key),
                Screen::Register(form) => edit_form(form, key),
                _ => {}
            },
        }
        false
    }

    fn submit_auth(&mut self) {
        if self.submitting {
            return;
        }
        let validated: Result<AuthRequest, Vec<ValidationError>> = match &mut self.screen {
            Screen::Login(form) => {
                let result = form.validate().map(AuthRequest::Login);
                form.set_errors(result.as_ref().err().cloned().unwrap_or_default());
                result
            }
            Screen::Register(form) => {
                let result = form.validate().map(AuthRequest::Register);
                form.set_errors(result.as_ref().err().cloned().unwrap_or_default());
                result
            }
            _ => return,
        };
        match validated {
            Ok(request) => self.dispatch_auth(request),
            Err(errors) => {
                if let Some(first) = errors.first() {
                    self.notify(Level::Error, first.to_string());
                }
            }
        }
    }

    fn handle_tasks_input(&mut self, key: KeyEvent) -> bool {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Tab => self.switch_pane(),
                KeyCode::Char('a') => {
                    self.task_form = Some(TaskForm::new_task());
                    self.input_mode = InputMode::Editing;
                }
                KeyCode::Char('e') | KeyCode::Enter => {
                    if let Some(task) = self.selected_task() {
                        self.task_form = Some(TaskForm::edit(&task));
                        self.input_mode = InputMode::Editing;
                    }
                }
                KeyCode::Char('x') | KeyCode::Char(' ') => {
                    if let Some(task) = self.selected_task() {
                        self.dispatch_op(TaskOp::Toggle(task));
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(task) = self.selected_task() {
                        self.confirm_delete = Some(task);
                        self.input_mode = InputMode::ConfirmDelete;
                    }
                }
                KeyCode::Char('c') => {
                    self.tasks.show_completed = !self.tasks.show_completed;
                    if !self.tasks.show_completed {
                        self.pane = Pane::Pending;
                    }
                }
                KeyCode::Char('r') => self.refresh_tasks(),
                KeyCode::Char('L') => {
                    let route = self.auth.logout();
                    self.generation += 1;
                    self.tasks.clear();
                    self.pending_state.select(None);
                    self.completed_state.select(None);
                    self.notify(Level::Success, "Logged out");
                    self.navigate(route);
                }
                _ => {}
            },

            InputMode::Editing => match key.code {
                KeyCode::Esc => self.close_task_form(),
                KeyCode::Enter => self.submit_task_form(),
                _ => {
                    if let Some(form) = &mut self.task_form {
                        edit_form(form, key);
                    }
                }
            },

            InputMode::ConfirmDelete => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if let Some(task) = self.confirm_delete.take() {
                        self.dispatch_op(TaskOp::Delete { id: task.id });
                    }
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.confirm_delete = None;
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        false
    }

    fn submit_task_form(&mut self) {
        if self.submitting {
            return;
        }
        let Some(form) = &mut self.task_form else {
            return;
        };
        match form.validate() {
            Ok(submission) => {
                form.set_errors(Vec::new());
                self.submitting = true;
                self.dispatch_op(submission.into());
            }
            Err(errors) => {
                let first = errors.first().map(ToString::to_string);
                form.set_errors(errors);
                if let Some(message) = first {
                    self.notify(Level::Error, message);
                }
            }
        }
    }

    fn close_task_form(&mut self) {
        self.task_form = None;
        self.submitting = false;
        self.input_mode = InputMode::Normal;
    }

    pub fn completed_visible(&self) -> bool {
        self.tasks.show_completed && !self.tasks.completed().is_empty()
    }

    fn switch_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Pending if self.completed_visible() => Pane::Completed,
            _ => Pane::Pending,
        };
        self.clamp_selection();
    }

    fn active(&mut self) -> (usize, &mut TableState) {
        match self.pane {
            Pane::Pending => (self.tasks.pending().len(), &mut self.pending_state),
            Pane::Completed => (self.tasks.completed().len(), &mut self.completed_state),
        }
    }

    pub fn selected_task(&self) -> Option<Task> {
        let (tasks, state) = match self.pane {
            Pane::Pending => (self.tasks.pending(), &self.pending_state),
            Pane::Completed => (self.tasks.completed(), &self.completed_state),
        };
        state.selected().and_then(|i| tasks.get(i)).map(|t| (*t).clone())
    }

    pub fn next(&mut self) {
        let (len, state) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (len, state) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        if self.pane == Pane::Completed && !self.completed_visible() {
            self.pane = Pane::Pending;
        }
        let pending = self.tasks.pending().len();
        let completed = self.tasks.completed().len();
        clamp(&mut self.pending_state, pending);
        clamp(&mut self.completed_state, completed);
    }
}

fn clamp(state: &mut TableState, len: usize) {
    if len == 0 {
        state.select(None);
    } else {
        let i = state.selected().unwrap_or(0).min(len - 1);
        state.select(Some(i));
    }
}

fn edit_form<F: EditableForm>(form: &mut F, key: KeyEvent) {
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.previous_field(),
        KeyCode::Left => form.cycle(form.focused_field(), false),
        KeyCode::Right => form.cycle(form.focused_field(), true),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => form.insert_char(c),
        _ => {}
    }
}
