use crate::models::{
    CreateTaskRequest, LoginRequest, Priority, RegisterRequest, Task, TaskStatus, UpdateTaskRequest,
};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
    ConfirmPassword,
    Title,
    Description,
    Deadline,
    Priority,
    Status,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Password => "Password",
            Field::ConfirmPassword => "Confirm password",
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Deadline => "Deadline (YYYY-MM-DD)",
            Field::Priority => "Priority",
            Field::Status => "Status",
        }
    }
}

/// Rule violations caught before any request is sent.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter your name")]
    NameRequired,
    #[error("Name must be at least 2 characters")]
    NameTooShort,
    #[error("Please enter your email")]
    EmailRequired,
    #[error("Please enter a valid email address")]
    EmailInvalid,
    #[error("Please enter your password")]
    PasswordRequired,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("Please re-enter your password")]
    ConfirmationRequired,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please enter a title")]
    TitleRequired,
    #[error("Please choose a priority")]
    PriorityRequired,
    #[error("Deadline must be a date in YYYY-MM-DD format")]
    DeadlineInvalid,
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::NameRequired | ValidationError::NameTooShort => Field::Name,
            ValidationError::EmailRequired | ValidationError::EmailInvalid => Field::Email,
            ValidationError::PasswordRequired | ValidationError::PasswordTooShort => Field::Password,
            ValidationError::ConfirmationRequired | ValidationError::PasswordMismatch => {
                Field::ConfirmPassword
            }
            ValidationError::TitleRequired => Field::Title,
            ValidationError::PriorityRequired => Field::Priority,
            ValidationError::DeadlineInvalid => Field::Deadline,
        }
    }
}

fn email_re() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn check_email(email: &str, errors: &mut Vec<ValidationError>) {
    if email.is_empty() {
        errors.push(ValidationError::EmailRequired);
    } else if !email_re().is_match(email) {
        errors.push(ValidationError::EmailInvalid);
    }
}

fn check_password(password: &str, errors: &mut Vec<ValidationError>) {
    if password.is_empty() {
        errors.push(ValidationError::PasswordRequired);
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(ValidationError::PasswordTooShort);
    }
}

/// Keyboard-editable form: a focus cursor over text fields and choice fields.
pub trait EditableForm {
    fn fields(&self) -> &[Field];
    fn focus(&self) -> usize;
    fn set_focus(&mut self, focus: usize);
    fn text(&self, field: Field) -> Option<&str>;
    fn text_mut(&mut self, field: Field) -> Option<&mut String>;
    fn errors(&self) -> &[ValidationError];
    fn set_errors(&mut self, errors: Vec<ValidationError>);

    /// Cycles a choice field. Text fields ignore it.
    fn cycle(&mut self, _field: Field, _forward: bool) {}

    /// Current label of a choice field.
    fn choice(&self, _field: Field) -> Option<&'static str> {
        None
    }

    fn display_value(&self, field: Field) -> String {
        match self.text(field) {
            Some(text) => text.to_string(),
            None => self.choice(field).unwrap_or_default().to_string(),
        }
    }

    fn focused_field(&self) -> Field {
        self.fields()[self.focus()]
    }

    fn next_field(&mut self) {
        let next = (self.focus() + 1) % self.fields().len();
        self.set_focus(next);
    }

    fn previous_field(&mut self) {
        let len = self.fields().len();
        let previous = (self.focus() + len - 1) % len;
        self.set_focus(previous);
    }

    fn insert_char(&mut self, c: char) {
        let field = self.focused_field();
        match self.text_mut(field) {
            Some(text) => text.push(c),
            None if c == ' ' => self.cycle(field, true),
            None => {}
        }
    }

    fn backspace(&mut self) {
        let field = self.focused_field();
        if let Some(text) = self.text_mut(field) {
            text.pop();
        }
    }

    fn error_for(&self, field: Field) -> Option<String> {
        self.errors()
            .iter()
            .find(|e| e.field() == field)
            .map(ToString::to_string)
    }
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub focus: usize,
    pub errors: Vec<ValidationError>,
}

impl LoginForm {
    const FIELDS: [Field; 2] = [Field::Email, Field::Password];

    pub fn validate(&self) -> Result<LoginRequest, Vec<ValidationError>> {
        let email = self.email.trim();
        let mut errors = Vec::new();
        check_email(email, &mut errors);
        check_password(&self.password, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(LoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

impl EditableForm for LoginForm {
    fn fields(&self) -> &[Field] {
        &Self::FIELDS
    }

    fn focus(&self) -> usize {
        self.focus
    }

    fn set_focus(&mut self, focus: usize) {
        self.focus = focus;
    }

    fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Email => Some(&self.email),
            Field::Password => Some(&self.password),
            _ => None,
        }
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Email => Some(&mut self.email),
            Field::Password => Some(&mut self.password),
            _ => None,
        }
    }

    fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    fn set_errors(&mut self, errors: Vec<ValidationError>) {
        self.errors = errors;
    }
}

#[derive(Debug, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub focus: usize,
    pub errors: Vec<ValidationError>,
}

impl RegisterForm {
    const FIELDS: [Field; 4] = [
        Field::Name,
        Field::Email,
        Field::Password,
        Field::ConfirmPassword,
    ];

    pub fn validate(&self) -> Result<RegisterRequest, Vec<ValidationError>> {
        let name = self.name.trim();
        let email = self.email.trim();
        let mut errors = Vec::new();

        if name.is_empty() {
            errors.push(ValidationError::NameRequired);
        } else if name.chars().count() < MIN_NAME_LEN {
            errors.push(ValidationError::NameTooShort);
        }
        check_email(email, &mut errors);
        check_password(&self.password, &mut errors);
        if self.confirm_password.is_empty() {
            errors.push(ValidationError::ConfirmationRequired);
        } else if self.confirm_password != self.password {
            errors.push(ValidationError::PasswordMismatch);
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(RegisterRequest {
            email: email.to_string(),
            password: self.password.clone(),
            name: name.to_string(),
        })
    }
}

impl EditableForm for RegisterForm {
    fn fields(&self) -> &[Field] {
        &Self::FIELDS
    }

    fn focus(&self) -> usize {
        self.focus
    }

    fn set_focus(&mut self, focus: usize) {
        self.focus = focus;
    }

    fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => Some(&self.name),
            Field::Email => Some(&self.email),
            Field::Password => Some(&self.password),
            Field::ConfirmPassword => Some(&self.confirm_password),
            _ => None,
        }
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Name => Some(&mut self.name),
            Field::Email => Some(&mut self.email),
            Field::Password => Some(&mut self.password),
            Field::ConfirmPassword => Some(&mut self.confirm_password),
            _ => None,
        }
    }

    fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    fn set_errors(&mut self, errors: Vec<ValidationError>) {
        self.errors = errors;
    }
}

/// What a submitted task form turns into.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskSubmission {
    Create(CreateTaskRequest),
    Update { id: String, request: UpdateTaskRequest },
}

/// Create/edit dialog. `editing` holds the id of the task being edited.
#[derive(Debug, Default)]
pub struct TaskForm {
    pub editing: Option<String>,
    /// Deadline of the task being edited. Sent back unchanged while the date text is untouched.
    original_deadline: Option<DateTime<Utc>>,
    pub title: String,
    pub description: String,
    pub deadline: String,
    pub priority: Option<Priority>,
    pub status: TaskStatus,
    pub focus: usize,
    pub errors: Vec<ValidationError>,
}

impl TaskForm {
    const CREATE_FIELDS: [Field; 4] = [
        Field::Title,
        Field::Description,
        Field::Deadline,
        Field::Priority,
    ];
    const EDIT_FIELDS: [Field; 5] = [
        Field::Title,
        Field::Description,
        Field::Deadline,
        Field::Priority,
        Field::Status,
    ];

    pub fn new_task() -> Self {
        TaskForm::default()
    }

    pub fn edit(task: &Task) -> Self {
        TaskForm {
            editing: Some(task.id.clone()),
            original_deadline: task.deadline,
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            deadline: task
                .deadline
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            priority: Some(task.priority),
            status: task.status,
            focus: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn validate(&self) -> Result<TaskSubmission, Vec<ValidationError>> {
        let title = self.title.trim();
        let mut errors = Vec::new();

        if title.is_empty() {
            errors.push(ValidationError::TitleRequired);
        }
        let deadline = match self.resolve_deadline() {
            Ok(deadline) => deadline,
            Err(err) => {
                errors.push(err);
                None
            }
        };
        if self.priority.is_none() {
            errors.push(ValidationError::PriorityRequired);
        }
        let Some(priority) = self.priority.filter(|_| errors.is_empty()) else {
            return Err(errors);
        };

        let description = Some(self.description.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(match &self.editing {
            None => TaskSubmission::Create(CreateTaskRequest {
                title: title.to_string(),
                description,
                deadline,
                priority,
            }),
            Some(id) => TaskSubmission::Update {
                id: id.clone(),
                request: UpdateTaskRequest {
                    title: Some(title.to_string()),
                    description,
                    deadline,
                    priority: Some(priority),
                    status: Some(self.status),
                },
            },
        })
    }
}

impl TaskForm {
    fn resolve_deadline(&self) -> Result<Option<DateTime<Utc>>, ValidationError> {
        if let Some(original) = self.original_deadline {
            if self.deadline.trim() == original.format(DATE_FORMAT).to_string() {
                return Ok(Some(original));
            }
        }
        parse_deadline(&self.deadline)
    }
}

impl EditableForm for TaskForm {
    fn fields(&self) -> &[Field] {
        if self.is_editing() {
            &Self::EDIT_FIELDS
        } else {
            &Self::CREATE_FIELDS
        }
    }

    fn focus(&self) -> usize {
        self.focus
    }

    fn set_focus(&mut self, focus: usize) {
        self.focus = focus;
    }

    fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Title => Some(&self.title),
            Field::Description => Some(&self.description),
            Field::Deadline => Some(&self.deadline),
            _ => None,
        }
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Title => Some(&mut self.title),
            Field::Description => Some(&mut self.description),
            Field::Deadline => Some(&mut self.deadline),
            _ => None,
        }
    }

    fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    fn set_errors(&mut self, errors: Vec<ValidationError>) {
        self.errors = errors;
    }

    fn cycle(&mut self, field: Field, forward: bool) {
        match field {
            Field::Priority => {
                let all = Priority::ALL;
                let next = match self.priority.and_then(|p| all.iter().position(|&x| x == p)) {
                    None => 0,
                    Some(i) if forward => (i + 1) % all.len(),
                    Some(i) => (i + all.len() - 1) % all.len(),
                };
                self.priority = Some(all[next]);
            }
            Field::Status => self.status = self.status.toggled(),
            _ => {}
        }
    }

    fn choice(&self, field: Field) -> Option<&'static str> {
        match field {
            Field::Priority => Some(self.priority.map_or("<- choose ->", Priority::label)),
            Field::Status => Some(self.status.label()),
            _ => None,
        }
    }
}

/// Parses `YYYY-MM-DD` into midnight UTC. Blank input means no deadline.
pub fn parse_deadline(input: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let date =
        NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| ValidationError::DeadlineInvalid)?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or(ValidationError::DeadlineInvalid)?;
    Ok(Some(midnight.and_utc()))
}
