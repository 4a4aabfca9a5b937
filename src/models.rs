use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// User struct
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Access/refresh token pair. The refresh token is kept but never used.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn toggled(self) -> TaskStatus {
        match self {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
        }
    }
}

// Task struct, owned by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub fn into_parts(self) -> (Credential, User) {
        let credential = Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        };
        (credential, self.user)
    }
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Priority,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl UpdateTaskRequest {
    /// Full representation of `task` with the status flipped.
    pub fn toggle_status(task: &Task) -> Self {
        UpdateTaskRequest {
            title: Some(task.title.clone()),
            description: task.description.clone(),
            deadline: task.deadline,
            priority: Some(task.priority),
            status: Some(task.status.toggled()),
        }
    }
}

/// Envelope every backend response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// Error body of a non-success response
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .filter(|e| !e.is_empty())
            .or(self.message.filter(|m| !m.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task() -> Task {
        serde_json::from_value(json!({
            "id": "t1",
            "user_id": "u1",
            "title": "Buy milk",
            "priority": "low",
            "status": "pending",
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": "2024-05-01T09:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_task_without_optional_fields() {
        let task = sample_task();
        assert_eq!(task.description, None);
        assert_eq!(task.deadline, None);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_toggle_status_sends_full_representation() {
        let mut task = sample_task();
        task.description = Some("2 litres".to_string());
        let body = serde_json::to_value(UpdateTaskRequest::toggle_status(&task)).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "Buy milk",
                "description": "2 litres",
                "priority": "low",
                "status": "completed"
            })
        );
    }

    #[test]
    fn test_create_request_omits_absent_fields() {
        let request = CreateTaskRequest {
            title: "Buy milk".to_string(),
            description: None,
            deadline: None,
            priority: Priority::Low,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"title": "Buy milk", "priority": "low"}));
    }

    #[test]
    fn test_null_data_is_none() {
        let parsed: ApiResponse<Vec<Task>> =
            serde_json::from_value(json!({"success": true, "data": null})).unwrap();
        assert!(parsed.success);
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_request_debug_hides_password() {
        let login = LoginRequest {
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
        };
        let register = RegisterRequest {
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
            name: "Alice".to_string(),
        };
        let printed = format!("{:?} {:?}", login, register);
        assert!(printed.contains("a@b.com"));
        assert!(printed.contains("Alice"));
        assert!(!printed.contains("secret1"));
    }

    #[test]
    fn test_error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_value(json!({"error": "Unauthorized", "message": "ignored"})).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Unauthorized"));

        let body: ErrorBody = serde_json::from_value(json!({"message": "Task not found"})).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Task not found"));
    }
}
