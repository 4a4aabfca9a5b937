use crate::error::ApiError;
use crate::models::{
    ApiResponse, AuthResponse, CreateTaskRequest, ErrorBody, LoginRequest, RegisterRequest, Task,
    UpdateTaskRequest,
};
use crate::session::SessionState;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

/// HTTP client for the task API.
///
/// Reads the access token from the session store on every request, so a login
/// or logout takes effect for the next call without rebuilding the client.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: watch::Receiver<SessionState>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: watch::Receiver<SessionState>) -> Self {
        ApiClient {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, %url, "sending request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");

        let token = self.session.borrow().access_token().map(str::to_owned);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(|err| {
            warn!(%method, %url, %err, "request failed before a response arrived");
            ApiError::Network(err)
        })?;

        let status = res.status();
        let text = res.text().await.map_err(ApiError::Network)?;

        if !status.is_success() {
            let err = match serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(ErrorBody::into_message)
            {
                Some(message) => ApiError::Http { status, message },
                None => ApiError::generic_http(status),
            };
            warn!(%method, %url, status = status.as_u16(), error = %err, "request rejected");
            return Err(err);
        }

        let parsed: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))?;

        if !parsed.success {
            let message = parsed
                .error
                .or(parsed.message)
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(ApiError::Rejected(message));
        }

        Ok(parsed)
    }

    pub async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let res = self.request(Method::POST, "/auth/register", Some(data)).await?;
        require_data(res)
    }

    pub async fn login(&self, data: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let res = self.request(Method::POST, "/auth/login", Some(data)).await?;
        require_data(res)
    }

    /// Every task of the signed-in user. A `null` list is an empty one.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let res: ApiResponse<Vec<Task>> = self.request::<_, ()>(Method::GET, "/tasks", None).await?;
        Ok(res.data.unwrap_or_default())
    }

    pub async fn create_task(&self, data: &CreateTaskRequest) -> Result<Task, ApiError> {
        let res = self.request(Method::POST, "/tasks", Some(data)).await?;
        require_data(res)
    }

    pub async fn update_task(&self, id: &str, data: &UpdateTaskRequest) -> Result<Task, ApiError> {
        let res = self
            .request(Method::PUT, &format!("/tasks/{}", id), Some(data))
            .await?;
        require_data(res)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.request::<serde_json::Value, ()>(Method::DELETE, &format!("/tasks/{}", id), None)
            .await?;
        Ok(())
    }
}

fn require_data<T>(res: ApiResponse<T>) -> Result<T, ApiError> {
    res.data
        .ok_or_else(|| ApiError::UnexpectedResponse("response carried no data".to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Priority, TaskStatus};
    use crate::session::tests::{sample_credential, sample_user};
    use crate::session::{MemoryStorage, SessionStore};
    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    pub(crate) fn task_json(id: &str, title: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": "u1",
            "title": title,
            "priority": "medium",
            "status": status,
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": "2024-05-01T09:00:00Z"
        })
    }

    /// URL of a local port nothing listens on.
    pub(crate) fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    fn signed_in_store() -> SessionStore {
        let mut store = SessionStore::new(Box::new(MemoryStorage::default()));
        store.hydrate();
        store.set_session(sample_credential(), sample_user());
        store
    }

    fn anonymous_store() -> SessionStore {
        let mut store = SessionStore::new(Box::new(MemoryStorage::default()));
        store.hydrate();
        store
    }

    #[tokio::test]
    async fn test_attaches_bearer_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(header("authorization", "Bearer access-123"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [task_json("t1", "Buy milk", "pending")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        let tasks = api.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
        assert_eq!(tasks[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_no_authorization_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(|req: &Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(400)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({
                        "success": true,
                        "data": {
                            "user": {
                                "id": "u1",
                                "email": "a@b.com",
                                "name": "Alice",
                                "created_at": "2024-05-01T09:00:00Z"
                            },
                            "access_token": "access-123",
                            "refresh_token": "refresh-456"
                        }
                    }))
                }
            })
            .mount(&server)
            .await;

        let store = anonymous_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        let auth = api
            .login(&LoginRequest {
                email: "a@b.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(auth.access_token, "access-123");
        assert_eq!(auth.user.name, "Alice");
    }

    #[tokio::test]
    async fn test_token_follows_session_changes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})))
            .mount(&server)
            .await;

        let mut store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        assert!(api.list_tasks().await.is_ok());

        store.clear();
        let err = api.list_tasks().await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: StatusCode::UNAUTHORIZED, .. }));
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_http_error_falls_back_to_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/t1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        let err = api.delete_task("t1").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn test_http_error_uses_message_field() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/tasks/t9"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Task not found"})),
            )
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        let err = api
            .update_task("t9", &UpdateTaskRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Http { status, ref message }
            if status == StatusCode::NOT_FOUND && message == "Task not found"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let store = signed_in_store();
        let api = ApiClient::new(closed_port_url(), store.subscribe());
        let err = api.list_tasks().await.unwrap_err();
        assert!(err.is_network(), "expected a network error, got {:?}", err);
        assert_eq!(err.user_message(), crate::error::NETWORK_HINT);
    }

    #[tokio::test]
    async fn test_null_task_list_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": null})))
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        assert!(api.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        let err = api.list_tasks().await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_success_false_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "error": "Title is required"})),
            )
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(server.uri(), store.subscribe());
        let err = api
            .create_task(&CreateTaskRequest {
                title: String::new(),
                description: None,
                deadline: None,
                priority: Priority::Low,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "Title is required"));
    }

    #[tokio::test]
    async fn test_create_task_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .and(body_json(json!({"title": "Buy milk", "priority": "low"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "data": task_json("t1", "Buy milk", "pending")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = signed_in_store();
        let api = ApiClient::new(format!("{}/", server.uri()), store.subscribe());
        let task = api
            .create_task(&CreateTaskRequest {
                title: "Buy milk".to_string(),
                description: None,
                deadline: None,
                priority: Priority::Low,
            })
            .await
            .unwrap();
        assert_eq!(task.id, "t1");
    }
}
