use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::session::{SessionState, SessionStore};
use tokio::sync::watch;
use tracing::info;

#[derive(Clone, Debug, PartialEq)]
pub enum AuthState {
    Initializing,
    Anonymous,
    Authenticated(User),
}

impl From<&SessionState> for AuthState {
    fn from(state: &SessionState) -> Self {
        if state.is_loading {
            return AuthState::Initializing;
        }
        match (&state.user, &state.credential) {
            (Some(user), Some(_)) => AuthState::Authenticated(user.clone()),
            _ => AuthState::Anonymous,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Tasks,
}

impl Route {
    pub fn requires_auth(self) -> bool {
        matches!(self, Route::Tasks)
    }
}

/// Where a visit to `route` should be sent instead, if anywhere.
///
/// Nothing is decided while the session is still hydrating.
pub fn redirect_for(state: &AuthState, route: Route) -> Option<Route> {
    match state {
        AuthState::Initializing => None,
        AuthState::Anonymous if route.requires_auth() => Some(Route::Login),
        AuthState::Authenticated(_) if !route.requires_auth() => Some(Route::Tasks),
        _ => None,
    }
}

#[derive(Clone)]
pub enum AuthRequest {
    Login(LoginRequest),
    Register(RegisterRequest),
}

impl AuthRequest {
    pub fn flow(&self) -> AuthFlow {
        match self {
            AuthRequest::Login(_) => AuthFlow::Login,
            AuthRequest::Register(_) => AuthFlow::Register,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFlow {
    Login,
    Register,
}

impl AuthFlow {
    pub fn success_message(self) -> &'static str {
        match self {
            AuthFlow::Login => "Logged in",
            AuthFlow::Register => "Account created",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            AuthFlow::Login => "Login failed",
            AuthFlow::Register => "Registration failed",
        }
    }
}

pub async fn authenticate(api: &ApiClient, request: &AuthRequest) -> Result<AuthResponse, ApiError> {
    match request {
        AuthRequest::Login(data) => api.login(data).await,
        AuthRequest::Register(data) => api.register(data).await,
    }
}

/// Drives the session through its lifecycle. The only writer of the store.
pub struct AuthController {
    store: SessionStore,
}

impl AuthController {
    pub fn new(store: SessionStore) -> Self {
        AuthController { store }
    }

    pub fn session(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(&self.store.snapshot())
    }

    pub fn hydrate(&mut self) -> AuthState {
        self.store.hydrate();
        self.state()
    }

    /// Applies a finished login or registration. Failures leave the state untouched.
    pub fn complete(&mut self, result: Result<AuthResponse, ApiError>) -> Result<Route, ApiError> {
        let response = result?;
        let (credential, user) = response.into_parts();
        info!(user_id = %user.id, "signed in");
        self.store.set_session(credential, user);
        Ok(Route::Tasks)
    }

    pub fn logout(&mut self) -> Route {
        self.store.clear();
        info!("signed out");
        Route::Login
    }
}
