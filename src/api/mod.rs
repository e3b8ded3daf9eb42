//! REST client for the auth and order services
//!
//! Shares its [`SessionCredentials`] with the notification client: a
//! successful login stores the token that the next stream connection will
//! present, and any `401` from an order call signs the session out.

pub mod config;
pub mod types;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::auth::{CredentialProvider, SessionCredentials};
use crate::error::{Error, Result};
use crate::event::{Order, OrderStatus};

pub use config::{ApiConfig, DEFAULT_BASE_URL};
pub use types::{AuthResponse, CreateOrderRequest, Credentials, UpdateOrderRequest};

use types::ErrorBody;

/// Authenticated REST client
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Arc<SessionCredentials>,
}

impl ApiClient {
    /// Create a client writing to the given session store
    pub fn new(config: ApiConfig, session: Arc<SessionCredentials>) -> Result<Self> {
        let base = config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            session,
        })
    }

    /// Session store shared with this client
    pub fn session(&self) -> &Arc<SessionCredentials> {
        &self.session
    }

    /// Create an account and sign in as it
    pub async fn register(&self, credentials: &Credentials) -> Result<AuthResponse> {
        credentials.validate_registration()?;
        let request = self.request(Method::POST, "auth/register")?.json(credentials);
        let auth: AuthResponse = decode(request.send().await?, Some("Registration failed")).await?;

        self.session.set(auth.token.as_str(), auth.username.as_str());
        tracing::info!(username = %auth.username, "Registered");
        Ok(auth)
    }

    /// Sign in
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        credentials.validate_login()?;
        let request = self.request(Method::POST, "auth/login")?.json(credentials);
        let auth: AuthResponse = decode(request.send().await?, Some("Login failed")).await?;

        self.session.set(auth.token.as_str(), auth.username.as_str());
        tracing::info!(username = %auth.username, "Logged in");
        Ok(auth)
    }

    /// Forget the session locally
    pub fn logout(&self) {
        self.session.clear();
        tracing::info!("Logged out");
    }

    /// Place a new order
    pub async fn create_order(&self, order: &CreateOrderRequest) -> Result<Order> {
        order.validate()?;
        let request = self.request(Method::POST, "orders")?.json(order);
        self.authorized(request).await
    }

    /// List the caller's orders, optionally only those still in flight
    pub async fn list_orders(&self, active_only: bool) -> Result<Vec<Order>> {
        let mut request = self.request(Method::GET, "orders")?;
        if active_only {
            request = request.query(&[("activeOnly", "true")]);
        }
        self.authorized(request).await
    }

    /// Move an order to a new status
    pub async fn update_order_status(&self, id: u64, status: OrderStatus) -> Result<Order> {
        let request = self
            .request(Method::PUT, &format!("orders/{}/status", id))?
            .json(&UpdateOrderRequest { status });
        self.authorized(request).await
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("path {:?}: {}", path, e)))?;
        Ok(self.http.request(method, url))
    }

    async fn authorized<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        };

        let response = request.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.clear();
            tracing::warn!("Session rejected by server, credentials cleared");
            return Err(Error::AuthRequired);
        }

        decode(response, None).await
    }
}

/// Decode a success body, or turn the service's `{ "error": ... }` body
/// into [`Error::Api`]
async fn decode<T: DeserializeOwned>(response: Response, fallback: Option<&str>) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(ErrorBody {
            error: Some(message),
        }) => message,
        Ok(_) => fallback
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        Err(_) => fallback.unwrap_or("Request failed").to_string(),
    };

    tracing::debug!(status = status.as_u16(), message = %message, "Request failed");
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}
