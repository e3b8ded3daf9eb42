//! REST request and response bodies

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::OrderStatus;

/// Shortest accepted user name
pub const MIN_USERNAME_LEN: usize = 3;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Body of `POST /auth/login` and `POST /auth/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Build credentials; the user name is trimmed
    pub fn new(username: impl AsRef<str>, password: impl Into<String>) -> Self {
        Self {
            username: username.as_ref().trim().to_string(),
            password: password.into(),
        }
    }

    /// Both fields must be present
    pub fn validate_login(&self) -> Result<()> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(Error::Validation("Please fill in all fields".into()));
        }
        Ok(())
    }

    /// Registration also enforces minimum lengths
    pub fn validate_registration(&self) -> Result<()> {
        self.validate_login()?;

        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(Error::Validation(format!(
                "Username must be at least {} characters long",
                MIN_USERNAME_LEN
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Successful login or registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
}

/// Body of `POST /orders`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_id: u64,
    pub description: String,
}

impl CreateOrderRequest {
    pub fn new(customer_id: u64, description: impl AsRef<str>) -> Self {
        Self {
            customer_id,
            description: description.as_ref().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::Validation("Description is required".into()));
        }
        Ok(())
    }
}

/// Body of `PUT /orders/{id}/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
}

/// Error body returned by the services
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}
