//! Authenticated session
//!
//! A [`Session`] owns the transport handle, the configuration and the login
//! state. Directory, query and upload operations all go through it, and every
//! one of them calls [`Session::authorize`] before touching the network.

use super::client::{HttpTransport, Transport};
use super::error::{DistillrError, Result};
use super::models::{Invitations, LoginRequest, LoginResponse, LogoutResponse};
use super::token::Token;
use crate::config::ClientConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Session {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    logged_in: bool,
    login_state: Value,
    active_organization: Option<Token>,
}

impl Session {
    /// Log in with email and password over the given transport
    ///
    /// Rejected credentials do not produce an error: the returned session has
    /// `is_logged_in() == false` and every privileged call on it fails with
    /// [`DistillrError::Authorization`]. Transport failures are still errors.
    pub async fn login(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        email: &str,
        password: &str,
    ) -> Result<Self> {
        let url = config.route("login");
        let request = LoginRequest {
            email,
            password,
            invitations: Invitations::default(),
        };
        let body = serde_json::to_value(&request)?;

        let login_state = match transport.post_json(&url, &body).await {
            Ok(state) => state,
            Err(DistillrError::Authorization { .. }) => Value::Null,
            Err(e) => return Err(e),
        };

        let (logged_in, active_organization) = if login_state.is_null() {
            (false, None)
        } else {
            let parsed: LoginResponse = serde_json::from_value(login_state.clone())?;
            (
                parsed.logged_in,
                parsed.active_organization.map(|org| org.token),
            )
        };

        if logged_in {
            info!(%email, "logged in");
        } else {
            warn!(%email, "login rejected");
        }

        Ok(Session {
            transport,
            config: Arc::new(config),
            logged_in,
            login_state,
            active_organization,
        })
    }

    /// Build an HTTP transport from `config` and log in
    pub async fn connect(config: ClientConfig, email: &str, password: &str) -> Result<Self> {
        let transport = Arc::new(HttpTransport::connect(&config)?);
        Self::login(transport, config, email, password).await
    }

    /// Log in using environment variables
    ///
    /// Required environment variables:
    /// - `DATADISTILLR_EMAIL`: account email
    /// - `DATADISTILLR_PASSWORD`: account password
    ///
    /// Connection settings are read by [`ClientConfig::from_env`].
    pub async fn from_env() -> Result<Self> {
        let email = std::env::var("DATADISTILLR_EMAIL").map_err(|_| {
            DistillrError::Config("DATADISTILLR_EMAIL environment variable not set".into())
        })?;
        let password = std::env::var("DATADISTILLR_PASSWORD").map_err(|_| {
            DistillrError::Config("DATADISTILLR_PASSWORD environment variable not set".into())
        })?;

        Self::connect(ClientConfig::from_env()?, &email, &password).await
    }

    /// End the session server-side
    ///
    /// Returns the new logged-in flag, which is `false` once the server
    /// accepts the logout.
    pub async fn logout(&mut self) -> Result<bool> {
        let url = self.config.route("logout");
        let reply: LogoutResponse = serde_json::from_value(self.transport.get_json(&url).await?)?;
        self.logged_in = reply.logged_in;
        info!(logged_in = self.logged_in, "logged out");
        Ok(self.logged_in)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Raw `/login` payload (account details, active organization, ...)
    pub fn login_state(&self) -> &Value {
        &self.login_state
    }

    pub fn active_organization_token(&self) -> Option<&Token> {
        self.active_organization.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Local login check that must precede any privileged request to `url`
    pub(crate) fn authorize(&self, url: &str) -> Result<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(DistillrError::Authorization {
                url: url.to_string(),
                message: "Not logged in.".to_string(),
            })
        }
    }

    /// Authorized GET
    pub(crate) async fn get(&self, url: &str) -> Result<Value> {
        self.authorize(url)?;
        self.transport.get_json(url).await
    }

    /// Authorized POST
    pub(crate) async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.authorize(url)?;
        self.transport.post_json(url, body).await
    }
}
