use crate::errors::AppError;
use crate::view_query::ViewQuery;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Identity returned by the hosted auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Successful password sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// Client for the hosted database/auth service.
///
/// One configured handle (URL + anon key) shared by every query module.
/// Reads are forwarded with the signed-in user's access token so the
/// backend row-level security applies.
#[derive(Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// Creates a new `SupabaseClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL, without trailing slash.
    /// * `anon_key` - Public anon API key.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: String, anon_key: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::BackendError(format!("Failed to create backend client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Signs in with e-mail and password.
    ///
    /// Rejected credentials map to `AppError::InvalidCredentials`; transport
    /// failures map to `AppError::BackendError`.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, AppError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        tracing::info!("Signing in {} against backend auth", email);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                AppError::BackendError(format!("Erro de conexão com o servidor: {}", e))
            })?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(AppError::InvalidCredentials(
                "E-mail ou senha inválidos".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::BackendError(format!(
                "Auth returned {}: {}",
                status, error_text
            )));
        }

        let grant = response.json::<AuthGrant>().await.map_err(|e| {
            AppError::BackendError(format!("Failed to parse auth response: {}", e))
        })?;

        tracing::info!("✓ Signed in user {}", grant.user.id);
        Ok(grant)
    }

    /// Reads rows from a view or table.
    pub async fn select<T: DeserializeOwned>(
        &self,
        access_token: &str,
        query: &ViewQuery,
    ) -> Result<Vec<T>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/rest/v1/{}", self.base_url, query.view()),
            query.params(),
        )
        .map_err(|e| AppError::BackendError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Reading view {}: {}", query.view(), url);

        let response = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(|e| AppError::BackendError(format!("Read of {} failed: {}", query.view(), e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::BackendError(format!(
                "View {} returned {}: {}",
                query.view(),
                status,
                error_text
            )));
        }

        let rows = response.json::<Vec<T>>().await.map_err(|e| {
            AppError::BackendError(format!("Failed to parse rows of {}: {}", query.view(), e))
        })?;

        tracing::debug!("View {} returned {} row(s)", query.view(), rows.len());
        Ok(rows)
    }

    /// Calls a remote procedure.
    pub async fn rpc<T: DeserializeOwned>(
        &self,
        access_token: &str,
        function: &str,
        args: &Value,
    ) -> Result<T, AppError> {
        match self.call_rpc(access_token, function, args).await? {
            RpcOutcome::Ok(value) => Ok(value),
            RpcOutcome::Unavailable(status, body) => Err(AppError::BackendError(format!(
                "RPC {} returned {}: {}",
                function, status, body
            ))),
        }
    }

    /// Calls a remote procedure, treating an absent function or a permission
    /// error as "no data".
    pub async fn rpc_optional<T: DeserializeOwned>(
        &self,
        access_token: &str,
        function: &str,
        args: &Value,
    ) -> Result<Option<T>, AppError> {
        match self.call_rpc(access_token, function, args).await? {
            RpcOutcome::Ok(value) => Ok(Some(value)),
            RpcOutcome::Unavailable(status, body) => {
                tracing::warn!(
                    "RPC {} unavailable ({}), treating as no data: {}",
                    function,
                    status,
                    body
                );
                Ok(None)
            }
        }
    }

    async fn call_rpc<T: DeserializeOwned>(
        &self,
        access_token: &str,
        function: &str,
        args: &Value,
    ) -> Result<RpcOutcome<T>, AppError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        tracing::debug!("Calling RPC {}", function);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(args)
            .send()
            .await
            .map_err(|e| AppError::BackendError(format!("RPC {} failed: {}", function, e)))?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403 | 404) {
            let body = response.text().await.unwrap_or_default();
            return Ok(RpcOutcome::Unavailable(status.as_u16(), body));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::BackendError(format!(
                "RPC {} returned {}: {}",
                function, status, error_text
            )));
        }

        let value = response.json::<T>().await.map_err(|e| {
            AppError::BackendError(format!("Failed to parse RPC {} response: {}", function, e))
        })?;

        Ok(RpcOutcome::Ok(value))
    }
}

enum RpcOutcome<T> {
    Ok(T),
    Unavailable(u16, String),
}
