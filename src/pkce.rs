use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use serde_with::{NoneAsEmptyString, serde_as};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::form_urlencoded;

use crate::{OAuthError, redact, redact_opt};

pub const AUTHORIZE_URL: &str = "https://auth.openai.com/oauth/authorize";
pub const TOKEN_URL: &str = "https://auth.openai.com/oauth/token";
pub const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
pub const SCOPES: &str = "openid profile email offline_access";
pub const CALLBACK_PORT: u16 = 1455;
// Registered with the provider as `localhost`. The callback listener binds
// 127.0.0.1 only, so this relies on `localhost` resolving to IPv4 loopback.
pub const REDIRECT_URI: &str = "http://localhost:1455/auth/callback";
const TOKEN_URL_OVERRIDE_ENV_VAR: &str = "CODEX_SWITCH_TOKEN_URL";
const AUTH_CLAIMS_KEY: &str = "https://api.openai.com/auth";
const DEFAULT_PLAN_TYPE: &str = "free";
const VERIFIER_BYTES: usize = 96;
const STATE_BYTES: usize = 32;
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: String,
    pub scopes: String,
    pub redirect_uri: String,
    pub callback_port: u16,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        OAuthConfig {
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            client_id: CLIENT_ID.to_string(),
            scopes: SCOPES.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            callback_port: CALLBACK_PORT,
        }
    }
}

impl OAuthConfig {
    pub fn from_env() -> Self {
        let mut config = OAuthConfig::default();
        if let Ok(url) = std::env::var(TOKEN_URL_OVERRIDE_ENV_VAR) {
            let url = url.trim();
            if !url.is_empty() {
                config.token_url = url.to_string();
            }
        }
        config
    }
}

#[derive(Clone)]
pub struct PkceCodes {
    pub verifier: String,
    pub challenge: String,
}

impl fmt::Debug for PkceCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceCodes")
            .field("verifier", &redact(&self.verifier))
            .field("challenge", &self.challenge)
            .finish()
    }
}

#[derive(Debug)]
pub struct OAuthSession {
    pub pkce: PkceCodes,
    pub state: String,
    pub listener_port: u16,
}

impl OAuthSession {
    pub fn new(listener_port: u16) -> Self {
        OAuthSession {
            pkce: generate_pkce(),
            state: generate_state(),
            listener_port,
        }
    }
}

pub fn generate_pkce() -> PkceCodes {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = pkce_challenge(&verifier);
    PkceCodes {
        verifier,
        challenge,
    }
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn build_authorization_url(config: &OAuthConfig, state: &str, challenge: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scopes)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state)
        .append_pair("id_token_add_organizations", "true")
        .append_pair("codex_cli_simplified_flow", "true")
        .append_pair("prompt", "login")
        .finish();
    format!("{}?{query}", config.authorize_url)
}

#[serde_as]
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    pub id_token: Option<String>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    pub access_token: Option<String>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id_token.is_some() {
            fields.push("id_token");
        }
        if self.access_token.is_some() {
            fields.push("access_token");
        }
        if self.refresh_token.is_some() {
            fields.push("refresh_token");
        }
        if self.expires_in.is_some() {
            fields.push("expires_in");
        }
        fields
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("id_token", &redact_opt(&self.id_token))
            .field("access_token", &redact_opt(&self.access_token))
            .field("refresh_token", &redact_opt(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

pub fn exchange_code_for_tokens(
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse, OAuthError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(EXCHANGE_TIMEOUT))
        .http_status_as_error(false)
        .proxy(ureq::Proxy::try_from_env())
        .build()
        .into();
    debug!(endpoint = %config.token_url, code = %redact(code), "exchanging authorization code");
    let response = agent
        .post(&config.token_url)
        .header("Accept", "application/json")
        .send_form([
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ])
        .map_err(|err| OAuthError::Network(err.to_string()))?;

    let status = response.status();
    let body = response
        .into_body()
        .read_to_string()
        .map_err(|err| OAuthError::Network(err.to_string()))?;
    debug!(status = status.as_u16(), "token endpoint responded");
    if !status.is_success() {
        return Err(OAuthError::TokenExchange {
            status: status.as_u16(),
            message: token_error_message(&body),
        });
    }

    let tokens: TokenResponse =
        serde_json::from_str(&body).map_err(|err| OAuthError::TokenParse(err.to_string()))?;
    debug!(fields = ?tokens.present_fields(), "token exchange succeeded");
    Ok(tokens)
}

fn token_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = value.get("error");
        let message = value
            .get("error_description")
            .and_then(serde_json::Value::as_str)
            .or_else(|| error.and_then(serde_json::Value::as_str))
            .or_else(|| {
                error
                    .and_then(|error| error.get("message"))
                    .and_then(serde_json::Value::as_str)
            })
            .filter(|message| !message.trim().is_empty());
        if let Some(message) = message {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decodes the payload without checking the signature.
pub fn parse_jwt_claims(token: &str) -> Result<serde_json::Value, OAuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(OAuthError::InvalidTokenFormat(parts.len()));
    }
    let mut payload = parts[1]
        .trim_end_matches('=')
        .replace('+', "-")
        .replace('/', "_");
    while payload.len() % 4 != 0 {
        payload.push('=');
    }
    let decoded = URL_SAFE
        .decode(payload.as_bytes())
        .map_err(|err| OAuthError::InvalidTokenPayload(err.to_string()))?;
    serde_json::from_slice(&decoded).map_err(|err| OAuthError::InvalidTokenPayload(err.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub email: Option<String>,
    pub account_id: Option<String>,
    pub plan_type: String,
}

#[serde_as]
#[derive(Default, Deserialize)]
struct AuthClaims {
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    chatgpt_account_id: Option<String>,
    #[serde(default)]
    #[serde_as(as = "NoneAsEmptyString")]
    chatgpt_plan_type: Option<String>,
}

pub fn extract_user_info(claims: &serde_json::Value) -> UserInfo {
    let email = claims
        .get("email")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string);
    let auth = claims
        .get(AUTH_CLAIMS_KEY)
        .and_then(|value| AuthClaims::deserialize(value).ok())
        .unwrap_or_default();
    UserInfo {
        email,
        account_id: auth.chatgpt_account_id,
        plan_type: auth
            .chatgpt_plan_type
            .unwrap_or_else(|| DEFAULT_PLAN_TYPE.to_string()),
    }
}
