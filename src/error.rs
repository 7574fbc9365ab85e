use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("could not reach the token endpoint: {0}")]
    Network(String),

    #[error("token exchange failed ({status}): {message}")]
    TokenExchange { status: u16, message: String },

    #[error("token endpoint returned an invalid response: {0}")]
    TokenParse(String),

    #[error("token is not a JWT (expected 3 segments, found {0})")]
    InvalidTokenFormat(usize),

    #[error("token payload could not be decoded: {0}")]
    InvalidTokenPayload(String),

    #[error("authorization was rejected by the provider: {0}")]
    ProviderError(String),

    #[error("authorization callback state does not match this login attempt")]
    StateMismatch,

    #[error("authorization callback is missing the code parameter")]
    MissingCode,

    #[error("authorization callback is missing the state parameter")]
    MissingState,

    #[error("timed out after {0}s waiting for the browser sign-in to finish")]
    AuthorizationTimeout(u64),

    #[error("port {0} is already in use; close any other login in progress and retry")]
    PortInUse(u16),

    #[error("callback listener failed: {0}")]
    Listener(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("cannot read target file {}: {reason}", .path.display())]
    TargetUnreadable { path: PathBuf, reason: String },

    #[error("cannot back up target file {}: {reason}", .path.display())]
    Backup { path: PathBuf, reason: String },

    #[error("target file {} would not contain a tokens object", .path.display())]
    TargetValidationFailed { path: PathBuf },

    #[error("cannot write target file {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}
