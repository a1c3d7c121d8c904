//! Drive authorization.
//!
//! A token moves through three states: [`TokenState::Absent`] (no usable token on
//! disk), [`TokenState::Valid`] and [`TokenState::Expired`]. Expired tokens are
//! refreshed silently when a refresh token is available; everything else falls
//! back to the interactive consent flow on a loopback redirect. The resulting
//! [`AccessToken`] is handed to the drive client explicitly.

use crate::spotsync_core::config::Config;
use crate::spotsync_core::error::{Result, SpotsyncError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// OAuth client registration, as downloaded from the cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpotsyncError::MissingClientSecret(path.to_path_buf()));
        }
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn parse(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or_else(|| {
            SpotsyncError::Auth("client secret has neither an 'installed' nor a 'web' section".into())
        })
    }
}

/// Token persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(default)]
    pub scope: String,
}

impl StoredToken {
    fn covers(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// Response body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<String>, requested_scope: &str) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(self.expires_in),
            scope: self.scope.unwrap_or_else(|| requested_scope.to_string()),
        }
    }
}

/// Where a token stands before any network call is made.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    Absent,
    Valid(StoredToken),
    Expired(StoredToken),
}

impl TokenState {
    pub fn classify(token: Option<StoredToken>, scope: &str, now: OffsetDateTime) -> Self {
        match token {
            None => TokenState::Absent,
            Some(t) if !t.covers(scope) => TokenState::Absent,
            Some(t) if t.expires_at - EXPIRY_MARGIN <= now => TokenState::Expired(t),
            Some(t) => TokenState::Valid(t),
        }
    }
}

/// Bearer token for drive requests.
#[derive(Debug, Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

pub struct Authenticator {
    client_secret_file: PathBuf,
    token_file: PathBuf,
    scope: String,
    http: Client,
}

impl Authenticator {
    pub fn from_config(config: &Config) -> Self {
        Authenticator {
            client_secret_file: config.client_secret_file.clone(),
            token_file: config.token_file.clone(),
            scope: config.scope.clone(),
            http: Client::new(),
        }
    }

    /// Inspect the persisted token without touching the network.
    pub fn state(&self) -> TokenState {
        TokenState::classify(self.load_token(), &self.scope, OffsetDateTime::now_utc())
    }

    /// Produce a usable access token, refreshing or re-consenting as needed.
    pub fn acquire(&self) -> Result<AccessToken> {
        let token = match self.state() {
            TokenState::Valid(token) => {
                log::debug!("Using stored token (expires {})", token.expires_at);
                return Ok(AccessToken::new(token.access_token));
            }
            TokenState::Expired(token) => {
                let secret = ClientSecret::load(&self.client_secret_file)?;
                match token.refresh_token.as_deref() {
                    Some(refresh) => match self.refresh(&secret, refresh) {
                        Ok(refreshed) => refreshed,
                        Err(e) => {
                            log::warn!("Token refresh failed, re-running consent: {}", e);
                            self.consent(&secret)?
                        }
                    },
                    None => self.consent(&secret)?,
                }
            }
            TokenState::Absent => {
                let secret = ClientSecret::load(&self.client_secret_file)?;
                self.consent(&secret)?
            }
        };

        self.save_token(&token)?;
        Ok(AccessToken::new(token.access_token))
    }

    fn load_token(&self) -> Option<StoredToken> {
        let contents = fs::read_to_string(&self.token_file).ok()?;
        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("Ignoring unreadable token file {}: {}", self.token_file.display(), e);
                None
            }
        }
    }

    fn save_token(&self, token: &StoredToken) -> Result<()> {
        fs::write(&self.token_file, serde_json::to_string_pretty(token)?)?;
        log::info!("Saved token to {}", self.token_file.display());
        Ok(())
    }

    fn refresh(&self, secret: &ClientSecret, refresh_token: &str) -> Result<StoredToken> {
        log::info!("Refreshing expired access token");
        let response = self
            .http
            .post(&secret.token_uri)
            .form(&[
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()?;

        let token: TokenResponse = token_response(response)?;
        Ok(token.into_stored(Some(refresh_token.to_string()), &self.scope))
    }

    fn consent(&self, secret: &ClientSecret) -> Result<StoredToken> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let pkce = Pkce::generate();
        let state = Uuid::new_v4().simple().to_string();

        let auth_url = Url::parse_with_params(
            &secret.auth_uri,
            &[
                ("client_id", secret.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| SpotsyncError::Auth(format!("invalid auth_uri: {}", e)))?;

        println!("Please visit this URL to authorize this application:\n{}", auth_url);

        let (stream, _) = listener.accept()?;
        let mut request_line = String::new();
        BufReader::new(&stream).read_line(&mut request_line)?;

        let redirect = parse_redirect(&request_line);
        let body = match &redirect {
            Ok(_) => "Authorization complete. You may close this window.",
            Err(_) => "Authorization failed. Check the terminal for details.",
        };
        write!(
            &stream,
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )?;

        let (code, returned_state) = redirect?;
        if returned_state.as_deref() != Some(state.as_str()) {
            return Err(SpotsyncError::Auth("state mismatch in authorization redirect".into()));
        }

        let response = self
            .http
            .post(&secret.token_uri)
            .form(&[
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("code", code.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()?;

        let token: TokenResponse = token_response(response)?;
        log::info!("Authorization granted");
        Ok(token.into_stored(None, &self.scope))
    }
}

fn token_response(response: reqwest::blocking::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(SpotsyncError::Auth(format!("token endpoint returned {}: {}", status, body)));
    }
    Ok(response.json()?)
}

struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = pkce_challenge(&verifier);
        Pkce { verifier, challenge }
    }
}

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Extract `(code, state)` from the request line of the loopback redirect,
/// e.g. `GET /?state=xyz&code=4/abc HTTP/1.1`.
fn parse_redirect(request_line: &str) -> Result<(String, Option<String>)> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SpotsyncError::Auth("malformed redirect request".into()))?;
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|e| SpotsyncError::Auth(format!("malformed redirect target: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(SpotsyncError::Auth(format!("consent denied: {}", value))),
            _ => {}
        }
    }

    let code = code.ok_or_else(|| SpotsyncError::Auth("redirect carried no code".into()))?;
    Ok((code, state))
}
