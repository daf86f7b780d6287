//! Google Forms: OAuth token handling and registration form creation.

use crate::domain::ports::{FormInfo, FormPublisher};
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Url;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/forms.body",
    "https://www.googleapis.com/auth/forms.responses.readonly",
];

const FORMS_API: &str = "https://forms.googleapis.com";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CONSENT_TIMEOUT: StdDuration = StdDuration::from_secs(300);
/// Tokens this close to expiry are refreshed up front.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a `credentials.json` downloaded from the Google Cloud console.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(text)?;
        file.installed.or(file.web).ok_or_else(|| HubError::ConfigError {
            message: "credentials file has neither an 'installed' nor a 'web' client".to_string(),
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            HubError::ConfigError {
                message: format!("cannot read Google credentials {}: {}", path.display(), e),
            }
        })?;
        Self::from_json(&text)
    }
}

/// Cached OAuth token, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Installed-app OAuth for the Forms scopes with a JSON token cache.
pub struct GoogleAuth {
    client: Client,
    secrets: ClientSecrets,
    token_path: PathBuf,
}

impl GoogleAuth {
    pub fn new(secrets: ClientSecrets, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            secrets,
            token_path: token_path.into(),
        }
    }

    pub async fn from_files(credentials: &Path, token_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(ClientSecrets::load(credentials).await?, token_path))
    }

    /// A usable access token: cached, refreshed, or from a new consent.
    pub async fn access_token(&self) -> Result<String> {
        let cached = self.load_token().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(Utc::now())) {
            tracing::debug!("Using cached Google token from {}", self.token_path.display());
            return Ok(token.access_token.clone());
        }

        let token = match cached.and_then(|t| t.refresh_token) {
            Some(refresh_token) => {
                tracing::info!("Refreshing expired Google token");
                self.refresh(&refresh_token).await?
            }
            None => self.authorize_interactively().await?,
        };

        self.save_token(&token).await?;
        Ok(token.access_token)
    }

    async fn load_token(&self) -> Option<StoredToken> {
        let text = tokio::fs::read_to_string(&self.token_path).await.ok()?;
        match serde_json::from_str(&text) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cache {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    async fn save_token(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.token_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.token_path, serde_json::to_vec_pretty(token)?).await?;
        Ok(())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let token = self.token_request(&params).await?;
        Ok(token.into_stored(Some(refresh_token.to_string())))
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<StoredToken> {
        let params = [
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        let token = self.token_request(&params).await?;
        Ok(token.into_stored(None))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::OAuthError {
                message: format!("token endpoint returned {}: {}", status, body),
            });
        }
        Ok(response.json().await?)
    }

    pub fn consent_url(&self, redirect_uri: &str) -> Result<Url> {
        let scopes = SCOPES.join(" ");
        Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scopes.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| HubError::ConfigError {
            message: format!("invalid auth_uri '{}': {}", self.secrets.auth_uri, e),
        })
    }

    /// Loopback flow: listen on 127.0.0.1, print the consent URL, wait for the redirect.
    async fn authorize_interactively(&self) -> Result<StoredToken> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let consent = self.consent_url(&redirect_uri)?;

        tracing::info!("Waiting for Google authorization on {}", redirect_uri);
        println!("Open this URL in your browser to authorize Google Forms access:\n\n{}\n", consent);

        let code = wait_for_redirect(listener, CONSENT_TIMEOUT).await?;
        self.exchange_code(&code, &redirect_uri).await
    }
}

/// Query string of the consent redirect.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RedirectParams {
    /// `None` for requests that carry neither a code nor an error.
    pub fn outcome(&self) -> Option<Result<String>> {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return Some(Err(HubError::OAuthError {
                message: format!("authorization denied: {}", error),
            }));
        }
        self.code
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| Ok(c.to_string()))
    }
}

type CodeSlot = Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>;

async fn handle_redirect(
    State(slot): State<CodeSlot>,
    Query(params): Query<RedirectParams>,
) -> &'static str {
    let Some(outcome) = params.outcome() else {
        return "Waiting for Google authorization.";
    };

    let page = if outcome.is_ok() {
        "The authentication flow has completed. You may close this window."
    } else {
        "Authorization failed. Return to the terminal for details."
    };
    if let Some(sender) = slot.lock().await.take() {
        sender.send(outcome).ok();
    }
    page
}

/// Serve `GET /` on `listener` until a redirect with a code or an error arrives.
pub async fn wait_for_redirect(listener: TcpListener, timeout: StdDuration) -> Result<String> {
    let (code_tx, code_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route("/", get(handle_redirect))
        .with_state(Arc::new(Mutex::new(Some(code_tx))));

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
        {
            tracing::warn!("OAuth redirect listener stopped: {}", e);
        }
    });

    let received = tokio::time::timeout(timeout, code_rx).await;
    shutdown_tx.send(()).ok();

    match received {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(HubError::OAuthError {
            message: "redirect listener stopped before receiving a code".to_string(),
        }),
        Err(_) => Err(HubError::OAuthError {
            message: format!(
                "no authorization received within {} seconds",
                timeout.as_secs()
            ),
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedForm {
    form_id: String,
    #[serde(default)]
    responder_uri: Option<String>,
}

/// Forms REST API with an already-acquired access token.
pub struct FormsClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl FormsClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: FORMS_API.to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::FormsError {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(response.json().await?)
    }

    /// Create the form with its title, then add the description and the
    /// registration questions in one batch update.
    pub async fn create_form(&self, title: &str, description: &str) -> Result<FormInfo> {
        let created = self
            .post("/v1/forms", &json!({"info": {"title": title}}))
            .await?;
        let created: CreatedForm = serde_json::from_value(created)?;
        tracing::info!("Created Google Form {}", created.form_id);

        self.post(
            &format!("/v1/forms/{}:batchUpdate", created.form_id),
            &registration_requests(title, description),
        )
        .await?;

        Ok(FormInfo {
            edit_url: format!("https://docs.google.com/forms/d/{}/edit", created.form_id),
            form_id: created.form_id,
            responder_url: created.responder_uri,
        })
    }
}

fn text_question(title: &str, required: bool, index: u32) -> Value {
    let question = if required {
        json!({"required": true, "textQuestion": {}})
    } else {
        json!({"textQuestion": {}})
    };
    json!({
        "createItem": {
            "item": {"title": title, "questionItem": {"question": question}},
            "location": {"index": index}
        }
    })
}

fn registration_requests(title: &str, description: &str) -> Value {
    json!({
        "requests": [
            {
                "updateFormInfo": {
                    "info": {"title": title, "description": description},
                    "updateMask": "description"
                }
            },
            text_question("Full Name", true, 0),
            text_question("Email Address", true, 1),
            text_question("Organization / Company", false, 2),
        ]
    })
}

/// Acquires a token per form, then creates it through [`FormsClient`].
pub struct GoogleForms {
    auth: GoogleAuth,
    base_url: String,
}

impl GoogleForms {
    pub fn new(auth: GoogleAuth) -> Self {
        Self {
            auth,
            base_url: FORMS_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl FormPublisher for GoogleForms {
    async fn create_registration_form(&self, title: &str, description: &str) -> Result<FormInfo> {
        let token = self.auth.access_token().await?;
        FormsClient::new(token)
            .with_base_url(&self.base_url)
            .create_form(title, description)
            .await
    }
}
