//! GitHub REST client for creating a repository and pushing files to it.

use crate::utils::error::{HubError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

const API: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = "landing-builder/1.0";

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    User,
    Organization,
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Options for creating a new repository.
#[derive(Debug, Clone, Default)]
pub struct CreateRepoOptions {
    pub name: String,
    pub private: bool,
    pub description: String,
    pub auto_init: bool,
    /// Organization or the token's own login; `None` means the authenticated user.
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRepoBody<'a> {
    name: &'a str,
    private: bool,
    description: &'a str,
    auto_init: bool,
}

#[derive(Debug, Serialize)]
struct PutContentBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

pub struct GitHubClient {
    client: Client,
    token: String,
    base_url: String,
    user_agent: String,
    me: OnceCell<GitHubUser>,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(HubError::MissingConfigError {
                field: "GITHUB_TOKEN".to_string(),
            });
        }

        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            token,
            base_url: API.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            me: OnceCell::new(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Contents endpoint with each segment of `path` percent-encoded.
    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> Result<Url> {
        let invalid = || HubError::ConfigError {
            message: format!("invalid GitHub API URL '{}'", self.base_url),
        };
        let mut url = Url::parse(&self.url(&format!("repos/{}/{}/contents", owner, repo)))
            .map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .extend(path.split('/'));
        Ok(url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", &self.user_agent)
            .bearer_auth(&self.token)
    }

    /// Login of the token owner. Fetched once per client.
    pub async fn authenticated_user(&self) -> Result<GitHubUser> {
        let user = self
            .me
            .get_or_try_init(|| async {
                let response = self.authed(self.client.get(self.url("user"))).send().await?;
                if !response.status().is_success() {
                    return Err(parse_error(response).await);
                }
                Ok(response.json::<GitHubUser>().await?)
            })
            .await?;
        Ok(user.clone())
    }

    /// `None` when the account does not exist.
    pub async fn account_type(&self, owner: &str) -> Result<Option<AccountType>> {
        let response = self
            .authed(self.client.get(self.url(&format!("users/{}", owner))))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user: GitHubUser = response.json().await?;
                Ok(Some(match user.account_type.as_str() {
                    "User" => AccountType::User,
                    "Organization" => AccountType::Organization,
                    _ => AccountType::Other,
                }))
            }
            _ => Err(parse_error(response).await),
        }
    }

    /// Create a repository, or return the existing one when the name is taken.
    pub async fn create_repo(&self, options: &CreateRepoOptions) -> Result<Repository> {
        let me = self.authenticated_user().await?.login;
        let owner = options
            .owner
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(&me)
            .to_string();

        let path = if owner == me {
            "user/repos".to_string()
        } else {
            match self.account_type(&owner).await? {
                Some(AccountType::Organization) => format!("orgs/{}/repos", owner),
                Some(AccountType::User) => {
                    return Err(HubError::ValidationError {
                        message: format!(
                            "Cannot create repo under user '{}' with a token for '{}'. \
                             Use that user's token or leave owner blank to use '{}'.",
                            owner, me, me
                        ),
                    })
                }
                _ => {
                    return Err(HubError::GitHubError {
                        status: 404,
                        message: format!("Owner '{}' not found or inaccessible", owner),
                    })
                }
            }
        };

        let body = CreateRepoBody {
            name: &options.name,
            private: options.private,
            description: &options.description,
            auto_init: options.auto_init,
        };
        tracing::info!("Creating repository {}/{}", owner, options.name);
        let response = self
            .authed(self.client.post(self.url(&path)))
            .json(&body)
            .send()
            .await?;

        match response.status().as_u16() {
            201 | 202 => Ok(response.json().await?),
            409 | 422 => {
                if let Some(existing) = self.get_repo(&owner, &options.name).await? {
                    tracing::info!("Repository {} already exists, reusing it", existing.full_name);
                    return Ok(existing);
                }
                Err(parse_error(response).await)
            }
            _ => Err(parse_error(response).await),
        }
    }

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Option<Repository>> {
        let response = self
            .authed(self.client.get(self.url(&format!("repos/{}/{}", owner, repo))))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(parse_error(response).await),
        }
    }

    pub async fn default_branch(&self, owner: &str, repo: &str) -> Result<String> {
        let info = self
            .get_repo(owner, repo)
            .await?
            .ok_or_else(|| HubError::GitHubError {
                status: 404,
                message: format!("Repository {}/{} not found or inaccessible", owner, repo),
            })?;
        Ok(info.default_branch.unwrap_or_else(|| "main".to_string()))
    }

    pub async fn file_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>> {
        let response = self
            .authed(self.client.get(self.contents_url(owner, repo, path)?))
            .query(&[("ref", branch)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(response.json::<ContentInfo>().await?.sha),
            _ => Err(parse_error(response).await),
        }
    }

    /// Create or update one file; the current sha is sent when the file exists.
    pub async fn upsert_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<()> {
        let sha = self.file_sha(owner, repo, path, branch).await?;
        let body = PutContentBody {
            message,
            content: STANDARD.encode(content.as_bytes()),
            branch,
            sha,
        };

        let response = self
            .authed(self.client.put(self.contents_url(owner, repo, path)?))
            .json(&body)
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => {
                tracing::debug!("Uploaded {} to {}/{}@{}", path, owner, repo, branch);
                Ok(())
            }
            _ => Err(parse_error(response).await),
        }
    }

    /// Push every file to the default branch with message `"{prefix} {path}"`.
    pub async fn upsert_files(
        &self,
        owner: &str,
        repo: &str,
        files: &BTreeMap<String, String>,
        prefix: &str,
    ) -> Result<()> {
        let branch = self.default_branch(owner, repo).await?;
        tracing::info!("Pushing {} files to {}/{}@{}", files.len(), owner, repo, branch);

        for (path, content) in files {
            self.upsert_file(owner, repo, &branch, path, content, &format!("{} {}", prefix, path))
                .await?;
        }
        Ok(())
    }
}

async fn parse_error(response: Response) -> HubError {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return HubError::GitHubUnauthorized;
    }

    if status == StatusCode::FORBIDDEN {
        let exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");
        if exhausted {
            return HubError::GitHubRateLimited;
        }
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .map(|m| m.message)
        .unwrap_or(body);

    HubError::GitHubError {
        status: status.as_u16(),
        message,
    }
}
