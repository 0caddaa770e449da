//! GitHub contents API client implementing [`RepositoryApi`].

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use smartdak_core::RepoContext;
use tracing::info;
use url::Url;

use crate::repo::{CommitInfo, DirEntry, EntryKind, RepoError, RepositoryApi, check_repo_path};

pub const GITHUB_API: &str = "https://api.github.com";

pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Dir(Vec<ContentItem>),
    File(ContentItem),
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(GITHUB_API.into(), token)
    }

    /// `api_base` like `https://api.github.com` (no trailing slash needed).
    pub fn with_base_url(api_base: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn contents_url(&self, ctx: &RepoContext, path: &str) -> Result<Url, RepoError> {
        let mut url =
            Url::parse(&self.api_base).map_err(|_| RepoError::InvalidPath(self.api_base.clone()))?;
        url.path_segments_mut()
            .map_err(|_| RepoError::InvalidPath(self.api_base.clone()))?
            .pop_if_empty()
            .extend(["repos", ctx.owner.as_str(), ctx.repo.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "smartdak");
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn get_contents(
        &self,
        ctx: &RepoContext,
        path: &str,
    ) -> Result<ContentsResponse, RepoError> {
        let mut url = self.contents_url(ctx, path)?;
        url.query_pairs_mut().append_pair("ref", &ctx.branch);
        let resp = self.request(reqwest::Method::GET, url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RepoError::not_found(ctx, path));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RepoError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl RepositoryApi for GitHubClient {
    async fn get_file_content(&self, ctx: &RepoContext, path: &str) -> Result<String, RepoError> {
        let path = check_repo_path(path)?;
        let ContentsResponse::File(item) = self.get_contents(ctx, path).await? else {
            return Err(RepoError::Decode {
                path: path.to_string(),
                reason: "path is a directory".into(),
            });
        };
        let decode_err = |reason: String| RepoError::Decode {
            path: path.to_string(),
            reason,
        };
        if item.encoding.as_deref() != Some("base64") {
            return Err(decode_err(format!(
                "unsupported encoding {:?}",
                item.encoding
            )));
        }
        let packed: String = item
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| decode_err(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| decode_err(e.to_string()))
    }

    async fn put_file(
        &self,
        ctx: &RepoContext,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo, RepoError> {
        let path = check_repo_path(path)?;
        let sha = match self.get_contents(ctx, path).await {
            Ok(ContentsResponse::File(item)) => Some(item.sha),
            Ok(ContentsResponse::Dir(_)) => {
                return Err(RepoError::InvalidPath(path.to_string()));
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let body = PutRequest {
            message,
            content: STANDARD.encode(content),
            branch: &ctx.branch,
            sha,
        };
        let url = self.contents_url(ctx, path)?;
        info!(repo = %ctx, path, "pushing file to GitHub");
        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RepoError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let result: PutResponse = resp.json().await?;
        Ok(CommitInfo {
            path: path.to_string(),
            message: message.to_string(),
            sha: Some(result.commit.sha),
        })
    }

    async fn list_directory(
        &self,
        ctx: &RepoContext,
        path: &str,
    ) -> Result<Vec<DirEntry>, RepoError> {
        let path = check_repo_path(path)?;
        let ContentsResponse::Dir(items) = self.get_contents(ctx, path).await? else {
            return Err(RepoError::Decode {
                path: path.to_string(),
                reason: "path is a file".into(),
            });
        };
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => return None,
                };
                Some(DirEntry {
                    name: item.name,
                    path: item.path,
                    kind,
                })
            })
            .collect())
    }
}
