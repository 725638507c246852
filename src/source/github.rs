use std::time::{Duration, SystemTime};

use anyhow::{bail, Context};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};

use super::{FetchOutcome, RepoIdent};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped in path segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Upper bound for error body excerpts kept for logging.
const MAX_BODY_EXCERPT: usize = 512;

#[derive(Clone, Debug)]
pub struct GithubClient {
    client: reqwest::Client,
    api_base: url::Url,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self, anyhow::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        if let Some(token) = token {
            let mut value: HeaderValue = format!("Bearer {}", token)
                .parse()
                .context("Invalid Github auth token")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("could not build http client")?;

        Ok(GithubClient {
            client,
            api_base: DEFAULT_API_URL.parse()?,
        })
    }

    /// Point the client at a different API root, e.g. a Github Enterprise
    /// instance.
    pub fn with_api_base(mut self, api_base: url::Url) -> Self {
        self.api_base = api_base;
        self
    }

    /// The REST endpoint of a repository.
    ///
    /// Owner and repo are percent-encoded as individual path segments.
    pub fn repo_url(&self, ident: &RepoIdent) -> Result<url::Url, anyhow::Error> {
        if self.api_base.cannot_be_a_base() {
            bail!("invalid Github API url: {}", self.api_base);
        }

        let mut url = self.api_base.clone();
        let path = format!(
            "{}/repos/{}/{}",
            self.api_base.path().trim_end_matches('/'),
            utf8_percent_encode(&ident.owner, SEGMENT),
            utf8_percent_encode(&ident.repo, SEGMENT),
        );
        url.set_path(&path);
        Ok(url)
    }

    /// Look up a repository with a single request and classify the response.
    ///
    /// Only a success body that fails to decode is returned as an error; every
    /// other failure is reported as a [`FetchOutcome`].
    #[tracing::instrument(skip_all, fields(repo = %ident))]
    pub async fn fetch_repository(
        &self,
        ident: &RepoIdent,
    ) -> Result<FetchOutcome<RepoPayload>, anyhow::Error> {
        // Dot segments are dropped by URL normalization and can never name a
        // Github repository.
        if is_dot_segment(&ident.owner) || is_dot_segment(&ident.repo) {
            return Ok(FetchOutcome::NotFound);
        }

        let url = self.repo_url(ident)?;
        tracing::trace!(%url, "fetching repository");

        let res = match self.client.get(url).send().await {
            Ok(res) => res,
            Err(err) => return Ok(FetchOutcome::Network(err)),
        };

        let status = res.status();
        if status == StatusCode::FORBIDDEN
            || (status == StatusCode::OK && quota_exhausted(res.headers()))
        {
            return Ok(FetchOutcome::RateLimited {
                reset_at: rate_limit_reset(res.headers()),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        if !status.is_success() {
            let body = res
                .text()
                .await
                .map(|x| excerpt(&x))
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Ok(FetchOutcome::Transport { status, body });
        }

        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => return Ok(FetchOutcome::Network(err)),
        };

        let payload: RepoPayload = match deserialize_json(&body) {
            Ok(v) => v,
            Err(err) => Err(err).context("failed to parse repository response")?,
        };

        Ok(FetchOutcome::Success(payload))
    }
}

fn is_dot_segment(value: &str) -> bool {
    value == "." || value == ".."
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.trim().parse::<u64>().ok())
        == Some(0)
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<SystemTime> {
    headers
        .get("x-ratelimit-reset")
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.trim().parse::<u64>().ok())
        .map(|reset| SystemTime::UNIX_EPOCH + Duration::from_secs(reset))
}

fn excerpt(body: &str) -> String {
    body.trim().chars().take(MAX_BODY_EXCERPT).collect()
}

/// The subset of `GET /repos/{owner}/{repo}` that cards are built from.
#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoPayload {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub stargazers_count: Option<u64>,
    pub forks_count: Option<u64>,
    pub language: Option<String>,
    pub updated_at: Option<String>,
    pub topics: Option<Vec<String>>,
    pub license: Option<License>,
    pub private: Option<bool>,
}

#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct License {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

fn deserialize_json<T>(raw: &str) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
    T: serde::de::DeserializeOwned,
{
    let jd = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(jd)
}
