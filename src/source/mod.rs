use std::time::SystemTime;

use anyhow::Context;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

pub mod github;

use github::RepoPayload;

/// Identifies a repository by owner and name, as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoIdent {
    pub owner: String,
    pub repo: String,
}

impl RepoIdent {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Build an identifier from raw, possibly missing, parameters.
    ///
    /// Surrounding whitespace is ignored; blank values count as missing.
    pub fn from_params(owner: Option<&str>, repo: Option<&str>) -> Result<Self, anyhow::Error> {
        let owner = owner
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
            .context("missing owner")?;
        let repo = repo
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
            .context("missing repo")?;

        Ok(Self::new(owner, repo))
    }

    /// The owner-qualified name, `owner/repo`.
    pub fn name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Placeholder shown when a repository has no description.
pub const NO_DESCRIPTION: &str = "No description provided";

/// Placeholder for missing language and update date values.
pub const UNKNOWN: &str = "Unknown";

/// Normalized repository metadata, ready for rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoSnapshot {
    pub display_name: String,
    pub description: String,
    pub star_count: u64,
    pub fork_count: u64,
    pub primary_language: String,
    pub last_updated: Option<time::Date>,
    pub topics: Vec<String>,
    pub license_label: Option<String>,
    pub is_private: bool,
}

impl RepoSnapshot {
    /// Normalize an API payload, filling in placeholders for missing values.
    pub fn from_payload(payload: RepoPayload, ident: &RepoIdent, show_owner: bool) -> Self {
        let display_name = if show_owner {
            non_empty(payload.full_name).unwrap_or_else(|| ident.name())
        } else {
            non_empty(payload.name).unwrap_or_else(|| ident.repo.clone())
        };

        let license_label = payload
            .license
            .and_then(|x| non_empty(x.spdx_id).or_else(|| non_empty(x.name)));

        Self {
            display_name,
            description: non_empty(payload.description)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            star_count: payload.stargazers_count.unwrap_or(0),
            fork_count: payload.forks_count.unwrap_or(0),
            primary_language: non_empty(payload.language).unwrap_or_else(|| UNKNOWN.to_string()),
            last_updated: payload.updated_at.as_deref().and_then(parse_date),
            topics: payload.topics.unwrap_or_default(),
            license_label,
            is_private: payload.private.unwrap_or(false),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|x| !x.is_empty())
}

/// Calendar date (UTC) of an RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<time::Date> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .map(|x| x.to_offset(UtcOffset::UTC).date())
}

/// Result of a single metadata lookup.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Success(T),
    NotFound,
    RateLimited {
        reset_at: Option<SystemTime>,
    },
    /// The API answered with an unexpected status.
    Transport {
        status: reqwest::StatusCode,
        body: String,
    },
    /// No response was received at all.
    Network(reqwest::Error),
}
