use std::num::IntErrorKind;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    server::{
        card::{self, CardOptions, Theme},
        CachePolicy, Ctx, Svg, SvgError,
    },
    source::{FetchOutcome, RepoIdent, RepoSnapshot},
};

pub const PATH_PIN: &str = "/api/pin";

const MISSING_PARAMS_MESSAGE: &str = "Missing parameters: username & repo required";

pub const DEFAULT_CACHE_SECONDS: u32 = 1800;
/// Upper bound for caching successful cards.
pub const MAX_CACHE_SECONDS: u32 = 86_400;
/// Rate limits reset within the hour.
const RATE_LIMIT_MAX_AGE: u32 = 3600;
/// Missing repositories may be created or renamed soon.
const ERROR_MAX_AGE: u32 = 300;
const STALE_WHILE_REVALIDATE: u32 = 3600;

/// Raw query parameters of the pin endpoint.
#[derive(Debug, Clone, Default)]
pub struct PinQuery {
    pub username: Option<String>,
    pub repo: Option<String>,
    pub theme: Option<String>,
    pub hide_border: Option<String>,
    pub show_owner: Option<String>,
    pub cache_seconds: Option<String>,
}

impl PinQuery {
    /// Build from decoded key/value pairs. The first occurrence of a
    /// repeated key wins and unknown keys are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "username" => &mut query.username,
                "repo" => &mut query.repo,
                "theme" => &mut query.theme,
                "hide_border" => &mut query.hide_border,
                "show_owner" => &mut query.show_owner,
                "cache_seconds" => &mut query.cache_seconds,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

/// A validated card request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRequest {
    pub ident: RepoIdent,
    pub theme: Theme,
    pub show_owner: bool,
    pub card: CardOptions,
    pub cache_seconds: u32,
}

impl PinRequest {
    pub fn from_query(query: &PinQuery) -> Result<Self, SvgError> {
        let ident = RepoIdent::from_params(query.username.as_deref(), query.repo.as_deref())
            .map_err(|_| SvgError::msg(MISSING_PARAMS_MESSAGE, StatusCode::BAD_REQUEST))?;

        Ok(Self {
            ident,
            theme: Theme::resolve(query.theme.as_deref()),
            show_owner: query.show_owner.as_deref() != Some("false"),
            card: CardOptions {
                hide_border: matches!(query.hide_border.as_deref(), Some("true" | "1")),
            },
            cache_seconds: parse_cache_seconds(query.cache_seconds.as_deref()),
        })
    }

    fn success_cache(&self) -> CachePolicy {
        CachePolicy::Public {
            max_age: self.cache_seconds.min(MAX_CACHE_SECONDS),
            stale_while_revalidate: Some(STALE_WHILE_REVALIDATE),
        }
    }

    fn rate_limit_cache(&self) -> CachePolicy {
        CachePolicy::Public {
            max_age: self.cache_seconds.min(RATE_LIMIT_MAX_AGE),
            stale_while_revalidate: Some(STALE_WHILE_REVALIDATE),
        }
    }
}

/// Positive number of seconds, or the default.
///
/// Values too large for `u32` saturate.
fn parse_cache_seconds(raw: Option<&str>) -> u32 {
    match raw.map(|x| x.trim().parse::<u32>()) {
        Some(Ok(seconds)) if seconds > 0 => seconds,
        Some(Err(err)) if *err.kind() == IntErrorKind::PosOverflow => u32::MAX,
        _ => DEFAULT_CACHE_SECONDS,
    }
}

fn error_cache() -> CachePolicy {
    CachePolicy::Public {
        max_age: ERROR_MAX_AGE,
        stale_while_revalidate: None,
    }
}

pub async fn handler_pin(State(ctx): State<Ctx>, RawQuery(raw): RawQuery) -> Response {
    let raw = raw.unwrap_or_default();
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(&raw);
    let query = match pairs {
        Ok(pairs) => PinQuery::from_pairs(pairs),
        Err(err) => {
            tracing::debug!("invalid query string: {}", err);
            return SvgError::msg("Invalid query parameters", StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    let theme = Theme::resolve(query.theme.as_deref());
    match pin(&ctx, &query).await {
        Ok(res) => res.into_response(),
        Err(err) => err.with_theme(theme).into_response(),
    }
}

async fn pin(ctx: &Ctx, query: &PinQuery) -> Result<Svg, SvgError> {
    let req = PinRequest::from_query(query)?;
    let theme = req.theme;

    let res = match ctx.github.fetch_repository(&req.ident).await? {
        FetchOutcome::Success(payload) => {
            let snapshot = RepoSnapshot::from_payload(payload, &req.ident, req.show_owner);
            Svg::new(
                StatusCode::OK,
                req.success_cache(),
                card::render_success(&snapshot, theme, &req.card),
            )
            .allow_any_origin()
        }
        FetchOutcome::RateLimited { reset_at } => {
            tracing::warn!(
                repo = %req.ident,
                reset_at = ?reset_at.map(time::OffsetDateTime::from),
                "Github API rate limit exceeded"
            );
            Svg::new(
                StatusCode::OK,
                req.rate_limit_cache(),
                card::render_rate_limited(theme),
            )
        }
        FetchOutcome::NotFound => Svg::new(
            StatusCode::OK,
            error_cache(),
            card::render_error(
                &format!("Repository not found: {}", req.ident.name()),
                theme,
            ),
        ),
        FetchOutcome::Transport { status, body } => {
            tracing::error!(repo = %req.ident, %status, %body, "unexpected Github API response");
            Svg::new(
                StatusCode::OK,
                error_cache(),
                card::render_error(&format!("GitHub API error: {}", status.as_u16()), theme),
            )
        }
        FetchOutcome::Network(err) => {
            tracing::error!(repo = %req.ident, "Github API request failed: {}", err);
            Svg::new(
                StatusCode::OK,
                error_cache(),
                card::render_error("GitHub API unreachable", theme),
            )
        }
    };

    Ok(res)
}
