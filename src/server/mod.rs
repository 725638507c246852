pub mod card;
mod routes;

use std::{any::Any, net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{
    body::Body,
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::source::github::GithubClient;

use self::card::Theme;

pub const DEFAULT_PORT: u16 = 3333;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml;charset=utf-8";

pub struct CtxBuilder {
    pub github_token: Option<String>,
    pub github_api_url: Option<String>,
}

impl CtxBuilder {
    pub fn new() -> Self {
        Self {
            github_token: None,
            github_api_url: None,
        }
    }

    pub fn github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token.filter(|x| !x.is_empty());
        self
    }

    pub fn github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<Ctx, anyhow::Error> {
        let mut github = GithubClient::new(self.github_token)?;
        if let Some(url) = self.github_api_url {
            let url = url
                .parse()
                .with_context(|| format!("invalid Github API url: {}", url))?;
            github = github.with_api_base(url);
        }

        Ok(Ctx { github })
    }
}

impl Default for CtxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Server context.
#[derive(Clone)]
pub struct Ctx {
    github: GithubClient,
}

impl Ctx {
    pub async fn run_server(self, port: u16) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        run_server(addr, self).await
    }
}

fn build_router(ctx: Ctx) -> Router {
    Router::new()
        .route(routes::pin::PATH_PIN, get(routes::pin::handler_pin))
        .with_state(ctx)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .layer(
            // Graceful shutdown will wait for outstanding requests to complete.
            // Add a timeout so requests don't hang forever. Must stay above the
            // Github client timeout so upstream stalls still render a card.
            tower_http::timeout::TimeoutLayer::new(Duration::from_secs(40)),
        )
}

async fn run_server(addr: SocketAddr, ctx: Ctx) -> Result<(), anyhow::Error> {
    tracing::info!("starting server: {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("could not bind port")?;

    let app = build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("received shutdown signal");
}

/// `Cache-Control` policy of a card response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    NoStore,
    Public {
        max_age: u32,
        stale_while_revalidate: Option<u32>,
    },
}

impl std::fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePolicy::NoStore => f.write_str("no-cache, no-store, must-revalidate"),
            CachePolicy::Public {
                max_age,
                stale_while_revalidate: None,
            } => write!(f, "public, max-age={}", max_age),
            CachePolicy::Public {
                max_age,
                stale_while_revalidate: Some(swr),
            } => write!(
                f,
                "public, max-age={}, stale-while-revalidate={}",
                max_age, swr
            ),
        }
    }
}

/// An SVG document response.
pub(crate) struct Svg {
    status: StatusCode,
    cache: CachePolicy,
    allow_any_origin: bool,
    body: String,
}

impl Svg {
    fn new(status: StatusCode, cache: CachePolicy, body: String) -> Self {
        Self {
            status,
            cache,
            allow_any_origin: false,
            body,
        }
    }

    fn allow_any_origin(mut self) -> Self {
        self.allow_any_origin = true;
        self
    }
}

impl IntoResponse for Svg {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(SVG_CONTENT_TYPE),
        );
        if let Ok(value) = HeaderValue::from_str(&self.cache.to_string()) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if self.allow_any_origin {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }

        (self.status, headers, Body::from(self.body)).into_response()
    }
}

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// A failure that is reported to the caller as an error card.
///
/// Responses are never cached.
#[derive(Debug)]
pub(crate) struct SvgError {
    message: String,
    status: StatusCode,
    theme: Theme,
    source: Option<anyhow::Error>,
}

impl SvgError {
    pub fn msg(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
            theme: Theme::default(),
            source: None,
        }
    }

    pub fn with_theme(self, theme: Theme) -> Self {
        Self { theme, ..self }
    }
}

impl From<anyhow::Error> for SvgError {
    fn from(source: anyhow::Error) -> Self {
        Self {
            message: INTERNAL_ERROR_MESSAGE.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            theme: Theme::default(),
            source: Some(source),
        }
    }
}

impl IntoResponse for SvgError {
    fn into_response(self) -> Response {
        if let Some(source) = &self.source {
            tracing::error!(status = %self.status, "request failed: {:#}", source);
        }

        Svg::new(
            self.status,
            CachePolicy::NoStore,
            card::render_error(&self.message, self.theme),
        )
        .into_response()
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!("request handler panicked: {}", details);

    SvgError::msg(INTERNAL_ERROR_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

#[cfg(test)]
async fn test_client(github_api_url: &str) -> axum_test_helper::TestClient {
    let ctx = CtxBuilder::new()
        .github_api_url(github_api_url)
        .build()
        .expect("could not build server context");
    let app = build_router(ctx);
    axum_test_helper::TestClient::new(app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_policy_header_values() {
        assert_eq!(
            CachePolicy::NoStore.to_string(),
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(
            CachePolicy::Public {
                max_age: 300,
                stale_while_revalidate: None
            }
            .to_string(),
            "public, max-age=300"
        );
        assert_eq!(
            CachePolicy::Public {
                max_age: 1800,
                stale_while_revalidate: Some(3600)
            }
            .to_string(),
            "public, max-age=1800, stale-while-revalidate=3600"
        );
    }

    #[tokio::test]
    async fn test_handle_panic_renders_error_card() {
        let res = handle_panic(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers()[header::CONTENT_TYPE], SVG_CONTENT_TYPE);
        assert_eq!(
            res.headers()[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );

        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Internal server error"));
        assert!(!body.contains("boom"));
    }

    #[test]
    fn test_ctx_builder_rejects_invalid_api_url() {
        assert!(CtxBuilder::new().github_api_url("not a url").build().is_err());
    }
}
