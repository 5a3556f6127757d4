use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::chat::ChatClient;
use crate::config::Config;
use crate::dashboard::{DashboardProcess, DashboardStatus};
use crate::error::FeedFetchError;
use crate::forms::{EnquiryForm, FeedbackForm, ReviewForm, ThankYou};
use crate::mailer::Mailer;
use crate::news::{IslandNews, NewsAggregator};

pub struct AppState {
    pub news: NewsAggregator,
    pub mailer: Arc<dyn Mailer>,
    pub chat: ChatClient,
    pub dashboard: Arc<DashboardProcess>,
    pub landing_page: String,
}

impl AppState {
    pub fn from_config(
        config: &Config,
        mailer: Arc<dyn Mailer>,
        dashboard: Arc<DashboardProcess>,
        chat_api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            news: NewsAggregator::new(&config.news)?,
            mailer,
            chat: ChatClient::new(&config.chat, chat_api_key)?,
            dashboard,
            landing_page: config.server.landing_page.clone(),
        })
    }
}

#[derive(Template)]
#[template(path = "dashboard_embed.html")]
pub struct DashboardEmbedTemplate {
    pub dashboard_url: String,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewsErrorBody {
    pub error: &'static str,
    pub details: String,
}

/// Aggregation failure, reported as a JSON 500.
pub struct NewsError(FeedFetchError);

impl IntoResponse for NewsError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(NewsErrorBody {
                error: "Failed to fetch island news",
                details: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// Route handlers
pub async fn island_news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IslandNews>, NewsError> {
    match state.news.island_news().await {
        Ok(news) => Ok(Json(news)),
        Err(e) => {
            error!("Island news failed on {}: {}", e.url(), e);
            Err(NewsError(e))
        }
    }
}

async fn send_thank_you<F: ThankYou>(state: &AppState, form: &F) -> Response {
    let email = form.thank_you();
    match state
        .mailer
        .send(&email.to, email.subject, &email.body)
        .await
    {
        Ok(()) => Redirect::to(form.redirect_to()).into_response(),
        Err(e) => {
            error!("Failed to send '{}' to {}: {}", email.subject, email.to, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error sending email.").into_response()
        }
    }
}

pub async fn enquiry(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EnquiryForm>,
) -> Response {
    send_thank_you(&state, &form).await
}

pub async fn review(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ReviewForm>,
) -> Response {
    send_thank_you(&state, &form).await
}

pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Form(form): Form<FeedbackForm>,
) -> Response {
    send_thank_you(&state, &form).await
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let response = state.chat.reply(&request.prompt).await;
    Json(ChatResponse { response })
}

/// Hostname the client used to reach us, without the port.
pub fn request_host(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");

    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:5502
        if let Some(end) = rest.find(']') {
            return format!("[{}]", &rest[..end]);
        }
    }

    host.split(':').next().unwrap_or("localhost").to_string()
}

pub async fn dashboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    Redirect::to(&state.dashboard.url_for_host(&request_host(&headers)))
}

pub async fn dashboard_embed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    HtmlTemplate(DashboardEmbedTemplate {
        dashboard_url: state.dashboard.url_for_host(&request_host(&headers)),
    })
}

#[derive(Debug, Serialize)]
pub struct DashboardHealth {
    pub status: DashboardStatus,
    pub healthy: bool,
}

pub async fn dashboard_health(State(state): State<Arc<AppState>>) -> Json<DashboardHealth> {
    let healthy = state.dashboard.health_check().await;
    let status = state.dashboard.status().await;
    Json(DashboardHealth { status, healthy })
}

pub async fn root(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.landing_page)
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Page not found.")
}
