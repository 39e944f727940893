use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{validation::validate_visitor_id, visitor::VisitorResponse},
    error::AppError,
    state::SharedState,
};

/// Header carrying the visitor identifier; takes precedence over the cookie.
pub const VISITOR_HEADER: &str = "x-visitor-id";
/// Cookie issued by `GET /visitor`.
pub const VISITOR_COOKIE: &str = "visitor_id";
const VISITOR_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Visitor identifier of the caller. Rejects requests without a valid one.
#[derive(Debug, Clone)]
pub struct Visitor(pub String);

/// Visitor identifier of the caller, when it sent one.
#[derive(Debug, Clone)]
pub struct MaybeVisitor(pub Option<String>);

impl MaybeVisitor {
    /// Identifier to compare ownership against; anonymous callers own nothing.
    pub fn id(&self) -> &str {
        self.0.as_deref().unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        visitor_from_headers(&parts.headers)
            .map(Visitor)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "a valid visitor id is required (`{VISITOR_HEADER}` header or `{VISITOR_COOKIE}` cookie)"
                ))
            })
    }
}

impl<S> FromRequestParts<S> for MaybeVisitor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeVisitor(visitor_from_headers(&parts.headers)))
    }
}

/// Extract a valid visitor identifier from the header, falling back to the cookie.
pub fn visitor_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(VISITOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| validate_visitor_id(value).is_ok());

    from_header
        .map(str::to_owned)
        .or_else(|| visitor_from_cookies(headers))
}

fn visitor_from_cookies(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(VISITOR_COOKIE)
        .map(|cookie| cookie.value_trimmed())
        .filter(|value| validate_visitor_id(value).is_ok())
        .map(str::to_owned)
}

fn visitor_cookie(visitor_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((VISITOR_COOKIE, visitor_id))
        .path("/")
        .max_age(time::Duration::days(VISITOR_COOKIE_MAX_AGE_DAYS))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

#[utoipa::path(
    get,
    path = "/visitor",
    tag = "visitor",
    responses(
        (status = 200, description = "Caller already holds a visitor id", body = VisitorResponse),
        (status = 201, description = "A new visitor id was issued as a cookie", body = VisitorResponse)
    )
)]
/// Return the caller's visitor id, issuing a cookie when it has none.
pub async fn get_visitor(
    State(state): State<SharedState>,
    MaybeVisitor(existing): MaybeVisitor,
) -> Response {
    if let Some(visitor_id) = existing {
        return (
            StatusCode::OK,
            Json(VisitorResponse {
                visitor_id,
                issued: false,
            }),
        )
            .into_response();
    }

    let visitor_id = Uuid::new_v4().to_string();
    let jar = CookieJar::new().add(visitor_cookie(
        visitor_id.clone(),
        state.config().visitor.cookie_secure,
    ));
    info!("issued new visitor id");

    (
        StatusCode::CREATED,
        jar,
        Json(VisitorResponse {
            visitor_id,
            issued: true,
        }),
    )
        .into_response()
}

/// Configure the visitor identity endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/visitor", get(get_visitor))
}
