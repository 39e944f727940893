use serde::Serialize;
use utoipa::ToSchema;

/// Response of `GET /visitor`.
#[derive(Debug, Serialize, ToSchema)]
pub struct VisitorResponse {
    pub visitor_id: String,
    /// Whether the identifier was issued by this request.
    pub issued: bool,
}
