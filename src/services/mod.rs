/// Visitor-based permission checks.
pub mod authorization;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Question lifecycle, likes and selection.
pub mod question_service;
/// Realtime event construction and publication.
pub mod room_events;
/// Room lifecycle and presentation files.
pub mod room_service;
/// Server-Sent Events room streams.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
