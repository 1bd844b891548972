//! Request correlation middleware.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Correlation id for one request. Inserted into request extensions so
/// handlers can tag their log lines with it.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    fn generate() -> Self {
        Self(format!("mkt-{}", Uuid::new_v4().simple()))
    }
}

/// Reuse the caller's `x-request-id` or mint one, and echo it on the
/// response so clients can correlate end to end.
pub async fn inject_request_id(mut request: Request, next: Next) -> Response {
    let id = match request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
    {
        Some(given) => RequestId(given.to_string()),
        None => RequestId::generate(),
    };
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
