//! Shared handler helpers.

use crate::error::ApiResult;
use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::header::{CONNECTION, TRANSFER_ENCODING};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use futures::TryStreamExt;

/// CORS headers coming back from upstream hops. They would conflict with
/// this gateway's own CORS policy, so they are always stripped.
const CORS_HEADERS: [&str; 2] = ["access-control-allow-credentials", "access-control-allow-origin"];

/// Remove upstream CORS headers in place.
pub fn strip_cors_headers(headers: &mut HeaderMap) {
    for name in CORS_HEADERS {
        headers.remove(name);
    }
}

/// Forward an upstream response to the client as-is: same status, same body
/// stream, headers minus the CORS pair and the hop-by-hop fields.
pub fn forward_upstream(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_cors_headers(&mut headers);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);

    let body = Body::from_stream(upstream.bytes_stream().map_err(std::io::Error::other));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Attach the session cookie jar to whichever way the handler went.
///
/// The jar may carry a refreshed token even when the pipeline later failed,
/// so it is included on the error branch too.
pub fn with_jar(jar: PrivateCookieJar, result: ApiResult<Response>) -> Response {
    match result {
        Ok(response) => (jar, response).into_response(),
        Err(err) => (jar, err).into_response(),
    }
}
