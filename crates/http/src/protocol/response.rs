//! HTTP response header handling implementation.
//!
//! Response heads are built by the exchange from a status and the headers a
//! handler added, then handed to the encoder together with a [`PayloadSize`](super::PayloadSize).

use http::{HeaderMap, Response, StatusCode};

/// Type alias for HTTP response headers.
///
/// `http::Response<()>` with an empty body placeholder, the body is framed
/// separately as payload items.
pub type ResponseHead = Response<()>;

/// Builds a response head carrying `status` and the given headers.
pub fn response_head(status: StatusCode, headers: HeaderMap) -> ResponseHead {
    let mut head = Response::new(());
    *head.status_mut() = status;
    *head.headers_mut() = headers;
    head
}
