//! Path keyed request dispatcher on top of the `micro-http` reactor.
//!
//! Handlers are registered on a [`Dispatcher`] under the exact request path
//! they serve. Every request gets an [`HttpRequest`] through which the handler
//! either replies at once or starts a chunked reply and installs a
//! [`WriteContinuation`]. The continuation is called whenever the connection
//! can take more output, and once more with [`WriteEvent::Teardown`] when the
//! request is finished, so streams of any size can be produced while the
//! queued output stays below [`ServerConfig::max_pending_bytes`].
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::StatusCode;
//! use micro_dispatcher::{Dispatcher, Server, ServerConfig, StreamingReply, handler_fn};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register(
//!     "/world",
//!     handler_fn(|request| {
//!         request.reply("World\n", StatusCode::OK);
//!     }),
//! );
//! dispatcher.register(
//!     "/hello",
//!     handler_fn(|request| {
//!         let chunks = std::iter::repeat_n(Bytes::from_static(b"hello\n"), 1000);
//!         request.set_write_continuation(StreamingReply::new(StatusCode::OK, chunks));
//!     }),
//! );
//!
//! let server = Server::builder().dispatcher(dispatcher).config(ServerConfig::default()).build().unwrap();
//! server.run().unwrap();
//! ```

mod adapter;
mod config;
mod continuation;
mod dispatcher;
mod error;
mod handler;
mod request;
mod server;
mod transport;

pub use adapter::DispatchHooks;
pub use config::ServerConfig;
pub use continuation::{FnContinuation, StreamingReply, WriteContinuation, WriteEvent, WriteStatus, write_continuation_fn};
pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use handler::{FnHandler, Handler, handler_fn};
pub use request::{HttpRequest, Phase, RequestHandle};
pub use server::{Server, ServerBuilder};
pub use transport::Transport;
