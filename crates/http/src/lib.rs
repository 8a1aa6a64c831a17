//! A hook driven micro HTTP/1.1 reactor
//!
//! This crate accepts connections, parses requests and drives every exchange
//! through a [`hook::ConnectionHooks`] implementation. The hooks produce the
//! response by queueing output on the [`connection::Exchange`] and are called
//! back whenever the connection can take more output, which makes it possible
//! to stream large responses while keeping the amount of buffered data bounded.
//!
//! # Architecture
//!
//! - [`server`]: listener with an acceptor thread and per-thread workers
//! - [`connection`]: per-connection request loop, exchanges and settings
//! - [`hook`]: lifecycle callbacks and transport error flags
//! - [`codec`]: request decoding and response encoding
//! - [`protocol`]: protocol types and errors
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::StatusCode;
//! use micro_http::connection::Exchange;
//! use micro_http::hook::{ConnectionHooks, ErrorFlags};
//! use micro_http::server::{HttpServer, ServerSettings};
//!
//! struct HelloWorld;
//!
//! impl ConnectionHooks for HelloWorld {
//!     type Request = ();
//!
//!     fn on_headers(&self, _exchange: &mut Exchange) -> Option<()> {
//!         Some(())
//!     }
//!
//!     fn on_request(&self, exchange: &mut Exchange, _request: Option<&mut ()>) {
//!         let _ = exchange.send_reply(StatusCode::OK, Bytes::from_static(b"Hello World!\r\n"));
//!     }
//!
//!     fn on_write(&self, _exchange: &mut Exchange, _request: &mut ()) {}
//!
//!     fn on_error(&self, _exchange: &Exchange, _flags: ErrorFlags, _request: &mut ()) {}
//!
//!     fn on_finish(&self, _exchange: &mut Exchange, _request: ()) {}
//! }
//!
//! let settings = ServerSettings::new("127.0.0.1:8080".parse().unwrap());
//! HttpServer::bind(settings, HelloWorld).unwrap().run().unwrap();
//! ```
//!
//! # Limitations
//!
//! - HTTP/1.1 only (currently HTTP/2 or HTTP/3 is not supported)
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod hook;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
