//! HTTP connection handling module
//!
//! - [`HttpConnection`]: serves requests on one connection, driving hooks for each exchange
//! - [`Exchange`]: the request being served together with its queued response output
//! - [`ConnectionSettings`]: timeouts and limits applied to a connection

mod exchange;
mod http_connection;
mod message_writer;
mod settings;

pub use exchange::Exchange;
pub use http_connection::HttpConnection;
pub use settings::ConnectionSettings;
