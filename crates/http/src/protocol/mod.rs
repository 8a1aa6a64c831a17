//! Core HTTP protocol abstractions.
//!
//! - **Message Handling** ([`message`]): [`Message`], [`PayloadItem`] and [`PayloadSize`]
//!   frame headers and payload in both directions
//! - **Request Processing** ([`request`]): [`RequestHeader`] wraps the parsed request head
//! - **Response Processing** ([`response`]): [`ResponseHead`] is the head before framing
//! - **Error Handling** ([`error`]): [`HttpError`], [`ParseError`] and [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;
pub use response::response_head;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
