//! Per-connection lifecycle hooks.
//!
//! [`HttpConnection`](crate::connection::HttpConnection) drives every exchange through a
//! [`ConnectionHooks`] implementation. The hooks below fire in a fixed order for each
//! request:
//!
//! 1. [`ConnectionHooks::on_pre_accept`] once per socket, before it is handed to a worker
//! 2. [`ConnectionHooks::on_post_accept`] once per connection, on the worker
//! 3. [`ConnectionHooks::on_headers`] when the request head is parsed, creating the per-request state
//! 4. [`ConnectionHooks::on_request`] when the request body has been read completely
//! 5. [`ConnectionHooks::on_write`] whenever the connection is able to accept more output
//! 6. [`ConnectionHooks::on_error`] when the transport fails
//! 7. [`ConnectionHooks::on_finish`] exactly once, consuming the per-request state
//!
//! The per-request state is owned by the connection between `on_headers` and
//! `on_finish`, so it is released exactly once.

use std::fmt;
use std::ops::BitOr;

use tokio::net::TcpStream;

use crate::connection::{ConnectionSettings, Exchange};

/// Describes a transport failure, in the style of event flags.
///
/// A value combines the direction (`READING` / `WRITING`) with the cause
/// (`EOF`, `ERROR`, `TIMEOUT`). `DATA_TOO_LONG` stands alone and marks a
/// request body exceeding the configured limit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorFlags(u16);

impl ErrorFlags {
    pub const READING: ErrorFlags = ErrorFlags(0x01);
    pub const WRITING: ErrorFlags = ErrorFlags(0x02);
    pub const EOF: ErrorFlags = ErrorFlags(0x10);
    pub const ERROR: ErrorFlags = ErrorFlags(0x20);
    pub const TIMEOUT: ErrorFlags = ErrorFlags(0x40);
    pub const CONNECTED: ErrorFlags = ErrorFlags(0x80);
    pub const DATA_TOO_LONG: ErrorFlags = ErrorFlags(0x100);

    const NAMES: [(ErrorFlags, &'static str); 7] = [
        (Self::READING, "READING"),
        (Self::WRITING, "WRITING"),
        (Self::EOF, "EOF"),
        (Self::ERROR, "ERROR"),
        (Self::TIMEOUT, "TIMEOUT"),
        (Self::CONNECTED, "CONNECTED"),
        (Self::DATA_TOO_LONG, "DATA_TOO_LONG"),
    ];

    #[inline]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(&self, other: ErrorFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ErrorFlags {
    type Output = ErrorFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ErrorFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES.iter() {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("NONE")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorFlags({self}, 0x{:X})", self.0)
    }
}

/// Result of an accept hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    Proceed,
    /// the connection is closed without being served
    Reject,
}

/// The callbacks a connection runs while serving requests.
///
/// `Request` is the per-request state created by [`on_headers`](ConnectionHooks::on_headers).
/// Returning `None` there means the request has no state attached. The remaining per-request
/// hooks are then skipped apart from `on_request`, which sees `None` and must reply on its own.
pub trait ConnectionHooks {
    type Request;

    fn on_pre_accept(&self, _stream: &TcpStream) -> HookStatus {
        HookStatus::Proceed
    }

    fn on_post_accept(&self, _settings: &mut ConnectionSettings) -> HookStatus {
        HookStatus::Proceed
    }

    fn on_headers(&self, exchange: &mut Exchange) -> Option<Self::Request>;

    fn on_request(&self, exchange: &mut Exchange, request: Option<&mut Self::Request>);

    fn on_write(&self, exchange: &mut Exchange, request: &mut Self::Request);

    fn on_error(&self, exchange: &Exchange, flags: ErrorFlags, request: &mut Self::Request);

    fn on_finish(&self, exchange: &mut Exchange, request: Self::Request);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_flag_names() {
        assert_eq!((ErrorFlags::READING | ErrorFlags::TIMEOUT).to_string(), "READING|TIMEOUT");
        assert_eq!(ErrorFlags::DATA_TOO_LONG.to_string(), "DATA_TOO_LONG");
        assert_eq!((ErrorFlags::WRITING | ErrorFlags::EOF).bits(), 0x12);
    }

    #[test]
    fn contains_checks_every_bit() {
        let flags = ErrorFlags::WRITING | ErrorFlags::ERROR;
        assert!(flags.contains(ErrorFlags::WRITING));
        assert!(flags.contains(ErrorFlags::ERROR));
        assert!(!flags.contains(ErrorFlags::READING));
        assert!(!flags.contains(ErrorFlags::WRITING | ErrorFlags::TIMEOUT));
    }
}
