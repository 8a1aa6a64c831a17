//! Exact path routing to registered handlers.

use std::collections::HashMap;
use std::fmt;

use tracing::{error, trace};

use crate::handler::Handler;
use crate::request::HttpRequest;

/// Maps commands, the request paths, to handlers.
///
/// Handlers are registered before the server starts. The server takes the
/// dispatcher by value, so the registry is read-only while requests are served.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands = self.handlers.keys().collect::<Vec<_>>();
        commands.sort();
        f.debug_struct("Dispatcher").field("commands", &commands).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `command`.
    ///
    /// Returns false, keeping the registry unchanged, if `command` is empty or
    /// already registered.
    pub fn register(&mut self, command: impl Into<String>, handler: impl Handler + 'static) -> bool {
        let command = command.into();
        if command.is_empty() {
            error!("can't register handler for an empty command");
            return false;
        }
        if self.handlers.contains_key(&command) {
            error!(command = %command, "handler already registered");
            return false;
        }

        self.handlers.insert(command, Box::new(handler));
        true
    }

    /// Runs the handler registered for `command` with `request`.
    ///
    /// Returns false when no handler matches or no request is given; the
    /// caller answers those with 404.
    pub fn route(&self, command: &str, request: Option<&mut HttpRequest<'_>>) -> bool {
        let Some(request) = request else {
            error!(command, "route without a request");
            return false;
        };
        let Some(handler) = self.handlers.get(command) else {
            trace!(command, "no handler registered");
            return false;
        };

        handler.call(request);
        true
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::request::RequestHandle;
    use crate::transport::testing::{Frame, RecordingTransport};
    use http::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl Handler + 'static {
        let counter = Arc::clone(counter);
        handler_fn(move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            request.reply("ok", StatusCode::OK);
        })
    }

    #[test]
    fn register_rejects_duplicates_and_empty() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();

        assert!(dispatcher.register("/hello", counting(&first)));
        assert!(!dispatcher.register("/hello", counting(&second)));
        assert!(!dispatcher.register("", counting(&second)));
        assert_eq!(dispatcher.len(), 1);

        let mut transport = RecordingTransport::new("/hello");
        let mut handle = RequestHandle::new(16);
        assert!(dispatcher.route("/hello", Some(&mut HttpRequest::new(&mut transport, &mut handle))));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn routes_by_exact_path() {
        let hello = Arc::new(AtomicUsize::new(0));
        let world = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("/hello", counting(&hello));
        dispatcher.register("/world", counting(&world));

        for path in ["/hello", "/missing", "/hello/", "/HELLO"] {
            let mut transport = RecordingTransport::new(path);
            let mut handle = RequestHandle::new(16);
            let routed = dispatcher.route(path, Some(&mut HttpRequest::new(&mut transport, &mut handle)));
            assert_eq!(routed, path == "/hello", "{path}");
            assert_eq!(routed, transport.frames == vec![Frame::Reply(StatusCode::OK, "ok".into())]);
        }

        assert_eq!(hello.load(Ordering::SeqCst), 1);
        assert_eq!(world.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn route_without_request_fails() {
        let hello = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("/hello", counting(&hello));

        assert!(!dispatcher.route("/hello", None));
        assert_eq!(hello.load(Ordering::SeqCst), 0);
    }
}
