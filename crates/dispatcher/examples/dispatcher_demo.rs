use std::iter;
use std::process::ExitCode;

use bytes::Bytes;
use clap::Parser;
use http::StatusCode;
use micro_dispatcher::{Dispatcher, Server, ServerConfig, StreamingReply, handler_fn};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

const HELLO_CHUNK_SIZE: usize = 1_024_000;
const HELLO_CHUNKS: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "dispatcher_demo", about = "serves /hello, /world and /stop")]
struct Args {
    /// port to listen on
    #[arg(long, default_value_t = 8889)]
    port: u16,

    /// number of reactor worker threads
    #[arg(long, default_value_t = 17)]
    http_threads: usize,

    /// max log level: trace, debug, info, warn or error
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(args.log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    let shutdown = CancellationToken::new();
    let config = ServerConfig::default().with_port(args.port).with_http_threads(args.http_threads);

    let server = match Server::builder().dispatcher(dispatcher(shutdown.clone())).config(config).shutdown(shutdown).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "can't start server");
            return ExitCode::FAILURE;
        }
    };

    match server.run() {
        Ok(()) => {
            info!("bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(cause = %e, "server stopped with error");
            ExitCode::FAILURE
        }
    }
}

fn dispatcher(shutdown: CancellationToken) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register(
        "/hello",
        handler_fn(|request| {
            let chunk = Bytes::from(vec![b'C'; HELLO_CHUNK_SIZE]);
            request.set_write_continuation(StreamingReply::new(StatusCode::OK, iter::repeat_n(chunk, HELLO_CHUNKS)));
        }),
    );

    dispatcher.register(
        "/world",
        handler_fn(|request| {
            info!("{}", request.dump_request(true));
            request.add_header("Content-Type", "application/x-json");
            request.reply("World\n", StatusCode::MULTIPLE_CHOICES);
        }),
    );

    dispatcher.register(
        "/stop",
        handler_fn(move |request| {
            info!("stop requested by {}", request.short_description());
            request.reply("Stopping\n", StatusCode::OK);
            shutdown.cancel();
        }),
    );

    dispatcher
}
