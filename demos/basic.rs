//! Request logging with a JSON sink and custom fields.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:9000/
//!   curl http://localhost:9000/err
//!
//! Each request prints one JSON line on stdout, e.g.
//!   {"host":"localhost:9000","start_time":"…","end_time":"…","time":"…","level":"error","msg":"ups"}

use http::StatusCode;
use tracing_subscriber::EnvFilter;
use tsu_logger::{Context, Error, Fields, JsonSink, RequestLogger, Router, Server, Timestamp};

#[tokio::main]
async fn main() {
    // Framework diagnostics go through tracing; request entries go to the sink.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let logger = RequestLogger::builder()
        .sink(JsonSink::new(std::io::stdout()))
        .fields(custom_fields)
        .build();

    let app = Router::new()
        .with(logger)
        .get("/", hello)
        .get("/err", fail);

    if let Err(e) = Server::bind("0.0.0.0:9000").serve(app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}

fn custom_fields(c: &Context, start: &Timestamp, end: &Timestamp) -> Fields {
    Fields::new()
        .with("host", c.request().host())
        .with("start_time", start.rfc3339())
        .with("end_time", end.rfc3339())
}

// GET / → 200 "hello"
async fn hello(c: Context) -> Result<(), Error> {
    c.text(StatusCode::OK, "hello")
}

// GET /err → 500 {"message":"Internal Server Error"}, logged at error with msg "ups"
async fn fail(_c: Context) -> Result<(), Error> {
    Err(Error::msg("ups"))
}
