use litescribe_worker::app;

#[tokio::main]
async fn main() {
    // Default level = INFO for this crate, WARN for everything else.
    // Override at runtime via the RUST_LOG environment variable:
    //   RUST_LOG=litescribe_worker=debug,lapin=warn litescribe-worker
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("litescribe_worker=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    if let Err(e) = app::run().await {
        tracing::error!("❌ fatal: {e}");
        std::process::exit(1);
    }
}
