use remind_app::app::{run, AppConfig};

#[tokio::main]
async fn main() {
    // stdout carries lifecycle events for the UI process.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config).await {
        eprintln!("Failed to start remind: {err:#}");
    }
}
