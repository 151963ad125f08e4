use tracing_subscriber::EnvFilter;

use metagate_server::configs::Settings;

#[tokio::main]
async fn main() {
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load settings: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "metagate_server={level},tower_http={level}",
            level = settings.logger.level
        )))
        .init();

    if let Err(err) = metagate_server::run(settings).await {
        tracing::error!(%err, "gateway terminated");
        std::process::exit(1);
    }
}
