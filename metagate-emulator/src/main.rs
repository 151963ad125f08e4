use tracing_subscriber::EnvFilter;

use metagate_emulator::settings::Settings;

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
            "metagate_emulator={level}",
            level = settings.logger.level
        )))
        .init();

    if let Err(err) = metagate_emulator::run(settings).await {
        tracing::error!(%err, "emulator terminated");
        std::process::exit(1);
    }
}
