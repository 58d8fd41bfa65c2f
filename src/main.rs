use dev_agent::app::App;
use dev_agent::config::AgentSettings;
use dev_agent::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Flushes the log file on exit
    let _log_guard = logging::init_logging()?;

    let settings = AgentSettings::load()?;

    App::new(settings).run().await
}
