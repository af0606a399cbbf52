use tracing::info;
use updist::App;
use updist::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?.validate()?;
    updist::logging::init(&settings.log)?;

    let app = App::build(&settings)?;
    info!("updistd running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutdown requested");
    app.shutdown().await;
    Ok(())
}
