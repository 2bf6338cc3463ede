use handoff_api::setup;
use handoff_core::Config;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let shutdown = CancellationToken::new();
    let (_state, app) = setup::initialize_app(config.clone(), shutdown.clone())?;

    setup::server::start_server(&config, app, shutdown).await?;

    Ok(())
}
