use vidflow_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // A missing .env file is fine; real deployments use the environment.
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    let (state, router) = vidflow_api::setup::initialize_app(&config).await?;

    vidflow_api::setup::server::start_server(&config, router, state.shutdown.clone()).await?;

    Ok(())
}
