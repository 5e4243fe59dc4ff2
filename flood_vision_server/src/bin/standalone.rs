use flood_vision_server::{ServerConfig, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // FV_* variables, defaults to canned mode on 127.0.0.1:3001
    let cfg = ServerConfig::from_env()?;
    let handle = start_server(cfg).await?;
    // Park forever
    handle.await.ok();
    Ok(())
}
