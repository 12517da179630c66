use anyhow::Result;
use ykt_session_bot::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load("config.toml")?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
