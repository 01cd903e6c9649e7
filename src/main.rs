use anyhow::Result;
use short_answer_grading::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    let _reports = App::initialize(config).await?.run().await?;

    Ok(())
}
