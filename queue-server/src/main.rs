use queue_server::{Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 配置, 工作目录, 日志)
    let config = setup_environment()?;

    print_banner();

    tracing::info!(
        environment = %config.environment,
        port = config.http_port,
        "💈 Queue server starting..."
    );

    // 2. 初始化服务器状态 (数据库, 通知发送者, 初始管理员)
    let state = ServerState::initialize(&config)?;

    // 3. 启动 HTTP 服务器 (Server::run 会启动后台任务)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
