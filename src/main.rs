mod auth;
mod chat;
mod common;
mod error;
mod http_client;
mod jwt;
mod model;
mod provider;
mod server;
mod store;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use model::config::Config;
use store::Database;

/// 多 Provider 生成式 AI 网关
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = Config::default_config_path())]
    config: String,

    /// 覆盖配置中的监听地址
    #[arg(long)]
    host: Option<String>,

    /// 覆盖配置中的监听端口
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut config = Config::load(&args.config)?;
    config.apply_env_overrides();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = config.config_path() {
        tracing::info!("已加载配置: {}", path.display());
    }

    let db = Database::open(&config.db_path)?;
    tracing::info!("数据库已打开: {}", config.db_path);

    let app = server::build_app(&config, db)?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("启动服务: http://{}", addr);
    tracing::info!("历史记录保留条数: {}", config.history_limit);

    axum::serve(listener, app).await?;
    Ok(())
}
