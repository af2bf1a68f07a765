use srtp_mirror::models::config::GlobalConfig;
use srtp_mirror::services::application::supervisor;
use srtp_mirror::utils::error::AppError;

/// 应用程序主入口
///
/// 唯一的可选位置参数为配置文件路径，缺省为工作目录下的config.json
#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    log::info!("读取配置文件: {}", config_path);

    let config = GlobalConfig::load_from_file(&config_path)?;
    log::info!(
        "配置加载完成: {}台PLC, 轮询周期{:?}, Modbus端点 {}:{}",
        config.plcs.len(),
        config.poll_interval,
        config.modbus.ip,
        config.modbus.port
    );

    supervisor::run(config).await
}
