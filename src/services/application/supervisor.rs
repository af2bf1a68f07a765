//! 同步任务调度
//!
//! 每台配置的PLC对应一个独立的同步任务，所有任务共享同一个
//! 停机令牌与同一个Modbus端点（各自持有独立TCP连接）。
//! 第一次中断信号触发协作停机，第二次中断立即退出进程。

use crate::models::config::{GlobalConfig, ModbusEndpoint, PlcConfig};
use crate::services::domain::synchronizer::Synchronizer;
use crate::services::infrastructure::modbus_adapter::ModbusAdapter;
use crate::services::infrastructure::srtp::client::{PlcRegisterBus, SrtpClient};
use crate::utils::error::{AppError, AppResult};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 启动全部同步任务并等待它们结束
///
/// 协作取消不算失败；返回第一个真正的任务错误。
pub async fn run(config: GlobalConfig) -> AppResult<()> {
    if config.plcs.is_empty() {
        log::warn!("⚠️ [SUPERVISOR] 配置中没有任何PLC, 服务直接退出");
        return Ok(());
    }

    let token = CancellationToken::new();
    spawn_signal_watcher(token.clone());

    let mut handles = Vec::with_capacity(config.plcs.len());
    for plc in config.plcs {
        let label = plc.label();
        log::info!("🚀 [SUPERVISOR] 启动同步任务 {}", label);
        let handle = tokio::spawn(run_synchronizer(
            plc,
            config.modbus.clone(),
            config.poll_interval,
            token.clone(),
        ));
        handles.push((label, handle));
    }

    let mut first_error: Option<AppError> = None;
    for (label, handle) in handles {
        match handle.await {
            Ok(Ok(())) => log::info!("[SUPERVISOR] 同步任务 {} 正常退出", label),
            Ok(Err(AppError::Cancelled)) => {
                log::info!("[SUPERVISOR] 同步任务 {} 已按请求停止", label);
            }
            Ok(Err(e)) => {
                log::error!("❌ [SUPERVISOR] 同步任务 {} 异常退出: {}", label, e);
                first_error.get_or_insert(e);
            }
            Err(e) => {
                let err =
                    AppError::concurrency_error(format!("同步任务 {} 意外终止: {}", label, e));
                log::error!("❌ [SUPERVISOR] {}", err);
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// 单台PLC的同步任务：建连、启动对账、进入周期循环
async fn run_synchronizer(
    plc_config: PlcConfig,
    modbus: ModbusEndpoint,
    poll_interval: Duration,
    token: CancellationToken,
) -> AppResult<()> {
    let label = plc_config.label();

    let mut client = SrtpClient::new(plc_config.ip.clone(), plc_config.port);
    client.connect().await?;

    let adapter = match ModbusAdapter::connect(modbus.socket_addr()?, modbus.slave_id).await {
        Ok(adapter) => adapter,
        Err(e) => {
            client.disconnect().await;
            return Err(e);
        }
    };

    let mut synchronizer = Synchronizer::new(
        label,
        Box::new(client),
        adapter,
        plc_config.maps,
        poll_interval,
    );
    synchronizer.initialize().await?;
    synchronizer.run(token).await
}

/// 监听中断信号：第一次协作停机，第二次立即退出
fn spawn_signal_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            log::error!("❌ [SUPERVISOR] 注册中断信号处理失败");
            return;
        }
        log::info!("🛑 [SUPERVISOR] 收到中断信号, 开始协作停机 (再次Ctrl-C立即退出)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("⚠️ [SUPERVISOR] 再次收到中断信号, 立即退出");
            std::process::exit(130);
        }
    });
}
