//! 单台PLC的寄存器同步器
//!
//! 启动时以PLC为准做一次对账，之后按轮询周期双向增量同步。
//! 每轮对每条映射并发读取两侧镜像，与上一轮快照比较后决定
//! 传播方向，两侧在同一轮都变化时以PLC侧为准。

use crate::models::register_map::RegisterSyncMapping;
use crate::services::domain::sync_area::SyncArea;
use crate::services::infrastructure::modbus_adapter::ModbusAdapter;
use crate::services::infrastructure::srtp::client::PlcRegisterBus;
use crate::utils::error::{AppError, AppResult};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct Synchronizer {
    /// 日志中标识这台PLC的名称
    name: String,
    plc: Box<dyn PlcRegisterBus>,
    modbus: ModbusAdapter,
    areas: Vec<SyncArea>,
    poll_interval: Duration,
}

impl Synchronizer {
    pub fn new(
        name: impl Into<String>,
        plc: Box<dyn PlcRegisterBus>,
        modbus: ModbusAdapter,
        mappings: Vec<RegisterSyncMapping>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            plc,
            modbus,
            areas: mappings.into_iter().map(SyncArea::new).collect(),
            poll_interval,
        }
    }

    /// 启动对账：以PLC为准覆盖Modbus侧的陈旧值，并建立首轮快照
    pub async fn initialize(&mut self) -> AppResult<()> {
        let mut corrected = 0usize;
        for idx in 0..self.areas.len() {
            let mapping = self.areas[idx].mapping().clone();
            let plc_vals = self
                .plc
                .read_registers(mapping.plc_start, mapping.count, mapping.area)
                .await?;
            let mut mb_vals = self
                .modbus
                .read_holding_block(mapping.modbus_start, mapping.count)
                .await?;

            for i in 0..mapping.count as usize {
                let mb_word = if mapping.swap_bytes {
                    mb_vals[i].swap_bytes()
                } else {
                    mb_vals[i]
                };
                if plc_vals[i] == mb_word {
                    continue;
                }
                let to_mb = if mapping.swap_bytes {
                    plc_vals[i].swap_bytes()
                } else {
                    plc_vals[i]
                };
                self.modbus
                    .write_single_register(mapping.modbus_start + i as u16, to_mb)
                    .await?;
                mb_vals[i] = to_mb;
                corrected += 1;
            }
            self.areas[idx].snapshot(plc_vals, mb_vals);
        }
        log::info!(
            "🔄 [SYNC:{}] 启动对账完成, 以PLC为准修正了{}个Modbus寄存器",
            self.name,
            corrected
        );
        Ok(())
    }

    /// 周期同步循环，直到令牌被取消
    ///
    /// 取消在映射之间以及周期睡眠处被检查，本条映射处理完才会退出，
    /// 退出前释放两侧连接并返回取消错误，由调度层消化。
    pub async fn run(&mut self, token: CancellationToken) -> AppResult<()> {
        loop {
            let tick_start = Instant::now();
            for idx in 0..self.areas.len() {
                if token.is_cancelled() {
                    return self.finish_cancelled().await;
                }
                self.sync_area(idx).await?;
            }

            let elapsed = tick_start.elapsed();
            match self.poll_interval.checked_sub(elapsed) {
                Some(remaining) => {
                    tokio::select! {
                        _ = token.cancelled() => return self.finish_cancelled().await,
                        _ = tokio::time::sleep(remaining) => {}
                    }
                }
                None => {
                    // 超过轮询周期时立即进入下一轮，不做追赶
                    log::warn!(
                        "⚠️ [SYNC:{}] 本轮同步耗时{:?}, 超出轮询周期{:?}",
                        self.name,
                        elapsed,
                        self.poll_interval
                    );
                    if token.is_cancelled() {
                        return self.finish_cancelled().await;
                    }
                }
            }
        }
    }

    /// 按配置顺序把所有映射同步一轮
    pub async fn run_tick(&mut self) -> AppResult<()> {
        for idx in 0..self.areas.len() {
            self.sync_area(idx).await?;
        }
        Ok(())
    }

    async fn sync_area(&mut self, idx: usize) -> AppResult<()> {
        let mapping = self.areas[idx].mapping().clone();

        let plc_read = self
            .plc
            .read_registers(mapping.plc_start, mapping.count, mapping.area);
        let mb_read = self
            .modbus
            .read_holding_block(mapping.modbus_start, mapping.count);
        let (mut plc_vals, mut mb_vals) = tokio::try_join!(plc_read, mb_read)?;

        for i in 0..mapping.count as usize {
            let p = plc_vals[i];
            let m = mb_vals[i];
            let equal = if mapping.swap_bytes {
                p == m.swap_bytes()
            } else {
                p == m
            };
            if equal {
                continue;
            }

            let p_changed = p != self.areas[idx].last_plc()[i];
            let m_changed = m != self.areas[idx].last_mb()[i];

            if m_changed && !p_changed {
                // 仅Modbus侧变化, 传播到PLC
                let to_plc = if mapping.swap_bytes { m.swap_bytes() } else { m };
                let addr = mapping.plc_start + i as u16;
                log::debug!(
                    "[SYNC:{}] Modbus→PLC {}{} = {}",
                    self.name,
                    mapping.area,
                    addr,
                    to_plc
                );
                self.plc
                    .write_registers(addr, &[to_plc], mapping.area)
                    .await?;
                plc_vals[i] = to_plc;
            } else {
                // PLC侧变化、双侧冲突(PLC优先)与快照未动仍不等的兜底都回写Modbus
                if p_changed && m_changed {
                    log::debug!(
                        "[SYNC:{}] 双侧同时变化, PLC优先: {}{}",
                        self.name,
                        mapping.area,
                        mapping.plc_start + i as u16
                    );
                }
                let to_mb = if mapping.swap_bytes { p.swap_bytes() } else { p };
                let addr = mapping.modbus_start + i as u16;
                log::debug!("[SYNC:{}] PLC→Modbus MB[{}] = {}", self.name, addr, to_mb);
                self.modbus.write_single_register(addr, to_mb).await?;
                mb_vals[i] = to_mb;
            }
        }

        self.areas[idx].snapshot(plc_vals, mb_vals);
        Ok(())
    }

    async fn finish_cancelled(&mut self) -> AppResult<()> {
        log::info!("🛑 [SYNC:{}] 收到停机请求, 释放连接", self.name);
        self.dispose().await;
        Err(AppError::Cancelled)
    }

    /// 释放两侧连接
    pub async fn dispose(&mut self) {
        self.plc.disconnect().await;
        self.modbus.disconnect().await;
    }

    #[cfg(test)]
    pub(crate) fn area_mut(&mut self, idx: usize) -> &mut SyncArea {
        &mut self.areas[idx]
    }
}
