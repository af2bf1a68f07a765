//! Modbus TCP适配层
//!
//! 对Modbus客户端做一层很薄的封装：读取按不超过120字分片以留出
//! 协议上限（125字）的余量，写入全部走单寄存器写。字节序的调整
//! 不在这一层做，由同步器负责。

use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio_modbus::client::Context as ModbusClientContext;
use tokio_modbus::prelude::*;

/// 单次保持寄存器读取的最大字数
pub const MAX_READ_CHUNK: u16 = 120;

/// 字级Modbus客户端抽象，适配层与测试共用
#[async_trait]
pub trait ModbusWordClient: Send {
    async fn read_holding_registers(&mut self, addr: u16, count: u16) -> AppResult<Vec<u16>>;
    async fn write_single_register(&mut self, addr: u16, value: u16) -> AppResult<()>;
    async fn disconnect(&mut self);
}

/// 基于tokio-modbus的TCP实现
pub struct TcpModbusWordClient {
    context: ModbusClientContext,
}

impl TcpModbusWordClient {
    /// 连接到Modbus TCP服务器的指定从站
    pub async fn connect(addr: SocketAddr, slave_id: u8) -> AppResult<Self> {
        let context = tcp::connect_slave(addr, Slave(slave_id))
            .await
            .map_err(|e| {
                AppError::modbus_error(format!("连接Modbus服务器 {} 失败: {}", addr, e))
            })?;
        log::info!("🔗 [MODBUS] 已连接Modbus服务器 {} (从站{})", addr, slave_id);
        Ok(Self { context })
    }
}

#[async_trait]
impl ModbusWordClient for TcpModbusWordClient {
    async fn read_holding_registers(&mut self, addr: u16, count: u16) -> AppResult<Vec<u16>> {
        match self.context.read_holding_registers(addr, count).await {
            Ok(Ok(words)) => Ok(words),
            Ok(Err(exception)) => Err(AppError::modbus_error(format!(
                "读保持寄存器出现异常响应: {:?}",
                exception
            ))),
            Err(e) => Err(AppError::modbus_error(format!("读保持寄存器失败: {}", e))),
        }
    }

    async fn write_single_register(&mut self, addr: u16, value: u16) -> AppResult<()> {
        match self.context.write_single_register(addr, value).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(exception)) => Err(AppError::modbus_error(format!(
                "写单个寄存器出现异常响应: {:?}",
                exception
            ))),
            Err(e) => Err(AppError::modbus_error(format!("写单个寄存器失败: {}", e))),
        }
    }

    async fn disconnect(&mut self) {
        let _ = self.context.disconnect().await;
        log::info!("🔌 [MODBUS] 已断开Modbus服务器连接");
    }
}

/// 保持寄存器访问门面
pub struct ModbusAdapter {
    client: Box<dyn ModbusWordClient>,
}

impl ModbusAdapter {
    pub async fn connect(addr: SocketAddr, slave_id: u8) -> AppResult<Self> {
        let client = TcpModbusWordClient::connect(addr, slave_id).await?;
        Ok(Self::with_client(Box::new(client)))
    }

    /// 用指定的底层客户端构造适配器
    pub fn with_client(client: Box<dyn ModbusWordClient>) -> Self {
        Self { client }
    }

    /// 分片读取一段保持寄存器并按地址顺序拼接
    pub async fn read_holding_block(&mut self, start: u16, count: u16) -> AppResult<Vec<u16>> {
        let mut words = Vec::with_capacity(count as usize);
        let mut offset: u16 = 0;
        while offset < count {
            let chunk = (count - offset).min(MAX_READ_CHUNK);
            let part = self
                .client
                .read_holding_registers(start + offset, chunk)
                .await?;
            if part.len() != chunk as usize {
                return Err(AppError::modbus_error(format!(
                    "读保持寄存器返回字数不符: 期望{}, 实际{}",
                    chunk,
                    part.len()
                )));
            }
            words.extend(part);
            offset += chunk;
        }
        Ok(words)
    }

    /// 写单个保持寄存器，直接透传
    pub async fn write_single_register(&mut self, addr: u16, value: u16) -> AppResult<()> {
        self.client.write_single_register(addr, value).await
    }

    pub async fn disconnect(&mut self) {
        self.client.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// 按地址生成值并记录每次调用的桩客户端
    struct RecordingClient {
        read_calls: Arc<Mutex<Vec<(u16, u16)>>>,
        writes: Arc<Mutex<Vec<(u16, u16)>>>,
    }

    impl RecordingClient {
        fn new() -> (Self, Arc<Mutex<Vec<(u16, u16)>>>, Arc<Mutex<Vec<(u16, u16)>>>) {
            let read_calls = Arc::new(Mutex::new(Vec::new()));
            let writes = Arc::new(Mutex::new(Vec::new()));
            let client = Self {
                read_calls: read_calls.clone(),
                writes: writes.clone(),
            };
            (client, read_calls, writes)
        }
    }

    #[async_trait]
    impl ModbusWordClient for RecordingClient {
        async fn read_holding_registers(&mut self, addr: u16, count: u16) -> AppResult<Vec<u16>> {
            self.read_calls.lock().unwrap().push((addr, count));
            Ok((addr..addr + count).collect())
        }

        async fn write_single_register(&mut self, addr: u16, value: u16) -> AppResult<()> {
            self.writes.lock().unwrap().push((addr, value));
            Ok(())
        }

        async fn disconnect(&mut self) {}
    }

    #[tokio::test]
    async fn test_block_read_is_chunked() {
        let (client, read_calls, _) = RecordingClient::new();
        let mut adapter = ModbusAdapter::with_client(Box::new(client));
        let words = adapter.read_holding_block(1000, 250).await.unwrap();

        // 250字拆成120/120/10三次底层读取
        assert_eq!(
            *read_calls.lock().unwrap(),
            vec![(1000, 120), (1120, 120), (1240, 10)]
        );
        // 拼接结果与一次性读取等价，偏移k对应寄存器 start + k
        assert_eq!(words.len(), 250);
        for (k, word) in words.iter().enumerate() {
            assert_eq!(*word, 1000 + k as u16, "偏移{}处的值不正确", k);
        }
    }

    #[tokio::test]
    async fn test_small_read_is_single_call() {
        let (client, read_calls, _) = RecordingClient::new();
        let mut adapter = ModbusAdapter::with_client(Box::new(client));
        let words = adapter.read_holding_block(10, 120).await.unwrap();

        assert_eq!(words.len(), 120);
        assert_eq!(*read_calls.lock().unwrap(), vec![(10, 120)]);
    }

    #[tokio::test]
    async fn test_write_passthrough() {
        let (client, _, writes) = RecordingClient::new();
        let mut adapter = ModbusAdapter::with_client(Box::new(client));
        adapter.write_single_register(7, 0x1234).await.unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![(7, 0x1234)]);
    }
}
