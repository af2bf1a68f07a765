//! 内存寄存器桩实现
//!
//! 模拟镜像两侧的寄存器总线行为，用于测试和开发环境。
//! 克隆实例共享同一份寄存器状态与写入历史。

use crate::models::register_map::MemoryArea;
use crate::services::infrastructure::modbus_adapter::ModbusWordClient;
use crate::services::infrastructure::srtp::client::PlcRegisterBus;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct PlcState {
    /// (内存区选择字节, 1起始字索引) -> 值，未写过的位置读出0
    registers: HashMap<(u8, u16), u16>,
    /// (内存区, 起始索引, 写入的字)
    write_history: Vec<(MemoryArea, u16, Vec<u16>)>,
    fail_reads: bool,
}

/// 内存PLC寄存器总线
#[derive(Clone, Default)]
pub struct MockPlcRegisterBus {
    state: Arc<Mutex<PlcState>>,
}

impl MockPlcRegisterBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设一段寄存器的值
    pub fn preset_registers(&self, area: MemoryArea, start: u16, values: &[u16]) {
        let mut state = self.state.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            state.registers.insert((area.code(), start + i as u16), *value);
        }
    }

    pub fn get_register(&self, area: MemoryArea, addr: u16) -> u16 {
        let state = self.state.lock().unwrap();
        state.registers.get(&(area.code(), addr)).copied().unwrap_or(0)
    }

    /// 获取写入历史记录
    pub fn get_write_log(&self) -> Vec<(MemoryArea, u16, Vec<u16>)> {
        self.state.lock().unwrap().write_history.clone()
    }

    pub fn clear_write_log(&self) {
        self.state.lock().unwrap().write_history.clear();
    }

    /// 让后续读取全部失败，用于故障路径测试
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }
}

#[async_trait]
impl PlcRegisterBus for MockPlcRegisterBus {
    async fn read_registers(
        &mut self,
        start: u16,
        count: u16,
        area: MemoryArea,
    ) -> AppResult<Vec<u16>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(AppError::protocol_error("模拟的PLC读取故障"));
        }
        Ok((0..count)
            .map(|i| {
                state
                    .registers
                    .get(&(area.code(), start + i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect())
    }

    async fn write_registers(
        &mut self,
        start: u16,
        values: &[u16],
        area: MemoryArea,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            state.registers.insert((area.code(), start + i as u16), *value);
        }
        state.write_history.push((area, start, values.to_vec()));
        Ok(())
    }

    async fn disconnect(&mut self) {}
}

#[derive(Default)]
struct ModbusState {
    registers: HashMap<u16, u16>,
    write_history: Vec<(u16, u16)>,
    read_calls: Vec<(u16, u16)>,
}

/// 内存Modbus字客户端
#[derive(Clone, Default)]
pub struct MockModbusWordClient {
    state: Arc<Mutex<ModbusState>>,
}

impl MockModbusWordClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设一段保持寄存器的值
    pub fn preset_registers(&self, start: u16, values: &[u16]) {
        let mut state = self.state.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            state.registers.insert(start + i as u16, *value);
        }
    }

    pub fn get_register(&self, addr: u16) -> u16 {
        self.state.lock().unwrap().registers.get(&addr).copied().unwrap_or(0)
    }

    /// 获取写入历史记录
    pub fn get_write_log(&self) -> Vec<(u16, u16)> {
        self.state.lock().unwrap().write_history.clone()
    }

    pub fn clear_write_log(&self) {
        self.state.lock().unwrap().write_history.clear();
    }

    /// 获取每次底层读取的(起始, 字数)记录
    pub fn get_read_calls(&self) -> Vec<(u16, u16)> {
        self.state.lock().unwrap().read_calls.clone()
    }
}

#[async_trait]
impl ModbusWordClient for MockModbusWordClient {
    async fn read_holding_registers(&mut self, addr: u16, count: u16) -> AppResult<Vec<u16>> {
        let mut state = self.state.lock().unwrap();
        state.read_calls.push((addr, count));
        Ok((0..count)
            .map(|i| state.registers.get(&(addr + i)).copied().unwrap_or(0))
            .collect())
    }

    async fn write_single_register(&mut self, addr: u16, value: u16) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.registers.insert(addr, value);
        state.write_history.push((addr, value));
        Ok(())
    }

    async fn disconnect(&mut self) {}
}
