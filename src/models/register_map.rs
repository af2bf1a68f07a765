//! PLC内存区与寄存器映射的核心模型

use crate::utils::error::{AppError, AppResult};
use std::fmt;

/// SRTP可寻址的PLC内存区
///
/// 每个内存区在读/写请求帧中对应一个固定的选择字节。
/// G与GA、S与SA在协议层共用同一个选择字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryArea {
    /// %R 通用寄存器区（16位字）
    R,
    /// %W 字存储区
    W,
    /// %AI 模拟量输入
    Ai,
    /// %AQ 模拟量输出
    Aq,
    /// %Q 开关量输出
    Q,
    /// %I 开关量输入
    I,
    /// %M 内部继电器
    M,
    /// %T 临时继电器
    T,
    /// %G Genius全局数据
    G,
    Ga,
    Gb,
    Gc,
    Gd,
    Ge,
    /// %S 系统状态区
    S,
    Sa,
    Sb,
    Sc,
}

impl MemoryArea {
    /// 请求帧中的内存区选择字节
    pub fn code(&self) -> u8 {
        match self {
            MemoryArea::R => 0x08,
            MemoryArea::W => 0x09,
            MemoryArea::Ai => 0x0A,
            MemoryArea::Aq => 0x0C,
            MemoryArea::Q => 0x12,
            MemoryArea::I => 0x10,
            MemoryArea::M => 0x16,
            MemoryArea::T => 0x14,
            MemoryArea::G | MemoryArea::Ga => 0x20,
            MemoryArea::Gb => 0x22,
            MemoryArea::Gc => 0x24,
            MemoryArea::Gd => 0x26,
            MemoryArea::Ge => 0x28,
            MemoryArea::S | MemoryArea::Sa => 0x30,
            MemoryArea::Sb => 0x32,
            MemoryArea::Sc => 0x34,
        }
    }

    /// 从配置中的区域标记解析内存区
    ///
    /// 标记不区分大小写，两侧空白会被剔除。未知标记属于配置错误。
    pub fn from_tag(tag: &str) -> AppResult<MemoryArea> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "R" => Ok(MemoryArea::R),
            "W" => Ok(MemoryArea::W),
            "AI" => Ok(MemoryArea::Ai),
            "AQ" => Ok(MemoryArea::Aq),
            "Q" => Ok(MemoryArea::Q),
            "I" => Ok(MemoryArea::I),
            "M" => Ok(MemoryArea::M),
            "T" => Ok(MemoryArea::T),
            "G" => Ok(MemoryArea::G),
            "GA" => Ok(MemoryArea::Ga),
            "GB" => Ok(MemoryArea::Gb),
            "GC" => Ok(MemoryArea::Gc),
            "GD" => Ok(MemoryArea::Gd),
            "GE" => Ok(MemoryArea::Ge),
            "S" => Ok(MemoryArea::S),
            "SA" => Ok(MemoryArea::Sa),
            "SB" => Ok(MemoryArea::Sb),
            "SC" => Ok(MemoryArea::Sc),
            other => Err(AppError::config_error(format!(
                "未知的PLC内存区标记: {:?}",
                other
            ))),
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            MemoryArea::R => "R",
            MemoryArea::W => "W",
            MemoryArea::Ai => "AI",
            MemoryArea::Aq => "AQ",
            MemoryArea::Q => "Q",
            MemoryArea::I => "I",
            MemoryArea::M => "M",
            MemoryArea::T => "T",
            MemoryArea::G => "G",
            MemoryArea::Ga => "GA",
            MemoryArea::Gb => "GB",
            MemoryArea::Gc => "GC",
            MemoryArea::Gd => "GD",
            MemoryArea::Ge => "GE",
            MemoryArea::S => "S",
            MemoryArea::Sa => "SA",
            MemoryArea::Sb => "SB",
            MemoryArea::Sc => "SC",
        }
    }
}

impl fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 一段连续寄存器的镜像映射配置
///
/// 描述PLC侧一个内存区片段与Modbus保持寄存器片段的对应关系，
/// 配置加载后不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSyncMapping {
    /// PLC内存区
    pub area: MemoryArea,
    /// PLC侧起始字索引，1起始（线路上传输 start-1）
    pub plc_start: u16,
    /// Modbus保持寄存器起始索引，0起始
    pub modbus_start: u16,
    /// 同步的16位字数量
    pub count: u16,
    /// 两侧字节序不一致时按字交换高低字节
    pub swap_bytes: bool,
}

impl RegisterSyncMapping {
    /// 校验映射的不变量
    pub fn validate(&self) -> AppResult<()> {
        if self.plc_start < 1 {
            return Err(AppError::config_error(format!(
                "PLC起始地址必须不小于1: {}{}",
                self.area, self.plc_start
            )));
        }
        if self.count < 1 {
            return Err(AppError::config_error(format!(
                "同步字数必须不小于1: {}{}",
                self.area, self.plc_start
            )));
        }
        // 两侧的末地址都不能越过16位地址空间
        let plc_end = (self.plc_start as u32 - 1) + self.count as u32;
        if plc_end > u16::MAX as u32 + 1 {
            return Err(AppError::config_error(format!(
                "PLC侧地址范围越界: {}{} 起 {} 字",
                self.area, self.plc_start, self.count
            )));
        }
        let mb_end = self.modbus_start as u32 + self.count as u32;
        if mb_end > u16::MAX as u32 + 1 {
            return Err(AppError::config_error(format!(
                "Modbus侧地址范围越界: {} 起 {} 字",
                self.modbus_start, self.count
            )));
        }
        Ok(())
    }
}
