//! 同步服务的配置文档模型
//!
//! 配置为一个JSON文档，字段名不区分大小写。原始文档先做键名归一化，
//! 再反序列化为中间结构，最后转换成经过校验的强类型模型。

use crate::models::register_map::{MemoryArea, RegisterSyncMapping};
use crate::utils::error::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// SRTP服务默认端口
pub const DEFAULT_SRTP_PORT: u16 = 18245;
/// Modbus TCP默认端口
pub const DEFAULT_MODBUS_PORT: u16 = 502;
/// Modbus服务器默认地址
pub const DEFAULT_MODBUS_IP: &str = "127.0.0.1";
/// Modbus默认从站ID
pub const DEFAULT_SLAVE_ID: u8 = 1;

/// Modbus服务器端点配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusEndpoint {
    pub ip: String,
    pub port: u16,
    pub slave_id: u8,
}

impl ModbusEndpoint {
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        format!("{}:{}", self.ip, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| AppError::config_error(format!("无效的Modbus地址或端口: {}", e)))
    }
}

/// 单台PLC的连接与映射配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlcConfig {
    pub ip: String,
    pub port: u16,
    pub maps: Vec<RegisterSyncMapping>,
}

impl PlcConfig {
    /// 日志中标识这台PLC的名称
    pub fn label(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// 全局配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// 同步轮询周期
    pub poll_interval: Duration,
    /// 链接未指定SwapBytes时的默认值
    pub default_swap_bytes: bool,
    /// 所有同步器共享的Modbus端点
    pub modbus: ModbusEndpoint,
    pub plcs: Vec<PlcConfig>,
}

// 键名归一化之后的中间结构
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "pollms")]
    poll_ms: u64,
    #[serde(rename = "defaultswapbytes")]
    default_swap_bytes: bool,
    #[serde(rename = "modbusip", default)]
    modbus_ip: Option<String>,
    #[serde(rename = "modbusport", default)]
    modbus_port: Option<u16>,
    #[serde(rename = "slaveid", default)]
    slave_id: Option<u8>,
    #[serde(rename = "plcs")]
    plcs: Vec<RawPlc>,
}

#[derive(Debug, Deserialize)]
struct RawPlc {
    ip: String,
    #[serde(rename = "srtpport", default)]
    srtp_port: Option<u16>,
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    plc: String,
    modbus: String,
    count: u32,
    #[serde(rename = "swapbytes", default)]
    swap_bytes: Option<bool>,
}

/// 递归地把JSON对象的键名转为小写，实现字段名不区分大小写
fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// 解析PLC侧链接地址，如 "R01001"：字母前缀为内存区，数字为1起始的字索引
fn parse_plc_ref(spec: &str) -> AppResult<(MemoryArea, u16)> {
    let trimmed = spec.trim();
    let digit_pos = trimmed
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| AppError::config_error(format!("PLC地址缺少数字部分: {:?}", spec)))?;
    let (tag, digits) = trimmed.split_at(digit_pos);
    if tag.is_empty() {
        return Err(AppError::config_error(format!(
            "PLC地址缺少内存区前缀: {:?}",
            spec
        )));
    }
    let area = MemoryArea::from_tag(tag)?;
    let start: u32 = digits
        .parse()
        .map_err(|_| AppError::config_error(format!("无效的PLC起始地址: {:?}", spec)))?;
    if start < 1 || start > u16::MAX as u32 {
        return Err(AppError::config_error(format!(
            "PLC起始地址超出范围: {:?}",
            spec
        )));
    }
    Ok((area, start as u16))
}

/// 解析Modbus侧链接地址：十进制数字，不小于400001时按4xxxxx约定换算为0起始索引
fn parse_modbus_ref(spec: &str) -> AppResult<u16> {
    let raw: u32 = spec
        .trim()
        .parse()
        .map_err(|_| AppError::config_error(format!("无效的Modbus地址: {:?}", spec)))?;
    let zero_based = if raw >= 400_001 { raw - 400_001 } else { raw };
    if zero_based > u16::MAX as u32 {
        return Err(AppError::config_error(format!(
            "Modbus地址超出范围: {:?}",
            spec
        )));
    }
    Ok(zero_based as u16)
}

impl GlobalConfig {
    /// 从JSON文本解析并校验配置
    pub fn from_json(text: &str) -> AppResult<GlobalConfig> {
        let value: Value = serde_json::from_str(text)?;
        let raw: RawDocument = serde_json::from_value(lowercase_keys(value))?;
        GlobalConfig::from_raw(raw)
    }

    /// 从配置文件加载
    pub fn load_from_file(path: impl AsRef<Path>) -> AppResult<GlobalConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::config_error(format!("读取配置文件 {} 失败: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    fn from_raw(raw: RawDocument) -> AppResult<GlobalConfig> {
        if raw.poll_ms == 0 {
            return Err(AppError::config_error("轮询周期PollMs必须大于0"));
        }

        let modbus = ModbusEndpoint {
            ip: raw.modbus_ip.unwrap_or_else(|| DEFAULT_MODBUS_IP.to_string()),
            port: raw.modbus_port.unwrap_or(DEFAULT_MODBUS_PORT),
            slave_id: raw.slave_id.unwrap_or(DEFAULT_SLAVE_ID),
        };
        // 端点格式问题在启动阶段暴露
        modbus.socket_addr()?;

        let mut plcs = Vec::with_capacity(raw.plcs.len());
        for raw_plc in raw.plcs {
            let mut maps = Vec::with_capacity(raw_plc.links.len());
            for link in raw_plc.links {
                if link.count < 1 || link.count > u16::MAX as u32 {
                    return Err(AppError::config_error(format!(
                        "链接 {:?} 的Count超出范围: {}",
                        link.plc, link.count
                    )));
                }
                let (area, plc_start) = parse_plc_ref(&link.plc)?;
                let modbus_start = parse_modbus_ref(&link.modbus)?;
                let mapping = RegisterSyncMapping {
                    area,
                    plc_start,
                    modbus_start,
                    count: link.count as u16,
                    swap_bytes: link.swap_bytes.unwrap_or(raw.default_swap_bytes),
                };
                mapping.validate()?;
                maps.push(mapping);
            }
            plcs.push(PlcConfig {
                ip: raw_plc.ip,
                port: raw_plc.srtp_port.unwrap_or(DEFAULT_SRTP_PORT),
                maps,
            });
        }

        Ok(GlobalConfig {
            poll_interval: Duration::from_millis(raw.poll_ms),
            default_swap_bytes: raw.default_swap_bytes,
            modbus,
            plcs,
        })
    }
}
