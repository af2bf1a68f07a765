/// SRTP协议通信模块

/// 帧编解码
pub mod frame;

/// 协议客户端
pub mod client;

// 重新导出常用类型
pub use client::{PlcRegisterBus, SrtpClient, SrtpConnectionState};
