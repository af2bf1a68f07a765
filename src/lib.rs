//! SRTP与Modbus TCP之间的寄存器双向镜像服务
//!
//! PLC侧通过GE SRTP协议访问，Modbus侧作为主站访问一台共享的
//! Modbus TCP服务器。每台PLC由独立的同步任务负责，按固定周期
//! 比较两侧镜像并把变化传播到另一侧，冲突时以PLC为准。

// 核心数据模型模块
pub mod models;

// 服务层模块
pub mod services;

// 工具模块
pub mod utils;

// 重新导出常用类型，方便使用
pub use utils::error::{AppError, AppResult};
