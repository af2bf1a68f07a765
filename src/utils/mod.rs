//! 工具模块
//!
//! 提供各层共用的基础设施，目前为统一错误处理

/// 统一错误处理模块
pub mod error;

// 重新导出常用类型，方便使用
pub use error::{AppError, AppResult};
