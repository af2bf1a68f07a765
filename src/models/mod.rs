/// 配置文档模型
pub mod config;
/// 内存区与寄存器映射模型
pub mod register_map;

// 重新导出所有类型，方便其他模块使用
pub use config::*;
pub use register_map::*;
