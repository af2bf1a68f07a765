/// 领域服务层模块
/// 包含寄存器镜像的核心同步逻辑

/// 单条映射的同步暂存区
pub mod sync_area;

/// 单台PLC的同步器
pub mod synchronizer;

// 重新导出主要类型
pub use sync_area::SyncArea;
pub use synchronizer::Synchronizer;
