/// 服务层模块
///
/// 按层组织：
/// - Application Layer: 任务调度与停机协调
/// - Domain Layer: 镜像同步的核心逻辑
/// - Infrastructure Layer: SRTP与Modbus的外部通信

/// 应用层服务模块
pub mod application;

/// 领域服务模块
pub mod domain;

/// 基础设施层服务模块
pub mod infrastructure;
