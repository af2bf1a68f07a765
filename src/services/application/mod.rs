/// 应用层服务模块
///
/// 负责按配置装配各台PLC的同步任务，并协调停机流程

/// 同步任务调度
pub mod supervisor;
