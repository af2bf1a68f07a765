use thiserror::Error;

/// 应用程序统一错误类型
/// 覆盖配置、SRTP连接、SRTP协议、Modbus通信以及协作取消等场景
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// 配置相关错误（文档格式、未知内存区、非法范围），启动阶段即失败
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    /// SRTP连接错误（TCP连接失败、握手响应异常）
    #[error("连接错误: {message}")]
    ConnectError { message: String },

    /// SRTP协议错误（帧截断、对端关闭、未识别的响应类型）
    #[error("协议错误: {message}")]
    ProtocolError { message: String },

    /// Modbus通信错误（超时、异常响应）
    #[error("Modbus通信错误: {message}")]
    ModbusError { message: String },

    /// 输入/输出错误
    #[error("IO错误: {message}")]
    IoError { message: String },

    /// 并发/任务调度错误
    #[error("并发错误: {message}")]
    ConcurrencyError { message: String },

    /// 协作取消，不视为故障，由调度层消化
    #[error("任务已取消")]
    Cancelled,
}

impl AppError {
    /// 创建配置错误
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// 创建连接错误
    pub fn connect_error(message: impl Into<String>) -> Self {
        Self::ConnectError {
            message: message.into(),
        }
    }

    /// 创建协议错误
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    /// 创建Modbus通信错误
    pub fn modbus_error(message: impl Into<String>) -> Self {
        Self::ModbusError {
            message: message.into(),
        }
    }

    /// 创建并发错误
    pub fn concurrency_error(message: impl Into<String>) -> Self {
        Self::ConcurrencyError {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::ConfigError {
            message: format!("JSON解析失败: {}", e),
        }
    }
}

/// 应用程序统一结果类型
pub type AppResult<T> = Result<T, AppError>;
