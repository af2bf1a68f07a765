/// 基础设施层服务模块
/// 负责与外部系统的交互：PLC侧的SRTP通信与Modbus TCP通信

/// SRTP协议通信模块
pub mod srtp;

/// Modbus TCP适配模块
pub mod modbus_adapter;

/// 内存寄存器桩实现，用于测试和开发环境
pub mod mock_register_bus;

// 重新导出常用接口和实现
pub use modbus_adapter::{ModbusAdapter, ModbusWordClient};
pub use srtp::{PlcRegisterBus, SrtpClient};
