//! SRTP客户端
//!
//! 维护与单台PLC的TCP会话：两阶段握手、带序列号的读写请求、
//! 中间确认帧的丢弃以及尽力而为的断开。同一客户端同一时刻
//! 只允许一个在途请求。

use crate::models::register_map::MemoryArea;
use crate::services::infrastructure::srtp::frame::{self, FrameKind, HEADER_LEN};
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// SRTP会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

/// PLC侧寄存器总线抽象
///
/// 同步器通过该接口读写PLC寄存器，测试环境用内存实现替换
#[async_trait]
pub trait PlcRegisterBus: Send {
    /// 读取一段寄存器，`start` 为1起始的字索引
    async fn read_registers(
        &mut self,
        start: u16,
        count: u16,
        area: MemoryArea,
    ) -> AppResult<Vec<u16>>;

    /// 写入一段寄存器
    async fn write_registers(
        &mut self,
        start: u16,
        values: &[u16],
        area: MemoryArea,
    ) -> AppResult<()>;

    /// 尽力断开，不产生错误
    async fn disconnect(&mut self);
}

/// SRTP协议客户端
pub struct SrtpClient {
    ip: String,
    port: u16,
    stream: Option<TcpStream>,
    state: SrtpConnectionState,
    /// 请求序列号，发送前自增，16位自然回绕
    seq: u16,
}

impl SrtpClient {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            stream: None,
            state: SrtpConnectionState::Disconnected,
            seq: 0,
        }
    }

    pub fn state(&self) -> SrtpConnectionState {
        self.state
    }

    /// 建立TCP连接并完成两阶段握手
    ///
    /// 已连接时直接返回成功
    pub async fn connect(&mut self) -> AppResult<()> {
        if self.state == SrtpConnectionState::Ready && self.stream.is_some() {
            return Ok(());
        }
        self.state = SrtpConnectionState::Connecting;
        log::info!("🔗 [SRTP] 连接PLC {}:{} ...", self.ip, self.port);

        let mut stream = match TcpStream::connect((self.ip.as_str(), self.port)).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = SrtpConnectionState::Disconnected;
                return Err(AppError::connect_error(format!(
                    "连接PLC {}:{} 失败: {}",
                    self.ip, self.port, e
                )));
            }
        };

        if let Err(e) = Self::handshake(&mut stream).await {
            self.state = SrtpConnectionState::Disconnected;
            return Err(e);
        }

        log::info!("✅ [SRTP] PLC {}:{} 握手完成", self.ip, self.port);
        self.stream = Some(stream);
        self.state = SrtpConnectionState::Ready;
        Ok(())
    }

    async fn handshake(stream: &mut TcpStream) -> AppResult<()> {
        stream.write_all(&frame::INIT_FRAME).await?;
        let header = Self::read_header(stream).await?;
        if FrameKind::of(header[0]) != FrameKind::HandshakeAck {
            return Err(AppError::connect_error(format!(
                "握手第一阶段响应类型异常: 0x{:02X}",
                header[0]
            )));
        }

        stream.write_all(&frame::SESSION_REQUEST_FRAME).await?;
        let header = Self::read_header(stream).await?;
        if FrameKind::of(header[0]) != FrameKind::Data {
            return Err(AppError::connect_error(format!(
                "握手第二阶段响应类型异常: 0x{:02X}",
                header[0]
            )));
        }
        Ok(())
    }

    /// 读满一个56字节头部
    async fn read_header(stream: &mut TcpStream) -> AppResult<[u8; HEADER_LEN]> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = stream.read(&mut header[filled..]).await?;
            if n == 0 {
                return Err(AppError::protocol_error("对端在帧边界内关闭了连接"));
            }
            filled += n;
        }
        Ok(header)
    }

    /// 累积读取直到得到完整的数据帧
    ///
    /// 凑满56字节头部后检查类型字节：0x03为数据帧，继续收满负载；
    /// 0x01/0x02为前置确认，清空累积重新等待；其余类型视为协议错误。
    async fn read_data_frame(stream: &mut TcpStream, payload_len: usize) -> AppResult<Vec<u8>> {
        let total = HEADER_LEN + payload_len;
        let mut buf: Vec<u8> = Vec::with_capacity(total);
        let mut chunk = [0u8; 1024];
        loop {
            if buf.len() >= HEADER_LEN {
                match FrameKind::of(buf[0]) {
                    FrameKind::Data => {
                        if buf.len() >= total {
                            buf.truncate(total);
                            return Ok(buf);
                        }
                    }
                    FrameKind::HandshakeAck | FrameKind::InterimAck => {
                        buf.clear();
                    }
                    FrameKind::Unknown(byte) => {
                        return Err(AppError::protocol_error(format!(
                            "未识别的响应类型: 0x{:02X}",
                            byte
                        )));
                    }
                }
            }
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(if buf.len() < HEADER_LEN {
                    AppError::protocol_error("对端在读取响应时关闭了连接")
                } else {
                    AppError::protocol_error(format!(
                        "数据帧被截断: 已收到{}字节, 需要{}字节",
                        buf.len(),
                        total
                    ))
                });
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn ready_stream(&mut self) -> AppResult<&mut TcpStream> {
        if self.state != SrtpConnectionState::Ready {
            return Err(AppError::connect_error("SRTP会话未建立"));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| AppError::connect_error("SRTP会话未建立"))
    }
}

#[async_trait]
impl PlcRegisterBus for SrtpClient {
    async fn read_registers(
        &mut self,
        start: u16,
        count: u16,
        area: MemoryArea,
    ) -> AppResult<Vec<u16>> {
        self.seq = self.seq.wrapping_add(1);
        let request = frame::build_read_request(self.seq, area, start, count);
        let stream = self.ready_stream()?;
        stream.write_all(&request).await?;
        let response = Self::read_data_frame(stream, count as usize * 2).await?;
        frame::parse_data_words(&response, count as usize)
    }

    async fn write_registers(
        &mut self,
        start: u16,
        values: &[u16],
        area: MemoryArea,
    ) -> AppResult<()> {
        self.seq = self.seq.wrapping_add(1);
        let request = frame::build_write_request(self.seq, area, start, values);
        let stream = self.ready_stream()?;
        stream.write_all(&request).await?;

        // 写响应只做单次读取，完成帧以外的类型视为写入失败
        let mut header = [0u8; HEADER_LEN];
        let n = stream.read(&mut header).await?;
        if n == 0 {
            return Err(AppError::protocol_error("对端在写响应前关闭了连接"));
        }
        if FrameKind::of(header[0]) != FrameKind::Data {
            return Err(AppError::protocol_error(format!(
                "写入未得到完成确认: 响应类型0x{:02X}",
                header[0]
            )));
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // 尽力发送断开帧并关闭，忽略一切错误
            let _ = stream.write_all(&frame::INIT_FRAME).await;
            let _ = stream.shutdown().await;
            log::info!("🔌 [SRTP] 已断开PLC {}:{}", self.ip, self.port);
        }
        self.state = SrtpConnectionState::Disconnected;
    }
}
