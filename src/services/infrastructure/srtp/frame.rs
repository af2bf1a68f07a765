//! SRTP帧编解码
//!
//! SRTP请求与响应都以固定56字节的头部开始，写请求在头部之后紧跟
//! `count * 2` 字节的小端字负载，读响应在头部之后携带同样格式的负载。
//! 头部中的常量字节是PLC固件所要求的固定填充，必须逐字节复现。

use crate::models::register_map::MemoryArea;
use crate::utils::error::{AppError, AppResult};
use byteorder::{ByteOrder, LittleEndian};

/// SRTP头部长度
pub const HEADER_LEN: usize = 56;

/// 握手第一阶段与断开连接时发送的空帧
pub const INIT_FRAME: [u8; HEADER_LEN] = [0; HEADER_LEN];

/// 握手第二阶段的会话帧，内容固定
pub const SESSION_REQUEST_FRAME: [u8; HEADER_LEN] = {
    let mut frame = [0u8; HEADER_LEN];
    frame[0] = 0x08;
    frame[2] = 0x01;
    frame
};

/// 响应帧类型，由头部第一个字节区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// 0x01 握手第一阶段确认
    HandshakeAck,
    /// 0x02 请求的中间确认，读取时直接丢弃
    InterimAck,
    /// 0x03 数据/完成响应
    Data,
    /// 其余类型字节
    Unknown(u8),
}

impl FrameKind {
    pub fn of(type_byte: u8) -> FrameKind {
        match type_byte {
            0x01 => FrameKind::HandshakeAck,
            0x02 => FrameKind::InterimAck,
            0x03 => FrameKind::Data,
            other => FrameKind::Unknown(other),
        }
    }
}

/// 构造读寄存器请求帧
///
/// `start` 为1起始的字索引，线路上传输 `start - 1`。
pub fn build_read_request(seq: u16, area: MemoryArea, start: u16, count: u16) -> [u8; HEADER_LEN] {
    let mut frame = [0u8; HEADER_LEN];
    frame[0] = 0x02;
    frame[2] = (seq & 0xFF) as u8;
    frame[9] = 0x01;
    frame[17] = 0x01;
    frame[30] = (seq & 0xFF) as u8;
    frame[31] = 0xC0;
    frame[36] = 0x10;
    frame[37] = 0x0E;
    frame[40] = 0x01;
    frame[41] = 0x01;
    // 读内存操作码与内存区选择字节
    frame[42] = 0x04;
    frame[43] = area.code();
    LittleEndian::write_u16(&mut frame[44..46], start - 1);
    LittleEndian::write_u16(&mut frame[46..48], count);
    frame[48] = 0x01;
    frame[49] = 0x01;
    frame
}

/// 构造写寄存器请求帧，返回头部加小端字负载
pub fn build_write_request(seq: u16, area: MemoryArea, start: u16, values: &[u16]) -> Vec<u8> {
    let count = values.len() as u16;
    let mut frame = vec![0u8; HEADER_LEN + values.len() * 2];
    frame[0] = 0x02;
    frame[2] = (seq & 0xFF) as u8;
    LittleEndian::write_u16(&mut frame[4..6], count.wrapping_mul(2));
    frame[9] = 0x02;
    frame[17] = 0x02;
    frame[30] = (seq & 0xFF) as u8;
    frame[31] = 0x80;
    frame[36] = 0x10;
    frame[37] = 0x0E;
    frame[40] = 0x01;
    frame[41] = 0x01;
    frame[42] = 0x32;
    frame[48] = 0x01;
    frame[49] = 0x01;
    frame[50] = 0x07;
    frame[51] = area.code();
    LittleEndian::write_u16(&mut frame[52..54], start - 1);
    LittleEndian::write_u16(&mut frame[54..56], count);
    for (i, value) in values.iter().enumerate() {
        LittleEndian::write_u16(&mut frame[HEADER_LEN + i * 2..HEADER_LEN + i * 2 + 2], *value);
    }
    frame
}

/// 从数据响应帧中取出负载字
pub fn parse_data_words(frame: &[u8], count: usize) -> AppResult<Vec<u16>> {
    let expected = HEADER_LEN + count * 2;
    if frame.len() < expected {
        return Err(AppError::protocol_error(format!(
            "数据帧不完整: 期望{}字节, 实际{}字节",
            expected,
            frame.len()
        )));
    }
    let mut words = Vec::with_capacity(count);
    for i in 0..count {
        words.push(LittleEndian::read_u16(&frame[HEADER_LEN + i * 2..]));
    }
    Ok(words)
}
