//! 镜像服务集成测试
//!
//! 用一个脚本化的SRTP模拟PLC（真实TCP连接）加内存Modbus桩，
//! 验证从帧编解码到同步循环的完整链路。

use byteorder::{ByteOrder, LittleEndian};
use srtp_mirror::models::config::GlobalConfig;
use srtp_mirror::models::register_map::{MemoryArea, RegisterSyncMapping};
use srtp_mirror::services::domain::synchronizer::Synchronizer;
use srtp_mirror::services::infrastructure::mock_register_bus::MockModbusWordClient;
use srtp_mirror::services::infrastructure::modbus_adapter::ModbusAdapter;
use srtp_mirror::services::infrastructure::srtp::client::SrtpClient;
use srtp_mirror::utils::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const HEADER_LEN: usize = 56;

/// 模拟PLC的寄存器镜像，键为线路上的0起始字偏移
type SimRegisters = Arc<Mutex<HashMap<u16, u16>>>;

/// 接受一个连接并按SRTP语义应答：握手、读（带中间确认帧）、写、断开
async fn run_plc_simulator(listener: TcpListener, registers: SimRegisters) {
    let (mut sock, _) = listener.accept().await.unwrap();

    // 两阶段握手
    let mut header = [0u8; HEADER_LEN];
    sock.read_exact(&mut header).await.unwrap();
    assert!(header.iter().all(|b| *b == 0), "握手第一帧应为全零");
    let mut reply = [0u8; HEADER_LEN];
    reply[0] = 0x01;
    sock.write_all(&reply).await.unwrap();

    sock.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[..4], &[0x08, 0x00, 0x01, 0x00], "会话帧前缀不正确");
    let mut reply = [0u8; HEADER_LEN];
    reply[0] = 0x03;
    sock.write_all(&reply).await.unwrap();

    loop {
        if sock.read_exact(&mut header).await.is_err() {
            return;
        }
        // 全零帧表示对端断开
        if header.iter().all(|b| *b == 0) {
            return;
        }
        match header[42] {
            // 读请求: 先回一个中间确认帧, 再回数据帧
            0x04 => {
                let start = LittleEndian::read_u16(&header[44..46]);
                let count = LittleEndian::read_u16(&header[46..48]);

                let mut interim = [0u8; HEADER_LEN];
                interim[0] = 0x02;
                sock.write_all(&interim).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;

                let mut data = vec![0u8; HEADER_LEN + count as usize * 2];
                data[0] = 0x03;
                {
                    let regs = registers.lock().unwrap();
                    for i in 0..count {
                        let value = regs.get(&(start + i)).copied().unwrap_or(0);
                        LittleEndian::write_u16(
                            &mut data[HEADER_LEN + i as usize * 2..HEADER_LEN + i as usize * 2 + 2],
                            value,
                        );
                    }
                }
                sock.write_all(&data).await.unwrap();
            }
            // 写请求: 收完负载后更新镜像并回完成帧
            0x32 => {
                let start = LittleEndian::read_u16(&header[52..54]);
                let count = LittleEndian::read_u16(&header[54..56]);
                let mut payload = vec![0u8; count as usize * 2];
                sock.read_exact(&mut payload).await.unwrap();
                {
                    let mut regs = registers.lock().unwrap();
                    for i in 0..count {
                        let value = LittleEndian::read_u16(&payload[i as usize * 2..]);
                        regs.insert(start + i, value);
                    }
                }
                let mut reply = [0u8; HEADER_LEN];
                reply[0] = 0x03;
                sock.write_all(&reply).await.unwrap();
            }
            other => panic!("模拟PLC收到未知操作码: 0x{:02X}", other),
        }
    }
}

fn sim_registers(values: &[(u16, u16)]) -> SimRegisters {
    Arc::new(Mutex::new(values.iter().copied().collect()))
}

async fn connect_client(registers: SimRegisters) -> (SrtpClient, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let simulator = tokio::spawn(run_plc_simulator(listener, registers));

    let mut client = SrtpClient::new("127.0.0.1", addr.port());
    client.connect().await.unwrap();
    (client, simulator)
}

fn mapping(count: u16) -> RegisterSyncMapping {
    RegisterSyncMapping {
        area: MemoryArea::R,
        plc_start: 1,
        modbus_start: 0,
        count,
        swap_bytes: false,
    }
}

#[tokio::test]
async fn test_mirror_round_trip_over_wire() {
    // PLC起始镜像 R1..R3 = [10, 20, 30] (线路偏移0..2)
    let registers = sim_registers(&[(0, 10), (1, 20), (2, 30)]);
    let (client, simulator) = connect_client(registers.clone()).await;

    let modbus = MockModbusWordClient::new();
    modbus.preset_registers(0, &[10, 0, 0]);

    let mut sync = Synchronizer::new(
        "集成测试",
        Box::new(client),
        ModbusAdapter::with_client(Box::new(modbus.clone())),
        vec![mapping(3)],
        Duration::from_millis(20),
    );

    // 启动对账: Modbus侧两处陈旧值被PLC覆盖
    sync.initialize().await.unwrap();
    assert_eq!(modbus.get_write_log(), vec![(1, 20), (2, 30)]);
    assert_eq!(modbus.get_register(0), 10);
    assert_eq!(modbus.get_register(1), 20);
    assert_eq!(modbus.get_register(2), 30);

    // PLC侧变化传播到Modbus
    registers.lock().unwrap().insert(2, 77);
    modbus.clear_write_log();
    sync.run_tick().await.unwrap();
    assert_eq!(modbus.get_write_log(), vec![(2, 77)]);

    // Modbus侧变化传播到PLC
    modbus.preset_registers(1, &[99]);
    modbus.clear_write_log();
    sync.run_tick().await.unwrap();
    assert_eq!(registers.lock().unwrap().get(&1).copied(), Some(99));
    assert!(modbus.get_write_log().is_empty(), "Modbus侧的新值不应被回写");

    // 平稳后一整轮不产生任何写入
    sync.run_tick().await.unwrap();
    assert!(modbus.get_write_log().is_empty());

    // 释放连接后模拟PLC应观察到断开帧并退出
    sync.dispose().await;
    tokio::time::timeout(Duration::from_secs(1), simulator)
        .await
        .expect("模拟PLC应退出")
        .unwrap();
}

#[tokio::test]
async fn test_cancellation_stops_loop_and_disconnects() {
    let registers = sim_registers(&[(0, 5)]);
    let (client, simulator) = connect_client(registers.clone()).await;

    let modbus = MockModbusWordClient::new();
    modbus.preset_registers(0, &[5]);

    let mut sync = Synchronizer::new(
        "停机测试",
        Box::new(client),
        ModbusAdapter::with_client(Box::new(modbus.clone())),
        vec![mapping(1)],
        Duration::from_millis(20),
    );
    sync.initialize().await.unwrap();

    let token = CancellationToken::new();
    let cancel = token.clone();
    let worker = tokio::spawn(async move { sync.run(token).await });

    tokio::time::sleep(Duration::from_millis(70)).await;
    cancel.cancel();

    let result = worker.await.unwrap();
    assert!(matches!(result, Err(AppError::Cancelled)));
    tokio::time::timeout(Duration::from_secs(1), simulator)
        .await
        .expect("模拟PLC应在断开后退出")
        .unwrap();
}

#[tokio::test]
async fn test_config_document_drives_mapping() {
    // 配置文档解析出的映射能直接用于同步器装配
    let text = r#"{
        "PollMs": 200,
        "DefaultSwapBytes": false,
        "Plcs": [
            {
                "Ip": "127.0.0.1",
                "Links": [
                    { "Plc": "R1", "Modbus": "400001", "Count": 2 }
                ]
            }
        ]
    }"#;
    let config = GlobalConfig::from_json(text).unwrap();
    let plc = &config.plcs[0];
    assert_eq!(plc.maps, vec![mapping(2)]);

    let registers = sim_registers(&[(0, 1), (1, 2)]);
    let (client, _simulator) = connect_client(registers).await;

    let modbus = MockModbusWordClient::new();
    let mut sync = Synchronizer::new(
        plc.label(),
        Box::new(client),
        ModbusAdapter::with_client(Box::new(modbus.clone())),
        plc.maps.clone(),
        config.poll_interval,
    );
    sync.initialize().await.unwrap();
    assert_eq!(modbus.get_register(0), 1);
    assert_eq!(modbus.get_register(1), 2);
    sync.dispose().await;
}
