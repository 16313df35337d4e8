//! UDP 连接集成测试（本地回环）

use calcip_protocol::{HIGH_CMD_LEN, HighCmd, MotorModeHigh};
use calcip_transport::{Connection, ConnectionSettings, UdpConnection};
use std::net::{Ipv4Addr, UdpSocket};
use std::time::{Duration, Instant};

#[test]
fn test_command_round_trip_over_loopback() {
    let robot = UdpSocket::bind("127.0.0.1:0").unwrap();
    robot.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let settings = ConnectionSettings {
        listen_port: 0,
        robot_ip: Ipv4Addr::LOCALHOST,
        send_port: robot.local_addr().unwrap().port(),
        local_ip: Ipv4Addr::LOCALHOST,
    };
    let mut conn = UdpConnection::new(&settings).unwrap();
    conn.start_receive().unwrap();

    let mut cmd = HighCmd::with_mode(MotorModeHigh::ForceStand);
    cmd.euler = [0.1, 0.0, -0.1];
    conn.send_cmd(&cmd).unwrap();

    // “机器人”收到指令并回一条状态报文
    let mut buf = [0u8; 256];
    let (len, client) = robot.recv_from(&mut buf).unwrap();
    assert_eq!(len, HIGH_CMD_LEN);
    assert_eq!(HighCmd::parse(&buf[..len]).unwrap(), cmd);
    robot.send_to(&[0xFE, 0xEF, 0xEE, 0x00], client).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut packets = Vec::new();
    while packets.is_empty() && Instant::now() < deadline {
        packets = conn.get_data().unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(packets, vec![vec![0xFE, 0xEF, 0xEE, 0x00]]);
}
