use crate::config::ConnectionConfig;
use crate::data::{DataPacket, TickSample, ticks_to_seconds};
use crate::error::{DaqError, DecodeError};
use crate::error_table::{DeviceError, describe};
use crate::packet::{CommandPacket, decode_command, decode_response, encode_command, encode_response};
use crate::telemetry::{ChannelAddress, TelemetryStore};

#[test]
fn test_encode_disable_all_channels() {
    let bytes = encode_command("CHannel:DISAble:ALL").expect("valid command");

    let mut expected = hex::decode("2c011600").unwrap();
    expected.extend_from_slice(b"CHannel:DISAble:ALL");
    expected.extend_from_slice(&[0x0d, 0x0a, 0x00]);

    assert_eq!(bytes.as_ref(), expected.as_slice());
    assert_eq!(bytes.len(), 4 + 19 + 3);
}

#[test]
fn test_command_roundtrip() {
    let printable: String = (0x20u8..=0x7e).map(char::from).collect();
    let singles = printable.chars().map(String::from);

    for command in singles.chain(["".to_string(), "*IDN?".to_string(), printable.clone()]) {
        let bytes = encode_command(&command).unwrap();
        let decoded = decode_command(&bytes).unwrap();
        assert_eq!(decoded.command, command, "{:?}", bytes);
    }
}

#[test]
fn test_command_rejects_non_ascii_and_nul() {
    assert!(matches!(
        CommandPacket::new("Kanal:Größe"),
        Err(DaqError::InvalidCommand { .. })
    ));
    assert!(matches!(
        CommandPacket::new("A\0B"),
        Err(DaqError::InvalidCommand { .. })
    ));
    let too_long = "A".repeat(u16::MAX as usize);
    assert!(matches!(
        CommandPacket::new(too_long),
        Err(DaqError::InvalidCommand { .. })
    ));
}

#[test]
fn test_decode_command_size_mismatch() {
    let mut bytes = encode_command("*RST").unwrap().to_vec();
    bytes[2] = 0x10;
    assert_eq!(
        decode_command(&bytes),
        Err(DecodeError::SizeMismatch { declared: 16, actual: 7 })
    );
}

#[test]
fn test_decode_command_missing_terminator() {
    let mut bytes = encode_command("*RST").unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] = b'x';
    assert_eq!(decode_command(&bytes), Err(DecodeError::MissingTerminator));
}

#[test]
fn test_response_framing() {
    let bytes = encode_response("1.234E+00");
    assert_eq!(&bytes[..4], &[0x2c, 0x01, 0x0d, 0x00]);
    assert_eq!(decode_response(&bytes).unwrap(), "1.234E+00");

    // Empty response still carries the full trailer
    assert_eq!(decode_response(&encode_response("")).unwrap(), "");
    assert!(matches!(
        decode_response(&[0x2c, 0x01, 0x04, 0x00, 0x0d, 0x0a, 0x00]),
        Err(DecodeError::TooShort { expected: 8, actual: 7 })
    ));
}

#[test]
fn test_tick_conversion() {
    assert_eq!(ticks_to_seconds(15_768_000_000_000), 1_576_800_000.0);
    assert_eq!(ticks_to_seconds(0), 0.0);
    assert_eq!(ticks_to_seconds(5), 0.0005);
}

#[test]
fn test_data_packet_wire_layout() {
    let packet = DataPacket {
        system_id: 1,
        module_id: 2,
        channel_id: 3,
        data_type: 4,
        samples: vec![TickSample::new(0x0102030405060708, 1.5)],
    };
    let bytes = packet.to_bytes();

    let mut expected = vec![1, 2, 3, 4, 1, 0, 0, 0];
    expected.extend_from_slice(&0x0102030405060708u64.to_le_bytes());
    expected.extend_from_slice(&1.5f32.to_le_bytes());
    assert_eq!(bytes.as_ref(), expected.as_slice());
    assert_eq!(packet.count(), 1);
}

#[test]
fn test_data_packet_ignores_padding() {
    let packet = DataPacket {
        system_id: 0,
        module_id: 5,
        channel_id: 7,
        data_type: 1,
        samples: vec![TickSample::new(10, -2.25), TickSample::new(20, 3.0)],
    };
    let mut bytes = packet.to_bytes().to_vec();
    bytes.extend_from_slice(&[0xAA; 5]);

    assert_eq!(DataPacket::from_bytes(&bytes).unwrap(), packet);
}

#[test]
fn test_data_packet_huge_count_is_truncated_error() {
    let bytes = [0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
    assert!(matches!(
        DataPacket::from_bytes(&bytes),
        Err(DecodeError::Truncated { count: u32::MAX, .. })
    ));
}

#[test]
fn test_device_error_parse() {
    let err = DeviceError::parse("Err-113").unwrap();
    assert_eq!(err.code, -113);
    assert_eq!(err.description, Some("Undefined header"));

    let err = DeviceError::parse("Err -222, out of range").unwrap();
    assert_eq!(err.code, -222);
    assert_eq!(err.description, Some("Data out of range"));

    let err = DeviceError::parse("Err12345").unwrap();
    assert_eq!(err.code, 12345);
    assert_eq!(err.description, None);

    assert_eq!(DeviceError::parse("OK"), None);
    assert_eq!(DeviceError::parse("1.0E+00"), None);
}

#[test]
fn test_error_table_lookup() {
    assert_eq!(describe(-102), Some("Syntax error"));
    assert_eq!(describe(-350), Some("Queue overflow"));
    assert_eq!(describe(42), None);
}

#[test]
fn test_store_drain_once() {
    let mut store = TelemetryStore::new();
    let address = ChannelAddress::new(0, 1, 2);
    let packet = DataPacket {
        system_id: 0,
        module_id: 1,
        channel_id: 2,
        data_type: 0,
        samples: vec![TickSample::new(10_000, 1.0), TickSample::new(20_000, 2.0)],
    };

    assert_eq!(store.extend_from_packet(&packet), 2);
    assert_eq!(store.pending(address), 2);
    assert_eq!(store.total_samples(), 2);

    let series = store.drain(address).unwrap();
    assert_eq!(series.times, vec![1.0, 2.0]);
    assert_eq!(series.values, vec![1.0, 2.0]);
    assert!(store.drain(address).is_none());
    assert!(store.is_empty());
}

#[test]
fn test_store_empty_packet_creates_no_channel() {
    let mut store = TelemetryStore::new();
    let packet = DataPacket {
        system_id: 9,
        module_id: 9,
        channel_id: 9,
        data_type: 0,
        samples: Vec::new(),
    };
    assert_eq!(store.extend_from_packet(&packet), 0);
    assert!(store.is_empty());
}

#[test]
fn test_config_defaults_from_partial_json() {
    let config: ConnectionConfig =
        serde_json::from_str(r#"{ "device_addr": "10.0.0.5:9000", "multicast_group": null }"#).unwrap();

    assert_eq!(config.device_addr, "10.0.0.5:9000".parse().unwrap());
    assert_eq!(config.multicast_group, None);
    assert_eq!(config.recv_buffer_size, 4 * 1024 * 1024);
    assert_eq!(config.echo_timeout_ms, 5_000);
    assert_eq!(config.drain_timeout_ms, 300);
}

#[test]
fn test_query_options_from_config() {
    let options = ConnectionConfig::default().query_options(true);
    assert!(options.multi_package);
    assert_eq!(options.echo_timeout.as_secs(), 5);
    assert_eq!(options.response_timeout.as_secs(), 5);
    assert_eq!(options.drain_timeout.as_millis(), 300);
}
