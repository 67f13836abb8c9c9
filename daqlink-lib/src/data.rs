use crate::constants::{DATA_HEADER_SIZE, DATA_SAMPLE_SIZE, TICKS_PER_SECOND};
use crate::error::DecodeError;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use zerocopy::byteorder::little_endian::{F32, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Telemetry packet header (8 bytes)
///
/// Identifies the channel the samples belong to and how many
/// 12-byte samples follow.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DataHeaderRaw {
    pub system_id: u8,
    pub module_id: u8,
    pub channel_id: u8,
    /// Device-defined sample encoding tag, passed through untouched
    pub data_type: u8,
    /// Number of samples following the header
    pub count: U32,
}

/// One sample as sent by the device (12 bytes)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SampleRaw {
    /// Device clock in ticks of 100 µs
    pub ticks: U64,
    pub value: F32,
}

/// A sample with its raw device timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickSample {
    pub ticks: u64,
    pub value: f32,
}

impl TickSample {
    pub fn new(ticks: u64, value: f32) -> Self {
        Self { ticks, value }
    }
}

impl From<SampleRaw> for TickSample {
    fn from(raw: SampleRaw) -> Self {
        Self {
            ticks: raw.ticks.get(),
            value: raw.value.get(),
        }
    }
}

impl From<TickSample> for SampleRaw {
    fn from(sample: TickSample) -> Self {
        Self {
            ticks: U64::new(sample.ticks),
            value: F32::new(sample.value),
        }
    }
}

/// A decoded sample with its timestamp converted to seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time_s: f64,
    pub value: f32,
}

impl From<TickSample> for Sample {
    fn from(sample: TickSample) -> Self {
        Self {
            time_s: ticks_to_seconds(sample.ticks),
            value: sample.value,
        }
    }
}

/// Convert a device tick count to seconds.
pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND
}

/// A block of samples streamed for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPacket {
    pub system_id: u8,
    pub module_id: u8,
    pub channel_id: u8,
    pub data_type: u8,
    pub samples: Vec<TickSample>,
}

impl DataPacket {
    /// Number of samples, as carried in the header's count field
    pub fn count(&self) -> u32 {
        self.samples.len() as u32
    }

    /// Iterate over the samples with timestamps in seconds
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.samples.iter().copied().map(Sample::from)
    }

    /// Parse a telemetry datagram. Bytes past the declared samples are padding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < DATA_HEADER_SIZE {
            return Err(DecodeError::TooShort {
                expected: DATA_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let header = DataHeaderRaw::read_from_bytes(&bytes[..DATA_HEADER_SIZE]).map_err(|_| DecodeError::TooShort {
            expected: DATA_HEADER_SIZE,
            actual: bytes.len(),
        })?;
        let count = header.count.get();

        let expected = (count as usize)
            .checked_mul(DATA_SAMPLE_SIZE)
            .and_then(|n| n.checked_add(DATA_HEADER_SIZE))
            .unwrap_or(usize::MAX);
        if bytes.len() < expected {
            return Err(DecodeError::Truncated {
                count,
                expected,
                actual: bytes.len(),
            });
        }

        let samples = bytes[DATA_HEADER_SIZE..expected]
            .chunks_exact(DATA_SAMPLE_SIZE)
            .filter_map(|chunk| SampleRaw::read_from_bytes(chunk).ok())
            .map(TickSample::from)
            .collect();

        Ok(Self {
            system_id: header.system_id,
            module_id: header.module_id,
            channel_id: header.channel_id,
            data_type: header.data_type,
            samples,
        })
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Bytes {
        let header = DataHeaderRaw {
            system_id: self.system_id,
            module_id: self.module_id,
            channel_id: self.channel_id,
            data_type: self.data_type,
            count: U32::new(self.count()),
        };

        let mut buf = BytesMut::with_capacity(DATA_HEADER_SIZE + self.samples.len() * DATA_SAMPLE_SIZE);
        buf.extend_from_slice(header.as_bytes());
        for sample in &self.samples {
            buf.extend_from_slice(SampleRaw::from(*sample).as_bytes());
        }
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for DataPacket {
    type Error = DecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<&DataPacket> for Bytes {
    fn from(packet: &DataPacket) -> Self {
        packet.to_bytes()
    }
}

impl fmt::Display for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "system {} module {} channel {} type {}: {} samples",
            self.system_id,
            self.module_id,
            self.channel_id,
            self.data_type,
            self.samples.len()
        )
    }
}

/// Encode a data packet.
pub fn encode_data(packet: &DataPacket) -> Bytes {
    packet.to_bytes()
}

/// Decode a telemetry datagram.
pub fn decode_data(bytes: &[u8]) -> Result<DataPacket, DecodeError> {
    DataPacket::from_bytes(bytes)
}
