use crate::data::{DataPacket, Sample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one acquisition channel on the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelAddress {
    pub system: u8,
    pub module: u8,
    pub channel: u8,
}

impl ChannelAddress {
    pub fn new(system: u8, module: u8, channel: u8) -> Self {
        Self {
            system,
            module,
            channel,
        }
    }
}

impl From<&DataPacket> for ChannelAddress {
    fn from(packet: &DataPacket) -> Self {
        Self::new(packet.system_id, packet.module_id, packet.channel_id)
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.system, self.module, self.channel)
    }
}

/// Buffered time series for one channel. `times` and `values` always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeries {
    pub times: Vec<f64>,
    pub values: Vec<f32>,
}

impl ChannelSeries {
    pub fn push(&mut self, sample: Sample) {
        self.times.push(sample.time_s);
        self.values.push(sample.value);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f32>) {
        (self.times, self.values)
    }
}

/// Drain-on-read buffer of streamed samples.
///
/// Channels are created on first write and removed when drained, so every
/// sample is handed out at most once. Not synchronized; the owner serializes access.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    channels: BTreeMap<ChannelAddress, ChannelSeries>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, address: ChannelAddress, sample: Sample) {
        self.channels.entry(address).or_default().push(sample);
    }

    /// Append every sample of a decoded packet. Returns the number of samples added.
    pub fn extend_from_packet(&mut self, packet: &DataPacket) -> usize {
        if packet.samples.is_empty() {
            return 0;
        }
        let series = self.channels.entry(ChannelAddress::from(packet)).or_default();
        series.times.reserve(packet.samples.len());
        series.values.reserve(packet.samples.len());
        for sample in packet.samples() {
            series.push(sample);
        }
        packet.samples.len()
    }

    /// Remove and return the buffered series for `address`.
    pub fn drain(&mut self, address: ChannelAddress) -> Option<ChannelSeries> {
        self.channels.remove(&address)
    }

    /// Number of samples waiting for `address`.
    pub fn pending(&self, address: ChannelAddress) -> usize {
        self.channels.get(&address).map_or(0, ChannelSeries::len)
    }

    /// Addresses currently holding samples, in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelAddress> + '_ {
        self.channels.keys().copied()
    }

    pub fn total_samples(&self) -> usize {
        self.channels.values().map(ChannelSeries::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}
