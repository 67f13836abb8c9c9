pub mod config;
pub mod connection;
pub mod constants;
pub mod data;
pub mod error;
pub mod error_table;
pub mod packet;
pub mod registry;
pub mod telemetry;

mod socket;

#[cfg(test)]
mod tests;

// Re-export the main types for easy access
pub use config::{ConnectionConfig, QueryOptions};
pub use connection::Connection;
pub use data::{DataPacket, Sample, TickSample, decode_data, encode_data};
pub use error::{DaqError, DecodeError, QueryStage};
pub use error_table::DeviceError;
pub use packet::{CommandPacket, decode_command, decode_response, encode_command, encode_response};
pub use registry::ConnectionRegistry;
pub use telemetry::{ChannelAddress, ChannelSeries, TelemetryStore};
