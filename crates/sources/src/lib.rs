//! dht-sens-sources: Sensor reader and acquisition server for dht-sens.

mod script_reader;
mod server;

pub use script_reader::{parse_reader_output, ScriptReader};
pub use server::{AcquisitionServer, ServerHandle, REQUEST_QUEUE_CAPACITY, RESPONSE_CHANNEL_CAPACITY};
