pub mod client;
pub mod in_flight;
pub mod logging;
#[cfg(test)]
pub mod mock_client;
pub mod stream;

pub use client::{ArgueClient, ByteStream};
pub use in_flight::{InFlightGuard, InFlightTicket};
pub use stream::{aggregate_stream, AggregatorEvent, StreamAggregator};
