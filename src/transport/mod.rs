//! Transport layer.
//!
//! One inbound UDP socket per packet type. No ordering, no retransmission:
//! whatever the network delivers is handed to the receivers as is.

mod socket;

pub use socket::*;
