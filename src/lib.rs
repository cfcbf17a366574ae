pub mod client;
pub mod error;
pub mod lease;
pub mod mac;
pub mod options;
pub mod packet;

pub use client::{ClientConfig, DhcpClient};
pub use error::{Error, Result};
pub use lease::{Lease, LeaseSummary};
pub use mac::MacAddr;
pub use options::{DhcpOption, MessageType, OptionList};
pub use packet::DhcpPacket;
