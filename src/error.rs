#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed DHCP packet: {0}")]
    MalformedPacket(String),

    #[error("Option {code} truncated: declared {declared} bytes, {available} available")]
    TruncatedOption {
        code: u8,
        declared: usize,
        available: usize,
    },

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid option value: {0}")]
    InvalidValue(String),

    #[error("Duplicate option code {0}")]
    DuplicateOptionCode(u8),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddr(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Server returned DHCPNAK: {}", .0.as_deref().unwrap_or("no message"))]
    Nak(Option<String>),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
