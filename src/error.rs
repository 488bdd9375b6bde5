//! Error types for the LocusQ companion

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Companion error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration or CLI input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Destination host is not an IPv4 literal
    #[error("Invalid host address (IPv4 literal required): {0}")]
    InvalidHostAddress(String),

    /// Pose packet buffer has the wrong length for its version
    #[error("Invalid packet length: expected {expected} bytes, got {actual}")]
    PacketLength {
        /// Required buffer length
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// Pose packet does not start with the protocol magic
    #[error("Invalid packet magic: {found:#010x}")]
    PacketMagic {
        /// Magic value actually read
        found: u32,
    },

    /// Pose packet declares a version this build does not speak
    #[error("Unsupported packet version: {found}")]
    PacketVersion {
        /// Version value actually read
        found: u32,
    },

    /// Motion capture capability is absent on this host
    #[error("Motion source unavailable: {reason}")]
    SourceUnavailable {
        /// Human-readable explanation for the operator
        reason: String,
    },

    /// Datagram send failed with a non-transient OS error
    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Datagram was truncated by the OS
    #[error("Short send: wrote {written} of {expected} bytes")]
    ShortSend {
        /// Bytes the OS accepted
        written: usize,
        /// Bytes in the packet
        expected: usize,
    },

    /// Transient send errors persisted through every retry
    #[error("Send retries exhausted after {attempts} attempts: {source}")]
    SendRetriesExhausted {
        /// Total attempts made, including the first
        attempts: u32,
        /// Last OS error observed
        #[source]
        source: std::io::Error,
    },

    /// Shutdown was requested while a send was pending
    #[error("Send interrupted: {0}")]
    Interrupted(&'static str),

    /// Sender was used after close()
    #[error("Socket already closed")]
    SocketClosed,

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Image decode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
