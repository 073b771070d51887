use thiserror::Error;

#[derive(Debug, Error)]
pub enum PowerbankError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short write: channel accepted {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Serial port closed")]
    Disconnected,

    #[error("Powerbank went silent after {received} of {expected} bytes")]
    DeviceSilent { received: usize, expected: usize },

    #[error("No state frame received after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Malformed frame: {width} byte(s) at offset 0x{offset:02x} exceed frame length {len}")]
    MalformedFrame {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("Parameter missing")]
    MissingParameter,

    #[error("Name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Index out of range: {0} (expected 0-9)")]
    IndexOutOfRange(i32),
}

pub type Result<T> = std::result::Result<T, PowerbankError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_frame_message_names_offset() {
        let err = PowerbankError::MalformedFrame {
            offset: 0x24,
            width: 4,
            len: 30,
        };
        assert_eq!(
            err.to_string(),
            "Malformed frame: 4 byte(s) at offset 0x24 exceed frame length 30"
        );
    }
}
