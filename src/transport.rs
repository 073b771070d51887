use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Byte-level duplex channel to the power bank.
///
/// Implementations own an already-opened, already-configured link (UART,
/// USB-CDC, or an in-memory pipe in tests). Framing and retry policy live in
/// the protocol engine, not here.
pub trait Transport {
    /// Write `data`, returning how many bytes the channel accepted.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Wait up to `wait` for input and read at most `buf.len()` bytes.
    ///
    /// Returns `Ok(None)` when nothing arrived within `wait` and `Ok(Some(0))`
    /// when the channel reached end-of-file.
    fn read(
        &mut self,
        buf: &mut [u8],
        wait: Duration,
    ) -> impl Future<Output = Result<Option<usize>>> + Send;

    /// Drop input that has already arrived but not been read, returning how
    /// many bytes were thrown away.
    fn discard_input(&mut self) -> impl Future<Output = Result<usize>> + Send;
}
