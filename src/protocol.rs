//! Request/response engine for the power bank's single-byte command protocol.
//!
//! The device is half-duplex: one request, then its reply. Requests carry no
//! sequence number, so a status exchange that stalls part-way is restarted
//! from the trigger byte rather than resumed. Input left over from an earlier
//! reply is discarded before every request that expects an answer.

use crate::command::{Command, CommandCode, NAME_LEN};
use crate::error::{PowerbankError, Result};
use crate::frame::{DeviceState, FRAME_LEN, RawFrame, decode_padded_ascii};
use crate::transport::Transport;
use std::time::Duration;

/// Reply length for a name request; only the first `NAME_LEN` bytes are the name
pub const NAME_REPLY_LEN: usize = 18;
pub const DESCRIPTION_REPLY_LEN: usize = 24;
pub const DESCRIPTION_LEN: usize = 24;

pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_STATE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// How long to wait for each chunk of a reply
    pub chunk_timeout: Duration,
    /// Status requests issued before `fetch_state` gives up
    pub max_state_attempts: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            max_state_attempts: DEFAULT_MAX_STATE_ATTEMPTS,
        }
    }
}

/// Identification strings, fetched separately from the status frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub description: String,
}

pub struct Powerbank<T> {
    transport: T,
    config: ProtocolConfig,
}

impl<T: Transport> Powerbank<T> {
    pub fn new(transport: T, config: ProtocolConfig) -> Self {
        Self { transport, config }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send_command(&mut self, code: CommandCode) -> Result<()> {
        self.write_all_or_fail(&[code as u8]).await
    }

    /// Send a command byte and its payload as one write.
    pub async fn send_command_with_payload(
        &mut self,
        code: CommandCode,
        payload: &[u8],
    ) -> Result<()> {
        let mut bytes = Vec::with_capacity(1 + payload.len());
        bytes.push(code as u8);
        bytes.extend_from_slice(payload);
        self.write_all_or_fail(&bytes).await
    }

    /// Fire an actuator command. Nothing is read back.
    pub async fn execute(&mut self, command: &Command) -> Result<()> {
        tracing::debug!("Sending {:?}", command);
        self.send_command_with_payload(command.code(), &command.payload()).await
    }

    /// Read exactly `n` bytes; a chunk wait with no input is fatal.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        match self.fill(&mut buf).await? {
            Fill::Complete => Ok(buf),
            Fill::Stalled(received) => Err(PowerbankError::DeviceSilent {
                received,
                expected: n,
            }),
        }
    }

    /// Request and read one status frame, re-issuing the whole request when
    /// the device stalls.
    pub async fn fetch_state(&mut self) -> Result<RawFrame> {
        let attempts = self.config.max_state_attempts.max(1);

        for attempt in 1..=attempts {
            self.request(CommandCode::RequestState).await?;

            let mut buf = vec![0u8; FRAME_LEN];
            match self.fill(&mut buf).await? {
                Fill::Complete => return Ok(RawFrame::new(buf)),
                Fill::Stalled(received) => {
                    tracing::debug!(
                        "State request {}/{} stalled after {} of {} bytes, retrying",
                        attempt,
                        attempts,
                        received,
                        FRAME_LEN
                    );
                }
            }
        }

        Err(PowerbankError::RetriesExhausted { attempts })
    }

    /// Fetch and decode one status frame.
    pub async fn read_state(&mut self) -> Result<DeviceState> {
        let frame = self.fetch_state().await?;
        DeviceState::decode(&frame)
    }

    pub async fn fetch_name(&mut self) -> Result<String> {
        self.request(CommandCode::RequestName).await?;
        let reply = self.read_exact(NAME_REPLY_LEN).await?;
        decode_padded_ascii(&reply, NAME_LEN)
    }

    pub async fn fetch_description(&mut self) -> Result<String> {
        self.request(CommandCode::RequestDescription).await?;
        let reply = self.read_exact(DESCRIPTION_REPLY_LEN).await?;
        decode_padded_ascii(&reply, DESCRIPTION_LEN)
    }

    pub async fn fetch_info(&mut self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            name: self.fetch_name().await?,
            description: self.fetch_description().await?,
        })
    }

    /// Send a command, first dropping any stale input if a reply will follow.
    async fn request(&mut self, code: CommandCode) -> Result<()> {
        if code.expects_reply() {
            let dropped = self.transport.discard_input().await?;
            if dropped > 0 {
                tracing::debug!("Discarded {} stale byte(s) before {:?}", dropped, code);
            }
        }
        self.send_command(code).await
    }

    async fn write_all_or_fail(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self.transport.write(bytes).await?;
        if written != bytes.len() {
            return Err(PowerbankError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<Fill> {
        let mut received = 0;
        while received < buf.len() {
            match self
                .transport
                .read(&mut buf[received..], self.config.chunk_timeout)
                .await?
            {
                None => return Ok(Fill::Stalled(received)),
                Some(0) => return Err(PowerbankError::Disconnected),
                Some(n) => received += n,
            }
        }
        Ok(Fill::Complete)
    }
}

enum Fill {
    Complete,
    Stalled(usize),
}
