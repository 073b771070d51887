//! Scripted transport for exercising the protocol engine without hardware.

use crate::error::Result;
use crate::frame::FRAME_LEN;
use crate::transport::Transport;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// What the device does in response to one read.
#[derive(Debug)]
pub enum ReadEvent {
    /// Bytes become available; a read smaller than the chunk leaves the rest queued
    Data(Vec<u8>),
    /// Leftovers of an earlier reply already sitting in the input buffer;
    /// read like `Data` unless discarded first
    Late(Vec<u8>),
    /// Nothing arrives within the wait
    Silent,
    /// The channel fails
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
pub struct MockTransport {
    /// Everything the engine wrote
    pub written: Vec<u8>,
    /// Cap on bytes accepted per write, to simulate short writes
    pub write_limit: Option<usize>,
    /// Bytes thrown away by `discard_input`
    pub discarded: usize,
    events: VecDeque<ReadEvent>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = ReadEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn remaining_events(&self) -> usize {
        self.events.len()
    }
}

impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let accepted = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.written.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    async fn read(&mut self, buf: &mut [u8], _wait: Duration) -> Result<Option<usize>> {
        match self.events.pop_front() {
            None | Some(ReadEvent::Silent) => Ok(None),
            Some(ReadEvent::Fail(kind)) => Err(io::Error::from(kind).into()),
            Some(ReadEvent::Data(mut bytes)) => {
                let n = copy_chunk(&mut bytes, buf);
                if !bytes.is_empty() {
                    self.events.push_front(ReadEvent::Data(bytes));
                }
                Ok(Some(n))
            }
            Some(ReadEvent::Late(mut bytes)) => {
                let n = copy_chunk(&mut bytes, buf);
                if !bytes.is_empty() {
                    self.events.push_front(ReadEvent::Late(bytes));
                }
                Ok(Some(n))
            }
        }
    }

    async fn discard_input(&mut self) -> Result<usize> {
        let mut dropped = 0;
        while let Some(ReadEvent::Late(bytes)) = self.events.front() {
            dropped += bytes.len();
            self.events.pop_front();
        }
        self.discarded += dropped;
        Ok(dropped)
    }
}

/// Move as much of `bytes` as fits into `buf`, leaving the rest in `bytes`.
fn copy_chunk(bytes: &mut Vec<u8>, buf: &mut [u8]) -> usize {
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    bytes.drain(..n);
    n
}

/// A full-length status frame with the given status flags byte.
pub fn state_frame(status_flags: u8) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[0x22] = status_flags;
    frame
}

pub const PLUGGED_IN: u8 = 0x20;
pub const UNPLUGGED: u8 = 0x00;
