//! SocketCAN transport
//!
//! Thin wrapper around a raw CAN socket, narrowed to what the EPIC
//! protocol needs: standard-identifier data frames, blocking sends, and
//! receives bounded by a caller-supplied timeout. Remote and extended
//! frames from other bus traffic are skipped inside the receive window.

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Id, Socket, StandardId};

use std::io;
use std::time::{Duration, Instant};

/// Possible errors when talking to the bus.
#[derive(Debug)]
pub enum BusError {
    /// Opening the interface failed (missing interface, permissions).
    Open(io::Error),
    /// Low level IO error while sending.
    Send(io::Error),
    /// Low level IO error while receiving.
    Recv(io::Error),
    /// No matching frame arrived within the receive window.
    Timeout,
    /// Identifier does not fit in a standard 11-bit CAN id.
    InvalidId(u16),
    /// Payload exceeds the classic CAN frame limit of 8 bytes.
    PayloadTooBig(usize),
}

/// One received standard-identifier data frame.
#[derive(Debug, Clone)]
pub struct BusFrame {
    pub id: u16,
    pub data: Vec<u8>,
}

pub struct Bus {
    socket: CanSocket,
    iface: String,
}

impl Bus {
    /// Opens the named SocketCAN interface (e.g. `can0`, `vcan0`).
    pub fn open(iface: &str) -> Result<Bus, BusError> {
        let socket = CanSocket::open(iface).map_err(BusError::Open)?;
        Ok(Bus {
            socket,
            iface: iface.to_string(),
        })
    }

    pub fn interface(&self) -> &str {
        &self.iface
    }

    /// Sends one data frame. Blocks until the kernel queues it.
    pub fn send(&self, id: u16, data: &[u8]) -> Result<(), BusError> {
        let std_id = StandardId::new(id).ok_or(BusError::InvalidId(id))?;
        let frame =
            CanFrame::new(std_id, data).ok_or(BusError::PayloadTooBig(data.len()))?;
        self.socket.write_frame(&frame).map_err(BusError::Send)
    }

    /// Receives the next standard-identifier data frame, waiting at most
    /// `timeout`. Extended and remote frames seen in the window are
    /// discarded without consuming the caller's patience beyond it.
    pub fn recv(&self, timeout: Duration) -> Result<BusFrame, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BusError::Timeout);
            }
            let frame = match self.socket.read_frame_timeout(remaining) {
                Ok(frame) => frame,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(BusError::Timeout)
                }
                Err(e) => return Err(BusError::Recv(e)),
            };
            if frame.is_remote_frame() {
                continue;
            }
            let id = match frame.id() {
                Id::Standard(sid) => sid.as_raw(),
                Id::Extended(_) => continue,
            };
            return Ok(BusFrame {
                id,
                data: frame.data().to_vec(),
            });
        }
    }
}
