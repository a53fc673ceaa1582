//! Remote variable service
//!
//! Request/response access to controller variables and functions over a
//! shared `Bus`. The bus carries unrelated traffic; replies are matched by
//! frame class, the echoed hash (or function id), and the responder
//! address. Every read is bounded by a per-request deadline.

use crate::bus::{Bus, BusError};
use crate::proto::{
    self, can_id, split_id, FrameClass, FuncCallPayload, FuncReplyPayload, VarReadPayload,
    VarReadReplyPayload, VarSetPayload,
};

use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum VarError {
    Bus(BusError),
    /// No reply matched before the deadline.
    Timeout,
    /// A frame matched the expected class but carried a bad payload.
    Proto(proto::Error),
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VarError::Bus(e) => write!(f, "bus error: {:?}", e),
            VarError::Timeout => write!(f, "no reply from device"),
            VarError::Proto(e) => write!(f, "malformed reply: {:?}", e),
        }
    }
}

impl From<BusError> for VarError {
    fn from(e: BusError) -> VarError {
        match e {
            BusError::Timeout => VarError::Timeout,
            other => VarError::Bus(other),
        }
    }
}

/// Read seam for the polling scheduler, so it can be driven by a stub in
/// tests.
pub trait VariableReader {
    fn read_var(&mut self, hash: i32, dest: u8) -> Result<f32, VarError>;
}

pub struct VarClient {
    bus: Bus,
    timeout: Duration,
}

impl VarClient {
    pub fn new(bus: Bus) -> VarClient {
        Self::with_timeout(bus, DEFAULT_REPLY_TIMEOUT)
    }

    pub fn with_timeout(bus: Bus, timeout: Duration) -> VarClient {
        VarClient { bus, timeout }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Reads one variable, blocking until the matching reply or the
    /// deadline. Address 0 accepts a reply from any responder; a nonzero
    /// address only from that controller.
    pub fn read(&mut self, hash: i32, dest: u8) -> Result<f32, VarError> {
        self.bus
            .send(can_id(FrameClass::VarRead, dest), &VarReadPayload { hash }.serialize())?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(VarError::Timeout);
            }
            let frame = self.bus.recv(remaining)?;
            let (class, responder) = split_id(frame.id);
            if class != FrameClass::VarReadReply {
                continue;
            }
            if dest != 0 && responder != dest {
                continue;
            }
            let reply = VarReadReplyPayload::deserialize(&frame.data).map_err(VarError::Proto)?;
            if reply.hash != hash {
                continue;
            }
            return Ok(reply.value);
        }
    }

    /// Fire-and-forget write. No acknowledgement exists on the wire.
    pub fn write(&mut self, hash: i32, value: f32, dest: u8) -> Result<(), VarError> {
        self.bus
            .send(
                can_id(FrameClass::VarSet, dest),
                &VarSetPayload { hash, value }.serialize(),
            )
            .map_err(VarError::from)
    }

    /// Calls a remote function and waits for its return value.
    pub fn call(
        &mut self,
        func_id: u16,
        arg: f32,
        arg2: Option<i16>,
        dest: u8,
    ) -> Result<f32, VarError> {
        self.bus.send(
            can_id(FrameClass::FuncCall, dest),
            &FuncCallPayload {
                func_id,
                arg,
                arg2,
            }
            .serialize(),
        )?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(VarError::Timeout);
            }
            let frame = self.bus.recv(remaining)?;
            let (class, responder) = split_id(frame.id);
            if class != FrameClass::FuncReply || responder != dest {
                continue;
            }
            let reply = FuncReplyPayload::deserialize(&frame.data).map_err(VarError::Proto)?;
            if reply.func_id != func_id {
                continue;
            }
            return Ok(reply.ret);
        }
    }
}

impl VariableReader for VarClient {
    fn read_var(&mut self, hash: i32, dest: u8) -> Result<f32, VarError> {
        self.read(hash, dest)
    }
}
