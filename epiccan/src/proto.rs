//! EPIC CAN bus wire protocol
//!
//! Classic CAN frames with standard 11-bit identifiers. The upper bits of
//! the identifier select the frame class, the low nibble addresses one
//! controller among the (up to 16) controllers sharing the bus. All
//! multi-byte payload fields are big endian.

use num_enum::{FromPrimitive, IntoPrimitive};

/// Mask selecting the frame class bits of a standard identifier.
pub const CLASS_MASK: u16 = 0x7F0;
/// Mask selecting the device address nibble.
pub const ADDR_MASK: u16 = 0x00F;
/// Highest addressable device on one bus.
pub const DEVICE_ADDR_MAX: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
#[derive(FromPrimitive, IntoPrimitive)]
pub enum FrameClass {
    VarRead = 0x700,
    VarReadReply = 0x720,
    FuncCall = 0x740,
    FuncReply = 0x760,
    VarSet = 0x780,
    #[num_enum(catch_all)]
    Unknown(u16),
}

/// Composes the CAN identifier for a frame class addressed to `addr`.
pub fn can_id(class: FrameClass, addr: u8) -> u16 {
    u16::from(class) | (u16::from(addr) & ADDR_MASK)
}

/// Splits a standard identifier into frame class and device address.
pub fn split_id(id: u16) -> (FrameClass, u8) {
    (FrameClass::from(id & CLASS_MASK), (id & ADDR_MASK) as u8)
}

/// djb2-lowercase hash identifying a variable by name on the wire.
///
/// Same construction the firmware uses for its generated lookup tables:
/// `h = h * 33 + lower(byte)` in wrapping 32-bit arithmetic, reinterpreted
/// as a signed value.
pub fn var_hash(name: &str) -> i32 {
    let mut h: u32 = 5381;
    for b in name.bytes() {
        h = h
            .wrapping_shl(5)
            .wrapping_add(h)
            .wrapping_add(u32::from(b.to_ascii_lowercase()));
    }
    h as i32
}

#[derive(Debug, Clone)]
pub enum Error {
    PayloadTooSmall(Vec<u8>),
}

fn too_small(raw: &[u8]) -> Error {
    Error::PayloadTooSmall(raw.to_vec())
}

/// Variable read request. DLC 4.
#[derive(Debug, Clone)]
pub struct VarReadPayload {
    pub hash: i32,
}

/// Variable read response, hash echoed for demultiplexing. DLC 8.
#[derive(Debug, Clone)]
pub struct VarReadReplyPayload {
    pub hash: i32,
    pub value: f32,
}

/// Remote function call. DLC 6, or 8 when `arg2` is present.
#[derive(Debug, Clone)]
pub struct FuncCallPayload {
    pub func_id: u16,
    pub arg: f32,
    pub arg2: Option<i16>,
}

/// Remote function return value, function id echoed. DLC 8.
#[derive(Debug, Clone)]
pub struct FuncReplyPayload {
    pub func_id: u16,
    pub ret: f32,
}

/// Fire-and-forget variable write. DLC 8, never acknowledged.
#[derive(Debug, Clone)]
pub struct VarSetPayload {
    pub hash: i32,
    pub value: f32,
}

impl VarReadPayload {
    pub fn deserialize(raw: &[u8]) -> Result<VarReadPayload, Error> {
        if raw.len() < 4 {
            return Err(too_small(raw));
        }
        Ok(VarReadPayload {
            hash: i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
        })
    }
    pub fn serialize(&self) -> Vec<u8> {
        self.hash.to_be_bytes().to_vec()
    }
}

impl VarReadReplyPayload {
    pub fn deserialize(raw: &[u8]) -> Result<VarReadReplyPayload, Error> {
        if raw.len() < 8 {
            return Err(too_small(raw));
        }
        Ok(VarReadReplyPayload {
            hash: i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            value: f32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
    pub fn serialize(&self) -> Vec<u8> {
        let mut ret = self.hash.to_be_bytes().to_vec();
        ret.extend(self.value.to_be_bytes());
        ret
    }
}

impl FuncCallPayload {
    pub fn deserialize(raw: &[u8]) -> Result<FuncCallPayload, Error> {
        if raw.len() < 6 {
            return Err(too_small(raw));
        }
        let arg2 = if raw.len() >= 8 {
            Some(i16::from_be_bytes([raw[6], raw[7]]))
        } else {
            None
        };
        Ok(FuncCallPayload {
            func_id: u16::from_be_bytes([raw[0], raw[1]]),
            arg: f32::from_be_bytes([raw[2], raw[3], raw[4], raw[5]]),
            arg2,
        })
    }
    pub fn serialize(&self) -> Vec<u8> {
        let mut ret = self.func_id.to_be_bytes().to_vec();
        ret.extend(self.arg.to_be_bytes());
        if let Some(arg2) = self.arg2 {
            ret.extend(arg2.to_be_bytes());
        }
        ret
    }
}

impl FuncReplyPayload {
    pub fn deserialize(raw: &[u8]) -> Result<FuncReplyPayload, Error> {
        if raw.len() < 8 {
            return Err(too_small(raw));
        }
        // Bytes 2..4 are padding; the return value sits in the same slot
        // as a variable reply's value.
        Ok(FuncReplyPayload {
            func_id: u16::from_be_bytes([raw[0], raw[1]]),
            ret: f32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
    pub fn serialize(&self) -> Vec<u8> {
        let mut ret = self.func_id.to_be_bytes().to_vec();
        ret.extend([0u8, 0u8]);
        ret.extend(self.ret.to_be_bytes());
        ret
    }
}

impl VarSetPayload {
    pub fn deserialize(raw: &[u8]) -> Result<VarSetPayload, Error> {
        if raw.len() < 8 {
            return Err(too_small(raw));
        }
        Ok(VarSetPayload {
            hash: i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            value: f32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
    pub fn serialize(&self) -> Vec<u8> {
        let mut ret = self.hash.to_be_bytes().to_vec();
        ret.extend(self.value.to_be_bytes());
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_reference_values() {
        assert_eq!(var_hash(""), 5381);
        assert_eq!(var_hash("rpm"), 193504948);
        assert_eq!(var_hash("fuelPressure"), 568002698);
        assert_eq!(var_hash("coolantTemp"), -1603237749);
        assert_eq!(var_hash("vehicleSpeedKph"), -1925174695);
        assert_eq!(var_hash("throttle_position"), 1782415407);
    }

    #[test]
    fn hash_is_case_insensitive() {
        assert_eq!(var_hash("RPM"), var_hash("rpm"));
        assert_eq!(var_hash("CoolantTemp"), var_hash("coolanttemp"));
    }

    #[test]
    fn id_composition() {
        assert_eq!(can_id(FrameClass::VarRead, 0), 0x700);
        assert_eq!(can_id(FrameClass::VarReadReply, 7), 0x727);
        assert_eq!(can_id(FrameClass::VarSet, 15), 0x78F);
        assert_eq!(split_id(0x723), (FrameClass::VarReadReply, 3));
        assert_eq!(split_id(0x740), (FrameClass::FuncCall, 0));
        let (class, _) = split_id(0x123);
        assert_eq!(class, FrameClass::Unknown(0x120));
    }

    #[test]
    fn var_read_roundtrip() {
        let req = VarReadPayload { hash: -1603237749 };
        let parsed = VarReadPayload::deserialize(&req.serialize()).unwrap();
        assert_eq!(parsed.hash, req.hash);
    }

    #[test]
    fn var_reply_roundtrip() {
        let rep = VarReadReplyPayload {
            hash: 193504948,
            value: 871.25,
        };
        let parsed = VarReadReplyPayload::deserialize(&rep.serialize()).unwrap();
        assert_eq!(parsed.hash, rep.hash);
        assert_eq!(parsed.value, rep.value);
    }

    #[test]
    fn func_call_roundtrip() {
        let short = FuncCallPayload {
            func_id: 12,
            arg: 1.5,
            arg2: None,
        };
        let raw = short.serialize();
        assert_eq!(raw.len(), 6);
        let parsed = FuncCallPayload::deserialize(&raw).unwrap();
        assert_eq!(parsed.func_id, 12);
        assert_eq!(parsed.arg, 1.5);
        assert!(parsed.arg2.is_none());

        let long = FuncCallPayload {
            func_id: 3,
            arg: -2.0,
            arg2: Some(-7),
        };
        let raw = long.serialize();
        assert_eq!(raw.len(), 8);
        let parsed = FuncCallPayload::deserialize(&raw).unwrap();
        assert_eq!(parsed.arg2, Some(-7));
    }

    #[test]
    fn func_reply_skips_padding() {
        let rep = FuncReplyPayload {
            func_id: 9,
            ret: 42.0,
        };
        let raw = rep.serialize();
        assert_eq!(raw.len(), 8);
        let parsed = FuncReplyPayload::deserialize(&raw).unwrap();
        assert_eq!(parsed.func_id, 9);
        assert_eq!(parsed.ret, 42.0);
    }

    #[test]
    fn short_payloads_error() {
        assert!(matches!(
            VarReadPayload::deserialize(&[1, 2, 3]),
            Err(Error::PayloadTooSmall(_))
        ));
        assert!(matches!(
            VarReadReplyPayload::deserialize(&[0; 7]),
            Err(Error::PayloadTooSmall(_))
        ));
        assert!(matches!(
            FuncCallPayload::deserialize(&[0; 5]),
            Err(Error::PayloadTooSmall(_))
        ));
        assert!(matches!(
            VarSetPayload::deserialize(&[]),
            Err(Error::PayloadTooSmall(_))
        ));
    }
}
