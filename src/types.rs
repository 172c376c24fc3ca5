use core::convert::TryFrom;

// --- Primitive Types (Based on CiA-301 Section 6.1) ---
// These aliases keep the object dictionary code naming-compatible with CiA-301 (UNSIGNEDn).

/// Alias for UNSIGNED8 (8-bit unsigned integer)
pub type UNSIGNED8 = u8;
/// Alias for UNSIGNED16 (16-bit unsigned integer)
pub type UNSIGNED16 = u16;
/// Alias for UNSIGNED32 (32-bit unsigned integer)
pub type UNSIGNED32 = u32;

/// Node IDs are represented by UNSIGNED8; valid range is 1..=127.
pub type NodeId = UNSIGNED8;

// --- Protocol Constants ---

/// Largest node ID assignable on a CANopen network (CiA-301, 7.2.1).
pub const C_ADR_MAX_NODE_ID: NodeId = 127;

/// Base CAN-ID contribution for the default (node-ID-derived) Emergency COB-ID: `0x80 + nodeId`.
pub const C_EMCY_COBID_BASE: u16 = 0x80;

/// CAN-ID of the SYNC object; frames with this identifier are never Emergency frames
/// and must be filtered out by the consumer (§4.9).
pub const C_SYNC_COBID: u16 = 0x80;

/// Acceptance-filter mask applied over base `0x80` by the Emergency consumer (§6).
pub const C_EMCY_FILTER_MASK: u16 = 0x780;

/// Error describing why a raw byte could not be accepted as a CANopen node ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdError {
    /// Node ID is outside the valid range 1..=127.
    InvalidRange,
}

impl core::fmt::Display for NodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NodeIdError::InvalidRange => write!(f, "node id outside valid range 1..=127"),
        }
    }
}

/// Wrapper enforcing the CiA-301 node ID range (1..=127) at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidNodeId(NodeId);

impl ValidNodeId {
    pub fn get(self) -> NodeId {
        self.0
    }
}

impl TryFrom<u8> for ValidNodeId {
    type Error = NodeIdError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=C_ADR_MAX_NODE_ID).contains(&value) {
            Ok(ValidNodeId(value))
        } else {
            Err(NodeIdError::InvalidRange)
        }
    }
}
