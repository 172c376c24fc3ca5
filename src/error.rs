//! Internal result taxonomy for Object Dictionary access, and its mapping onto
//! the 32-bit SDO abort code word (CiA-301 Table 23 and its extensions).

use core::fmt;

/// Everything that can go wrong while resolving, reading or writing an
/// Object Dictionary entry. Success-shaped outcomes (`OK`, `PARTIAL`) are
/// represented by `Ok(OdAccess)` rather than folded in here, so stream and
/// accessor code can use `?` without re-matching success codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OdError {
    /// Caller-visible allocation shortage (never raised by this crate's own
    /// statically-sized structures, kept for completeness of the taxonomy).
    OutOfMemory,
    /// Resolved to a disabled I/O hook.
    UnsupportedAccess,
    /// Entry is write-only; a read was attempted.
    WriteOnly,
    /// Entry is read-only; a write was attempted.
    ReadOnly,
    /// No entry exists at the requested 16-bit index.
    IndexNotExist,
    /// Object cannot be PDO mapped.
    NoMap,
    /// Number of mapped objects exceeds the PDO length.
    MapLen,
    /// General parameter incompatibility.
    ParameterIncompatible,
    /// General internal incompatibility, or a tagged-extended entry missing
    /// its extension block, or a stream whose offset is already at its end.
    DeviceIncompatible,
    /// Access failed due to a hardware error.
    Hardware,
    /// Data type does not match the length of the object.
    TypeMismatch,
    /// More data was supplied than the object can hold.
    DataLong,
    /// Less data was supplied than the object requires.
    DataShort,
    /// No sub-index exists at the requested 8-bit sub-index.
    SubNotExist,
    /// Value is invalid (fails a semantic precondition, not a type/range check).
    InvalidValue,
    /// Value written is too high.
    ValueHigh,
    /// Value written is too low.
    ValueLow,
    /// Configured maximum value is less than the configured minimum.
    MaxLessMin,
    /// General lack of resources (buffer space, FIFO slots, etc.).
    NoResource,
    /// General, unclassified error.
    General,
    /// Data could not be transferred or stored to the application.
    DataTransfer,
    /// Data could not be transferred due to local control.
    DataLocalControl,
    /// Data could not be transferred due to present device state.
    DataDeviceState,
    /// Object dictionary is missing or not present.
    OdMissing,
    /// No data available (e.g. history sub-index beyond current `count`).
    NoData,
}

/// Successful outcome of an Object Dictionary stream operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdAccess {
    /// Operation completed; the logical transfer is finished and `data_offset`
    /// has been reset to 0.
    Complete,
    /// Operation completed a segment; more data remains (`data_offset` advanced).
    Partial,
}

impl fmt::Display for OdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OdError::OutOfMemory => "out of memory",
            OdError::UnsupportedAccess => "unsupported access",
            OdError::WriteOnly => "object is write-only",
            OdError::ReadOnly => "object is read-only",
            OdError::IndexNotExist => "object does not exist",
            OdError::NoMap => "object cannot be mapped",
            OdError::MapLen => "number of mapped objects exceeds PDO length",
            OdError::ParameterIncompatible => "general parameter incompatibility",
            OdError::DeviceIncompatible => "general internal incompatibility",
            OdError::Hardware => "access failed due to a hardware error",
            OdError::TypeMismatch => "data type does not match length of object",
            OdError::DataLong => "data type does not match; length too high",
            OdError::DataShort => "data type does not match; length too low",
            OdError::SubNotExist => "sub-index does not exist",
            OdError::InvalidValue => "invalid value for parameter",
            OdError::ValueHigh => "value of parameter written is too high",
            OdError::ValueLow => "value of parameter written is too low",
            OdError::MaxLessMin => "maximum value is less than minimum value",
            OdError::NoResource => "resource not available",
            OdError::General => "general error",
            OdError::DataTransfer => "data cannot be transferred or stored to the application",
            OdError::DataLocalControl => {
                "data cannot be transferred or stored because of local control"
            }
            OdError::DataDeviceState => {
                "data cannot be transferred or stored because of present device state"
            }
            OdError::OdMissing => "object dictionary not present or dynamic generation fails",
            OdError::NoData => "no data available",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OdError {}

/// Table-driven mapping from `OdError` to the 32-bit CANopen SDO abort code
/// (CiA-301 Table 23). `#[non_exhaustive]` growth falls through to the
/// DEV_INCOMPAT abort code, keeping this function total.
pub fn sdo_abort_code(err: OdError) -> u32 {
    match err {
        OdError::OutOfMemory => 0x0504_0005,
        OdError::UnsupportedAccess => 0x0601_0000,
        OdError::WriteOnly => 0x0601_0001,
        OdError::ReadOnly => 0x0601_0002,
        OdError::IndexNotExist => 0x0602_0000,
        OdError::NoMap => 0x0604_0041,
        OdError::MapLen => 0x0604_0042,
        OdError::ParameterIncompatible => 0x0604_0043,
        OdError::DeviceIncompatible => 0x0604_0047,
        OdError::Hardware => 0x0606_0000,
        OdError::TypeMismatch => 0x0607_0010,
        OdError::DataLong => 0x0607_0012,
        OdError::DataShort => 0x0607_0013,
        OdError::SubNotExist => 0x0609_0011,
        OdError::InvalidValue => 0x0609_0030,
        OdError::ValueHigh => 0x0609_0031,
        OdError::ValueLow => 0x0609_0032,
        OdError::MaxLessMin => 0x0609_0036,
        OdError::NoResource => 0x060A_0023,
        OdError::General => 0x0800_0000,
        OdError::DataTransfer => 0x0800_0020,
        OdError::DataLocalControl => 0x0800_0021,
        OdError::DataDeviceState => 0x0800_0022,
        OdError::OdMissing => 0x0800_0023,
        OdError::NoData => 0x0800_0024,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_variant_maps_to_a_distinct_nonzero_abort_code() {
        let variants = [
            OdError::OutOfMemory,
            OdError::UnsupportedAccess,
            OdError::WriteOnly,
            OdError::ReadOnly,
            OdError::IndexNotExist,
            OdError::NoMap,
            OdError::MapLen,
            OdError::ParameterIncompatible,
            OdError::DeviceIncompatible,
            OdError::Hardware,
            OdError::TypeMismatch,
            OdError::DataLong,
            OdError::DataShort,
            OdError::SubNotExist,
            OdError::InvalidValue,
            OdError::ValueHigh,
            OdError::ValueLow,
            OdError::MaxLessMin,
            OdError::NoResource,
            OdError::General,
            OdError::DataTransfer,
            OdError::DataLocalControl,
            OdError::DataDeviceState,
            OdError::OdMissing,
            OdError::NoData,
        ];
        let mut codes: alloc::vec::Vec<u32> = variants.iter().map(|e| sdo_abort_code(*e)).collect();
        for code in &codes {
            assert_ne!(*code, 0);
        }
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), variants.len(), "abort codes must be distinct");
    }

    #[test]
    fn device_incompatible_is_the_dev_incompat_abort_code() {
        assert_eq!(sdo_abort_code(OdError::DeviceIncompatible), 0x0604_0047);
    }

    #[test]
    fn display_impls_are_non_empty() {
        assert!(!alloc::format!("{}", OdError::InvalidValue).is_empty());
    }
}
