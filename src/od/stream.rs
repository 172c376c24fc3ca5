//! Stream-based partial-transfer I/O (§4.3): the substrate SDO segmented
//! transfers are built on.

use core::cell::RefCell;

use alloc::vec::Vec;

use crate::error::{OdAccess, OdError};
use crate::lock::OdLock;
use crate::od::entry::{AccessAttr, OdExtension};

/// A transient cursor created by entry/sub-index resolution (§3). Borrowed
/// for the duration of one logical SDO transfer; restarting is done by
/// resetting `data_offset` to 0, which `get_sub` always does.
pub struct OdStream<'e> {
    /// The underlying storage cell, or `None` if the sub-index resolved to
    /// nothing storable (e.g. a null array backing with `data_length` still
    /// informative for size reporting, per §4.2).
    pub data: Option<&'e RefCell<Vec<u8>>>,
    /// Byte offset within `data` at which this sub-index's window begins
    /// (nonzero for array elements sharing one contiguous cell).
    pub window_offset: usize,
    /// Length in bytes of this sub-index's window.
    pub data_length: usize,
    /// Bytes already transferred in the current logical operation.
    pub data_offset: usize,
    pub attr: AccessAttr,
}

impl<'e> OdStream<'e> {
    pub fn new(data: Option<&'e RefCell<Vec<u8>>>, window_offset: usize, data_length: usize, attr: AccessAttr) -> Self {
        OdStream {
            data,
            window_offset,
            data_length,
            data_offset: 0,
            attr,
        }
    }

    /// Restart the logical transfer without touching anything else (§4.3).
    pub fn restart(&mut self) {
        self.data_offset = 0;
    }
}

/// Which I/O path a resolved sub-index should use (§4.2).
pub enum IoHandler<'e> {
    Default,
    Disabled,
    Extension(&'e dyn OdExtension),
}

/// Default read of raw OD storage (§4.3). The copy is the only portion held
/// under `lock`.
pub fn default_read_original<L: OdLock>(
    stream: &mut OdStream<'_>,
    buf: &mut [u8],
    lock: &L,
) -> Result<(OdAccess, usize), OdError> {
    let cell = stream.data.ok_or(OdError::SubNotExist)?;
    if stream.data_offset >= stream.data_length {
        return Err(OdError::DeviceIncompatible);
    }
    let remaining = stream.data_length - stream.data_offset;
    let count = buf.len();

    lock.locked(|| {
        let storage = cell.borrow();
        let base = stream.window_offset + stream.data_offset;
        if remaining > count {
            buf.copy_from_slice(&storage[base..base + count]);
            stream.data_offset += count;
            Ok((OdAccess::Partial, count))
        } else {
            buf[..remaining].copy_from_slice(&storage[base..base + remaining]);
            stream.data_offset = 0;
            Ok((OdAccess::Complete, remaining))
        }
    })
}

/// Default write of raw OD storage (§4.3). Mirrors `default_read_original`,
/// rejecting writes that would overrun the cell with `DataLong`.
pub fn default_write_original<L: OdLock>(
    stream: &mut OdStream<'_>,
    buf: &[u8],
    lock: &L,
) -> Result<(OdAccess, usize), OdError> {
    let cell = stream.data.ok_or(OdError::SubNotExist)?;
    let remaining = stream.data_length - stream.data_offset;
    let count = buf.len();

    if remaining < count {
        return Err(OdError::DataLong);
    }

    lock.locked(|| {
        let mut storage = cell.borrow_mut();
        let base = stream.window_offset + stream.data_offset;
        storage[base..base + count].copy_from_slice(buf);
        if remaining > count {
            stream.data_offset += count;
            Ok((OdAccess::Partial, count))
        } else {
            stream.data_offset = 0;
            Ok((OdAccess::Complete, count))
        }
    })
}

/// Read hook for entries whose I/O has been disabled (§4.3).
pub fn read_disabled(_stream: &mut OdStream<'_>, _buf: &mut [u8]) -> Result<(OdAccess, usize), OdError> {
    Err(OdError::UnsupportedAccess)
}

/// Write hook for entries whose I/O has been disabled (§4.3).
pub fn write_disabled(_stream: &mut OdStream<'_>, _buf: &[u8]) -> Result<(OdAccess, usize), OdError> {
    Err(OdError::UnsupportedAccess)
}
