//! The tagged-variant Entry model.
//!
//! The original source represents an entry's payload with `void *` reinterpreted
//! through an `objectType` tag and reaches application state through a raw
//! per-object function-pointer pair. Here that becomes an owned tagged
//! variant (`OdObject`) plus a sibling `ExtensionSlot` that either has no
//! extension capability at all, is tagged extended but not yet wired up
//! (resolves to `DeviceIncompatible`, mirroring the source), or holds an
//! installed `OdExtension` trait object.

use core::cell::RefCell;
use core::ops::{BitOr, BitOrAssign};

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{OdAccess, OdError};
use crate::od::stream::OdStream;

/// Bitset of access attributes for a VAR (or array-element / record-field)
/// descriptor (§3: SDO-R, SDO-W, {T,R}PDO-mappable, {T,R}SRDO-mappable,
/// multi-byte flag, short-string-fill flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessAttr(pub u16);

impl AccessAttr {
    pub const SDO_R: AccessAttr = AccessAttr(1 << 0);
    pub const SDO_W: AccessAttr = AccessAttr(1 << 1);
    pub const TPDO: AccessAttr = AccessAttr(1 << 2);
    pub const RPDO: AccessAttr = AccessAttr(1 << 3);
    pub const TSRDO: AccessAttr = AccessAttr(1 << 4);
    pub const RSRDO: AccessAttr = AccessAttr(1 << 5);
    pub const MULTI_BYTE: AccessAttr = AccessAttr(1 << 6);
    pub const STR_FILL: AccessAttr = AccessAttr(1 << 7);

    pub const READ_ONLY: AccessAttr = AccessAttr(Self::SDO_R.0);
    pub const READ_WRITE: AccessAttr = AccessAttr(Self::SDO_R.0 | Self::SDO_W.0);

    pub fn contains(self, other: AccessAttr) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn readable(self) -> bool {
        self.contains(AccessAttr::SDO_R)
    }

    pub fn writable(self) -> bool {
        self.contains(AccessAttr::SDO_W)
    }
}

impl BitOr for AccessAttr {
    type Output = AccessAttr;
    fn bitor(self, rhs: AccessAttr) -> AccessAttr {
        AccessAttr(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessAttr {
    fn bitor_assign(&mut self, rhs: AccessAttr) {
        self.0 |= rhs.0;
    }
}

/// A single fixed-length byte cell and its access rights. Shared by VAR
/// entries, each array element block, and each record field.
#[derive(Debug)]
pub struct VarDescriptor {
    pub storage: RefCell<Vec<u8>>,
    pub attr: AccessAttr,
}

impl VarDescriptor {
    pub fn new(initial: Vec<u8>, attr: AccessAttr) -> Self {
        VarDescriptor {
            storage: RefCell::new(initial),
            attr,
        }
    }

    pub fn len(&self) -> usize {
        self.storage.borrow().len()
    }
}

/// ARRAY payload: sub-index 0 is a length byte; sub-indices 1..=count
/// address `element_len`-byte windows of one contiguous storage cell.
#[derive(Debug)]
pub struct ArrayDescriptor {
    pub elements: RefCell<Vec<u8>>,
    pub element_len: usize,
    pub count: u8,
    pub attr: AccessAttr,
}

impl ArrayDescriptor {
    pub fn new(count: u8, element_len: usize, fill: u8, attr: AccessAttr) -> Self {
        ArrayDescriptor {
            elements: RefCell::new(alloc::vec![fill; element_len * count as usize]),
            element_len,
            count,
            attr,
        }
    }
}

/// A single named field of a RECORD entry; sub-index values may be
/// non-contiguous, so fields are matched by linear scan (§4.2).
#[derive(Debug)]
pub struct RecordField {
    pub sub_index: u8,
    pub var: VarDescriptor,
}

/// RECORD payload: an ordered, possibly sparse, sequence of sub-index fields.
#[derive(Debug)]
pub struct RecordDescriptor {
    pub fields: Vec<RecordField>,
}

/// The tagged payload variant of an Entry (§3).
#[derive(Debug)]
pub enum OdObject {
    Var(VarDescriptor),
    Array(ArrayDescriptor),
    Record(RecordDescriptor),
}

/// Application-supplied read/write override, installed by `extension_io_init`
/// (§4.4). Implementors close over whatever application state they need —
/// there is no separate raw "object" pointer to carry alongside the hooks.
pub trait OdExtension {
    fn read(
        &self,
        stream: &mut OdStream<'_>,
        buf: &mut [u8],
    ) -> Result<(OdAccess, usize), OdError>;

    fn write(&self, stream: &mut OdStream<'_>, buf: &[u8]) -> Result<(OdAccess, usize), OdError>;
}

/// Whether, and how, an entry's default I/O has been overridden.
pub enum ExtensionSlot {
    /// The entry was never tagged extended; `get_sub` always uses the
    /// default raw-memory read/write.
    NotExtended,
    /// The entry is tagged extended but `extension_io_init` has not been
    /// called yet — resolves to `DeviceIncompatible` (§4.2).
    Missing,
    /// An extension has been installed and is used in place of the default.
    Present(Box<dyn OdExtension>),
}

impl core::fmt::Debug for ExtensionSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExtensionSlot::NotExtended => f.write_str("ExtensionSlot::NotExtended"),
            ExtensionSlot::Missing => f.write_str("ExtensionSlot::Missing"),
            ExtensionSlot::Present(_) => f.write_str("ExtensionSlot::Present(..)"),
        }
    }
}

/// A single, immutable-after-construction Object Dictionary entry.
#[derive(Debug)]
pub struct Entry {
    pub index: u16,
    pub name: &'static str,
    pub object: OdObject,
    pub extension: RefCell<ExtensionSlot>,
}

impl Entry {
    pub fn variable(index: u16, name: &'static str, var: VarDescriptor) -> Entry {
        Entry {
            index,
            name,
            object: OdObject::Var(var),
            extension: RefCell::new(ExtensionSlot::NotExtended),
        }
    }

    pub fn variable_extended(index: u16, name: &'static str, var: VarDescriptor) -> Entry {
        Entry {
            index,
            name,
            object: OdObject::Var(var),
            extension: RefCell::new(ExtensionSlot::Missing),
        }
    }

    pub fn array(index: u16, name: &'static str, array: ArrayDescriptor) -> Entry {
        Entry {
            index,
            name,
            object: OdObject::Array(array),
            extension: RefCell::new(ExtensionSlot::NotExtended),
        }
    }

    pub fn array_extended(index: u16, name: &'static str, array: ArrayDescriptor) -> Entry {
        Entry {
            index,
            name,
            object: OdObject::Array(array),
            extension: RefCell::new(ExtensionSlot::Missing),
        }
    }

    pub fn record(index: u16, name: &'static str, record: RecordDescriptor) -> Entry {
        Entry {
            index,
            name,
            object: OdObject::Record(record),
            extension: RefCell::new(ExtensionSlot::NotExtended),
        }
    }

    /// Number of addressable sub-indices, sub-index 0 included for ARRAY.
    pub fn sub_entries_count(&self) -> u8 {
        match &self.object {
            OdObject::Var(_) => 1,
            OdObject::Array(a) => a.count + 1,
            OdObject::Record(r) => r.fields.len() as u8,
        }
    }
}
