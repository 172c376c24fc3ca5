//! The Object Dictionary runtime: catalog, entry resolution, stream I/O and
//! typed accessors (§3, §4.1–§4.6).

pub mod constants;
pub mod entry;
pub mod stream;

use alloc::vec::Vec;

use crate::error::{OdAccess, OdError};
use crate::lock::OdLock;
use crate::log::{od_debug, od_trace};
use entry::{ArrayDescriptor, Entry, ExtensionSlot, OdExtension, OdObject};
use stream::{default_read_original, default_write_original, read_disabled, write_disabled, IoHandler, OdStream};

/// Sorted, read-only catalog of entries keyed by 16-bit index (§4.1).
/// Construction sorts and validates the strict-increasing-index invariant;
/// after that the catalog never mutates its own entry list.
pub struct ObjectDictionary {
    entries: Vec<Entry>,
}

impl ObjectDictionary {
    /// Builds a catalog from an unsorted entry list, sorting by index and
    /// panicking on duplicate indices (a build-time programmer error, not a
    /// runtime condition — there is no dynamic OD layout, per the Non-goals).
    pub fn new(mut entries: Vec<Entry>) -> Self {
        entries.sort_by_key(|e| e.index);
        for pair in entries.windows(2) {
            assert!(
                pair[0].index < pair[1].index,
                "duplicate Object Dictionary index {:#06x}",
                pair[0].index
            );
        }
        ObjectDictionary { entries }
    }

    /// Binary search for the entry with this index (§4.1). Pure, lock-free,
    /// allocation-free; callable from any context including an ISR.
    pub fn find(&self, index: u16) -> Option<&Entry> {
        let found = self
            .entries
            .binary_search_by_key(&index, |e| e.index)
            .ok()
            .map(|i| &self.entries[i]);
        if found.is_some() {
            od_trace!("OD find({:#06x}) resolved", index);
        }
        found
    }

    /// Resolves `(entry, sub_index)` to a stream cursor and an I/O handler
    /// (§4.2). `od_orig = true` bypasses any installed extension and always
    /// uses the default raw-memory I/O, as required by e.g. the default
    /// write implementation used from inside an extension's own `write`.
    pub fn get_sub<'e>(
        &self,
        entry: &'e Entry,
        sub_index: u8,
        od_orig: bool,
    ) -> Result<(OdStream<'e>, IoHandler<'e>), OdError> {
        // Extension-missing is checked before any sub-index work, matching
        // `OD_getSub`'s ordering: a tagged-extended entry with no installed
        // extension fails `DEV_INCOMPAT` even for an otherwise-invalid
        // sub-index.
        let handler = match &*entry.extension.borrow() {
            ExtensionSlot::Missing => return Err(OdError::DeviceIncompatible),
            ExtensionSlot::NotExtended => IoHandler::Default,
            ExtensionSlot::Present(_) if od_orig => IoHandler::Default,
            ExtensionSlot::Present(ext) => {
                // The extension's storage address is stable because `entry`
                // (owner of the `RefCell`) lives inside the catalog's `Vec`,
                // which never reallocates or mutates after construction.
                let ext: &'e dyn OdExtension = unsafe { extend_extension_lifetime(ext.as_ref()) };
                IoHandler::Extension(ext)
            }
        };

        let mut stream = match &entry.object {
            OdObject::Var(var) => {
                if sub_index != 0 {
                    return Err(OdError::SubNotExist);
                }
                OdStream::new(Some(&var.storage), 0, var.len(), var.attr)
            }
            OdObject::Array(array) => resolve_array_sub(array, sub_index)?,
            OdObject::Record(record) => {
                let field = record
                    .fields
                    .iter()
                    .find(|f| f.sub_index == sub_index)
                    .ok_or(OdError::SubNotExist)?;
                OdStream::new(Some(&field.var.storage), 0, field.var.len(), field.var.attr)
            }
        };
        stream.restart();

        Ok((stream, handler))
    }

    /// Installs (or replaces) an application-supplied read/write override on
    /// an entry tagged extended (§4.4). Fails `ParameterIncompatible` on an
    /// entry that was never tagged extended.
    pub fn extension_io_init(
        &self,
        entry: &Entry,
        extension: alloc::boxed::Box<dyn OdExtension>,
    ) -> Result<(), OdError> {
        let mut slot = entry.extension.borrow_mut();
        match &*slot {
            ExtensionSlot::NotExtended => Err(OdError::ParameterIncompatible),
            ExtensionSlot::Missing | ExtensionSlot::Present(_) => {
                *slot = ExtensionSlot::Present(extension);
                Ok(())
            }
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

/// `ExtensionSlot::Present` is only reachable while `entry` (and hence the
/// `RefCell` it owns) outlives the borrow handed back here; the `RefCell`
/// itself never moves once its owning `Entry` is placed in the catalog
/// `Vec`, and the catalog is never mutated after construction.
unsafe fn extend_extension_lifetime<'e>(ext: &dyn OdExtension) -> &'e dyn OdExtension {
    core::mem::transmute(ext)
}

fn resolve_array_sub<'e>(array: &'e ArrayDescriptor, sub_index: u8) -> Result<OdStream<'e>, OdError> {
    if sub_index >= array.count + 1 {
        return Err(OdError::SubNotExist);
    }
    if sub_index == 0 {
        // Length byte: reported as a read-only single byte holding `count`.
        // Modeled as an unbacked cell rather than aliasing `elements`, since
        // it has no physical location in the contiguous element buffer.
        return Ok(OdStream::new(None, 0, 1, array.attr));
    }
    let element_index = (sub_index - 1) as usize;
    let offset = element_index * array.element_len;
    Ok(OdStream::new(
        Some(&array.elements),
        offset,
        array.element_len,
        array.attr,
    ))
}

/// Dispatches a read through the resolved I/O handler (§4.2/§4.3).
pub fn od_read<L: OdLock>(
    stream: &mut OdStream<'_>,
    handler: &IoHandler<'_>,
    buf: &mut [u8],
    lock: &L,
) -> Result<(OdAccess, usize), OdError> {
    if !stream.attr.readable() {
        return Err(OdError::WriteOnly);
    }
    match handler {
        IoHandler::Default => default_read_original(stream, buf, lock),
        IoHandler::Disabled => read_disabled(stream, buf),
        IoHandler::Extension(ext) => ext.read(stream, buf),
    }
}

/// Dispatches a write through the resolved I/O handler (§4.2/§4.3).
pub fn od_write<L: OdLock>(
    stream: &mut OdStream<'_>,
    handler: &IoHandler<'_>,
    buf: &[u8],
    lock: &L,
) -> Result<(OdAccess, usize), OdError> {
    if !stream.attr.writable() {
        od_debug!("OD write rejected: read-only, {} bytes supplied", buf.len());
        return Err(OdError::ReadOnly);
    }
    let result = match handler {
        IoHandler::Default => default_write_original(stream, buf, lock),
        IoHandler::Disabled => write_disabled(stream, buf),
        IoHandler::Extension(ext) => ext.write(stream, buf),
    };
    if let Err(e) = result {
        od_debug!("OD write rejected: {}, {} bytes supplied", e, buf.len());
    }
    result
}

/// Typed read built over stream I/O (§4.5): performs exactly one read, and
/// requires the resolved cell's length to match `out.len()` exactly.
pub fn get_value<L: OdLock>(
    od: &ObjectDictionary,
    index: u16,
    sub_index: u8,
    out: &mut [u8],
    od_orig: bool,
    lock: &L,
) -> Result<(), OdError> {
    let entry = od.find(index).ok_or(OdError::IndexNotExist)?;
    let (mut stream, handler) = od.get_sub(entry, sub_index, od_orig)?;
    if stream.data.is_none() {
        return Err(OdError::DeviceIncompatible);
    }
    if stream.data_length != out.len() {
        return Err(OdError::TypeMismatch);
    }
    od_read(&mut stream, &handler, out, lock)?;
    Ok(())
}

/// Typed write, symmetric to [`get_value`] (§4.5).
pub fn set_value<L: OdLock>(
    od: &ObjectDictionary,
    index: u16,
    sub_index: u8,
    value: &[u8],
    od_orig: bool,
    lock: &L,
) -> Result<(), OdError> {
    let entry = od.find(index).ok_or(OdError::IndexNotExist)?;
    let (mut stream, handler) = od.get_sub(entry, sub_index, od_orig)?;
    if stream.data.is_none() {
        return Err(OdError::DeviceIncompatible);
    }
    if stream.data_length != value.len() {
        return Err(OdError::TypeMismatch);
    }
    od_write(&mut stream, &handler, value, lock)?;
    Ok(())
}

/// Raw data length for the resolved sub-index; only meaningful for entries
/// backed by original OD storage (§4.5).
pub fn get_ptr_len(od: &ObjectDictionary, index: u16, sub_index: u8) -> Result<usize, OdError> {
    let entry = od.find(index).ok_or(OdError::IndexNotExist)?;
    let (stream, _) = od.get_sub(entry, sub_index, true)?;
    Ok(stream.data_length)
}
