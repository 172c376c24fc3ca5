//! Central repository for standard Object Dictionary indices and sub-indices
//! relevant to the error register and Emergency subsystem (CiA-301, 7.5.2
//! and 7.2.7), using a consistent `IDX_`/`SUBIDX_` naming convention.

// --- 0x1000 - 0x1FFF: Communication Profile Area ---

pub const IDX_DEVICE_TYPE_U32: u16 = 0x1000;

/// Error register (§4.8 Step B / §6): u8, SDO-R, recomputed every `process`.
pub const IDX_ERROR_REGISTER_U8: u16 = 0x1001;

/// Predefined error field (§4.11 / §6): ARRAY of u32 history, sub-0 = count.
pub const IDX_PREDEFINED_ERROR_FIELD_ARR: u16 = 0x1003;

pub const IDX_STORE_PARAMETERS_REC: u16 = 0x1010;
pub const IDX_RESTORE_DEFAULT_PARAMETERS_REC: u16 = 0x1011;

/// COB-ID EMCY (§4.10 / §6): u32, bit31 = disabled, bits 10..0 = CAN-ID.
pub const IDX_COB_ID_EMCY_U32: u16 = 0x1014;

/// Inhibit time EMCY (§4.8 Step C / §6): u16, units of 100 µs.
pub const IDX_INHIBIT_TIME_EMCY_U16: u16 = 0x1015;

pub const IDX_IDENTITY_OBJECT_REC: u16 = 0x1018;

pub const SUBIDX_STORE_PARAM_SAVE_ALL: u8 = 1;
pub const SUBIDX_RESTORE_PARAM_RESTORE_ALL: u8 = 1;

pub const SUBIDX_PREDEFINED_ERROR_FIELD_COUNT: u8 = 0;

pub const SUBIDX_IDENTITY_VENDOR_ID: u8 = 1;
pub const SUBIDX_IDENTITY_PRODUCT_CODE: u8 = 2;
pub const SUBIDX_IDENTITY_REVISION_NUMBER: u8 = 3;
pub const SUBIDX_IDENTITY_SERIAL_NUMBER: u8 = 4;

/// Conventional manufacturer-range placeholder for the vendor `statusBits`
/// object (§6). The real index is supplied by the caller at construction
/// time, mirroring how the originating implementation takes the entry as a
/// parameter rather than a fixed constant.
pub const IDX_ERROR_STATUS_BITS_VENDOR_DEFAULT: u16 = 0x2000;
