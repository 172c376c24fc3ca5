//! Emergency subsystem aggregate: the error-status bitmap, the pending/
//! history FIFO, the inhibit-timed producer, consumer dispatch, and the OD
//! 0x1001 / 0x1003 / 0x1014 / 0x1015 and vendor statusBits extensions
//! (§3, §4.7–§4.11).
//!
//! Shared mutable state lives behind `Rc<Shared<L>>` rather than inside
//! `EmergencyManager` itself: the OD extensions installed via
//! `extension_io_init` are `Box<dyn OdExtension>` (implicitly `'static`), so
//! they cannot borrow the manager — they clone the `Rc` instead.

pub mod bitmap;
pub mod can;
pub mod codes;
pub mod fifo;
pub mod frame;

use core::cell::{Cell, RefCell};

use alloc::boxed::Box;
use alloc::rc::Rc;

use crate::emcy::bitmap::ErrorStatusBitmap;
use crate::emcy::can::{BusErrorBit, CanBusErrorStatus, EmcyTxSlot, NmtState};
use crate::emcy::fifo::{EmergencyFifo, FifoSlot, Overflow};
use crate::emcy::frame::EmcyFields;
use crate::error::{OdAccess, OdError};
use crate::lock::{EmcyLock, NoOpLock};
use crate::log::{od_debug, od_info, od_warn};
use crate::od::entry::OdExtension;
use crate::od::stream::{default_read_original, default_write_original, OdStream};
use crate::types::{ValidNodeId, C_EMCY_COBID_BASE};

/// Reserved bits 30..11 of OD 0x1014 (§4.10, §6).
const RESERVED_MASK_COB_ID: u32 = 0x7FFF_F800;
/// Bit 31 of OD 0x1014: producer disabled when set.
const DISABLED_BIT_COB_ID: u32 = 0x8000_0000;

/// Init-time configuration consumed by [`EmergencyManager::new`] (§6, §10.3).
#[derive(Debug, Clone, Copy)]
pub struct EmergencyConfig {
    pub node_id: ValidNodeId,
    /// `EM_BUFFER_SIZE`, CAP ∈ [1, 254] (§6).
    pub buffer_size: u8,
    /// `EM_ERR_STATUS_BITS_COUNT` ∈ [48, 256], divisible by 8 (§6).
    pub status_bits_count: usize,
    /// Initial inhibit time in units of 100 µs, persisted at OD 0x1015 (§6).
    pub inhibit_time_100us: u16,
}

/// One of the condition categories the global error register is recomputed
/// from each `process` tick (§3, §4.8 step B), mapped onto the CiA-301
/// error-register bit positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionFlag {
    Generic,
    Current,
    Voltage,
    Temperature,
    Communication,
    DeviceProfile,
    Manufacturer,
}

impl ConditionFlag {
    fn bit(self) -> u8 {
        match self {
            ConditionFlag::Generic => 0,
            ConditionFlag::Current => 1,
            ConditionFlag::Voltage => 2,
            ConditionFlag::Temperature => 3,
            ConditionFlag::Communication => 4,
            ConditionFlag::DeviceProfile => 5,
            ConditionFlag::Manufacturer => 7,
        }
    }
}

/// Producer state (§3): enablement, effective CAN-ID, and inhibit timing.
#[derive(Debug, Clone, Copy)]
struct ProducerState {
    #[cfg(feature = "producer")]
    enabled: bool,
    #[cfg(feature = "producer")]
    can_id: u16,
    #[cfg(feature = "producer")]
    inhibit_time_us: u32,
    #[cfg(feature = "producer")]
    inhibit_timer_us: u32,
}

type ConsumerCallback = dyn FnMut(u16, u16, u8, u8, u32);

struct Shared<L: EmcyLock> {
    lock: L,
    node_id: u8,
    bitmap: RefCell<ErrorStatusBitmap>,
    fifo: RefCell<EmergencyFifo>,
    producer: RefCell<ProducerState>,
    error_register: Cell<u8>,
    condition_flags: Cell<u8>,
    prev_bus_status: Cell<u16>,
    consumer_callback: RefCell<Option<Box<ConsumerCallback>>>,
    pre_process_signal: RefCell<Option<Box<dyn Fn()>>>,
    tx_reconfigure: RefCell<Option<Box<dyn FnMut(u16)>>>,
}

/// The Emergency producer/consumer aggregate, generic over the platform's
/// critical-section adapter (§5, §9).
pub struct EmergencyManager<L: EmcyLock> {
    shared: Rc<Shared<L>>,
}

impl<L: EmcyLock> Clone for EmergencyManager<L> {
    fn clone(&self) -> Self {
        EmergencyManager {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<L: EmcyLock + 'static> EmergencyManager<L> {
    pub fn new(config: EmergencyConfig, lock: L) -> Self {
        #[cfg(feature = "producer")]
        let default_can_id = C_EMCY_COBID_BASE + config.node_id.get() as u16;
        let shared = Rc::new(Shared {
            lock,
            node_id: config.node_id.get(),
            bitmap: RefCell::new(ErrorStatusBitmap::new(config.status_bits_count)),
            fifo: RefCell::new(EmergencyFifo::new(config.buffer_size)),
            producer: RefCell::new(ProducerState {
                #[cfg(feature = "producer")]
                enabled: true,
                #[cfg(feature = "producer")]
                can_id: default_can_id,
                #[cfg(feature = "producer")]
                inhibit_time_us: config.inhibit_time_100us as u32 * 100,
                #[cfg(feature = "producer")]
                inhibit_timer_us: 0,
            }),
            error_register: Cell::new(0),
            condition_flags: Cell::new(0),
            prev_bus_status: Cell::new(0),
            consumer_callback: RefCell::new(None),
            pre_process_signal: RefCell::new(None),
            tx_reconfigure: RefCell::new(None),
        });
        od_info!(
            "emergency manager configured: buffer_size={}, status_bits_count={}",
            config.buffer_size,
            config.status_bits_count
        );
        EmergencyManager { shared }
    }

    /// Raises or clears one error-status bit (§4.7). Callable from interrupt
    /// context; idempotent when `set` matches the bit's current state.
    pub fn report_error(&self, bit: u16, set: bool, error_code: u16, info_code: u32) {
        Self::report_error_on(&self.shared, bit, set, error_code, info_code);
    }

    fn report_error_on(shared: &Rc<Shared<L>>, bit: u16, set: bool, error_code: u16, info_code: u32) {
        let overflowed = shared.lock.locked(|| {
            let mut bitmap = shared.bitmap.borrow_mut();
            let (bit, error_code, info_code) = if bitmap.in_range(bit) {
                (bit, error_code, info_code)
            } else {
                (codes::BIT_WRONG_ERROR_REPORT, codes::SOFTWARE_INTERNAL, bit as u32)
            };
            let error_code = if set { error_code } else { codes::NO_ERROR };

            if !bitmap.set(bit, set) {
                return None;
            }
            let msg = (error_code as u32) | ((bit as u8 as u32) << 24);
            let slot = FifoSlot { msg, info: info_code };
            let mut fifo = shared.fifo.borrow_mut();
            Some(!fifo.push(slot))
        });

        match overflowed {
            None => return,
            Some(true) => od_warn!("emergency FIFO overflow raising bit {}", bit),
            Some(false) => {}
        }

        #[cfg(feature = "callback-pre")]
        {
            // Gated on producer enablement only when a producer exists to be
            // enabled; without one compiled in there's nothing to gate on.
            #[cfg(feature = "producer")]
            let should_signal = shared.producer.borrow().enabled;
            #[cfg(not(feature = "producer"))]
            let should_signal = true;

            if should_signal {
                if let Some(signal) = shared.pre_process_signal.borrow().as_ref() {
                    signal();
                }
            }
        }
    }

    /// Sets or clears one of the application condition flags the error
    /// register is recomputed from at the next `process` (§3, §4.8 step B).
    pub fn set_condition(&self, flag: ConditionFlag, value: bool) {
        let mut flags = self.shared.condition_flags.get();
        if value {
            flags |= 1 << flag.bit();
        } else {
            flags &= !(1 << flag.bit());
        }
        self.shared.condition_flags.set(flags);
    }

    /// Current value published (read-only) at OD 0x1001.
    pub fn error_register(&self) -> u8 {
        self.shared.error_register.get()
    }

    fn recompute_error_register(&self) {
        self.shared.error_register.set(self.shared.condition_flags.get());
    }

    pub fn set_consumer_callback(&self, cb: Box<ConsumerCallback>) {
        *self.shared.consumer_callback.borrow_mut() = Some(cb);
    }

    #[cfg(feature = "callback-pre")]
    pub fn set_pre_process_signal(&self, f: Box<dyn Fn()>) {
        *self.shared.pre_process_signal.borrow_mut() = Some(f);
    }

    #[cfg(feature = "producer")]
    pub fn set_tx_reconfigure(&self, hook: Box<dyn FnMut(u16)>) {
        *self.shared.tx_reconfigure.borrow_mut() = Some(hook);
    }

    /// Step A of `process`: polls the CAN driver's bus-error status word and
    /// reports edges against the previous snapshot (§4.8).
    fn monitor_bus_errors(&self, bus: &dyn CanBusErrorStatus, bus_bits: &[BusErrorBit]) {
        let status = bus.read();
        let prev = self.shared.prev_bus_status.get();
        let edges = status ^ prev;
        self.shared.prev_bus_status.set(status);
        for b in bus_bits {
            if edges & b.bit != 0 {
                let now_set = status & b.bit != 0;
                self.report_error(b.report_bit, now_set, b.error_code, 0);
            }
        }
        self.set_condition(ConditionFlag::Communication, status != 0);
    }

    /// Cooperative `process` tick with the transmit-capable producer path
    /// compiled in (§4.8 steps A–C).
    #[cfg(feature = "producer")]
    #[allow(clippy::too_many_arguments)]
    pub fn process(
        &self,
        bus: &dyn CanBusErrorStatus,
        bus_bits: &[BusErrorBit],
        nmt: NmtState,
        tx_slot: &mut dyn EmcyTxSlot,
        time_delta_us: u32,
        mut timer_next_us: Option<&mut u32>,
    ) {
        self.monitor_bus_errors(bus, bus_bits);
        self.recompute_error_register();

        let (enabled, inhibit_time_us, inhibit_timer_us, not_full) = {
            let mut producer = self.shared.producer.borrow_mut();
            producer.inhibit_timer_us =
                (producer.inhibit_timer_us + time_delta_us).min(producer.inhibit_time_us);
            (
                producer.enabled,
                producer.inhibit_time_us,
                producer.inhibit_timer_us,
                !tx_slot.is_full(),
            )
        };
        if !enabled {
            return;
        }

        let ready = !self.shared.fifo.borrow().is_empty() && inhibit_timer_us >= inhibit_time_us && not_full;
        if ready {
            self.shared.producer.borrow_mut().inhibit_timer_us = 0;

            let register = self.shared.error_register.get();
            self.shared.fifo.borrow_mut().or_register_into_front(register);
            let front = self.shared.fifo.borrow().peek_front();

            if let Some(slot) = front {
                let fields = EmcyFields {
                    error_code: (slot.msg & 0xFFFF) as u16,
                    error_register: ((slot.msg >> 16) & 0xFF) as u8,
                    error_bit: ((slot.msg >> 24) & 0xFF) as u8,
                    info_code: slot.info,
                };
                if nmt.may_transmit() {
                    tx_slot.send(fields.encode());
                }
                if let Some(cb) = self.shared.consumer_callback.borrow_mut().as_mut() {
                    cb(0, fields.error_code, fields.error_register, fields.error_bit, fields.info_code);
                }
            }
            self.shared.fifo.borrow_mut().advance_pop();

            let overflow = self.shared.lock.locked(|| self.shared.fifo.borrow().overflow());
            match overflow {
                Overflow::JustOverflowed => {
                    self.shared.lock.locked(|| self.shared.fifo.borrow_mut().mark_overflow_annotated());
                    self.report_error(codes::BIT_EMERGENCY_BUFFER_FULL, true, codes::GENERIC, 0);
                }
                Overflow::Annotated if self.shared.fifo.borrow().is_empty() => {
                    self.shared.lock.locked(|| self.shared.fifo.borrow_mut().mark_overflow_recovered());
                    self.report_error(codes::BIT_EMERGENCY_BUFFER_FULL, false, codes::NO_ERROR, 0);
                }
                _ => {}
            }
        } else if let Some(t) = timer_next_us.as_deref_mut() {
            if inhibit_timer_us < inhibit_time_us {
                *t = (*t).min(inhibit_time_us - inhibit_timer_us);
            }
        }
    }

    /// Non-transmitting `process` tick used when the producer is not
    /// compiled in but history is: the error register is still recomputed
    /// and OR'd into every pending slot for later SDO read-back, but neither
    /// FIFO pointer advances (§4.8 last paragraph, §9 resolved open question).
    #[cfg(all(feature = "history", not(feature = "producer")))]
    pub fn process(&self, bus: &dyn CanBusErrorStatus, bus_bits: &[BusErrorBit]) {
        self.monitor_bus_errors(bus, bus_bits);
        self.recompute_error_register();
        let register = self.shared.error_register.get();
        self.shared.fifo.borrow_mut().or_register_into_all_pending(register);
    }

    /// Receive dispatch for an Emergency frame (§4.9). Frames on the SYNC
    /// CAN-ID are ignored; everything else is decoded and handed to the
    /// consumer callback along with the raw, unmasked arbitration ID —
    /// a producer's COB-ID need not collapse to its node ID once
    /// reconfigured via OD 0x1014 (§4.10), so narrowing it here would
    /// silently collide distinct producers.
    #[cfg(feature = "consumer")]
    pub fn on_receive(&self, can_id: u16, frame: [u8; 8]) {
        if can_id == crate::types::C_SYNC_COBID {
            return;
        }
        let fields = EmcyFields::decode(frame);
        if let Some(cb) = self.shared.consumer_callback.borrow_mut().as_mut() {
            cb(can_id, fields.error_code, fields.error_register, fields.error_bit, fields.info_code);
        }
    }

    /// Read-only OD 0x1001 extension (§4.8 step B, §6).
    pub fn error_register_extension(&self) -> Box<dyn OdExtension> {
        Box::new(ErrorRegisterExtension {
            shared: Rc::clone(&self.shared),
        })
    }

    /// OD 0x1014 COB-ID reconfiguration extension (§4.10).
    #[cfg(feature = "producer")]
    pub fn cob_id_emcy_extension(&self) -> Box<dyn OdExtension> {
        Box::new(CobIdEmcyExtension {
            shared: Rc::clone(&self.shared),
        })
    }

    /// OD 0x1015 inhibit-time extension (§4.8 step C, §6).
    #[cfg(feature = "producer")]
    pub fn inhibit_time_extension(&self) -> Box<dyn OdExtension> {
        Box::new(InhibitTimeExtension {
            shared: Rc::clone(&self.shared),
        })
    }

    /// OD 0x1003 predefined error field (history) extension (§4.11).
    #[cfg(feature = "history")]
    pub fn predefined_error_field_extension(&self) -> Box<dyn OdExtension> {
        Box::new(PredefinedErrorFieldExtension {
            shared: Rc::clone(&self.shared),
        })
    }

    /// Vendor statusBits extension mirroring the internal bitmap (§6).
    #[cfg(feature = "status-bits")]
    pub fn status_bits_extension(&self) -> Box<dyn OdExtension> {
        Box::new(StatusBitsExtension {
            shared: Rc::clone(&self.shared),
        })
    }
}

struct ErrorRegisterExtension<L: EmcyLock> {
    shared: Rc<Shared<L>>,
}

impl<L: EmcyLock + 'static> OdExtension for ErrorRegisterExtension<L> {
    fn read(&self, _stream: &mut OdStream<'_>, buf: &mut [u8]) -> Result<(OdAccess, usize), OdError> {
        if buf.len() != 1 {
            return Err(OdError::TypeMismatch);
        }
        buf[0] = self.shared.error_register.get();
        Ok((OdAccess::Complete, 1))
    }

    fn write(&self, _stream: &mut OdStream<'_>, _buf: &[u8]) -> Result<(OdAccess, usize), OdError> {
        Err(OdError::ReadOnly)
    }
}

#[cfg(feature = "producer")]
struct CobIdEmcyExtension<L: EmcyLock> {
    shared: Rc<Shared<L>>,
}

#[cfg(feature = "producer")]
impl<L: EmcyLock + 'static> OdExtension for CobIdEmcyExtension<L> {
    fn read(&self, stream: &mut OdStream<'_>, buf: &mut [u8]) -> Result<(OdAccess, usize), OdError> {
        default_read_original(stream, buf, &NoOpLock)
    }

    fn write(&self, stream: &mut OdStream<'_>, buf: &[u8]) -> Result<(OdAccess, usize), OdError> {
        if buf.len() != 4 {
            return Err(OdError::TypeMismatch);
        }
        let value = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);

        let result = self.shared.lock.locked(|| {
            if value & RESERVED_MASK_COB_ID != 0 {
                return Err(OdError::InvalidValue);
            }
            let new_can_id = (value & 0x7FF) as u16;
            let new_enabled = value & DISABLED_BIT_COB_ID == 0 && new_can_id != 0;

            let mut producer = self.shared.producer.borrow_mut();
            if producer.enabled && new_enabled && new_can_id != producer.can_id {
                return Err(OdError::InvalidValue);
            }
            producer.enabled = new_enabled;
            producer.can_id = new_can_id;
            Ok(new_enabled.then_some(new_can_id))
        });

        let reconfigure_id = match result {
            Ok(id) => id,
            Err(e) => {
                od_debug!("OD 0x1014 write rejected, value={:#010x}", value);
                return Err(e);
            }
        };
        if let Some(can_id) = reconfigure_id {
            if let Some(hook) = self.shared.tx_reconfigure.borrow_mut().as_mut() {
                hook(can_id);
            }
        }

        let default_can_id = C_EMCY_COBID_BASE + self.shared.node_id as u16;
        let new_can_id = (value & 0x7FF) as u16;
        let persisted_id: u32 = if new_can_id == default_can_id { C_EMCY_COBID_BASE as u32 } else { new_can_id as u32 };
        let persisted = persisted_id | (value & DISABLED_BIT_COB_ID);
        default_write_original(stream, &persisted.to_le_bytes(), &NoOpLock)
    }
}

#[cfg(feature = "producer")]
struct InhibitTimeExtension<L: EmcyLock> {
    shared: Rc<Shared<L>>,
}

#[cfg(feature = "producer")]
impl<L: EmcyLock + 'static> OdExtension for InhibitTimeExtension<L> {
    fn read(&self, stream: &mut OdStream<'_>, buf: &mut [u8]) -> Result<(OdAccess, usize), OdError> {
        default_read_original(stream, buf, &NoOpLock)
    }

    fn write(&self, stream: &mut OdStream<'_>, buf: &[u8]) -> Result<(OdAccess, usize), OdError> {
        if buf.len() != 2 {
            return Err(OdError::TypeMismatch);
        }
        let value = u16::from_le_bytes([buf[0], buf[1]]);
        self.shared.lock.locked(|| {
            let mut producer = self.shared.producer.borrow_mut();
            producer.inhibit_time_us = value as u32 * 100;
            producer.inhibit_timer_us = 0;
        });
        default_write_original(stream, buf, &NoOpLock)
    }
}

#[cfg(feature = "history")]
struct PredefinedErrorFieldExtension<L: EmcyLock> {
    shared: Rc<Shared<L>>,
}

#[cfg(feature = "history")]
impl<L: EmcyLock + 'static> OdExtension for PredefinedErrorFieldExtension<L> {
    fn read(&self, stream: &mut OdStream<'_>, buf: &mut [u8]) -> Result<(OdAccess, usize), OdError> {
        if stream.data.is_none() {
            if buf.len() != 1 {
                return Err(OdError::TypeMismatch);
            }
            buf[0] = self.shared.fifo.borrow().count();
            return Ok((OdAccess::Complete, 1));
        }
        if buf.len() != 4 {
            return Err(OdError::TypeMismatch);
        }
        let k = (stream.window_offset / 4 + 1) as u8;
        let msg = self.shared.fifo.borrow().history_msg(k).ok_or(OdError::NoData)?;
        buf.copy_from_slice(&msg.to_le_bytes());
        Ok((OdAccess::Complete, 4))
    }

    fn write(&self, stream: &mut OdStream<'_>, buf: &[u8]) -> Result<(OdAccess, usize), OdError> {
        if stream.data.is_some() {
            return Err(OdError::ReadOnly);
        }
        if buf.len() != 1 {
            return Err(OdError::TypeMismatch);
        }
        if buf[0] != 0 {
            return Err(OdError::InvalidValue);
        }
        self.shared.fifo.borrow_mut().clear_history_count();
        Ok((OdAccess::Complete, 1))
    }
}

#[cfg(feature = "status-bits")]
struct StatusBitsExtension<L: EmcyLock> {
    shared: Rc<Shared<L>>,
}

#[cfg(feature = "status-bits")]
impl<L: EmcyLock + 'static> OdExtension for StatusBitsExtension<L> {
    fn read(&self, stream: &mut OdStream<'_>, buf: &mut [u8]) -> Result<(OdAccess, usize), OdError> {
        if let Some(cell) = stream.data {
            let bitmap = self.shared.bitmap.borrow();
            cell.borrow_mut()[..bitmap.byte_width()].copy_from_slice(bitmap.as_bytes());
        }
        default_read_original(stream, buf, &NoOpLock)
    }

    fn write(&self, _stream: &mut OdStream<'_>, _buf: &[u8]) -> Result<(OdAccess, usize), OdError> {
        Err(OdError::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::NoOpLock;
    use alloc::vec::Vec;

    struct MockBus {
        status: Cell<u16>,
    }
    impl CanBusErrorStatus for MockBus {
        fn read(&self) -> u16 {
            self.status.get()
        }
    }

    struct MockTxSlot {
        sent: RefCell<Vec<[u8; 8]>>,
        can_id: Cell<u16>,
    }
    impl EmcyTxSlot for MockTxSlot {
        fn set_can_id(&mut self, can_id: u16) {
            self.can_id.set(can_id);
        }
        fn is_full(&self) -> bool {
            false
        }
        fn send(&mut self, data: [u8; 8]) {
            self.sent.borrow_mut().push(data);
        }
    }

    fn config(node_id: u8, buffer_size: u8) -> EmergencyConfig {
        EmergencyConfig {
            node_id: ValidNodeId::try_from(node_id).unwrap(),
            buffer_size,
            status_bits_count: 48,
            inhibit_time_100us: 0,
        }
    }

    #[test]
    fn emergency_edge_matches_literal_scenario() {
        let mgr = EmergencyManager::new(config(5, 6), NoOpLock);
        mgr.report_error(0x11, true, 0x5000, 0xDEAD_BEEF);
        mgr.set_condition(ConditionFlag::Generic, true);

        let bus = MockBus { status: Cell::new(0) };
        let mut tx = MockTxSlot { sent: RefCell::new(Vec::new()), can_id: Cell::new(0) };
        mgr.process(&bus, &[], NmtState::Operational, &mut tx, 0, None);

        let sent = tx.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], [0x00, 0x50, 0x01, 0x11, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn overflow_recovery_matches_literal_scenario() {
        let mgr = EmergencyManager::new(config(1, 2), NoOpLock);
        mgr.report_error(0, true, codes::GENERIC, 0);
        mgr.report_error(1, true, codes::GENERIC, 0);
        mgr.report_error(2, true, codes::GENERIC, 0); // buffer full, dropped

        let bus = MockBus { status: Cell::new(0) };
        let mut tx = MockTxSlot { sent: RefCell::new(Vec::new()), can_id: Cell::new(0) };

        // drain bit 0: overflow JustOverflowed -> Annotated, queues BUFFER_FULL(set)
        mgr.process(&bus, &[], NmtState::Operational, &mut tx, 0, None);
        // drain bit 1
        mgr.process(&bus, &[], NmtState::Operational, &mut tx, 0, None);
        // drain BUFFER_FULL(set) -> ring empties -> Annotated -> Normal, queues BUFFER_FULL(clear)
        mgr.process(&bus, &[], NmtState::Operational, &mut tx, 0, None);
        // drain BUFFER_FULL(clear)
        mgr.process(&bus, &[], NmtState::Operational, &mut tx, 0, None);

        let sent = tx.sent.borrow();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[2][3], codes::BIT_EMERGENCY_BUFFER_FULL as u8);
        assert_eq!(u16::from_le_bytes([sent[2][0], sent[2][1]]), codes::GENERIC);
        assert_eq!(sent[3][3], codes::BIT_EMERGENCY_BUFFER_FULL as u8);
        assert_eq!(u16::from_le_bytes([sent[3][0], sent[3][1]]), codes::NO_ERROR);
    }

    #[test]
    fn self_reflection_invokes_consumer_callback_on_transmit() {
        let mgr = EmergencyManager::new(config(2, 4), NoOpLock);
        let seen: Rc<RefCell<Option<(u16, u16, u8, u8, u32)>>> = Rc::new(RefCell::new(None));
        let seen2 = Rc::clone(&seen);
        mgr.set_consumer_callback(Box::new(move |ident, code, reg, bit, info| {
            *seen2.borrow_mut() = Some((ident, code, reg, bit, info));
        }));
        mgr.report_error(3, true, codes::VOLTAGE, 7);

        let bus = MockBus { status: Cell::new(0) };
        let mut tx = MockTxSlot { sent: RefCell::new(Vec::new()), can_id: Cell::new(0) };
        mgr.process(&bus, &[], NmtState::Operational, &mut tx, 0, None);

        let (ident, code, _reg, bit, info) = seen.borrow().unwrap();
        assert_eq!(ident, 0, "producer reflects its own emergencies with ident 0");
        assert_eq!(code, codes::VOLTAGE);
        assert_eq!(bit, 3);
        assert_eq!(info, 7);
    }

    #[cfg(feature = "consumer")]
    #[test]
    fn on_receive_passes_the_raw_can_id_through_unmasked() {
        let mgr = EmergencyManager::new(config(5, 4), NoOpLock);
        let seen: Rc<RefCell<Option<(u16, u16, u8, u8, u32)>>> = Rc::new(RefCell::new(None));
        let seen2 = Rc::clone(&seen);
        mgr.set_consumer_callback(Box::new(move |ident, code, reg, bit, info| {
            *seen2.borrow_mut() = Some((ident, code, reg, bit, info));
        }));

        // A producer reconfigured per §4.10 to a COB-ID well outside the
        // default 0x80+nodeId pattern; masking to 7 bits would collide this
        // with an unrelated node's default ID.
        let frame = EmcyFields { error_code: codes::GENERIC, error_register: 0x01, error_bit: 2, info_code: 0 }.encode();
        mgr.on_receive(0x300, frame);

        let (ident, code, ..) = seen.borrow().unwrap();
        assert_eq!(ident, 0x300, "the arbitration ID must reach the callback unmasked and unnarrowed");
        assert_eq!(code, codes::GENERIC);
    }

    #[test]
    fn cob_id_reject_matches_literal_scenario() {
        use crate::od::entry::{AccessAttr, Entry, VarDescriptor};
        use crate::od::ObjectDictionary;

        let mgr = EmergencyManager::new(config(5, 4), NoOpLock);
        let entry = Entry::variable_extended(
            0x1014,
            "CobIdEmcy",
            VarDescriptor::new(alloc::vec![0x80, 0, 0, 0], AccessAttr::READ_WRITE),
        );
        let od = ObjectDictionary::new(alloc::vec![entry]);
        let entry = od.find(0x1014).unwrap();
        od.extension_io_init(entry, mgr.cob_id_emcy_extension()).unwrap();

        // reject: enabled, would stay enabled, ID change attempted
        let err = crate::od::set_value(&od, 0x1014, 0, &0x0000_0086u32.to_le_bytes(), false, &NoOpLock)
            .unwrap_err();
        assert_eq!(err, OdError::InvalidValue);

        // disable first, store new ID
        crate::od::set_value(&od, 0x1014, 0, &0x8000_0086u32.to_le_bytes(), false, &NoOpLock).unwrap();
        // re-enable at the new ID
        crate::od::set_value(&od, 0x1014, 0, &0x0000_0085u32.to_le_bytes(), false, &NoOpLock).unwrap();

        let mut stored = [0u8; 4];
        crate::od::get_value(&od, 0x1014, 0, &mut stored, false, &NoOpLock).unwrap();
        assert_eq!(
            u32::from_le_bytes(stored),
            0x80,
            "new CAN-ID equals the node's default, so the bare sentinel is persisted"
        );
    }
}
