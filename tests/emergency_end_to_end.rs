//! End-to-end scenarios against the public API only: build a catalog, wire
//! up the Emergency extensions, drive `report_error`/`process`, and assert
//! on the emitted frame bytes (SPEC_FULL.md §8, literal scenarios 3-6).

use std::cell::RefCell;
use std::rc::Rc;

use canopen_od_emcy::emcy::can::{CanBusErrorStatus, EmcyTxSlot, NmtState};
use canopen_od_emcy::emcy::{EmergencyConfig, EmergencyManager};
use canopen_od_emcy::lock::NoOpLock;
use canopen_od_emcy::od::entry::{AccessAttr, Entry, VarDescriptor};
use canopen_od_emcy::od::{get_value, set_value, ObjectDictionary};
use canopen_od_emcy::types::ValidNodeId;

struct NullBus;
impl CanBusErrorStatus for NullBus {
    fn read(&self) -> u16 {
        0
    }
}

struct RecordingTxSlot {
    sent: RefCell<Vec<[u8; 8]>>,
}
impl EmcyTxSlot for RecordingTxSlot {
    fn set_can_id(&mut self, _can_id: u16) {}
    fn is_full(&self) -> bool {
        false
    }
    fn send(&mut self, data: [u8; 8]) {
        self.sent.borrow_mut().push(data);
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn emergency_edge_produces_the_literal_frame() {
    init_logging();
    let mgr = EmergencyManager::new(
        EmergencyConfig {
            node_id: ValidNodeId::try_from(5u8).unwrap(),
            buffer_size: 6,
            status_bits_count: 48,
            inhibit_time_100us: 0,
        },
        NoOpLock,
    );
    mgr.set_condition(canopen_od_emcy::emcy::ConditionFlag::Generic, true);
    mgr.report_error(0x11, true, 0x5000, 0xDEAD_BEEF);

    let mut tx = RecordingTxSlot { sent: RefCell::new(Vec::new()) };
    mgr.process(&NullBus, &[], NmtState::Operational, &mut tx, 0, None);

    let sent = tx.sent.borrow();
    assert_eq!(sent.as_slice(), &[[0x00, 0x50, 0x01, 0x11, 0xEF, 0xBE, 0xAD, 0xDE]]);
}

#[test]
fn cob_id_reconfiguration_follows_the_literal_scenario() {
    init_logging();
    let mgr = EmergencyManager::new(
        EmergencyConfig {
            node_id: ValidNodeId::try_from(5u8).unwrap(),
            buffer_size: 4,
            status_bits_count: 48,
            inhibit_time_100us: 0,
        },
        NoOpLock,
    );

    let entry = Entry::variable_extended(
        0x1014,
        "CobIdEmcy",
        VarDescriptor::new(vec![0x80, 0, 0, 0], AccessAttr::READ_WRITE),
    );
    let od = ObjectDictionary::new(vec![entry]);
    let entry = od.find(0x1014).unwrap();
    od.extension_io_init(entry, mgr.cob_id_emcy_extension()).unwrap();

    let err = set_value(&od, 0x1014, 0, &0x0000_0086u32.to_le_bytes(), false, &NoOpLock).unwrap_err();
    assert_eq!(err, canopen_od_emcy::OdError::InvalidValue);

    set_value(&od, 0x1014, 0, &0x8000_0086u32.to_le_bytes(), false, &NoOpLock).unwrap();
    set_value(&od, 0x1014, 0, &0x0000_0085u32.to_le_bytes(), false, &NoOpLock).unwrap();

    let mut stored = [0u8; 4];
    get_value(&od, 0x1014, 0, &mut stored, false, &NoOpLock).unwrap();
    assert_eq!(u32::from_le_bytes(stored), 0x80);
}

#[test]
fn self_reflection_reaches_the_registered_callback() {
    init_logging();
    let mgr = EmergencyManager::new(
        EmergencyConfig {
            node_id: ValidNodeId::try_from(9u8).unwrap(),
            buffer_size: 4,
            status_bits_count: 48,
            inhibit_time_100us: 0,
        },
        NoOpLock,
    );
    let observed: Rc<RefCell<Vec<(u16, u16, u8, u8, u32)>>> = Rc::new(RefCell::new(Vec::new()));
    let observed2 = Rc::clone(&observed);
    mgr.set_consumer_callback(Box::new(move |ident, code, reg, bit, info| {
        observed2.borrow_mut().push((ident, code, reg, bit, info));
    }));

    mgr.report_error(4, true, canopen_od_emcy::emcy::codes::TEMPERATURE, 0xAA);
    let mut tx = RecordingTxSlot { sent: RefCell::new(Vec::new()) };
    mgr.process(&NullBus, &[], NmtState::Operational, &mut tx, 0, None);

    let calls = observed.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 0, "a node reflects its own emergencies with ident 0");
    assert_eq!(calls[0].1, canopen_od_emcy::emcy::codes::TEMPERATURE);
}

#[test]
fn find_resolves_the_literal_catalog() {
    let od = ObjectDictionary::new(vec![
        Entry::variable(0x1000, "DeviceType", VarDescriptor::new(vec![0; 4], AccessAttr::READ_ONLY)),
        Entry::variable(0x1001, "ErrorRegister", VarDescriptor::new(vec![0], AccessAttr::READ_ONLY)),
        Entry::variable(0x1003, "PredefinedErrorField", VarDescriptor::new(vec![0; 4], AccessAttr::READ_ONLY)),
        Entry::variable(0x1014, "CobIdEmcy", VarDescriptor::new(vec![0; 4], AccessAttr::READ_WRITE)),
        Entry::variable(0x1018, "Identity", VarDescriptor::new(vec![0; 4], AccessAttr::READ_ONLY)),
    ]);
    assert_eq!(od.find(0x1003).unwrap().index, 0x1003);
    assert!(od.find(0x1002).is_none());
    assert_eq!(od.find(0x1018).unwrap().index, 0x1018);
}
