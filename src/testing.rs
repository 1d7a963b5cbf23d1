//! Recording collaborators for unit tests.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::core::{
    AddressFlags, ConnectionDelegate, ConnectionType, Datacenter, SecretType, Socket, Timer,
    TimerToken,
};

/// Everything a [`MockSocket`] was asked to do.
#[derive(Debug, Default)]
pub struct SocketLog {
    pub opened: Vec<(String, u16, AddressFlags)>,
    pub written: Vec<Vec<u8>>,
    pub closes: usize,
    /// When set, `open` fails with this OS error code.
    pub fail_open: Option<i32>,
    /// When set, the next `write` fails with this OS error code.
    pub fail_next_write: Option<i32>,
}

impl SocketLog {
    /// All written bytes since the last `open`, concatenated.
    pub fn take_written(&mut self) -> Vec<u8> {
        self.written.drain(..).flatten().collect()
    }
}

pub struct MockSocket(pub Rc<RefCell<SocketLog>>);

impl Socket for MockSocket {
    fn open(&mut self, address: &str, port: u16, flags: AddressFlags) -> io::Result<()> {
        let mut log = self.0.borrow_mut();
        if let Some(code) = log.fail_open {
            return Err(io::Error::from_raw_os_error(code));
        }
        log.opened.push((address.to_string(), port, flags));
        log.written.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut log = self.0.borrow_mut();
        if let Some(code) = log.fail_next_write.take() {
            return Err(io::Error::from_raw_os_error(code));
        }
        log.written.push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.0.borrow_mut().closes += 1;
    }
}

/// Everything a [`MockTimer`] was asked to do.
#[derive(Debug, Default)]
pub struct TimerLog {
    pub armed: Vec<(Duration, TimerToken)>,
    pub cancels: usize,
    pub pending: Option<TimerToken>,
}

pub struct MockTimer(pub Rc<RefCell<TimerLog>>);

impl Timer for MockTimer {
    fn arm(&mut self, timeout: Duration, token: TimerToken) {
        let mut log = self.0.borrow_mut();
        log.armed.push((timeout, token));
        log.pending = Some(token);
    }

    fn cancel(&mut self) {
        let mut log = self.0.borrow_mut();
        log.cancels += 1;
        log.pending = None;
    }
}

pub struct MockDatacenter {
    pub id: u32,
    pub address: RefCell<Option<String>>,
    pub port: Cell<u16>,
    pub secret: RefCell<Option<Vec<u8>>>,
    pub media_address: Cell<bool>,
    pub pfs: Cell<bool>,
    pub test_backend: Cell<bool>,
    pub init_version: Cell<u32>,
    pub init_media_version: Cell<u32>,
    pub next_port_calls: Cell<usize>,
    pub stored: Cell<usize>,
}

impl MockDatacenter {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            address: RefCell::new(Some("149.154.167.50".to_string())),
            port: Cell::new(443),
            secret: RefCell::new(None),
            media_address: Cell::new(false),
            pfs: Cell::new(true),
            test_backend: Cell::new(false),
            init_version: Cell::new(0),
            init_media_version: Cell::new(0),
            next_port_calls: Cell::new(0),
            stored: Cell::new(0),
        }
    }
}

impl Datacenter for MockDatacenter {
    fn id(&self) -> u32 {
        self.id
    }

    fn current_address(&self, _flags: AddressFlags) -> Option<String> {
        self.address.borrow().clone()
    }

    fn current_port(&self, _flags: AddressFlags) -> u16 {
        self.port.get()
    }

    fn next_address_or_port(&self, _flags: AddressFlags) {
        self.next_port_calls.set(self.next_port_calls.get() + 1);
        self.port.set(if self.port.get() == 443 { 80 } else { 443 });
    }

    fn store_current_address_and_port(&self) {
        self.stored.set(self.stored.get() + 1);
    }

    fn secret(&self, secret_type: SecretType) -> Option<Vec<u8>> {
        match secret_type {
            SecretType::Datacenter => self.secret.borrow().clone(),
            _ => None,
        }
    }

    fn has_media_address(&self) -> bool {
        self.media_address.get()
    }

    fn last_init_version(&self) -> u32 {
        self.init_version.get()
    }

    fn last_init_media_version(&self) -> u32 {
        self.init_media_version.get()
    }

    fn pfs_enabled(&self) -> bool {
        self.pfs.get()
    }

    fn is_test_backend(&self) -> bool {
        self.test_backend.get()
    }
}

pub struct MockDelegate {
    pub pending: Cell<bool>,
    pub network: Cell<bool>,
}

impl Default for MockDelegate {
    fn default() -> Self {
        Self {
            pending: Cell::new(false),
            network: Cell::new(true),
        }
    }
}

impl ConnectionDelegate for MockDelegate {
    fn has_pending_requests(&self, _connection_type: ConnectionType) -> bool {
        self.pending.get()
    }

    fn is_network_available(&self) -> bool {
        self.network.get()
    }
}
