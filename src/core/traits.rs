//! Interfaces the surrounding client implements for the transport core.
//!
//! The core never performs I/O or keeps wall-clock timers itself: it calls
//! out through these traits and is called back by the reactor that owns it.

use std::io;
use std::time::Duration;

use super::types::{AddressFlags, ConnectionType, SecretType};

/// Opaque token identifying one arming of a timer.
///
/// A token is handed back when the timer fires; the owner compares it with
/// the token of its latest arming and ignores anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimerToken(pub u64);

impl TimerToken {
    /// Token that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Non-blocking stream socket.
///
/// Readiness and completion are reported back to the owning connection by
/// the reactor (`on_connected`, `on_received_data`, `on_disconnected`).
pub trait Socket {
    /// Start connecting to `address:port`. Must not block.
    fn open(&mut self, address: &str, port: u16, flags: AddressFlags) -> io::Result<()>;

    /// Queue bytes for transmission. Must not block.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Close the socket and drop its reactor subscription.
    fn close(&mut self);
}

/// One-shot timer primitive.
pub trait Timer {
    /// Arm the timer; re-arming replaces any pending deadline.
    fn arm(&mut self, timeout: Duration, token: TimerToken);

    /// Cancel the pending deadline, if any.
    fn cancel(&mut self);
}

/// Per-datacenter address and configuration store.
pub trait Datacenter {
    /// Datacenter identifier.
    fn id(&self) -> u32;

    /// Address to connect to for the given flags.
    fn current_address(&self, flags: AddressFlags) -> Option<String>;

    /// Port to connect to for the given flags.
    fn current_port(&self, flags: AddressFlags) -> u16;

    /// Advance to the next address or port for the given flags.
    fn next_address_or_port(&self, flags: AddressFlags);

    /// Persist the current address/port as known-good.
    fn store_current_address_and_port(&self) {}

    /// Secret bytes configured for `secret_type`, if any.
    fn secret(&self, secret_type: SecretType) -> Option<Vec<u8>>;

    /// Whether a distinct media address exists.
    fn has_media_address(&self) -> bool;

    /// Layer version last negotiated on the regular channel.
    fn last_init_version(&self) -> u32;

    /// Layer version last negotiated on the media channel.
    fn last_init_media_version(&self) -> u32;

    /// Whether per-connection (PFS) media addressing is enabled.
    fn pfs_enabled(&self) -> bool {
        true
    }

    /// Whether this datacenter belongs to the test backend.
    fn is_test_backend(&self) -> bool {
        false
    }
}

/// Queries a connection makes of the orchestrator that owns it.
pub trait ConnectionDelegate {
    /// Whether requests are still routed to connections of this type.
    fn has_pending_requests(&self, connection_type: ConnectionType) -> bool;

    /// Whether the device currently has network connectivity.
    fn is_network_available(&self) -> bool {
        true
    }
}
