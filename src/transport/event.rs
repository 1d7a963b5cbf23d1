//! Event objects routed from an external reactor to their handlers.
//!
//! An [`EventObject`] is what the reactor registers alongside a file
//! descriptor or timer. When readiness fires, the reactor calls
//! [`EventObject::on_event`], which forwards to the right handler. Handlers
//! are held weakly: once the owner drops a handler, its event object turns
//! into a no-op instead of calling into freed state.

use std::cell::RefCell;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::rc::Weak;
use std::time::Instant;

use tracing::trace;

use crate::core::TimerToken;

/// Readiness bits delivered by the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(pub u32);

impl EventMask {
    /// Readable.
    pub const READABLE: Self = Self(0x001);
    /// Writable.
    pub const WRITABLE: Self = Self(0x004);
    /// Error condition.
    pub const ERROR: Self = Self(0x008);
    /// Hang-up.
    pub const HANGUP: Self = Self(0x010);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Receiver of socket readiness.
pub trait SocketEventHandler {
    /// Handle readiness on the socket.
    fn on_socket_event(&mut self, mask: EventMask);
}

/// Receiver of timer expiry.
pub trait TimerEventHandler {
    /// Handle expiry of the arming identified by `token`.
    fn on_timer_event(&mut self, token: TimerToken);
}

/// Receiver of reactor wakeups.
pub trait WakeupEventHandler {
    /// Handle a wakeup.
    fn on_wakeup(&mut self);
}

/// Which handler an event object routes to.
#[derive(Clone)]
pub enum EventTarget {
    /// Socket readiness for a connection.
    Connection(Weak<RefCell<dyn SocketEventHandler>>),
    /// Expiry of one timer arming.
    Timer {
        /// Timer owner.
        handler: Weak<RefCell<dyn TimerEventHandler>>,
        /// Arming this event belongs to.
        token: TimerToken,
    },
    /// Cross-thread wakeup of the reactor loop.
    Wakeup(Weak<RefCell<dyn WakeupEventHandler>>),
}

impl EventTarget {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timer { .. } => "timer",
            Self::Wakeup(_) => "wakeup",
        }
    }

    /// Whether the handler is still alive.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Connection(handler) => handler.strong_count() > 0,
            Self::Timer { handler, .. } => handler.strong_count() > 0,
            Self::Wakeup(handler) => handler.strong_count() > 0,
        }
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer { token, .. } => f
                .debug_struct("Timer")
                .field("token", token)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Tagged handle the reactor stores per registration.
#[derive(Debug, Clone)]
pub struct EventObject {
    created_at: Instant,
    target: EventTarget,
}

impl EventObject {
    /// Wrap a target, stamping the creation time.
    pub fn new(target: EventTarget) -> Self {
        Self {
            created_at: Instant::now(),
            target,
        }
    }

    /// When this object was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The routed target.
    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    /// Dispatch `mask` to the target.
    ///
    /// Returns `false` without doing anything if the handler is gone.
    pub fn on_event(&self, mask: EventMask) -> bool {
        match &self.target {
            EventTarget::Connection(handler) => match handler.upgrade() {
                Some(handler) => handler.borrow_mut().on_socket_event(mask),
                None => return self.dead(),
            },
            EventTarget::Timer { handler, token } => match handler.upgrade() {
                Some(handler) => handler.borrow_mut().on_timer_event(*token),
                None => return self.dead(),
            },
            EventTarget::Wakeup(handler) => match handler.upgrade() {
                Some(handler) => handler.borrow_mut().on_wakeup(),
                None => return self.dead(),
            },
        }
        true
    }

    fn dead(&self) -> bool {
        trace!(target_kind = self.target.kind(), "event for dropped handler ignored");
        false
    }
}
