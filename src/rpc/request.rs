//! Bookkeeping for one outstanding remote call.

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::core::{
    ConnectionType, Datacenter, FLOOD_WAIT_ERROR_CODE, MAX_RETRIES_DEFAULT, MAX_RETRIES_FLOOD_WAIT,
    MAX_RETRIES_FORCED, RequestFlags,
};

use super::managed::ManagedRef;

/// Error returned by the server for a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rpc error {code}: {text}")]
pub struct RpcError {
    /// Numeric error code.
    pub code: i32,
    /// Error message, e.g. `FLOOD_WAIT_30`.
    pub text: String,
}

impl RpcError {
    /// Create an error.
    pub fn new(code: i32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Whether the server asked the client to slow down.
    pub fn is_flood_wait(&self) -> bool {
        self.code == FLOOD_WAIT_ERROR_CODE || self.text.starts_with("FLOOD_WAIT_")
    }

    /// Seconds to wait before retrying, if this is a flood wait.
    pub fn flood_wait_seconds(&self) -> Option<u32> {
        self.text.strip_prefix("FLOOD_WAIT_")?.parse().ok()
    }
}

/// Completion callback: result, error, network type, response time.
pub type OnCompleteFn = Box<dyn FnOnce(Option<Vec<u8>>, Option<RpcError>, i32, i64)>;

/// Called when the server quick-acknowledges the request.
pub type OnQuickAckFn = Box<dyn FnMut()>;

/// Called each time the request is written to a socket.
pub type OnWriteToSocketFn = Box<dyn FnMut()>;

/// One outstanding remote call.
///
/// The orchestrator owns requests and drives them through send, retry and
/// completion. The request itself only answers questions about its budget
/// and routes callbacks.
pub struct Request {
    /// Token the caller uses to refer to this request.
    pub request_token: i32,
    /// Connection type the request is routed to.
    pub connection_type: ConnectionType,
    /// Behaviour flags.
    pub request_flags: RequestFlags,
    /// Target datacenter.
    pub datacenter_id: u32,
    /// Client instance the request belongs to.
    pub instance_num: i32,
    /// Data type from the top byte of the flags.
    pub data_type: u8,

    /// Message id of the latest send, 0 when not sent.
    pub message_id: i64,
    /// Sequence number of the latest send.
    pub message_seq_no: i32,
    /// Token of the connection it was last sent on, 0 when not sent.
    pub connection_token: u32,
    /// Time of the latest send.
    pub start_time: i64,
    /// Earliest time the request may be sent.
    pub min_start_time: i64,
    /// Sends so far.
    pub retry_count: u32,

    /// Last failure was a flood wait.
    pub failed_by_flood_wait: bool,
    /// Wrapped in the connection-init call for the regular channel.
    pub is_init_request: bool,
    /// Wrapped in the connection-init call for the media channel.
    pub is_init_media_request: bool,
    /// Cancelled by the caller.
    pub cancelled: bool,
    /// Completion was delivered.
    pub completed: bool,

    responds_to_message_ids: Vec<i64>,
    rpc_request: Option<Vec<u8>>,

    on_complete: Option<OnCompleteFn>,
    on_quick_ack: Option<OnQuickAckFn>,
    on_write_to_socket: Option<OnWriteToSocketFn>,
    managed: Vec<ManagedRef>,
}

impl Request {
    /// Create a request with its callbacks.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_num: i32,
        request_token: i32,
        connection_type: ConnectionType,
        request_flags: RequestFlags,
        datacenter_id: u32,
        on_complete: Option<OnCompleteFn>,
        on_quick_ack: Option<OnQuickAckFn>,
        on_write_to_socket: Option<OnWriteToSocketFn>,
    ) -> Self {
        Self {
            request_token,
            connection_type,
            request_flags,
            datacenter_id,
            instance_num,
            data_type: request_flags.data_type(),
            message_id: 0,
            message_seq_no: 0,
            connection_token: 0,
            start_time: 0,
            min_start_time: 0,
            retry_count: 0,
            failed_by_flood_wait: false,
            is_init_request: false,
            is_init_media_request: false,
            cancelled: false,
            completed: false,
            responds_to_message_ids: Vec::new(),
            rpc_request: None,
            on_complete,
            on_quick_ack,
            on_write_to_socket,
            managed: Vec::new(),
        }
    }

    /// Attach the serialized call.
    pub fn with_rpc_request(mut self, payload: Vec<u8>) -> Self {
        self.rpc_request = Some(payload);
        self
    }

    /// Serialized call, if attached.
    pub fn rpc_request(&self) -> Option<&[u8]> {
        self.rpc_request.as_deref()
    }

    /// Keep a host-runtime reference alive until the request finishes.
    pub fn attach_managed(&mut self, handle: ManagedRef) {
        self.managed.push(handle);
    }

    /// Record another message id a response to this request may carry.
    pub fn add_respond_message_id(&mut self, id: i64) {
        self.responds_to_message_ids.push(id);
    }

    /// Whether a response to message `id` answers this request.
    pub fn responds_to_message_id(&self, id: i64) -> bool {
        self.message_id == id || self.responds_to_message_ids.contains(&id)
    }

    /// Forget the latest send, and its timing when `reset_time` is set.
    pub fn clear(&mut self, reset_time: bool) {
        self.message_id = 0;
        self.message_seq_no = 0;
        self.connection_token = 0;
        if reset_time {
            self.start_time = 0;
            self.min_start_time = 0;
        }
    }

    /// Deliver the outcome.
    ///
    /// Fires only if `result` or `error` is present, and only once. Afterwards
    /// the other callbacks are dropped and managed references released.
    /// Returns whether the callback ran.
    pub fn on_complete(
        &mut self,
        result: Option<Vec<u8>>,
        error: Option<RpcError>,
        network_type: i32,
        response_time: i64,
    ) -> bool {
        if result.is_none() && error.is_none() {
            return false;
        }
        let Some(callback) = self.on_complete.take() else {
            return false;
        };
        trace!(token = self.request_token, failed = error.is_some(), "request complete");
        self.completed = true;
        self.teardown();
        callback(result, error, network_type, response_time);
        true
    }

    /// Server acknowledged receipt.
    pub fn on_quick_ack(&mut self) {
        if let Some(callback) = self.on_quick_ack.as_mut() {
            callback();
        }
    }

    /// Request bytes were written to a socket.
    pub fn on_write_to_socket(&mut self) {
        if let Some(callback) = self.on_write_to_socket.as_mut() {
            callback();
        }
    }

    /// Cancel: no callback runs after this.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.on_complete = None;
        self.teardown();
    }

    /// Retry budget for this request.
    pub fn max_retry_count(&self) -> u32 {
        if self.request_flags.contains(RequestFlags::FORCE_DOWNLOAD) {
            MAX_RETRIES_FORCED
        } else if self.failed_by_flood_wait {
            MAX_RETRIES_FLOOD_WAIT
        } else {
            MAX_RETRIES_DEFAULT
        }
    }

    /// Whether the retry budget is spent.
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retry_count()
    }

    /// Whether the request was wrapped in a connection-init call.
    pub fn has_init_flag(&self) -> bool {
        self.is_init_request || self.is_init_media_request
    }

    /// Whether the request goes over the media channel.
    pub fn is_media_request(&self) -> bool {
        self.connection_type.is_media()
    }

    /// Whether the request must be wrapped in a connection-init call for
    /// layer `version` on `datacenter`.
    pub fn need_init_request(&self, datacenter: &dyn Datacenter, version: u32) -> bool {
        let media =
            datacenter.pfs_enabled() && self.is_media_request() && datacenter.has_media_address();
        if media {
            datacenter.last_init_media_version() != version
        } else {
            datacenter.last_init_version() != version
        }
    }

    fn teardown(&mut self) {
        self.on_quick_ack = None;
        self.on_write_to_socket = None;
        for handle in &mut self.managed {
            handle.release();
        }
        self.managed.clear();
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_token", &self.request_token)
            .field("connection_type", &self.connection_type)
            .field("datacenter_id", &self.datacenter_id)
            .field("message_id", &self.message_id)
            .field("retry_count", &self.retry_count)
            .field("cancelled", &self.cancelled)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
