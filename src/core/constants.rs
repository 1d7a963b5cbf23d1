//! Protocol constants for the obfuscated transport.
//!
//! Byte layouts below are fixed by the wire protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// OBFUSCATION PREAMBLE
// =============================================================================

/// Length of the obfuscation preamble sent at the start of every attempt.
pub const PREAMBLE_SIZE: usize = 64;

/// Offset of the key/iv material inside the preamble.
pub const PREAMBLE_KEY_OFFSET: usize = 8;

/// Length of the key/iv material (32-byte key followed by 16-byte iv).
pub const PREAMBLE_KEY_MATERIAL_SIZE: usize = 48;

/// Offset of the 4-byte protocol tag inside the preamble.
pub const PREAMBLE_TAG_OFFSET: usize = 56;

/// Offset of the little-endian datacenter id inside the preamble.
pub const PREAMBLE_DC_OFFSET: usize = 60;

/// Protocol tag byte for abridged framing.
pub const TAG_ABRIDGED: u8 = 0xef;

/// Protocol tag byte for intermediate framing.
pub const TAG_INTERMEDIATE: u8 = 0xee;

/// Protocol tag byte for padded intermediate framing.
pub const TAG_PADDED_INTERMEDIATE: u8 = 0xdd;

/// Clear-text tag that opens a TLS-mode stream.
pub const TLS_STREAM_TAG: [u8; 4] = [0xee, 0xee, 0xee, 0xee];

/// First-word values a preamble must never start with (LE u32).
///
/// These would make the stream look like HTTP or like an unobfuscated
/// transport to middleboxes and to the server.
pub const FORBIDDEN_PREAMBLE_WORDS: [u32; 7] = [
    0x4441_4548, // "HEAD"
    0x5453_4f50, // "POST"
    0x2054_4547, // "GET "
    0x4954_504f, // "OPTI"
    0xeeee_eeee,
    0xdddd_dddd,
    0x0201_0316, // TLS handshake record
];

/// Offset added to the datacenter id on a test backend.
pub const TEST_BACKEND_DC_OFFSET: i16 = 10000;

// =============================================================================
// STREAM CIPHER
// =============================================================================

/// AES-256 key size.
pub const CIPHER_KEY_SIZE: usize = 32;

/// AES block / counter size.
pub const CIPHER_BLOCK_SIZE: usize = 16;

/// Length of the secret suffix mixed into the obfuscation keys.
pub const SECRET_KEY_SIZE: usize = 16;

/// Secret prefix selecting padded intermediate framing.
pub const SECRET_PREFIX_PADDED: u8 = 0xdd;

/// Secret prefix selecting TLS mode.
pub const SECRET_PREFIX_TLS: u8 = 0xee;

// =============================================================================
// FRAMING
// =============================================================================

/// Largest inbound frame accepted before declaring the stream desynchronized.
pub const MAX_FRAME_LENGTH: u32 = 2 * 1024 * 1024;

/// Abridged header marker for the 4-byte (long) length form.
pub const ABRIDGED_LONG_MARKER: u8 = 0x7f;

/// Abridged quick-ack request / quick-ack response bit.
pub const ABRIDGED_QUICK_ACK_BIT: u8 = 0x80;

/// Intermediate quick-ack request / quick-ack response bit.
pub const INTERMEDIATE_QUICK_ACK_BIT: u32 = 0x8000_0000;

/// Maximum random padding appended to a padded intermediate frame.
pub const MAX_FRAME_PADDING: usize = 15;

/// Size of a frame carrying a transport error code instead of a message.
pub const TRANSPORT_ERROR_FRAME_SIZE: usize = 4;

// =============================================================================
// RECONNECTION
// =============================================================================

/// Initial reconnect delay.
pub const INITIAL_RECONNECT_DELAY_MS: u64 = 1000;

/// Growth factor of the reconnect delay.
pub const RECONNECT_DELAY_MULTIPLIER: f64 = 2.4;

/// Cap on the deterministic part of the reconnect delay.
pub const MAX_RECONNECT_DELAY_MS: u64 = 16000;

/// Exclusive upper bound of the random jitter added to reconnect delays.
pub const MAX_RECONNECT_JITTER_MS: u64 = 16000;

/// Consecutive failed attempts allowed before automatic reconnects stop.
pub const WILL_RETRY_CONNECT_COUNT: u32 = 5;

/// Failed attempts without any received byte before probing the next port.
pub const NEXT_PORT_AFTER_FAILURES: u32 = 2;

/// Idle time after which media and file connections are discarded.
pub const IDLE_SUSPEND_TIMEOUT: Duration = Duration::from_secs(20);

/// Socket error: connection reset by peer.
pub const ERROR_CONNECTION_RESET: i32 = 104;

/// Socket error: network unreachable.
pub const ERROR_NETWORK_UNREACHABLE: i32 = 101;

/// Socket error: no route to host.
pub const ERROR_HOST_UNREACHABLE: i32 = 113;

// =============================================================================
// REQUEST RETRY BUDGETS
// =============================================================================

/// Retry budget for forced downloads.
pub const MAX_RETRIES_FORCED: u32 = 10;

/// Retry budget for regular requests.
pub const MAX_RETRIES_DEFAULT: u32 = 6;

/// Retry budget after a flood-wait failure.
pub const MAX_RETRIES_FLOOD_WAIT: u32 = 2;

/// Server error code signalling rate limiting.
pub const FLOOD_WAIT_ERROR_CODE: i32 = 420;
