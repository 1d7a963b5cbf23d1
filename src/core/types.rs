//! Shared identifiers and flag types.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Kind of traffic a connection carries.
///
/// Discriminants match the bit values used by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConnectionType {
    /// Regular API traffic.
    Generic = 1,
    /// File downloads.
    Download = 2,
    /// File uploads.
    Upload = 4,
    /// Push/update channel.
    Push = 8,
    /// Short-lived connection for a single exchange.
    Temp = 16,
    /// Proxy availability probe.
    Proxy = 32,
    /// Regular API traffic routed over the media address.
    GenericMedia = 64,
}

impl ConnectionType {
    /// Raw bit value.
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Parse a raw bit value.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::Generic),
            2 => Some(Self::Download),
            4 => Some(Self::Upload),
            8 => Some(Self::Push),
            16 => Some(Self::Temp),
            32 => Some(Self::Proxy),
            64 => Some(Self::GenericMedia),
            _ => None,
        }
    }

    /// Whether this type is served from the datacenter's media address.
    pub fn is_media(self) -> bool {
        matches!(self, Self::GenericMedia | Self::Download)
    }

    /// Whether a dropped link of this type is re-established even with no
    /// requests waiting on it.
    pub fn keeps_alive(self) -> bool {
        matches!(self, Self::Generic | Self::Push)
    }
}

/// Address selection flags passed to the datacenter and the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressFlags(pub u32);

impl AddressFlags {
    /// No special addressing.
    pub const NONE: Self = Self(0);
    /// Prefer an IPv6 address.
    pub const IPV6: Self = Self(1);
    /// Use the download (media) address set.
    pub const DOWNLOAD: Self = Self(2);
    /// Use an obfuscation-only address.
    pub const OBFUSCATED: Self = Self(4);
    /// Address belongs to a CDN datacenter.
    pub const CDN: Self = Self(8);
    /// Use a static (non-DNS) address.
    pub const STATIC: Self = Self(16);
    /// Use the temporary address set.
    pub const TEMP: Self = Self(2048);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AddressFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AddressFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Per-request behaviour flags.
///
/// The top byte carries the request's data type (file kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestFlags(pub u32);

impl RequestFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Allowed before authorization.
    pub const ENABLE_UNAUTHORIZED: Self = Self(1);
    /// Fail instead of retrying on server errors.
    pub const FAIL_ON_SERVER_ERRORS: Self = Self(2);
    /// Payload may be compressed.
    pub const CAN_COMPRESS: Self = Self(4);
    /// Sent without a logged-in account.
    pub const WITHOUT_LOGIN: Self = Self(8);
    /// Retry on a different datacenter when possible.
    pub const TRY_DIFFERENT_DC: Self = Self(16);
    /// Explicit user download: full retry budget.
    pub const FORCE_DOWNLOAD: Self = Self(32);
    /// Must run after the previous request completes.
    pub const INVOKE_AFTER: Self = Self(64);
    /// Ask the server for a quick acknowledgment.
    pub const NEED_QUICK_ACK: Self = Self(128);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Data type carried in the top byte.
    pub fn data_type(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

impl BitOr for RequestFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Which configured secret keys the obfuscation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretType {
    /// Secret of a proxy forced for a single check.
    OverrideProxy,
    /// Secret of the user-configured proxy.
    Proxy,
    /// Secret published by the datacenter itself.
    Datacenter,
}

impl SecretType {
    /// Lookup order when picking the secret for a new attempt.
    pub const PRECEDENCE: [SecretType; 3] = [
        SecretType::OverrideProxy,
        SecretType::Proxy,
        SecretType::Datacenter,
    ];
}

/// Why the socket layer reported a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Orderly close.
    Closed,
    /// Socket error.
    Error,
    /// Connect or read timeout.
    Timeout,
    /// Unrecognised reason code.
    Other(i32),
}

impl From<i32> for DisconnectReason {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Closed,
            1 => Self::Error,
            2 => Self::Timeout,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Error => f.write_str("error"),
            Self::Timeout => f.write_str("timeout"),
            Self::Other(code) => write!(f, "reason {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_type_roundtrip_bits() {
        for ty in [
            ConnectionType::Generic,
            ConnectionType::Download,
            ConnectionType::Upload,
            ConnectionType::Push,
            ConnectionType::Temp,
            ConnectionType::Proxy,
            ConnectionType::GenericMedia,
        ] {
            assert_eq!(ConnectionType::from_bits(ty.bits()), Some(ty));
        }
        assert_eq!(ConnectionType::from_bits(3), None);
    }

    #[test]
    fn test_media_types() {
        assert!(ConnectionType::Download.is_media());
        assert!(ConnectionType::GenericMedia.is_media());
        assert!(!ConnectionType::Generic.is_media());
        assert!(!ConnectionType::Upload.is_media());
    }

    #[test]
    fn test_request_flags_data_type() {
        let flags = RequestFlags(0x0200_0000) | RequestFlags::FORCE_DOWNLOAD;
        assert_eq!(flags.data_type(), 2);
        assert!(flags.contains(RequestFlags::FORCE_DOWNLOAD));
        assert!(!flags.contains(RequestFlags::NEED_QUICK_ACK));
    }

    #[test]
    fn test_disconnect_reason_codes() {
        assert_eq!(DisconnectReason::from(0), DisconnectReason::Closed);
        assert_eq!(DisconnectReason::from(1), DisconnectReason::Error);
        assert_eq!(DisconnectReason::from(2), DisconnectReason::Timeout);
        assert_eq!(DisconnectReason::from(7), DisconnectReason::Other(7));
    }
}
