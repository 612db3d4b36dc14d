//! Opaque, time-ordered identifier newtypes.
//!
//! Every id in CDIL is a UUIDv7 string: sortable by creation order, globally
//! unique without a central allocator, and cheap to compare. Each entity gets
//! its own type so a `TenantId` can never be passed where a `CertificateId`
//! is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh, time-ordered id.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Wrap an existing opaque string (e.g. loaded from storage).
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

opaque_id!(TenantId, "Identifies a tenant boundary of isolation.");
opaque_id!(KeyId, "Identifies one tenant signing keypair.");
opaque_id!(CertificateId, "Identifies one issued certificate.");
opaque_id!(EventId, "Identifies one audit ledger entry.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TenantId::generate(), TenantId::generate());
    }

    #[test]
    fn round_trips_through_string() {
        let id = CertificateId::generate();
        let s: String = id.clone().into();
        assert_eq!(CertificateId::from(s), id);
    }
}
