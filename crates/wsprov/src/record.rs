//! The provisioning view of a persisted workspace.
//!
//! The core never touches storage. Callers persist a [`WorkspaceRecord`] per
//! workspace and hand the records back on restart (see
//! [`Provisioner::restore`]) and on deletion (see
//! [`Provisioner::release_record`]).
//!
//! Stores that keep the address list in a single text column use the
//! comma-separated form produced by [`join_addresses`] and read back by
//! [`parse_addresses`].
//!
//! [`Provisioner::restore`]: crate::Provisioner::restore
//! [`Provisioner::release_record`]: crate::Provisioner::release_record

use std::net::Ipv4Addr;

use crate::{Provision, Token};

/// A workspace's subdomain and addresses as recorded by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkspaceRecord {
    pub name: String,
    pub subdomain: Token,
    pub ips: Vec<Ipv4Addr>,
}

impl WorkspaceRecord {
    /// Builds the record for a freshly provisioned workspace.
    pub fn new(name: impl Into<String>, provision: Provision) -> Self {
        Self {
            name: name.into(),
            subdomain: provision.subdomain,
            ips: vec![provision.address],
        }
    }
}

/// Joins addresses into the comma-separated column form.
pub fn join_addresses(addrs: &[Ipv4Addr]) -> String {
    addrs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the comma-separated column form.
///
/// Blank entries are skipped. Malformed entries are skipped too, since an
/// address that cannot be parsed can never be in use.
pub fn parse_addresses(column: &str) -> Vec<Ipv4Addr> {
    column
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(addr) => Some(addr),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(entry, error = %_e, "skipping malformed address");
                None
            }
        })
        .collect()
}
