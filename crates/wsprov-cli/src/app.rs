use std::{collections::HashSet, net::Ipv4Addr};

use anyhow::{Context, bail};
use serde::Serialize;
use wsprov::{PoolStats, ProvisionConfig, Provisioner, Token, WorkspaceRecord};

use crate::store::{State, StateStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub subdomain: Token,
    pub released: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub pool: PoolStats,
    pub workspaces: usize,
    pub tokens_issued: usize,
}

/// Provisioning state reconciled from a state file.
///
/// Every mutation is written back to the store before it is reported.
#[derive(Debug)]
pub struct App {
    provisioner: Provisioner,
    store: StateStore,
    state: State,
}

impl App {
    pub fn open(config: ProvisionConfig, store: StateStore) -> anyhow::Result<Self> {
        let state = store.load()?;

        let provisioner =
            Provisioner::restore_with_released(config, &state.workspaces, &state.released)
                .with_context(|| {
                    format!("state in {} is inconsistent", store.path().display())
                })?;

        let mut retired = HashSet::with_capacity(state.retired.len());
        for token in &state.retired {
            if !retired.insert(*token) {
                bail!("retired subdomain {} is listed more than once", token);
            }
            if !provisioner.tokens().reserve(*token) {
                bail!("retired subdomain {} is also recorded as live", token);
            }
        }

        Ok(Self {
            provisioner,
            store,
            state,
        })
    }

    /// Provisions a workspace with `count` addresses.
    ///
    /// If the pool runs out part way, the addresses taken so far are
    /// released and the subdomain is retired unused.
    pub fn create(&mut self, name: &str, count: usize) -> anyhow::Result<WorkspaceRecord> {
        let provision = self.provisioner.provision()?;
        let mut record = WorkspaceRecord::new(name, provision);

        while record.ips.len() < count {
            match self.provisioner.pool().allocate() {
                Ok(addr) => record.ips.push(addr),
                Err(e) => {
                    self.provisioner.release_record(&record);
                    self.forget_released(&record.ips);
                    self.state.released.extend(&record.ips);
                    self.state.retired.push(record.subdomain);
                    self.store.save(&self.state)?;
                    return Err(e).context(format!(
                        "only {} of {} addresses available",
                        record.ips.len(),
                        count
                    ));
                }
            }
        }

        self.forget_released(&record.ips);
        self.state.workspaces.push(record.clone());
        self.store.save(&self.state)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            name = %record.name,
            subdomain = %record.subdomain,
            ips = %wsprov::join_addresses(&record.ips),
            "workspace created"
        );
        Ok(record)
    }

    /// Deletes the workspace owning `subdomain`, releasing its addresses.
    pub fn delete(&mut self, subdomain: Token) -> anyhow::Result<Deleted> {
        let Some(index) = self
            .state
            .workspaces
            .iter()
            .position(|record| record.subdomain == subdomain)
        else {
            bail!("no workspace with subdomain {}", subdomain);
        };

        let record = self.state.workspaces.remove(index);
        let released = self.provisioner.release_record(&record);
        self.state.released.extend(&record.ips);
        self.state.retired.push(record.subdomain);
        self.store.save(&self.state)?;

        #[cfg(feature = "tracing")]
        tracing::info!(name = %record.name, %subdomain, released, "workspace deleted");
        Ok(Deleted {
            subdomain,
            released,
        })
    }

    /// Drops `addrs` from the persisted release order once they are
    /// allocated again.
    fn forget_released(&mut self, addrs: &[Ipv4Addr]) {
        if !self.state.released.is_empty() {
            self.state.released.retain(|addr| !addrs.contains(addr));
        }
    }

    pub fn list(&self) -> &[WorkspaceRecord] {
        &self.state.workspaces
    }

    pub fn stats(&self) -> Stats {
        Stats {
            pool: self.provisioner.pool().stats(),
            workspaces: self.state.workspaces.len(),
            tokens_issued: self.provisioner.tokens().len(),
        }
    }
}
