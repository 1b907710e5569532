//! Registry of simulated clients
//!
//! The registry lock covers only appends and the random-index read; callers
//! lock a picked record's own state afterwards. Records are never removed,
//! so a picked record can't go stale.
//!
//! Registrations reserve a slot before their network call. Capacity counts
//! reservations, which keeps `size() <= max_clients` however many
//! registrations race.

use crate::client::ClientRecord;
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Members {
    clients: Vec<Arc<ClientRecord>>,
    reserved: usize,
}

#[derive(Debug)]
pub struct ClientRegistry {
    members: RwLock<Members>,
    max_clients: usize,
}

impl ClientRegistry {
    /// `max_clients == 0` means unbounded
    pub fn new(max_clients: usize) -> Self {
        Self {
            members: RwLock::new(Members::default()),
            max_clients,
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Append a client unconditionally
    pub fn add(&self, record: Arc<ClientRecord>) {
        self.members.write().clients.push(record);
    }

    /// A uniformly random client, if there is one
    pub fn random_pick(&self) -> Option<Arc<ClientRecord>> {
        let members = self.members.read();
        if members.clients.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..members.clients.len());
        Some(members.clients[index].clone())
    }

    pub fn size(&self) -> usize {
        self.members.read().clients.len()
    }

    /// Registrations currently holding a slot
    pub fn pending(&self) -> usize {
        self.members.read().reserved
    }

    /// Whether a new registration could still get a slot
    pub fn has_capacity(&self) -> bool {
        let members = self.members.read();
        self.below_capacity(&members)
    }

    /// Claim a slot for a registration in flight
    pub fn reserve(&self) -> Option<Reservation<'_>> {
        let mut members = self.members.write();
        if !self.below_capacity(&members) {
            return None;
        }
        members.reserved += 1;
        Some(Reservation {
            registry: self,
            filled: false,
        })
    }

    fn below_capacity(&self, members: &Members) -> bool {
        self.max_clients == 0 || members.clients.len() + members.reserved < self.max_clients
    }
}

/// A claimed registry slot; released on drop unless filled
#[derive(Debug)]
pub struct Reservation<'a> {
    registry: &'a ClientRegistry,
    filled: bool,
}

impl Reservation<'_> {
    /// Turn the slot into a registered client
    pub fn fill(mut self, record: Arc<ClientRecord>) {
        let mut members = self.registry.members.write();
        members.reserved -= 1;
        members.clients.push(record);
        self.filled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.registry.members.write().reserved -= 1;
        }
    }
}
