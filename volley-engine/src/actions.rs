//! Action legality
//!
//! Legality is a table of predicates over a snapshot of the registry and
//! the selected client, evaluated fresh on every dispatch cycle. Selection
//! is uniform over whatever the table admits.

use crate::client::ClientSnapshot;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;

/// A client revokes only once it holds more than this many certificates
pub const REVOCATION_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NewRegistration,
    NewAuthorization,
    NewCertificate,
    RevokeCertificate,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::NewRegistration,
        Action::NewAuthorization,
        Action::NewCertificate,
        Action::RevokeCertificate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NewRegistration => "new-registration",
            Action::NewAuthorization => "new-authorization",
            Action::NewCertificate => "new-certificate",
            Action::RevokeCertificate => "revoke-certificate",
        }
    }

    /// Whether the action needs an existing client to act as
    pub fn needs_client(&self) -> bool {
        !matches!(self, Action::NewRegistration)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the legality rules may look at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegalityContext {
    pub registry_size: usize,
    /// 0 means unbounded
    pub max_clients: usize,
    /// Registrations in flight that already hold a registry slot
    pub pending_registrations: usize,
    /// The client picked for this cycle, if the registry had one
    pub client: Option<ClientSnapshot>,
}

type Rule = fn(&LegalityContext) -> bool;

fn registry_has_room(ctx: &LegalityContext) -> bool {
    ctx.max_clients == 0 || ctx.registry_size + ctx.pending_registrations < ctx.max_clients
}

fn any_client_exists(ctx: &LegalityContext) -> bool {
    ctx.registry_size > 0 && ctx.client.is_some()
}

fn client_holds_authorization(ctx: &LegalityContext) -> bool {
    ctx.client.is_some_and(|c| c.authorizations > 0)
}

fn client_holds_enough_certificates(ctx: &LegalityContext) -> bool {
    ctx.client
        .is_some_and(|c| c.certificates > REVOCATION_THRESHOLD)
}

pub const LEGALITY_TABLE: &[(Action, Rule)] = &[
    (Action::NewRegistration, registry_has_room),
    (Action::NewAuthorization, any_client_exists),
    (Action::NewCertificate, client_holds_authorization),
    (Action::RevokeCertificate, client_holds_enough_certificates),
];

/// Actions currently legal, in table order
pub fn legal_actions(ctx: &LegalityContext) -> Vec<Action> {
    LEGALITY_TABLE
        .iter()
        .filter(|(_, rule)| rule(ctx))
        .map(|(action, _)| *action)
        .collect()
}

/// Draw one legal action uniformly; `None` when nothing is legal
pub fn choose_action<R: Rng + ?Sized>(ctx: &LegalityContext, rng: &mut R) -> Option<Action> {
    legal_actions(ctx).choose(rng).copied()
}
