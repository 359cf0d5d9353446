use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{PendingCommand, Role, RoleSigners, RoleSummary, Signer, WalletInfo, WalletOutcome};

/// Per-slot correlation state. A slot is one tool (or one wallet widget) in
/// the UI; only the most recently issued sequence may resolve it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SlotState {
    pub last_issued: u64,
    pub pending: Option<PendingCommand>,
    pub last_outcome: Option<WalletOutcome>,
}

/// Everything the console remembers about one browser session.
///
/// Created when the session starts, mutated only by the dispatcher (minting
/// sequences, recording pending commands) and the reconciler, and dropped when
/// the session ends. Nothing here is persisted.
#[derive(Debug)]
pub struct SessionContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    signers: RoleSigners,
    wallet: WalletInfo,
    slots: HashMap<String, SlotState>,
    sequence_counter: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<RoleSummary>,
    pub wallet: WalletInfo,
    pub slots: HashMap<String, SlotState>,
}

impl SessionContext {
    pub fn new(signers: RoleSigners) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            signers,
            wallet: WalletInfo::default(),
            slots: HashMap::new(),
            sequence_counter: 0,
        }
    }

    pub fn signer(&self, role: Role) -> Option<&Signer> {
        self.signers.get(role)
    }

    pub fn wallet(&self) -> &WalletInfo {
        &self.wallet
    }

    pub fn slot(&self, slot: &str) -> Option<&SlotState> {
        self.slots.get(slot)
    }

    pub fn last_issued(&self, slot: &str) -> Option<u64> {
        self.slots.get(slot).map(|state| state.last_issued).filter(|seq| *seq > 0)
    }

    /// Next correlation sequence for `slot`. The counter is session-wide and
    /// only ever increases, so the result is strictly greater than anything
    /// issued before in this slot (or any other).
    pub(crate) fn mint_sequence(&mut self, slot: &str) -> u64 {
        self.sequence_counter += 1;
        let sequence = self.sequence_counter;
        self.slots.entry(slot.to_string()).or_default().last_issued = sequence;
        sequence
    }

    /// Replaces whatever was pending in the slot; the old sequence is dead.
    pub(crate) fn set_pending(&mut self, slot: &str, command: PendingCommand) {
        self.slots.entry(slot.to_string()).or_default().pending = Some(command);
    }

    /// Applies a wallet outcome whose sequence already matched the slot.
    pub(crate) fn complete_slot(&mut self, slot: &str, outcome: &WalletOutcome) {
        if let Some(address) = outcome.address.as_deref().and_then(|raw| raw.parse().ok()) {
            self.wallet.address = Some(address);
        }
        if let Some(chain_id) = outcome.chain_id.as_ref().and_then(|id| id.as_u64()) {
            self.wallet.chain_id = Some(chain_id);
        }

        let state = self.slots.entry(slot.to_string()).or_default();
        state.pending = None;
        state.last_outcome = Some(outcome.clone());
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            roles: self.signers.summary(),
            wallet: self.wallet.clone(),
            slots: self.slots.clone(),
        }
    }
}
