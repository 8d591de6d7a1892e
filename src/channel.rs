//! Off-chain representation of a two party payment channel.

mod active;
mod channel_update;
mod withdrawal_auth;

use crate::{
    encoding,
    types::{Address, Hash, Signature, U256},
};
use serde::Serialize;

pub use active::*;
pub use channel_update::*;
pub use withdrawal_auth::*;

/// Number of participants in every channel.
pub const PARTICIPANTS: usize = 2;

/// ID (Index) of a participant in the channel.
///
/// `0` is the proposer of the channel (Alice), `1` the other party (Bob).
pub type PartIdx = usize;

/// Parameters for this channel, fixed when the channel is opened and sent
/// to the adjudicator in every dispute.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Params {
    pub participants: [Address; PARTICIPANTS],
    /// Seconds the other party has to refute a registered state.
    pub challenge_duration: u64,
    pub nonce: U256,
}

impl Params {
    pub fn channel_id(&self) -> Result<Hash, encoding::Error> {
        encoding::to_hash(self)
    }

    /// Index of `addr` in the participant list.
    pub fn part_idx(&self, addr: Address) -> Option<PartIdx> {
        self.participants.iter().position(|p| *p == addr)
    }
}

/// Stores the complete state of a channel.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct State {
    id: Hash,
    version: u64,
    pub balances: [U256; PARTICIPANTS],
    pub is_final: bool,
}

impl State {
    /// Initial state (version 0) of the channel described by `params`.
    pub fn new(params: Params, init_bals: [U256; PARTICIPANTS]) -> Result<Self, encoding::Error> {
        Ok(State {
            id: params.channel_id()?,
            version: 0,
            balances: init_bals,
            is_final: false,
        })
    }

    /// Rebuild a state received from the wire.
    pub(crate) fn from_raw(
        id: Hash,
        version: u64,
        balances: [U256; PARTICIPANTS],
        is_final: bool,
    ) -> Self {
        State {
            id,
            version,
            balances,
            is_final,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn channel_id(&self) -> Hash {
        self.id
    }

    /// Create a new state that will replace this state.
    ///
    /// Having id and version as private fields forces callers to derive a
    /// successor from an existing state instead of writing either field by
    /// hand.
    pub fn make_next_state(&self) -> Self {
        State {
            id: self.id,
            version: self.version + 1,
            balances: self.balances,
            is_final: self.is_final,
        }
    }

    /// Sum of all balances, `None` on overflow.
    pub fn total(&self) -> Option<U256> {
        self.balances
            .iter()
            .try_fold(U256::zero(), |acc, b| acc.checked_add(*b))
    }

    /// Move `amount` from participant `from` to the other participant.
    pub fn transfer(&mut self, from: PartIdx, amount: U256) -> Result<(), InsufficientFunds> {
        let to = match from {
            0 => 1,
            1 => 0,
            _ => return Err(InsufficientFunds),
        };
        let remaining = self.balances[from]
            .checked_sub(amount)
            .ok_or(InsufficientFunds)?;
        let received = self.balances[to]
            .checked_add(amount)
            .ok_or(InsufficientFunds)?;
        self.balances[from] = remaining;
        self.balances[to] = received;
        Ok(())
    }

    pub fn hash(&self) -> Result<Hash, encoding::Error> {
        encoding::to_hash(self)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InsufficientFunds;

/// A state together with the signatures of all participants.
///
/// This is what gets registered with the adjudicator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SignedState {
    pub state: State,
    pub sigs: [Signature; PARTICIPANTS],
}
