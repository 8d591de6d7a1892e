//! The `StateChannel` adjudicator: holds deposits, arbitrates disputes and
//! pays out the final balances.
//!
//! A deployed instance is bound to two accounts (Alice and Bob) and can host
//! any number of channels between them, distinguished by their nonce.

mod dispute;
mod ledger;
mod settlement;

pub use dispute::{DisputeError, Registration};
pub use ledger::{Channel, Ledger, LedgerError, Phase};
pub use settlement::SettlementError;

use crate::{
    channel::{Params, PartIdx, SignedState, SignedWithdrawalAuth, PARTICIPANTS},
    messages::AdjudicatorRequest,
    types::{Address, Hash, Timestamp, U256},
};
use alloc::vec::Vec;
use core::fmt::Display;

/// Name under which the contract is deployed.
pub const CONTRACT_NAME: &str = "StateChannel";

/// Observable effects of the contract calls, in call order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Opened { id: Hash },
    Deposited { id: Hash, idx: PartIdx, amount: U256 },
    Funded { id: Hash },
    Registered { id: Hash, version: u64, deadline: Timestamp },
    Refuted { id: Hash, version: u64 },
    Concluded { id: Hash, version: u64 },
    Withdrawn { id: Hash, receiver: Address, amount: U256 },
}

/// Error of a request received over the wire.
#[derive(Debug)]
pub enum RequestError {
    Ledger(LedgerError),
    Dispute(DisputeError),
    Settlement(SettlementError),
}
impl From<LedgerError> for RequestError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}
impl From<DisputeError> for RequestError {
    fn from(e: DisputeError) -> Self {
        Self::Dispute(e)
    }
}
impl From<SettlementError> for RequestError {
    fn from(e: SettlementError) -> Self {
        Self::Settlement(e)
    }
}

impl Display for RequestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RequestError::Ledger(e) => Display::fmt(e, f),
            RequestError::Dispute(e) => Display::fmt(e, f),
            RequestError::Settlement(e) => Display::fmt(e, f),
        }
    }
}

#[derive(Debug)]
pub struct StateChannel {
    participants: [Address; PARTICIPANTS],
    ledger: Ledger,
    events: Vec<Event>,
}

impl StateChannel {
    /// Constructor arguments of the deployed contract.
    pub fn new(alice: Address, bob: Address) -> Self {
        StateChannel {
            participants: [alice, bob],
            ledger: Ledger::new(),
            events: Vec::new(),
        }
    }

    pub fn participants(&self) -> [Address; PARTICIPANTS] {
        self.participants
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Parameters of a channel between the contract's participants.
    pub fn params(&self, nonce: U256, challenge_duration: u64) -> Params {
        Params {
            participants: self.participants,
            challenge_duration,
            nonce,
        }
    }

    pub fn open(
        &mut self,
        nonce: U256,
        challenge_duration: u64,
        funding: [U256; PARTICIPANTS],
    ) -> Result<Hash, LedgerError> {
        let params = self.params(nonce, challenge_duration);
        let id = self.ledger.open(params, funding)?;
        self.events.push(Event::Opened { id });
        if self.ledger.phase(id)? == Phase::Open {
            self.events.push(Event::Funded { id });
        }
        Ok(id)
    }

    pub fn deposit(&mut self, id: Hash, idx: PartIdx, amount: U256) -> Result<(), LedgerError> {
        let phase = self.ledger.deposit(id, idx, amount)?;
        self.events.push(Event::Deposited { id, idx, amount });
        if phase == Phase::Open {
            self.events.push(Event::Funded { id });
        }
        Ok(())
    }

    pub fn register(
        &mut self,
        id: Hash,
        signed: SignedState,
        now: Timestamp,
    ) -> Result<Registration, DisputeError> {
        let registration = self.ledger.register(id, signed, now)?;
        self.push_registration(id, signed.state.version(), registration);
        Ok(registration)
    }

    pub fn refute(
        &mut self,
        id: Hash,
        signed: SignedState,
        now: Timestamp,
    ) -> Result<Registration, DisputeError> {
        let registration = self.ledger.refute(id, signed, now)?;
        self.push_registration(id, signed.state.version(), registration);
        Ok(registration)
    }

    fn push_registration(&mut self, id: Hash, version: u64, registration: Registration) {
        self.events.push(match registration {
            Registration::Started { deadline } => Event::Registered {
                id,
                version,
                deadline,
            },
            Registration::Refuted { .. } => Event::Refuted { id, version },
            Registration::Concluded => Event::Concluded { id, version },
        });
    }

    pub fn conclude(&mut self, id: Hash, now: Timestamp) -> Result<(), SettlementError> {
        self.ledger.conclude(id, now)?;
        let version = self.ledger.version(id)?;
        self.events.push(Event::Concluded { id, version });
        Ok(())
    }

    pub fn conclude_final(
        &mut self,
        id: Hash,
        signed: SignedState,
        now: Timestamp,
    ) -> Result<(), SettlementError> {
        self.ledger.conclude_final(id, signed, now)?;
        self.events.push(Event::Concluded {
            id,
            version: signed.state.version(),
        });
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        id: Hash,
        auth: SignedWithdrawalAuth,
    ) -> Result<U256, SettlementError> {
        let amount = self.ledger.withdraw(id, auth)?;
        self.events.push(Event::Withdrawn {
            id,
            receiver: auth.auth.receiver,
            amount,
        });
        Ok(amount)
    }

    /// Dispatch a request sent by a participant at block time `now`.
    pub fn handle_request(
        &mut self,
        req: AdjudicatorRequest,
        now: Timestamp,
    ) -> Result<(), RequestError> {
        match req {
            AdjudicatorRequest::Register(req) => {
                let id = req.params.channel_id().map_err(LedgerError::from)?;
                self.register(id, req.signed, now)?;
            }
            AdjudicatorRequest::ConcludeFinal(req) => {
                let id = req.params.channel_id().map_err(LedgerError::from)?;
                self.conclude_final(id, req.signed, now)?;
            }
            AdjudicatorRequest::Conclude { id } => self.conclude(id, now)?,
            AdjudicatorRequest::Withdraw(auth) => {
                self.withdraw(auth.auth.channel_id, auth)?;
            }
        }
        Ok(())
    }

    pub fn outcome(&self, id: Hash) -> Result<[U256; PARTICIPANTS], SettlementError> {
        self.ledger.outcome(id)
    }
}
