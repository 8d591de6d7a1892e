use super::{
    dispute::check_registrable,
    ledger::{Ledger, LedgerError, Phase},
};
use crate::{
    channel::{PartIdx, SignedState, SignedWithdrawalAuth, PARTICIPANTS},
    encoding, sig,
    types::{Hash, Timestamp, U256},
    validator::{self, InvalidTransition, SignatureError},
};
use core::fmt::Display;
use tracing::{debug, info};

#[derive(Debug)]
pub enum SettlementError {
    Ledger(LedgerError),
    AbiEncodeError(encoding::Error),
    Signature(SignatureError),
    InvalidTransition(InvalidTransition),
    ChallengePeriodNotOver { deadline: Timestamp },
    StateNotFinal,
    /// The withdrawal authorization is for another channel or not signed by
    /// the participant.
    InvalidAuth,
    AmountMismatch { expected: U256, actual: U256 },
    AlreadyWithdrawn(PartIdx),
}
impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}
impl From<encoding::Error> for SettlementError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}
impl From<SignatureError> for SettlementError {
    fn from(e: SignatureError) -> Self {
        Self::Signature(e)
    }
}
impl From<InvalidTransition> for SettlementError {
    fn from(e: InvalidTransition) -> Self {
        Self::InvalidTransition(e)
    }
}

impl Display for SettlementError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SettlementError::Ledger(e) => Display::fmt(e, f),
            SettlementError::AbiEncodeError(e) => Display::fmt(e, f),
            SettlementError::Signature(e) => Display::fmt(e, f),
            SettlementError::InvalidTransition(e) => Display::fmt(e, f),
            SettlementError::ChallengePeriodNotOver { deadline } => {
                write!(f, "challenge period runs until {}", deadline)
            }
            SettlementError::StateNotFinal => f.write_str("state is not final"),
            SettlementError::InvalidAuth => f.write_str("invalid withdrawal authorization"),
            SettlementError::AmountMismatch { expected, actual } => {
                write!(f, "withdrawal of {} but balance is {}", actual, expected)
            }
            SettlementError::AlreadyWithdrawn(idx) => {
                write!(f, "participant {} already withdrew", idx)
            }
        }
    }
}

impl Ledger {
    /// Fix the outcome of a dispute whose challenge period is over.
    pub fn conclude(&mut self, id: Hash, now: Timestamp) -> Result<(), SettlementError> {
        let channel = self.channel_mut(id)?;
        channel.expect_phase(Phase::Disputed)?;

        // A disputed channel always has a deadline.
        let deadline = channel.deadline.unwrap_or(Timestamp::MAX);
        if now < deadline {
            return Err(SettlementError::ChallengePeriodNotOver { deadline });
        }

        channel.phase = Phase::Concluded;
        info!(channel = ?id, version = channel.version(), "channel concluded");
        Ok(())
    }

    /// Cooperative close: conclude immediately with a final state signed by
    /// both participants, no challenge period needed.
    pub fn conclude_final(
        &mut self,
        id: Hash,
        signed: SignedState,
        now: Timestamp,
    ) -> Result<(), SettlementError> {
        let channel = self.channel_mut(id)?;
        match channel.phase {
            Phase::Open | Phase::Disputed => {}
            actual => {
                return Err(LedgerError::WrongPhase {
                    expected: Phase::Open,
                    actual,
                }
                .into())
            }
        }
        if !signed.state.is_final {
            return Err(SettlementError::StateNotFinal);
        }

        check_registrable(channel, &signed.state)?;
        validator::verify_signatures(&channel.params, &signed)?;

        channel.state = signed.state;
        channel.registered = Some(signed);
        channel.phase = Phase::Concluded;
        channel.deadline = Some(now);
        info!(channel = ?id, version = signed.state.version(), "channel closed cooperatively");
        Ok(())
    }

    /// Final balances of a concluded channel.
    pub fn outcome(&self, id: Hash) -> Result<[U256; PARTICIPANTS], SettlementError> {
        let channel = self.channel(id)?;
        channel.expect_phase(Phase::Concluded)?;
        Ok(channel.state.balances)
    }

    /// Release the final balance of the participant that signed `auth`.
    ///
    /// Each participant can withdraw exactly once. Returns the amount paid out
    /// to `auth.receiver`.
    pub fn withdraw(
        &mut self,
        id: Hash,
        signed: SignedWithdrawalAuth,
    ) -> Result<U256, SettlementError> {
        let channel = self.channel_mut(id)?;
        channel.expect_phase(Phase::Concluded)?;

        let auth = signed.auth;
        if auth.channel_id != id {
            return Err(SettlementError::InvalidAuth);
        }
        let idx = channel
            .params
            .part_idx(auth.participant)
            .ok_or(SettlementError::InvalidAuth)?;
        if !sig::verify(auth.hash()?, signed.sig, auth.participant) {
            return Err(SettlementError::InvalidAuth);
        }
        if channel.withdrawn[idx] {
            return Err(SettlementError::AlreadyWithdrawn(idx));
        }

        let expected = channel.state.balances[idx];
        if auth.amount != expected {
            return Err(SettlementError::AmountMismatch {
                expected,
                actual: auth.amount,
            });
        }

        channel.withdrawn[idx] = true;
        debug!(channel = ?id, idx, receiver = ?auth.receiver, "withdrawal");
        Ok(expected)
    }
}
