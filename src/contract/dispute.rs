use super::ledger::{Channel, Ledger, LedgerError, Phase};
use crate::{
    channel::{SignedState, State},
    types::{Hash, Timestamp},
    validator::{self, InvalidTransition, SignatureError, VersionRule},
};
use core::fmt::Display;
use tracing::{info, warn};

#[derive(Debug)]
pub enum DisputeError {
    Ledger(LedgerError),
    Signature(SignatureError),
    InvalidTransition(InvalidTransition),
    /// The deadline has passed, only `conclude` is possible now.
    ChallengePeriodOver { deadline: Timestamp },
}
impl From<LedgerError> for DisputeError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}
impl From<SignatureError> for DisputeError {
    fn from(e: SignatureError) -> Self {
        Self::Signature(e)
    }
}
impl From<InvalidTransition> for DisputeError {
    fn from(e: InvalidTransition) -> Self {
        Self::InvalidTransition(e)
    }
}

impl Display for DisputeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DisputeError::Ledger(e) => Display::fmt(e, f),
            DisputeError::Signature(e) => Display::fmt(e, f),
            DisputeError::InvalidTransition(e) => Display::fmt(e, f),
            DisputeError::ChallengePeriodOver { deadline } => {
                write!(f, "challenge period ended at {}", deadline)
            }
        }
    }
}

/// Result of a successful registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Registration {
    /// First registration, a dispute is running until `deadline`.
    Started { deadline: Timestamp },
    /// A newer state replaced the registered one, the deadline is unchanged.
    Refuted { deadline: Timestamp },
    /// The registered state was final, the channel concluded immediately.
    Concluded,
}

/// Checks `next` against the latest state the adjudicator knows of.
///
/// Before any registration the known state is the initial one, which may be
/// registered again (version 0 signed by both), so versions only have to be
/// at least as new. Once a state is registered only newer ones are accepted.
pub(super) fn check_registrable(channel: &Channel, next: &State) -> Result<(), InvalidTransition> {
    if channel.registered.is_some() {
        return validator::check_valid_transition(&channel.state, next, VersionRule::Newer);
    }

    if next.channel_id() != channel.id() {
        Err(InvalidTransition::InvalidChannelID)
    } else if next.version() < channel.version() {
        Err(InvalidTransition::InvalidVersionNumber)
    } else if next.total().is_none() || next.total() != channel.state.total() {
        Err(InvalidTransition::TotalAllocationAmountMismatch)
    } else {
        Ok(())
    }
}

impl Ledger {
    /// Register `signed` as the latest state of channel `id` at time `now`.
    ///
    /// The first registration starts the challenge period. While it runs,
    /// either party may register a newer state, which keeps the deadline.
    /// A final state concludes the channel immediately.
    pub fn register(
        &mut self,
        id: Hash,
        signed: SignedState,
        now: Timestamp,
    ) -> Result<Registration, DisputeError> {
        let channel = self.channel_mut(id)?;
        match channel.phase {
            Phase::Open => {}
            Phase::Disputed => {
                if let Some(deadline) = channel.deadline {
                    if now >= deadline {
                        warn!(channel = ?id, now, deadline, "registration after deadline");
                        return Err(DisputeError::ChallengePeriodOver { deadline });
                    }
                }
            }
            actual => {
                return Err(LedgerError::WrongPhase {
                    expected: Phase::Open,
                    actual,
                }
                .into())
            }
        }

        check_registrable(channel, &signed.state)?;
        validator::verify_signatures(&channel.params, &signed)?;

        let refuting = channel.phase == Phase::Disputed;
        channel.state = signed.state;
        channel.registered = Some(signed);

        if signed.state.is_final {
            channel.phase = Phase::Concluded;
            channel.deadline = Some(now);
            info!(channel = ?id, version = signed.state.version(), "final state registered");
            return Ok(Registration::Concluded);
        }

        let registration = if refuting {
            let deadline = channel.deadline.unwrap_or(now);
            info!(channel = ?id, version = signed.state.version(), "dispute refuted");
            Registration::Refuted { deadline }
        } else {
            let deadline = now.saturating_add(channel.params.challenge_duration);
            channel.phase = Phase::Disputed;
            channel.deadline = Some(deadline);
            info!(channel = ?id, version = signed.state.version(), deadline, "dispute started");
            Registration::Started { deadline }
        };
        Ok(registration)
    }

    /// Replace the registered state of a running dispute with a newer one.
    pub fn refute(
        &mut self,
        id: Hash,
        signed: SignedState,
        now: Timestamp,
    ) -> Result<Registration, DisputeError> {
        self.channel(id)?.expect_phase(Phase::Disputed)?;
        self.register(id, signed, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_util::*;
    use crate::types::U256;

    fn funded_ledger() -> (Ledger, Hash, State) {
        let signers = signers();
        let params = params(&signers);
        let mut ledger = Ledger::new();
        let id = ledger.open(params, [10.into(), 10.into()]).unwrap();
        ledger.deposit(id, 0, 10.into()).unwrap();
        ledger.deposit(id, 1, 10.into()).unwrap();
        let init = State::new(params, [10.into(), 10.into()]).unwrap();
        (ledger, id, init)
    }

    fn pay(state: &State, from: usize, amount: u64) -> State {
        let mut next = state.make_next_state();
        next.transfer(from, U256::from(amount)).unwrap();
        next
    }

    #[test]
    fn register_then_refute_keeps_deadline() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();
        let v1 = pay(&init, 0, 2);
        let v2 = pay(&v1, 0, 2);

        assert_eq!(
            ledger.register(id, sign_all(&signers, v1), 100).unwrap(),
            Registration::Started { deadline: 160 }
        );
        assert_eq!(
            ledger.refute(id, sign_all(&signers, v2), 150).unwrap(),
            Registration::Refuted { deadline: 160 }
        );
        assert_eq!(ledger.version(id).unwrap(), 2);
        assert_eq!(ledger.balance_of(id, 1).unwrap(), 14.into());
    }

    #[test]
    fn stale_refutation_is_rejected() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();
        let v1 = pay(&init, 0, 2);
        let v2 = pay(&v1, 0, 2);

        ledger.register(id, sign_all(&signers, v2), 0).unwrap();
        assert!(matches!(
            ledger.refute(id, sign_all(&signers, v1), 1),
            Err(DisputeError::InvalidTransition(
                InvalidTransition::InvalidVersionNumber
            ))
        ));
        assert_eq!(ledger.version(id).unwrap(), 2);
    }

    #[test]
    fn refutation_after_deadline_is_rejected() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();
        let v1 = pay(&init, 0, 2);
        let v2 = pay(&v1, 0, 2);

        ledger.register(id, sign_all(&signers, v1), 0).unwrap();
        assert!(matches!(
            ledger.refute(id, sign_all(&signers, v2), 60),
            Err(DisputeError::ChallengePeriodOver { deadline: 60 })
        ));
    }

    #[test]
    fn refute_requires_running_dispute() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();
        assert!(matches!(
            ledger.refute(id, sign_all(&signers, pay(&init, 0, 1)), 0),
            Err(DisputeError::Ledger(LedgerError::WrongPhase {
                expected: Phase::Disputed,
                actual: Phase::Open,
            }))
        ));
    }

    #[test]
    fn final_state_concludes_immediately() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();
        let mut fin = pay(&init, 1, 5);
        fin.is_final = true;

        assert_eq!(
            ledger.register(id, sign_all(&signers, fin), 10).unwrap(),
            Registration::Concluded
        );
        assert_eq!(ledger.phase(id).unwrap(), Phase::Concluded);
    }

    #[test]
    fn unsigned_state_is_rejected() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();
        let v1 = pay(&init, 0, 2);
        let mut signed = sign_all(&signers, v1);
        signed.sigs[1] = signers[0].sign_eth(v1.hash().unwrap());

        assert!(matches!(
            ledger.register(id, signed, 0),
            Err(DisputeError::Signature(SignatureError::InvalidSignature {
                idx: 1,
                ..
            }))
        ));
        assert_eq!(ledger.phase(id).unwrap(), Phase::Open);
    }

    #[test]
    fn unfunded_channel_cannot_be_disputed() {
        let signers = signers();
        let params = params(&signers);
        let mut ledger = Ledger::new();
        let id = ledger.open(params, [1.into(), 1.into()]).unwrap();
        let init = State::new(params, [1.into(), 1.into()]).unwrap();
        assert!(matches!(
            ledger.register(id, sign_all(&signers, init), 0),
            Err(DisputeError::Ledger(LedgerError::WrongPhase { .. }))
        ));
    }

    #[test]
    fn initial_state_can_be_registered_once() {
        let signers = signers();
        let (mut ledger, id, init) = funded_ledger();

        assert_eq!(
            ledger.register(id, sign_all(&signers, init), 10).unwrap(),
            Registration::Started { deadline: 70 }
        );
        assert_eq!(ledger.version(id).unwrap(), 0);
        assert!(matches!(
            ledger.register(id, sign_all(&signers, init), 20),
            Err(DisputeError::InvalidTransition(
                InvalidTransition::InvalidVersionNumber
            ))
        ));
    }
}
