use crate::{
    channel::{Params, PartIdx, SignedState, State, PARTICIPANTS},
    encoding,
    types::{Hash, Timestamp, U256},
};
use alloc::collections::BTreeMap;
use core::fmt::Display;
use tracing::{debug, info};

/// Lifecycle of a channel as seen by the adjudicator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for deposits to match the funding agreement.
    Funding,
    /// Fully funded, updates happen off-chain.
    Open,
    /// A state has been registered, refutations are possible until the
    /// deadline.
    Disputed,
    /// The outcome is fixed, participants can withdraw.
    Concluded,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LedgerError {
    AbiEncodeError(encoding::Error),
    UnknownChannel(Hash),
    ChannelExists(Hash),
    InvalidParams(&'static str),
    InvalidParticipant(PartIdx),
    WrongPhase { expected: Phase, actual: Phase },
    OverFunded,
}
impl From<encoding::Error> for LedgerError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LedgerError::AbiEncodeError(e) => write!(f, "encoding params: {}", e),
            LedgerError::UnknownChannel(id) => write!(f, "unknown channel {:?}", id),
            LedgerError::ChannelExists(id) => write!(f, "channel {:?} already exists", id),
            LedgerError::InvalidParams(reason) => write!(f, "invalid params: {}", reason),
            LedgerError::InvalidParticipant(idx) => write!(f, "no participant {}", idx),
            LedgerError::WrongPhase { expected, actual } => {
                write!(f, "channel is {:?}, expected {:?}", actual, expected)
            }
            LedgerError::OverFunded => f.write_str("deposit exceeds funding agreement"),
        }
    }
}

/// Everything the adjudicator knows about one channel.
#[derive(Debug, Clone)]
pub struct Channel {
    pub params: Params,
    pub funding: [U256; PARTICIPANTS],
    pub deposits: [U256; PARTICIPANTS],
    /// Latest state known on-chain. Starts as the initial state and is
    /// replaced by registered states during a dispute.
    pub state: State,
    /// The registered state with its signatures, `None` until a dispute.
    pub registered: Option<SignedState>,
    pub phase: Phase,
    pub deadline: Option<Timestamp>,
    pub withdrawn: [bool; PARTICIPANTS],
}

impl Channel {
    pub fn id(&self) -> Hash {
        self.state.channel_id()
    }

    pub fn version(&self) -> u64 {
        self.state.version()
    }

    pub fn total_deposit(&self) -> Option<U256> {
        self.deposits
            .iter()
            .try_fold(U256::zero(), |acc, d| acc.checked_add(*d))
    }

    pub(crate) fn expect_phase(&self, expected: Phase) -> Result<(), LedgerError> {
        if self.phase != expected {
            return Err(LedgerError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }
}

/// Per-channel deposits, balances and versions.
#[derive(Debug, Default)]
pub struct Ledger {
    channels: BTreeMap<Hash, Channel>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new channel. `funding` is how much each participant has
    /// to deposit, it also becomes the initial balance distribution.
    pub fn open(
        &mut self,
        params: Params,
        funding: [U256; PARTICIPANTS],
    ) -> Result<Hash, LedgerError> {
        if params.participants[0] == params.participants[1] {
            return Err(LedgerError::InvalidParams("participants must differ"));
        }
        if params.challenge_duration == 0 {
            return Err(LedgerError::InvalidParams("challenge duration is zero"));
        }

        let state = State::new(params, funding)?;
        if state.total().is_none() {
            return Err(LedgerError::InvalidParams("funding overflows"));
        }
        let id = state.channel_id();
        if self.channels.contains_key(&id) {
            return Err(LedgerError::ChannelExists(id));
        }

        let all_zero = funding.iter().all(|f| f.is_zero());
        let channel = Channel {
            params,
            funding,
            deposits: [U256::zero(); PARTICIPANTS],
            state,
            registered: None,
            phase: if all_zero { Phase::Open } else { Phase::Funding },
            deadline: None,
            withdrawn: [false; PARTICIPANTS],
        };
        self.channels.insert(id, channel);
        info!(channel = ?id, "channel opened");
        Ok(id)
    }

    /// Adds `amount` to the deposit of participant `idx`. Returns the phase
    /// after the deposit.
    pub fn deposit(&mut self, id: Hash, idx: PartIdx, amount: U256) -> Result<Phase, LedgerError> {
        let channel = self.channel_mut(id)?;
        channel.expect_phase(Phase::Funding)?;
        if idx >= PARTICIPANTS {
            return Err(LedgerError::InvalidParticipant(idx));
        }

        let new_deposit = channel.deposits[idx]
            .checked_add(amount)
            .ok_or(LedgerError::OverFunded)?;
        if new_deposit > channel.funding[idx] {
            return Err(LedgerError::OverFunded);
        }
        channel.deposits[idx] = new_deposit;
        debug!(channel = ?id, idx, "deposit received");

        if channel.deposits == channel.funding {
            channel.phase = Phase::Open;
            info!(channel = ?id, "channel funded");
        }
        Ok(channel.phase)
    }

    pub fn channel(&self, id: Hash) -> Result<&Channel, LedgerError> {
        self.channels.get(&id).ok_or(LedgerError::UnknownChannel(id))
    }

    pub(crate) fn channel_mut(&mut self, id: Hash) -> Result<&mut Channel, LedgerError> {
        self.channels
            .get_mut(&id)
            .ok_or(LedgerError::UnknownChannel(id))
    }

    pub fn balance_of(&self, id: Hash, idx: PartIdx) -> Result<U256, LedgerError> {
        let channel = self.channel(id)?;
        channel
            .state
            .balances
            .get(idx)
            .copied()
            .ok_or(LedgerError::InvalidParticipant(idx))
    }

    pub fn version(&self, id: Hash) -> Result<u64, LedgerError> {
        Ok(self.channel(id)?.version())
    }

    pub fn phase(&self, id: Hash) -> Result<Phase, LedgerError> {
        Ok(self.channel(id)?.phase)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_util::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn channel_opens_after_full_funding() {
        let mut ledger = Ledger::new();
        let id = ledger
            .open(params(&signers()), [10.into(), 5.into()])
            .unwrap();
        assert_eq!(ledger.phase(id).unwrap(), Phase::Funding);

        assert_eq!(ledger.deposit(id, 0, 10.into()).unwrap(), Phase::Funding);
        assert_eq!(ledger.deposit(id, 1, 2.into()).unwrap(), Phase::Funding);
        assert_eq!(ledger.deposit(id, 1, 3.into()).unwrap(), Phase::Open);

        assert_eq!(ledger.balance_of(id, 0).unwrap(), 10.into());
        assert_eq!(ledger.balance_of(id, 1).unwrap(), 5.into());
        assert_eq!(ledger.version(id).unwrap(), 0);
        assert_eq!(ledger.channel(id).unwrap().total_deposit(), Some(15.into()));
    }

    #[test]
    fn over_funding_is_rejected() {
        let mut ledger = Ledger::new();
        let id = ledger
            .open(params(&signers()), [10.into(), 5.into()])
            .unwrap();
        assert_eq!(
            ledger.deposit(id, 1, 6.into()),
            Err(LedgerError::OverFunded)
        );
        assert_eq!(
            ledger.deposit(id, 2, 1.into()),
            Err(LedgerError::InvalidParticipant(2))
        );
    }

    #[test]
    fn duplicate_and_invalid_channels_are_rejected() {
        let signers = signers();
        let mut ledger = Ledger::new();
        let id = ledger.open(params(&signers), [1.into(), 1.into()]).unwrap();
        assert_eq!(
            ledger.open(params(&signers), [1.into(), 1.into()]),
            Err(LedgerError::ChannelExists(id))
        );

        let mut same = params(&signers);
        same.participants[1] = same.participants[0];
        assert!(matches!(
            ledger.open(same, [1.into(), 1.into()]),
            Err(LedgerError::InvalidParams(_))
        ));

        let mut no_challenge = params(&signers);
        no_challenge.challenge_duration = 0;
        assert!(matches!(
            ledger.open(no_challenge, [1.into(), 1.into()]),
            Err(LedgerError::InvalidParams(_))
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unfunded_channel_is_open_immediately() {
        let mut ledger = Ledger::new();
        let id = ledger
            .open(params(&signers()), [0.into(), 0.into()])
            .unwrap();
        assert_eq!(ledger.phase(id).unwrap(), Phase::Open);
        assert!(matches!(
            ledger.deposit(id, 0, 1.into()),
            Err(LedgerError::WrongPhase {
                expected: Phase::Funding,
                actual: Phase::Open
            })
        ));
    }

    #[test]
    fn unknown_channel() {
        let mut rng = StdRng::seed_from_u64(11);
        let id: Hash = rng.gen();
        let ledger = Ledger::new();
        assert_eq!(
            ledger.version(id).unwrap_err(),
            LedgerError::UnknownChannel(id)
        );
        assert_eq!(
            ledger.phase(id).unwrap_err(),
            LedgerError::UnknownChannel(id)
        );
    }
}
