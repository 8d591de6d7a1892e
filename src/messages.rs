use crate::{
    channel::{Params, PartIdx, SignedState, SignedWithdrawalAuth, State},
    types::{Hash, Signature},
};
use alloc::string::String;

/// A state proposed by `actor_idx`, carrying its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelUpdateMsg {
    pub state: State,
    pub actor_idx: PartIdx,
    pub sig: Signature,
}

/// Signature of the receiving participant on a proposed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelUpdateAccepted {
    pub channel: Hash,
    pub version: u64,
    pub sig: Signature,
}

/// Messages sent between participants of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantMessage {
    ChannelUpdate(ChannelUpdateMsg),
    ChannelUpdateAccepted(ChannelUpdateAccepted),
    ChannelUpdateRejected {
        id: Hash,
        version: u64,
        reason: String,
    },
}

/// A signed state together with the parameters the adjudicator needs to
/// check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterReq {
    pub params: Params,
    pub signed: SignedState,
}

/// Messages sent to the adjudicator (the `StateChannel` contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjudicatorRequest {
    /// Start or refute a dispute with the given state.
    Register(RegisterReq),
    /// Close the channel with a final state signed by all participants.
    ConcludeFinal(RegisterReq),
    /// Fix the outcome after the challenge period.
    Conclude { id: Hash },
    Withdraw(SignedWithdrawalAuth),
}
