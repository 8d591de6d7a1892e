use super::{
    channel_update::ChannelUpdate, make_signed_withdrawal_auth, Params, PartIdx, SignedState,
    State, WithdrawalAuthError, PARTICIPANTS,
};
use crate::{
    encoding,
    messages::{AdjudicatorRequest, ChannelUpdateMsg, ParticipantMessage, RegisterReq},
    types::{Address, Hash, Signature},
    validator::{self, InvalidTransition, SignatureError, VersionRule},
    wire::MessageBus,
    StateChannelClient,
};
use tracing::debug;

#[derive(Debug)]
pub enum ProposeUpdateError {
    AbiEncodeError(encoding::Error),
    InvalidUpdate(InvalidTransition),
}
impl From<encoding::Error> for ProposeUpdateError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}
impl From<InvalidTransition> for ProposeUpdateError {
    fn from(e: InvalidTransition) -> Self {
        Self::InvalidUpdate(e)
    }
}

#[derive(Debug)]
pub enum HandleUpdateError {
    InvalidActor(PartIdx),
    Signature(SignatureError),
    InvalidUpdate(InvalidTransition),
}
impl From<SignatureError> for HandleUpdateError {
    fn from(e: SignatureError) -> Self {
        Self::Signature(e)
    }
}
impl From<InvalidTransition> for HandleUpdateError {
    fn from(e: InvalidTransition) -> Self {
        Self::InvalidUpdate(e)
    }
}

/// A funded channel from the point of view of one participant.
///
/// Holds the latest state signed by everyone, which is what gets registered
/// with the adjudicator if the other participant stops cooperating.
#[derive(Debug)]
pub struct ActiveChannel<'cl, B: MessageBus> {
    part_idx: PartIdx,
    client: &'cl StateChannelClient<B>,
    state: State,
    params: Params,
    signatures: [Signature; PARTICIPANTS],
}

impl<'cl, B: MessageBus> ActiveChannel<'cl, B> {
    pub(crate) fn new(
        client: &'cl StateChannelClient<B>,
        part_idx: PartIdx,
        params: Params,
        init_state: State,
        signatures: [Signature; PARTICIPANTS],
    ) -> Self {
        debug_assert!(part_idx < params.participants.len());

        ActiveChannel {
            part_idx,
            client,
            state: init_state,
            params,
            signatures,
        }
    }

    pub fn channel_id(&self) -> Hash {
        self.state.channel_id()
    }

    pub fn version(&self) -> u64 {
        self.state.version()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn part_idx(&self) -> PartIdx {
        self.part_idx
    }

    pub fn client(&self) -> &StateChannelClient<B> {
        self.client
    }

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn signed_state(&self) -> SignedState {
        SignedState {
            state: self.state,
            sigs: self.signatures,
        }
    }

    /// Propose `new_state` to the other participant.
    ///
    /// The returned [ChannelUpdate] already carries our signature, it has to
    /// collect the other one before it can be applied.
    pub fn update(
        &mut self,
        new_state: State,
    ) -> Result<ChannelUpdate<'cl, '_, B>, ProposeUpdateError> {
        validator::check_valid_transition(&self.state, &new_state, VersionRule::Successor)?;

        // Sign immediately, we need the signature to send the proposal.
        let sig = self.client.signer.sign_eth(new_state.hash()?);
        self.client
            .bus
            .send_to_participants(ParticipantMessage::ChannelUpdate(ChannelUpdateMsg {
                state: new_state,
                actor_idx: self.part_idx,
                sig,
            }));
        debug!(channel = ?self.channel_id(), version = new_state.version(), "update proposed");

        let part_idx = self.part_idx;
        Ok(ChannelUpdate::new(self, new_state, part_idx, sig))
    }

    /// Pay `amount` to the other participant.
    pub fn pay(
        &mut self,
        amount: crate::U256,
    ) -> Result<ChannelUpdate<'cl, '_, B>, ProposeUpdateError> {
        let mut new_state = self.state.make_next_state();
        if new_state.transfer(self.part_idx, amount).is_err() {
            return Err(InvalidTransition::TotalAllocationAmountMismatch.into());
        }
        self.update(new_state)
    }

    /// Check an update proposed by the other participant.
    pub fn handle_update(
        &mut self,
        msg: ChannelUpdateMsg,
    ) -> Result<ChannelUpdate<'cl, '_, B>, HandleUpdateError> {
        if msg.actor_idx >= PARTICIPANTS || msg.actor_idx == self.part_idx {
            return Err(HandleUpdateError::InvalidActor(msg.actor_idx));
        }
        validator::check_valid_transition(&self.state, &msg.state, VersionRule::Successor)?;
        validator::verify_signature(&self.params, &msg.state, msg.actor_idx, msg.sig)?;

        Ok(ChannelUpdate::new(self, msg.state, msg.actor_idx, msg.sig))
    }

    pub(super) fn force_update(&mut self, new_state: State, signatures: [Signature; PARTICIPANTS]) {
        self.state = new_state;
        self.signatures = signatures;
        debug!(channel = ?self.channel_id(), version = new_state.version(), "update applied");
    }

    /// Propose the next state marked as final, so it can be used to close
    /// the channel without a challenge period.
    pub fn close_normal(&mut self) -> Result<ChannelUpdate<'cl, '_, B>, ProposeUpdateError> {
        let mut new_state = self.state.make_next_state();
        new_state.is_final = true;
        self.update(new_state)
    }

    fn register_req(&self) -> RegisterReq {
        RegisterReq {
            params: self.params,
            signed: self.signed_state(),
        }
    }

    /// Ask the adjudicator to settle. A final state closes the channel
    /// right away, anything else starts a dispute.
    pub fn force_close(&self) {
        let req = if self.state.is_final {
            AdjudicatorRequest::ConcludeFinal(self.register_req())
        } else {
            AdjudicatorRequest::Register(self.register_req())
        };
        self.client.bus.send_to_adjudicator(req);
    }

    /// Respond to a dispute started by the other participant, which may have
    /// registered an outdated state.
    pub fn handle_dispute(&self, registered_version: u64) {
        if registered_version < self.state.version() {
            self.client
                .bus
                .send_to_adjudicator(AdjudicatorRequest::Register(self.register_req()));
        }
    }

    /// Request the payout of our balance to `receiver`. Only succeeds on-chain
    /// once the channel is concluded.
    pub fn withdraw(&self, receiver: Address) -> Result<(), WithdrawalAuthError> {
        let auth = make_signed_withdrawal_auth(
            &self.client.signer,
            &self.params,
            &self.state,
            receiver,
            self.part_idx,
        )?;
        self.client
            .bus
            .send_to_adjudicator(AdjudicatorRequest::Withdraw(auth));
        Ok(())
    }
}
