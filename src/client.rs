use crate::channel::{ActiveChannel, Params, PartIdx, SignedState, State};
use crate::sig::Signer;
use crate::validator::SignatureError;
use crate::wire::MessageBus;
use crate::{encoding, Address, Signature};

/// The main object of a participant, used to create channels and sign
/// states.
///
/// It owns the private key and knows how to reach the other participant and
/// the adjudicator. Usually you only need one StateChannelClient.
///
/// Note: An application will usually have only one MessageBus type, thus
/// using dynamic dispatch here doesn't make much sense.
#[derive(Debug)]
pub struct StateChannelClient<B: MessageBus> {
    pub(crate) bus: B,
    pub(crate) signer: Signer,
}

impl<B: MessageBus> StateChannelClient<B> {
    /// Creates a new [StateChannelClient] with the given [MessageBus].
    pub fn new(bus: B, signer: Signer) -> Self {
        StateChannelClient { bus, signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Sign `state`, for example the initial state that has to be exchanged
    /// before the channel is funded.
    pub fn sign_state(&self, state: &State) -> Result<Signature, encoding::Error> {
        Ok(self.signer.sign_eth(state.hash()?))
    }

    /// Start using a channel whose initial state has been signed by everyone.
    ///
    /// The signatures are checked, the participant index is derived from our
    /// address.
    pub fn open_channel(
        &self,
        params: Params,
        init: SignedState,
    ) -> Result<ActiveChannel<'_, B>, OpenError> {
        let part_idx: PartIdx = params
            .part_idx(self.address())
            .ok_or(OpenError::NotAParticipant)?;
        if init.state.channel_id() != params.channel_id()? || init.state.version() != 0 {
            return Err(OpenError::NotAnInitialState);
        }
        crate::validator::verify_signatures(&params, &init)?;
        Ok(ActiveChannel::new(self, part_idx, params, init.state, init.sigs))
    }
}

#[derive(Debug)]
pub enum OpenError {
    AbiEncodeError(encoding::Error),
    Signature(SignatureError),
    NotAParticipant,
    NotAnInitialState,
}
impl From<encoding::Error> for OpenError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}
impl From<SignatureError> for OpenError {
    fn from(e: SignatureError) -> Self {
        Self::Signature(e)
    }
}
