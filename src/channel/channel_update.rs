use super::{active::ActiveChannel, PartIdx, State, PARTICIPANTS};
use crate::{
    encoding,
    messages::{ChannelUpdateAccepted, ParticipantMessage},
    types::Signature,
    validator::{self, SignatureError},
    wire::MessageBus,
};
use alloc::string::ToString;

/// Error returned when the update was already accepted by a participant.
#[derive(Debug)]
pub enum AcceptError {
    AbiEncodeError(encoding::Error),
    AlreadyAccepted,
}
impl From<encoding::Error> for AcceptError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}

#[derive(Debug)]
pub enum AddSignatureError {
    Signature(SignatureError),
    AlreadySigned,
    InvalidParticipant(PartIdx),
    InvalidChannelID,
    InvalidVersionNumber,
}
impl From<SignatureError> for AddSignatureError {
    fn from(e: SignatureError) -> Self {
        Self::Signature(e)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ApplyError {
    MissingSignature(PartIdx),
}

/// An update that is waiting for the signatures of all participants.
#[derive(Debug)]
pub struct ChannelUpdate<'cl, 'ch, B: MessageBus> {
    channel: &'ch mut ActiveChannel<'cl, B>,
    new_state: State,
    signatures: [Option<Signature>; PARTICIPANTS],
}

impl<'cl, 'ch, B: MessageBus> ChannelUpdate<'cl, 'ch, B> {
    pub(crate) fn new(
        channel: &'ch mut ActiveChannel<'cl, B>,
        new_state: State,
        sig_part_idx: PartIdx,
        sig: Signature,
    ) -> Self {
        let mut signatures = [None; PARTICIPANTS];
        signatures[sig_part_idx] = Some(sig);
        ChannelUpdate {
            channel,
            new_state,
            signatures,
        }
    }

    pub fn new_state(&self) -> State {
        self.new_state
    }

    /// Sign the update and send the signature to the proposer.
    pub fn accept(&mut self) -> Result<(), AcceptError> {
        let part_idx = self.channel.part_idx();
        match self.signatures[part_idx] {
            Some(_) => Err(AcceptError::AlreadyAccepted),
            None => {
                let sig = self.channel.client().signer.sign_eth(self.new_state.hash()?);
                self.signatures[part_idx] = Some(sig);
                self.channel
                    .client()
                    .bus
                    .send_to_participants(ParticipantMessage::ChannelUpdateAccepted(
                        ChannelUpdateAccepted {
                            channel: self.channel.channel_id(),
                            version: self.new_state.version(),
                            sig,
                        },
                    ));
                Ok(())
            }
        }
    }

    pub fn reject(self, reason: &str) {
        self.channel
            .client()
            .bus
            .send_to_participants(ParticipantMessage::ChannelUpdateRejected {
                id: self.channel.channel_id(),
                version: self.new_state.version(),
                reason: reason.to_string(),
            });
    }

    /// Add the signature of participant `part_idx` received in `msg`.
    pub fn participant_accepted(
        &mut self,
        part_idx: PartIdx,
        msg: ChannelUpdateAccepted,
    ) -> Result<(), AddSignatureError> {
        if part_idx >= PARTICIPANTS {
            return Err(AddSignatureError::InvalidParticipant(part_idx));
        }
        if msg.channel != self.channel.channel_id() {
            return Err(AddSignatureError::InvalidChannelID);
        }
        if msg.version != self.new_state.version() {
            return Err(AddSignatureError::InvalidVersionNumber);
        }
        if self.signatures[part_idx].is_some() {
            return Err(AddSignatureError::AlreadySigned);
        }

        let params = self.channel.params();
        validator::verify_signature(&params, &self.new_state, part_idx, msg.sig)?;
        self.signatures[part_idx] = Some(msg.sig);
        Ok(())
    }

    fn signatures(&self) -> Result<[Signature; PARTICIPANTS], ApplyError> {
        let mut signatures = [Signature::default(); PARTICIPANTS];
        for (part_idx, s) in self.signatures.iter().enumerate() {
            signatures[part_idx] = s.ok_or(ApplyError::MissingSignature(part_idx))?;
        }

        Ok(signatures)
    }

    /// Replace the channel state once everyone has signed. On error the
    /// update is handed back so missing signatures can still be added.
    pub fn apply(self) -> Result<(), (Self, ApplyError)> {
        let signatures = match self.signatures() {
            Ok(v) => v,
            Err(e) => return Err((self, e)),
        };
        self.channel.force_update(self.new_state, signatures);
        Ok(())
    }
}
