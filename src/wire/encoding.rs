use prost::{bytes::BufMut, Message};
use tracing::error;

use super::{proto, BytesBus, MessageBus};
use crate::{
    channel::{self, SignedWithdrawalAuth, WithdrawalAuth, PARTICIPANTS},
    messages::{
        AdjudicatorRequest, ChannelUpdateAccepted, ChannelUpdateMsg, ParticipantMessage,
        RegisterReq,
    },
    types::{Address, Hash, Signature, U256},
};
use alloc::vec::Vec;
use core::fmt::Display;

/// Largest protobuf payload that fits the u16 length prefix.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

#[derive(Debug, PartialEq, Eq)]
pub enum ConversionError {
    ParticipantSizeMismatch,
    ByteLengthMismatch,
    ExpectedSome,
}

#[derive(Debug)]
pub enum DecodeError {
    /// Frame shorter than its length prefix, or with trailing bytes.
    InvalidFrame,
    Protobuf(prost::DecodeError),
    Conversion(ConversionError),
}
impl From<prost::DecodeError> for DecodeError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Protobuf(e)
    }
}
impl From<ConversionError> for DecodeError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

#[derive(Debug)]
pub enum EncodeError {
    FrameTooLarge(usize),
    Protobuf(prost::EncodeError),
}
impl From<prost::EncodeError> for EncodeError {
    fn from(e: prost::EncodeError) -> Self {
        Self::Protobuf(e)
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::InvalidFrame => f.write_str("frame length does not match prefix"),
            DecodeError::Protobuf(e) => write!(f, "protobuf: {}", e),
            DecodeError::Conversion(e) => write!(f, "conversion: {:?}", e),
        }
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EncodeError::FrameTooLarge(len) => {
                write!(f, "payload of {} bytes exceeds {}", len, MAX_FRAME_LEN)
            }
            EncodeError::Protobuf(e) => write!(f, "protobuf: {}", e),
        }
    }
}

fn fixed<T>(bytes: Vec<u8>) -> Result<T, ConversionError>
where
    T: for<'a> TryFrom<&'a [u8]>,
{
    T::try_from(bytes.as_slice()).or(Err(ConversionError::ByteLengthMismatch))
}

fn u256(bytes: Vec<u8>) -> Result<U256, ConversionError> {
    if bytes.len() != 32 {
        return Err(ConversionError::ByteLengthMismatch);
    }
    Ok(U256::from_big_endian(&bytes))
}

fn pair<T, F>(items: Vec<Vec<u8>>, convert: F) -> Result<[T; PARTICIPANTS], ConversionError>
where
    T: Copy + Default,
    F: Fn(Vec<u8>) -> Result<T, ConversionError>,
{
    if items.len() != PARTICIPANTS {
        return Err(ConversionError::ParticipantSizeMismatch);
    }
    let mut out = [T::default(); PARTICIPANTS];
    for (a, b) in out.iter_mut().zip(items) {
        *a = convert(b)?;
    }
    Ok(out)
}

impl From<channel::Params> for proto::Params {
    fn from(value: channel::Params) -> Self {
        Self {
            parts: value.participants.map(|a| a.0.to_vec()).to_vec(),
            challenge_duration: value.challenge_duration,
            nonce: value.nonce.to_word().to_vec(),
        }
    }
}

impl TryFrom<proto::Params> for channel::Params {
    type Error = ConversionError;

    fn try_from(value: proto::Params) -> Result<Self, Self::Error> {
        Ok(Self {
            participants: pair(value.parts, fixed::<Address>)?,
            challenge_duration: value.challenge_duration,
            nonce: u256(value.nonce)?,
        })
    }
}

impl From<channel::State> for proto::State {
    fn from(value: channel::State) -> Self {
        Self {
            id: value.channel_id().0.to_vec(),
            version: value.version(),
            balances: value.balances.map(|b| b.to_word().to_vec()).to_vec(),
            is_final: value.is_final,
        }
    }
}

impl TryFrom<proto::State> for channel::State {
    type Error = ConversionError;

    fn try_from(value: proto::State) -> Result<Self, Self::Error> {
        Ok(channel::State::from_raw(
            fixed::<Hash>(value.id)?,
            value.version,
            pair(value.balances, u256)?,
            value.is_final,
        ))
    }
}

impl From<RegisterReq> for proto::SignedState {
    fn from(value: RegisterReq) -> Self {
        Self {
            params: Some(value.params.into()),
            state: Some(value.signed.state.into()),
            sigs: value.signed.sigs.map(|s| s.0.to_vec()).to_vec(),
        }
    }
}

impl TryFrom<proto::SignedState> for RegisterReq {
    type Error = ConversionError;

    fn try_from(value: proto::SignedState) -> Result<Self, Self::Error> {
        Ok(Self {
            params: value.params.ok_or(ConversionError::ExpectedSome)?.try_into()?,
            signed: channel::SignedState {
                state: value.state.ok_or(ConversionError::ExpectedSome)?.try_into()?,
                sigs: pair(value.sigs, fixed::<Signature>)?,
            },
        })
    }
}

impl From<ChannelUpdateMsg> for proto::ChannelUpdateMsg {
    fn from(value: ChannelUpdateMsg) -> Self {
        Self {
            state: Some(value.state.into()),
            actor_idx: value.actor_idx as u32,
            sig: value.sig.0.to_vec(),
        }
    }
}

impl TryFrom<proto::ChannelUpdateMsg> for ChannelUpdateMsg {
    type Error = ConversionError;

    fn try_from(value: proto::ChannelUpdateMsg) -> Result<Self, Self::Error> {
        Ok(Self {
            state: value.state.ok_or(ConversionError::ExpectedSome)?.try_into()?,
            actor_idx: value.actor_idx as usize,
            sig: fixed(value.sig)?,
        })
    }
}

impl From<ChannelUpdateAccepted> for proto::ChannelUpdateAccMsg {
    fn from(value: ChannelUpdateAccepted) -> Self {
        Self {
            channel_id: value.channel.0.to_vec(),
            version: value.version,
            sig: value.sig.0.to_vec(),
        }
    }
}

impl TryFrom<proto::ChannelUpdateAccMsg> for ChannelUpdateAccepted {
    type Error = ConversionError;

    fn try_from(value: proto::ChannelUpdateAccMsg) -> Result<Self, Self::Error> {
        Ok(Self {
            channel: fixed(value.channel_id)?,
            version: value.version,
            sig: fixed(value.sig)?,
        })
    }
}

impl From<SignedWithdrawalAuth> for proto::WithdrawMsg {
    fn from(value: SignedWithdrawalAuth) -> Self {
        Self {
            channel_id: value.auth.channel_id.0.to_vec(),
            participant: value.auth.participant.0.to_vec(),
            receiver: value.auth.receiver.0.to_vec(),
            amount: value.auth.amount.to_word().to_vec(),
            sig: value.sig.0.to_vec(),
        }
    }
}

impl TryFrom<proto::WithdrawMsg> for SignedWithdrawalAuth {
    type Error = ConversionError;

    fn try_from(value: proto::WithdrawMsg) -> Result<Self, Self::Error> {
        Ok(Self {
            auth: WithdrawalAuth {
                channel_id: fixed(value.channel_id)?,
                participant: fixed(value.participant)?,
                receiver: fixed(value.receiver)?,
                amount: u256(value.amount)?,
            },
            sig: fixed(value.sig)?,
        })
    }
}

/// Frame a protobuf message: u16 big-endian length followed by the payload.
pub fn encode_frame<T: Message>(msg: &T) -> Result<Vec<u8>, EncodeError> {
    // The length is a fixed u16, not the LEB128 varint
    // `encode_length_delimited` would write.
    let len = msg.encoded_len();
    if len > MAX_FRAME_LEN {
        return Err(EncodeError::FrameTooLarge(len));
    }

    let mut buf = Vec::with_capacity(2 + len);
    buf.put_slice(&(len as u16).to_be_bytes());
    msg.encode(&mut buf)?;
    Ok(buf)
}

fn decode_frame<T: Message + Default>(frame: &[u8]) -> Result<T, DecodeError> {
    if frame.len() < 2 {
        return Err(DecodeError::InvalidFrame);
    }
    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let payload = &frame[2..];
    if payload.len() != len {
        return Err(DecodeError::InvalidFrame);
    }
    Ok(T::decode(payload)?)
}

impl From<ParticipantMessage> for proto::Envelope {
    fn from(msg: ParticipantMessage) -> Self {
        let wiremsg = match msg {
            ParticipantMessage::ChannelUpdate(msg) => {
                proto::envelope::Msg::ChannelUpdateMsg(msg.into())
            }
            ParticipantMessage::ChannelUpdateAccepted(msg) => {
                proto::envelope::Msg::ChannelUpdateAccMsg(msg.into())
            }
            ParticipantMessage::ChannelUpdateRejected {
                id,
                version,
                reason,
            } => proto::envelope::Msg::ChannelUpdateRejMsg(proto::ChannelUpdateRejMsg {
                channel_id: id.0.to_vec(),
                version,
                reason,
            }),
        };
        proto::Envelope { msg: Some(wiremsg) }
    }
}

impl From<AdjudicatorRequest> for proto::Request {
    fn from(msg: AdjudicatorRequest) -> Self {
        let wiremsg = match msg {
            AdjudicatorRequest::Register(req) => proto::request::Msg::Register(req.into()),
            AdjudicatorRequest::ConcludeFinal(req) => {
                proto::request::Msg::ConcludeFinal(req.into())
            }
            AdjudicatorRequest::Conclude { id } => {
                proto::request::Msg::Conclude(proto::ConcludeMsg {
                    channel_id: id.0.to_vec(),
                })
            }
            AdjudicatorRequest::Withdraw(auth) => proto::request::Msg::Withdraw(auth.into()),
        };
        proto::Request { msg: Some(wiremsg) }
    }
}

/// Parse a frame sent with [MessageBus::send_to_participants].
pub fn decode_participant_message(frame: &[u8]) -> Result<ParticipantMessage, DecodeError> {
    let envelope: proto::Envelope = decode_frame(frame)?;
    let msg = match envelope.msg.ok_or(ConversionError::ExpectedSome)? {
        proto::envelope::Msg::ChannelUpdateMsg(msg) => {
            ParticipantMessage::ChannelUpdate(msg.try_into()?)
        }
        proto::envelope::Msg::ChannelUpdateAccMsg(msg) => {
            ParticipantMessage::ChannelUpdateAccepted(msg.try_into()?)
        }
        proto::envelope::Msg::ChannelUpdateRejMsg(msg) => {
            ParticipantMessage::ChannelUpdateRejected {
                id: fixed(msg.channel_id)?,
                version: msg.version,
                reason: msg.reason,
            }
        }
    };
    Ok(msg)
}

/// Parse a frame sent with [MessageBus::send_to_adjudicator].
pub fn decode_adjudicator_request(frame: &[u8]) -> Result<AdjudicatorRequest, DecodeError> {
    let request: proto::Request = decode_frame(frame)?;
    let msg = match request.msg.ok_or(ConversionError::ExpectedSome)? {
        proto::request::Msg::Register(msg) => AdjudicatorRequest::Register(msg.try_into()?),
        proto::request::Msg::ConcludeFinal(msg) => {
            AdjudicatorRequest::ConcludeFinal(msg.try_into()?)
        }
        proto::request::Msg::Conclude(msg) => AdjudicatorRequest::Conclude {
            id: fixed(msg.channel_id)?,
        },
        proto::request::Msg::Withdraw(msg) => AdjudicatorRequest::Withdraw(msg.try_into()?),
    };
    Ok(msg)
}

/// [MessageBus] that encodes every message with protobuf and hands the frame
/// to a [BytesBus].
#[derive(Debug)]
pub struct ProtoBufEncodingLayer<B: BytesBus> {
    pub bus: B,
}

impl<B: BytesBus> MessageBus for ProtoBufEncodingLayer<B> {
    fn send_to_participants(&self, msg: ParticipantMessage) {
        match encode_frame(&proto::Envelope::from(msg)) {
            Ok(buf) => self.bus.send_to_participants(&buf),
            Err(e) => error!(%e, "dropping participant message"),
        }
    }

    fn send_to_adjudicator(&self, msg: AdjudicatorRequest) {
        match encode_frame(&proto::Request::from(msg)) {
            Ok(buf) => self.bus.send_to_adjudicator(&buf),
            Err(e) => error!(%e, "dropping adjudicator request"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_util::*;
    use alloc::string::ToString;
    use core::cell::RefCell;

    #[derive(Debug, Default)]
    struct Recorder {
        participants: RefCell<Vec<Vec<u8>>>,
        adjudicator: RefCell<Vec<Vec<u8>>>,
    }

    impl BytesBus for Recorder {
        fn send_to_participants(&self, msg: &[u8]) {
            self.participants.borrow_mut().push(msg.to_vec());
        }

        fn send_to_adjudicator(&self, msg: &[u8]) {
            self.adjudicator.borrow_mut().push(msg.to_vec());
        }
    }

    fn initial() -> channel::State {
        channel::State::new(params(&signers()), [3.into(), 4.into()]).unwrap()
    }

    #[test]
    fn update_survives_the_wire() {
        let signers = signers();
        let state = initial().make_next_state();
        let msg = ParticipantMessage::ChannelUpdate(ChannelUpdateMsg {
            state,
            actor_idx: 1,
            sig: signers[1].sign_eth(state.hash().unwrap()),
        });

        let layer = ProtoBufEncodingLayer {
            bus: Recorder::default(),
        };
        layer.send_to_participants(msg.clone());

        let frames = layer.bus.participants.borrow();
        assert_eq!(frames.len(), 1);
        let len = u16::from_be_bytes([frames[0][0], frames[0][1]]) as usize;
        assert_eq!(len + 2, frames[0].len());
        assert_eq!(decode_participant_message(&frames[0]).unwrap(), msg);
    }

    #[test]
    fn register_request_survives_the_wire() {
        let signers = signers();
        let req = AdjudicatorRequest::Register(RegisterReq {
            params: params(&signers),
            signed: sign_all(&signers, initial()),
        });
        let frame = encode_frame(&proto::Request::from(req)).unwrap();
        assert_eq!(decode_adjudicator_request(&frame).unwrap(), req);
    }

    #[test]
    fn rejection_keeps_reason() {
        let msg = ParticipantMessage::ChannelUpdateRejected {
            id: initial().channel_id(),
            version: 3,
            reason: "insufficient funds".to_string(),
        };
        let frame = encode_frame(&proto::Envelope::from(msg.clone())).unwrap();
        assert_eq!(decode_participant_message(&frame).unwrap(), msg);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let msg = ParticipantMessage::ChannelUpdateAccepted(ChannelUpdateAccepted {
            channel: Hash([1; 32]),
            version: 1,
            sig: Signature([2; 65]),
        });
        let frame = encode_frame(&proto::Envelope::from(msg)).unwrap();
        assert!(matches!(
            decode_participant_message(&frame[..frame.len() - 1]),
            Err(DecodeError::InvalidFrame)
        ));
        assert!(matches!(
            decode_participant_message(&[0]),
            Err(DecodeError::InvalidFrame)
        ));
    }

    #[test]
    fn wrong_byte_length_is_rejected() {
        let wire = proto::Envelope {
            msg: Some(proto::envelope::Msg::ChannelUpdateAccMsg(
                proto::ChannelUpdateAccMsg {
                    channel_id: alloc::vec![1; 31],
                    version: 1,
                    sig: alloc::vec![2; 65],
                },
            )),
        };
        let frame = encode_frame(&wire).unwrap();
        assert!(matches!(
            decode_participant_message(&frame),
            Err(DecodeError::Conversion(ConversionError::ByteLengthMismatch))
        ));
    }

    #[test]
    fn oversized_message_is_dropped() {
        let msg = ParticipantMessage::ChannelUpdateRejected {
            id: initial().channel_id(),
            version: 1,
            reason: "x".repeat(MAX_FRAME_LEN),
        };
        let err = encode_frame(&proto::Envelope::from(msg.clone())).unwrap_err();
        assert!(matches!(err, EncodeError::FrameTooLarge(len) if len > MAX_FRAME_LEN));
        assert!(err.to_string().starts_with("payload of"));

        let layer = ProtoBufEncodingLayer {
            bus: Recorder::default(),
        };
        layer.send_to_participants(msg);
        assert!(layer.bus.participants.borrow().is_empty());
    }
}
