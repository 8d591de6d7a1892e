mod encoding;
pub mod proto;

use core::fmt::Debug;

pub use encoding::{
    decode_adjudicator_request, decode_participant_message, DecodeError, ProtoBufEncodingLayer,
};

use crate::messages::{AdjudicatorRequest, ParticipantMessage};

/// Raw transport, receives already framed bytes.
pub trait BytesBus: Debug {
    fn send_to_participants(&self, msg: &[u8]);
    fn send_to_adjudicator(&self, msg: &[u8]);
}

/// Low-Level abstraction over the network configuration.
///
/// Implemented directly by in-process transports, or by
/// [ProtoBufEncodingLayer] on top of a [BytesBus].
pub trait MessageBus: Debug {
    fn send_to_participants(&self, msg: ParticipantMessage);
    fn send_to_adjudicator(&self, msg: AdjudicatorRequest);
}
