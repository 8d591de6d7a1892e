//! Protobuf messages exchanged on the wire.
//!
//! Byte fields carry fixed size values (hashes, addresses, signatures and
//! 32 byte big-endian balances), their length is checked when converting to
//! the domain types.

use alloc::{string::String, vec::Vec};

#[derive(Clone, PartialEq, prost::Message)]
pub struct Params {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub parts: Vec<Vec<u8>>,
    #[prost(uint64, tag = "2")]
    pub challenge_duration: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub nonce: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct State {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub version: u64,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub balances: Vec<Vec<u8>>,
    #[prost(bool, tag = "4")]
    pub is_final: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SignedState {
    #[prost(message, optional, tag = "1")]
    pub params: Option<Params>,
    #[prost(message, optional, tag = "2")]
    pub state: Option<State>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub sigs: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelUpdateMsg {
    #[prost(message, optional, tag = "1")]
    pub state: Option<State>,
    #[prost(uint32, tag = "2")]
    pub actor_idx: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub sig: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelUpdateAccMsg {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub version: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub sig: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelUpdateRejMsg {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub version: u64,
    #[prost(string, tag = "3")]
    pub reason: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConcludeMsg {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WithdrawMsg {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub participant: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub receiver: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub amount: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub sig: Vec<u8>,
}

/// Messages between participants.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(oneof = "envelope::Msg", tags = "1, 2, 3")]
    pub msg: Option<envelope::Msg>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        ChannelUpdateMsg(super::ChannelUpdateMsg),
        #[prost(message, tag = "2")]
        ChannelUpdateAccMsg(super::ChannelUpdateAccMsg),
        #[prost(message, tag = "3")]
        ChannelUpdateRejMsg(super::ChannelUpdateRejMsg),
    }
}

/// Messages to the adjudicator.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    #[prost(oneof = "request::Msg", tags = "1, 2, 3, 4")]
    pub msg: Option<request::Msg>,
}

pub mod request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        Register(super::SignedState),
        #[prost(message, tag = "2")]
        ConcludeFinal(super::SignedState),
        #[prost(message, tag = "3")]
        Conclude(super::ConcludeMsg),
        #[prost(message, tag = "4")]
        Withdraw(super::WithdrawMsg),
    }
}
