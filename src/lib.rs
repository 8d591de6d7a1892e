//! Two party payment channels: off-chain state updates signed by both
//! participants, and the `StateChannel` adjudicator that holds the deposits,
//! resolves disputes and pays out the final balances.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod channel;
mod client;
pub mod contract;
pub mod deploy;
pub mod encoding;
pub mod messages;
pub mod sig;
mod types;
pub mod validator;
pub mod wire;

pub use client::{OpenError, StateChannelClient};
pub use types::{Address, Hash, Signature, Timestamp, U256};
