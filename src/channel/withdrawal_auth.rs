use serde::Serialize;

use crate::{
    encoding,
    sig::Signer,
    types::{Address, Hash, Signature, U256},
};

use super::{Params, PartIdx, State};

/// Permission of a participant to pay out its final balance to `receiver`.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct WithdrawalAuth {
    pub channel_id: Hash,
    pub participant: Address, // Off-chain channel address
    pub receiver: Address,    // On-chain receiver of funds on withdrawal
    pub amount: U256,
}

impl WithdrawalAuth {
    pub fn hash(&self) -> Result<Hash, encoding::Error> {
        encoding::to_hash(self)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WithdrawalAuthError {
    AbiEncodeError(encoding::Error),
    InvalidParticipant(PartIdx),
}
impl From<encoding::Error> for WithdrawalAuthError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SignedWithdrawalAuth {
    pub auth: WithdrawalAuth,
    pub sig: Signature,
}

pub fn make_signed_withdrawal_auth(
    signer: &Signer,
    params: &Params,
    state: &State,
    withdraw_receiver: Address,
    part_idx: PartIdx,
) -> Result<SignedWithdrawalAuth, WithdrawalAuthError> {
    let (participant, amount) = match (
        params.participants.get(part_idx),
        state.balances.get(part_idx),
    ) {
        (Some(p), Some(b)) => (*p, *b),
        _ => return Err(WithdrawalAuthError::InvalidParticipant(part_idx)),
    };
    let auth = WithdrawalAuth {
        channel_id: state.channel_id(),
        participant,
        receiver: withdraw_receiver,
        amount,
    };
    let sig = signer.sign_eth(auth.hash()?);
    Ok(SignedWithdrawalAuth { auth, sig })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_util::*;

    #[test]
    fn auth_covers_own_balance() {
        let signers = signers();
        let params = params(&signers);
        let state = State::new(params, [4.into(), 6.into()]).unwrap();
        let receiver = Address([0x42; 20]);

        let signed = make_signed_withdrawal_auth(&signers[1], &params, &state, receiver, 1).unwrap();
        assert_eq!(signed.auth.participant, signers[1].address());
        assert_eq!(signed.auth.amount, 6.into());
        assert!(crate::sig::verify(
            signed.auth.hash().unwrap(),
            signed.sig,
            signers[1].address()
        ));
    }

    #[test]
    fn unknown_participant_is_an_error() {
        let signers = signers();
        let params = params(&signers);
        let state = State::new(params, [4.into(), 6.into()]).unwrap();

        assert_eq!(
            make_signed_withdrawal_auth(&signers[0], &params, &state, Address::default(), 2),
            Err(WithdrawalAuthError::InvalidParticipant(2))
        );
    }
}
