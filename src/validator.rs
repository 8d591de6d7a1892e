//! State transition rules shared by the participants and the adjudicator.

use crate::{
    channel::{Params, PartIdx, SignedState, State},
    encoding, sig,
    types::{Address, Signature},
};
use core::fmt::Display;

#[derive(Debug, PartialEq, Eq)]
pub enum InvalidTransition {
    InvalidChannelID,
    InvalidVersionNumber,
    CurrentStateIsFinal,
    TotalAllocationAmountMismatch,
}

impl Display for InvalidTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            InvalidTransition::InvalidChannelID => "state belongs to another channel",
            InvalidTransition::InvalidVersionNumber => "version does not follow the current state",
            InvalidTransition::CurrentStateIsFinal => "current state is final",
            InvalidTransition::TotalAllocationAmountMismatch => "total balance changed",
        })
    }
}

#[derive(Debug)]
pub enum SignatureError {
    AbiEncodeError(encoding::Error),
    RecoveryFailed(sig::Error),
    /// The signature at index `idx` was made by `signer` instead of the
    /// participant.
    InvalidSignature { idx: PartIdx, signer: Address },
    /// There is no participant with index `idx`.
    InvalidParticipant(PartIdx),
}
impl From<encoding::Error> for SignatureError {
    fn from(e: encoding::Error) -> Self {
        Self::AbiEncodeError(e)
    }
}
impl From<sig::Error> for SignatureError {
    fn from(e: sig::Error) -> Self {
        Self::RecoveryFailed(e)
    }
}

impl Display for SignatureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SignatureError::AbiEncodeError(e) => write!(f, "encoding state: {}", e),
            SignatureError::RecoveryFailed(_) => f.write_str("signature recovery failed"),
            SignatureError::InvalidSignature { idx, signer } => {
                write!(f, "signature {} was made by {:?}", idx, signer)
            }
            SignatureError::InvalidParticipant(idx) => write!(f, "no participant {}", idx),
        }
    }
}

/// How strictly versions have to follow each other.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VersionRule {
    /// Off-chain updates: exactly `current + 1`.
    Successor,
    /// On-chain refutations: any newer version. Intermediate states may never
    /// have reached the adjudicator.
    Newer,
}

/// Checks that `next` may replace `current`. Signatures are not checked.
pub fn check_valid_transition(
    current: &State,
    next: &State,
    rule: VersionRule,
) -> Result<(), InvalidTransition> {
    let version_ok = match rule {
        VersionRule::Successor => current
            .version()
            .checked_add(1)
            .map_or(false, |v| next.version() == v),
        VersionRule::Newer => next.version() > current.version(),
    };

    if next.channel_id() != current.channel_id() {
        Err(InvalidTransition::InvalidChannelID)
    } else if current.is_final {
        Err(InvalidTransition::CurrentStateIsFinal)
    } else if !version_ok {
        Err(InvalidTransition::InvalidVersionNumber)
    } else if next.total().is_none() || next.total() != current.total() {
        Err(InvalidTransition::TotalAllocationAmountMismatch)
    } else {
        Ok(())
    }
}

/// Checks that `sig` over `state` was made by participant `idx`.
pub fn verify_signature(
    params: &Params,
    state: &State,
    idx: PartIdx,
    sig: Signature,
) -> Result<(), SignatureError> {
    let expected = params
        .participants
        .get(idx)
        .ok_or(SignatureError::InvalidParticipant(idx))?;
    let signer = sig::recover_signer(state.hash()?, sig)?;
    if *expected != signer {
        return Err(SignatureError::InvalidSignature { idx, signer });
    }
    Ok(())
}

/// Checks that every participant signed the state.
pub fn verify_signatures(params: &Params, signed: &SignedState) -> Result<(), SignatureError> {
    let hash = signed.state.hash()?;
    for (idx, sig) in signed.sigs.iter().enumerate() {
        let signer = sig::recover_signer(hash, *sig)?;
        if params.participants[idx] != signer {
            return Err(SignatureError::InvalidSignature { idx, signer });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_util::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn initial() -> State {
        State::new(params(&signers()), [10.into(), 10.into()]).unwrap()
    }

    #[test]
    fn successor_is_valid() {
        let current = initial();
        let mut next = current.make_next_state();
        next.transfer(0, 3.into()).unwrap();
        assert_eq!(
            check_valid_transition(&current, &next, VersionRule::Successor),
            Ok(())
        );
    }

    #[test]
    fn skipped_version_only_valid_when_newer_is_allowed() {
        let current = initial();
        let next = current.make_next_state().make_next_state();
        assert_eq!(
            check_valid_transition(&current, &next, VersionRule::Successor),
            Err(InvalidTransition::InvalidVersionNumber)
        );
        assert_eq!(
            check_valid_transition(&current, &next, VersionRule::Newer),
            Ok(())
        );
        assert_eq!(
            check_valid_transition(&next, &current, VersionRule::Newer),
            Err(InvalidTransition::InvalidVersionNumber)
        );
    }

    #[test]
    fn total_must_be_preserved() {
        let current = initial();
        let mut next = current.make_next_state();
        next.balances[0] = 11.into();
        assert_eq!(
            check_valid_transition(&current, &next, VersionRule::Successor),
            Err(InvalidTransition::TotalAllocationAmountMismatch)
        );
    }

    #[test]
    fn final_state_cannot_be_replaced() {
        let mut current = initial();
        current.is_final = true;
        let next = current.make_next_state();
        assert_eq!(
            check_valid_transition(&current, &next, VersionRule::Newer),
            Err(InvalidTransition::CurrentStateIsFinal)
        );
    }

    #[test]
    fn other_channel_is_rejected() {
        let signers = signers();
        let mut rng = StdRng::seed_from_u64(7);
        let mut other_params = params(&signers);
        other_params.nonce = rng.gen();
        let other = State::new(other_params, [10.into(), 10.into()]).unwrap();
        assert_eq!(
            check_valid_transition(&initial(), &other.make_next_state(), VersionRule::Newer),
            Err(InvalidTransition::InvalidChannelID)
        );
    }

    #[test]
    fn signatures_must_match_participants() {
        let signers = signers();
        let params = params(&signers);
        let signed = sign_all(&signers, initial());
        verify_signatures(&params, &signed).unwrap();
        verify_signature(&params, &signed.state, 1, signed.sigs[1]).unwrap();

        let mut swapped = signed;
        swapped.sigs.swap(0, 1);
        match verify_signatures(&params, &swapped) {
            Err(SignatureError::InvalidSignature { idx: 0, signer }) => {
                assert_eq!(signer, signers[1].address())
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let signers = signers();
        let params = params(&signers);
        let mut rng = StdRng::seed_from_u64(3);
        let mut signed = sign_all(&signers, initial());
        signed.sigs[1] = rng.gen::<Signature>();
        assert!(verify_signatures(&params, &signed).is_err());
        assert!(verify_signature(&params, &signed.state, 1, signed.sigs[1]).is_err());
    }

    #[test]
    fn out_of_range_participant_is_an_error() {
        let signers = signers();
        let params = params(&signers);
        let signed = sign_all(&signers, initial());
        assert!(matches!(
            verify_signature(&params, &signed.state, 2, signed.sigs[0]),
            Err(SignatureError::InvalidParticipant(2))
        ));
    }
}
