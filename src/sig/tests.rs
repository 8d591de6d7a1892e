use super::{recover_signer, verify, Signer};
use crate::{encoding, types::Hash};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

fn data() -> Hash {
    #[derive(Serialize, Debug)]
    struct Payload {
        value: [u8; 4],
    }
    let d = Payload {
        value: [0xa1, 0xa2, 0xa3, 0xa4],
    };

    encoding::to_hash(&d).unwrap()
}

#[test]
fn sign_and_recover() {
    // Do not use that on any real device, this is just for testing.
    let mut rng = StdRng::seed_from_u64(0);
    let signer = Signer::new(&mut rng);
    let msg = data();
    let sig = signer.sign_eth(msg);

    assert!(sig.0[64] == 27 || sig.0[64] == 28);
    assert_eq!(recover_signer(msg, sig).unwrap(), signer.address());
    assert_eq!(signer.recover_signer(msg, sig).unwrap(), signer.address());
}

#[test]
fn signature_over_other_message_recovers_other_address() {
    let mut rng = StdRng::seed_from_u64(1);
    let signer = Signer::new(&mut rng);
    let sig = signer.sign_eth(data());

    let mut other = data();
    other.0[0] ^= 0xff;
    assert!(!verify(other, sig, signer.address()));
    assert!(verify(data(), sig, signer.address()));
}

#[test]
fn signing_is_deterministic() {
    let signer = Signer::from_bytes(&[0x11; 32]).unwrap();
    assert_eq!(signer.sign_eth(data()), signer.sign_eth(data()));
}

#[test]
fn malformed_recovery_id_is_an_error() {
    let signer = Signer::from_bytes(&[0x22; 32]).unwrap();
    let mut sig = signer.sign_eth(data());
    sig.0[64] = 3;
    assert!(recover_signer(data(), sig).is_err());
}

#[test]
fn known_key_has_known_address() {
    // The secret key 1 maps to the generator point, whose address is well
    // known.
    let mut secret = [0u8; 32];
    secret[31] = 1;
    let signer = Signer::from_bytes(&secret).unwrap();
    assert_eq!(
        hex::encode(signer.address().0),
        "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
    );
}
