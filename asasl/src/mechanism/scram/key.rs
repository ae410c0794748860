//! Tools for salted password, client/server key and signature derivation.

use hmac::{Mac, SimpleHmac};
use zeroize::{Zeroize, Zeroizing};

use super::ScramDigest;

/// The pseudo-random function used by `Hi` and the signatures.
type Prf<D> = SimpleHmac<D>;

fn prf<D: ScramDigest>(key: &[u8]) -> Prf<D> {
    <Prf<D> as Mac>::new_from_slice(key).expect("HMAC is able to accept all key sizes")
}

/// `HMAC(key, message)`.
pub(super) fn hmac<D: ScramDigest>(key: &[u8], message: &[u8]) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(
        prf::<D>(key)
            .chain_update(message)
            .finalize()
            .into_bytes()
            .to_vec(),
    )
}

/// `Hi(password, salt, i)`, which is PBKDF2 producing a single block of output.
pub(super) fn hi<D: ScramDigest>(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<Vec<u8>> {
    let prf = prf::<D>(password);

    // U1 = PRF(password, salt + INT(1))
    let mut prev = prf
        .clone()
        .chain_update(salt)
        .chain_update(1u32.to_be_bytes())
        .finalize()
        .into_bytes()
        .to_vec();
    let mut hi = Zeroizing::new(prev.clone());

    for _ in 1..iterations {
        // Ui = PRF(password, Ui-1)
        let next = prf.clone().chain_update(&prev).finalize().into_bytes();

        xor_assign(&mut hi, &next);
        prev.copy_from_slice(&next);
    }
    prev.zeroize();

    hi
}

pub(super) fn xor_assign(x: &mut [u8], y: &[u8]) {
    for (x, &y) in std::iter::zip(x, y) {
        *x ^= y;
    }
}

/// The keys derived from the salted password.
pub(super) struct Keys {
    client_key: Zeroizing<Vec<u8>>,
    stored_key: Zeroizing<Vec<u8>>,
    server_key: Zeroizing<Vec<u8>>,
}

impl Keys {
    pub fn derive<D: ScramDigest>(salted_password: &[u8]) -> Self {
        let client_key = hmac::<D>(salted_password, b"Client Key");
        let stored_key = Zeroizing::new(D::digest(&*client_key).to_vec());
        let server_key = hmac::<D>(salted_password, b"Server Key");

        Self {
            client_key,
            stored_key,
            server_key,
        }
    }

    /// `ClientProof := ClientKey XOR HMAC(StoredKey, AuthMessage)`.
    pub fn client_proof<D: ScramDigest>(&self, auth: &SignatureBuilder<'_>) -> Vec<u8> {
        let mut proof = auth.build::<D>(&self.stored_key).to_vec();
        xor_assign(&mut proof, &self.client_key);

        proof
    }

    /// `ServerSignature := HMAC(ServerKey, AuthMessage)`.
    pub fn server_signature<D: ScramDigest>(
        &self,
        auth: &SignatureBuilder<'_>,
    ) -> Zeroizing<Vec<u8>> {
        auth.build::<D>(&self.server_key)
    }
}

/// A collection of message parts forming the `AuthMessage`.
#[derive(Debug)]
pub(super) struct SignatureBuilder<'a> {
    pub client_first_message_bare: &'a str,
    pub server_first_message: &'a str,
    pub client_final_message_without_proof: &'a str,
}

impl SignatureBuilder<'_> {
    pub fn build<D: ScramDigest>(&self, key: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut mac = prf::<D>(key);
        mac.update(self.client_first_message_bare.as_bytes());
        mac.update(b",");
        mac.update(self.server_first_message.as_bytes());
        mac.update(b",");
        mac.update(self.client_final_message_without_proof.as_bytes());

        Zeroizing::new(mac.finalize().into_bytes().to_vec())
    }
}
