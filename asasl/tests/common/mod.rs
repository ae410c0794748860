#![allow(dead_code, clippy::unwrap_used)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Mac, SimpleHmac};
use sha1::{Digest, Sha1};

pub const SALT: &[u8] = b"sodium chloride";
pub const ITERATIONS: u32 = 4096;

fn hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    SimpleHmac::<Sha1>::new_from_slice(key)
        .unwrap()
        .chain_update(message)
        .finalize()
        .into_bytes()
        .to_vec()
}

/// A minimal `SCRAM-SHA-1` server, keyed by a single password.
pub struct ScramServer {
    pub password: String,
    pub nonce: String,
    pub iterations: u32,
    pub corrupt_signature: bool,
    pub foreign_nonce: bool,

    client_first_bare: String,
    server_first: String,
}

impl ScramServer {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.into(),
            nonce: "3rfcNHYJY1ZVvWVs7j".into(),
            iterations: ITERATIONS,
            corrupt_signature: false,
            foreign_nonce: false,
            client_first_bare: Default::default(),
            server_first: Default::default(),
        }
    }

    /// Answer the `client-first-message` with the `server-first-message`.
    pub fn first(&mut self, client_first: &[u8]) -> Vec<u8> {
        let client_first = std::str::from_utf8(client_first).unwrap();

        let bare = client_first
            .strip_prefix("n,,")
            .or_else(|| client_first.splitn(3, ',').nth(2))
            .unwrap();
        let client_nonce = bare.split(',').find_map(|attr| attr.strip_prefix("r=")).unwrap();

        let combined = if self.foreign_nonce {
            format!("not-{client_nonce}{}", self.nonce)
        } else {
            format!("{client_nonce}{}", self.nonce)
        };

        self.client_first_bare = bare.into();
        self.server_first = format!(
            "r={combined},s={},i={}",
            BASE64.encode(SALT),
            self.iterations
        );

        self.server_first.clone().into_bytes()
    }

    /// Check the `client-final-message` proof, and answer with the `server-final-message`.
    pub fn last(&mut self, client_final: &[u8]) -> Result<Vec<u8>, &'static str> {
        let client_final = std::str::from_utf8(client_final).unwrap();
        let (without_proof, proof) = client_final.rsplit_once(",p=").ok_or("missing proof")?;
        let proof = BASE64.decode(proof).map_err(|_| "invalid proof")?;

        let salted = pbkdf2::pbkdf2_hmac_array::<Sha1, 20>(
            self.password.as_bytes(),
            SALT,
            self.iterations,
        );
        let client_key = hmac(&salted, b"Client Key");
        let stored_key = Sha1::digest(&client_key);
        let server_key = hmac(&salted, b"Server Key");

        let auth_message = format!(
            "{},{},{without_proof}",
            self.client_first_bare, self.server_first
        );
        let client_signature = hmac(&stored_key, auth_message.as_bytes());

        let recovered = proof
            .iter()
            .zip(&client_signature)
            .map(|(p, s)| p ^ s)
            .collect::<Vec<_>>();
        if Sha1::digest(&recovered).as_slice() != stored_key.as_slice() {
            return Ok(b"e=invalid-proof".to_vec());
        }

        let mut signature = hmac(&server_key, auth_message.as_bytes());
        if self.corrupt_signature {
            signature[0] ^= 0x01;
        }

        Ok(format!("v={}", BASE64.encode(signature)).into_bytes())
    }
}
