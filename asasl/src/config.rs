use strum::VariantNames;

use crate::factory::Builtin;

#[cfg(doc)]
use crate::Factory;

/// Negotiation policy for the [`Factory`] and the mechanisms it creates.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lowest `SCRAM` iteration count accepted from the server.
    pub scram_min_iterations: u32,

    /// Highest `SCRAM` iteration count accepted from the server.
    pub scram_max_iterations: u32,

    /// Amount of random bytes in the client nonces.
    pub nonce_len: usize,

    /// Service name in the `DIGEST-MD5` `digest-uri` directive.
    pub digest_service: String,

    /// Mechanisms to pick from the server's offer, preferred first.
    pub preference: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scram_min_iterations: 4096,
            scram_max_iterations: 1_000_000,
            nonce_len: 24,
            digest_service: "xmpp".into(),
            preference: Builtin::VARIANTS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl Config {
    pub(crate) fn nonce(&self) -> String {
        use base64::Engine;
        use rand::RngCore;

        let mut bytes = vec![0u8; self.nonce_len.max(1)];
        rand::thread_rng().fill_bytes(&mut bytes);

        base64::engine::general_purpose::STANDARD_NO_PAD.encode(bytes)
    }
}
