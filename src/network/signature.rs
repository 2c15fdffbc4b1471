use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use sha1::Sha1;
use tracing::error;

use crate::constants::AUTHORIZATION_HEADER;
use crate::constants::TIMESTAMP_HEADER;

type HmacSha1 = Hmac<Sha1>;

/// What a signer gets to see of an outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContext {
    pub method: String,
    /// Path plus `?query` exactly as sent
    pub path_with_query: String,
    pub timestamp_ms: u64,
    pub app_id: String,
}

/// Computes headers attached to every request sent to the remote service.
///
/// Any `Fn(&SignatureContext) -> Vec<(String, String)>` closure is a signer.
pub trait RequestSigner: Send + Sync {
    fn sign(
        &self,
        ctx: &SignatureContext,
    ) -> Vec<(String, String)>;
}

impl<F> RequestSigner for F
where
    F: Fn(&SignatureContext) -> Vec<(String, String)> + Send + Sync,
{
    fn sign(
        &self,
        ctx: &SignatureContext,
    ) -> Vec<(String, String)> {
        self(ctx)
    }
}

/// Access-key signature understood by Apollo config services:
/// `Authorization: Apollo {app_id}:{base64(HmacSHA1(secret, timestamp + "\n" + path_with_query))}`
pub struct AccessKeySigner {
    secret: String,
}

impl AccessKeySigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub(crate) fn signature(
        &self,
        timestamp_ms: u64,
        path_with_query: &str,
    ) -> Option<String> {
        let mut mac = match HmacSha1::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(e) => {
                error!("failed to initialise request signature: {}", e);
                return None;
            }
        };
        mac.update(format!("{timestamp_ms}\n{path_with_query}").as_bytes());
        Some(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for AccessKeySigner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AccessKeySigner").finish_non_exhaustive()
    }
}

impl RequestSigner for AccessKeySigner {
    fn sign(
        &self,
        ctx: &SignatureContext,
    ) -> Vec<(String, String)> {
        match self.signature(ctx.timestamp_ms, &ctx.path_with_query) {
            Some(signature) => vec![
                (
                    AUTHORIZATION_HEADER.to_string(),
                    format!("Apollo {}:{}", ctx.app_id, signature),
                ),
                (TIMESTAMP_HEADER.to_string(), ctx.timestamp_ms.to_string()),
            ],
            None => Vec::new(),
        }
    }
}
