use crate::model::SessionId;
use sha2::{Digest, Sha256};

const FINGERPRINT_HEX_LEN: usize = 12;

/// Short, stable digest of a session id for logs and error messages.
///
/// Session ids are bearer credentials, so they are never written out verbatim.
pub fn session_fingerprint(id: &SessionId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_str().as_bytes());
    let mut encoded = hex::encode(hasher.finalize());
    encoded.truncate(FINGERPRINT_HEX_LEN);
    encoded
}
