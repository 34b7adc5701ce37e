//! Cache keys for model inputs.

use sha2::{Digest, Sha256};

use crate::model::ModelInput;

/// Canonical text form of a model input.
///
/// The form starts with the input variant (`text:` or `messages:`), so a plain
/// prompt never shares a key with a conversation whose JSON it happens to
/// spell out. Conversations are serialized as compact JSON; `Turn` has a
/// fixed field order so the serialization is stable.
pub fn canonical_form(input: &ModelInput) -> String {
    match input {
        ModelInput::Text(text) => format!("text:{}", text),
        // Serializing a Vec of plain string structs cannot fail
        ModelInput::Messages(turns) => {
            format!("messages:{}", serde_json::to_string(turns).unwrap_or_default())
        }
    }
}

/// Compute the cache key for a model input.
///
/// With `hash_inputs` the key is the hex SHA-256 digest of the canonical
/// form, which keeps keys short for long prompts. Without it the canonical
/// form itself is the key, so the cache file stays human-readable.
pub fn cache_key(input: &ModelInput, hash_inputs: bool) -> String {
    let canonical = canonical_form(input);
    if hash_inputs {
        hash_text(&canonical)
    } else {
        canonical
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
