//! Cache key derivation.
//!
//! A [`Fingerprint`] deterministically identifies a (model, prompt, context)
//! triple: SHA-256 over the parts joined by a separator byte that does not
//! occur in normal input, encoded as lowercase hex. Context objects are
//! canonicalized (keys sorted recursively) before hashing, so two contexts
//! that differ only in key ordering produce the same fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{MuninnError, Result};

/// Separator between hash input fields. U+001F (unit separator) is not
/// expected to occur in model names, prompts, or serialized JSON.
const FIELD_SEPARATOR: &[u8] = &[0x1f];

/// Deterministic hash identifying a unique (model, prompt, context) triple.
///
/// 64 lowercase hex characters. Derived, never chosen by callers; the only
/// ways to obtain one are [`Fingerprint::derive`] and reading it back from
/// a stored [`CacheEntry`](crate::CacheEntry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for a (model, prompt, context) triple.
    ///
    /// Identical inputs always yield the identical fingerprint. A present
    /// but empty context object hashes differently from an absent context:
    /// the empty object still appends a serialized suffix to the input.
    pub fn derive(model: &str, prompt: &str, context: Option<&Value>) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update(FIELD_SEPARATOR);
        hasher.update(prompt.as_bytes());
        if let Some(context) = context {
            hasher.update(FIELD_SEPARATOR);
            hasher.update(canonical_json(context)?.as_bytes());
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// The hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a digest read back from storage.
    pub(crate) fn from_stored(digest: String) -> Self {
        Self(digest)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize a context value with object keys sorted recursively.
///
/// Array order is preserved: element order (e.g. a message history) is
/// semantically significant, unlike key order in an object.
pub(crate) fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&encode_json(key)?);
                out.push(':');
                write_canonical(val, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&encode_json(scalar)?),
    }
    Ok(())
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| MuninnError::KeyDerivation(e.to_string()))
}
