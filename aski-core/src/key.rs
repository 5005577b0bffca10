use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of hex characters shown when a key is abbreviated.
pub const SHORT_LEN: usize = 6;

/// A 32-byte Blake3 hash that uniquely identifies a message node.
///
/// Keys are serialized as CBOR byte strings (major type 2), not as arrays.
/// Ordering is bytewise, which matches the lexicographic order of the hex form;
/// prefix resolution relies on this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key([u8; 32]);

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl serde::de::Visitor<'_> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("32-byte key")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Key::from_slice(v).ok_or_else(|| E::invalid_length(v.len(), &"32 bytes"))
            }
        }

        deserializer.deserialize_bytes(KeyVisitor)
    }
}

impl Key {
    /// Computes the key (hash) of the given data.
    pub fn from_data(data: &[u8]) -> Self {
        Key(*blake3::hash(data).as_bytes())
    }

    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Key(bytes)
    }

    /// Creates a key from a slice, if it is exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Key(arr))
    }

    /// Returns the smallest key whose hex form starts with `prefix`.
    ///
    /// Missing trailing nibbles are filled with zeros. Returns None when the
    /// prefix is longer than a key or contains non-hex characters.
    pub fn lower_bound(prefix: &str) -> Option<Self> {
        if prefix.len() > 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, c) in prefix.chars().enumerate() {
            let nibble = c.to_digit(16)? as u8;
            if i % 2 == 0 {
                bytes[i / 2] = nibble << 4;
            } else {
                bytes[i / 2] |= nibble;
            }
        }
        Some(Key(bytes))
    }

    /// Returns true if the hex form of this key starts with `prefix`.
    ///
    /// `prefix` must already be lowercase.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.to_string().starts_with(prefix)
    }

    /// Returns the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the abbreviated hex form used in listings.
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(SHORT_LEN);
        s
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
