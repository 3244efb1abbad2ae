//! Reversible per-byte transform applied to copied content.
//!
//! The XOR variant stands in for real encryption; the key is plain
//! configuration, not a security primitive.

/// Transform applied to every copied byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteTransform {
    /// Copy bytes unchanged.
    Identity,
    /// XOR every byte with a fixed key.
    Xor { key: u8 },
}

impl ByteTransform {
    /// Select the transform from the configuration flags.
    pub fn from_config(encryption: bool, key: u8) -> Self {
        if encryption {
            Self::Xor { key }
        } else {
            Self::Identity
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Transform a buffer in place.
    pub fn apply(&self, data: &mut [u8]) {
        match self {
            Self::Identity => {}
            Self::Xor { key } => {
                for byte in data.iter_mut() {
                    *byte ^= key;
                }
            }
        }
    }

    /// Undo [`ByteTransform::apply`]. Both variants are involutions, so
    /// the inverse is the transform itself.
    pub fn invert(&self, data: &mut [u8]) {
        self.apply(data);
    }
}
