use core::{fmt, str::FromStr};

use crate::TokenError;

/// Number of symbols in a token.
pub const TOKEN_LEN: usize = 8;

/// The token alphabet: lowercase ASCII letters followed by digits.
///
/// Every token is a valid DNS label.
pub const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const RADIX: u64 = ALPHABET.len() as u64;
const NO_VALUE: u8 = 255;

/// Number of distinct tokens (36^8).
pub const TOKEN_SPACE: u64 = RADIX.pow(TOKEN_LEN as u32);

/// Lookup table from ASCII byte to alphabet position
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    while i < ALPHABET.len() as u8 {
        lut[ALPHABET[i as usize] as usize] = i;
        i += 1;
    }
    lut
};

/// A short, opaque subdomain identifier.
///
/// A `Token` is always exactly [`TOKEN_LEN`] symbols drawn from [`ALPHABET`].
/// The invariant is enforced at construction, so a `Token` can be rendered
/// into a hostname without further validation.
///
/// Tokens map bijectively onto `0..TOKEN_SPACE` through
/// [`Token::from_index`] and [`Token::to_index`], read as big-endian base-36
/// numbers where `a` is zero and `9` is thirty-five.
///
/// # Example
/// ```
/// use wsprov::Token;
///
/// let token: Token = "ws7k2q0a".parse().unwrap();
/// assert_eq!(token.as_str(), "ws7k2q0a");
/// assert_eq!(Token::from_index(token.to_index()), token);
/// assert!("WS7K2Q0A".parse::<Token>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    /// Builds the token at position `index` of the token space.
    ///
    /// `index` is reduced modulo [`TOKEN_SPACE`].
    pub const fn from_index(index: u64) -> Self {
        let mut n = index % TOKEN_SPACE;
        let mut buf = [0_u8; TOKEN_LEN];
        let mut i = TOKEN_LEN;
        while i > 0 {
            i -= 1;
            buf[i] = ALPHABET[(n % RADIX) as usize];
            n /= RADIX;
        }
        Self(buf)
    }

    /// Returns the position of this token in the token space.
    pub const fn to_index(&self) -> u64 {
        let mut acc = 0_u64;
        let mut i = 0;
        while i < TOKEN_LEN {
            acc = acc * RADIX + LOOKUP[self.0[i] as usize] as u64;
            i += 1;
        }
        acc
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        // SAFETY: every byte is drawn from `ALPHABET`, which is ASCII
        unsafe { core::str::from_utf8_unchecked(&self.0) }
    }

    pub const fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != TOKEN_LEN {
            return Err(TokenError::InvalidLength { len: bytes.len() });
        }

        let mut buf = [0_u8; TOKEN_LEN];
        for (index, (&byte, slot)) in bytes.iter().zip(buf.iter_mut()).enumerate() {
            if LOOKUP[byte as usize] == NO_VALUE {
                return Err(TokenError::InvalidSymbol { byte, index });
            }
            *slot = byte;
        }
        Ok(Self(buf))
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.as_str()).finish()
    }
}

#[cfg(feature = "serde")]
mod serde_str {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Token;

    impl Serialize for Token {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            s.serialize_str(self.as_str())
        }
    }

    impl<'de> Deserialize<'de> for Token {
        fn deserialize<D>(d: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct TokenVisitor;

            impl serde::de::Visitor<'_> for TokenVisitor {
                type Value = Token;

                fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                    formatter.write_str("an 8 character lowercase alphanumeric token")
                }

                #[inline]
                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: serde::de::Error,
                {
                    v.parse().map_err(serde::de::Error::custom)
                }
            }

            d.deserialize_str(TokenVisitor)
        }
    }
}
