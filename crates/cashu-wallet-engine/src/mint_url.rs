//! Mint Urls

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

/// Url Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// Scheme is not http or https
    #[error("Unsupported mint url scheme: `{0}`")]
    UnsupportedScheme(String),
    /// Url cannot carry path segments
    #[error("Mint url cannot be a base")]
    CannotBeABase,
}

/// A mint endpoint.
///
/// Proofs, keysets and balances are all keyed by mint, so two strings
/// naming the same mint must compare equal: the url is normalized on
/// construction (scheme and host lowercased by the parser, trailing
/// slashes dropped, path casing kept). Only http(s) endpoints are
/// accepted; the websocket variant is derived per request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MintUrl(String);

impl MintUrl {
    /// Build a request url under this mint, one path segment per element
    pub fn join_paths(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.0)?;
        url.path_segments_mut()
            .map_err(|_| Error::CannotBeABase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl FromStr for MintUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim())?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(Error::UnsupportedScheme(other.to_string())),
        }

        Ok(Self(url.to_string().trim_end_matches('/').to_string()))
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for MintUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MintUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MintUrl::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_mint_compares_equal() {
        for raw in [
            "https://MINT.Example.com",
            "https://mint.example.com/",
            "https://mint.example.com///",
        ] {
            assert_eq!(
                MintUrl::from_str(raw).unwrap().to_string(),
                "https://mint.example.com"
            );
        }

        // path casing is significant and preserved
        let with_path = MintUrl::from_str("https://Mint.Minibits.cash/Bitcoin/").unwrap();
        assert_eq!(with_path.to_string(), "https://mint.minibits.cash/Bitcoin");
        assert_eq!(
            with_path,
            MintUrl::from_str("https://mint.minibits.cash/Bitcoin").unwrap()
        );
    }

    #[test]
    fn test_join_paths() {
        let plain = MintUrl::from_str("https://mint.example.com:3338").unwrap();
        assert_eq!(
            plain.join_paths(&["v1", "keys"]).unwrap().as_str(),
            "https://mint.example.com:3338/v1/keys"
        );

        // a mint mounted under a path keeps its prefix
        let nested = MintUrl::from_str("https://mint.example.com/api/cashu/").unwrap();
        assert_eq!(
            nested
                .join_paths(&["v1", "mint", "quote", "bolt11"])
                .unwrap()
                .as_str(),
            "https://mint.example.com/api/cashu/v1/mint/quote/bolt11"
        );
    }

    #[test]
    fn test_rejects_non_http_endpoints() {
        assert!(matches!(
            MintUrl::from_str("ftp://mint.example.com"),
            Err(Error::UnsupportedScheme(_))
        ));
        assert!(MintUrl::from_str("mint.example.com").is_err());
        assert!(MintUrl::from_str("").is_err());
    }
}
