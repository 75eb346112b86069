use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Handle naming content by hash, as returned by the primary node.
///
/// The string form is kept exactly as the node produced it; it is the key
/// used for the local pin, the remote pin request and the S3 object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId {
    raw: String,
    parsed: ::cid::Cid,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid content identifier '{value}': {source}")]
pub struct CidError {
    value: String,
    #[source]
    source: ::cid::Error,
}

impl ContentId {
    pub fn parse(value: &str) -> Result<Self, CidError> {
        let value = value.trim();
        let parsed = ::cid::Cid::try_from(value).map_err(|source| CidError {
            value: value.to_string(),
            source,
        })?;
        Ok(Self {
            raw: value.to_string(),
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decoded form, for callers that need the codec or multihash.
    pub fn to_cid(&self) -> ::cid::Cid {
        self.parsed
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ContentId {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = CidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(cid: ContentId) -> Self {
        cid.raw
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0: &str = "QmPZ9gcCEpqKTo6aq61g2nXGUhM4iCL3ewB6LDXZCtioEB";
    const V1: &str = "bafkreifzjut3te2nhyekklss27nh3k72ysco7y32koao5eei66wof36n5e";

    #[test]
    fn test_parse_v0_and_v1() {
        assert_eq!(ContentId::parse(V0).unwrap().as_str(), V0);
        let v1 = ContentId::parse(V1).unwrap();
        assert_eq!(v1.to_string(), V1);
        assert_eq!(v1.to_cid().version(), ::cid::Version::V1);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let cid = ContentId::parse(&format!("  {}\n", V1)).unwrap();
        assert_eq!(cid.as_str(), V1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ContentId::parse("not-a-cid").is_err());
        assert!(ContentId::parse("").is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let cid = ContentId::parse(V1).unwrap();
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{}\"", V1));
        let back: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
        assert!(serde_json::from_str::<ContentId>("\"nope\"").is_err());
    }
}
