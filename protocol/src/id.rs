use {
    anyhow::{Context as _, Error, bail, ensure},
    derive_more::Display,
    rand::{
        SeedableRng,
        distr::{Alphanumeric, SampleString},
        rngs::StdRng,
    },
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{borrow::Cow, str::FromStr},
};

/// Opaque token assigned by a blob store when an upload completes.
///
/// Nothing may rely on its structure beyond equality. Generated ids are alphanumeric, but
/// parsing accepts any id that can't be mistaken for a path, so a filesystem store can
/// always use it as a plain file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct StashId(String);

const STASH_ID_LENGTH: usize = 16;

impl StashId {
    #[inline]
    pub fn generate() -> anyhow::Result<Self> {
        let mut rng = StdRng::try_from_os_rng().context("failed to seed random generator")?;
        Ok(Self(Alphanumeric.sample_string(&mut rng, STASH_ID_LENGTH)))
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StashId {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(!s.is_empty(), "stash id is empty");
        ensure!(s != "." && s != "..", "invalid stash id `{s}`");
        if let Some(c) = s
            .chars()
            .find(|c| matches!(c, '/' | '\\') || c.is_control())
        {
            bail!("stash id contains invalid character {c:?}");
        }
        Ok(Self(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for StashId {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Serialize for StashId {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
