//! Enabled-granularity sets and their boolean flag record.
//!
//! Config files store a rule's granularities either as a code list
//! (`["D", "h"]`) or as a flag record (`{ Day = true, Hour = true }`).
//! Both deserialize into the same `GranularitySet`; it serializes back as
//! the code list.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::SeriesError;
use crate::granularity::Granularity;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GranularitySetRepr", into = "Vec<Granularity>")]
pub struct GranularitySet(BTreeSet<Granularity>);

impl GranularitySet {
    pub fn all() -> Self {
        Self(Granularity::ALL.into_iter().collect())
    }

    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> Result<Self, SeriesError> {
        codes
            .iter()
            .map(|c| Granularity::from_code(c.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Codes in coarse-to-fine order.
    pub fn to_codes(&self) -> Vec<&'static str> {
        self.0.iter().map(|g| g.code()).collect()
    }

    pub fn contains(&self, granularity: Granularity) -> bool {
        self.0.contains(&granularity)
    }

    pub fn insert(&mut self, granularity: Granularity) -> bool {
        self.0.insert(granularity)
    }

    /// Coarsest enabled granularity.
    pub fn first(&self) -> Option<Granularity> {
        self.0.iter().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Granularity> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Granularity> for GranularitySet {
    fn from_iter<I: IntoIterator<Item = Granularity>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<GranularitySet> for Vec<Granularity> {
    fn from(set: GranularitySet) -> Self {
        set.0.into_iter().collect()
    }
}

/// One boolean per granularity, as edited in a configuration form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GranularityFlags {
    pub month: bool,
    pub day: bool,
    pub hour: bool,
    pub minute: bool,
    pub second: bool,
}

impl GranularityFlags {
    pub fn get(&self, granularity: Granularity) -> bool {
        match granularity {
            Granularity::Month => self.month,
            Granularity::Day => self.day,
            Granularity::Hour => self.hour,
            Granularity::Minute => self.minute,
            Granularity::Second => self.second,
        }
    }

    pub fn set(&mut self, granularity: Granularity, enabled: bool) {
        let slot = match granularity {
            Granularity::Month => &mut self.month,
            Granularity::Day => &mut self.day,
            Granularity::Hour => &mut self.hour,
            Granularity::Minute => &mut self.minute,
            Granularity::Second => &mut self.second,
        };
        *slot = enabled;
    }
}

impl From<GranularityFlags> for GranularitySet {
    fn from(flags: GranularityFlags) -> Self {
        Granularity::ALL
            .into_iter()
            .filter(|g| flags.get(*g))
            .collect()
    }
}

impl From<&GranularitySet> for GranularityFlags {
    fn from(set: &GranularitySet) -> Self {
        let mut flags = GranularityFlags::default();
        for g in set.iter() {
            flags.set(g, true);
        }
        flags
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GranularitySetRepr {
    Codes(Vec<Granularity>),
    Flags(GranularityFlags),
}

impl From<GranularitySetRepr> for GranularitySet {
    fn from(repr: GranularitySetRepr) -> Self {
        match repr {
            GranularitySetRepr::Codes(codes) => codes.into_iter().collect(),
            GranularitySetRepr::Flags(flags) => flags.into(),
        }
    }
}
