use std::fmt;

use serde::Serialize;

pub const SEPARATOR: char = '_';
const PREFIX_LEN: usize = 2;
const MIN_ID_LEN: usize = PREFIX_LEN + 2;

/// Every source of stations, each owning a two-character id namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Backend {
    MyStations,
    RadioBrowser,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::MyStations, Backend::RadioBrowser];

    pub const fn prefix(self) -> &'static str {
        match self {
            Backend::MyStations => "MY",
            Backend::RadioBrowser => "RB",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.prefix() == prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationId {
    backend: Backend,
    local_id: String,
}

impl StationId {
    pub fn new(backend: Backend, local_id: impl Into<String>) -> Option<Self> {
        let local_id = local_id.into();
        if local_id.is_empty() {
            return None;
        }
        Some(Self { backend, local_id })
    }

    pub fn parse(id: &str) -> Option<Self> {
        let backend = Backend::from_prefix(prefix_of(id)?)?;
        Self::new(backend, local_id_of(id)?)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.backend.prefix(), SEPARATOR, self.local_id)
    }
}

impl Serialize for StationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn encode(local_id: &str, prefix: Option<&str>) -> Option<String> {
    let prefix = prefix?;
    if prefix.chars().count() != PREFIX_LEN || local_id.is_empty() {
        return None;
    }
    Some(format!("{prefix}{SEPARATOR}{local_id}"))
}

pub fn prefix_of(id: &str) -> Option<&str> {
    if id.chars().count() < MIN_ID_LEN {
        return None;
    }
    let end = char_offset(id, PREFIX_LEN)?;
    id.get(..end)
}

pub fn local_id_of(id: &str) -> Option<&str> {
    if id.chars().count() < MIN_ID_LEN {
        return None;
    }
    let start = char_offset(id, PREFIX_LEN + 1)?;
    id.get(start..)
}

fn char_offset(value: &str, chars: usize) -> Option<usize> {
    value.char_indices().nth(chars).map(|(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_joins_prefix_and_local_id() {
        assert_eq!(
            encode("96062a7b-0601-11e8-ae97-52543be04c81", Some("RB")).as_deref(),
            Some("RB_96062a7b-0601-11e8-ae97-52543be04c81")
        );
    }

    #[test]
    fn round_trip_recovers_both_parts() {
        for (local, prefix) in [("x", "RB"), ("ftL2O6thHCo", "MY"), ("a_b_c", "ZZ"), ("żółw", "ÄÖ")] {
            let id = encode(local, Some(prefix)).unwrap();
            assert_eq!(local_id_of(&id), Some(local));
            assert_eq!(prefix_of(&id), Some(prefix));
        }
    }

    #[test]
    fn encode_rejects_bad_prefix_or_empty_local_id() {
        assert_eq!(encode("abc", None), None);
        assert_eq!(encode("abc", Some("")), None);
        assert_eq!(encode("abc", Some("R")), None);
        assert_eq!(encode("abc", Some("RBX")), None);
        assert_eq!(encode("", Some("RB")), None);
    }

    #[test]
    fn short_ids_do_not_decode() {
        assert_eq!(prefix_of("RB_"), None);
        assert_eq!(local_id_of("RB_"), None);
        assert_eq!(prefix_of(""), None);
        assert_eq!(local_id_of("R"), None);
    }

    #[test]
    fn decoding_is_structural_only() {
        assert_eq!(prefix_of("XX-1234"), Some("XX"));
        assert_eq!(local_id_of("XX-1234"), Some("1234"));
    }

    #[test]
    fn parse_matches_registered_backends() {
        let id = StationId::parse("MY_ftL2O6thHCo").unwrap();
        assert_eq!(id.backend(), Backend::MyStations);
        assert_eq!(id.local_id(), "ftL2O6thHCo");
        assert_eq!(id.to_string(), "MY_ftL2O6thHCo");

        let id = StationId::parse("RB_1234").unwrap();
        assert_eq!(id.backend(), Backend::RadioBrowser);
    }

    #[test]
    fn parse_rejects_unknown_prefix_and_short_ids() {
        assert_eq!(StationId::parse("XX_1234"), None);
        assert_eq!(StationId::parse("rb_1234"), None);
        assert_eq!(StationId::parse("RB_"), None);
        assert_eq!(StationId::parse("RB"), None);
    }

    #[test]
    fn every_backend_prefix_is_two_characters_and_unique() {
        for backend in Backend::ALL {
            assert_eq!(backend.prefix().chars().count(), PREFIX_LEN);
            assert_eq!(Backend::from_prefix(backend.prefix()), Some(backend));
        }
        assert_ne!(Backend::MyStations.prefix(), Backend::RadioBrowser.prefix());
    }
}
