//! Voice alias resolution
//!
//! Clients ask for voices by short alias ("voice1", "narrator"). The map
//! from alias to ElevenLabs voice id is configured as comma-separated
//! `alias=id` pairs so the ids stay out of the source tree.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

/// Alias -> ElevenLabs voice id
#[derive(Debug, Clone, Default)]
pub struct VoiceMap {
    voices: BTreeMap<String, String>,
}

impl VoiceMap {
    /// Parse a `alias=id,alias=id` spec. Blank entries are skipped so a
    /// trailing comma is harmless.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut voices = BTreeMap::new();

        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((alias, id)) = pair.split_once('=') else {
                bail!("invalid voice entry '{pair}', expected alias=id");
            };
            let (alias, id) = (alias.trim(), id.trim());
            if alias.is_empty() || id.is_empty() {
                bail!("invalid voice entry '{pair}', expected alias=id");
            }
            if voices.insert(alias.to_string(), id.to_string()).is_some() {
                bail!("duplicate voice alias '{alias}'");
            }
        }

        Ok(Self { voices })
    }

    /// Resolve an alias to its voice id
    pub fn resolve(&self, alias: &str) -> Result<&str> {
        if let Some(id) = self.voices.get(alias) {
            return Ok(id);
        }

        if self.voices.is_empty() {
            bail!("no voices configured; set --voices or ELEVENLABS_VOICES (alias=id,...)");
        }

        bail!(
            "voice '{}' not found. Known voices: {}",
            alias,
            self.aliases().collect::<Vec<_>>().join(", ")
        )
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> + '_ {
        self.voices.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_pairs() {
        let map = VoiceMap::parse("voice1=abc123, voice2=def456,").unwrap();
        assert_eq!(map.resolve("voice1").unwrap(), "abc123");
        assert_eq!(map.resolve("voice2").unwrap(), "def456");
    }

    #[test]
    fn test_rejects_malformed_entries() {
        assert!(VoiceMap::parse("voice1").is_err());
        assert!(VoiceMap::parse("voice1=").is_err());
        assert!(VoiceMap::parse("=abc123").is_err());
        assert!(VoiceMap::parse("voice1=a,voice1=b").is_err());
    }

    #[test]
    fn test_resolve_lists_known_aliases() {
        let map = VoiceMap::parse("voice1=abc123,voice2=def456").unwrap();
        let err = map.resolve("voice9").unwrap_err().to_string();
        assert!(err.contains("voice1"));
        assert!(err.contains("voice2"));
    }

    #[test]
    fn test_resolve_on_empty_map_points_at_config() {
        let map = VoiceMap::default();
        let err = map.resolve("voice1").unwrap_err().to_string();
        assert!(err.contains("ELEVENLABS_VOICES"));
    }
}
