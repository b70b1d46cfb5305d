//! Remapping options and hashing parameters.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Passes enabled for one remapping run.
    ///
    /// Serialized in the `bitflags` text form, e.g. `"STRIP | MAP_TYPES"`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RemapOptions: u32 {
        /// Remove debug information (source, names, lines).
        const STRIP = 1 << 0;
        /// Canonicalize type and constant ids by structure.
        const MAP_TYPES = 1 << 1;
        /// Canonicalize named ids by their debug name.
        const MAP_NAMES = 1 << 2;
        /// Canonicalize ids inside function bodies by local code shape.
        const MAP_FUNCS = 1 << 3;
        /// Remove functions that are never called.
        const DCE_FUNCS = 1 << 4;
        /// Remove variables that are never referenced.
        const DCE_VARS = 1 << 5;
        /// Remove types and constants that are never referenced.
        const DCE_TYPES = 1 << 6;
        /// Promote single-store function variables to SSA values.
        const OPT_LOADSTORE = 1 << 7;
        /// Forward loads and stores of interface variables. Produces a module that
        /// does not conform to SPIR-V; never part of a convenience value.
        const OPT_FWD_LS = 1 << 8;

        const MAP_ALL = Self::MAP_TYPES.bits() | Self::MAP_NAMES.bits() | Self::MAP_FUNCS.bits();
        const DCE_ALL = Self::DCE_FUNCS.bits() | Self::DCE_VARS.bits() | Self::DCE_TYPES.bits();
        const OPT_ALL = Self::OPT_LOADSTORE.bits();
        const ALL_BUT_STRIP = Self::MAP_ALL.bits() | Self::DCE_ALL.bits();
        const ALL = Self::STRIP.bits() | Self::ALL_BUT_STRIP.bits();
    }
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self::ALL_BUT_STRIP
    }
}

/// Largest id a hash candidate range may reach.
pub const MAX_CANDIDATE_ID: u32 = 0x003F_FFFF;

/// Seeds, multipliers and target sub-ranges of the canonicalization hashes.
///
/// Each strategy maps a hash `h` to the candidate id `h % limit + offset`; the first
/// unclaimed id at or above the candidate is taken. Modules remapped with different
/// parameters will not converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
    pub name_seed: u32,
    pub name_multiplier: u32,
    pub name_limit: u32,
    pub name_offset: u32,

    /// Instructions on each side of a result-producing instruction folded into its hash.
    pub fn_window: usize,
    pub fn_key_multiplier: u32,
    pub fn_multiplier: u32,
    pub fn_opcode_multiplier: u32,
    pub fn_limit: u32,
    pub fn_offset: u32,
    /// Occurrence counter multiplier of the second function-body scan.
    pub fn_counter_multiplier: u32,
    /// Function key multiplier of the second function-body scan.
    pub fn_counter_key_multiplier: u32,

    pub type_limit: u32,
    pub type_offset: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            name_seed: 1911,
            name_multiplier: 1009,
            name_limit: 3011,
            name_offset: 3019,

            fn_window: 2,
            fn_key_multiplier: 17,
            fn_multiplier: 30103,
            fn_opcode_multiplier: 19,
            fn_limit: 19071,
            fn_offset: 6203,
            fn_counter_multiplier: 50047,
            fn_counter_key_multiplier: 117,

            type_limit: 3011,
            type_offset: 8,
        }
    }
}

impl HashParams {
    #[inline]
    pub fn name_candidate(&self, hash: u32) -> u32 {
        (hash % self.name_limit.max(1)).saturating_add(self.name_offset)
    }

    #[inline]
    pub fn fn_candidate(&self, hash: u32) -> u32 {
        (hash % self.fn_limit.max(1)).saturating_add(self.fn_offset)
    }

    #[inline]
    pub fn type_candidate(&self, hash: u32) -> u32 {
        (hash % self.type_limit.max(1)).saturating_add(self.type_offset)
    }

    /// First strategy whose candidate range `offset..offset + limit` runs past
    /// [`MAX_CANDIDATE_ID`].
    pub fn out_of_range(&self) -> Option<&'static str> {
        [
            ("name", self.name_limit, self.name_offset),
            ("fn", self.fn_limit, self.fn_offset),
            ("type", self.type_limit, self.type_offset),
        ]
        .into_iter()
        .find(|&(_, limit, offset)| {
            offset
                .checked_add(limit.max(1) - 1)
                .map_or(true, |last| last > MAX_CANDIDATE_ID)
        })
        .map(|(strategy, _, _)| strategy)
    }

    /// Polynomial hash of a debug name.
    pub fn hash_name(&self, name: &str) -> u32 {
        name.bytes().fold(self.name_seed, |hash, byte| {
            hash.wrapping_mul(self.name_multiplier)
                .wrapping_add(u32::from(byte))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convenience_values() {
        assert!(RemapOptions::ALL.contains(RemapOptions::STRIP));
        assert!(!RemapOptions::ALL_BUT_STRIP.contains(RemapOptions::STRIP));
        assert!(!RemapOptions::ALL.contains(RemapOptions::OPT_FWD_LS));
        assert!(!RemapOptions::ALL.contains(RemapOptions::OPT_LOADSTORE));
        assert_eq!(RemapOptions::OPT_ALL, RemapOptions::OPT_LOADSTORE);
    }

    #[test]
    fn test_options_json() {
        let options = RemapOptions::STRIP | RemapOptions::DCE_FUNCS;
        let json = serde_json::to_string(&options).unwrap();
        let back: RemapOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn test_name_hash() {
        let params = HashParams::default();
        // 1911 * 1009 + 'a'
        assert_eq!(params.hash_name("a"), 1911 * 1009 + 97);
        assert_eq!(params.hash_name(""), 1911);
        let candidate = params.name_candidate(params.hash_name("main"));
        assert!((3019..3019 + 3011).contains(&candidate));
    }

    #[test]
    fn test_partial_params_json() {
        let params: HashParams = serde_json::from_str(r#"{ "fn_window": 3 }"#).unwrap();
        assert_eq!(params.fn_window, 3);
        assert_eq!(params.name_seed, 1911);
    }

    #[test]
    fn test_large_offset_saturates() {
        let params = HashParams {
            type_offset: u32::MAX,
            ..HashParams::default()
        };
        assert_eq!(params.type_candidate(12345), u32::MAX);
        assert_eq!(params.out_of_range(), Some("type"));
    }

    #[test]
    fn test_candidate_ranges() {
        assert_eq!(HashParams::default().out_of_range(), None);

        let edge = HashParams {
            name_limit: 10,
            name_offset: MAX_CANDIDATE_ID - 9,
            ..HashParams::default()
        };
        assert_eq!(edge.out_of_range(), None);

        let past = HashParams {
            name_offset: MAX_CANDIDATE_ID - 8,
            ..edge
        };
        assert_eq!(past.out_of_range(), Some("name"));
    }
}
