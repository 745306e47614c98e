//! Access-mask codec: a 32-bit rights mask decoded into an ordered set of
//! SDDL mnemonic tokens and back.
//!
//! Decoding tests bit groups in a fixed precedence order because the groups
//! overlap: the file-access composites (`FA`, `FR`) subsume the standard
//! rights they contain, so they must be checked before the individual
//! standard-right bits. The original input mask is always retained so that
//! masks carrying unrecognized bits re-encode losslessly.

use serde::{Deserialize, Serialize};

// Special permissions. Each file-specific right carries SYNCHRONIZE, per the
// NTFS rights table these constants are taken from.
pub const FILE_READ_DATA: u32 = SYNCHRONIZE | 0x0000_0001;
pub const FILE_WRITE_DATA: u32 = SYNCHRONIZE | 0x0000_0002;
pub const FILE_APPEND_DATA: u32 = SYNCHRONIZE | 0x0000_0004;
pub const FILE_READ_EA: u32 = SYNCHRONIZE | 0x0000_0008;
pub const FILE_WRITE_EA: u32 = SYNCHRONIZE | 0x0000_0010;
pub const FILE_EXECUTE: u32 = SYNCHRONIZE | 0x0000_0020;
pub const FILE_DELETE_CHILD: u32 = SYNCHRONIZE | 0x0000_0040;
pub const FILE_READ_ATTRIBUTES: u32 = SYNCHRONIZE | 0x0000_0080;
pub const FILE_WRITE_ATTRIBUTES: u32 = SYNCHRONIZE | 0x0000_0100;

// Standard rights.
pub const DELETE: u32 = 0x0001_0000;
pub const READ_CONTROL: u32 = 0x0002_0000;
pub const WRITE_DAC: u32 = 0x0004_0000;
pub const WRITE_OWNER: u32 = 0x0008_0000;
pub const SYNCHRONIZE: u32 = 0x0010_0000;
pub const STANDARD_RIGHTS_REQUIRED: u32 = DELETE | READ_CONTROL | WRITE_DAC | WRITE_OWNER;

/// Composite read group: `FR` in SDDL.
pub const FILE_READ_ACCESS: u32 =
    SYNCHRONIZE | READ_CONTROL | FILE_READ_DATA | FILE_READ_EA | FILE_READ_ATTRIBUTES;
/// Composite full-access group: `FA` in SDDL.
pub const FILE_ALL_ACCESS: u32 = STANDARD_RIGHTS_REQUIRED | SYNCHRONIZE | 0x1FF;

pub const ACCESS_SYSTEM_SECURITY: u32 = 0x0100_0000;
pub const MAXIMUM_ALLOWED: u32 = 0x0200_0000;

// Generic rights.
pub const GENERIC_ALL: u32 = 0x1000_0000;
pub const GENERIC_EXECUTE: u32 = 0x2000_0000;
pub const GENERIC_WRITE: u32 = 0x4000_0000;
pub const GENERIC_READ: u32 = 0x8000_0000;

/// Decoded view of a 32-bit access mask.
///
/// `mask` always holds the original input bits; `flags` the mnemonic tokens
/// recognized during decoding, in precedence order; `has_unknown` whether any
/// bits were left over after all recognized tokens were removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessMaskDetail {
    pub mask: u32,
    pub flags: Vec<String>,
    pub has_unknown: bool,
}

impl AccessMaskDetail {
    /// Decode a raw access mask into its mnemonic tokens.
    #[must_use]
    pub fn from_mask(mask: u32) -> Self {
        let mut flags = Vec::new();
        let mut rest = mask;

        let emit = |flags: &mut Vec<String>, rest: &mut u32, token: &str, bits: u32| {
            flags.push(token.to_owned());
            *rest &= !bits;
        };

        if rest & FILE_ALL_ACCESS == FILE_ALL_ACCESS {
            emit(&mut flags, &mut rest, "FA", FILE_ALL_ACCESS);
        } else if rest & FILE_ALL_ACCESS == FILE_READ_ACCESS {
            emit(&mut flags, &mut rest, "FR", FILE_READ_ACCESS);
        } else {
            // Standard rights, individually.
            if rest & DELETE != 0 {
                emit(&mut flags, &mut rest, "SD", DELETE);
            }
            if rest & READ_CONTROL != 0 {
                emit(&mut flags, &mut rest, "RC", READ_CONTROL);
            }
            if rest & WRITE_DAC != 0 {
                emit(&mut flags, &mut rest, "WD", WRITE_DAC);
            }
            if rest & WRITE_OWNER != 0 {
                emit(&mut flags, &mut rest, "WO", WRITE_OWNER);
            }
            if rest & SYNCHRONIZE != 0 {
                emit(&mut flags, &mut rest, "SY", SYNCHRONIZE);
            }
        }

        if rest & GENERIC_EXECUTE != 0 {
            emit(&mut flags, &mut rest, "GX", GENERIC_EXECUTE);
        }
        if rest & GENERIC_WRITE != 0 {
            emit(&mut flags, &mut rest, "GW", GENERIC_WRITE);
        }
        if rest & GENERIC_READ != 0 {
            emit(&mut flags, &mut rest, "GR", GENERIC_READ);
        }
        if rest & GENERIC_ALL != 0 {
            emit(&mut flags, &mut rest, "GA", GENERIC_ALL);
        }

        if rest & ACCESS_SYSTEM_SECURITY != 0 {
            emit(&mut flags, &mut rest, "AS", ACCESS_SYSTEM_SECURITY);
        }
        if rest & MAXIMUM_ALLOWED != 0 {
            emit(&mut flags, &mut rest, "MA", MAXIMUM_ALLOWED);
        }

        Self {
            mask,
            flags,
            has_unknown: rest != 0,
        }
    }

    /// Re-encode to a raw mask.
    ///
    /// When unknown bits were present at decode time the stored mask is the
    /// starting point, which makes the round trip lossless; otherwise the
    /// token bit patterns are OR-ed from zero. Token strings outside the
    /// fixed table contribute nothing.
    #[must_use]
    pub fn to_mask(&self) -> u32 {
        let mut mask = if self.has_unknown { self.mask } else { 0 };
        for flag in &self.flags {
            mask |= match flag.as_str() {
                "FA" => FILE_ALL_ACCESS,
                "FR" => FILE_READ_ACCESS,
                "SD" => DELETE,
                "RC" => READ_CONTROL,
                "WD" => WRITE_DAC,
                "WO" => WRITE_OWNER,
                "SY" => SYNCHRONIZE,
                "GX" => GENERIC_EXECUTE,
                "GW" => GENERIC_WRITE,
                "GR" => GENERIC_READ,
                "GA" => GENERIC_ALL,
                "AS" => ACCESS_SYSTEM_SECURITY,
                "MA" => MAXIMUM_ALLOWED,
                _ => 0,
            };
        }
        mask
    }
}

/// Map a 3-bit POSIX permission triplet (execute=1, write=2, read=4) to
/// generic access rights.
///
/// Full rwx maps to [`FILE_ALL_ACCESS`] rather than the OR of the three
/// generic bits; partial combinations OR the matching generic bits.
#[must_use]
pub fn posix_mode_to_mask(mode: u32) -> u32 {
    let execute = mode & 1 != 0;
    let write = mode & 2 != 0;
    let read = mode & 4 != 0;

    if execute && write && read {
        return FILE_ALL_ACCESS;
    }

    let mut mask = 0;
    if execute {
        mask |= GENERIC_EXECUTE;
    }
    if write {
        mask |= GENERIC_WRITE;
    }
    if read {
        mask |= GENERIC_READ;
    }
    mask
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn flags(detail: &AccessMaskDetail) -> Vec<&str> {
        detail.flags.iter().map(String::as_str).collect()
    }

    #[test]
    fn full_access_decodes_to_fa() {
        let detail = AccessMaskDetail::from_mask(FILE_ALL_ACCESS);
        assert_eq!(flags(&detail), ["FA"]);
        assert!(!detail.has_unknown);
        assert_eq!(detail.to_mask(), FILE_ALL_ACCESS);
    }

    #[test]
    fn read_access_decodes_to_fr() {
        let detail = AccessMaskDetail::from_mask(FILE_READ_ACCESS);
        assert_eq!(flags(&detail), ["FR"]);
        assert!(!detail.has_unknown);
        assert_eq!(detail.to_mask(), FILE_READ_ACCESS);
    }

    #[test]
    fn unknown_bits_are_preserved() {
        // 0x1200a9 carries READ_CONTROL and SYNCHRONIZE plus low file bits
        // that no token covers on their own.
        let detail = AccessMaskDetail::from_mask(0x0012_00a9);
        assert_eq!(flags(&detail), ["RC", "SY"]);
        assert!(detail.has_unknown);
        assert_eq!(detail.mask, 0x0012_00a9);
        assert_eq!(detail.to_mask(), 0x0012_00a9);
    }

    #[test]
    fn standard_and_generic_rights_decode_in_order() {
        let detail = AccessMaskDetail::from_mask(0x0013_01bf);
        assert_eq!(flags(&detail), ["SD", "RC", "SY"]);
        assert!(detail.has_unknown);

        let detail = AccessMaskDetail::from_mask(0xe001_0000);
        assert_eq!(flags(&detail), ["SD", "GX", "GW", "GR"]);
        assert!(!detail.has_unknown);
        assert_eq!(detail.to_mask(), 0xe001_0000);
    }

    #[test]
    fn special_rights_decode() {
        let detail = AccessMaskDetail::from_mask(ACCESS_SYSTEM_SECURITY | MAXIMUM_ALLOWED);
        assert_eq!(flags(&detail), ["AS", "MA"]);
        assert!(!detail.has_unknown);
    }

    #[test]
    fn unknown_token_strings_are_ignored() {
        let detail = AccessMaskDetail {
            mask: 0,
            flags: vec!["ZZ".to_owned(), "GR".to_owned()],
            has_unknown: false,
        };
        assert_eq!(detail.to_mask(), GENERIC_READ);
    }

    #[test]
    fn posix_mode_mapping() {
        assert_eq!(posix_mode_to_mask(0), 0);
        assert_eq!(posix_mode_to_mask(1), GENERIC_EXECUTE);
        assert_eq!(posix_mode_to_mask(2), GENERIC_WRITE);
        assert_eq!(posix_mode_to_mask(4), GENERIC_READ);
        assert_eq!(posix_mode_to_mask(5), GENERIC_READ | GENERIC_EXECUTE);
        assert_eq!(posix_mode_to_mask(6), GENERIC_READ | GENERIC_WRITE);
        // Full rwx is the composite, not GENERIC_READ|GENERIC_WRITE|GENERIC_EXECUTE.
        assert_eq!(posix_mode_to_mask(7), FILE_ALL_ACCESS);
    }

    proptest! {
        #[test]
        fn mask_round_trip(mask in any::<u32>()) {
            let detail = AccessMaskDetail::from_mask(mask);
            prop_assert_eq!(detail.to_mask(), mask);
        }

        #[test]
        fn known_tokens_reassemble_mask(mask in any::<u32>()) {
            let detail = AccessMaskDetail::from_mask(mask);
            if !detail.has_unknown {
                let rebuilt = AccessMaskDetail {
                    mask: 0,
                    flags: detail.flags.clone(),
                    has_unknown: false,
                };
                prop_assert_eq!(rebuilt.to_mask(), mask);
            }
        }
    }
}
