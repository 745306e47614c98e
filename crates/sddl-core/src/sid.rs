//! SID binary codec and the well-known SID table.
//!
//! A SID is a revision byte, a 48-bit identifier authority (big-endian on
//! the wire) and up to 255 little-endian 32-bit sub-authorities. The string
//! form is the canonical dash-separated `S-1-5-32-544` spelling; a fixed set
//! of well-known SIDs additionally has a two-letter SDDL alias (`BA`).

use std::collections::HashMap;
use std::sync::LazyLock;

use thiserror::Error;

/// Fixed SID-to-alias pairs, per the published SDDL reference table.
///
/// Two aliases appear twice on the SID side (`NO`, `BG`). The reverse table
/// below is built last-entry-wins in this order, which resolves both to the
/// builtin-group SIDs.
const WELL_KNOWN_SIDS: &[(&str, &str)] = &[
    ("S-1-0-0", "NO"),       // Nobody
    ("S-1-1-0", "WD"),       // Everyone
    ("S-1-2-0", "LG"),       // Local
    ("S-1-3-0", "CO"),       // Creator Owner
    ("S-1-3-1", "CG"),       // Creator Group
    ("S-1-5-1", "DU"),       // Dialup
    ("S-1-5-2", "NU"),       // Network
    ("S-1-5-3", "BG"),       // Batch
    ("S-1-5-4", "IU"),       // Interactive
    ("S-1-5-6", "SU"),       // Service
    ("S-1-5-7", "AN"),       // Anonymous
    ("S-1-5-8", "PS"),       // Proxy
    ("S-1-5-9", "ED"),       // Enterprise Domain Controllers
    ("S-1-5-11", "AU"),      // Authenticated Users
    ("S-1-5-12", "RC"),      // Restricted Code
    ("S-1-5-32-544", "BA"),  // Builtin Administrators
    ("S-1-5-32-545", "BU"),  // Builtin Users
    ("S-1-5-32-546", "BG"),  // Builtin Guests
    ("S-1-5-32-547", "PU"),  // Power Users
    ("S-1-5-32-548", "AO"),  // Account Operators
    ("S-1-5-32-549", "SO"),  // Server Operators
    ("S-1-5-32-550", "PO"),  // Printer Operators
    ("S-1-5-32-551", "BO"),  // Backup Operators
    ("S-1-5-32-552", "RE"),  // Replicator
    ("S-1-5-32-554", "RU"),  // Pre-Windows 2000 Compatible Access
    ("S-1-5-32-555", "RD"),  // Remote Desktop Users
    ("S-1-5-32-556", "NO"),  // Network Configuration Operators
    ("S-1-5-32-558", "MU"),  // Performance Monitor Users
    ("S-1-5-32-559", "LU"),  // Performance Log Users
    ("S-1-5-32-568", "IS"),  // IIS_IUSRS
    ("S-1-5-32-569", "CY"),  // Cryptographic Operators
    ("S-1-5-32-573", "ER"),  // Event Log Readers
    ("S-1-5-32-574", "CD"),  // Certificate Service DCOM Access
    ("S-1-5-18", "SY"),      // Local System
    ("S-1-5-19", "LS"),      // Local Service
    ("S-1-5-20", "NS"),      // Network Service
    ("S-1-15-2-1", "AC"),    // All Application Packages
];

static SID_TO_ALIAS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| WELL_KNOWN_SIDS.iter().copied().collect());

static ALIAS_TO_SID: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| WELL_KNOWN_SIDS.iter().map(|&(sid, alias)| (alias, sid)).collect());

/// Errors from the SID binary and string codecs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SidError {
    /// The buffer ends before the declared SID structure.
    #[error("sid truncated at offset {offset}: need {needed} bytes, {available} remain")]
    Truncated {
        /// Byte offset of the field that could not be read.
        offset: usize,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer at that offset.
        available: usize,
    },

    /// The string form does not look like `S-R-A[-S...]`.
    #[error("invalid sid string: {value}")]
    InvalidFormat {
        /// The offending input.
        value: String,
    },

    /// The identifier authority is not a 48-bit decimal number.
    #[error("invalid sid identifier authority: {value}")]
    InvalidAuthority {
        /// The offending component.
        value: String,
    },

    /// A sub-authority is not a 32-bit decimal number.
    #[error("invalid sid sub-authority: {value}")]
    InvalidSubAuthority {
        /// The offending component.
        value: String,
    },
}

/// Return the two-letter alias for a well-known SID string, if any.
#[must_use]
pub fn alias_for(sid: &str) -> Option<&'static str> {
    SID_TO_ALIAS.get(sid).copied()
}

/// Return the canonical SID string for a well-known alias, if any.
#[must_use]
pub fn sid_for_alias(alias: &str) -> Option<&'static str> {
    ALIAS_TO_SID.get(alias).copied()
}

/// Substitute the alias for a well-known SID string; non-well-known input is
/// returned unchanged.
#[must_use]
pub fn to_alias(sid: &str) -> &str {
    alias_for(sid).unwrap_or(sid)
}

/// Resolve a well-known alias to its canonical SID string; anything else is
/// returned unchanged.
#[must_use]
pub fn resolve_alias(input: &str) -> &str {
    sid_for_alias(input).unwrap_or(input)
}

/// Decode a binary SID at `offset`, substituting the two-letter alias when
/// the result is well-known.
pub fn decode_sid(data: &[u8], offset: usize) -> Result<String, SidError> {
    let header = data
        .get(offset..offset + 8)
        .ok_or_else(|| SidError::Truncated {
            offset,
            needed: 8,
            available: data.len().saturating_sub(offset),
        })?;

    let revision = header[0];
    let sub_auth_count = usize::from(header[1]);

    let mut authority: u64 = 0;
    for &byte in &header[2..8] {
        authority = (authority << 8) | u64::from(byte);
    }

    let mut sid = format!("S-{revision}-{authority}");
    let mut cursor = offset + 8;
    for _ in 0..sub_auth_count {
        let raw = data
            .get(cursor..cursor + 4)
            .ok_or_else(|| SidError::Truncated {
                offset: cursor,
                needed: 4,
                available: data.len().saturating_sub(cursor),
            })?;
        let sub = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        sid.push('-');
        sid.push_str(&sub.to_string());
        cursor += 4;
    }

    Ok(to_alias(&sid).to_owned())
}

/// Encode a SID string (or well-known alias) into its binary form.
pub fn encode_sid(input: &str) -> Result<Vec<u8>, SidError> {
    let sid = resolve_alias(input);
    if !sid.starts_with("S-") {
        return Err(SidError::InvalidFormat {
            value: input.to_owned(),
        });
    }

    let parts: Vec<&str> = sid.split('-').collect();
    if parts.len() < 3 {
        return Err(SidError::InvalidFormat {
            value: input.to_owned(),
        });
    }
    let sub_auth_count =
        u8::try_from(parts.len() - 3).map_err(|_| SidError::InvalidFormat {
            value: input.to_owned(),
        })?;

    let authority: u64 = parts[2].parse().map_err(|_| SidError::InvalidAuthority {
        value: parts[2].to_owned(),
    })?;
    if authority >= 1 << 48 {
        return Err(SidError::InvalidAuthority {
            value: parts[2].to_owned(),
        });
    }

    let mut bytes = Vec::with_capacity(8 + 4 * usize::from(sub_auth_count));
    bytes.push(1); // revision
    bytes.push(sub_auth_count);
    bytes.extend_from_slice(&authority.to_be_bytes()[2..]);

    for part in &parts[3..] {
        let sub: u32 = part.parse().map_err(|_| SidError::InvalidSubAuthority {
            value: (*part).to_owned(),
        })?;
        bytes.extend_from_slice(&sub.to_le_bytes());
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_round_trips() {
        for (alias, sid) in ALIAS_TO_SID.iter() {
            assert_eq!(to_alias(sid), *alias, "alias for {sid}");
            assert_eq!(resolve_alias(alias), *sid, "sid for {alias}");
        }
    }

    #[test]
    fn colliding_aliases_resolve_to_builtin_groups() {
        assert_eq!(sid_for_alias("BG"), Some("S-1-5-32-546"));
        assert_eq!(sid_for_alias("NO"), Some("S-1-5-32-556"));
    }

    #[test]
    fn non_well_known_passes_through() {
        assert_eq!(to_alias("S-1-5-21-1-2-3-1001"), "S-1-5-21-1-2-3-1001");
        assert_eq!(resolve_alias("S-1-5-21-1-2-3-1001"), "S-1-5-21-1-2-3-1001");
    }

    #[test]
    fn encode_builtin_administrators() {
        let bytes = encode_sid("BA").unwrap();
        assert_eq!(
            bytes,
            [1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 0x20, 0x02, 0, 0]
        );
        // Same bytes from the canonical string.
        assert_eq!(encode_sid("S-1-5-32-544").unwrap(), bytes);
    }

    #[test]
    fn decode_substitutes_alias() {
        let bytes = encode_sid("S-1-5-32-544").unwrap();
        assert_eq!(decode_sid(&bytes, 0).unwrap(), "BA");
    }

    #[test]
    fn decode_keeps_unknown_sid_literal() {
        let bytes = encode_sid("S-1-5-21-920909269-1353440977-3059239504-1001").unwrap();
        assert_eq!(
            decode_sid(&bytes, 0).unwrap(),
            "S-1-5-21-920909269-1353440977-3059239504-1001"
        );
    }

    #[test]
    fn decode_big_endian_authority() {
        // Authority 0x0102030405 spans several bytes.
        let data = [1, 0, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(decode_sid(&data, 0).unwrap(), "S-1-4328719365");
    }

    #[test]
    fn decode_truncated_header() {
        let err = decode_sid(&[1, 1, 0, 0], 0).unwrap_err();
        assert_eq!(
            err,
            SidError::Truncated {
                offset: 0,
                needed: 8,
                available: 4
            }
        );
    }

    #[test]
    fn decode_truncated_sub_authorities() {
        // Declares two sub-authorities but carries only one.
        let mut bytes = encode_sid("S-1-5-32").unwrap();
        bytes[1] = 2;
        let err = decode_sid(&bytes, 0).unwrap_err();
        assert!(matches!(err, SidError::Truncated { offset: 12, .. }));
    }

    #[test]
    fn encode_rejects_bad_strings() {
        assert!(matches!(
            encode_sid("X-1-5").unwrap_err(),
            SidError::InvalidFormat { .. }
        ));
        assert!(matches!(
            encode_sid("S-1").unwrap_err(),
            SidError::InvalidFormat { .. }
        ));
        assert!(matches!(
            encode_sid("S-1-abc").unwrap_err(),
            SidError::InvalidAuthority { .. }
        ));
        assert!(matches!(
            encode_sid("S-1-5-99999999999").unwrap_err(),
            SidError::InvalidSubAuthority { .. }
        ));
    }

    #[test]
    fn encode_rejects_oversized_authority() {
        assert!(matches!(
            encode_sid("S-1-281474976710656").unwrap_err(),
            SidError::InvalidAuthority { .. }
        ));
    }
}
