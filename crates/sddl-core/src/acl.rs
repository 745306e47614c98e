//! ACL/ACE model and binary codec.
//!
//! Binary layout: an 8-byte ACL header (revision, reserved, little-endian
//! total size, little-endian ACE count, two reserved bytes) followed by ACE
//! records packed contiguously. Each ACE carries its own declared size and
//! decoding advances by that size, so trailing padding inside an ACE is
//! tolerated. Only allowed, denied and mandatory-label ACEs have the
//! standard mask+SID body this codec models; any other type code fails
//! decoding rather than being skipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access_mask::AccessMaskDetail;
use crate::sid::{self, SidError};

// ACE flag bits.
pub const OBJECT_INHERIT_ACE: u8 = 0x01;
pub const CONTAINER_INHERIT_ACE: u8 = 0x02;
pub const NO_PROPAGATE_INHERIT_ACE: u8 = 0x04;
pub const INHERIT_ONLY_ACE: u8 = 0x08;
pub const INHERITED_ACE: u8 = 0x10;
pub const SUCCESSFUL_ACCESS_ACE_FLAG: u8 = 0x40;
pub const FAILED_ACCESS_ACE_FLAG: u8 = 0x80;

/// ACE type code.
///
/// The code space is open (Windows defines 0x00 through 0x14); only
/// [`Self::ACCESS_ALLOWED`], [`Self::ACCESS_DENIED`] and
/// [`Self::SYSTEM_MANDATORY_LABEL`] have an SDDL mnemonic and a body this
/// codec can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AceType(pub u8);

impl AceType {
    pub const ACCESS_ALLOWED: Self = Self(0x00);
    pub const ACCESS_DENIED: Self = Self(0x01);
    pub const SYSTEM_AUDIT: Self = Self(0x02);
    pub const SYSTEM_ALARM: Self = Self(0x03);
    pub const ACCESS_ALLOWED_COMPOUND: Self = Self(0x04);
    pub const ACCESS_ALLOWED_OBJECT: Self = Self(0x05);
    pub const ACCESS_DENIED_OBJECT: Self = Self(0x06);
    pub const ACCESS_AUDIT_OBJECT: Self = Self(0x07);
    pub const ACCESS_ALARM_OBJECT: Self = Self(0x08);
    pub const ACCESS_ALLOWED_CALLBACK: Self = Self(0x09);
    pub const ACCESS_DENIED_CALLBACK: Self = Self(0x0a);
    pub const ACCESS_ALLOWED_CALLBACK_OBJECT: Self = Self(0x0b);
    pub const ACCESS_DENIED_CALLBACK_OBJECT: Self = Self(0x0c);
    pub const SYSTEM_AUDIT_CALLBACK: Self = Self(0x0d);
    pub const SYSTEM_ALARM_CALLBACK: Self = Self(0x0e);
    pub const SYSTEM_AUDIT_CALLBACK_OBJECT: Self = Self(0x0f);
    pub const SYSTEM_ALARM_CALLBACK_OBJECT: Self = Self(0x10);
    pub const SYSTEM_MANDATORY_LABEL: Self = Self(0x11);
    pub const SYSTEM_RESOURCE_ATTRIBUTE: Self = Self(0x12);
    pub const SYSTEM_SCOPED_POLICY_ID: Self = Self(0x13);
    pub const SYSTEM_PROCESS_TRUST_LABEL: Self = Self(0x14);

    /// SDDL mnemonic for this type, `"?"` for types without one.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self.0 {
            0x00 => "A",
            0x01 => "D",
            0x11 => "ML",
            _ => "?",
        }
    }

    /// Parse an SDDL type mnemonic.
    #[must_use]
    pub fn from_mnemonic(token: &str) -> Option<Self> {
        match token {
            "A" => Some(Self::ACCESS_ALLOWED),
            "D" => Some(Self::ACCESS_DENIED),
            "ML" => Some(Self::SYSTEM_MANDATORY_LABEL),
            _ => None,
        }
    }

    /// Whether this type carries the standard mask+SID body.
    #[must_use]
    pub const fn has_standard_body(self) -> bool {
        matches!(self.0, 0x00 | 0x01 | 0x11)
    }
}

/// One access-control entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ace {
    pub ace_type: AceType,
    /// Inheritance/audit flag tokens, in bit order (`OI`, `CI`, `NP`, `IO`,
    /// `ID`, `SA`, `FA`).
    pub ace_flags: Vec<String>,
    pub access_mask: AccessMaskDetail,
    /// Trustee SID in string form (alias when well-known).
    pub sid: String,
}

/// An ordered access-control list. ACE order is evaluation order and is
/// preserved exactly across round trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acl {
    pub acl_revision: u8,
    pub aces: Vec<Ace>,
}

/// Errors from the binary ACL codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AclError {
    /// The buffer ends before a declared ACL or ACE field.
    #[error("acl truncated at offset {offset}: need {needed} bytes, {available} remain")]
    Truncated {
        /// Byte offset of the field that could not be read.
        offset: usize,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer at that offset.
        available: usize,
    },

    /// ACE type codes outside allowed/denied/mandatory-label carry bodies
    /// this codec does not model.
    #[error("unsupported ace type code: {code:#04x}")]
    UnsupportedAceType {
        /// The offending type code.
        code: u8,
    },

    /// An ACE declares a size smaller than its own fixed header.
    #[error("ace at offset {offset} declares size {size}, minimum is 8")]
    BadAceSize {
        /// Byte offset of the ACE.
        offset: usize,
        /// The declared size.
        size: u16,
    },

    /// A trustee SID failed to decode or encode.
    #[error(transparent)]
    Sid(#[from] SidError),
}

/// Decode an ACE flag byte into mnemonic tokens, one bit at a time.
#[must_use]
pub fn decode_ace_flags(flags: u8) -> Vec<String> {
    let table: [(u8, &str); 7] = [
        (OBJECT_INHERIT_ACE, "OI"),
        (CONTAINER_INHERIT_ACE, "CI"),
        (NO_PROPAGATE_INHERIT_ACE, "NP"),
        (INHERIT_ONLY_ACE, "IO"),
        (INHERITED_ACE, "ID"),
        (SUCCESSFUL_ACCESS_ACE_FLAG, "SA"),
        (FAILED_ACCESS_ACE_FLAG, "FA"),
    ];
    table
        .iter()
        .copied()
        .filter(|&(bit, _)| flags & bit != 0)
        .map(|(_, token)| token.to_owned())
        .collect()
}

/// OR the inheritance flag tokens back into a flag byte.
///
/// The audit tokens `SA`/`FA` have no binary encode path and are dropped;
/// unrecognized tokens contribute nothing.
#[must_use]
pub fn encode_ace_flags(flags: &[String]) -> u8 {
    let mut bits = 0;
    for flag in flags {
        bits |= match flag.as_str() {
            "OI" => OBJECT_INHERIT_ACE,
            "CI" => CONTAINER_INHERIT_ACE,
            "NP" => NO_PROPAGATE_INHERIT_ACE,
            "IO" => INHERIT_ONLY_ACE,
            "ID" => INHERITED_ACE,
            _ => 0,
        };
    }
    bits
}

impl Acl {
    /// Default revision for ACLs synthesized from SDDL.
    pub const DEFAULT_REVISION: u8 = 2;

    /// Decode a binary ACL starting at `offset`.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self, AclError> {
        let header = data
            .get(offset..offset + 8)
            .ok_or_else(|| AclError::Truncated {
                offset,
                needed: 8,
                available: data.len().saturating_sub(offset),
            })?;

        let acl_revision = header[0];
        let ace_count = u16::from_le_bytes([header[4], header[5]]);

        let mut cursor = offset + 8;
        let mut aces = Vec::with_capacity(usize::from(ace_count));
        for _ in 0..ace_count {
            let head = data
                .get(cursor..cursor + 8)
                .ok_or_else(|| AclError::Truncated {
                    offset: cursor,
                    needed: 8,
                    available: data.len().saturating_sub(cursor),
                })?;

            let ace_type = AceType(head[0]);
            if !ace_type.has_standard_body() {
                return Err(AclError::UnsupportedAceType { code: head[0] });
            }

            let flag_bits = head[1];
            let ace_size = u16::from_le_bytes([head[2], head[3]]);
            if ace_size < 8 {
                return Err(AclError::BadAceSize {
                    offset: cursor,
                    size: ace_size,
                });
            }
            if data.len() - cursor < usize::from(ace_size) {
                return Err(AclError::Truncated {
                    offset: cursor,
                    needed: usize::from(ace_size),
                    available: data.len() - cursor,
                });
            }

            let mask = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);
            let trustee = sid::decode_sid(data, cursor + 8)?;

            aces.push(Ace {
                ace_type,
                ace_flags: decode_ace_flags(flag_bits),
                access_mask: AccessMaskDetail::from_mask(mask),
                sid: trustee,
            });

            // The declared size governs the cursor; any bytes past the SID
            // within it are padding or extension data.
            cursor += usize::from(ace_size);
        }

        Ok(Self { acl_revision, aces })
    }

    /// Encode to the binary ACL layout.
    ///
    /// The total size and each ACE size are recomputed from the actual SID
    /// byte lengths rather than trusted from the model.
    pub fn encode(&self) -> Result<Vec<u8>, AclError> {
        tracing::debug!(ace_count = self.aces.len(), "encoding acl");

        let mut out = Vec::new();
        out.push(self.acl_revision);
        out.push(0); // Sbz1
        out.extend_from_slice(&[0, 0]); // total size, backpatched below
        out.extend_from_slice(&(self.aces.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0, 0]); // Sbz2

        for ace in &self.aces {
            let sid_bytes = sid::encode_sid(&ace.sid)?;
            let size = (8 + sid_bytes.len()) as u16;
            out.push(ace.ace_type.0);
            out.push(encode_ace_flags(&ace.ace_flags));
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&ace.access_mask.to_mask().to_le_bytes());
            out.extend_from_slice(&sid_bytes);
        }

        let total = out.len() as u16;
        out[2..4].copy_from_slice(&total.to_le_bytes());
        Ok(out)
    }
}
