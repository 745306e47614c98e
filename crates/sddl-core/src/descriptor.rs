//! Security-descriptor model and self-relative binary codec.
//!
//! The binary form starts with a fixed 20-byte header: revision, a reserved
//! byte, the little-endian control word, then four little-endian offsets
//! (owner, group, SACL, DACL) relative to the start of the buffer. A zero
//! offset means the field is absent; presence on decode is offset-driven,
//! the control bits are informational.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acl::{Acl, AclError};
use crate::sid::{self, SidError};

/// SECURITY_DESCRIPTOR_CONTROL word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Control(pub u16);

impl Control {
    pub const OWNER_DEFAULTED: Self = Self(0x0001);
    pub const GROUP_DEFAULTED: Self = Self(0x0002);
    pub const DACL_PRESENT: Self = Self(0x0004);
    pub const DACL_DEFAULTED: Self = Self(0x0008);
    pub const SACL_PRESENT: Self = Self(0x0010);
    pub const SACL_DEFAULTED: Self = Self(0x0020);
    pub const DACL_AUTO_INHERIT_REQ: Self = Self(0x0100);
    pub const SACL_AUTO_INHERIT_REQ: Self = Self(0x0200);
    pub const DACL_AUTO_INHERITED: Self = Self(0x0400);
    pub const SACL_AUTO_INHERITED: Self = Self(0x0800);
    pub const DACL_PROTECTED: Self = Self(0x1000);
    pub const SACL_PROTECTED: Self = Self(0x2000);
    pub const RM_CONTROL_VALID: Self = Self(0x4000);
    pub const SELF_RELATIVE: Self = Self(0x8000);

    /// Whether every bit of `flag` is set.
    #[must_use]
    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// The raw control word.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl std::ops::BitOr for Control {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Control {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A decoded security descriptor.
///
/// Owner, group and the two ACLs are each optional; when serialized to JSON
/// absent fields are omitted, matching the original tool's projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDescriptor {
    pub control: Control,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "dacl", default, skip_serializing_if = "Option::is_none")]
    pub discretionary_acl: Option<Acl>,
    #[serde(rename = "sacl", default, skip_serializing_if = "Option::is_none")]
    pub system_acl: Option<Acl>,
}

/// Errors from the security-descriptor binary codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptorError {
    /// The buffer is shorter than the fixed header.
    #[error("security descriptor too short: {len} bytes, header needs 20")]
    TooShort {
        /// The buffer length.
        len: usize,
    },

    /// The revision byte is not 1.
    #[error("unsupported security descriptor revision: {got}")]
    UnsupportedRevision {
        /// The revision byte found.
        got: u8,
    },

    /// An ACL failed to decode or encode.
    #[error(transparent)]
    Acl(#[from] AclError),

    /// The owner or group SID failed to decode or encode.
    #[error(transparent)]
    Sid(#[from] SidError),
}

fn read_u32_le(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

impl SecurityDescriptor {
    /// The only supported descriptor revision.
    pub const REVISION: u8 = 1;

    /// Decode a self-relative binary security descriptor.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DescriptorError> {
        if data.len() < 20 {
            return Err(DescriptorError::TooShort { len: data.len() });
        }
        let revision = data[0];
        if revision != Self::REVISION {
            return Err(DescriptorError::UnsupportedRevision { got: revision });
        }

        let control = Control(u16::from_le_bytes([data[2], data[3]]));
        let owner_offset = read_u32_le(data, 4) as usize;
        let group_offset = read_u32_le(data, 8) as usize;
        let sacl_offset = read_u32_le(data, 12) as usize;
        let dacl_offset = read_u32_le(data, 16) as usize;

        let mut sd = Self {
            control,
            ..Self::default()
        };
        if owner_offset > 0 {
            sd.owner = Some(sid::decode_sid(data, owner_offset)?);
        }
        if group_offset > 0 {
            sd.group = Some(sid::decode_sid(data, group_offset)?);
        }
        if sacl_offset > 0 {
            sd.system_acl = Some(Acl::decode(data, sacl_offset)?);
        }
        if dacl_offset > 0 {
            sd.discretionary_acl = Some(Acl::decode(data, dacl_offset)?);
        }
        Ok(sd)
    }

    /// Encode to the self-relative binary layout.
    ///
    /// Field bytes are appended SACL, DACL, owner, group after the header,
    /// then the control word (with [`Control::SELF_RELATIVE`] forced and the
    /// ACL-present bits derived from actual presence) and the four offsets
    /// are backpatched.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DescriptorError> {
        let mut out = Vec::new();
        out.push(Self::REVISION);
        out.push(0); // Sbz1
        out.extend_from_slice(&[0, 0]); // control, backpatched
        out.extend_from_slice(&[0u8; 16]); // offsets, backpatched

        let mut owner_offset = 0u32;
        let mut group_offset = 0u32;
        let mut sacl_offset = 0u32;
        let mut dacl_offset = 0u32;

        if let Some(sacl) = &self.system_acl {
            sacl_offset = out.len() as u32;
            out.extend_from_slice(&sacl.encode()?);
        }
        if let Some(dacl) = &self.discretionary_acl {
            dacl_offset = out.len() as u32;
            out.extend_from_slice(&dacl.encode()?);
        }
        if let Some(owner) = &self.owner {
            owner_offset = out.len() as u32;
            out.extend_from_slice(&sid::encode_sid(owner)?);
        }
        if let Some(group) = &self.group {
            group_offset = out.len() as u32;
            out.extend_from_slice(&sid::encode_sid(group)?);
        }

        let mut control = self.control | Control::SELF_RELATIVE;
        if self.discretionary_acl.is_some() {
            control |= Control::DACL_PRESENT;
        }
        if self.system_acl.is_some() {
            control |= Control::SACL_PRESENT;
        }

        out[2..4].copy_from_slice(&control.bits().to_le_bytes());
        out[4..8].copy_from_slice(&owner_offset.to_le_bytes());
        out[8..12].copy_from_slice(&group_offset.to_le_bytes());
        out[12..16].copy_from_slice(&sacl_offset.to_le_bytes());
        out[16..20].copy_from_slice(&dacl_offset.to_le_bytes());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_mask::{AccessMaskDetail, FILE_ALL_ACCESS};
    use crate::acl::{Ace, AceType};

    fn sample_descriptor() -> SecurityDescriptor {
        SecurityDescriptor {
            control: Control::DACL_PROTECTED,
            owner: Some("BA".to_owned()),
            group: Some("SY".to_owned()),
            discretionary_acl: Some(Acl {
                acl_revision: 2,
                aces: vec![
                    Ace {
                        ace_type: AceType::ACCESS_ALLOWED,
                        ace_flags: vec!["OI".to_owned(), "CI".to_owned()],
                        access_mask: AccessMaskDetail::from_mask(FILE_ALL_ACCESS),
                        sid: "CO".to_owned(),
                    },
                    Ace {
                        ace_type: AceType::ACCESS_DENIED,
                        ace_flags: vec![],
                        access_mask: AccessMaskDetail::from_mask(0x0012_00a9),
                        sid: "S-1-5-21-1-2-3-513".to_owned(),
                    },
                ],
            }),
            system_acl: None,
        }
    }

    #[test]
    fn binary_round_trip_preserves_dacl_and_absent_sacl() {
        let sd = sample_descriptor();
        let bytes = sd.to_bytes().unwrap();
        let decoded = SecurityDescriptor::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.owner.as_deref(), Some("BA"));
        assert_eq!(decoded.group.as_deref(), Some("SY"));
        assert_eq!(decoded.discretionary_acl, sd.discretionary_acl);
        assert!(decoded.system_acl.is_none());

        assert!(decoded.control.contains(Control::SELF_RELATIVE));
        assert!(decoded.control.contains(Control::DACL_PRESENT));
        assert!(decoded.control.contains(Control::DACL_PROTECTED));
        assert!(!decoded.control.contains(Control::SACL_PRESENT));
    }

    #[test]
    fn header_offsets_point_at_fields() {
        let sd = sample_descriptor();
        let bytes = sd.to_bytes().unwrap();

        let owner_offset = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let dacl_offset = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
        let sacl_offset = u32::from_le_bytes(bytes[12..16].try_into().unwrap());

        // DACL is appended right after the header, owner after the ACLs.
        assert_eq!(dacl_offset, 20);
        assert_eq!(sacl_offset, 0);
        assert_eq!(crate::sid::decode_sid(&bytes, owner_offset).unwrap(), "BA");
    }

    #[test]
    fn wrong_revision_fails() {
        let sd = sample_descriptor();
        let mut bytes = sd.to_bytes().unwrap();
        bytes[0] = 2;
        assert_eq!(
            SecurityDescriptor::from_bytes(&bytes).unwrap_err(),
            DescriptorError::UnsupportedRevision { got: 2 }
        );
    }

    #[test]
    fn short_buffer_fails() {
        assert_eq!(
            SecurityDescriptor::from_bytes(&[1, 0, 0]).unwrap_err(),
            DescriptorError::TooShort { len: 3 }
        );
    }

    #[test]
    fn empty_descriptor_encodes_header_only() {
        let sd = SecurityDescriptor::default();
        let bytes = sd.to_bytes().unwrap();
        assert_eq!(bytes.len(), 20);

        let decoded = SecurityDescriptor::from_bytes(&bytes).unwrap();
        assert!(decoded.owner.is_none());
        assert!(decoded.group.is_none());
        assert!(decoded.discretionary_acl.is_none());
        assert!(decoded.system_acl.is_none());
        assert!(decoded.control.contains(Control::SELF_RELATIVE));
    }

    #[test]
    fn bad_acl_offset_fails_with_truncation() {
        let sd = sample_descriptor();
        let mut bytes = sd.to_bytes().unwrap();
        // Point the SACL offset past the end of the buffer.
        let bogus = (bytes.len() as u32) + 1;
        bytes[12..16].copy_from_slice(&bogus.to_le_bytes());
        assert!(matches!(
            SecurityDescriptor::from_bytes(&bytes).unwrap_err(),
            DescriptorError::Acl(AclError::Truncated { .. })
        ));
    }
}
