//! Codecs for Windows NT security descriptors.
//!
//! A security descriptor (owner, group, discretionary and system ACLs) is
//! converted between three representations without a Windows runtime:
//!
//! - the compact **self-relative binary** layout
//!   ([`SecurityDescriptor::from_bytes`] / [`SecurityDescriptor::to_bytes`]),
//! - the textual **SDDL** grammar
//!   ([`SecurityDescriptor::from_sddl`] / [`SecurityDescriptor::to_sddl`]),
//! - one shared structured model ([`SecurityDescriptor`]), which also
//!   derives `serde` so decoded descriptors project directly to JSON.
//!
//! The codec only represents and transcodes descriptors; it does not
//! evaluate or enforce access control.
//!
//! # Example
//!
//! ```rust
//! use sddl_core::SecurityDescriptor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sd = SecurityDescriptor::from_sddl("O:BAG:SYD:P(A;OICI;FA;;;CO)")?;
//! assert_eq!(sd.owner.as_deref(), Some("S-1-5-32-544"));
//!
//! let bytes = sd.to_bytes()?;
//! let decoded = SecurityDescriptor::from_bytes(&bytes)?;
//! assert_eq!(decoded.to_sddl(), "O:BAG:SYD:P(A;OICI;FA;;;CO)");
//! # Ok(())
//! # }
//! ```

pub mod access_mask;
pub mod acl;
pub mod descriptor;
pub mod sddl;
pub mod sid;

pub use access_mask::{posix_mode_to_mask, AccessMaskDetail};
pub use acl::{decode_ace_flags, encode_ace_flags, Ace, AceType, Acl, AclError};
pub use descriptor::{Control, DescriptorError, SecurityDescriptor};
pub use sddl::SddlError;
pub use sid::{decode_sid, encode_sid, resolve_alias, to_alias, SidError};
