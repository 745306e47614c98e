//! SDDL text codec: a forward-only cursor parser and the matching
//! serializer.
//!
//! The grammar is parsed in one pass with no backtracking:
//!
//! ```text
//! SDDL      := ("O:" SID)? ("G:" SID)? Clause*
//! Clause    := ("D:" | "S:") ControlFlags AceGroup
//! ControlFlags := ("P" | "AI")*
//! AceGroup  := "(" AceBody ")" +
//! AceBody   := Type ";" Flags ";" Mask ";" ObjGuid ";" InhObjGuid ";" Trustee
//! ```
//!
//! The two object-GUID fields are consumed positionally but not modeled;
//! the serializer always emits them empty.

use thiserror::Error;

use crate::access_mask::AccessMaskDetail;
use crate::acl::{Ace, AceType, Acl};
use crate::descriptor::{Control, SecurityDescriptor};
use crate::sid;

/// Errors from the SDDL text codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SddlError {
    /// No grammar production matches at the cursor position.
    #[error("no sddl clause matches at: {at}")]
    Grammar {
        /// Unparsed input from the failure point.
        at: String,
    },

    /// An ACL control-flag run contains something other than `P` or `AI`.
    #[error("unknown acl control flag run: {flags}")]
    UnknownControlFlag {
        /// The unrecognized remainder of the run.
        flags: String,
    },

    /// The ACE type field is not one of the supported mnemonics.
    #[error("unsupported ace type mnemonic: {token}")]
    UnknownAceType {
        /// The offending token.
        token: String,
    },

    /// A `0x`-prefixed mask field is not valid 32-bit hexadecimal.
    #[error("malformed access mask: {value}")]
    MalformedAccessMask {
        /// The offending field.
        value: String,
    },

    /// A SID token is neither `S-...` nor a well-known alias.
    #[error("invalid sid token: {token}")]
    InvalidSidToken {
        /// The offending token.
        token: String,
    },

    /// An ACE body has fewer than six semicolon-delimited fields.
    #[error("ace body has too few fields: {body}")]
    MissingAceFields {
        /// The offending body.
        body: String,
    },
}

/// Forward-only cursor over the SDDL input.
struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn read_chars(&mut self, n: usize) -> Option<&'a str> {
        let chunk = self.input.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(chunk)
    }

    /// Read a SID token: either `S-` followed greedily by digits and
    /// hyphens, or a two-letter well-known alias resolved to its canonical
    /// SID.
    fn read_sid(&mut self) -> Result<String, SddlError> {
        let head = self.read_chars(2).ok_or_else(|| SddlError::Grammar {
            at: self.remaining().to_owned(),
        })?;
        if head != "S-" {
            return sid::sid_for_alias(head)
                .map(str::to_owned)
                .ok_or_else(|| SddlError::InvalidSidToken {
                    token: head.to_owned(),
                });
        }

        let rest = self.remaining();
        let run = rest
            .find(|c: char| !c.is_ascii_digit() && c != '-')
            .unwrap_or(rest.len());
        self.pos += run;
        Ok(format!("S-{}", &rest[..run]))
    }

    /// Consume the maximal run of word characters (the clause control-flag
    /// field).
    fn read_word_run(&mut self) -> &'a str {
        let rest = self.remaining();
        let n = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += n;
        &rest[..n]
    }

    /// Read one or more non-empty parenthesized ACE bodies.
    fn read_ace_bodies(&mut self) -> Result<Vec<&'a str>, SddlError> {
        let mut bodies = Vec::new();
        while self.remaining().starts_with('(') {
            let rest = self.remaining();
            let close = rest.find(')').ok_or_else(|| SddlError::Grammar {
                at: rest.to_owned(),
            })?;
            let body = &rest[1..close];
            if body.is_empty() {
                return Err(SddlError::Grammar {
                    at: rest.to_owned(),
                });
            }
            bodies.push(body);
            self.pos += close + 1;
        }
        if bodies.is_empty() {
            return Err(SddlError::Grammar {
                at: self.remaining().to_owned(),
            });
        }
        Ok(bodies)
    }
}

/// Split the control-flag run into `P`/`AI` tokens, left to right.
fn parse_control_flags(run: &str) -> Result<Vec<&'static str>, SddlError> {
    let mut flags = Vec::new();
    let mut rest = run;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('P') {
            flags.push("P");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("AI") {
            flags.push("AI");
            rest = tail;
        } else {
            return Err(SddlError::UnknownControlFlag {
                flags: rest.to_owned(),
            });
        }
    }
    Ok(flags)
}

/// Split an ACE flag field into two-character tokens. An odd-length run
/// keeps its final character as a one-character token, so joining the
/// tokens reproduces the field exactly.
fn split_flag_tokens(field: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = field;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(2)
            .map_or(rest.len(), |(index, _)| index);
        tokens.push(rest[..cut].to_owned());
        rest = &rest[cut..];
    }
    tokens
}

/// Parse the mask field: `0x`-hex raw masks are decoded into tokens, a
/// mnemonic run is kept verbatim with its mask recomputed from the tokens.
/// A trailing odd character in a mnemonic run is dropped.
fn parse_access_mask_field(field: &str) -> Result<AccessMaskDetail, SddlError> {
    if let Some(hex) = field.strip_prefix("0x") {
        let mask =
            u32::from_str_radix(hex, 16).map_err(|_| SddlError::MalformedAccessMask {
                value: field.to_owned(),
            })?;
        return Ok(AccessMaskDetail::from_mask(mask));
    }

    let mut flags = Vec::new();
    let mut rest = field;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(2)
            .map_or(rest.len(), |(index, _)| index);
        let token = &rest[..cut];
        if token.chars().count() == 2 {
            flags.push(token.to_owned());
        }
        rest = &rest[cut..];
    }

    let mut detail = AccessMaskDetail {
        mask: 0,
        flags,
        has_unknown: false,
    };
    detail.mask = detail.to_mask();
    Ok(detail)
}

/// Parse one ACE body (the text between parentheses).
fn parse_ace(body: &str) -> Result<Ace, SddlError> {
    let parts: Vec<&str> = body.split(';').collect();
    if parts.len() < 6 {
        return Err(SddlError::MissingAceFields {
            body: body.to_owned(),
        });
    }

    let ace_type =
        AceType::from_mnemonic(parts[0]).ok_or_else(|| SddlError::UnknownAceType {
            token: parts[0].to_owned(),
        })?;
    let ace_flags = split_flag_tokens(parts[1]);
    let access_mask = parse_access_mask_field(parts[2])?;
    // parts[3] and parts[4] are object-type GUIDs; consumed, not modeled.
    let trustee = parts[5].to_owned();

    Ok(Ace {
        ace_type,
        ace_flags,
        access_mask,
        sid: trustee,
    })
}

impl SecurityDescriptor {
    /// Parse an SDDL string.
    pub fn from_sddl(input: &str) -> Result<Self, SddlError> {
        let mut sd = Self::default();
        let mut reader = Reader::new(input);

        while !reader.is_empty() {
            let clause_start = reader.remaining().to_owned();
            let Some(tag) = reader.read_chars(2) else {
                return Err(SddlError::Grammar { at: clause_start });
            };
            match tag {
                "O:" => sd.owner = Some(reader.read_sid()?),
                "G:" => sd.group = Some(reader.read_sid()?),
                "D:" | "S:" => {
                    let run = reader.read_word_run();
                    let bodies = reader
                        .read_ace_bodies()
                        .map_err(|_| SddlError::Grammar { at: clause_start })?;
                    let control_flags = parse_control_flags(run)?;

                    let mut aces = Vec::with_capacity(bodies.len());
                    for body in bodies {
                        aces.push(parse_ace(body)?);
                    }
                    let acl = Acl {
                        acl_revision: Acl::DEFAULT_REVISION,
                        aces,
                    };

                    if tag == "D:" {
                        for flag in control_flags {
                            sd.control |= match flag {
                                "P" => Control::DACL_PROTECTED,
                                _ => Control::DACL_AUTO_INHERITED,
                            };
                        }
                        sd.discretionary_acl = Some(acl);
                    } else {
                        for flag in control_flags {
                            sd.control |= match flag {
                                "P" => Control::SACL_PROTECTED,
                                _ => Control::SACL_AUTO_INHERITED,
                            };
                        }
                        sd.system_acl = Some(acl);
                    }
                }
                _ => return Err(SddlError::Grammar { at: clause_start }),
            }
        }

        Ok(sd)
    }

    /// Render to SDDL.
    ///
    /// Owner and group are emitted as their well-known alias when one
    /// exists, and only when present; an ACL clause is emitted only when
    /// the ACL exists and has at least one ACE. The object-GUID fields are
    /// always empty.
    #[must_use]
    pub fn to_sddl(&self) -> String {
        let mut out = String::new();
        if let Some(owner) = &self.owner {
            out.push_str("O:");
            out.push_str(sid::to_alias(owner));
        }
        if let Some(group) = &self.group {
            out.push_str("G:");
            out.push_str(sid::to_alias(group));
        }
        if let Some(dacl) = &self.discretionary_acl {
            if !dacl.aces.is_empty() {
                out.push_str("D:");
                if self.control.contains(Control::DACL_PROTECTED) {
                    out.push('P');
                }
                if self.control.contains(Control::DACL_AUTO_INHERITED) {
                    out.push_str("AI");
                }
                append_acl(&mut out, dacl);
            }
        }
        if let Some(sacl) = &self.system_acl {
            if !sacl.aces.is_empty() {
                out.push_str("S:");
                if self.control.contains(Control::SACL_PROTECTED) {
                    out.push('P');
                }
                if self.control.contains(Control::SACL_AUTO_INHERITED) {
                    out.push_str("AI");
                }
                append_acl(&mut out, sacl);
            }
        }
        out
    }
}

fn append_acl(out: &mut String, acl: &Acl) {
    for ace in &acl.aces {
        append_ace(out, ace);
    }
}

fn append_ace(out: &mut String, ace: &Ace) {
    out.push('(');
    out.push_str(ace.ace_type.mnemonic());
    out.push(';');
    for flag in &ace.ace_flags {
        out.push_str(flag);
    }
    out.push(';');
    if ace.access_mask.has_unknown {
        out.push_str(&format!("0x{:x}", ace.access_mask.mask));
    } else {
        for flag in &ace.access_mask.flags {
            out.push_str(flag);
        }
    }
    out.push_str(";;;");
    out.push_str(&ace.sid);
    out.push(')');
}
