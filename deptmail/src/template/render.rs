//! Placeholder substitution.
//!
//! Templates may reference the recipient's name and department code with
//! either the brace syntax (`{name}`, `{department_code}`) or the legacy hash
//! syntax (`#name#`, `#department#`). Substitution is a single left-to-right
//! pass: inserted values are never rescanned, so recipient data that looks
//! like a placeholder is emitted verbatim. Everything else, including unknown
//! `{...}` tokens and CSS blocks, is copied unchanged.

use crate::recipients::RecipientRecord;

/// Recipient field a placeholder resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Name,
    GroupCode,
}

impl Placeholder {
    fn value<'a>(&self, recipient: &'a RecipientRecord) -> &'a str {
        match self {
            Placeholder::Name => &recipient.name,
            Placeholder::GroupCode => &recipient.group_code,
        }
    }
}

/// Recognized placeholder tokens.
pub const PLACEHOLDERS: [(&str, Placeholder); 4] = [
    ("{name}", Placeholder::Name),
    ("{department_code}", Placeholder::GroupCode),
    ("#name#", Placeholder::Name),
    ("#department#", Placeholder::GroupCode),
];

/// Render `template` for one recipient.
pub fn render(template: &str, recipient: &RecipientRecord) -> String {
    let mut out = String::with_capacity(template.len() + recipient.name.len());
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '#'][..]) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        match PLACEHOLDERS.iter().find(|(token, _)| tail.starts_with(token)) {
            Some((token, placeholder)) => {
                out.push_str(placeholder.value(recipient));
                rest = &tail[token.len()..];
            }
            None => {
                // '{' and '#' are single-byte
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
