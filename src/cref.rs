//! Cross-reference (cref) tokens.
//!
//! A cref is a kind marker and a fully qualified name separated by a colon:
//!
//! - `T:Contracts.User` - a type
//! - `T:Contracts.Box`1` - an open generic with one type parameter
//! - `T:Contracts.Pair{Contracts.A,Contracts.B}` - a closed generic with inline arguments
//! - `T:Contracts.User[]` - an array of a type
//! - `F:Contracts.Examples.Sample` - a field or static member
//! - `P:Contracts.User.Name` - any other member (properties, methods, events)

use crate::error::CrefError;

/// What a cref points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrefKind {
    Type,
    Field,
    Member,
}

/// A parsed cref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrefToken {
    pub kind: CrefKind,
    /// Fully qualified name without arity, arguments or array suffix
    pub name: String,
    /// Number of type parameters of the referenced open generic
    pub arity: usize,
    /// Arguments written inline with `{...}`
    pub inline_args: Vec<CrefToken>,
    /// Number of `[]` suffixes
    pub array_rank: usize,
    /// The type parameter this token was documented as binding, if any
    pub type_param: Option<String>,
}

impl CrefToken {
    /// Parse a cref string.
    pub fn parse(cref: &str) -> Result<Self, CrefError> {
        let trimmed = cref.trim();
        let (marker, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| CrefError::MissingKind(trimmed.to_string()))?;

        let kind = match marker {
            "T" => CrefKind::Type,
            "F" => CrefKind::Field,
            "P" | "M" | "E" => CrefKind::Member,
            other => {
                return Err(CrefError::UnknownKind {
                    cref: trimmed.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        let mut token = parse_type_name(rest.trim(), trimmed)?;
        token.kind = kind;

        if kind != CrefKind::Type && (token.arity > 0 || token.array_rank > 0) {
            return Err(CrefError::Malformed {
                cref: trimmed.to_string(),
                reason: "only type crefs may carry generic arguments or array suffixes".to_string(),
            });
        }

        Ok(token)
    }

    /// Attach the type parameter this token binds.
    pub fn binding(mut self, type_param: Option<&str>) -> Self {
        self.type_param = type_param.map(str::to_string);
        self
    }

    /// Name under which the referenced type is defined in a module, e.g. `Ns.Box`1`.
    pub fn definition_name(&self) -> String {
        if self.arity == 0 {
            self.name.clone()
        } else {
            format!("{}`{}", self.name, self.arity)
        }
    }

    /// For field and member crefs: the declaring type and the member name.
    pub fn split_member(&self) -> Option<(&str, &str)> {
        self.name.rsplit_once('.')
    }
}

/// Parse `Name`, `Name`N`, `Name{A,B}` or any of those followed by `[]` suffixes.
fn parse_type_name(text: &str, cref: &str) -> Result<CrefToken, CrefError> {
    let malformed = |reason: &str| CrefError::Malformed {
        cref: cref.to_string(),
        reason: reason.to_string(),
    };

    let mut body = text;
    let mut array_rank = 0;
    while let Some(stripped) = body.strip_suffix("[]") {
        array_rank += 1;
        body = stripped.trim_end();
    }

    let (head, inline_args) = match body.find('{') {
        Some(open) => {
            let inner = body[open + 1..]
                .strip_suffix('}')
                .ok_or_else(|| malformed("unbalanced '{'"))?;
            let args = split_arguments(inner)
                .ok_or_else(|| malformed("unbalanced generic argument list"))?
                .into_iter()
                .map(|arg| parse_type_name(arg, cref))
                .collect::<Result<Vec<_>, _>>()?;
            if args.is_empty() {
                return Err(malformed("empty generic argument list"));
            }
            (&body[..open], args)
        }
        None => (body, Vec::new()),
    };

    let (name, arity) = match head.split_once('`') {
        Some((name, arity)) => {
            let arity: usize = arity
                .parse()
                .map_err(|_| malformed("generic arity is not a number"))?;
            (name, arity)
        }
        None => (head, inline_args.len()),
    };

    if !inline_args.is_empty() && inline_args.len() != arity {
        return Err(malformed("generic arity does not match the inline arguments"));
    }

    let name = name.trim();
    if name.is_empty() || name.starts_with('.') || name.ends_with('.') {
        return Err(malformed("missing type name"));
    }
    if name.chars().any(|c| c.is_whitespace() || "{}[],`".contains(c)) {
        return Err(malformed("unexpected character in name"));
    }

    Ok(CrefToken {
        kind: CrefKind::Type,
        name: name.to_string(),
        arity,
        inline_args,
        array_rank,
        type_param: None,
    })
}

/// Split a generic argument list on top-level commas.
fn split_arguments(inner: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }

    let last = inner[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    Some(parts)
}
