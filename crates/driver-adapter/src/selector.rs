//! CSS selector subset used by the in-memory driver.
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`, `[attr="v"]`, `[attr*="v"]`,
//! `[attr^="v"]`, descendant and child (`>`) combinators, and selector lists (`a, b`).
//! Anything else (pseudo-classes, sibling combinators) is rejected as invalid.

use crate::error::DriverError;

/// Read access to an element tree, enough to evaluate a selector.
pub trait ElementTree {
    type Id: Copy;

    fn tag(&self, id: Self::Id) -> &str;
    fn attr(&self, id: Self::Id, name: &str) -> Option<&str>;
    fn parent(&self, id: Self::Id) -> Option<Self::Id>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSel {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector stored right-to-left: `parts[0]` is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<(Compound, Option<Combinator>)>,
}

/// Parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    items: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self, DriverError> {
        let mut items = Vec::new();
        for piece in split_top_level(source, ',') {
            let piece = piece.trim();
            if piece.is_empty() {
                return Err(DriverError::invalid_selector(source, "empty selector in list"));
            }
            items.push(parse_complex(piece).map_err(|reason| {
                DriverError::invalid_selector(source, reason)
            })?);
        }
        if items.is_empty() {
            return Err(DriverError::invalid_selector(source, "empty selector"));
        }
        Ok(Self { items })
    }

    pub fn matches<T: ElementTree>(&self, tree: &T, id: T::Id) -> bool {
        self.items.iter().any(|complex| matches_complex(tree, id, &complex.parts))
    }
}

fn split_top_level(source: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    let mut escaped = false;
    for (idx, ch) in source.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                out.push(&source[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&source[start..]);
    out
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn parse_complex(source: &str) -> Result<Complex, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0usize;
    // Left-to-right: (combinator-before, compound)
    let mut sequence: Vec<(Option<Combinator>, Compound)> = Vec::new();
    let mut pending: Option<Combinator> = None;

    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            if !sequence.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            pos += 1;
            continue;
        }
        if ch == '>' {
            if sequence.is_empty() {
                return Err("selector cannot start with '>'".to_string());
            }
            pending = Some(Combinator::Child);
            pos += 1;
            continue;
        }
        if ch == '+' || ch == '~' {
            return Err(format!("sibling combinator '{}' is not supported", ch));
        }
        let (compound, next) = parse_compound(&chars, pos)?;
        let combinator = if sequence.is_empty() { None } else { pending.take() };
        if !sequence.is_empty() && combinator.is_none() {
            return Err("missing combinator between compounds".to_string());
        }
        sequence.push((combinator, compound));
        pending = None;
        pos = next;
    }

    if pending == Some(Combinator::Child) {
        return Err("dangling '>' combinator".to_string());
    }
    if sequence.is_empty() {
        return Err("empty selector".to_string());
    }

    // Store right-to-left: each part keeps the combinator linking it to the part on its left.
    let parts = sequence
        .into_iter()
        .rev()
        .map(|(combinator, compound)| (compound, combinator))
        .collect();
    Ok(Complex { parts })
}

fn parse_ident(chars: &[char], mut pos: usize) -> (String, usize) {
    let start = pos;
    while pos < chars.len() && is_ident_char(chars[pos]) {
        pos += 1;
    }
    (chars[start..pos].iter().collect(), pos)
}

fn parse_compound(chars: &[char], mut pos: usize) -> Result<(Compound, usize), String> {
    let mut compound = Compound::default();
    let mut consumed_any = false;

    if chars[pos] == '*' {
        pos += 1;
        consumed_any = true;
    } else if is_ident_char(chars[pos]) {
        let (tag, next) = parse_ident(chars, pos);
        compound.tag = Some(tag.to_ascii_lowercase());
        pos = next;
        consumed_any = true;
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                let (ident, next) = parse_ident(chars, pos + 1);
                if ident.is_empty() {
                    return Err("empty id selector".to_string());
                }
                compound.id = Some(ident);
                pos = next;
            }
            '.' => {
                let (ident, next) = parse_ident(chars, pos + 1);
                if ident.is_empty() {
                    return Err("empty class selector".to_string());
                }
                compound.classes.push(ident);
                pos = next;
            }
            '[' => {
                let (attr, next) = parse_attr(chars, pos + 1)?;
                compound.attrs.push(attr);
                pos = next;
            }
            ':' => return Err("pseudo-classes are not supported".to_string()),
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => break,
            c => return Err(format!("unexpected character '{}'", c)),
        }
        consumed_any = true;
    }

    if !consumed_any {
        return Err("empty compound selector".to_string());
    }
    Ok((compound, pos))
}

fn parse_attr(chars: &[char], mut pos: usize) -> Result<(AttrSel, usize), String> {
    let (name, next) = parse_ident(chars, pos);
    if name.is_empty() {
        return Err("empty attribute name".to_string());
    }
    pos = next;

    if pos < chars.len() && chars[pos] == ']' {
        return Ok((
            AttrSel {
                name,
                op: AttrOp::Exists,
            },
            pos + 1,
        ));
    }

    let op_char = match chars.get(pos) {
        Some('=') => None,
        Some(c @ ('*' | '^')) if chars.get(pos + 1) == Some(&'=') => {
            pos += 1;
            Some(*c)
        }
        _ => return Err(format!("unsupported attribute operator in [{}...]", name)),
    };
    pos += 1;

    let value = match chars.get(pos) {
        Some(q @ ('"' | '\'')) => {
            let quote = *q;
            let mut end = pos + 1;
            let mut value = String::new();
            while end < chars.len() && chars[end] != quote {
                if chars[end] == '\\' && end + 1 < chars.len() {
                    end += 1;
                }
                value.push(chars[end]);
                end += 1;
            }
            if end >= chars.len() {
                return Err("unterminated attribute value".to_string());
            }
            pos = end + 1;
            value
        }
        _ => {
            let (ident, next) = parse_ident(chars, pos);
            pos = next;
            ident
        }
    };

    if chars.get(pos) != Some(&']') {
        return Err("expected ']'".to_string());
    }

    let op = match op_char {
        None => AttrOp::Equals(value),
        Some('*') => AttrOp::Contains(value),
        Some(_) => AttrOp::Prefix(value),
    };
    Ok((AttrSel { name, op }, pos + 1))
}

fn matches_compound<T: ElementTree>(tree: &T, id: T::Id, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if !tree.tag(id).eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(expected) = &compound.id {
        if tree.attr(id, "id") != Some(expected.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let class_attr = tree.attr(id, "class").unwrap_or("");
        let has_all = compound
            .classes
            .iter()
            .all(|wanted| class_attr.split_whitespace().any(|c| c == wanted));
        if !has_all {
            return false;
        }
    }
    compound.attrs.iter().all(|sel| {
        let value = tree.attr(id, &sel.name);
        match (&sel.op, value) {
            (_, None) => false,
            (AttrOp::Exists, Some(_)) => true,
            (AttrOp::Equals(v), Some(actual)) => actual == v,
            (AttrOp::Contains(v), Some(actual)) => actual.contains(v.as_str()),
            (AttrOp::Prefix(v), Some(actual)) => actual.starts_with(v.as_str()),
        }
    })
}

fn matches_complex<T: ElementTree>(
    tree: &T,
    id: T::Id,
    parts: &[(Compound, Option<Combinator>)],
) -> bool {
    let Some(((compound, combinator), rest)) = parts.split_first() else {
        return true;
    };
    if !matches_compound(tree, id, compound) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Some(Combinator::Child) => tree
            .parent(id)
            .map(|parent| matches_complex(tree, parent, rest))
            .unwrap_or(false),
        _ => {
            let mut cursor = tree.parent(id);
            while let Some(ancestor) = cursor {
                if matches_complex(tree, ancestor, rest) {
                    return true;
                }
                cursor = tree.parent(ancestor);
            }
            false
        }
    }
}
