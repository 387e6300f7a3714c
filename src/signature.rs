//! Type signatures as declared by the catalog.
//!
//! Signatures are parsed once from catalog text (`*models.User`,
//! `[]domain.Account`, `map[string]int`, ...) and are immutable afterwards.
//! Equality of signatures is structural; `Display` produces the canonical
//! text used both for equality checks in logs and for option patterns.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const BASIC_TYPES: &[&str] = &[
    "bool", "string", "byte", "rune", "error", "any", "uintptr",
    "int", "int8", "int16", "int32", "int64",
    "uint", "uint8", "uint16", "uint32", "uint64",
    "float32", "float64", "complex64", "complex128",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Container category of a signature. Containers are never expanded into
/// members by the field builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Container {
    None,
    Array { len: String, elem: Box<TypeSignature> },
    Slice(Box<TypeSignature>),
    Map { key: Box<TypeSignature>, value: Box<TypeSignature> },
    Channel { dir: ChanDir, elem: Box<TypeSignature> },
    /// Function value; the call signature is kept verbatim in `name`.
    Function,
    /// Interface/contract type, named or anonymous.
    Contract,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSignature {
    pub namespace: String,
    pub name: String,
    pub pointers: usize,
    pub container: Container,
}

impl TypeSignature {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::signature(text, "empty signature"));
        }
        parse_sig(text).map_err(|reason| Error::signature(text, reason))
    }

    pub fn named(namespace: &str, name: &str) -> Self {
        TypeSignature {
            namespace: namespace.to_string(),
            name: name.to_string(),
            pointers: 0,
            container: Container::None,
        }
    }

    /// Builtin scalar (`int`, `string`, ...) with no container.
    pub fn is_basic(&self) -> bool {
        self.container == Container::None
            && self.namespace.is_empty()
            && BASIC_TYPES.contains(&self.name.as_str())
    }

    /// Plain nominal type that may name a composite in the catalog.
    pub fn is_nominal(&self) -> bool {
        self.container == Container::None && !self.is_basic()
    }

    pub fn is_contract(&self) -> bool {
        self.container == Container::Contract
    }

    /// Copy of this signature re-categorized as a contract; the catalog
    /// decides this for named types, the text alone cannot.
    pub fn into_contract(mut self) -> Self {
        self.container = Container::Contract;
        self
    }

    /// Innermost element type with all container layers elided.
    pub fn base(&self) -> &TypeSignature {
        match &self.container {
            Container::Array { elem, .. } | Container::Slice(elem) | Container::Channel { elem, .. } => {
                elem.base()
            }
            Container::Map { value, .. } => value.base(),
            _ => self,
        }
    }

    /// Qualified name of the base type without pointers, e.g. `models.User`.
    pub fn qualified_name(&self) -> String {
        let base = self.base();
        if base.namespace.is_empty() {
            base.name.clone()
        } else {
            format!("{}.{}", base.namespace, base.name)
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.pointers {
            f.write_str("*")?;
        }
        match &self.container {
            Container::Array { len, elem } => write!(f, "[{len}]{elem}"),
            Container::Slice(elem) => write!(f, "[]{elem}"),
            Container::Map { key, value } => write!(f, "map[{key}]{value}"),
            Container::Channel { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            Container::None | Container::Function | Container::Contract => {
                if self.namespace.is_empty() {
                    f.write_str(&self.name)
                } else {
                    write!(f, "{}.{}", self.namespace, self.name)
                }
            }
        }
    }
}

// ------------------------------- Parsing --------------------------------- //

fn parse_sig(text: &str) -> std::result::Result<TypeSignature, String> {
    let text = text.trim();
    let stripped = text.trim_start_matches('*');
    let pointers = text.len() - stripped.len();
    let mut sig = parse_unpointed(stripped.trim())?;
    sig.pointers = pointers;
    Ok(sig)
}

fn parse_unpointed(text: &str) -> std::result::Result<TypeSignature, String> {
    if text.is_empty() {
        return Err("missing type after prefix".to_string());
    }

    if let Some(rest) = text.strip_prefix("[]") {
        return Ok(container(Container::Slice(Box::new(parse_sig(rest)?))));
    }
    if text.starts_with('[') {
        let close = closing_bracket(text, 0).ok_or("unbalanced `[` in array type")?;
        let len = text[1..close].trim().to_string();
        let elem = parse_sig(&text[close + 1..])?;
        return Ok(container(Container::Array { len, elem: Box::new(elem) }));
    }
    if let Some(rest) = text.strip_prefix("map[") {
        let open = "map".len();
        let close = closing_bracket(text, open).ok_or("unbalanced `[` in map type")?;
        let key = parse_sig(&rest[..close - open - 1])?;
        let value = parse_sig(&text[close + 1..])?;
        return Ok(container(Container::Map { key: Box::new(key), value: Box::new(value) }));
    }
    if let Some(rest) = text.strip_prefix("<-chan ") {
        return Ok(channel(ChanDir::Recv, parse_sig(rest)?));
    }
    if let Some(rest) = text.strip_prefix("chan<- ") {
        return Ok(channel(ChanDir::Send, parse_sig(rest)?));
    }
    if let Some(rest) = text.strip_prefix("chan ") {
        return Ok(channel(ChanDir::Both, parse_sig(rest)?));
    }
    if text.starts_with("func(") || text.starts_with("func ") {
        return Ok(TypeSignature {
            namespace: String::new(),
            name: text.to_string(),
            pointers: 0,
            container: Container::Function,
        });
    }
    if text.starts_with("interface{") || text.starts_with("interface {") {
        return Ok(TypeSignature {
            namespace: String::new(),
            name: text.to_string(),
            pointers: 0,
            container: Container::Contract,
        });
    }

    // nominal: `name` or `namespace.name`
    let (namespace, name) = match text.rfind('.') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => ("", text),
    };
    if !IDENT.is_match(name) {
        return Err(format!("`{name}` is not an identifier"));
    }
    if text.contains('.') && namespace.is_empty() {
        return Err("empty namespace".to_string());
    }
    Ok(TypeSignature::named(namespace, name))
}

fn container(container: Container) -> TypeSignature {
    TypeSignature {
        namespace: String::new(),
        name: String::new(),
        pointers: 0,
        container,
    }
}

fn channel(dir: ChanDir, elem: TypeSignature) -> TypeSignature {
    container(Container::Channel { dir, elem: Box::new(elem) })
}

/// Index of the `]` matching the `[` at `open`.
fn closing_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
