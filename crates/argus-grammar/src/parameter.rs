//! Compiled, immutable argument-slot schemas.
//!
//! Format strings and enumeration literals are parsed once into
//! [`Template`]s. The placeholder vocabulary is `%s` (string), `%d`
//! (integer) and `%f` (float); `%%` is a literal percent sign and any
//! other `%x` sequence is kept verbatim.

use std::fmt;

use argus_ir::types::ParameterSpec;

/// Type of a placeholder inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderType {
    Str,
    Int,
    Float,
}

impl PlaceholderType {
    fn from_token(c: char) -> Option<Self> {
        match c {
            's' => Some(PlaceholderType::Str),
            'd' => Some(PlaceholderType::Int),
            'f' => Some(PlaceholderType::Float),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Piece {
    Literal(String),
    Slot(PlaceholderType),
}

/// A literal string with zero or more typed placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some('%') => {
                    chars.next();
                    literal.push('%');
                }
                Some(t) => match PlaceholderType::from_token(t) {
                    Some(slot) => {
                        chars.next();
                        if !literal.is_empty() {
                            pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                        }
                        pieces.push(Piece::Slot(slot));
                    }
                    None => literal.push('%'),
                },
                None => literal.push('%'),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Self {
            source: source.to_string(),
            pieces,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Placeholder types in declaration order.
    pub fn slots(&self) -> impl Iterator<Item = PlaceholderType> + '_ {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Slot(t) => Some(*t),
            Piece::Literal(_) => None,
        })
    }

    pub fn has_slots(&self) -> bool {
        self.slots().next().is_some()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Primitive type or enumeration of one argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Int,
    Float,
    Str,
    Enum(Vec<Template>),
    /// Declared type name that is not part of the vocabulary.
    Unknown(String),
}

/// One argument slot's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub kind: ParamKind,
    pub format: Option<Template>,
    pub int_bounds: (Option<i64>, Option<i64>),
    pub float_bounds: (Option<f64>, Option<f64>),
    pub optional: bool,
}

impl Parameter {
    /// Build from document data. Unparsable bounds become open sides.
    pub fn from_spec(spec: &ParameterSpec) -> Self {
        let kind = match spec.param_type.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => ParamKind::Int,
            "float" | "double" => ParamKind::Float,
            "string" | "str" => ParamKind::Str,
            "enum" => ParamKind::Enum(spec.options.iter().map(|o| Template::parse(o)).collect()),
            _ => ParamKind::Unknown(spec.param_type.clone()),
        };
        let min = spec.min.as_ref();
        let max = spec.max.as_ref();

        Self {
            kind,
            format: spec.format.as_deref().map(Template::parse),
            int_bounds: (min.and_then(|b| b.as_i64()), max.and_then(|b| b.as_i64())),
            float_bounds: (min.and_then(|b| b.as_f64()), max.and_then(|b| b.as_f64())),
            optional: spec.optional,
        }
    }

    /// The complete set of tokens this parameter can produce, when that
    /// set is a finite list of literals.
    pub fn literals(&self) -> Option<Vec<String>> {
        match &self.kind {
            ParamKind::Enum(options) if options.iter().all(|t| !t.has_slots()) => {
                Some(options.iter().map(|t| t.source().to_string()).collect())
            }
            _ => None,
        }
    }

    /// Open parameters can keep producing fresh tokens.
    pub fn is_open(&self) -> bool {
        !matches!(self.kind, ParamKind::Unknown(_)) && self.literals().is_none()
    }

    /// Marker token emitted for an unknown declared type.
    pub fn unknown_marker(name: &str) -> String {
        format!("<unknown type: {name}>")
    }
}
