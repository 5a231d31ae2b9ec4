use std::fmt;
use std::str::FromStr;

use crate::error::TypeIdParseError;

/// Nesting limit for generic arguments when parsing untrusted input.
const MAX_DEPTH: usize = 32;

/// String-encodable descriptor of a type that crosses the process boundary.
///
/// Encoded as `"<assembly> <full_name>"`, followed by `[<arg1>,<arg2>,...]` when the
/// type has generic arguments and one `[]` per array rank:
///
/// ```text
/// std i32
/// std Option[std String]
/// demo demo::Pair[std i32,std String[]][]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentifier {
    pub assembly: String,
    pub full_name: String,
    pub generic_arguments: Vec<TypeIdentifier>,
    pub array_rank: u32,
}

impl TypeIdentifier {
    /// A plain, non-generic, non-array type.
    pub fn new(assembly: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            assembly: assembly.into(),
            full_name: full_name.into(),
            generic_arguments: Vec::new(),
            array_rank: 0,
        }
    }

    /// Replace the generic arguments.
    pub fn with_generic_arguments(
        mut self,
        arguments: impl IntoIterator<Item = TypeIdentifier>,
    ) -> Self {
        self.generic_arguments = arguments.into_iter().collect();
        self
    }

    /// The array type with this element type (rank + 1).
    pub fn array(mut self) -> Self {
        self.array_rank += 1;
        self
    }

    /// Whether this type takes generic arguments.
    pub fn is_generic(&self) -> bool {
        !self.generic_arguments.is_empty()
    }

    /// Parse an encoded identifier.
    pub fn parse(input: &str) -> Result<Self, TypeIdParseError> {
        input.parse()
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.assembly, self.full_name)?;
        if let Some((first, rest)) = self.generic_arguments.split_first() {
            write!(f, "[{first}")?;
            for argument in rest {
                write!(f, ",{argument}")?;
            }
            f.write_str("]")?;
        }
        for _ in 0..self.array_rank {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl FromStr for TypeIdentifier {
    type Err = TypeIdParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { input, pos: 0 };
        let parsed = parser.parse_type(0)?;
        if parser.pos != input.len() {
            return Err(parser.error("unexpected trailing characters"));
        }
        Ok(parsed)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_type(&mut self, depth: usize) -> Result<TypeIdentifier, TypeIdParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error("generic arguments nested too deeply"));
        }

        let assembly = self.take_name();
        if assembly.is_empty() {
            return Err(self.error("missing assembly name"));
        }
        if !self.eat(b' ') {
            return Err(self.error("expected a space after the assembly name"));
        }
        let full_name = self.take_name();
        if full_name.is_empty() {
            return Err(self.error("missing type name"));
        }

        let mut generic_arguments = Vec::new();
        if self.peek() == Some(b'[') && self.peek_at(1) != Some(b']') {
            self.pos += 1;
            loop {
                generic_arguments.push(self.parse_type(depth + 1)?);
                match self.bump() {
                    Some(b',') => continue,
                    Some(b']') => break,
                    _ => return Err(self.error("unterminated generic argument list")),
                }
            }
        }

        let mut array_rank = 0;
        while self.input[self.pos..].starts_with("[]") {
            self.pos += 2;
            array_rank += 1;
        }

        Ok(TypeIdentifier {
            assembly: assembly.to_string(),
            full_name: full_name.to_string(),
            generic_arguments,
            array_rank,
        })
    }

    /// Consume up to the next delimiter. Delimiters are ASCII, so the slice boundary is
    /// always a char boundary.
    fn take_name(&mut self) -> &'a str {
        let rest = &self.input[self.pos..];
        let len = rest
            .bytes()
            .position(|b| matches!(b, b' ' | b'[' | b']' | b','))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: &'static str) -> TypeIdParseError {
        TypeIdParseError {
            input: self.input.to_string(),
            reason,
        }
    }
}
