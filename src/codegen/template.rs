//! Call templates: `target({df}, {output}, {input}, {some_parameter})`.
//!
//! Placeholders are `{identifier}`. `{{` and `}}` stand for literal braces; any
//! other brace is a syntax error. A call template must additionally look like a
//! call: a target, then a parenthesised argument list that mentions `{df}`.

use smallvec::SmallVec;
use thiserror::Error;

/// Placeholder bound to the frame a call consumes.
pub const FRAME: &str = "df";
pub const INPUT: &str = "input";
pub const OUTPUT: &str = "output";
pub const INPUT_VEC: &str = "input_vec";
pub const OUTPUT_VEC: &str = "output_vec";
pub const VEC_OPEN: &str = "vec_open";
pub const VEC_CLOSE: &str = "vec_close";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {0}")]
    UnclosedPlaceholder(usize),
    #[error("stray '}}' at byte {0}")]
    StrayClosingBrace(usize),
    #[error("invalid placeholder name '{0}'")]
    InvalidName(String),
    #[error("missing the '{{df}}' placeholder")]
    MissingFrame,
    #[error("no call target before the argument list")]
    MissingCallTarget,
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("text after the closing parenthesis")]
    TrailingText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: SmallVec<[Segment; 8]>,
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Template {
    /// Splits `source` into literal and placeholder segments.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = SmallVec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedPlaceholder(pos));
                    }
                    if !is_valid_name(&name) {
                        return Err(TemplateError::InvalidName(name));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::StrayClosingBrace(pos)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source: source.to_string(), segments })
    }

    /// Parses and additionally checks the call shape.
    pub fn parse_call(source: &str) -> Result<Self, TemplateError> {
        let template = Self::parse(source)?;
        template.check_call_shape()?;
        Ok(template)
    }

    fn check_call_shape(&self) -> Result<(), TemplateError> {
        if !self.references(FRAME) {
            return Err(TemplateError::MissingFrame);
        }

        // The call target is literal text ending at the first '('.
        match self.segments.first() {
            Some(Segment::Literal(head)) => match head.find('(') {
                Some(open) if !head[..open].trim().is_empty() => {}
                _ => return Err(TemplateError::MissingCallTarget),
            },
            _ => return Err(TemplateError::MissingCallTarget),
        }

        // The argument list that opens with the first '(' must end the template.
        let mut depth: i32 = 0;
        let mut closed = false;
        let mut in_string = false;
        let mut escaped = false;
        for segment in &self.segments {
            let text = match segment {
                Segment::Literal(text) => text,
                Segment::Placeholder(_) if closed => return Err(TemplateError::TrailingText),
                Segment::Placeholder(_) => continue,
            };
            for c in text.chars() {
                if in_string {
                    match c {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                if closed && !c.is_whitespace() && c != ')' {
                    return Err(TemplateError::TrailingText);
                }
                match c {
                    '"' => in_string = true,
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth < 0 {
                            return Err(TemplateError::UnbalancedParentheses);
                        }
                        closed |= depth == 0;
                    }
                    _ => {}
                }
            }
        }
        if depth != 0 || in_string {
            return Err(TemplateError::UnbalancedParentheses);
        }
        Ok(())
    }

    pub fn source(&self) -> &str { &self.source }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    /// Placeholder names in order of appearance (repeats included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn references(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Substitutes every placeholder through `bind`.
    ///
    /// Returns the name of the first placeholder `bind` cannot satisfy.
    pub fn render<F>(&self, mut bind: F) -> Result<String, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match bind(name) {
                    Some(value) => out.push_str(&value),
                    None => return Err(name.clone()),
                },
            }
        }
        Ok(out)
    }
}
