use super::error::ScriptError;

/// Reserved words of the script language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Break,
    Continue,
    Del,
    Elif,
    Else,
    False,
    For,
    From,
    If,
    Import,
    In,
    Is,
    None,
    Not,
    Or,
    Pass,
    True,
    While,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        let kw = match ident {
            "and" => Self::And,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "del" => Self::Del,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "False" => Self::False,
            "for" => Self::For,
            "from" => Self::From,
            "if" => Self::If,
            "import" => Self::Import,
            "in" => Self::In,
            "is" => Self::Is,
            "None" => Self::None,
            "not" => Self::Not,
            "or" => Self::Or,
            "pass" => Self::Pass,
            "True" => Self::True,
            "while" => Self::While,
            _ => return None,
        };
        Some(kw)
    }
}

/// Words the language reserves but does not implement.
const UNSUPPORTED: &[&str] = &[
    "def", "class", "lambda", "return", "yield", "try", "except", "finally", "raise", "with",
    "global", "nonlocal", "assert", "async", "await",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Keyword(Keyword),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const OPERATORS: &[&str] = &[
    "**=", "//=", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "+", "-",
    "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";",
];

/// Split source text into tokens, resolving indentation into
/// `Indent`/`Dedent` pairs.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, ScriptError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                let mut col = 0;
                while matches!(self.peek(), Some(' ' | '\t' | '\x0c')) {
                    col += 1;
                    self.pos += 1;
                }
                match self.peek() {
                    None => break,
                    Some('\n') => {
                        self.pos += 1;
                        self.line += 1;
                        continue;
                    }
                    Some('\r') => {
                        self.pos += 1;
                        continue;
                    }
                    Some('#') => {
                        self.skip_comment();
                        continue;
                    }
                    _ => {}
                }
                self.indent_to(col)?;
                self.at_line_start = false;
            }

            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' => {
                    if self.peek_at(1) == Some('\n') {
                        self.pos += 2;
                        self.line += 1;
                    } else if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') {
                        self.pos += 3;
                        self.line += 1;
                    } else {
                        return Err(ScriptError::syntax(
                            self.line,
                            "unexpected character after line continuation character",
                        ));
                    }
                }
                '0'..='9' => self.number()?,
                '.' if matches!(self.peek_at(1), Some('0'..='9')) => self.number()?,
                '"' | '\'' => {
                    let s = self.string(false)?;
                    self.push(Tok::Str(s));
                }
                c if c.is_alphabetic() || c == '_' => self.word()?,
                _ => self.operator()?,
            }
        }

        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.tok, Tok::Newline))
        {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(self.tokens)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn indent_to(&mut self, col: usize) -> Result<(), ScriptError> {
        let current = *self.indents.last().unwrap_or(&0);
        if col > current {
            self.indents.push(col);
            self.push(Tok::Indent);
            return Ok(());
        }
        while col < *self.indents.last().unwrap_or(&0) {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        if col != *self.indents.last().unwrap_or(&0) {
            return Err(ScriptError::indentation(
                self.line,
                "unindent does not match any outer indentation level",
            ));
        }
        Ok(())
    }

    fn word(&mut self) -> Result<(), ScriptError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let ident: String = self.chars[start..self.pos].iter().collect();

        // string prefixes
        if matches!(self.peek(), Some('"' | '\'')) {
            match ident.as_str() {
                "r" | "R" => {
                    let s = self.string(true)?;
                    self.push(Tok::Str(s));
                    return Ok(());
                }
                "f" | "F" | "rf" | "fr" | "b" | "B" => {
                    return Err(ScriptError::syntax(
                        self.line,
                        format!("string prefix '{ident}' is not supported"),
                    ));
                }
                _ => {}
            }
        }

        if let Some(kw) = Keyword::from_ident(&ident) {
            self.push(Tok::Keyword(kw));
        } else if UNSUPPORTED.contains(&ident.as_str()) {
            return Err(ScriptError::syntax(
                self.line,
                format!("'{ident}' statements are not supported"),
            ));
        } else {
            self.push(Tok::Name(ident));
        }
        Ok(())
    }

    fn number(&mut self) -> Result<(), ScriptError> {
        let line = self.line;
        let start = self.pos;

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                    self.pos += 1;
                }
                let digits: String = self.chars[digits_start..self.pos]
                    .iter()
                    .filter(|c| **c != '_')
                    .collect();
                let value = i64::from_str_radix(&digits, radix)
                    .map_err(|_| ScriptError::syntax(line, "invalid integer literal"))?;
                self.push(Tok::Int(value));
                return Ok(());
            }
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') && !self.peek_at(1).is_some_and(|c| c.is_alphabetic() || c == '_') {
            is_float = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                self.digits();
            }
        }
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(ScriptError::syntax(line, "invalid decimal literal"));
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| ScriptError::syntax(line, "invalid decimal literal"))?;
            self.push(Tok::Float(value));
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| ScriptError::syntax(line, "integer literal is too large"))?;
            self.push(Tok::Int(value));
        }
        Ok(())
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }

    fn string(&mut self, raw: bool) -> Result<String, ScriptError> {
        let start_line = self.line;
        let Some(quote) = self.peek() else {
            return Err(ScriptError::syntax(start_line, "unterminated string literal"));
        };
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                let msg = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(ScriptError::syntax(start_line, msg));
            };

            if c == quote {
                if !triple {
                    self.pos += 1;
                    return Ok(out);
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    return Ok(out);
                }
            }

            match c {
                '\n' if !triple => {
                    return Err(ScriptError::syntax(start_line, "unterminated string literal"));
                }
                '\n' => {
                    self.line += 1;
                    out.push(c);
                    self.pos += 1;
                }
                '\\' if raw => {
                    out.push(c);
                    self.pos += 1;
                    if let Some(next) = self.peek() {
                        if next == '\n' {
                            self.line += 1;
                        }
                        out.push(next);
                        self.pos += 1;
                    }
                }
                '\\' => {
                    self.pos += 1;
                    self.escape(&mut out)?;
                }
                _ => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), ScriptError> {
        let Some(c) = self.peek() else {
            return Err(ScriptError::syntax(self.line, "unterminated string literal"));
        };
        self.pos += 1;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '\n' => self.line += 1,
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, ScriptError> {
        let end = self.pos + len;
        if end > self.chars.len() {
            return Err(ScriptError::syntax(self.line, "truncated escape sequence"));
        }
        let digits: String = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| ScriptError::syntax(self.line, "invalid escape sequence"))
    }

    fn operator(&mut self) -> Result<(), ScriptError> {
        for op in OPERATORS {
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matches {
                self.pos += op.chars().count();
                match *op {
                    "(" | "[" | "{" => self.depth += 1,
                    ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                    _ => {}
                }
                self.push(Tok::Op(op));
                return Ok(());
            }
        }
        let c = self.peek().unwrap_or(' ');
        Err(ScriptError::syntax(
            self.line,
            format!("invalid character '{c}' (U+{:04X})", c as u32),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::error::ErrorKind;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            toks("x = 1"),
            vec![
                Tok::Name("x".into()),
                Tok::Op("="),
                Tok::Int(1),
                Tok::Newline,
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let t = toks("if x:\n    y = 1\nz = 2\n");
        assert!(t.contains(&Tok::Indent));
        assert!(t.contains(&Tok::Dedent));
        let indent = t.iter().position(|t| *t == Tok::Indent).unwrap();
        let dedent = t.iter().position(|t| *t == Tok::Dedent).unwrap();
        assert!(indent < dedent);
    }

    #[test]
    fn test_blank_and_comment_lines_ignored() {
        let t = toks("# header\n\nx = 1  # trailing\n\n   # indented comment\ny = 2\n");
        assert!(!t.contains(&Tok::Indent));
        assert_eq!(t.iter().filter(|t| **t == Tok::Newline).count(), 2);
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("a = 1\n\nb = 2").unwrap();
        let b = tokens
            .iter()
            .find(|t| t.tok == Tok::Name("b".into()))
            .unwrap();
        assert_eq!(b.line, 3);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(toks("1_000")[0], Tok::Int(1000));
        assert_eq!(toks("0x1f")[0], Tok::Int(31));
        assert_eq!(toks("2.5")[0], Tok::Float(2.5));
        assert_eq!(toks(".5")[0], Tok::Float(0.5));
        assert_eq!(toks("1e3")[0], Tok::Float(1000.0));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(toks(r#""a\nb""#)[0], Tok::Str("a\nb".into()));
        assert_eq!(toks(r"'it\'s'")[0], Tok::Str("it's".into()));
        assert_eq!(toks(r#"r"a\nb""#)[0], Tok::Str("a\\nb".into()));
        assert_eq!(toks(r#""\u00e9""#)[0], Tok::Str("é".into()));
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let tokens = tokenize("s = \"\"\"a\nb\"\"\"\nx = 1").unwrap();
        assert_eq!(tokens[2].tok, Tok::Str("a\nb".into()));
        let x = tokens
            .iter()
            .find(|t| t.tok == Tok::Name("x".into()))
            .unwrap();
        assert_eq!(x.line, 3);
    }

    #[test]
    fn test_brackets_join_lines() {
        let t = toks("x = [1,\n  2]\n");
        assert_eq!(t.iter().filter(|t| **t == Tok::Newline).count(), 1);
        assert!(!t.contains(&Tok::Indent));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc\ny = 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_bad_dedent() {
        let err = tokenize("if x:\n    y = 1\n  z = 2\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndentationError);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_unsupported_keyword() {
        let err = tokenize("def f():\n    pass").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("x = 1 $ 2").unwrap_err();
        assert!(err.message.contains("invalid character"));
    }
}
