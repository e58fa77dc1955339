use super::ast::{BinOp, CmpOp, Expr, Stmt, StmtKind, Target, UnaryOp};
use super::error::ScriptError;
use super::lexer::{tokenize, Keyword, Tok, Token};

/// Nesting limit for expressions and blocks.
const MAX_DEPTH: usize = 64;

/// Parse a whole script into statements.
pub fn parse(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).program()
}

type PResult<T> = Result<T, ScriptError>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    loops: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            loops: 0,
        }
    }

    // ── token helpers ───────────────────────────────────────────────────

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_next(&self) -> &Tok {
        self.tokens
            .get(self.pos + 1)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Tok::Keyword(k) if *k == kw)
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.check_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.advance() {
            Tok::Name(name) => Ok(name),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.invalid())
            }
        }
    }

    fn invalid(&self) -> ScriptError {
        match self.peek() {
            Tok::Indent => ScriptError::indentation(self.line(), "unexpected indent"),
            Tok::Eof => ScriptError::syntax(self.line(), "unexpected EOF while parsing"),
            _ => ScriptError::syntax(self.line(), "invalid syntax"),
        }
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ScriptError::syntax(self.line(), "too many nested levels"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parse a left-associative chain. `f` calls `enter` once per operator it
    /// folds in, so the tree depth stays under the limit; the depth is
    /// restored afterwards.
    fn chain(&mut self, f: impl FnOnce(&mut Self) -> PResult<Expr>) -> PResult<Expr> {
        let depth = self.depth;
        let result = f(self);
        self.depth = depth;
        result
    }

    // ── statements ──────────────────────────────────────────────────────

    fn program(mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn statement(&mut self) -> PResult<Vec<Stmt>> {
        match self.peek() {
            Tok::Keyword(Keyword::If) => Ok(vec![self.if_stmt()?]),
            Tok::Keyword(Keyword::While) => Ok(vec![self.while_stmt()?]),
            Tok::Keyword(Keyword::For) => Ok(vec![self.for_stmt()?]),
            Tok::Indent => Err(ScriptError::indentation(self.line(), "unexpected indent")),
            _ => self.simple_line(),
        }
    }

    /// One or more `;`-separated simple statements ending in a newline.
    fn simple_line(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.simple_stmt()?];
        while self.eat_op(";") {
            if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                break;
            }
            stmts.push(self.simple_stmt()?);
        }
        match self.peek() {
            Tok::Newline => {
                self.pos += 1;
                Ok(stmts)
            }
            Tok::Eof => Ok(stmts),
            _ => Err(self.invalid()),
        }
    }

    fn simple_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Keyword(Keyword::Pass) => {
                self.pos += 1;
                StmtKind::Pass
            }
            Tok::Keyword(Keyword::Break) => {
                self.pos += 1;
                if self.loops == 0 {
                    return Err(ScriptError::syntax(line, "'break' outside loop"));
                }
                StmtKind::Break
            }
            Tok::Keyword(Keyword::Continue) => {
                self.pos += 1;
                if self.loops == 0 {
                    return Err(ScriptError::syntax(line, "'continue' not properly in loop"));
                }
                StmtKind::Continue
            }
            Tok::Keyword(Keyword::Del) => {
                self.pos += 1;
                let expr = self.expr()?;
                StmtKind::Del(self.to_target(expr, line)?)
            }
            Tok::Keyword(Keyword::Import) => {
                self.pos += 1;
                let module = self.dotted_name()?;
                self.skip_to_line_end();
                StmtKind::Import(module)
            }
            Tok::Keyword(Keyword::From) => {
                self.pos += 1;
                let module = self.dotted_name()?;
                self.skip_to_line_end();
                StmtKind::Import(module)
            }
            _ => self.expr_stmt(line)?,
        };
        Ok(Stmt { line, kind })
    }

    fn dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_name()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn skip_to_line_end(&mut self) {
        while !matches!(self.peek(), Tok::Newline | Tok::Eof) {
            self.pos += 1;
        }
    }

    fn expr_stmt(&mut self, line: usize) -> PResult<StmtKind> {
        let first = self.expr()?;

        if self.check_op("=") {
            let mut targets = Vec::new();
            let mut value = first;
            while self.eat_op("=") {
                targets.push(self.to_target(value, line)?);
                value = self.expr()?;
            }
            return Ok(StmtKind::Assign(targets, value));
        }

        let aug = match self.peek() {
            Tok::Op("+=") => Some(BinOp::Add),
            Tok::Op("-=") => Some(BinOp::Sub),
            Tok::Op("*=") => Some(BinOp::Mul),
            Tok::Op("/=") => Some(BinOp::Div),
            Tok::Op("//=") => Some(BinOp::FloorDiv),
            Tok::Op("%=") => Some(BinOp::Mod),
            Tok::Op("**=") => Some(BinOp::Pow),
            _ => None,
        };
        if let Some(op) = aug {
            self.pos += 1;
            let target = self.to_target(first, line)?;
            let value = self.expr()?;
            return Ok(StmtKind::AugAssign(target, op, value));
        }

        Ok(StmtKind::Expr(first))
    }

    fn to_target(&self, expr: Expr, line: usize) -> PResult<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Attribute(obj, attr) => Ok(Target::Attribute(*obj, attr)),
            Expr::Subscript(obj, index) => Ok(Target::Subscript(*obj, *index)),
            Expr::Call { .. } => Err(ScriptError::syntax(line, "cannot assign to function call")),
            Expr::Slice(..) => Err(ScriptError::syntax(line, "cannot assign to slice")),
            _ => Err(ScriptError::syntax(line, "cannot assign to expression")),
        }
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_op(":")?;
        if !matches!(self.peek(), Tok::Newline) {
            return self.simple_line();
        }
        self.pos += 1;
        if !matches!(self.peek(), Tok::Indent) {
            return Err(ScriptError::indentation(
                self.line(),
                "expected an indented block",
            ));
        }
        self.pos += 1;

        self.enter()?;
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                _ => body.extend(self.statement()?),
            }
        }
        self.leave();
        Ok(body)
    }

    fn loop_body(&mut self) -> PResult<Vec<Stmt>> {
        self.loops += 1;
        let body = self.block();
        self.loops -= 1;
        body
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.pos += 1;
        let mut branches = Vec::new();
        let cond = self.expr()?;
        branches.push((cond, self.block()?));

        let mut orelse = Vec::new();
        loop {
            if self.eat_kw(Keyword::Elif) {
                let cond = self.expr()?;
                branches.push((cond, self.block()?));
            } else if self.eat_kw(Keyword::Else) {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            line,
            kind: StmtKind::If { branches, orelse },
        })
    }

    fn while_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.pos += 1;
        let cond = self.expr()?;
        let body = self.loop_body()?;
        if self.check_kw(Keyword::Else) {
            return Err(ScriptError::syntax(self.line(), "'while ... else' is not supported"));
        }
        Ok(Stmt {
            line,
            kind: StmtKind::While(cond, body),
        })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.pos += 1;
        let var = self.expect_name()?;
        if !self.eat_kw(Keyword::In) {
            return Err(self.invalid());
        }
        let iter = self.expr()?;
        let body = self.loop_body()?;
        if self.check_kw(Keyword::Else) {
            return Err(ScriptError::syntax(self.line(), "'for ... else' is not supported"));
        }
        Ok(Stmt {
            line,
            kind: StmtKind::For(var, iter, body),
        })
    }

    // ── expressions ─────────────────────────────────────────────────────

    fn expr(&mut self) -> PResult<Expr> {
        self.enter()?;
        let result = self.conditional();
        self.leave();
        result
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let then = self.or_test()?;
        if !self.eat_kw(Keyword::If) {
            return Ok(then);
        }
        let cond = self.or_test()?;
        if !self.eat_kw(Keyword::Else) {
            return Err(self.invalid());
        }
        let otherwise = self.expr()?;
        Ok(Expr::IfElse {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_test(&mut self) -> PResult<Expr> {
        self.chain(|p| {
            let mut left = p.and_test()?;
            while p.eat_kw(Keyword::Or) {
                p.enter()?;
                let right = p.and_test()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn and_test(&mut self) -> PResult<Expr> {
        self.chain(|p| {
            let mut left = p.not_test()?;
            while p.eat_kw(Keyword::And) {
                p.enter()?;
                let right = p.not_test()?;
                left = Expr::And(Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn not_test(&mut self) -> PResult<Expr> {
        if self.eat_kw(Keyword::Not) {
            self.enter()?;
            let operand = self.not_test();
            self.leave();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::Op("==") => CmpOp::Eq,
                Tok::Op("!=") => CmpOp::NotEq,
                Tok::Op("<") => CmpOp::Lt,
                Tok::Op("<=") => CmpOp::LtE,
                Tok::Op(">") => CmpOp::Gt,
                Tok::Op(">=") => CmpOp::GtE,
                Tok::Keyword(Keyword::In) => CmpOp::In,
                Tok::Keyword(Keyword::Not)
                    if matches!(self.peek_next(), Tok::Keyword(Keyword::In)) =>
                {
                    self.pos += 1;
                    CmpOp::NotIn
                }
                Tok::Keyword(Keyword::Is) => {
                    if matches!(self.peek_next(), Tok::Keyword(Keyword::Not)) {
                        self.pos += 1;
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), rest))
        }
    }

    fn arith(&mut self) -> PResult<Expr> {
        self.chain(|p| {
            let mut left = p.term()?;
            loop {
                let op = match p.peek() {
                    Tok::Op("+") => BinOp::Add,
                    Tok::Op("-") => BinOp::Sub,
                    _ => break,
                };
                p.pos += 1;
                p.enter()?;
                let right = p.term()?;
                left = Expr::Binary(op, Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn term(&mut self) -> PResult<Expr> {
        self.chain(|p| {
            let mut left = p.factor()?;
            loop {
                let op = match p.peek() {
                    Tok::Op("*") => BinOp::Mul,
                    Tok::Op("/") => BinOp::Div,
                    Tok::Op("//") => BinOp::FloorDiv,
                    Tok::Op("%") => BinOp::Mod,
                    _ => break,
                };
                p.pos += 1;
                p.enter()?;
                let right = p.factor()?;
                left = Expr::Binary(op, Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn factor(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Tok::Op("-") => Some(UnaryOp::Neg),
            Tok::Op("+") => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            self.enter()?;
            let operand = self.factor();
            self.leave();
            return Ok(Expr::Unary(op, Box::new(operand?)));
        }
        self.power()
    }

    fn power(&mut self) -> PResult<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            self.enter()?;
            let exponent = self.factor();
            self.leave();
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent?)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> PResult<Expr> {
        self.chain(|p| {
            let mut expr = p.atom()?;
            loop {
                if p.eat_op("(") {
                    p.enter()?;
                    expr = p.call(expr)?;
                } else if p.eat_op("[") {
                    p.enter()?;
                    expr = p.subscript(expr)?;
                } else if p.eat_op(".") {
                    p.enter()?;
                    let attr = p.expect_name()?;
                    expr = Expr::Attribute(Box::new(expr), attr);
                } else {
                    return Ok(expr);
                }
            }
        })
    }

    fn call(&mut self, func: Expr) -> PResult<Expr> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.check_op(")") {
            let is_keyword =
                matches!(self.peek(), Tok::Name(_)) && matches!(self.peek_next(), Tok::Op("="));
            if is_keyword {
                let name = self.expect_name()?;
                self.pos += 1;
                if kwargs.iter().any(|(k, _): &(String, Expr)| *k == name) {
                    return Err(ScriptError::syntax(
                        self.line(),
                        format!("keyword argument repeated: {name}"),
                    ));
                }
                kwargs.push((name, self.expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(ScriptError::syntax(
                        self.line(),
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(self.expr()?);
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(Expr::Call {
            func: Box::new(func),
            args,
            kwargs,
        })
    }

    fn subscript(&mut self, obj: Expr) -> PResult<Expr> {
        let lower = if self.check_op(":") {
            None
        } else {
            Some(self.expr()?)
        };

        if self.eat_op(":") {
            let upper = if self.check_op("]") {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            self.expect_op("]")?;
            return Ok(Expr::Slice(Box::new(obj), lower.map(Box::new), upper));
        }

        self.expect_op("]")?;
        match lower {
            Some(index) => Ok(Expr::Subscript(Box::new(obj), Box::new(index))),
            None => Err(self.invalid()),
        }
    }

    fn atom(&mut self) -> PResult<Expr> {
        let line = self.line();
        match self.advance() {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(s) => {
                let mut s = s;
                while let Tok::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Tok::Name(name) => Ok(Expr::Name(name)),
            Tok::Keyword(Keyword::True) => Ok(Expr::Bool(true)),
            Tok::Keyword(Keyword::False) => Ok(Expr::Bool(false)),
            Tok::Keyword(Keyword::None) => Ok(Expr::None),
            Tok::Op("(") => {
                if self.check_op(")") {
                    return Err(ScriptError::syntax(line, "tuples are not supported"));
                }
                let inner = self.expr()?;
                if self.check_op(",") {
                    return Err(ScriptError::syntax(line, "tuples are not supported"));
                }
                self.expect_op(")")?;
                Ok(inner)
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                while !self.check_op("]") {
                    items.push(self.expr()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op("]")?;
                Ok(Expr::List(items))
            }
            Tok::Op("{") => {
                let mut entries = Vec::new();
                while !self.check_op("}") {
                    let key = self.expr()?;
                    if !self.eat_op(":") {
                        return Err(ScriptError::syntax(line, "set displays are not supported"));
                    }
                    let value = self.expr()?;
                    entries.push((key, value));
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op("}")?;
                Ok(Expr::Dict(entries))
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.invalid())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::error::ErrorKind;

    fn single(src: &str) -> StmtKind {
        let mut stmts = parse(src).unwrap();
        assert_eq!(stmts.len(), 1, "expected one statement in {src:?}");
        stmts.remove(0).kind
    }

    #[test]
    fn test_subscript_assignment() {
        let kind = single("attrs['x'] = attrs['y'] + 1");
        let StmtKind::Assign(targets, value) = kind else {
            panic!("not an assignment");
        };
        assert!(matches!(&targets[0], Target::Subscript(Expr::Name(n), Expr::Str(k)) if n == "attrs" && k == "x"));
        assert!(matches!(value, Expr::Binary(BinOp::Add, _, _)));
    }

    #[test]
    fn test_precedence() {
        let StmtKind::Expr(expr) = single("1 + 2 * 3") else {
            panic!()
        };
        let Expr::Binary(BinOp::Add, left, right) = expr else {
            panic!("top level must be addition")
        };
        assert_eq!(*left, Expr::Int(1));
        assert!(matches!(*right, Expr::Binary(BinOp::Mul, _, _)));
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        let StmtKind::Expr(expr) = single("-2 ** 2") else {
            panic!()
        };
        assert!(matches!(expr, Expr::Unary(UnaryOp::Neg, inner) if matches!(*inner, Expr::Binary(BinOp::Pow, _, _))));
    }

    #[test]
    fn test_chained_assignment() {
        let StmtKind::Assign(targets, _) = single("a = b = 1") else {
            panic!()
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_keyword_arguments() {
        let StmtKind::Assign(_, value) = single("sa = Button(label='OK', grid=[0, 0, 2, 1])") else {
            panic!()
        };
        let Expr::Call { args, kwargs, .. } = value else {
            panic!()
        };
        assert!(args.is_empty());
        assert_eq!(kwargs.len(), 2);
        assert_eq!(kwargs[0].0, "label");
    }

    #[test]
    fn test_if_elif_else() {
        let src = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        let StmtKind::If { branches, orelse } = single(src) else {
            panic!()
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(orelse.len(), 1);
        assert_eq!(orelse[0].line, 6);
    }

    #[test]
    fn test_nested_blocks() {
        let src = "for i in range(3):\n    if i > 0:\n        total += i\n    count += 1\n";
        let StmtKind::For(var, _, body) = single(src) else {
            panic!()
        };
        assert_eq!(var, "i");
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_one_line_block_and_semicolons() {
        let stmts = parse("if x: y = 1; z = 2\nw = 3").unwrap();
        assert_eq!(stmts.len(), 2);
        let StmtKind::If { branches, .. } = &stmts[0].kind else {
            panic!()
        };
        assert_eq!(branches[0].1.len(), 2);
    }

    #[test]
    fn test_not_in_and_is_not() {
        let StmtKind::Expr(Expr::Compare(_, ops)) = single("a not in b is not c") else {
            panic!()
        };
        assert_eq!(ops[0].0, CmpOp::NotIn);
        assert_eq!(ops[1].0, CmpOp::IsNot);
    }

    #[test]
    fn test_slice() {
        let StmtKind::Expr(expr) = single("s[1:]") else {
            panic!()
        };
        assert!(matches!(expr, Expr::Slice(_, Some(_), None)));
    }

    #[test]
    fn test_syntax_error_line() {
        let err = parse("x = 1\ny = (2 +\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);

        let err = parse("a = 1\nb = = 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unexpected_indent() {
        let err = parse("x = 1\n    y = 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndentationError);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_missing_block() {
        let err = parse("if x:\ny = 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndentationError);
    }

    #[test]
    fn test_invalid_targets() {
        assert!(parse("f() = 1").is_err());
        assert!(parse("1 = x").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let src = format!("x = {}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&src).unwrap_err();
        assert!(err.message.contains("nested"));
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let src = format!("x = {}1", "1 + ".repeat(100_000));
        let err = parse(&src).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert!(err.message.contains("nested"));

        let src = format!("x = {}1", "2 * ".repeat(100));
        assert_eq!(parse(&src).unwrap_err().kind, ErrorKind::SyntaxError);
        assert!(parse(&format!("x = {}1", "1 + ".repeat(40))).is_ok());
    }

    #[test]
    fn test_long_postfix_chain_is_rejected() {
        for tail in ["[0]", ".a", "()"] {
            let src = format!("x = y{}", tail.repeat(10_000));
            let err = parse(&src).unwrap_err();
            assert_eq!(err.kind, ErrorKind::SyntaxError, "{tail}");
        }
        assert!(parse("x = a.b[0].c(1)[2]").is_ok());
    }

    #[test]
    fn test_long_boolean_chain_is_rejected() {
        let src = format!("x = {}a", "a or ".repeat(1_000));
        assert!(parse(&src).is_err());
        let src = format!("x = {}a", "a and ".repeat(1_000));
        assert!(parse(&src).is_err());
    }

    #[test]
    fn test_break_outside_loop() {
        let err = parse("x = 1\nbreak").unwrap_err();
        assert_eq!(err.to_string(), "SyntaxError at line 2: 'break' outside loop");
        assert!(parse("while x:\n    if y:\n        break\n").is_ok());
    }

    #[test]
    fn test_import_is_parsed() {
        assert_eq!(single("import os"), StmtKind::Import("os".into()));
        assert_eq!(single("from os.path import join"), StmtKind::Import("os.path".into()));
    }
}
