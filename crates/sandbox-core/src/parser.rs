//! Recursive-descent parser over the layout-aware token stream.

use std::sync::Arc;

use crate::ast::{BinOp, CmpOp, Expr, FunctionDef, Handler, Program, Stmt, StmtKind, Target, UnaryOp};
use crate::lexer::{tokenize, LexError, Spanned, Tok, Token};

/// Deepest expression/block nesting accepted before parsing gives up.
pub const MAX_NESTING: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Line in the text handed to [`parse`].
    pub line: usize,
    pub message: String,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            line: err.line,
            message: err.message,
        }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Parse a whole unit. `module` tags every function defined in it.
pub fn parse(text: &str, module: Arc<str>) -> PResult<Program> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        module,
        nesting: 0,
        loop_depth: 0,
        function_depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at(&Tok::Eof) {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    module: Arc<str>,
    nesting: usize,
    loop_depth: usize,
    function_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|spanned| &spanned.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .map(|spanned| &spanned.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|spanned| spanned.line)
            .unwrap_or(1)
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn at_token(&self, token: &Token) -> bool {
        matches!(self.peek(), Tok::Token(t) if t == token)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at_token(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> PResult<T> {
        Err(ParseError {
            line: self.line(),
            message: message.into(),
        })
    }

    fn unexpected<T>(&self, wanted: &str) -> PResult<T> {
        self.error(format!("expected {}, found {}", wanted, self.peek()))
    }

    fn expect(&mut self, token: &Token) -> PResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            self.unexpected(&token.to_string())
        }
    }

    fn expect_layout(&mut self, tok: Tok) -> PResult<()> {
        if self.at(&tok) {
            self.pos += 1;
            Ok(())
        } else {
            self.unexpected(&tok.to_string())
        }
    }

    fn ident(&mut self) -> PResult<String> {
        match self.peek().clone() {
            Tok::Token(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => self.unexpected("a name"),
        }
    }

    fn enter(&mut self) -> PResult<()> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return self.error("too many nested expressions or blocks");
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Token(Token::Def) => self.function_def()?,
            Tok::Token(Token::If) => self.if_stmt()?,
            Tok::Token(Token::While) => self.while_stmt()?,
            Tok::Token(Token::For) => self.for_stmt()?,
            Tok::Token(Token::Try) => self.try_stmt()?,
            Tok::Indent => return self.error("unexpected indent"),
            _ => {
                let kind = self.simple_statement()?;
                self.expect_layout(Tok::Newline)?;
                kind
            }
        };
        Ok(Stmt { line, kind })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&Token::Colon)?;
        if !self.at(&Tok::Newline) {
            let line = self.line();
            let kind = self.simple_statement()?;
            self.expect_layout(Tok::Newline)?;
            return Ok(vec![Stmt { line, kind }]);
        }
        self.expect_layout(Tok::Newline)?;
        if !self.at(&Tok::Indent) {
            return self.error("expected an indented block");
        }
        self.pos += 1;
        self.enter()?;
        let mut body = Vec::new();
        while !self.at(&Tok::Dedent) && !self.at(&Tok::Eof) {
            body.push(self.statement()?);
        }
        self.leave();
        self.expect_layout(Tok::Dedent)?;
        Ok(body)
    }

    fn loop_body(&mut self) -> PResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body
    }

    fn function_def(&mut self) -> PResult<StmtKind> {
        let line = self.line();
        self.expect(&Token::Def)?;
        let name = self.ident()?;
        self.expect(&Token::LParen)?;
        let mut params: Vec<String> = Vec::new();
        while !self.at_token(&Token::RParen) {
            let param = self.ident()?;
            if params.contains(&param) {
                return self.error(format!(
                    "duplicate argument '{}' in function definition",
                    param
                ));
            }
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;

        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;
        self.loop_depth = outer_loops;

        Ok(StmtKind::FunctionDef(Arc::new(FunctionDef {
            name,
            params,
            body: body?,
            module: self.module.clone(),
            line,
        })))
    }

    fn if_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&Token::If)?;
        let mut branches = Vec::new();
        let test = self.expression()?;
        branches.push((test, self.block()?));
        let mut orelse = Vec::new();
        loop {
            if self.eat(&Token::Elif) {
                let test = self.expression()?;
                branches.push((test, self.block()?));
            } else if self.eat(&Token::Else) {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If { branches, orelse })
    }

    fn while_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&Token::While)?;
        let test = self.expression()?;
        let body = self.loop_body()?;
        Ok(StmtKind::While { test, body })
    }

    fn for_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&Token::For)?;
        let var = self.ident()?;
        self.expect(&Token::In)?;
        let iter = self.expression()?;
        let body = self.loop_body()?;
        Ok(StmtKind::For { var, iter, body })
    }

    fn try_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(&Token::Try)?;
        let body = self.block()?;
        let mut handlers: Vec<Handler> = Vec::new();
        while self.at_token(&Token::Except) {
            if handlers.last().is_some_and(|h| h.kind.is_none()) {
                return self.error("default 'except:' must be last");
            }
            let line = self.line();
            self.pos += 1;
            let (kind, binding) = if self.at_token(&Token::Colon) {
                (None, None)
            } else {
                let kind = self.expression()?;
                let binding = if self.eat(&Token::As) {
                    Some(self.ident()?)
                } else {
                    None
                };
                (Some(kind), binding)
            };
            let body = self.block()?;
            handlers.push(Handler {
                line,
                kind,
                binding,
                body,
            });
        }
        if handlers.is_empty() {
            return self.unexpected("'except'");
        }
        Ok(StmtKind::Try { body, handlers })
    }

    fn simple_statement(&mut self) -> PResult<StmtKind> {
        match self.peek() {
            Tok::Token(Token::Pass) => {
                self.pos += 1;
                Ok(StmtKind::Pass)
            }
            Tok::Token(Token::Break) => {
                if self.loop_depth == 0 {
                    return self.error("'break' outside loop");
                }
                self.pos += 1;
                Ok(StmtKind::Break)
            }
            Tok::Token(Token::Continue) => {
                if self.loop_depth == 0 {
                    return self.error("'continue' not properly in loop");
                }
                self.pos += 1;
                Ok(StmtKind::Continue)
            }
            Tok::Token(Token::Return) => {
                if self.function_depth == 0 {
                    return self.error("'return' outside function");
                }
                self.pos += 1;
                if self.at(&Tok::Newline) {
                    Ok(StmtKind::Return(None))
                } else {
                    Ok(StmtKind::Return(Some(self.expression()?)))
                }
            }
            Tok::Token(Token::Raise) => {
                self.pos += 1;
                if self.at(&Tok::Newline) {
                    Ok(StmtKind::Raise(None))
                } else {
                    Ok(StmtKind::Raise(Some(self.expression()?)))
                }
            }
            Tok::Token(Token::Assert) => {
                self.pos += 1;
                let test = self.expression()?;
                let message = if self.eat(&Token::Comma) {
                    Some(self.expression()?)
                } else {
                    None
                };
                Ok(StmtKind::Assert { test, message })
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> PResult<StmtKind> {
        let expr = self.expression()?;
        let aug = match self.peek() {
            Tok::Token(Token::PlusAssign) => Some(BinOp::Add),
            Tok::Token(Token::MinusAssign) => Some(BinOp::Sub),
            Tok::Token(Token::StarAssign) => Some(BinOp::Mul),
            Tok::Token(Token::SlashAssign) => Some(BinOp::Div),
            Tok::Token(Token::DoubleSlashAssign) => Some(BinOp::FloorDiv),
            Tok::Token(Token::PercentAssign) => Some(BinOp::Mod),
            _ => None,
        };
        if let Some(op) = aug {
            let target = self.target(expr)?;
            self.pos += 1;
            let value = self.expression()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }
        if self.at_token(&Token::Assign) {
            let target = self.target(expr)?;
            self.pos += 1;
            let value = self.expression()?;
            if self.at_token(&Token::Assign) {
                return self.error("chained assignment is not supported");
            }
            return Ok(StmtKind::Assign { target, value });
        }
        Ok(StmtKind::Expr(expr))
    }

    fn target(&self, expr: Expr) -> PResult<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index { object, index } => Ok(Target::Index {
                object: *object,
                index: *index,
            }),
            Expr::Attribute { .. } => self.error("cannot assign to attribute"),
            _ => self.error("cannot assign to expression"),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> PResult<Expr> {
        self.enter()?;
        let result = self.conditional();
        self.leave();
        result
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let body = self.or_test()?;
        if !self.eat(&Token::If) {
            return Ok(body);
        }
        let test = self.or_test()?;
        self.expect(&Token::Else)?;
        let orelse = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn or_test(&mut self) -> PResult<Expr> {
        let mut left = self.and_test()?;
        while self.eat(&Token::Or) {
            let right = self.and_test()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_test(&mut self) -> PResult<Expr> {
        let mut left = self.not_test()?;
        while self.eat(&Token::And) {
            let right = self.not_test()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_test(&mut self) -> PResult<Expr> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let operand = self.not_test();
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match (self.peek(), self.peek_at(1)) {
            (Tok::Token(Token::EqEq), _) => CmpOp::Eq,
            (Tok::Token(Token::NotEq), _) => CmpOp::NotEq,
            (Tok::Token(Token::Lt), _) => CmpOp::Lt,
            (Tok::Token(Token::LtEq), _) => CmpOp::LtEq,
            (Tok::Token(Token::Gt), _) => CmpOp::Gt,
            (Tok::Token(Token::GtEq), _) => CmpOp::GtEq,
            (Tok::Token(Token::In), _) => CmpOp::In,
            (Tok::Token(Token::Not), Tok::Token(Token::In)) => {
                self.pos += 2;
                return Some(CmpOp::NotIn);
            }
            (Tok::Token(Token::Is), Tok::Token(Token::Not)) => {
                self.pos += 2;
                return Some(CmpOp::IsNot);
            }
            (Tok::Token(Token::Is), _) => CmpOp::Is,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn arith(&mut self) -> PResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Token(Token::Plus) => BinOp::Add,
                Tok::Token(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Token(Token::Star) => BinOp::Mul,
                Tok::Token(Token::Slash) => BinOp::Div,
                Tok::Token(Token::DoubleSlash) => BinOp::FloorDiv,
                Tok::Token(Token::Percent) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn factor(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Tok::Token(Token::Minus) => UnaryOp::Neg,
            Tok::Token(Token::Plus) => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.factor();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn power(&mut self) -> PResult<Expr> {
        let base = self.postfix()?;
        if !self.eat(&Token::DoubleStar) {
            return Ok(base);
        }
        self.enter()?;
        let exponent = self.factor();
        self.leave();
        Ok(Expr::Binary {
            op: BinOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent?),
        })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat(&Token::LParen) {
                let args = self.sequence(&Token::RParen)?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat(&Token::Dot) {
                let name = self.ident()?;
                expr = Expr::Attribute {
                    object: Box::new(expr),
                    name,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: &Token) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.at_token(close) {
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn atom(&mut self) -> PResult<Expr> {
        match self.advance() {
            Tok::Token(Token::Int(value)) => Ok(Expr::Int(value)),
            Tok::Token(Token::Float(value)) => Ok(Expr::Float(value)),
            Tok::Token(Token::Str(first)) => {
                let mut text = first;
                while let Tok::Token(Token::Str(next)) = self.peek() {
                    text.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(text.into()))
            }
            Tok::Token(Token::True) => Ok(Expr::Bool(true)),
            Tok::Token(Token::False) => Ok(Expr::Bool(false)),
            Tok::Token(Token::None) => Ok(Expr::None),
            Tok::Token(Token::Ident(name)) => Ok(Expr::Name(name)),
            Tok::Token(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Tok::Token(Token::LBracket) => Ok(Expr::List(self.sequence(&Token::RBracket)?)),
            Tok::Token(Token::LBrace) => {
                let mut entries = Vec::new();
                while !self.at_token(&Token::RBrace) {
                    let key = self.expression()?;
                    self.expect(&Token::Colon)?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                Ok(Expr::Dict(entries))
            }
            other => {
                self.pos = self.pos.saturating_sub(1);
                self.error(format!("invalid syntax: unexpected {}", other))
            }
        }
    }
}
