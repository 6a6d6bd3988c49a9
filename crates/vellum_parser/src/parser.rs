use crate::ast::{BlockStatement, Expr, ExprKind, Program, Stmt, StmtKind};
use crate::error::ParseError;
use vellum_lexer::{Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Prec {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn infix_prec(tok: &TokenKind) -> Prec {
    match tok {
        TokenKind::EqualEqual | TokenKind::BangEqual => Prec::Equals,
        TokenKind::Lt | TokenKind::Gt => Prec::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Prec::Sum,
        TokenKind::Star | TokenKind::Slash => Prec::Product,
        TokenKind::LParen => Prec::Call,
        TokenKind::LBracket => Prec::Index,
        _ => Prec::Lowest,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> &TokenKind {
        &self.cur().kind
    }

    fn peek(&self) -> &Token {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn cur_span(&self) -> Span {
        self.cur().span
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn cur_is(&self, kind: &TokenKind) -> bool {
        self.cur_kind() == kind
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn expect_peek(&mut self, kind: TokenKind, expected_label: &str) -> bool {
        if self.peek_is(&kind) {
            self.advance();
            true
        } else {
            self.errors.push(ParseError::UnexpectedToken {
                expected: expected_label.to_string(),
                found: self.peek_kind().clone(),
                span: self.peek().span,
            });
            false
        }
    }

    fn cur_prec(&self) -> Prec {
        infix_prec(self.cur_kind())
    }

    fn peek_prec(&self) -> Prec {
        infix_prec(self.peek_kind())
    }

    pub fn parse_program(&mut self) -> Program {
        let mut stmts = Vec::new();
        while !matches!(self.cur_kind(), TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            }
            self.advance();
        }
        Program { stmts }
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur_kind() {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Stmt> {
        let start_span = self.cur_span();

        let name = match self.peek_kind().clone() {
            TokenKind::Identifier(n) => {
                self.advance();
                n
            }
            other => {
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "IDENT".to_string(),
                    found: other,
                    span: self.peek().span,
                });
                return None;
            }
        };

        if !self.expect_peek(TokenKind::Assign, "=") {
            return None;
        }
        self.advance(); // consume '='

        let value = self.parse_expression(Prec::Lowest)?;

        if self.peek_is(&TokenKind::Semicolon) {
            self.advance();
        }

        Some(Stmt::new(StmtKind::Let { name, value }, start_span))
    }

    fn parse_return_statement(&mut self) -> Option<Stmt> {
        let start_span = self.cur_span();
        self.advance(); // consume 'return'
        let value = self.parse_expression(Prec::Lowest)?;
        if self.peek_is(&TokenKind::Semicolon) {
            self.advance();
        }
        Some(Stmt::new(StmtKind::Return(value), start_span))
    }

    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let start_span = self.cur_span();
        let expr = self.parse_expression(Prec::Lowest)?;
        if self.peek_is(&TokenKind::Semicolon) {
            self.advance();
        }
        Some(Stmt::new(StmtKind::Expr(expr), start_span))
    }

    fn parse_expression(&mut self, min_prec: Prec) -> Option<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(&TokenKind::Semicolon) && min_prec < self.peek_prec() {
            self.advance();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        let span = self.cur_span();
        match self.cur_kind().clone() {
            TokenKind::IntLiteral(v) => Some(Expr::new(ExprKind::Int(v), span)),
            TokenKind::StringLiteral(s) => Some(Expr::new(ExprKind::Str(s), span)),
            TokenKind::BoolLiteral(b) => Some(Expr::new(ExprKind::Bool(b), span)),
            TokenKind::Identifier(name) => Some(Expr::new(ExprKind::Ident(name), span)),
            TokenKind::Bang | TokenKind::Minus => {
                let operator = if matches!(self.cur_kind(), TokenKind::Bang) { "!" } else { "-" }.to_string();
                self.advance();
                let operand = self.parse_expression(Prec::Prefix)?;
                Some(Expr::new(
                    ExprKind::Prefix { operator, operand: Box::new(operand) },
                    span,
                ))
            }
            TokenKind::LParen => self.parse_grouped_expression(),
            TokenKind::LBracket => self.parse_array_literal(span),
            TokenKind::LBrace => self.parse_hash_literal(span),
            TokenKind::If => self.parse_if_expression(span),
            TokenKind::Fn => self.parse_function_literal(span),
            other => {
                self.errors.push(ParseError::NoPrefixParse { found: other, span });
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        let span = self.cur_span();
        match self.cur_kind().clone() {
            TokenKind::LParen => self.parse_call_expression(left, span),
            TokenKind::LBracket => self.parse_index_expression(left, span),
            kind => {
                let operator = token_to_operator(&kind);
                let prec = self.cur_prec();
                self.advance();
                let right = self.parse_expression(prec)?;
                Some(Expr::new(
                    ExprKind::Infix { operator, left: Box::new(left), right: Box::new(right) },
                    span,
                ))
            }
        }
    }

    fn parse_grouped_expression(&mut self) -> Option<Expr> {
        self.advance(); // consume '('
        let expr = self.parse_expression(Prec::Lowest)?;
        if !self.expect_peek(TokenKind::RParen, ")") {
            return None;
        }
        Some(expr)
    }

    fn parse_array_literal(&mut self, span: Span) -> Option<Expr> {
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        Some(Expr::new(ExprKind::Array(elements), span))
    }

    fn parse_hash_literal(&mut self, span: Span) -> Option<Expr> {
        let mut pairs = Vec::new();
        while !self.peek_is(&TokenKind::RBrace) {
            self.advance();
            let key = self.parse_expression(Prec::Lowest)?;
            if !self.expect_peek(TokenKind::Colon, ":") {
                return None;
            }
            self.advance();
            let value = self.parse_expression(Prec::Lowest)?;
            pairs.push((key, value));
            if !self.peek_is(&TokenKind::RBrace) && !self.expect_peek(TokenKind::Comma, ",") {
                return None;
            }
        }
        if !self.expect_peek(TokenKind::RBrace, "}") {
            return None;
        }
        Some(Expr::new(ExprKind::Hash(pairs), span))
    }

    fn parse_index_expression(&mut self, object: Expr, span: Span) -> Option<Expr> {
        self.advance(); // consume '['
        let index = self.parse_expression(Prec::Lowest)?;
        if !self.expect_peek(TokenKind::RBracket, "]") {
            return None;
        }
        Some(Expr::new(
            ExprKind::Index { object: Box::new(object), index: Box::new(index) },
            span,
        ))
    }

    fn parse_call_expression(&mut self, function: Expr, span: Span) -> Option<Expr> {
        let arguments = self.parse_expression_list(TokenKind::RParen)?;
        Some(Expr::new(
            ExprKind::Call { function: Box::new(function), arguments },
            span,
        ))
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek_is(&end) {
            self.advance();
            return Some(items);
        }
        self.advance();
        items.push(self.parse_expression(Prec::Lowest)?);
        while self.peek_is(&TokenKind::Comma) {
            self.advance();
            self.advance();
            items.push(self.parse_expression(Prec::Lowest)?);
        }
        if !self.expect_peek(end, ")") {
            return None;
        }
        Some(items)
    }

    fn parse_if_expression(&mut self, span: Span) -> Option<Expr> {
        if !self.expect_peek(TokenKind::LParen, "(") {
            return None;
        }
        self.advance(); // consume '('
        let condition = self.parse_expression(Prec::Lowest)?;
        if !self.expect_peek(TokenKind::RParen, ")") {
            return None;
        }
        if !self.expect_peek(TokenKind::LBrace, "{") {
            return None;
        }
        let consequence = self.parse_block_statement();

        let alternative = if self.peek_is(&TokenKind::Else) {
            self.advance();
            if !self.expect_peek(TokenKind::LBrace, "{") {
                return None;
            }
            Some(self.parse_block_statement())
        } else {
            None
        };

        Some(Expr::new(
            ExprKind::If { condition: Box::new(condition), consequence, alternative },
            span,
        ))
    }

    fn parse_function_literal(&mut self, span: Span) -> Option<Expr> {
        if !self.expect_peek(TokenKind::LParen, "(") {
            return None;
        }
        let parameters = self.parse_function_parameters()?;
        if !self.expect_peek(TokenKind::LBrace, "{") {
            return None;
        }
        let body = self.parse_block_statement();
        Some(Expr::new(ExprKind::FunctionLiteral { parameters, body }, span))
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        let mut params = Vec::new();
        if self.peek_is(&TokenKind::RParen) {
            self.advance();
            return Some(params);
        }
        self.advance();
        match self.cur_kind().clone() {
            TokenKind::Identifier(name) => params.push(name),
            other => {
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "IDENT".to_string(),
                    found: other,
                    span: self.cur_span(),
                });
                return None;
            }
        }
        while self.peek_is(&TokenKind::Comma) {
            self.advance();
            self.advance();
            match self.cur_kind().clone() {
                TokenKind::Identifier(name) => params.push(name),
                other => {
                    self.errors.push(ParseError::UnexpectedToken {
                        expected: "IDENT".to_string(),
                        found: other,
                        span: self.cur_span(),
                    });
                    return None;
                }
            }
        }
        if !self.expect_peek(TokenKind::RParen, ")") {
            return None;
        }
        Some(params)
    }

    fn parse_block_statement(&mut self) -> BlockStatement {
        let mut stmts = Vec::new();
        self.advance(); // consume '{'
        while !self.cur_is(&TokenKind::RBrace) && !self.cur_is(&TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            }
            self.advance();
        }
        BlockStatement { stmts }
    }
}

fn token_to_operator(tok: &TokenKind) -> String {
    match tok {
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Lt => "<",
        TokenKind::Gt => ">",
        TokenKind::EqualEqual => "==",
        TokenKind::BangEqual => "!=",
        _ => "?",
    }
    .to_string()
}
