//! Recursive-descent parser. Expression parsing emits directly into a
//! postfix [`Token`] sequence: each `parse_*` level first recurses on its
//! operands (which themselves push their own tokens) and only then pushes
//! its own operator/function token, which is exactly a postfix traversal.

use ebq_schema::{AggregationFn, BuiltinFn, EbqError, Literal, Operator, Token};

use crate::ast::{ClauseMap, FromClause, Join, JoinKind, OrderItem, SelectItem, SortDirection};
use crate::keywords::Keyword;
use crate::lexer::{lex, Lexeme};

pub fn parse(input: &str) -> Result<ClauseMap, EbqError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0, source: input };
    let clause_map = parser.parse_query()?;
    parser.expect(&Lexeme::Eof)?;
    Ok(clause_map)
}

struct Parser<'a> {
    tokens: Vec<Lexeme>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Lexeme {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, reason: impl Into<String>) -> EbqError {
        EbqError::invalid_query(self.source, reason.into())
    }

    fn expect(&mut self, want: &Lexeme) -> Result<(), EbqError> {
        if self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {want:?}, found {:?}", self.peek())))
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.peek() == &Lexeme::Keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), EbqError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.err(format!("expected keyword {kw:?}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self) -> Result<String, EbqError> {
        match self.advance() {
            Lexeme::Ident(name) => Ok(name),
            other => Err(self.err(format!("expected an identifier, found {other:?}"))),
        }
    }

    fn parse_query(&mut self) -> Result<ClauseMap, EbqError> {
        self.expect_keyword(Keyword::SELECT)?;
        let select = self.parse_select_list()?;

        let mut clause_map = ClauseMap { select, ..ClauseMap::default() };

        if self.eat_keyword(Keyword::FROM) {
            clause_map.from = Some(self.parse_from()?);
        }

        if self.eat_keyword(Keyword::WHERE) {
            let mut out = Vec::new();
            self.parse_or(&mut out)?;
            clause_map.where_clause = Some(out);
        }

        if self.eat_keyword(Keyword::GROUP) {
            self.expect_keyword(Keyword::BY)?;
            loop {
                let mut out = Vec::new();
                self.parse_or(&mut out)?;
                clause_map.group_by.push(out);
                if self.peek() == &Lexeme::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }

        if self.eat_keyword(Keyword::HAVING) {
            let mut out = Vec::new();
            self.parse_or(&mut out)?;
            clause_map.having = Some(out);
        }

        if self.eat_keyword(Keyword::ORDER) {
            self.expect_keyword(Keyword::BY)?;
            loop {
                let mut out = Vec::new();
                self.parse_or(&mut out)?;
                let direction = if self.eat_keyword(Keyword::DESC) {
                    SortDirection::Desc
                } else {
                    self.eat_keyword(Keyword::ASC);
                    SortDirection::Asc
                };
                clause_map.order_by.push(OrderItem { expr: out, direction });
                if self.peek() == &Lexeme::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }

        if self.eat_keyword(Keyword::LIMIT) {
            match self.advance() {
                Lexeme::Integer(n) if n >= 0 => clause_map.limit = Some(n as u64),
                other => return Err(self.err(format!("LIMIT expects a non-negative integer, found {other:?}"))),
            }
        }

        Ok(clause_map)
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectItem>, EbqError> {
        let mut items = Vec::new();
        loop {
            let mut out = Vec::new();
            self.parse_or(&mut out)?;
            let alias = if self.eat_keyword(Keyword::AS) { Some(self.expect_ident()?) } else { None };
            items.push(SelectItem { expr: out, alias });
            if self.peek() == &Lexeme::Comma {
                self.advance();
                continue;
            }
            break;
        }
        Ok(items)
    }

    fn parse_from(&mut self) -> Result<FromClause, EbqError> {
        let table = self.expect_ident()?;
        let mut joins = Vec::new();
        loop {
            let kind = if self.eat_keyword(Keyword::JOIN) || (self.eat_keyword(Keyword::INNER) && self.expect_keyword(Keyword::JOIN).is_ok()) {
                JoinKind::Inner
            } else if self.eat_keyword(Keyword::LEFT) {
                self.expect_keyword(Keyword::JOIN)?;
                JoinKind::Left
            } else {
                break;
            };
            let join_table = self.expect_ident()?;
            self.expect_keyword(Keyword::ON)?;
            let mut on = Vec::new();
            self.parse_or(&mut on)?;
            joins.push(Join { kind, table: join_table, on });
        }
        Ok(FromClause { table, joins })
    }

    fn parse_or(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.parse_and(out)?;
        while self.eat_keyword(Keyword::OR) {
            self.parse_and(out)?;
            out.push(Token::Operator(Operator::Or));
        }
        Ok(())
    }

    fn parse_and(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.parse_not(out)?;
        while self.eat_keyword(Keyword::AND) {
            self.parse_not(out)?;
            out.push(Token::Operator(Operator::And));
        }
        Ok(())
    }

    fn parse_not(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        if self.eat_keyword(Keyword::NOT) {
            self.parse_not(out)?;
            out.push(Token::Operator(Operator::Not));
            Ok(())
        } else {
            self.parse_comparison(out)
        }
    }

    fn parse_comparison(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.parse_additive(out)?;

        loop {
            match self.peek().clone() {
                Lexeme::Eq => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::Eq));
                }
                Lexeme::NotEq => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::NotEq));
                }
                Lexeme::Lt => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::Lt));
                }
                Lexeme::LtEq => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::LtEq));
                }
                Lexeme::Gt => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::Gt));
                }
                Lexeme::GtEq => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::GtEq));
                }
                Lexeme::Keyword(Keyword::LIKE) => {
                    self.advance();
                    self.parse_additive(out)?;
                    out.push(Token::Operator(Operator::Like));
                }
                Lexeme::Keyword(Keyword::IS) => {
                    self.advance();
                    if self.eat_keyword(Keyword::NOT) {
                        self.expect_keyword(Keyword::NULL)?;
                        out.push(Token::Operator(Operator::IsNotNull));
                    } else {
                        self.expect_keyword(Keyword::NULL)?;
                        out.push(Token::Operator(Operator::IsNull));
                    }
                }
                Lexeme::Keyword(Keyword::IN) => {
                    self.advance();
                    self.parse_in_list(out)?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Desugars `x IN (a, b, c)` into `x = a OR x = b OR x = c` at parse
    /// time: the postfix token set has no variadic-arity operator, and an
    /// explicit OR chain is exactly what the rewriter needs to lower each
    /// branch independently when `x` is an encrypted field.
    fn parse_in_list(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.expect(&Lexeme::LParen)?;
        let lhs_so_far = out.clone();
        let mut branch_count = 0usize;
        loop {
            out.extend(lhs_so_far.clone());
            self.parse_additive(out)?;
            out.push(Token::Operator(Operator::Eq));
            branch_count += 1;
            if self.peek() == &Lexeme::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(&Lexeme::RParen)?;
        for _ in 1..branch_count {
            out.push(Token::Operator(Operator::Or));
        }
        Ok(())
    }

    fn parse_additive(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.parse_multiplicative(out)?;
        loop {
            match self.peek() {
                Lexeme::Plus => {
                    self.advance();
                    self.parse_multiplicative(out)?;
                    out.push(Token::Operator(Operator::Add));
                }
                Lexeme::Minus => {
                    self.advance();
                    self.parse_multiplicative(out)?;
                    out.push(Token::Operator(Operator::Sub));
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_multiplicative(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.parse_unary(out)?;
        loop {
            match self.peek() {
                Lexeme::Star => {
                    self.advance();
                    self.parse_unary(out)?;
                    out.push(Token::Operator(Operator::Mul));
                }
                Lexeme::Slash => {
                    self.advance();
                    self.parse_unary(out)?;
                    out.push(Token::Operator(Operator::Div));
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_unary(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        if self.peek() == &Lexeme::Minus {
            self.advance();
            self.parse_unary(out)?;
            out.push(Token::Literal(Literal::Integer(-1)));
            out.push(Token::Operator(Operator::Mul));
            Ok(())
        } else {
            self.parse_primary(out)
        }
    }

    fn parse_primary(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        match self.advance() {
            Lexeme::Integer(n) => {
                out.push(Token::Literal(Literal::Integer(n)));
                Ok(())
            }
            Lexeme::Float(f) => {
                out.push(Token::Literal(Literal::Float(f)));
                Ok(())
            }
            Lexeme::StringLit(s) => {
                out.push(Token::Literal(Literal::String(s)));
                Ok(())
            }
            Lexeme::Keyword(Keyword::TRUE) => {
                out.push(Token::Literal(Literal::Bool(true)));
                Ok(())
            }
            Lexeme::Keyword(Keyword::FALSE) => {
                out.push(Token::Literal(Literal::Bool(false)));
                Ok(())
            }
            Lexeme::Keyword(Keyword::NULL) => {
                out.push(Token::Literal(Literal::Null));
                Ok(())
            }
            Lexeme::LParen => {
                self.parse_or(out)?;
                self.expect(&Lexeme::RParen)?;
                Ok(())
            }
            Lexeme::Star => {
                out.push(Token::Field("*".to_string()));
                Ok(())
            }
            Lexeme::Keyword(Keyword::COUNT) => self.parse_count(out),
            Lexeme::Keyword(kw) if kw.is_aggregation_fn() => self.parse_aggregation(kw, out),
            Lexeme::Keyword(kw) if kw.is_builtin_fn() => self.parse_builtin(kw, out),
            Lexeme::Ident(first) => {
                let mut name = first;
                if self.peek() == &Lexeme::Dot {
                    self.advance();
                    name = format!("{name}.{}", self.expect_ident()?);
                }
                out.push(Token::Field(name));
                Ok(())
            }
            other => Err(self.err(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_count(&mut self, out: &mut Vec<Token>) -> Result<(), EbqError> {
        self.expect(&Lexeme::LParen)?;
        if self.peek() == &Lexeme::Star {
            self.advance();
            self.expect(&Lexeme::RParen)?;
            out.push(Token::CountStar);
            self.parse_within_record_modifier();
            return Ok(());
        }
        let distinct = self.eat_keyword(Keyword::DISTINCT);
        self.parse_or(out)?;
        self.expect(&Lexeme::RParen)?;
        let within_record = self.parse_within_record_modifier();
        out.push(Token::AggregationFn { func: AggregationFn::Count, distinct, within_record });
        Ok(())
    }

    fn parse_aggregation(&mut self, kw: Keyword, out: &mut Vec<Token>) -> Result<(), EbqError> {
        let func = match kw {
            Keyword::SUM => AggregationFn::Sum,
            Keyword::AVG => AggregationFn::Avg,
            Keyword::MIN => AggregationFn::Min,
            Keyword::MAX => AggregationFn::Max,
            Keyword::GROUP_CONCAT => AggregationFn::GroupConcat,
            Keyword::TOP => AggregationFn::Top,
            _ => unreachable!("caller filtered to aggregation keywords"),
        };
        self.expect(&Lexeme::LParen)?;
        let distinct = self.eat_keyword(Keyword::DISTINCT);
        self.parse_or(out)?;
        self.expect(&Lexeme::RParen)?;
        let within_record = self.parse_within_record_modifier();
        out.push(Token::AggregationFn { func, distinct, within_record });
        Ok(())
    }

    fn parse_within_record_modifier(&mut self) -> bool {
        if self.eat_keyword(Keyword::WITHIN) {
            let _ = self.expect_keyword(Keyword::RECORD);
            true
        } else {
            false
        }
    }

    fn parse_builtin(&mut self, kw: Keyword, out: &mut Vec<Token>) -> Result<(), EbqError> {
        let func = match kw {
            Keyword::LOWER => BuiltinFn::Lower,
            Keyword::UPPER => BuiltinFn::Upper,
            Keyword::LENGTH => BuiltinFn::Length,
            Keyword::CONCAT => BuiltinFn::Concat,
            Keyword::COALESCE => BuiltinFn::Coalesce,
            _ => unreachable!("caller filtered to builtin keywords"),
        };
        self.expect(&Lexeme::LParen)?;
        let mut arg_count = 0usize;
        if self.peek() != &Lexeme::RParen {
            loop {
                self.parse_or(out)?;
                arg_count += 1;
                if self.peek() == &Lexeme::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&Lexeme::RParen)?;
        if let Some(fixed) = func.fixed_arity() {
            if fixed != arg_count {
                return Err(self.err(format!("{} expects {fixed} argument(s), got {arg_count}", func.name())));
            }
        }
        out.push(Token::BuiltinFn { func, arg_count });
        Ok(())
    }
}
