//! Constraint expression language.
//!
//! ```text
//! expr    := iff
//! iff     := imp (("<=>" | "IFF") imp)*
//! imp     := or (("=>" | "IMPLIES" | "REQUIRES") imp | "EXCLUDES" or)?
//! or      := and (("|" | "OR") and)*
//! and     := unary (("&" | "AND") unary)*
//! unary   := ("!" | "NOT") unary | atom
//! atom    := "(" expr ")" | name+ | "\"" quoted name "\""
//! ```
//!
//! Keywords are case-insensitive. Consecutive bare words form one multi-word
//! feature name, so `Cruise Control REQUIRES Engine` resolves both sides.

use crate::error::LogicalFault;
use crate::model::{Feature, FeatureLiteral};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(Uuid),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
}

/// Binary forms that map onto relation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintShape {
    Requires { source: Uuid, target: Uuid },
    Excludes { first: Uuid, second: Uuid },
    General,
}

/// Operator spellings for textual rendering.
#[derive(Debug, Clone, Copy)]
pub struct Operators {
    pub not: &'static str,
    pub and: &'static str,
    pub or: &'static str,
    pub implies: &'static str,
    pub iff: &'static str,
}

impl Operators {
    pub const SYMBOLIC: Operators = Operators {
        not: "!",
        and: " & ",
        or: " | ",
        implies: " => ",
        iff: " <=> ",
    };
}

impl Expr {
    pub fn var(id: Uuid) -> Self {
        Self::Var(id)
    }

    pub fn not(inner: Expr) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        Self::Implies(Box::new(lhs), Box::new(rhs))
    }

    pub fn iff(lhs: Expr, rhs: Expr) -> Self {
        Self::Iff(Box::new(lhs), Box::new(rhs))
    }

    /// Feature ids mentioned anywhere in the expression.
    pub fn features(&self) -> BTreeSet<Uuid> {
        let mut out = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Var(id) => {
                    out.insert(*id);
                }
                Self::Not(inner) => stack.push(inner),
                Self::And(a, b) | Self::Or(a, b) | Self::Implies(a, b) | Self::Iff(a, b) => {
                    stack.push(a);
                    stack.push(b);
                }
            }
        }
        out
    }

    pub fn shape(&self) -> ConstraintShape {
        match self {
            Self::Implies(a, b) => match (a.as_ref(), b.as_ref()) {
                (Self::Var(source), Self::Var(target)) => ConstraintShape::Requires {
                    source: *source,
                    target: *target,
                },
                _ => ConstraintShape::General,
            },
            Self::Not(inner) => match inner.as_ref() {
                Self::And(a, b) => match (a.as_ref(), b.as_ref()) {
                    (Self::Var(first), Self::Var(second)) => ConstraintShape::Excludes {
                        first: *first,
                        second: *second,
                    },
                    _ => ConstraintShape::General,
                },
                _ => ConstraintShape::General,
            },
            _ => ConstraintShape::General,
        }
    }

    /// Evaluate under a total assignment; unknown ids read as false.
    pub fn eval(&self, assignment: &BTreeMap<Uuid, bool>) -> bool {
        match self {
            Self::Var(id) => assignment.get(id).copied().unwrap_or(false),
            Self::Not(inner) => !inner.eval(assignment),
            Self::And(a, b) => a.eval(assignment) && b.eval(assignment),
            Self::Or(a, b) => a.eval(assignment) || b.eval(assignment),
            Self::Implies(a, b) => !a.eval(assignment) || b.eval(assignment),
            Self::Iff(a, b) => a.eval(assignment) == b.eval(assignment),
        }
    }

    /// Clausal form by negation pushing and distribution.
    ///
    /// Tautological clauses are dropped and literals deduplicated, so an
    /// always-true expression yields an empty clause list.
    pub fn to_cnf(&self) -> Vec<Vec<FeatureLiteral>> {
        let mut clauses = Vec::new();
        for clause in cnf_of(self, false) {
            let set: BTreeSet<FeatureLiteral> = clause.into_iter().collect();
            let tautology = set
                .iter()
                .any(|lit| !lit.negated && set.contains(&FeatureLiteral::neg(lit.feature_id)));
            if tautology {
                continue;
            }
            let clause: Vec<FeatureLiteral> = set.into_iter().collect();
            if !clauses.contains(&clause) {
                clauses.push(clause);
            }
        }
        clauses
    }

    /// Render with explicit parentheses around every compound operand.
    pub fn render(&self, ops: &Operators, name: &dyn Fn(Uuid) -> String) -> String {
        match self {
            Self::Var(id) => name(*id),
            Self::Not(inner) => format!("{}{}", ops.not, render_operand(inner, ops, name)),
            Self::And(a, b) => binary(a, ops.and, b, ops, name),
            Self::Or(a, b) => binary(a, ops.or, b, ops, name),
            Self::Implies(a, b) => binary(a, ops.implies, b, ops, name),
            Self::Iff(a, b) => binary(a, ops.iff, b, ops, name),
        }
    }
}

fn binary(
    a: &Expr,
    op: &str,
    b: &Expr,
    ops: &Operators,
    name: &dyn Fn(Uuid) -> String,
) -> String {
    format!(
        "{}{op}{}",
        render_operand(a, ops, name),
        render_operand(b, ops, name)
    )
}

fn render_operand(expr: &Expr, ops: &Operators, name: &dyn Fn(Uuid) -> String) -> String {
    match expr {
        Expr::Var(_) | Expr::Not(_) => expr.render(ops, name),
        _ => format!("({})", expr.render(ops, name)),
    }
}

/// CNF of `expr` (or of its negation when `negate` is set).
fn cnf_of(expr: &Expr, negate: bool) -> Vec<Vec<FeatureLiteral>> {
    match (expr, negate) {
        (Expr::Var(id), false) => vec![vec![FeatureLiteral::pos(*id)]],
        (Expr::Var(id), true) => vec![vec![FeatureLiteral::neg(*id)]],
        (Expr::Not(inner), _) => cnf_of(inner, !negate),
        (Expr::And(a, b), false) => conjoin(cnf_of(a, false), cnf_of(b, false)),
        (Expr::And(a, b), true) => distribute(cnf_of(a, true), cnf_of(b, true)),
        (Expr::Or(a, b), false) => distribute(cnf_of(a, false), cnf_of(b, false)),
        (Expr::Or(a, b), true) => conjoin(cnf_of(a, true), cnf_of(b, true)),
        (Expr::Implies(a, b), false) => distribute(cnf_of(a, true), cnf_of(b, false)),
        (Expr::Implies(a, b), true) => conjoin(cnf_of(a, false), cnf_of(b, true)),
        (Expr::Iff(a, b), false) => conjoin(
            distribute(cnf_of(a, true), cnf_of(b, false)),
            distribute(cnf_of(a, false), cnf_of(b, true)),
        ),
        (Expr::Iff(a, b), true) => conjoin(
            distribute(cnf_of(a, false), cnf_of(b, false)),
            distribute(cnf_of(a, true), cnf_of(b, true)),
        ),
    }
}

fn conjoin(
    mut lhs: Vec<Vec<FeatureLiteral>>,
    rhs: Vec<Vec<FeatureLiteral>>,
) -> Vec<Vec<FeatureLiteral>> {
    lhs.extend(rhs);
    lhs
}

fn distribute(
    lhs: Vec<Vec<FeatureLiteral>>,
    rhs: Vec<Vec<FeatureLiteral>>,
) -> Vec<Vec<FeatureLiteral>> {
    let mut out = Vec::with_capacity(lhs.len() * rhs.len());
    for a in &lhs {
        for b in &rhs {
            let mut clause = a.clone();
            clause.extend(b.iter().copied());
            out.push(clause);
        }
    }
    out
}

/// Canonical form used for loose name matching.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// `name` as it must appear in expression text to resolve back to itself.
///
/// Names the lexer would split or read as keywords are double-quoted.
pub fn expression_name(name: &str) -> String {
    let plain = !name.trim().is_empty()
        && name.trim() == name
        && name.chars().all(|c| is_word_char(c) || c == ' ')
        && !name.contains("->")
        && !name.contains("  ")
        && name.split_whitespace().all(|word| keyword(word).is_none());
    if plain || name.contains('"') {
        name.to_string()
    } else {
        format!("\"{name}\"")
    }
}

/// Resolves feature names to ids for one version.
///
/// Exact names win over normalized matches. When two features share a name
/// the first in list order is used.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    exact: BTreeMap<String, Uuid>,
    normalized: BTreeMap<String, Uuid>,
}

impl NameResolver {
    pub fn new<'a, I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a Feature>,
    {
        let mut resolver = Self::default();
        for feature in features.into_iter().filter(|f| f.is_active()) {
            resolver
                .exact
                .entry(feature.name.clone())
                .or_insert(feature.id);
            resolver
                .normalized
                .entry(normalize_name(&feature.name))
                .or_insert(feature.id);
        }
        resolver
    }

    pub fn resolve(&self, name: &str) -> Option<Uuid> {
        self.exact
            .get(name)
            .or_else(|| self.normalized.get(&normalize_name(name)))
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    Not,
    And,
    Or,
    Implies,
    Excludes,
    Iff,
}

fn keyword(word: &str) -> Option<Token> {
    match word.to_ascii_uppercase().as_str() {
        "NOT" => Some(Token::Not),
        "AND" => Some(Token::And),
        "OR" => Some(Token::Or),
        "IMPLIES" | "REQUIRES" => Some(Token::Implies),
        "EXCLUDES" => Some(Token::Excludes),
        "IFF" => Some(Token::Iff),
        _ => None,
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let next2 = chars.get(i + 2).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '!' | '~' | '¬' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if next == Some('|') { 2 } else { 1 };
            }
            '=' if next == Some('>') => {
                tokens.push(Token::Implies);
                i += 2;
            }
            '-' if next == Some('>') => {
                tokens.push(Token::Implies);
                i += 2;
            }
            '<' if matches!(next, Some('=') | Some('-')) && next2 == Some('>') => {
                tokens.push(Token::Iff);
                i += 3;
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err("unterminated quoted name".to_string());
                }
                tokens.push(Token::Quoted(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    if chars[i] == '-' && chars.get(i + 1) == Some(&'>') {
                        break;
                    }
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(keyword(&word).unwrap_or(Token::Word(word)));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

struct Parser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    resolver: &'r NameResolver,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_iff(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_implies()?;
        while self.eat(&Token::Iff) {
            let rhs = self.parse_implies()?;
            lhs = Expr::iff(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_implies(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_or()?;
        if self.eat(&Token::Implies) {
            let rhs = self.parse_implies()?;
            return Ok(Expr::implies(lhs, rhs));
        }
        if self.eat(&Token::Excludes) {
            let rhs = self.parse_or()?;
            return Ok(Expr::not(Expr::and(lhs, rhs)));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_unary()?;
            lhs = Expr::and(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::not(self.parse_unary()?));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, String> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_iff()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing closing parenthesis".to_string());
                }
                Ok(inner)
            }
            Some(Token::Quoted(name)) => {
                self.pos += 1;
                self.lookup(&name)
            }
            Some(Token::Word(first)) => {
                self.pos += 1;
                let mut words = vec![first];
                while let Some(Token::Word(word)) = self.peek().cloned() {
                    self.pos += 1;
                    words.push(word);
                }
                self.lookup(&words.join(" "))
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn lookup(&self, name: &str) -> Result<Expr, String> {
        self.resolver
            .resolve(name)
            .map(Expr::Var)
            .ok_or_else(|| format!("unknown feature '{name}'"))
    }
}

/// Parse `text` against the features known to `resolver`.
pub fn parse_expression(text: &str, resolver: &NameResolver) -> Result<Expr, LogicalFault> {
    let fault = |reason: String| LogicalFault::InvalidConstraintExpression {
        expression: text.to_string(),
        reason,
    };

    let tokens = tokenize(text).map_err(fault)?;
    if tokens.is_empty() {
        return Err(fault("expression is empty".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        resolver,
    };
    let expr = parser.parse_iff().map_err(fault)?;
    if let Some(token) = parser.peek() {
        return Err(fault(format!("trailing input at {token:?}")));
    }
    Ok(expr)
}

/// Rebuild an expression from precompiled clauses.
pub fn expr_from_cnf(clauses: &[Vec<FeatureLiteral>]) -> Option<Expr> {
    let clause_expr = |clause: &Vec<FeatureLiteral>| {
        clause
            .iter()
            .map(|lit| {
                if lit.negated {
                    Expr::not(Expr::var(lit.feature_id))
                } else {
                    Expr::var(lit.feature_id)
                }
            })
            .reduce(Expr::or)
    };
    clauses.iter().filter_map(clause_expr).reduce(Expr::and)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureKind;

    fn fixture() -> (Vec<Feature>, NameResolver) {
        let v = Uuid::new_v4();
        let features = vec![
            Feature::new(v, "Engine", FeatureKind::Mandatory),
            Feature::new(v, "Cruise Control", FeatureKind::Optional),
            Feature::new(v, "GPS-Module", FeatureKind::Optional),
            Feature::new(v, "Radio", FeatureKind::Optional),
        ];
        let resolver = NameResolver::new(&features);
        (features, resolver)
    }

    #[test]
    fn requires_keyword_with_multi_word_names() {
        let (features, resolver) = fixture();
        let expr =
            parse_expression("Cruise Control REQUIRES Engine", &resolver).expect("should parse");
        assert_eq!(
            expr.shape(),
            ConstraintShape::Requires {
                source: features[1].id,
                target: features[0].id,
            }
        );
    }

    #[test]
    fn normalized_names_resolve() {
        let (features, resolver) = fixture();
        let expr = parse_expression("GPS_Module excludes Cruise_Control", &resolver)
            .expect("should parse");
        assert_eq!(
            expr.shape(),
            ConstraintShape::Excludes {
                first: features[2].id,
                second: features[1].id,
            }
        );
    }

    #[test]
    fn precedence_and_cnf() {
        let (features, resolver) = fixture();
        let expr = parse_expression("Radio | \"GPS-Module\" & !Engine => Engine", &resolver)
            .expect("should parse");
        // (Radio | (GPS & !Engine)) => Engine
        let clauses = expr.to_cnf();
        assert!(clauses.contains(&vec![
            FeatureLiteral::pos(features[0].id),
            FeatureLiteral::neg(features[3].id),
        ]) || clauses.contains(&vec![
            FeatureLiteral::neg(features[3].id),
            FeatureLiteral::pos(features[0].id),
        ]));

        let mut assignment = BTreeMap::new();
        assignment.insert(features[3].id, true);
        assert!(!expr.eval(&assignment));
        assignment.insert(features[0].id, true);
        assert!(expr.eval(&assignment));
    }

    #[test]
    fn cnf_preserves_semantics_over_all_assignments() {
        let (features, resolver) = fixture();
        let expr = parse_expression("(Engine <=> Radio) | !(GPS-Module -> Radio)", &resolver)
            .expect("should parse");
        let clauses = expr.to_cnf();
        let ids = [features[0].id, features[2].id, features[3].id];
        for bits in 0..8u8 {
            let assignment: BTreeMap<Uuid, bool> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| (*id, bits & (1 << i) != 0))
                .collect();
            let cnf_value = clauses.iter().all(|clause| {
                clause
                    .iter()
                    .any(|lit| assignment.get(&lit.feature_id).copied().unwrap_or(false) != lit.negated)
            });
            assert_eq!(cnf_value, expr.eval(&assignment), "bits={bits:03b}");
        }
    }

    #[test]
    fn rejects_unknown_names_and_garbage() {
        let (_, resolver) = fixture();
        let err = parse_expression("Engine REQUIRES Turbo", &resolver).expect_err("unknown name");
        assert!(matches!(
            err,
            LogicalFault::InvalidConstraintExpression { ref reason, .. } if reason.contains("Turbo")
        ));
        assert!(parse_expression("Engine &", &resolver).is_err());
        assert!(parse_expression("(Engine", &resolver).is_err());
        assert!(parse_expression("   ", &resolver).is_err());
        assert!(parse_expression("Engine $ Radio", &resolver).is_err());
    }

    #[test]
    fn renders_with_operator_table() {
        let (features, resolver) = fixture();
        let expr = parse_expression("Radio EXCLUDES Engine", &resolver).expect("should parse");
        let names: BTreeMap<Uuid, String> =
            features.iter().map(|f| (f.id, f.name.clone())).collect();
        let rendered = expr.render(&Operators::SYMBOLIC, &|id| names[&id].clone());
        assert_eq!(rendered, "!(Radio & Engine)");
    }

    #[test]
    fn names_that_would_not_lex_are_quoted() {
        assert_eq!(expression_name("Radio"), "Radio");
        assert_eq!(expression_name("Cruise Control"), "Cruise Control");
        assert_eq!(expression_name("Or"), "\"Or\"");
        assert_eq!(expression_name("Wi-Fi (5GHz)"), "\"Wi-Fi (5GHz)\"");
    }
}
