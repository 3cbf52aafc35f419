//! PEST-based parser for edscript
//!
//! Produces the AST consumed by the bytecode compiler, with span information
//! for error reporting.

use pest::error::{InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::types::ast::{
    BinaryOp, Expr, ForLoopKind, FunctionDef, MemberAccess, Span, Stmt, UnaryOp, VarKind,
};

pub mod semantic_validator;

#[cfg(test)]
mod tests;

/* ===================== Script Definition ===================== */

/// A parsed source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDef {
    /// Top-level statements of the script
    pub body: Stmt,
    /// Span of the entire script
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/script.pest"]
struct ScriptParser;

/* ===================== Errors ===================== */

/// Why a source text did not produce a `ScriptDef`
///
/// `span` is missing only when the parser produced nothing at all.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Rejected by the grammar
    #[error("{message}")]
    Syntax { message: String, span: Option<Span> },

    /// Accepted by the grammar but not turned into an AST node
    #[error("{message}")]
    Malformed { message: String, span: Option<Span> },
}

impl ParseError {
    fn malformed(message: impl Into<String>, span: Option<Span>) -> Self {
        ParseError::Malformed {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::Syntax { span, .. } | ParseError::Malformed { span, .. } => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax { message, .. } | ParseError::Malformed { message, .. } => message,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let ((start_line, start_col), (end_line, end_col)) = match err.line_col {
            LineColLocation::Pos((line, col)) => ((line, col), (line, col + 1)),
            LineColLocation::Span(start, end) => (start, end),
        };
        let (start, end) = match err.location {
            InputLocation::Pos(at) => (at, at),
            InputLocation::Span(range) => range,
        };
        ParseError::Syntax {
            message: err.variant.message().to_string(),
            span: Some(Span::new(
                start,
                end,
                start_line.saturating_sub(1),
                start_col.saturating_sub(1),
                end_line.saturating_sub(1),
                end_col.saturating_sub(1),
            )),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Pair Helpers ===================== */

/// Zero-based line and column of both ends of a pair
fn pair_to_span(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    let (start_line, start_col) = span.start_pos().line_col();
    let (end_line, end_col) = span.end_pos().line_col();
    Span::new(
        span.start(),
        span.end(),
        start_line - 1,
        start_col - 1,
        end_line - 1,
        end_col - 1,
    )
}

/// Keyword tokens carry no information once the rule matched
fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_function
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_for
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_break
            | Rule::kw_continue
    )
}

/// Inner pairs with keyword tokens filtered out
fn significant<'a>(pair: Pair<'a, Rule>) -> impl Iterator<Item = Pair<'a, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn next_pair<'a>(
    inner: &mut impl Iterator<Item = Pair<'a, Rule>>,
    what: &str,
    span: Span,
) -> ParseResult<Pair<'a, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::malformed(format!("Missing {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse an edscript source string into a script definition
pub fn parse_script(source: &str) -> ParseResult<ScriptDef> {
    let mut pairs = ScriptParser::parse(Rule::program, source)?;

    let program = pairs
        .next()
        .ok_or_else(|| ParseError::malformed("Empty parse result".to_string(), None))?;
    let span = pair_to_span(&program);

    let mut statements = Vec::new();
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::statement => statements.push(build_statement(pair)?),
            Rule::EOI => {}
            other => {
                return Err(ParseError::malformed(
                    format!("Unexpected program content: {:?}", other),
                    Some(span),
                ))
            }
        }
    }

    Ok(ScriptDef {
        body: Stmt::Block {
            body: statements,
            span,
        },
        span,
    })
}

/// Parse a source string into a single expression (testing API)
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut pairs = ScriptParser::parse(Rule::expression, source)?;
    let pair = pairs
        .next()
        .ok_or_else(|| ParseError::malformed("Empty parse result".to_string(), None))?;
    build_expression(pair)
}

/* ===================== AST Builder ===================== */

fn build_block(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let statements: Result<Vec<Stmt>, ParseError> = pair
        .into_inner()
        .map(build_statement)
        .collect();

    Ok(Stmt::Block {
        body: statements?,
        span,
    })
}

fn build_params(pair: Pair<Rule>) -> (Vec<String>, Vec<Span>) {
    let mut params = Vec::new();
    let mut spans = Vec::new();
    for id in pair.into_inner() {
        params.push(id.as_str().to_string());
        spans.push(pair_to_span(&id));
    }
    (params, spans)
}

fn build_function_def(pair: Pair<Rule>) -> ParseResult<FunctionDef> {
    let span = pair_to_span(&pair);
    let mut name = None;
    let mut params = (Vec::new(), Vec::new());
    let mut body = None;

    for part in significant(pair) {
        match part.as_rule() {
            Rule::identifier => name = Some(part.as_str().to_string()),
            Rule::param_list => params = build_params(part),
            Rule::block => body = Some(build_block(part)?),
            other => {
                return Err(ParseError::malformed(
                    format!("Unexpected function content: {:?}", other),
                    Some(span),
                ))
            }
        }
    }

    let body = body.ok_or_else(|| {
        ParseError::malformed("Function is missing a body".to_string(), Some(span))
    })?;

    Ok(FunctionDef {
        name,
        params: params.0,
        param_spans: params.1,
        body: Box::new(body),
        span,
    })
}

fn build_if_stmt(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = significant(pair);

    let test = build_expression(next_pair(&mut inner, "if condition", span)?)?;
    let then_s = build_statement(next_pair(&mut inner, "if body", span)?)?;

    let else_s = if let Some(else_clause_pair) = inner.next() {
        let else_inner = next_pair(&mut significant(else_clause_pair), "else body", span)?;
        Some(Box::new(build_statement(else_inner)?))
    } else {
        None
    };

    Ok(Stmt::If {
        test,
        then_s: Box::new(then_s),
        else_s,
        span,
    })
}

fn build_while_stmt(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = significant(pair);

    let test = build_expression(next_pair(&mut inner, "while condition", span)?)?;
    let body = build_statement(next_pair(&mut inner, "while body", span)?)?;

    Ok(Stmt::While {
        test,
        body: Box::new(body),
        span,
    })
}

fn build_for_loop_stmt(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = significant(pair);

    let kind_pair = next_pair(&mut inner, "loop variable kind", span)?;
    let _var_kind = parse_var_kind(&kind_pair)?;

    let binding_pair = next_pair(&mut inner, "loop variable", span)?;
    let binding_span = pair_to_span(&binding_pair);
    let binding = binding_pair.as_str().to_string();

    let loop_kind_pair = next_pair(&mut inner, "'of' or 'in'", span)?;
    let kind = match loop_kind_pair.as_str() {
        "of" => ForLoopKind::Of,
        "in" => ForLoopKind::In,
        other => {
            return Err(ParseError::malformed(
                format!("Expected 'of' or 'in', got: {}", other),
                Some(pair_to_span(&loop_kind_pair)),
            ))
        }
    };

    let iterable = build_expression(next_pair(&mut inner, "loop iterable", span)?)?;
    let body = build_statement(next_pair(&mut inner, "loop body", span)?)?;

    Ok(Stmt::ForLoop {
        kind,
        binding,
        binding_span,
        iterable,
        body: Box::new(body),
        span,
    })
}

fn parse_var_kind(pair: &Pair<Rule>) -> ParseResult<VarKind> {
    match pair.as_str() {
        "let" => Ok(VarKind::Let),
        "const" => Ok(VarKind::Const),
        other => Err(ParseError::malformed(
            format!("Expected 'let' or 'const', got: {}", other),
            Some(pair_to_span(pair)),
        )),
    }
}

fn build_declare_stmt(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = significant(pair);

    let var_kind = parse_var_kind(&next_pair(&mut inner, "'let' or 'const'", span)?)?;
    let name = next_pair(&mut inner, "variable name", span)?
        .as_str()
        .to_string();

    let init = if let Some(expr_pair) = inner.next() {
        Some(build_expression(expr_pair)?)
    } else {
        None
    };

    if var_kind == VarKind::Const && init.is_none() {
        return Err(ParseError::malformed(
            format!("Missing initializer in const declaration '{}'", name),
            Some(span),
        ));
    }

    Ok(Stmt::Declare {
        var_kind,
        name,
        init,
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = significant(pair);

    let body = build_statement(next_pair(&mut inner, "try block", span)?)?;

    let catch_var_pair = next_pair(&mut inner, "catch variable", span)?;
    let catch_var_span = pair_to_span(&catch_var_pair);
    let catch_var = catch_var_pair.as_str().to_string();

    let catch_body = build_statement(next_pair(&mut inner, "catch block", span)?)?;

    Ok(Stmt::Try {
        body: Box::new(body),
        catch_var,
        catch_var_span,
        catch_body: Box::new(catch_body),
        span,
    })
}

fn build_assign_stmt(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);
    let mut inner = pair.into_inner();

    let var_pair = next_pair(&mut inner, "assignment target", span)?;
    let var_span = pair_to_span(&var_pair);
    let var = var_pair.as_str().to_string();

    let mut path = Vec::new();
    let mut expr_pair = None;

    for pair in inner {
        match pair.as_rule() {
            Rule::assign_path_segment => {
                let segment_span = pair_to_span(&pair);
                let segment_inner = next_pair(&mut pair.into_inner(), "path segment", span)?;
                match segment_inner.as_rule() {
                    Rule::property_name => {
                        path.push(MemberAccess::Prop {
                            property: segment_inner.as_str().to_string(),
                            span: segment_span,
                        });
                    }
                    Rule::expression => {
                        let index_expr = build_expression(segment_inner)?;
                        path.push(MemberAccess::Index {
                            expr: index_expr,
                            span: segment_span,
                        });
                    }
                    _ => {}
                }
            }
            Rule::expression => {
                expr_pair = Some(pair);
                break;
            }
            _ => {}
        }
    }

    let expr_pair = expr_pair.ok_or_else(|| {
        ParseError::malformed("Assignment is missing a value".to_string(), Some(span))
    })?;
    let value = build_expression(expr_pair)?;

    Ok(Stmt::Assign {
        var,
        var_span,
        path,
        value,
        span,
    })
}

fn build_binary_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);
    let inner_pairs: Vec<_> = pair.into_inner().collect();

    if inner_pairs.is_empty() {
        return Err(ParseError::malformed(
            "Empty binary expression".to_string(),
            Some(span),
        ));
    }

    let mut left = build_expression(inner_pairs[0].clone())?;

    let mut i = 1;
    while i < inner_pairs.len() {
        let op_rule = inner_pairs[i].as_rule();

        i += 1;
        if i >= inner_pairs.len() {
            return Err(ParseError::malformed(
                "Missing right operand after operator".to_string(),
                Some(span),
            ));
        }

        let right = build_expression(inner_pairs[i].clone())?;
        let new_span = left.span().merge(&right.span());

        let op = match op_rule {
            Rule::op_and => BinaryOp::And,
            Rule::op_or => BinaryOp::Or,
            Rule::op_nullish => BinaryOp::Nullish,
            Rule::op_eq => BinaryOp::Eq,
            Rule::op_ne => BinaryOp::Ne,
            Rule::op_lt => BinaryOp::Lt,
            Rule::op_lte => BinaryOp::Lte,
            Rule::op_gt => BinaryOp::Gt,
            Rule::op_gte => BinaryOp::Gte,
            Rule::op_add => BinaryOp::Add,
            Rule::op_sub => BinaryOp::Sub,
            Rule::op_mul => BinaryOp::Mul,
            Rule::op_div => BinaryOp::Div,
            Rule::op_mod => BinaryOp::Mod,
            _ => {
                return Err(ParseError::malformed(
                    format!(
                        "Expected operator rule at index {}, got {:?}",
                        i - 1,
                        op_rule
                    ),
                    Some(span),
                ))
            }
        };

        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };

        i += 1;
    }

    Ok(left)
}

fn build_statement(pair: Pair<Rule>) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair);

    match pair.as_rule() {
        Rule::statement => {
            let inner = next_pair(&mut pair.into_inner(), "statement", span)?;
            build_statement(inner)
        }
        Rule::return_stmt => {
            let value = match significant(pair).next() {
                Some(expr_pair) => Some(build_expression(expr_pair)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::throw_stmt => {
            let expr_pair = next_pair(&mut significant(pair), "thrown value", span)?;
            Ok(Stmt::Throw {
                value: build_expression(expr_pair)?,
                span,
            })
        }
        Rule::function_decl => {
            let def = build_function_def(pair)?;
            Ok(Stmt::Function { def, span })
        }
        Rule::if_stmt => build_if_stmt(pair),
        Rule::while_stmt => build_while_stmt(pair),
        Rule::for_loop_stmt => build_for_loop_stmt(pair),
        Rule::try_stmt => build_try_stmt(pair),
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        Rule::block => build_block(pair),
        Rule::declare_stmt => build_declare_stmt(pair),
        Rule::assign_stmt => build_assign_stmt(pair),
        Rule::expr_stmt => {
            let expr_pair = next_pair(&mut pair.into_inner(), "expression", span)?;
            let expr = build_expression(expr_pair)?;
            Ok(Stmt::Expr { expr, span })
        }
        _ => Err(ParseError::malformed(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_expression(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);

    match pair.as_rule() {
        Rule::expression | Rule::primary | Rule::literal => {
            let inner = next_pair(&mut pair.into_inner(), "expression", span)?;
            build_expression(inner)
        }
        Rule::ternary_expr => {
            let mut inner = pair.into_inner();
            let condition = build_expression(next_pair(&mut inner, "condition", span)?)?;

            if let Some(consequent_pair) = inner.next() {
                let consequent = build_expression(consequent_pair)?;
                let alternate =
                    build_expression(next_pair(&mut inner, "ternary alternate", span)?)?;
                Ok(Expr::Ternary {
                    condition: Box::new(condition),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                    span,
                })
            } else {
                Ok(condition)
            }
        }
        Rule::nullish_expr
        | Rule::logical_or_expr
        | Rule::logical_and_expr
        | Rule::equality_expr
        | Rule::comparison_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => build_binary_expr(pair),
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "operand", span)?;

            let op = match first.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                _ => return build_expression(first),
            };
            let operand = build_expression(next_pair(&mut inner, "operand", span)?)?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            })
        }
        Rule::call_expr => {
            let mut inner = pair.into_inner();
            let mut expr = build_expression(next_pair(&mut inner, "callee", span)?)?;

            for postfix_pair in inner {
                let postfix_span = pair_to_span(&postfix_pair);
                let postfix_inner = next_pair(&mut postfix_pair.into_inner(), "postfix", span)?;
                let new_span = expr.span().merge(&postfix_span);

                expr = match postfix_inner.as_rule() {
                    Rule::call_suffix => {
                        let args = match postfix_inner.into_inner().next() {
                            Some(arg_list_pair) => build_arg_list(arg_list_pair)?,
                            None => vec![],
                        };
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                            span: new_span,
                        }
                    }
                    Rule::optional_access | Rule::regular_access => {
                        let optional = postfix_inner.as_rule() == Rule::optional_access;
                        let prop_pair =
                            next_pair(&mut postfix_inner.into_inner(), "property name", span)?;
                        Expr::Member {
                            object: Box::new(expr),
                            property: prop_pair.as_str().to_string(),
                            property_span: pair_to_span(&prop_pair),
                            optional,
                            span: new_span,
                        }
                    }
                    Rule::index_access => {
                        let index_pair =
                            next_pair(&mut postfix_inner.into_inner(), "index", span)?;
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(build_expression(index_pair)?),
                            span: new_span,
                        }
                    }
                    other => {
                        return Err(ParseError::malformed(
                            format!("Unexpected postfix rule: {:?}", other),
                            Some(postfix_span),
                        ))
                    }
                };
            }

            Ok(expr)
        }
        Rule::function_expr => {
            let def = build_function_def(pair)?;
            Ok(Expr::Function { def, span })
        }
        Rule::identifier => {
            let name = pair.as_str().to_string();
            Ok(Expr::Ident { name, span })
        }
        Rule::number => {
            let num_str = pair.as_str();
            let value = num_str.parse::<f64>().map_err(|e| {
                ParseError::malformed(
                    format!("Failed to parse number '{}': {}", num_str, e),
                    Some(span),
                )
            })?;
            Ok(Expr::LitNum { v: value, span })
        }
        Rule::boolean => {
            let value = pair.as_str() == "true";
            Ok(Expr::LitBool { v: value, span })
        }
        Rule::string => Ok(Expr::LitStr {
            v: build_string(pair, span)?,
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::object_lit => build_object_literal(pair),
        Rule::array_lit => build_array_literal(pair),
        _ => Err(ParseError::malformed(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_string(pair: Pair<Rule>, span: Span) -> ParseResult<String> {
    let content = next_pair(&mut pair.into_inner(), "string content", span)?;
    unescape(content.as_str()).ok_or_else(|| {
        ParseError::malformed(
            format!("Invalid escape sequence in string '{}'", content.as_str()),
            Some(span),
        )
    })
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            _ => return None,
        }
    }
    Some(out)
}

fn build_arg_list(pair: Pair<Rule>) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(build_expression)
        .collect()
}

fn build_object_literal(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);

    let properties = match pair.into_inner().next() {
        Some(property_list_pair) => property_list_pair
            .into_inner()
            .map(build_property)
            .collect::<ParseResult<Vec<_>>>()?,
        None => vec![],
    };

    Ok(Expr::LitObj { properties, span })
}

fn build_property(pair: Pair<Rule>) -> ParseResult<(String, Span, Expr)> {
    let span = pair_to_span(&pair);
    let inner = next_pair(&mut pair.into_inner(), "property", span)?;
    let inner_span = pair_to_span(&inner);

    match inner.as_rule() {
        Rule::property_pair => {
            let mut inner_pairs = inner.into_inner();
            let key_pair = next_pair(&mut inner_pairs, "property key", inner_span)?;
            let key_span = pair_to_span(&key_pair);
            let key = match key_pair.as_rule() {
                Rule::string => build_string(key_pair, key_span)?,
                _ => key_pair.as_str().to_string(),
            };
            let value_pair = next_pair(&mut inner_pairs, "property value", inner_span)?;
            let value = build_expression(value_pair)?;
            Ok((key, key_span, value))
        }
        Rule::property_shorthand => {
            let key = inner.as_str().to_string();
            let value = Expr::Ident {
                name: key.clone(),
                span: inner_span,
            };
            Ok((key, inner_span, value))
        }
        _ => Err(ParseError::malformed(
            format!("Unexpected property rule: {:?}", inner.as_rule()),
            Some(inner_span),
        )),
    }
}

fn build_array_literal(pair: Pair<Rule>) -> ParseResult<Expr> {
    let span = pair_to_span(&pair);

    let elements = match pair.into_inner().next() {
        Some(element_list_pair) => element_list_pair
            .into_inner()
            .map(build_expression)
            .collect::<ParseResult<Vec<_>>>()?,
        None => vec![],
    };

    Ok(Expr::LitList { elements, span })
}
