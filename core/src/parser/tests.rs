use super::*;

fn body(source: &str) -> Vec<Stmt> {
    let script = parse_script(source).expect("Parse should succeed");
    match script.body {
        Stmt::Block { body, .. } => body,
        other => panic!("Expected block, got {:?}", other),
    }
}

#[test]
fn test_parse_declarations_and_return() {
    let stmts = body("let x = 1; const y = 'two'\nreturn x");
    assert_eq!(stmts.len(), 3);

    let Stmt::Declare {
        var_kind: VarKind::Const,
        name,
        init: Some(Expr::LitStr { v, .. }),
        ..
    } = &stmts[1]
    else {
        unreachable!("Expected const declaration, got {:?}", stmts[1])
    };
    assert_eq!(name, "y");
    assert_eq!(v, "two");

    let Stmt::Return { value: Some(_), span } = &stmts[2] else {
        unreachable!("Expected return")
    };
    assert_eq!(span.line(), 2);
}

#[test]
fn test_parse_keyword_prefixed_identifiers() {
    let stmts = body("let iffy = 1\nlet format = iffy\nreturned = format");
    assert_eq!(stmts.len(), 3);
    assert!(matches!(&stmts[2], Stmt::Assign { var, .. } if var == "returned"));
}

#[test]
fn test_parse_operator_precedence() {
    let expr = parse_expression("1 + 2 * 3 == 7 && !false").unwrap();
    let Expr::BinaryOp {
        op: BinaryOp::And,
        left,
        right,
        ..
    } = expr
    else {
        unreachable!("Expected && at the root")
    };
    assert!(matches!(*left, Expr::BinaryOp { op: BinaryOp::Eq, .. }));
    assert!(matches!(
        *right,
        Expr::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
}

#[test]
fn test_parse_postfix_chain() {
    let expr = parse_expression("editor.get(node, \"text\")?.length[0]").unwrap();
    let Expr::Index { object, .. } = expr else {
        unreachable!("Expected index access")
    };
    let Expr::Member {
        object, optional, ..
    } = *object
    else {
        unreachable!("Expected member access")
    };
    assert!(optional);
    let Expr::Call { callee, args, .. } = *object else {
        unreachable!("Expected call")
    };
    assert_eq!(args.len(), 2);
    assert!(matches!(*callee, Expr::Member { ref property, .. } if property == "get"));
}

#[test]
fn test_parse_object_literal_shorthand_and_string_keys() {
    let expr = parse_expression("{ get_commands, 'on_build_started': function() { return nil } }")
        .unwrap();
    let Expr::LitObj { properties, .. } = expr else {
        unreachable!("Expected object literal")
    };
    assert_eq!(properties.len(), 2);
    assert_eq!(properties[0].0, "get_commands");
    assert!(matches!(properties[0].2, Expr::Ident { .. }));
    assert_eq!(properties[1].0, "on_build_started");
    assert!(matches!(properties[1].2, Expr::Function { .. }));
}

#[test]
fn test_parse_string_escapes() {
    let expr = parse_expression(r#""line\n\"quoted\"\t\\""#).unwrap();
    let Expr::LitStr { v, .. } = expr else {
        unreachable!("Expected string")
    };
    assert_eq!(v, "line\n\"quoted\"\t\\");
}

#[test]
fn test_parse_control_flow() {
    let source = r#"
function count(list) {
    let n = 0
    for (let x of list) {
        if (x == null) { continue } else { n = n + 1 }
    }
    while (n > 10) { n = n - 1 }
    try { throw "boom" } catch (e) { n = 0 }
    return n
}
"#;
    let stmts = body(source);
    let Stmt::Function { def, .. } = &stmts[0] else {
        unreachable!("Expected function declaration")
    };
    assert_eq!(def.name.as_deref(), Some("count"));
    assert_eq!(def.params, vec!["list".to_string()]);
    let Stmt::Block { body, .. } = def.body.as_ref() else {
        unreachable!("Expected block body")
    };
    assert!(matches!(body[1], Stmt::ForLoop { kind: ForLoopKind::Of, .. }));
    assert!(matches!(body[2], Stmt::While { .. }));
    assert!(matches!(body[3], Stmt::Try { .. }));
}

#[test]
fn test_parse_member_assignment_path() {
    let stmts = body("state.items[0].name = \"x\"");
    let Stmt::Assign { var, path, .. } = &stmts[0] else {
        unreachable!("Expected assignment")
    };
    assert_eq!(var, "state");
    assert_eq!(path.len(), 3);
    assert!(matches!(&path[0], MemberAccess::Prop { property, .. } if property == "items"));
    assert!(matches!(&path[1], MemberAccess::Index { .. }));
}

#[test]
fn test_parse_error_has_span() {
    let err = parse_script("let x = (1 + \nlet y = 2").unwrap_err();
    assert!(matches!(err, ParseError::Syntax { span: Some(_), .. }));
}

#[test]
fn test_const_requires_initializer() {
    let err = parse_script("const x").unwrap_err();
    assert!(err.message().contains("const"));
}

#[test]
fn test_spans_count_lines_and_characters() {
    let stmts = body("let a = 1\n  let b = \"é\"; return b");
    assert_eq!(stmts.len(), 3);

    let second = stmts[1].span();
    assert_eq!((second.start_line, second.start_col), (1, 2));

    // Columns count characters, not bytes
    let third = stmts[2].span();
    assert_eq!((third.start_line, third.start_col), (1, 15));
    assert_eq!(third.line(), 2);
}
