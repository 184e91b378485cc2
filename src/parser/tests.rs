use super::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn parse(source: &str) -> Module {
    match parse_source(source, &PathBuf::from("test.py")) {
        Ok(module) => module,
        Err(errors) => panic!("Parse error: {:?}", errors),
    }
}

fn parse_err(source: &str) -> DiagnosticBag {
    parse_source(source, &PathBuf::from("test.py")).unwrap_err()
}

fn name(expr: &Expr) -> &str {
    match expr {
        Expr::Name { id, .. } => id,
        other => panic!("expected name, got {:?}", other),
    }
}

#[test]
fn test_parse_empty_module() {
    let module = parse("");
    assert!(module.body.is_empty());
    assert_eq!(module.file, PathBuf::from("test.py"));
}

#[test]
fn test_parse_function_with_call() {
    let module = parse("def f(x):\n    return x + 1\n\nf(1)\n");
    assert_eq!(module.body.len(), 2);

    let Stmt::FunctionDef(def) = &module.body[0] else {
        panic!("expected function definition");
    };
    assert_eq!(def.name.name, "f");
    assert_eq!(def.params.len(), 1);
    assert_eq!(def.params[0].name.name, "x");
    assert!(matches!(
        &def.body[0],
        Stmt::Return {
            value: Some(Expr::BinOp {
                op: Operator::Add,
                ..
            }),
            ..
        }
    ));

    let Stmt::Expr {
        value: Expr::Call { func, args, .. },
        ..
    } = &module.body[1]
    else {
        panic!("expected call statement");
    };
    assert_eq!(name(func), "f");
    assert_eq!(args.len(), 1);
}

#[test]
fn test_parse_parameter_kinds() {
    let module = parse("def f(a, b=1, *args, c, d=2, **kw) -> int:\n    pass\n");
    let Stmt::FunctionDef(def) = &module.body[0] else {
        panic!("expected function definition");
    };
    let kinds: Vec<ParamKind> = def.params.iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ParamKind::Positional,
            ParamKind::Positional,
            ParamKind::VarArgs,
            ParamKind::KeywordOnly,
            ParamKind::KeywordOnly,
            ParamKind::KwArgs,
        ]
    );
    assert!(def.params[1].default.is_some());
    assert!(def.returns.is_some());
}

#[test]
fn test_parse_class_with_bases_and_methods() {
    let source = r#"
class B(A, metaclass=Meta):
    x = 1

    def method(self):
        self.v = 2
"#;
    let module = parse(source);
    let Stmt::ClassDef(class) = &module.body[0] else {
        panic!("expected class");
    };
    assert_eq!(class.name.name, "B");
    assert_eq!(class.bases.len(), 1);
    assert_eq!(name(&class.bases[0]), "A");
    assert_eq!(class.keywords.len(), 1);
    assert_eq!(class.body.len(), 2);
}

#[test]
fn test_parse_imports() {
    let module = parse("import os.path as p, sys\nfrom ..pkg.mod import (a as b, c,)\nfrom . import x\nfrom m import *\n");

    let Stmt::Import { names, .. } = &module.body[0] else {
        panic!("expected import");
    };
    assert_eq!(names[0].dotted(), "os.path");
    assert_eq!(names[0].asname.as_ref().map(|i| i.name.as_str()), Some("p"));
    assert_eq!(names[1].dotted(), "sys");

    let Stmt::ImportFrom {
        module: path,
        level,
        names: ImportNames::Names(aliases),
        ..
    } = &module.body[1]
    else {
        panic!("expected from-import");
    };
    assert_eq!(dotted_name(path), "pkg.mod");
    assert_eq!(*level, 2);
    assert_eq!(aliases.len(), 2);

    assert!(matches!(
        &module.body[2],
        Stmt::ImportFrom { level: 1, module, .. } if module.is_empty()
    ));
    assert!(matches!(
        &module.body[3],
        Stmt::ImportFrom {
            names: ImportNames::Star(_),
            ..
        }
    ));
}

#[test]
fn test_parse_control_flow() {
    let source = r#"
if a:
    pass
elif b:
    pass
else:
    pass
while x: x -= 1
for i, j in pairs:
    continue
else:
    break
try:
    pass
except (ValueError, KeyError) as e:
    raise RuntimeError() from e
finally:
    pass
with open(p) as f, lock:
    pass
"#;
    let module = parse(source);
    assert_eq!(module.body.len(), 5);

    let Stmt::If { orelse, .. } = &module.body[0] else {
        panic!("expected if");
    };
    assert!(matches!(&orelse[0], Stmt::If { orelse, .. } if orelse.len() == 1));

    assert!(matches!(
        &module.body[2],
        Stmt::For { target: Expr::Tuple { elts, .. }, orelse, .. } if elts.len() == 2 && orelse.len() == 1
    ));
    assert!(matches!(
        &module.body[3],
        Stmt::Try { handlers, finalbody, .. } if handlers.len() == 1 && finalbody.len() == 1
    ));
    assert!(matches!(
        &module.body[4],
        Stmt::With { items, .. } if items.len() == 2 && items[0].target.is_some()
    ));
}

#[test]
fn test_parse_assignment_forms() {
    let module = parse("a = b = 1\nx, y = 1, 2\nn: int = 3\nc += 1\n");
    assert!(matches!(&module.body[0], Stmt::Assign { targets, .. } if targets.len() == 2));
    assert!(matches!(
        &module.body[1],
        Stmt::Assign { targets, value: Expr::Tuple { .. }, .. } if matches!(targets[0], Expr::Tuple { .. })
    ));
    assert!(matches!(&module.body[2], Stmt::AnnAssign { value: Some(_), .. }));
    assert!(matches!(
        &module.body[3],
        Stmt::AugAssign {
            op: Operator::Add,
            ..
        }
    ));
}

#[test]
fn test_parse_semicolon_separated_statements() {
    let module = parse("a = 1; b = 2;\n");
    assert_eq!(module.body.len(), 2);
}

#[test]
fn test_parse_expressions() {
    let module = parse(
        "v = [x * 2 for x in xs if x] + {k: v for k, v in d} \nw = lambda a, b=1: a if b else not a\nz = f(*a, key=1, **kw)[1:2]\n",
    );
    assert_eq!(module.body.len(), 3);

    let Stmt::Assign { value, .. } = &module.body[1] else {
        panic!("expected assignment");
    };
    let Expr::Lambda { def, .. } = value else {
        panic!("expected lambda");
    };
    assert!(def.is_lambda());
    assert_eq!(def.params.len(), 2);
    assert!(matches!(
        &def.body[0],
        Stmt::Return {
            value: Some(Expr::IfExp { .. }),
            ..
        }
    ));

    let Stmt::Assign {
        value: Expr::Subscript { value: call, index, .. },
        ..
    } = &module.body[2]
    else {
        panic!("expected subscript");
    };
    assert!(matches!(index.as_ref(), Expr::Slice { .. }));
    let Expr::Call { args, .. } = call.as_ref() else {
        panic!("expected call");
    };
    assert!(matches!(args[0], Arg::Star(_)));
    assert!(matches!(args[1], Arg::Keyword { .. }));
    assert!(matches!(args[2], Arg::DoubleStar(_)));
}

#[test]
fn test_parse_comparison_chain() {
    let module = parse("r = a < b is not c not in d\n");
    let Stmt::Assign {
        value: Expr::Compare { ops, .. },
        ..
    } = &module.body[0]
    else {
        panic!("expected comparison");
    };
    assert_eq!(
        ops,
        &vec![CmpOperator::Lt, CmpOperator::IsNot, CmpOperator::NotIn]
    );
}

#[test]
fn test_parse_decorators_and_async() {
    let module = parse("@dec\n@other(1)\nasync def f():\n    await g()\n");
    let Stmt::FunctionDef(def) = &module.body[0] else {
        panic!("expected function");
    };
    assert!(def.is_async);
    assert_eq!(def.decorators.len(), 2);
}

#[test]
fn test_parse_literals() {
    let module = parse("a = (1, 2.0, 3j, 'x' 'y', b'z', True, None, ...)\n");
    let Stmt::Assign {
        value: Expr::Tuple { elts, .. },
        ..
    } = &module.body[0]
    else {
        panic!("expected tuple");
    };
    assert!(matches!(elts[0], Expr::Int { .. }));
    assert!(matches!(elts[1], Expr::Float { .. }));
    assert!(matches!(elts[2], Expr::Imaginary { .. }));
    assert!(matches!(&elts[3], Expr::Str { value, .. } if value == "xy"));
    assert!(matches!(elts[4], Expr::Bytes { .. }));
    assert!(matches!(elts[5], Expr::Bool { value: true, .. }));
    assert!(matches!(elts[6], Expr::NoneLit { .. }));
    assert!(matches!(elts[7], Expr::Ellipsis { .. }));
}

#[test]
fn test_parse_global_and_yield() {
    let module = parse("def g():\n    global n\n    x = yield n\n    yield from h()\n");
    let Stmt::FunctionDef(def) = &module.body[0] else {
        panic!("expected function");
    };
    assert!(matches!(&def.body[0], Stmt::Global { names, .. } if names[0].name == "n"));
    assert!(matches!(&def.body[1], Stmt::Assign { value: Expr::Yield { .. }, .. }));
    assert!(matches!(&def.body[2], Stmt::Expr { value: Expr::YieldFrom { .. }, .. }));
}

#[test]
fn test_parse_error_reports_location() {
    let errors = parse_err("x = (1,\ny = 2\n");
    assert!(errors.has_errors());

    let errors = parse_err("def f(:\n    pass\n");
    let first = &errors.diagnostics()[0];
    assert_eq!(first.code, "E0001");
    assert_eq!(first.span.start_line, 1);
}

#[test]
fn test_parse_error_recovery_collects_multiple_errors() {
    let errors = parse_err("a = )\nb = 1\nc = ]\n");
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_unexpected_indent() {
    let errors = parse_err("a = 1\n    b = 2\n");
    assert_eq!(errors.diagnostics()[0].code, "E0003");
}

#[test]
fn test_invalid_assignment_target() {
    let errors = parse_err("f() = 1\n");
    assert_eq!(errors.diagnostics()[0].code, "E0005");
}

#[test]
fn test_ast_survives_json_round_trip() {
    let module = parse("class A:\n    def m(self):\n        return lambda: self\n");
    let json = serde_json::to_string(&module).unwrap();
    let restored: Module = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, module);
}

#[test]
fn test_python_parser_trait() {
    let parser = PythonParser;
    let module = parser.parse("x = 1\n", Path::new("m.py")).unwrap();
    assert_eq!(module.body.len(), 1);
}
