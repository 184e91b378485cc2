use super::*;

fn installed() -> (ScopeTable, TypeStore, Builtins) {
    let mut scopes = ScopeTable::new();
    let mut types = TypeStore::new();
    let builtins = Builtins::install(&mut scopes, &mut types);
    (scopes, types, builtins)
}

#[test]
fn test_global_scope_has_builtins() {
    let (scopes, types, builtins) = installed();
    assert_eq!(
        scopes.lookup_type(ScopeId::GLOBAL, "int"),
        Some(Type::Class(builtins.int))
    );
    assert_eq!(
        scopes.lookup_type(ScopeId::GLOBAL, "True"),
        Some(Type::Primitive(Prim::Bool))
    );
    let len = scopes.lookup_type(ScopeId::GLOBAL, "len");
    assert!(matches!(len, Some(Type::Function(_))));
    assert_eq!(types.class(builtins.str_).prim, Some(Prim::Str));
}

#[test]
fn test_builtin_bindings_are_synthetic() {
    let (scopes, _, _) = installed();
    let ids = scopes.lookup(ScopeId::GLOBAL, "print").unwrap();
    let binding = scopes.binding(ids[0]);
    assert!(binding.is_builtin());
    assert_eq!(binding.node.file.to_string_lossy(), "<library>/builtins.print");
}

#[test]
fn test_primitive_methods_live_on_their_class() {
    let (scopes, types, builtins) = installed();
    let str_scope = types.class(builtins.prim_class(Prim::Str)).scope;
    let upper = scopes.lookup_type(str_scope, "upper");
    match upper {
        Some(Type::Function(id)) => assert!(matches!(
            types.fun(id).body,
            FunBody::Native(NativeReturn::Fixed(Type::Primitive(Prim::Str)))
        )),
        other => panic!("expected native method, got {:?}", other),
    }
}

#[test]
fn test_library_modules() {
    let (scopes, types, builtins) = installed();
    let os = builtins.module("os").unwrap();
    let os_path = builtins.module("os.path").unwrap();
    assert_eq!(
        scopes.lookup_type(types.module(os).scope, "path"),
        Some(Type::Module(os_path))
    );
    assert!(scopes.lookup_local(types.module(os_path).scope, "join").is_some());
    assert!(builtins.module("math").is_some());
    assert!(builtins.module("numpy").is_none());
}

#[test]
fn test_exception_hierarchy() {
    let (scopes, types, _) = installed();
    let Some(Type::Class(key_error)) = scopes.lookup_type(ScopeId::GLOBAL, "KeyError") else {
        panic!("KeyError missing");
    };
    let Some(lookup) = scopes.lookup_type(ScopeId::GLOBAL, "LookupError") else {
        panic!("LookupError missing");
    };
    assert_eq!(types.class(key_error).bases, vec![lookup]);
}
