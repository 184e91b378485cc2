use super::*;
use proptest::prelude::*;

fn int() -> Type {
    Type::Primitive(Prim::Int)
}

fn str_() -> Type {
    Type::Primitive(Prim::Str)
}

fn float() -> Type {
    Type::Primitive(Prim::Float)
}

#[test]
fn test_merge_identical_is_identity() {
    assert_eq!(int().merge(&int()), int());
}

#[test]
fn test_merge_unknown_yields_other() {
    assert_eq!(Type::Unknown.merge(&str_()), str_());
    assert_eq!(str_().merge(&Type::Unknown), str_());
    assert_eq!(Type::Unknown.merge(&Type::Unknown), Type::Unknown);
}

#[test]
fn test_merge_distinct_makes_flat_union() {
    let ab = int().merge(&str_());
    let abc = ab.merge(&float());
    match &abc {
        Type::Union(members) => {
            assert_eq!(members.len(), 3);
            assert!(members.iter().all(|m| !m.is_union()));
        }
        other => panic!("expected union, got {:?}", other),
    }
    assert_eq!(abc.merge(&ab), abc);
}

#[test]
fn test_union_of_single_member_collapses() {
    assert_eq!(Type::union([int(), int(), Type::Unknown]), int());
    assert_eq!(Type::union(Vec::new()), Type::Unknown);
}

#[test]
fn test_is_callable() {
    assert!(Type::Function(FunId(0)).is_callable());
    assert!(Type::Class(ClassId(0)).is_callable());
    assert!(!Type::Instance(ClassId(0)).is_callable());
    assert!(int().merge(&Type::Function(FunId(1))).is_callable());
}

#[test]
fn test_numeric_widening() {
    use Operator::*;
    assert_eq!(primitive_binary(Add, Prim::Int, Prim::Int), Some(Prim::Int));
    assert_eq!(primitive_binary(Add, Prim::Bool, Prim::Bool), Some(Prim::Int));
    assert_eq!(primitive_binary(Mult, Prim::Int, Prim::Float), Some(Prim::Float));
    assert_eq!(primitive_binary(Div, Prim::Int, Prim::Int), Some(Prim::Float));
    assert_eq!(primitive_binary(Sub, Prim::Float, Prim::Complex), Some(Prim::Complex));
    assert_eq!(primitive_binary(BitAnd, Prim::Bool, Prim::Bool), Some(Prim::Bool));
    assert_eq!(primitive_binary(LShift, Prim::Float, Prim::Int), None);
}

#[test]
fn test_string_operators() {
    use Operator::*;
    assert_eq!(primitive_binary(Add, Prim::Str, Prim::Str), Some(Prim::Str));
    assert_eq!(primitive_binary(Mult, Prim::Int, Prim::Str), Some(Prim::Str));
    assert_eq!(primitive_binary(Mod, Prim::Str, Prim::Float), Some(Prim::Str));
    assert_eq!(primitive_binary(Add, Prim::Str, Prim::Int), None);
    assert_eq!(primitive_binary(Add, Prim::Bytes, Prim::Str), None);
}

#[test]
fn test_binary_distributes_over_unions() {
    let num = int().merge(&float());
    assert_eq!(
        binary(Operator::Add, &num, &int()),
        int().merge(&float())
    );
    assert_eq!(binary(Operator::Add, &int().merge(&str_()), &int()), Type::Unknown);
    assert_eq!(binary(Operator::Add, &Type::Unknown, &int()), Type::Unknown);
}

#[test]
fn test_sequence_operators() {
    let list = Type::Instance(ClassId(3));
    assert_eq!(binary(Operator::Add, &list, &list), list);
    assert_eq!(binary(Operator::Mult, &int(), &list), list);
    assert_eq!(
        binary(Operator::Add, &list, &Type::Instance(ClassId(4))),
        Type::Unknown
    );
}

fn leaf() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Unknown),
        Just(Type::Primitive(Prim::Bool)),
        Just(Type::Primitive(Prim::Int)),
        Just(Type::Primitive(Prim::Str)),
        Just(Type::Primitive(Prim::None)),
        (0u32..3).prop_map(|i| Type::Class(ClassId(i))),
        (0u32..3).prop_map(|i| Type::Instance(ClassId(i))),
        (0u32..3).prop_map(|i| Type::Function(FunId(i))),
        (0u32..2).prop_map(|i| Type::Module(ModuleId(i))),
    ]
}

fn any_type() -> impl Strategy<Value = Type> {
    prop::collection::vec(leaf(), 1..5).prop_map(Type::union)
}

fn assert_flat(ty: &Type) {
    if let Type::Union(members) = ty {
        assert!(members.len() >= 2);
        for m in members {
            assert!(!m.is_union(), "nested union in {:?}", ty);
            assert!(!m.is_unknown(), "unknown member in {:?}", ty);
        }
    }
}

proptest! {
    #[test]
    fn prop_merge_is_idempotent(a in any_type(), b in any_type()) {
        prop_assert_eq!(a.merge(&a), a.clone());
        let ab = a.merge(&b);
        prop_assert_eq!(ab.merge(&b), ab.clone());
    }

    #[test]
    fn prop_merge_is_commutative(a in any_type(), b in any_type()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn prop_merge_is_associative(a in any_type(), b in any_type(), c in any_type()) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn prop_merge_never_nests_unions(a in any_type(), b in any_type(), c in any_type()) {
        let merged = a.merge(&b).merge(&c);
        assert_flat(&merged);
        for part in [&a, &b, &c] {
            for member in part.members() {
                if !member.is_unknown() {
                    prop_assert!(merged.contains(member));
                }
            }
        }
    }
}

#[test]
fn test_site_type_ignores_fresh_class_ids() {
    let node = Span::new(PathBuf::from("/p/m.py"), 0, 10, 1, 1, 2, 1);
    let mut store = TypeStore::new();
    let mut class = |node: Option<Span>| {
        store.add_class(ClassType {
            name: "C".to_string(),
            qname: "m.C".to_string(),
            scope: ScopeId(0),
            bases: Vec::new(),
            prim: None,
            builtin: node.is_none(),
            node,
        })
    };
    let first = class(Some(node.clone()));
    let second = class(Some(node.clone()));
    let builtin = class(None);

    assert_ne!(Type::Instance(first), Type::Instance(second));
    assert_eq!(
        store.site_type(&Type::Instance(first)),
        store.site_type(&Type::Instance(second))
    );
    assert_eq!(
        store.site_type(&Type::union([Type::Class(first), int()])),
        store.site_type(&Type::union([Type::Class(second), int()]))
    );
    assert_eq!(
        store.site_type(&Type::Instance(builtin)),
        SiteType::Exact(Type::Instance(builtin))
    );
}
