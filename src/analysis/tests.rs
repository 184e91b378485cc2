use super::*;
use crate::fs::MemoryFileSystem;
use pretty_assertions::assert_eq;

const ROOT: &str = "/project";

fn analyze(files: &[(&str, &str)]) -> Analyzer {
    let fs = MemoryFileSystem::new().with_current_dir(ROOT);
    for (path, source) in files {
        fs.add_file(Path::new(ROOT).join(path), source);
    }
    let mut analyzer = Analyzer::new(Box::new(fs), AnalyzerConfig::hermetic()).unwrap();
    analyzer.analyze(Path::new(ROOT));
    analyzer.finish();
    analyzer
}

fn type_of(analyzer: &Analyzer, file: &str, name: &str) -> String {
    let file = Path::new(ROOT).join(file);
    match analyzer.lookup_in_file(&file, name) {
        Some(ty) => analyzer.describe(&ty),
        None => panic!("{} is not bound in {}", name, file.display()),
    }
}

fn messages(analyzer: &Analyzer, file: &str, code: &str) -> Vec<String> {
    analyzer
        .diagnostics_for_file(&Path::new(ROOT).join(file))
        .iter()
        .filter(|d| d.code == code)
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn test_call_site_argument_types_flow_into_the_body() {
    let analyzer = analyze(&[(
        "main.py",
        "def f(x):\n    return x + 1\n\ny = f(1)\nz = f(2.5)\n",
    )]);
    assert_eq!(type_of(&analyzer, "main.py", "y"), "int");
    assert_eq!(type_of(&analyzer, "main.py", "z"), "float");
    assert_eq!(type_of(&analyzer, "main.py", "f"), "def f -> int | float");
}

#[test]
fn test_reassignment_widens_to_a_union() {
    let analyzer = analyze(&[("main.py", "x = 1\nx = \"a\"\n")]);
    assert_eq!(type_of(&analyzer, "main.py", "x"), "int | str");
}

#[test]
fn test_method_inherited_from_base_class() {
    let source = "\
class A:
    def greet(self):
        return \"hi\"

class B(A):
    pass

b = B()
s = b.greet()
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "b"), "B");
    assert_eq!(type_of(&analyzer, "main.py", "s"), "str");
}

#[test]
fn test_attributes_set_in_init_are_visible_to_methods() {
    let source = "\
class Point:
    def __init__(self, x):
        self.x = x

    def get(self):
        return self.x

p = Point(3)
v = p.get()
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "v"), "int");
}

#[test]
fn test_static_and_class_methods() {
    let source = "\
class C:
    @staticmethod
    def make(v):
        return v

    @classmethod
    def create(cls):
        return cls()

a = C.make(1)
b = C.create()
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "a"), "int");
    assert_eq!(type_of(&analyzer, "main.py", "b"), "C");
}

#[test]
fn test_property_access_applies_the_getter() {
    let source = "\
class T:
    @property
    def size(self):
        return 3

n = T().size
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "n"), "int");
}

#[test]
fn test_dotted_import_of_package_member() {
    let analyzer = analyze(&[
        ("main.py", "import pkg.mod\nv = pkg.mod.VALUE\n"),
        ("pkg/__init__.py", ""),
        ("pkg/mod.py", "VALUE = 42\n"),
    ]);
    assert_eq!(type_of(&analyzer, "main.py", "v"), "int");
    assert_eq!(type_of(&analyzer, "main.py", "pkg"), "module pkg");
    assert!(messages(&analyzer, "pkg/mod.py", error_codes::warnings::UNUSED_VARIABLE).is_empty());
}

#[test]
fn test_relative_imports() {
    let analyzer = analyze(&[
        ("pkg/__init__.py", ""),
        ("pkg/util.py", "def helper():\n    return 1.5\n"),
        ("pkg/main.py", "from .util import helper\nz = helper()\n"),
        ("pkg/other.py", "from . import util\nw = util.helper()\n"),
    ]);
    assert_eq!(type_of(&analyzer, "pkg/main.py", "z"), "float");
    assert_eq!(type_of(&analyzer, "pkg/other.py", "w"), "float");
}

#[test]
fn test_import_cycle_terminates() {
    let analyzer = analyze(&[
        ("a.py", "import b\nX = 1\n"),
        ("b.py", "import a\nY = 2\n"),
    ]);
    assert_eq!(analyzer.loaded_files().len(), 2);
    assert_eq!(type_of(&analyzer, "a.py", "b"), "module b");
    // `a` was still loading when `b` imported it
    assert_eq!(type_of(&analyzer, "b.py", "a"), "?");
    for file in ["a.py", "b.py"] {
        assert!(messages(&analyzer, file, error_codes::inference::MODULE_NOT_FOUND).is_empty());
    }
}

#[test]
fn test_missing_imports_are_reported() {
    let analyzer = analyze(&[
        ("main.py", "import nosuchmod\nfrom lib import nothing\n"),
        ("lib.py", "something = 1\n"),
    ]);
    assert_eq!(
        messages(&analyzer, "main.py", error_codes::inference::MODULE_NOT_FOUND),
        vec!["module not found: nosuchmod"]
    );
    assert_eq!(
        messages(&analyzer, "main.py", error_codes::inference::IMPORT_NAME_NOT_FOUND),
        vec!["cannot import name 'nothing' from 'lib'"]
    );
}

#[test]
fn test_library_modules() {
    let source = "\
import os.path
import math
p = os.path.join(\"a\", \"b\")
r = math.sqrt(2)
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "p"), "str");
    assert_eq!(type_of(&analyzer, "main.py", "r"), "float");
}

#[test]
fn test_recursive_function_terminates() {
    let source = "\
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)

r = fact(5)
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "r"), "int");
}

#[test]
fn test_unused_variable_reported_once_per_site() {
    let source = "\
def f(a):
    unused = a
    return a

f(1)
f(\"s\")
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(
        messages(&analyzer, "main.py", error_codes::warnings::UNUSED_VARIABLE),
        vec!["unused variable: unused"]
    );
}

#[test]
fn test_uncalled_functions_are_applied() {
    let source = "\
def outer():
    def inner(y):
        return y
    return 1
";
    let analyzer = analyze(&[("main.py", source)]);
    assert!(analyzer.uncalled().is_empty());
    assert_eq!(type_of(&analyzer, "main.py", "outer"), "def outer -> int");
    assert!(analyzer.bindings().iter().any(|b| b.name == "inner"));
    assert_eq!(analyzer.stats().functions_called, 2);
}

#[test]
fn test_unresolved_name() {
    let analyzer = analyze(&[("main.py", "print(undefined_name)\n")]);
    assert_eq!(
        messages(&analyzer, "main.py", error_codes::inference::UNRESOLVED_NAME),
        vec!["unresolved name: undefined_name"]
    );
    let stats = analyzer.stats();
    assert_eq!(stats.resolved_names, 1);
    assert_eq!(stats.unresolved_names, 1);
    assert_eq!(stats.resolve_rate(), "50%");
}

#[test]
fn test_global_declaration_redirects_binding() {
    let source = "\
counter = 0

def bump():
    global counter
    counter = \"s\"

bump()
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "counter"), "int | str");
}

#[test]
fn test_tuple_unpacking_and_loops() {
    let source = "\
a, b = 1, \"x\"
for i in range(3):
    j = i
for ch in \"abc\":
    k = ch
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "a"), "int");
    assert_eq!(type_of(&analyzer, "main.py", "b"), "str");
    assert_eq!(type_of(&analyzer, "main.py", "j"), "int");
    assert_eq!(type_of(&analyzer, "main.py", "k"), "str");
}

#[test]
fn test_lambda_and_with_statement() {
    let source = "\
sq = lambda n: n * n
r = sq(2.0)
with open(\"data.txt\") as fh:
    data = fh.read()
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "r"), "float");
    assert_eq!(type_of(&analyzer, "main.py", "data"), "str");
}

#[test]
fn test_parse_failure_does_not_stop_the_run() {
    let analyzer = analyze(&[("bad.py", "def (:\n"), ("good.py", "x = 1\n")]);
    assert!(analyzer
        .failed_to_parse()
        .contains(&Path::new(ROOT).join("bad.py")));
    assert!(!analyzer.parse_errors()[&Path::new(ROOT).join("bad.py")].is_empty());
    assert_eq!(type_of(&analyzer, "good.py", "x"), "int");
    let stats = analyzer.stats();
    assert_eq!(stats.failed_to_parse, 1);
    assert_eq!(stats.modules_loaded, 1);
}

#[test]
fn test_references_point_at_definitions() {
    let analyzer = analyze(&[("main.py", "x = 1\ny = x\n")]);
    let x = analyzer
        .bindings()
        .into_iter()
        .find(|b| b.name == "x")
        .unwrap()
        .clone();
    assert_eq!(x.refs.len(), 1);
    assert_eq!(analyzer.references().len(), 1);
    assert_eq!(analyzer.stats().resolve_rate(), "100%");
}

#[test]
fn test_finish_is_idempotent() {
    let mut analyzer = analyze(&[("main.py", "print(missing)\n")]);
    let before = analyzer.stats();
    analyzer.finish();
    assert_eq!(analyzer.stats(), before);
}

#[test]
fn test_recursion_through_fresh_lambda_terminates() {
    let analyzer = analyze(&[("main.py", "def f(g):\n    return f(lambda: g)\n\nr = f(1)\n")]);
    assert_eq!(type_of(&analyzer, "main.py", "r"), "?");
    assert!(analyzer.uncalled().is_empty());
}

#[test]
fn test_recursion_through_fresh_class_terminates() {
    let source = "\
def f(x):
    class C:
        pass
    return f(C())

r = f(1)
";
    let analyzer = analyze(&[("main.py", source)]);
    assert_eq!(type_of(&analyzer, "main.py", "r"), "?");
}

#[test]
fn test_submodule_is_bound_in_its_package() {
    let analyzer = analyze(&[("pkg/__init__.py", ""), ("pkg/mod.py", "import pkg\n")]);
    let package = analyzer
        .module_for_file(&Path::new(ROOT).join("pkg/__init__.py"))
        .unwrap();
    let scope = analyzer.types().module(package).scope;
    let ids = analyzer.scopes().lookup_local(scope, "mod").unwrap();
    let binding = analyzer.scopes().binding(ids[0]);
    assert_eq!(binding.kind, BindingKind::Module);
    assert!(matches!(binding.ty, Type::Module(_)));
    assert_eq!(type_of(&analyzer, "pkg/mod.py", "pkg"), "module pkg");
}

#[test]
fn test_blocked_cache_directory_is_fatal() {
    let fs = MemoryFileSystem::new().with_file("/project/cache", "not a directory");
    let config = AnalyzerConfig {
        cache_dir: Some(PathBuf::from("/project/cache")),
        disk_cache: true,
        ..AnalyzerConfig::hermetic()
    };
    match Analyzer::new(Box::new(fs), config) {
        Err(AnalyzerError::CacheDirectory { path, .. }) => {
            assert_eq!(path, PathBuf::from("/project/cache"))
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("analyzer created over a file"),
    }
}

#[test]
fn test_failed_import_is_not_also_unused() {
    let analyzer = analyze(&[("main.py", "import nosuchmod\n")]);
    assert_eq!(
        messages(&analyzer, "main.py", error_codes::inference::MODULE_NOT_FOUND).len(),
        1
    );
    assert!(messages(&analyzer, "main.py", error_codes::warnings::UNUSED_VARIABLE).is_empty());
}
