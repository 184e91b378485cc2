//! Library model: builtin names in the global scope and the standard modules
//! served without a source file.

use super::binding::BindingKind;
use super::scope::{ScopeId, ScopeKind, ScopeTable};
use super::types::{
    ClassId, ClassType, FunBody, FunType, MethodKind, ModuleId, ModuleType, NativeReturn, Prim,
    Type, TypeStore,
};
use crate::diagnostics::Span;
use std::collections::HashMap;

/// Handles to the builtin classes the interpreter needs by name
#[derive(Debug, Clone)]
pub struct Builtins {
    pub object: ClassId,
    pub bool_: ClassId,
    pub int: ClassId,
    pub float: ClassId,
    pub complex: ClassId,
    pub str_: ClassId,
    pub bytes: ClassId,
    pub none: ClassId,
    pub list: ClassId,
    pub tuple: ClassId,
    pub dict: ClassId,
    pub set: ClassId,
    pub range: ClassId,
    pub generator: ClassId,
    pub file: ClassId,
    modules: HashMap<String, ModuleId>,
}

impl Builtins {
    /// Populate the global scope and build the library modules
    pub fn install(scopes: &mut ScopeTable, types: &mut TypeStore) -> Self {
        let mut lib = Library {
            scopes,
            types,
            modules: HashMap::new(),
        };
        let global = ScopeId::GLOBAL;

        let object = lib.class(global, "object", &[], None);
        let b = |id: ClassId| Type::Class(id);
        let int = lib.class(global, "int", &[b(object)], Some(Prim::Int));
        let bool_ = lib.class(global, "bool", &[b(int)], Some(Prim::Bool));
        let float = lib.class(global, "float", &[b(object)], Some(Prim::Float));
        let complex = lib.class(global, "complex", &[b(object)], Some(Prim::Complex));
        let str_ = lib.class(global, "str", &[b(object)], Some(Prim::Str));
        let bytes = lib.class(global, "bytes", &[b(object)], Some(Prim::Bytes));
        let none = lib.class(global, "NoneType", &[b(object)], Some(Prim::None));
        let list = lib.class(global, "list", &[b(object)], None);
        let tuple = lib.class(global, "tuple", &[b(object)], None);
        let dict = lib.class(global, "dict", &[b(object)], None);
        let set = lib.class(global, "set", &[b(object)], None);
        let range = lib.class(global, "range", &[b(object)], None);
        let generator = lib.class(global, "generator", &[b(object)], None);
        let file = lib.class(global, "TextIOWrapper", &[b(object)], None);
        for name in [
            "frozenset", "type", "enumerate", "zip", "map", "filter", "reversed", "slice",
            "bytearray", "memoryview", "property", "staticmethod", "classmethod", "super",
        ] {
            lib.class(global, name, &[b(object)], None);
        }

        let t_bool = Type::Primitive(Prim::Bool);
        let t_int = Type::Primitive(Prim::Int);
        let t_float = Type::Primitive(Prim::Float);
        let t_str = Type::Primitive(Prim::Str);
        let t_bytes = Type::Primitive(Prim::Bytes);
        let t_none = Type::Primitive(Prim::None);
        let t_list = Type::Instance(list);
        let t_dict = Type::Instance(dict);
        let t_set = Type::Instance(set);
        let t_tuple = Type::Instance(tuple);

        lib.methods(object, &["__init__", "__setattr__", "__delattr__"], &t_none);
        lib.methods(object, &["__str__", "__repr__", "__format__"], &t_str);
        lib.methods(object, &["__eq__", "__ne__"], &t_bool);
        lib.methods(object, &["__hash__"], &t_int);

        lib.methods(
            str_,
            &[
                "upper", "lower", "strip", "lstrip", "rstrip", "title", "capitalize", "replace",
                "format", "join", "zfill", "center", "ljust", "rjust", "casefold", "swapcase",
                "expandtabs", "removeprefix", "removesuffix",
            ],
            &t_str,
        );
        lib.methods(str_, &["split", "rsplit", "splitlines"], &t_list);
        lib.methods(str_, &["partition", "rpartition"], &t_tuple);
        lib.methods(
            str_,
            &[
                "startswith", "endswith", "isdigit", "isalpha", "isalnum", "isspace", "isupper",
                "islower", "isidentifier", "isnumeric", "isdecimal",
            ],
            &t_bool,
        );
        lib.methods(str_, &["find", "rfind", "index", "rindex", "count"], &t_int);
        lib.methods(str_, &["encode"], &t_bytes);

        lib.methods(bytes, &["decode", "hex"], &t_str);
        lib.methods(bytes, &["upper", "lower", "strip", "replace", "join"], &t_bytes);
        lib.methods(bytes, &["split"], &t_list);
        lib.methods(bytes, &["startswith", "endswith"], &t_bool);
        lib.methods(bytes, &["find", "count", "index"], &t_int);

        lib.methods(int, &["bit_length", "conjugate", "__index__"], &t_int);
        lib.methods(int, &["to_bytes"], &t_bytes);
        lib.methods(float, &["is_integer"], &t_bool);
        lib.methods(float, &["hex"], &t_str);
        lib.methods(float, &["conjugate"], &t_float);

        lib.methods(
            list,
            &["append", "extend", "insert", "remove", "clear", "sort", "reverse"],
            &t_none,
        );
        lib.methods(list, &["index", "count"], &t_int);
        lib.methods(list, &["copy"], &t_list);
        lib.methods(list, &["pop"], &Type::Unknown);

        lib.methods(tuple, &["index", "count"], &t_int);

        lib.methods(dict, &["update", "clear"], &t_none);
        lib.methods(dict, &["get", "pop", "setdefault", "popitem"], &Type::Unknown);
        lib.methods(dict, &["keys", "values", "items"], &Type::Unknown);
        lib.methods(dict, &["copy"], &t_dict);

        lib.methods(set, &["add", "discard", "remove", "clear", "update"], &t_none);
        lib.methods(
            set,
            &["union", "intersection", "difference", "symmetric_difference", "copy"],
            &t_set,
        );
        lib.methods(set, &["issubset", "issuperset", "isdisjoint"], &t_bool);
        lib.methods(set, &["pop"], &Type::Unknown);

        lib.methods(file, &["read", "readline"], &t_str);
        lib.methods(file, &["readlines"], &t_list);
        lib.methods(file, &["write"], &t_int);
        lib.methods(file, &["close", "flush"], &t_none);

        // exception hierarchy
        let base_exception = lib.class(global, "BaseException", &[b(object)], None);
        lib.attribute(base_exception, "args", &t_tuple);
        lib.methods(base_exception, &["with_traceback"], &Type::Instance(base_exception));
        for name in ["SystemExit", "KeyboardInterrupt", "GeneratorExit"] {
            lib.class(global, name, &[b(base_exception)], None);
        }
        let exception = lib.class(global, "Exception", &[b(base_exception)], None);
        let lookup = lib.class(global, "LookupError", &[b(exception)], None);
        let arithmetic = lib.class(global, "ArithmeticError", &[b(exception)], None);
        let os_error = lib.class(global, "OSError", &[b(exception)], None);
        for name in ["KeyError", "IndexError"] {
            lib.class(global, name, &[b(lookup)], None);
        }
        for name in ["ZeroDivisionError", "OverflowError"] {
            lib.class(global, name, &[b(arithmetic)], None);
        }
        for name in ["FileNotFoundError", "PermissionError", "IOError"] {
            lib.class(global, name, &[b(os_error)], None);
        }
        for name in [
            "ValueError", "TypeError", "AttributeError", "RuntimeError", "NotImplementedError",
            "StopIteration", "ImportError", "AssertionError", "NameError", "EOFError",
            "UnicodeError", "RecursionError", "Warning",
        ] {
            lib.class(global, name, &[b(exception)], None);
        }

        lib.constant(global, "None", &t_none);
        lib.constant(global, "True", &t_bool);
        lib.constant(global, "False", &t_bool);
        lib.constant(global, "__name__", &t_str);
        lib.constant(global, "__file__", &t_str);
        lib.constant(global, "__doc__", &t_str);
        lib.constant(global, "NotImplemented", &Type::Unknown);
        lib.constant(global, "Ellipsis", &Type::Unknown);

        lib.functions(global, &["len", "id", "hash", "ord", "round"], &t_int);
        lib.functions(global, &["print", "setattr", "delattr", "exec"], &t_none);
        lib.functions(
            global,
            &["isinstance", "issubclass", "hasattr", "callable", "all", "any"],
            &t_bool,
        );
        lib.functions(
            global,
            &["repr", "input", "chr", "hex", "oct", "bin", "format", "ascii"],
            &t_str,
        );
        lib.functions(global, &["sorted"], &t_list);
        lib.functions(global, &["open"], &Type::Instance(file));
        lib.functions(global, &["globals", "locals", "vars"], &t_dict);
        lib.functions(global, &["dir"], &t_list);
        lib.functions(global, &["divmod"], &t_tuple);
        lib.functions(
            global,
            &["getattr", "iter", "next", "sum", "min", "max", "eval", "__import__"],
            &Type::Unknown,
        );
        lib.passthrough(global, "abs");

        let (_, sys) = lib.module("sys");
        lib.constant(sys, "argv", &t_list);
        lib.constant(sys, "path", &t_list);
        lib.constant(sys, "modules", &t_dict);
        lib.constant(sys, "version", &t_str);
        lib.constant(sys, "platform", &t_str);
        lib.constant(sys, "maxsize", &t_int);
        lib.constant(sys, "stdin", &Type::Instance(file));
        lib.constant(sys, "stdout", &Type::Instance(file));
        lib.constant(sys, "stderr", &Type::Instance(file));
        lib.functions(sys, &["exit"], &t_none);
        lib.functions(sys, &["getrecursionlimit", "getsizeof"], &t_int);

        let (os_path_id, os_path) = lib.module("os.path");
        lib.functions(
            os_path,
            &[
                "join", "dirname", "basename", "abspath", "realpath", "normpath", "expanduser",
                "relpath",
            ],
            &t_str,
        );
        lib.functions(os_path, &["exists", "isfile", "isdir", "isabs", "islink"], &t_bool);
        lib.functions(os_path, &["split", "splitext"], &t_tuple);
        lib.functions(os_path, &["getsize"], &t_int);
        lib.functions(os_path, &["getmtime"], &t_float);
        lib.constant(os_path, "sep", &t_str);

        let (_, os) = lib.module("os");
        lib.submodule(os, "path", os_path_id);
        lib.functions(os, &["getcwd", "getenv"], &t_str);
        lib.functions(os, &["listdir"], &t_list);
        lib.functions(
            os,
            &["makedirs", "mkdir", "remove", "rmdir", "rename", "chdir", "unlink"],
            &t_none,
        );
        lib.functions(os, &["getpid"], &t_int);
        lib.functions(os, &["walk"], &Type::Unknown);
        lib.constant(os, "environ", &t_dict);
        lib.constant(os, "sep", &t_str);
        lib.constant(os, "linesep", &t_str);
        lib.constant(os, "name", &t_str);

        let (_, math) = lib.module("math");
        lib.functions(
            math,
            &[
                "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "exp", "log",
                "log10", "log2", "pow", "fabs", "hypot", "degrees", "radians",
            ],
            &t_float,
        );
        lib.functions(math, &["floor", "ceil", "trunc", "factorial", "gcd"], &t_int);
        lib.functions(math, &["isnan", "isinf", "isclose"], &t_bool);
        for name in ["pi", "e", "tau", "inf", "nan"] {
            lib.constant(math, name, &t_float);
        }

        let (_, time) = lib.module("time");
        lib.functions(time, &["time", "monotonic", "perf_counter", "process_time"], &t_float);
        lib.functions(time, &["sleep"], &t_none);
        lib.functions(time, &["strftime", "ctime", "asctime"], &t_str);
        lib.functions(time, &["localtime", "gmtime"], &Type::Unknown);

        let (_, json) = lib.module("json");
        lib.functions(json, &["dumps"], &t_str);
        lib.functions(json, &["dump"], &t_none);
        lib.functions(json, &["loads", "load"], &Type::Unknown);

        let (_, re) = lib.module("re");
        lib.functions(re, &["sub", "escape"], &t_str);
        lib.functions(re, &["split", "findall"], &t_list);
        lib.functions(
            re,
            &["compile", "match", "search", "fullmatch", "finditer"],
            &Type::Unknown,
        );
        for name in ["IGNORECASE", "MULTILINE", "DOTALL", "VERBOSE"] {
            lib.constant(re, name, &t_int);
        }

        let (_, random) = lib.module("random");
        lib.functions(random, &["random", "uniform", "gauss"], &t_float);
        lib.functions(random, &["randint", "randrange", "getrandbits"], &t_int);
        lib.functions(random, &["seed", "shuffle"], &t_none);
        lib.functions(random, &["choice", "sample", "choices"], &Type::Unknown);

        let (_, string) = lib.module("string");
        for name in [
            "ascii_letters", "ascii_lowercase", "ascii_uppercase", "digits", "hexdigits",
            "octdigits", "punctuation", "printable", "whitespace",
        ] {
            lib.constant(string, name, &t_str);
        }

        let (_, collections) = lib.module("collections");
        for name in ["OrderedDict", "defaultdict", "Counter"] {
            lib.class(collections, name, &[b(dict)], None);
        }
        lib.class(collections, "deque", &[b(list)], None);
        lib.functions(collections, &["namedtuple"], &Type::Unknown);

        let (_, itertools) = lib.module("itertools");
        lib.functions(
            itertools,
            &[
                "chain", "count", "cycle", "repeat", "product", "permutations", "combinations",
                "groupby", "islice", "zip_longest", "accumulate",
            ],
            &Type::Unknown,
        );

        let (_, functools) = lib.module("functools");
        lib.functions(
            functools,
            &["reduce", "partial", "wraps", "lru_cache", "cache", "total_ordering"],
            &Type::Unknown,
        );

        let (_, typing) = lib.module("typing");
        for name in [
            "Any", "List", "Dict", "Set", "Tuple", "Optional", "Union", "Callable", "Iterable",
            "Iterator", "Sequence", "Mapping", "Type", "TypeVar", "Generic", "NamedTuple",
        ] {
            lib.constant(typing, name, &Type::Unknown);
        }

        let modules = std::mem::take(&mut lib.modules);
        Self {
            object,
            bool_,
            int,
            float,
            complex,
            str_,
            bytes,
            none,
            list,
            tuple,
            dict,
            set,
            range,
            generator,
            file,
            modules,
        }
    }

    /// Class modelling the methods of a primitive
    pub fn prim_class(&self, prim: Prim) -> ClassId {
        match prim {
            Prim::Bool => self.bool_,
            Prim::Int => self.int,
            Prim::Float => self.float,
            Prim::Complex => self.complex,
            Prim::Str => self.str_,
            Prim::Bytes => self.bytes,
            Prim::None => self.none,
        }
    }

    /// Library module by dotted name
    pub fn module(&self, qname: &str) -> Option<ModuleId> {
        self.modules.get(qname).copied()
    }
}

/// Writes library definitions into the arenas
struct Library<'a> {
    scopes: &'a mut ScopeTable,
    types: &'a mut TypeStore,
    modules: HashMap<String, ModuleId>,
}

impl Library<'_> {
    fn location(&self, scope: ScopeId, name: &str) -> Span {
        let path = self.scopes.extend_path(scope, name);
        if path.contains('.') {
            Span::library(&path)
        } else {
            Span::library(&format!("builtins.{}", path))
        }
    }

    fn bind(&mut self, scope: ScopeId, name: &str, ty: Type, kind: BindingKind) {
        let node = self.location(scope, name);
        self.scopes.insert(scope, name, node, ty, kind);
    }

    fn class(&mut self, scope: ScopeId, name: &str, bases: &[Type], prim: Option<Prim>) -> ClassId {
        let qname = self.scopes.extend_path(scope, name);
        let body = self.scopes.new_scope(ScopeKind::Class, scope, qname.clone());
        let id = self.types.add_class(ClassType {
            name: name.to_string(),
            qname,
            scope: body,
            bases: bases.to_vec(),
            prim,
            builtin: true,
            node: None,
        });
        self.scopes.set_class(body, id);
        self.bind(scope, name, Type::Class(id), BindingKind::Class);
        id
    }

    fn native(&mut self, scope: ScopeId, name: &str, ret: NativeReturn, owner: Option<ClassId>) {
        let fun = self.types.add_fun(FunType {
            name: name.to_string(),
            qname: self.scopes.extend_path(scope, name),
            body: FunBody::Native(ret),
            closure: scope,
            owner,
            method: MethodKind::Instance,
            self_type: None,
            defaults: Vec::new(),
            called: true,
            arrows: HashMap::new(),
        });
        self.bind(scope, name, Type::Function(fun), BindingKind::Function);
    }

    fn functions(&mut self, scope: ScopeId, names: &[&str], ret: &Type) {
        for name in names {
            self.native(scope, name, NativeReturn::Fixed(ret.clone()), None);
        }
    }

    fn passthrough(&mut self, scope: ScopeId, name: &str) {
        self.native(scope, name, NativeReturn::FirstArgument, None);
    }

    fn methods(&mut self, class: ClassId, names: &[&str], ret: &Type) {
        let scope = self.types.class(class).scope;
        for name in names {
            self.native(scope, name, NativeReturn::Fixed(ret.clone()), Some(class));
        }
    }

    fn attribute(&mut self, class: ClassId, name: &str, ty: &Type) {
        let scope = self.types.class(class).scope;
        self.bind(scope, name, ty.clone(), BindingKind::Attribute);
    }

    fn constant(&mut self, scope: ScopeId, name: &str, ty: &Type) {
        self.bind(scope, name, ty.clone(), BindingKind::Variable);
    }

    fn module(&mut self, qname: &str) -> (ModuleId, ScopeId) {
        let scope = self
            .scopes
            .new_scope(ScopeKind::Module, ScopeId::GLOBAL, qname.to_string());
        let id = self.types.add_module(ModuleType {
            name: qname.to_string(),
            qname: qname.to_string(),
            file: None,
            scope,
        });
        self.modules.insert(qname.to_string(), id);
        (id, scope)
    }

    fn submodule(&mut self, scope: ScopeId, name: &str, module: ModuleId) {
        self.bind(scope, name, Type::Module(module), BindingKind::Module);
    }
}

#[cfg(test)]
#[path = "builtins_tests.rs"]
mod tests;
