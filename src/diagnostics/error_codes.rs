//! Diagnostic code definitions

/// Syntax/parsing errors (E0xxx)
pub mod syntax {
    pub const UNEXPECTED_TOKEN: &str = "E0001";
    pub const UNTERMINATED_STRING: &str = "E0002";
    pub const UNEXPECTED_INDENT: &str = "E0003";
    pub const INCONSISTENT_DEDENT: &str = "E0004";
    pub const INVALID_TARGET: &str = "E0005";
    pub const UNEXPECTED_EOF: &str = "E0008";
    pub const UNREADABLE_FILE: &str = "E0100";
}

/// Inference errors (E1xxx)
pub mod inference {
    pub const UNRESOLVED_NAME: &str = "E1002";
    pub const MODULE_NOT_FOUND: &str = "E1003";
    pub const IMPORT_NAME_NOT_FOUND: &str = "E1004";
    pub const MALFORMED_NODE: &str = "E1020";
}

/// Warnings (W0xxx)
pub mod warnings {
    pub const UNUSED_VARIABLE: &str = "W0001";
}
