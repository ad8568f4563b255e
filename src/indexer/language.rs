//! Language registry: grammars, chunk queries and file extensions
//!
//! The registry is an explicit, immutable table built once and handed to the
//! [`ChunkExtractor`](super::ChunkExtractor). Supporting a new language means adding
//! an entry here; the extraction logic never changes.

use crate::types::ChunkKind;
use tree_sitter::Language;

/// A syntax node kind that opens a class scope, and the field holding its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassScope {
    pub kind: &'static str,
    pub name_field: &'static str,
}

/// Grammar, queries and extensions for one language
#[derive(Clone)]
pub struct LanguageConfig {
    /// Canonical language name written into chunk metadata
    pub name: &'static str,
    pub language: Language,
    /// Extensions claimed by this language, with the leading dot
    pub extensions: &'static [&'static str],
    /// One query per chunk category, run in this order
    pub queries: Vec<(ChunkKind, &'static str)>,
    /// Node kinds whose descendants are methods rather than functions
    pub class_scopes: &'static [ClassScope],
}

impl LanguageConfig {
    /// Check whether this language claims the given file path
    pub fn matches_path(&self, file_path: &str) -> bool {
        self.extensions.iter().any(|ext| file_path.ends_with(ext))
    }

    /// Find the class scope definition for a node kind, if it is one
    pub fn class_scope(&self, kind: &str) -> Option<&ClassScope> {
        self.class_scopes.iter().find(|scope| scope.kind == kind)
    }
}

impl std::fmt::Debug for LanguageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageConfig")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field(
                "queries",
                &self.queries.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Immutable lookup table of supported languages
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

impl LanguageRegistry {
    pub fn new(languages: Vec<LanguageConfig>) -> Self {
        Self { languages }
    }

    /// Registry with every language shipped with the crate
    pub fn builtin() -> Self {
        Self::new(vec![
            python_config(),
            go_config(),
            javascript_config(),
            typescript_config(),
            tsx_config(),
            rust_config(),
        ])
    }

    /// Find the language claiming a file path by its suffix
    pub fn detect(&self, file_path: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|config| config.matches_path(file_path))
    }

    pub fn languages(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// All registered extensions, without the leading dot
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .languages
            .iter()
            .flat_map(|config| config.extensions.iter())
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

const PYTHON_CLASS_SCOPES: &[ClassScope] = &[ClassScope {
    kind: "class_definition",
    name_field: "name",
}];

const JS_CLASS_SCOPES: &[ClassScope] = &[
    ClassScope {
        kind: "class_declaration",
        name_field: "name",
    },
    ClassScope {
        kind: "class",
        name_field: "name",
    },
    ClassScope {
        kind: "abstract_class_declaration",
        name_field: "name",
    },
];

const RUST_CLASS_SCOPES: &[ClassScope] = &[
    ClassScope {
        kind: "impl_item",
        name_field: "type",
    },
    ClassScope {
        kind: "trait_item",
        name_field: "name",
    },
];

fn python_config() -> LanguageConfig {
    LanguageConfig {
        name: "python",
        language: tree_sitter_python::LANGUAGE.into(),
        extensions: &[".py"],
        queries: vec![
            (
                ChunkKind::Functions,
                r#"
(function_definition
  name: (identifier) @function.name
  parameters: (parameters) @function.params
  body: (block) @function.body) @function.definition
"#,
            ),
            (
                ChunkKind::Classes,
                r#"
(class_definition
  name: (identifier) @class.name
  body: (block) @class.body) @class.definition
"#,
            ),
            (
                ChunkKind::Variables,
                r#"
(assignment
  left: (identifier) @variable.name
  right: (_) @variable.value) @variable.assignment
"#,
            ),
            (
                ChunkKind::Imports,
                r#"
(import_statement) @import
(import_from_statement) @import
"#,
            ),
        ],
        class_scopes: PYTHON_CLASS_SCOPES,
    }
}

fn go_config() -> LanguageConfig {
    LanguageConfig {
        name: "go",
        language: tree_sitter_go::LANGUAGE.into(),
        extensions: &[".go"],
        queries: vec![
            (
                ChunkKind::Functions,
                r#"
(function_declaration
  name: (identifier) @function.name
  body: (block) @function.body) @function.definition

(method_declaration
  name: (field_identifier) @method.name
  body: (block) @method.body) @method.definition
"#,
            ),
            (
                ChunkKind::Types,
                r#"
(type_declaration
  (type_spec
    name: (type_identifier) @type.name
    type: (_) @type.value)) @type.declaration
"#,
            ),
            (
                ChunkKind::Variables,
                r#"
(var_declaration
  (var_spec
    name: (identifier) @variable.name)) @variable.declaration
"#,
            ),
            (
                ChunkKind::Constants,
                r#"
(const_declaration
  (const_spec
    name: (identifier) @constant.name)) @constant.declaration
"#,
            ),
            (
                ChunkKind::Imports,
                r#"
(import_declaration) @import
"#,
            ),
        ],
        class_scopes: &[],
    }
}

const JS_FUNCTIONS_QUERY: &str = r#"
(function_declaration
  name: (identifier) @function.name
  body: (statement_block) @function.body) @function.definition

(generator_function_declaration
  name: (identifier) @function.name) @function.definition

(method_definition
  name: (_) @function.name
  body: (statement_block) @function.body) @function.definition

(arrow_function
  body: (_) @function.body) @function.definition
"#;

const JS_CLASSES_QUERY: &str = r#"
(class_declaration
  name: (_) @class.name
  body: (class_body) @class.body) @class.definition
"#;

const JS_VARIABLES_QUERY: &str = r#"
(lexical_declaration
  (variable_declarator
    name: (identifier) @variable.name)) @variable.declaration

(variable_declaration
  (variable_declarator
    name: (identifier) @variable.name)) @variable.declaration
"#;

const JS_IMPORTS_QUERY: &str = r#"
(import_statement) @import
"#;

fn javascript_config() -> LanguageConfig {
    LanguageConfig {
        name: "javascript",
        language: tree_sitter_javascript::LANGUAGE.into(),
        extensions: &[".js", ".mjs", ".cjs", ".jsx"],
        queries: vec![
            (ChunkKind::Functions, JS_FUNCTIONS_QUERY),
            (ChunkKind::Classes, JS_CLASSES_QUERY),
            (ChunkKind::Variables, JS_VARIABLES_QUERY),
            (ChunkKind::Imports, JS_IMPORTS_QUERY),
        ],
        class_scopes: JS_CLASS_SCOPES,
    }
}

fn typescript_queries() -> Vec<(ChunkKind, &'static str)> {
    vec![
        (ChunkKind::Functions, JS_FUNCTIONS_QUERY),
        (
            ChunkKind::Classes,
            r#"
(class_declaration
  name: (_) @class.name
  body: (class_body) @class.body) @class.definition

(abstract_class_declaration
  name: (_) @class.name
  body: (class_body) @class.body) @class.definition
"#,
        ),
        (
            ChunkKind::Interfaces,
            r#"
(interface_declaration
  name: (type_identifier) @interface.name) @interface.definition
"#,
        ),
        (
            ChunkKind::Types,
            r#"
(type_alias_declaration
  name: (type_identifier) @type.name
  value: (_) @type.value) @type.declaration
"#,
        ),
        (ChunkKind::Variables, JS_VARIABLES_QUERY),
        (ChunkKind::Imports, JS_IMPORTS_QUERY),
    ]
}

fn typescript_config() -> LanguageConfig {
    LanguageConfig {
        name: "typescript",
        language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        extensions: &[".ts"],
        queries: typescript_queries(),
        class_scopes: JS_CLASS_SCOPES,
    }
}

/// TSX shares the TypeScript queries and language name, with its own grammar
fn tsx_config() -> LanguageConfig {
    LanguageConfig {
        name: "typescript",
        language: tree_sitter_typescript::LANGUAGE_TSX.into(),
        extensions: &[".tsx"],
        queries: typescript_queries(),
        class_scopes: JS_CLASS_SCOPES,
    }
}

fn rust_config() -> LanguageConfig {
    LanguageConfig {
        name: "rust",
        language: tree_sitter_rust::LANGUAGE.into(),
        extensions: &[".rs"],
        queries: vec![
            (
                ChunkKind::Functions,
                r#"
(function_item
  name: (identifier) @function.name
  parameters: (parameters) @function.params
  body: (block) @function.body) @function.definition
"#,
            ),
            (
                ChunkKind::Structs,
                r#"
(struct_item
  name: (type_identifier) @struct.name) @struct.definition
"#,
            ),
            (
                ChunkKind::Enums,
                r#"
(enum_item
  name: (type_identifier) @enum.name
  body: (enum_variant_list) @enum.body) @enum.definition
"#,
            ),
            (
                ChunkKind::Impls,
                r#"
(impl_item
  type: (_) @impl.name
  body: (declaration_list) @impl.body) @impl.definition
"#,
            ),
            (
                ChunkKind::Traits,
                r#"
(trait_item
  name: (type_identifier) @trait.name
  body: (declaration_list) @trait.body) @trait.definition
"#,
            ),
            (
                ChunkKind::Types,
                r#"
(type_item
  name: (type_identifier) @type.name) @type.definition
"#,
            ),
            (
                ChunkKind::Constants,
                r#"
(const_item
  name: (identifier) @constant.name
  type: (_) @constant.type) @constant.definition
"#,
            ),
            (
                ChunkKind::Statics,
                r#"
(static_item
  name: (identifier) @static.name
  type: (_) @static.type) @static.definition
"#,
            ),
            (
                ChunkKind::Imports,
                r#"
(use_declaration) @import
"#,
            ),
        ],
        class_scopes: RUST_CLASS_SCOPES,
    }
}
