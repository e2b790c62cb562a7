use crate::naming::convert_to_camel_case;
use crate::packages::{file_imports, list_go_files, PackageLocator};
use crate::params::{ParameterDeclaration, ParameterKind};
use crate::parser::{ParsedFile, SourceCache};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

static TYPE_SPEC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)(?:\[[^\]]*\])?\s+(?:=\s*)?(\S.*)$").unwrap());

static NESTED_STRUCT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s+((?:\[\])*\*?)struct\s*\{$").unwrap());

static EMBEDDED_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\*?[A-Za-z_][\w.]*)\s*(`[^`]*`)?$").unwrap());

static FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s+([^`]+?)\s*(`[^`]*`)?$").unwrap()
});

static JSON_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"json:"([^"]*)""#).unwrap());

static FIXED_ARRAY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[^\]]+\]").unwrap());

static GENERIC_ARGS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]$").unwrap());

/// Type inferred for a declared parameter or a struct field.
///
/// A resolved composite has children and no schema type; a primitive has a schema type
/// and no children. Neither means the type could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredType {
    /// Parameter name, or the field's JSON name
    pub name: String,
    /// `string`, `number`, `boolean`, `object` or `file`
    pub schema_type: Option<String>,
    pub is_array: bool,
    /// Fields of a composite, in declaration order
    pub children: Vec<InferredType>,
    pub required: bool,
}

impl InferredType {
    fn unresolved() -> Self {
        Self {
            name: String::new(),
            schema_type: None,
            is_array: false,
            children: Vec::new(),
            required: true,
        }
    }

    fn primitive(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::unresolved()
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.schema_type.is_none() && self.children.is_empty()
    }

    fn named(mut self, name: &str, required: bool) -> Self {
        self.name = name.to_string();
        self.required = required;
        self
    }
}

/// Handler body a declaration was found in.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub file: Rc<ParsedFile>,
    /// Directory of the handler's package
    pub package_dir: PathBuf,
    /// First body line (0-based)
    pub start_line: usize,
    /// Closing `}` line (0-based, exclusive)
    pub end_line: usize,
}

/// Struct field as written in source, before its type is resolved.
#[derive(Debug, Clone)]
struct RawField {
    names: Vec<String>,
    type_token: String,
    tag: Option<String>,
    embedded: bool,
    /// Fields of an anonymous struct type
    nested: Option<Vec<RawField>>,
}

#[derive(Debug, Clone)]
enum TypeDefinition {
    Struct(Vec<RawField>),
    Interface,
    /// `type X Y` or `type X = Y`
    Named(String),
}

/// Where a type token appears, for resolving unqualified names and import aliases.
#[derive(Debug, Clone)]
struct Scope {
    file: Rc<ParsedFile>,
    package_dir: PathBuf,
}

#[derive(Debug, Default)]
struct JsonTag {
    name: Option<String>,
    skip: bool,
    omitempty: bool,
}

/// Type resolver - infers the types of handler parameters and expands composite types
/// into their fields, following definitions across files and packages.
///
/// Resolution never fails: anything that cannot be found becomes an unresolved leaf and
/// the rest of the tree is still built.
///
/// # Example
///
/// ```no_run
/// use swagger_from_source::packages::ChainedLocator;
/// use swagger_from_source::parser::SourceCache;
/// use swagger_from_source::type_resolver::{HandlerContext, TypeResolver};
/// use std::path::{Path, PathBuf};
/// use std::rc::Rc;
///
/// let mut cache = SourceCache::new();
/// let file = cache.load(Path::new("handlers/stories.go")).unwrap();
/// let mut resolver = TypeResolver::new(Rc::new(ChainedLocator::for_project(Path::new("."))));
/// let context = HandlerContext {
///     file,
///     package_dir: PathBuf::from("handlers"),
///     start_line: 10,
///     end_line: 30,
/// };
/// let story = resolver.resolve_local("story", &context, &mut cache);
/// println!("story has {} fields", story.children.len());
/// ```
pub struct TypeResolver {
    packages: Rc<dyn PackageLocator>,
    /// Fully resolved named types, keyed by package directory and type name
    type_cache: HashMap<(PathBuf, String), InferredType>,
    /// Named types on the current resolution path
    resolving_stack: Vec<(PathBuf, String)>,
    /// Number of times a cycle was cut; results built while it grows are not cached
    cycle_hits: usize,
    imports_cache: HashMap<PathBuf, Rc<HashMap<String, String>>>,
}

impl TypeResolver {
    pub fn new(packages: Rc<dyn PackageLocator>) -> Self {
        Self {
            packages,
            type_cache: HashMap::new(),
            resolving_stack: Vec::new(),
            cycle_hits: 0,
            imports_cache: HashMap::new(),
        }
    }

    /// Package directory for a handler: the directory its import path maps to, or the
    /// directory of its file.
    pub fn package_dir_for(&self, package_path: &str, file: &Path) -> PathBuf {
        self.packages
            .package_dir(package_path)
            .or_else(|| file.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Infers the type of one parameter declaration.
    ///
    /// Form files are `file` and form values are `string`. Everything else is looked up
    /// in the handler body; without a local declaration the value is taken as a `string`.
    pub fn resolve_declaration(
        &mut self,
        declaration: &ParameterDeclaration,
        context: &HandlerContext,
        cache: &mut SourceCache,
    ) -> InferredType {
        let required = declaration.kind != ParameterKind::Query;
        let inferred = match declaration.kind {
            ParameterKind::FormFile => InferredType::primitive("file"),
            ParameterKind::FormValue => InferredType::primitive("string"),
            _ => self.resolve_local(&declaration.name, context, cache),
        };
        inferred.named(&declaration.name, required)
    }

    /// Resolves a variable declared inside the handler body.
    pub fn resolve_local(
        &mut self,
        name: &str,
        context: &HandlerContext,
        cache: &mut SourceCache,
    ) -> InferredType {
        let token = Self::find_local_type(
            &context.file.lines,
            context.start_line,
            context.end_line,
            name,
        );

        match token {
            Some(token) => {
                debug!("Local type of {}: {}", name, token);
                let scope = Scope {
                    file: Rc::clone(&context.file),
                    package_dir: context.package_dir.clone(),
                };
                self.resolve_token(&token, &scope, cache)
            }
            None => {
                debug!("No local type for {}, defaulting to string", name);
                InferredType::primitive("string")
            }
        }
    }

    /// Resolves a type token (`[]*transport.Story`, `int64`, `Inner`) as written in `file`.
    pub fn resolve_type(
        &mut self,
        token: &str,
        file: Rc<ParsedFile>,
        package_dir: &Path,
        cache: &mut SourceCache,
    ) -> InferredType {
        let scope = Scope {
            file,
            package_dir: package_dir.to_path_buf(),
        };
        self.resolve_token(token, &scope, cache)
    }

    /// Searches lines `start..end` for the type of variable `name`.
    ///
    /// Recognizes `var name T`, `name := T{` (also `&T{` and `new(T)`) and strconv
    /// conversions bound to the name, matched case-insensitively in camel case so that
    /// `storyID, err := strconv.ParseInt(` types the parameter `storyId`.
    pub fn find_local_type(lines: &[String], start: usize, end: usize, name: &str) -> Option<String> {
        let escaped = regex::escape(name);
        let camel = if name.contains('_') {
            regex::escape(&convert_to_camel_case(name))
        } else {
            escaped.clone()
        };

        let var_regex = Regex::new(&format!(r"\bvar\s+{}\s+([^=\s][^=]*?)\s*(?:=|$)", escaped)).ok()?;
        let literal_regex =
            Regex::new(&format!(r"\b{}\s*:?=\s*&?([\w.\[\]*]+)\s*\{{", escaped)).ok()?;
        let new_regex = Regex::new(&format!(r"\b{}\s*:?=\s*new\(\s*([\w.\[\]*]+)\s*\)", escaped)).ok()?;
        let strconv_regex = Regex::new(&format!(
            r"(?i)\b{}\w*(?:\s*,\s*\w+)*\s*:?=\s*strconv\.(parse[a-z]+|atoi)\(",
            camel
        ))
        .ok()?;

        let end = end.min(lines.len());
        for line in lines.get(start..end)? {
            for regex in [&var_regex, &literal_regex, &new_regex] {
                if let Some(caps) = regex.captures(line) {
                    return Some(caps[1].trim().to_string());
                }
            }
            if let Some(caps) = strconv_regex.captures(line) {
                return Some(Self::strconv_target(&caps[1]).to_string());
            }
        }
        None
    }

    /// Go type produced by a strconv function (`ParseInt` yields `int`).
    fn strconv_target(function: &str) -> &'static str {
        let target = function.to_lowercase();
        match target.trim_start_matches("parse") {
            "atoi" | "int" => "int",
            "uint" => "uint",
            "float" => "float64",
            "complex" => "complex128",
            "bool" => "bool",
            _ => "string",
        }
    }

    /// Maps a Go primitive type to its schema type.
    pub fn primitive_type(token: &str) -> Option<&'static str> {
        match token {
            "bool" => Some("boolean"),
            "string" => Some("string"),
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
            | "uint32" | "uint64" | "uintptr" | "byte" | "rune" | "float32" | "float64"
            | "complex64" | "complex128" => Some("number"),
            _ => None,
        }
    }

    /// Schema type of well-known types from outside the project.
    fn external_type(token: &str) -> Option<&'static str> {
        match token {
            "time.Time" | "uuid.UUID" => Some("string"),
            "time.Duration" => Some("number"),
            "json.RawMessage" => Some("object"),
            _ => None,
        }
    }

    fn resolve_token(&mut self, token: &str, scope: &Scope, cache: &mut SourceCache) -> InferredType {
        let mut rest = token.trim();
        let mut is_array = false;

        loop {
            if let Some(inner) = rest.strip_prefix("[]") {
                is_array = true;
                rest = inner.trim_start();
            } else if let Some(m) = FIXED_ARRAY_REGEX.find(rest) {
                is_array = true;
                rest = rest[m.end()..].trim_start();
            } else if let Some(inner) = rest.strip_prefix('*') {
                rest = inner.trim_start();
            } else {
                break;
            }
        }

        let mut inferred = self.resolve_base(rest, scope, cache);
        inferred.is_array |= is_array;
        inferred
    }

    fn resolve_base(&mut self, token: &str, scope: &Scope, cache: &mut SourceCache) -> InferredType {
        if let Some(schema_type) = Self::primitive_type(token).or_else(|| Self::external_type(token)) {
            return InferredType::primitive(schema_type);
        }
        if token.starts_with("map[")
            || token.starts_with("interface")
            || token.starts_with("struct")
            || token == "any"
        {
            return InferredType::primitive("object");
        }
        if token.starts_with("chan") || token.starts_with("<-") || token.starts_with("func") {
            debug!("Type {} has no schema", token);
            return InferredType::unresolved();
        }

        let token = GENERIC_ARGS_REGEX.replace(token, "");
        match token.split_once('.') {
            Some((alias, name)) => {
                let imports = self.imports_for(&scope.file);
                let package_dir = imports
                    .get(alias)
                    .and_then(|import_path| self.packages.package_dir(import_path));
                match package_dir {
                    Some(dir) => self.resolve_named(&dir, name, cache),
                    None => {
                        warn!("Could not locate package {} for type {}", alias, token);
                        InferredType::unresolved()
                    }
                }
            }
            None => {
                let dir = scope.package_dir.clone();
                self.resolve_named(&dir, &token, cache)
            }
        }
    }

    fn resolve_named(&mut self, dir: &Path, name: &str, cache: &mut SourceCache) -> InferredType {
        let key = (fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()), name.to_string());

        if let Some(cached) = self.type_cache.get(&key) {
            debug!("Type {} found in cache", name);
            return cached.clone();
        }

        if self.resolving_stack.contains(&key) {
            warn!("Circular reference detected for type: {}", name);
            self.cycle_hits += 1;
            return InferredType::unresolved();
        }

        let cycle_hits_before = self.cycle_hits;
        self.resolving_stack.push(key.clone());

        let resolved = match self.find_type_definition(&key.0, name, cache) {
            Some((file, definition)) => {
                let scope = Scope {
                    file,
                    package_dir: key.0.clone(),
                };
                self.materialize(definition, &scope, cache)
            }
            None => {
                warn!("Could not resolve type {} in {}", name, key.0.display());
                InferredType::unresolved()
            }
        };

        self.resolving_stack.pop();
        if self.cycle_hits == cycle_hits_before {
            self.type_cache.insert(key, resolved.clone());
        }
        resolved
    }

    fn materialize(
        &mut self,
        definition: TypeDefinition,
        scope: &Scope,
        cache: &mut SourceCache,
    ) -> InferredType {
        match definition {
            TypeDefinition::Struct(fields) => InferredType {
                children: self.resolve_fields(&fields, scope, cache),
                ..InferredType::unresolved()
            },
            TypeDefinition::Interface => InferredType::primitive("object"),
            TypeDefinition::Named(underlying) => self.resolve_token(&underlying, scope, cache),
        }
    }

    fn resolve_fields(
        &mut self,
        fields: &[RawField],
        scope: &Scope,
        cache: &mut SourceCache,
    ) -> Vec<InferredType> {
        let mut resolved = Vec::new();

        for field in fields {
            let tag = field.tag.as_deref().map(Self::parse_json_tag).unwrap_or_default();
            if tag.skip {
                continue;
            }

            if field.embedded && tag.name.is_none() {
                let embedded = self.resolve_token(&field.type_token, scope, cache);
                if !embedded.children.is_empty() && !embedded.is_array {
                    resolved.extend(embedded.children);
                    continue;
                }
            }

            let is_pointer = field.type_token.starts_with('*');
            let required = !tag.omitempty && !is_pointer;

            for name in &field.names {
                if !field.embedded && !name.starts_with(|c: char| c.is_uppercase()) {
                    continue;
                }

                let inferred = match &field.nested {
                    Some(nested) => InferredType {
                        is_array: field.type_token.starts_with("[]"),
                        children: self.resolve_fields(nested, scope, cache),
                        ..InferredType::unresolved()
                    },
                    None => self.resolve_token(&field.type_token, scope, cache),
                };
                let display = tag.name.as_deref().unwrap_or(name);
                resolved.push(inferred.named(display, required));
            }
        }

        resolved
    }

    fn parse_json_tag(tag: &str) -> JsonTag {
        let Some(caps) = JSON_TAG_REGEX.captures(tag) else {
            return JsonTag::default();
        };
        let mut parts = caps[1].split(',');
        let name = parts.next().unwrap_or("");
        let options: Vec<&str> = parts.collect();

        JsonTag {
            skip: name == "-" && options.is_empty(),
            name: (!name.is_empty()).then(|| name.to_string()),
            omitempty: options.contains(&"omitempty"),
        }
    }

    fn imports_for(&mut self, file: &ParsedFile) -> Rc<HashMap<String, String>> {
        Rc::clone(
            self.imports_cache
                .entry(file.path.clone())
                .or_insert_with(|| Rc::new(file_imports(&file.lines))),
        )
    }

    /// Finds the declaration of type `name` among the Go files of `dir`.
    fn find_type_definition(
        &self,
        dir: &Path,
        name: &str,
        cache: &mut SourceCache,
    ) -> Option<(Rc<ParsedFile>, TypeDefinition)> {
        let files = match list_go_files(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list package {}: {}", dir.display(), e);
                return None;
            }
        };

        for file in files {
            let Ok(parsed) = cache.load(&file) else {
                continue;
            };
            if let Some(definition) = Self::definition_in(&parsed.lines, name) {
                debug!("Found type {} in {}", name, parsed.path.display());
                return Some((parsed, definition));
            }
        }
        None
    }

    /// Finds a top-level declaration of `name`, either standalone or in a `type ( ... )`
    /// group. Declarations inside function bodies are ignored.
    fn definition_in(lines: &[String], name: &str) -> Option<TypeDefinition> {
        let mut depth: i32 = 0;
        let mut in_group = false;

        for (index, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if depth == 0 {
                if trimmed == "type (" || trimmed == "type(" {
                    in_group = true;
                    continue;
                }
                if in_group && trimmed == ")" {
                    in_group = false;
                    continue;
                }

                let spec = if in_group {
                    Some(trimmed)
                } else {
                    trimmed.strip_prefix("type ").map(str::trim_start)
                };
                if let Some(caps) = spec.and_then(|spec| TYPE_SPEC_REGEX.captures(spec)) {
                    if &caps[1] == name {
                        return Some(Self::definition_at(lines, index, &caps[2]));
                    }
                }
            }

            depth = (depth + brace_delta(line)).max(0);
        }
        None
    }

    fn definition_at(lines: &[String], index: usize, rest: &str) -> TypeDefinition {
        let rest = rest.trim();
        if let Some(body) = rest.strip_prefix("struct") {
            let body = body.trim_start();
            if body.starts_with('{') && body.ends_with('}') {
                return TypeDefinition::Struct(Vec::new());
            }
            let (fields, _) = Self::parse_fields(lines, index + 1);
            TypeDefinition::Struct(fields)
        } else if rest.starts_with("interface") {
            TypeDefinition::Interface
        } else {
            TypeDefinition::Named(rest.to_string())
        }
    }

    /// Reads struct fields from `start` up to the closing brace line, returning the
    /// fields and the index of that line.
    fn parse_fields(lines: &[String], start: usize) -> (Vec<RawField>, usize) {
        let mut fields = Vec::new();
        let mut index = start;

        while index < lines.len() {
            let trimmed = lines[index].trim();
            if trimmed.starts_with('}') {
                return (fields, index);
            }
            index += 1;
            if trimmed.is_empty() {
                continue;
            }

            if let Some(caps) = NESTED_STRUCT_REGEX.captures(trimmed) {
                let (nested, end) = Self::parse_fields(lines, index);
                let tag = lines
                    .get(end)
                    .and_then(|line| line.find('`').map(|i| line[i..].to_string()));
                fields.push(RawField {
                    names: vec![caps[1].to_string()],
                    type_token: format!("{}struct", &caps[2]),
                    tag,
                    embedded: false,
                    nested: Some(nested),
                });
                index = end + 1;
            } else if let Some(caps) = EMBEDDED_FIELD_REGEX.captures(trimmed) {
                let type_token = caps[1].to_string();
                let name = type_token
                    .trim_start_matches('*')
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                fields.push(RawField {
                    names: vec![name],
                    type_token,
                    tag: caps.get(2).map(|m| m.as_str().to_string()),
                    embedded: true,
                    nested: None,
                });
            } else if let Some(caps) = FIELD_REGEX.captures(trimmed) {
                fields.push(RawField {
                    names: caps[1].split(',').map(|n| n.trim().to_string()).collect(),
                    type_token: caps[2].trim().to_string(),
                    tag: caps.get(3).map(|m| m.as_str().to_string()),
                    embedded: false,
                    nested: None,
                });
            } else {
                debug!("Unrecognized struct field line: {}", trimmed);
            }
        }

        (fields, index)
    }
}

/// Net change in brace depth over a stripped line, ignoring braces in literals.
fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in line.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q != '`' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '{' => delta += 1,
                '}' => delta -= 1,
                _ => {}
            },
        }
    }
    delta
}
