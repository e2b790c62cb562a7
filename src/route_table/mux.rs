use super::{HandlerRef, RouteEntry, RouteTable, SymbolRef};
use crate::error::{Error, Result};
use crate::locator::find_function;
use crate::packages::{file_imports, list_go_files, PackageLocator};
use crate::parser::{ParsedFile, SourceCache};
use crate::scanner::FileScanner;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

static PACKAGE_CLAUSE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^package\s+([A-Za-z_]\w*)").unwrap());

static ASSIGNMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:var\s+)?([A-Za-z_][\w.]*)\s*:?=\s*(.+)$").unwrap());

static PATH_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.PathPrefix\(\s*(?:"([^"]*)"|`([^`]*)`)\s*\)"#).unwrap());

static PATH_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.(?:HandleFunc|Handle|Path)\(\s*(?:"([^"]*)"|`([^`]*)`)"#).unwrap()
});

static METHODS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.Methods\(([^)]*)\)").unwrap());

static REGISTRATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(HandleFunc|Handle|HandlerFunc|Handler)\(").unwrap());

static IDENTIFIER_CHAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*$").unwrap());

static RESULT_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\(?\s*\*?(?:([A-Za-z_]\w*)\.)?([A-Za-z_]\w*)").unwrap()
});

/// `T` or `alias.T`, capturing the alias and the name.
const QUALIFIED_TYPE: &str = r"(?:([A-Za-z_]\w*)\.)?([A-Za-z_]\w*)";

/// Route table built by reading gorilla/mux registrations out of the project sources.
///
/// Every non-test `.go` file under the root is scanned in path order, so routes come out
/// in a stable registration order. Recognized forms:
///
/// ```text
/// r.HandleFunc("/stories/{id}", h.GetStory).Methods("GET")
/// api := r.PathPrefix("/v1").Subrouter()
/// api.Path("/clients").HandlerFunc(ListClients).Methods(http.MethodGet)
/// r.Handle("/kit", kithttp.NewServer(makeCreateEndpoint(svc), decodeCreate, encode))
/// ```
///
/// Subrouter prefixes are tracked per file. Anonymous function handlers are skipped.
pub struct MuxSourceRouteTable {
    root: PathBuf,
    packages: Rc<dyn PackageLocator>,
}

/// How a variable or field holding a handler value got its type.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    /// The type is named directly: receivers, literals, `new(T)`, `var x T`, fields
    Type { alias: Option<String>, name: String },
    /// The value comes from a call such as `handlers.NewStoryHandler()`
    Call { alias: Option<String>, function: String },
}

/// Named type a method value is taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BoundType {
    /// Import path of the type's package
    package: String,
    name: String,
}

/// What is known about the file a registration appears in.
struct FileContext {
    parsed: Rc<ParsedFile>,
    imports: HashMap<String, String>,
    /// Import path of the file's package, or the bare package name if unknown
    package: String,
}

impl MuxSourceRouteTable {
    pub fn new(root: PathBuf, packages: Rc<dyn PackageLocator>) -> Self {
        Self { root, packages }
    }

    /// Registrations in one file, in source order.
    fn scan_file(&self, parsed: Rc<ParsedFile>, cache: &mut SourceCache) -> Vec<RouteEntry> {
        let ctx = self.file_context(parsed);
        let mut prefixes: HashMap<String, String> = HashMap::new();
        let mut entries = Vec::new();

        for statement in join_statements(&ctx.parsed.lines) {
            let statement = statement.strip_prefix("return ").unwrap_or(&statement);
            let (target, expr) = match ASSIGNMENT_REGEX.captures(statement) {
                Some(caps) => (Some(caps[1].to_string()), caps[2].trim().to_string()),
                None => (None, statement.to_string()),
            };

            let Some((receiver, chain)) = split_receiver(&expr) else {
                continue;
            };
            let root_segment = receiver.split('.').next().unwrap_or(receiver);
            if ctx.imports.contains_key(root_segment) {
                continue;
            }

            let prefix = format!(
                "{}{}",
                prefixes.get(receiver).map(String::as_str).unwrap_or(""),
                path_prefixes(chain)
            );

            if chain.ends_with(".Subrouter()") {
                if let Some(target) = target {
                    debug!("Subrouter {} mounted at {:?}", target, prefix);
                    prefixes.insert(target, prefix);
                }
                continue;
            }

            if let Some(entry) = self.registration(chain, &prefix, &ctx, cache) {
                debug!(
                    "Registration in {}: {:?} {:?}",
                    ctx.parsed.path.display(),
                    entry.methods,
                    entry.path
                );
                entries.push(entry);
            }
        }

        entries
    }

    fn file_context(&self, parsed: Rc<ParsedFile>) -> FileContext {
        let imports = file_imports(&parsed.lines);
        let package = parsed
            .path
            .parent()
            .and_then(|dir| self.packages.import_path_for(dir))
            .or_else(|| {
                parsed
                    .lines
                    .iter()
                    .find_map(|line| PACKAGE_CLAUSE_REGEX.captures(line))
                    .map(|caps| caps[1].to_string())
            })
            .unwrap_or_else(|| "main".to_string());

        FileContext {
            parsed,
            imports,
            package,
        }
    }

    /// Reads one route out of a call chain such as `.HandleFunc("/x", h).Methods("GET")`.
    fn registration(
        &self,
        chain: &str,
        prefix: &str,
        ctx: &FileContext,
        cache: &mut SourceCache,
    ) -> Option<RouteEntry> {
        let call = REGISTRATION_REGEX.captures(chain)?;
        let method_name = call.get(1)?.as_str();
        let open = call.get(0)?.end() - 1;
        let args = call_arguments(chain, open);
        let handler_arg = match method_name {
            "HandleFunc" | "Handle" => args.get(1),
            _ => args.first(),
        }?;

        let Some(handler) = self.handler_ref(handler_arg, ctx, cache) else {
            debug!("Skipping registration with unnamed handler: {}", handler_arg);
            return None;
        };

        let path = PATH_LITERAL_REGEX
            .captures(chain)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| combine_paths(prefix, m.as_str()));
        let methods = METHODS_REGEX
            .captures(chain)
            .map(|caps| parse_methods(&caps[1]))
            .filter(|methods| !methods.is_empty());

        Some(RouteEntry::new(path, methods, handler))
    }

    fn handler_ref(
        &self,
        expr: &str,
        ctx: &FileContext,
        cache: &mut SourceCache,
    ) -> Option<HandlerRef> {
        let expr = expr.trim().trim_start_matches('&');
        if expr.starts_with("func") && !IDENTIFIER_CHAIN_REGEX.is_match(expr) {
            return None;
        }

        let Some(open) = expr.find('(') else {
            return IDENTIFIER_CHAIN_REGEX
                .is_match(expr)
                .then(|| HandlerRef::Func(self.qualify(expr, ctx, cache)));
        };

        let callee = expr[..open].trim();
        if !IDENTIFIER_CHAIN_REGEX.is_match(callee) {
            return None;
        }
        let args = call_arguments(expr, open);

        match callee.rsplit('.').next().unwrap_or(callee) {
            "HandlerFunc" => args.first().and_then(|arg| self.handler_ref(arg, ctx, cache)),
            "NewServer" => {
                let endpoint = call_target(args.first()?)?;
                let decoder = call_target(args.get(1)?)?;
                Some(HandlerRef::Kit {
                    decoder: self.qualify(decoder, ctx, cache),
                    endpoint: self.qualify(endpoint, ctx, cache),
                })
            }
            _ => Some(HandlerRef::Func(self.qualify(callee, ctx, cache))),
        }
    }

    /// Qualifies an identifier chain to `<import path>.<Name>`.
    ///
    /// `alias.Name` resolves through the file's imports. A method value such as
    /// `stories.Get` or `s.clients.Get` is qualified as `<import path>.(*T).Get` once the
    /// type behind its owner is known. Anything else is taken to live in the file's own
    /// package. Declarations found there attach their file to the symbol.
    fn qualify(&self, chain: &str, ctx: &FileContext, cache: &mut SourceCache) -> SymbolRef {
        let segments: Vec<&str> = chain.split('.').collect();
        let (name, owner) = match segments.split_last() {
            Some((name, owner)) => (*name, owner),
            None => (chain, &segments[..0]),
        };

        if let Some(import_path) = owner.first().and_then(|alias| ctx.imports.get(*alias)) {
            return SymbolRef::new(format!("{}.{}", import_path, name));
        }

        if !owner.is_empty() {
            match self.bound_type(owner, ctx, cache) {
                Some(bound) => {
                    debug!("{} is a method of {}.{}", chain, bound.package, bound.name);
                    let symbol = SymbolRef::method(&bound.package, &bound.name, name);
                    if bound.package != ctx.package {
                        return symbol;
                    }
                    let receiver = Some(bound.name.as_str());
                    return match find_in_package(&ctx.parsed, receiver, name, cache) {
                        Some(file) => symbol.with_file(file),
                        None => symbol,
                    };
                }
                None => debug!(
                    "No binding for {}, looking up {} by name",
                    owner.join("."),
                    name
                ),
            }
        }

        let symbol = SymbolRef::new(format!("{}.{}", ctx.package, name));
        match find_in_package(&ctx.parsed, None, name, cache) {
            Some(file) => symbol.with_file(file),
            None => symbol,
        }
    }

    /// Type behind the owner of a method value.
    ///
    /// A single identifier is looked up among the file's bindings. A field chain such as
    /// `s.clients` is looked up among the struct fields declared in the package.
    fn bound_type(
        &self,
        owner: &[&str],
        ctx: &FileContext,
        cache: &mut SourceCache,
    ) -> Option<BoundType> {
        match owner {
            [] => None,
            [variable] => {
                let binding = variable_binding(&ctx.parsed.lines, variable)?;
                self.binding_type(binding, ctx, cache)
            }
            [.., field] => {
                let (file, binding) = package_files(&ctx.parsed)
                    .iter()
                    .filter_map(|path| cache.load(path).ok())
                    .find_map(|file| field_binding(&file.lines, field).map(|b| (file, b)))?;
                let field_ctx = if same_file(&file.path, &ctx.parsed.path) {
                    None
                } else {
                    Some(self.file_context(file))
                };
                self.binding_type(binding, field_ctx.as_ref().unwrap_or(ctx), cache)
            }
        }
    }

    fn binding_type(
        &self,
        binding: Binding,
        ctx: &FileContext,
        cache: &mut SourceCache,
    ) -> Option<BoundType> {
        match binding {
            Binding::Type { alias, name } => Some(BoundType {
                package: package_of(alias.as_deref(), ctx)?,
                name,
            }),
            Binding::Call { alias, function } => {
                let package = package_of(alias.as_deref(), ctx)?;
                self.constructor_result(&package, &function, ctx, cache)
                    .or_else(|| {
                        let name = function.strip_prefix("New").filter(|n| !n.is_empty())?;
                        debug!("Assuming {} constructs {}", function, name);
                        Some(BoundType {
                            package: package.clone(),
                            name: name.to_string(),
                        })
                    })
            }
        }
    }

    /// Type returned by constructor `function` of `package`, read from its declaration.
    fn constructor_result(
        &self,
        package: &str,
        function: &str,
        ctx: &FileContext,
        cache: &mut SourceCache,
    ) -> Option<BoundType> {
        let files = if package == ctx.package {
            package_files(&ctx.parsed)
        } else {
            self.packages.source_files(package).ok()?
        };

        for path in &files {
            let Ok(file) = cache.load(path) else {
                continue;
            };
            let Some(index) = find_function(&file.lines, None, function) else {
                continue;
            };
            let (alias, name) = result_type(&file.lines[index], function)?;
            let package = match alias {
                Some(alias) => file_imports(&file.lines).get(&alias)?.clone(),
                None => package.to_string(),
            };
            return Some(BoundType { package, name });
        }
        None
    }
}

impl RouteTable for MuxSourceRouteTable {
    fn walk(&self, cache: &mut SourceCache) -> Result<Vec<RouteEntry>> {
        info!("Scanning {} for mux registrations", self.root.display());

        if !self.root.is_dir() {
            return Err(Error::Enumeration(format!(
                "project root is not a directory: {}",
                self.root.display()
            )));
        }
        let scan = FileScanner::new(self.root.clone())
            .scan()
            .map_err(|e| Error::Enumeration(e.to_string()))?;

        let mut entries = Vec::new();
        for file in &scan.go_files {
            let parsed = match cache.load(file) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("Skipping {}: {}", file.display(), err);
                    continue;
                }
            };
            entries.extend(self.scan_file(parsed, cache));
        }

        info!(
            "Found {} registrations in {} files",
            entries.len(),
            scan.go_files.len()
        );
        Ok(entries)
    }
}

/// The file followed by its sibling package files.
fn package_files(parsed: &ParsedFile) -> Vec<PathBuf> {
    let mut files = vec![parsed.path.clone()];
    if let Some(Ok(siblings)) = parsed.path.parent().map(list_go_files) {
        files.extend(
            siblings
                .into_iter()
                .filter(|file| !same_file(file, &parsed.path)),
        );
    }
    files
}

/// Searches the file, then its sibling package files, for a declaration of `name`.
fn find_in_package(
    parsed: &ParsedFile,
    receiver: Option<&str>,
    name: &str,
    cache: &mut SourceCache,
) -> Option<PathBuf> {
    if find_function(&parsed.lines, receiver, name).is_some() {
        return Some(parsed.path.clone());
    }

    package_files(parsed).into_iter().skip(1).find(|file| {
        cache
            .load(file)
            .map(|sibling| find_function(&sibling.lines, receiver, name).is_some())
            .unwrap_or(false)
    })
}

/// Import path for a type qualified by `alias`, or the file's own package.
fn package_of(alias: Option<&str>, ctx: &FileContext) -> Option<String> {
    match alias {
        Some(alias) => ctx.imports.get(alias).cloned(),
        None => Some(ctx.package.clone()),
    }
}

/// First binding of `variable` in the file.
fn variable_binding(lines: &[String], variable: &str) -> Option<Binding> {
    let var = regex::escape(variable);
    let receiver =
        Regex::new(&format!(r"^func\s*\(\s*{}\s+\*?{}", var, QUALIFIED_TYPE)).ok()?;
    let literal =
        Regex::new(&format!(r"\b{}\s*:?=\s*&?{}\s*\{{", var, QUALIFIED_TYPE)).ok()?;
    let new =
        Regex::new(&format!(r"\b{}\s*:?=\s*new\(\s*{}\s*\)", var, QUALIFIED_TYPE)).ok()?;
    let declared =
        Regex::new(&format!(r"\bvar\s+{}\s+\*?{}\s*(?:=|$)", var, QUALIFIED_TYPE)).ok()?;
    let call = Regex::new(&format!(
        r"\b{}\s*(?:,\s*\w+\s*)?:?=\s*{}\s*\(",
        var, QUALIFIED_TYPE
    ))
    .ok()?;

    lines.iter().find_map(|line| {
        for regex in [&receiver, &literal, &new, &declared] {
            if let Some(caps) = regex.captures(line) {
                return Some(Binding::Type {
                    alias: caps.get(1).map(|m| m.as_str().to_string()),
                    name: caps[2].to_string(),
                });
            }
        }
        call.captures(line).map(|caps| Binding::Call {
            alias: caps.get(1).map(|m| m.as_str().to_string()),
            function: caps[2].to_string(),
        })
    })
}

/// Type of struct field `field`, if the lines declare one.
fn field_binding(lines: &[String], field: &str) -> Option<Binding> {
    let regex = Regex::new(&format!(
        r"^\s*{}\s+\*?{}\s*(?:`[^`]*`)?$",
        regex::escape(field),
        QUALIFIED_TYPE
    ))
    .ok()?;

    lines.iter().find_map(|line| {
        regex.captures(line).map(|caps| Binding::Type {
            alias: caps.get(1).map(|m| m.as_str().to_string()),
            name: caps[2].to_string(),
        })
    })
}

/// First result type of the `func` declared on `line`, as `(alias, name)`.
fn result_type(line: &str, function: &str) -> Option<(Option<String>, String)> {
    let start = line.find(function)? + function.len();
    let open = start + line[start..].find('(')?;
    let close = open + matching_paren(&line[open..])?;
    let caps = RESULT_TYPE_REGEX.captures(&line[close + 1..])?;
    Some((caps.get(1).map(|m| m.as_str().to_string()), caps[2].to_string()))
}

/// Byte offset of the `)` closing the `(` that `text` starts with.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0;
    for (index, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b || a.canonicalize().ok() == b.canonicalize().ok()
}

/// Joins stripped lines into statements.
///
/// A statement continues while parentheses are open or the line ends in a `.` chain
/// continuation.
fn join_statements(lines: &[String]) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !current.is_empty() && !current.ends_with('.') && !current.ends_with('(') {
            current.push(' ');
        }
        current.push_str(trimmed);
        depth += paren_delta(trimmed);

        if depth <= 0 && !trimmed.ends_with('.') {
            statements.push(std::mem::take(&mut current));
            depth = 0;
        }
    }

    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

/// Net parenthesis change of a line, ignoring string and rune literals.
fn paren_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' => delta += 1,
            ')' => delta -= 1,
            _ => {}
        }
    }

    delta
}

/// Splits `recv.Method(...)...` into the receiver and the call chain starting at `.Method`.
fn split_receiver(expr: &str) -> Option<(&str, &str)> {
    let end = expr.find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))?;
    if !expr[end..].starts_with('(') {
        return None;
    }
    let dot = expr[..end].rfind('.')?;
    (dot > 0).then(|| (&expr[..dot], &expr[dot..]))
}

/// Top-level arguments of the call whose `(` sits at byte `open`.
fn call_arguments(text: &str, open: usize) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text[open + 1..].chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' if depth == 0 => break,
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => args.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    args.push(current);

    args.into_iter()
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .collect()
}

/// The function an argument names: itself, or its callee when it is a call.
fn call_target(arg: &str) -> Option<&str> {
    let target = match arg.find('(') {
        Some(open) => arg[..open].trim(),
        None => arg.trim(),
    };
    IDENTIFIER_CHAIN_REGEX.is_match(target).then_some(target)
}

/// Concatenated `PathPrefix` literals of a call chain.
fn path_prefixes(chain: &str) -> String {
    PATH_PREFIX_REGEX
        .captures_iter(chain)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .fold(String::new(), |acc, m| combine_paths(&acc, m.as_str()))
}

/// Combine a prefix and path, handling slashes correctly
fn combine_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

/// Methods named by a `Methods(...)` argument list: string literals or `http.MethodX`.
fn parse_methods(args: &str) -> Vec<String> {
    args.split(',')
        .filter_map(|arg| {
            let arg = arg.trim();
            let method = match arg.strip_prefix('"') {
                Some(quoted) => quoted.trim_end_matches('"'),
                None => arg.rsplit('.').next()?.strip_prefix("Method")?,
            };
            (!method.is_empty()).then(|| method.to_uppercase())
        })
        .collect()
}
