//! Parameter extraction from handler bodies.
//!
//! A handler body is scanned line by line for the idioms a gorilla/mux handler uses to
//! read its request: path variables, query values, a decoded JSON body and multipart
//! form fields. Each match becomes a [`ParameterDeclaration`] in source order.
//!
//! The body starts on the line after the `func` declaration and ends at the first line
//! consisting solely of `}`; gofmt places a top-level function's closing brace alone in
//! column zero, while nested closures are indented.

use crate::locator::function_name;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static VARS_BINDING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*:?=\s*mux\.Vars\(").unwrap());

static PATH_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:mux\.Vars\(\s*\w+\s*\)|\b([A-Za-z_]\w*))\[\s*"([^"]+)"\s*\]"#).unwrap()
});

static QUERY_BINDING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z_]\w*)\s*:?=\s*\w+\.URL\.Query\(\)\s*$").unwrap()
});

static INLINE_QUERY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\w+\.URL\.Query\(\)\.Get\(\s*"([^"]+)"\s*\)"#).unwrap());

static BOUND_QUERY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b([A-Za-z_]\w*)\.Get\(\s*"([^"]+)"\s*\)"#).unwrap());

static BODY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"json\.NewDecoder\(\s*\w+\.Body\s*\)\.Decode\(\s*&?\s*([A-Za-z_][\w.]*)\s*\)")
        .unwrap()
});

static FORM_FILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\w+\.FormFile\(\s*"([^"]+)"\s*\)"#).unwrap());

static FORM_VALUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\w+\.(?:Post)?FormValue\(\s*"([^"]+)"\s*\)"#).unwrap());

static RETURN_CALL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^return\s+([A-Za-z_][\w.]*)\s*\(").unwrap());

/// Where a declared parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Path,
    Query,
    Body,
    FormFile,
    FormValue,
}

/// One request read found in a handler body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDeclaration {
    /// Path variable, query key or form field name; for bodies, the decode destination
    pub name: String,
    pub kind: ParameterKind,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Result of scanning one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerScan {
    /// Function name from the declaration line, when the scan started right after one
    pub name: Option<String>,
    pub declarations: Vec<ParameterDeclaration>,
    /// Index of the closing `}` line, or the line count if the body never closes
    pub end_line: usize,
}

/// Index of the line closing the body that starts at `start_line`.
pub fn body_end(lines: &[String], start_line: usize) -> usize {
    (start_line..lines.len())
        .find(|&i| lines[i] == "}")
        .unwrap_or(lines.len())
}

/// Scans a handler body starting at line index `start_line`.
///
/// With a 1-based declaration line `n`, pass `n` to start on the first body line.
pub fn scan_handler(lines: &[String], start_line: usize) -> HandlerScan {
    let name = declared_name(lines, start_line);
    let end_line = body_end(lines, start_line);

    let mut vars_names: HashSet<String> = HashSet::from(["vars".to_string()]);
    let mut query_names: HashSet<String> = HashSet::new();
    let mut declarations = Vec::new();

    for line in lines.iter().take(end_line).skip(start_line) {
        if let Some(caps) = VARS_BINDING_REGEX.captures(line) {
            vars_names.insert(caps[1].to_string());
        }
        if let Some(caps) = QUERY_BINDING_REGEX.captures(line) {
            query_names.insert(caps[1].to_string());
        }

        if let Some(var) = path_variable(line, &vars_names) {
            declarations.push(ParameterDeclaration::new(var, ParameterKind::Path));
        }
        if let Some(key) = query_key(line, &query_names) {
            declarations.push(ParameterDeclaration::new(key, ParameterKind::Query));
        }
        if let Some(caps) = BODY_REGEX.captures(line) {
            declarations.push(ParameterDeclaration::new(&caps[1], ParameterKind::Body));
        }
        if let Some(caps) = FORM_FILE_REGEX.captures(line) {
            declarations.push(ParameterDeclaration::new(&caps[1], ParameterKind::FormFile));
        }
        if let Some(caps) = FORM_VALUE_REGEX.captures(line) {
            declarations.push(ParameterDeclaration::new(&caps[1], ParameterKind::FormValue));
        }
    }

    debug!(
        "Scanned handler {:?}: {} declarations in lines {}..{}",
        name,
        declarations.len(),
        start_line,
        end_line
    );

    HandlerScan {
        name,
        declarations,
        end_line,
    }
}

/// Scans a go-kit endpoint body for the service method it delegates to.
///
/// Returns the callee of the last `return recv.Name(` statement; returned closures
/// (`return func(`) are looked through.
pub fn scan_endpoint(lines: &[String], start_line: usize) -> Option<String> {
    let end_line = body_end(lines, start_line);

    lines
        .iter()
        .take(end_line)
        .skip(start_line)
        .filter_map(|line| RETURN_CALL_REGEX.captures(line.trim()))
        .filter_map(|caps| {
            let callee = caps.get(1)?.as_str();
            let name = callee.rsplit('.').next().unwrap_or(callee);
            (name != "func").then(|| name.to_string())
        })
        .last()
}

fn declared_name(lines: &[String], start_line: usize) -> Option<String> {
    start_line
        .checked_sub(1)
        .and_then(|i| lines.get(i))
        .and_then(|line| function_name(line))
        .map(str::to_string)
}

fn path_variable(line: &str, vars_names: &HashSet<String>) -> Option<String> {
    PATH_VAR_REGEX.captures_iter(line).find_map(|caps| {
        let bound_map = caps.get(1).map(|m| m.as_str());
        match bound_map {
            Some(map) if !vars_names.contains(map) => None,
            _ => Some(caps[2].to_string()),
        }
    })
}

fn query_key(line: &str, query_names: &HashSet<String>) -> Option<String> {
    if let Some(caps) = INLINE_QUERY_REGEX.captures(line) {
        return Some(caps[1].to_string());
    }
    BOUND_QUERY_REGEX
        .captures_iter(line)
        .find(|caps| query_names.contains(&caps[1]))
        .map(|caps| caps[2].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(source: &str) -> Vec<String> {
        source.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_path_variable() {
        let source = lines(
            "func GetStoryAuthorization(w http.ResponseWriter, r *http.Request) {\n\tvars := mux.Vars(r)\n\ttokenID := vars[\"tokenId\"]\n\tw.Write([]byte(tokenID))\n}",
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(scan.name.as_deref(), Some("GetStoryAuthorization"));
        assert_eq!(
            scan.declarations,
            vec![ParameterDeclaration::new("tokenId", ParameterKind::Path)]
        );
        assert_eq!(scan.end_line, 4);
    }

    #[test]
    fn test_renamed_and_inline_vars() {
        let source = lines(
            "func Get(w http.ResponseWriter, req *http.Request) {\n\tparams := mux.Vars(req)\n\tid := params[\"id\"]\n\tslug := mux.Vars(req)[\"slug\"]\n\tother := lookup[\"key\"]\n}",
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(
            scan.declarations,
            vec![
                ParameterDeclaration::new("id", ParameterKind::Path),
                ParameterDeclaration::new("slug", ParameterKind::Path),
            ]
        );
    }

    #[test]
    fn test_query_reads() {
        let source = lines(
            "func List(w http.ResponseWriter, r *http.Request) {\n\tpage := r.URL.Query().Get(\"page\")\n\tq := r.URL.Query()\n\tsort := q.Get(\"sort\")\n\tw.Header().Get(\"X-Ignored\")\n}",
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(
            scan.declarations,
            vec![
                ParameterDeclaration::new("page", ParameterKind::Query),
                ParameterDeclaration::new("sort", ParameterKind::Query),
            ]
        );
    }

    #[test]
    fn test_five_line_handler_keeps_source_order() {
        let source = lines(
            r#"func GetStories(w http.ResponseWriter, r *http.Request) {
	storyID, err := strconv.ParseInt(r.URL.Query().Get("storyId"), 10, 64)
	req := transport.Foo{
		Type: r.URL.Query().Get("type"),
	}
}"#,
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(
            scan.declarations,
            vec![
                ParameterDeclaration::new("storyId", ParameterKind::Query),
                ParameterDeclaration::new("type", ParameterKind::Query),
            ]
        );
    }

    #[test]
    fn test_composite_literal_fields_from_top() {
        let source: Vec<String> = [
            "x := transport.Foo{",
            "StoryID: r.URL.Query().Get(\"storyId\"),",
            "Type: r.URL.Query().Get(\"type\"),",
            "}",
            "}",
        ]
        .iter()
        .map(|line| line.to_string())
        .collect();

        let scan = scan_handler(&source, 0);

        assert_eq!(
            scan.declarations,
            vec![
                ParameterDeclaration::new("storyId", ParameterKind::Query),
                ParameterDeclaration::new("type", ParameterKind::Query),
            ]
        );
        assert_eq!(scan.end_line, 3);
    }

    #[test]
    fn test_body_and_form_reads() {
        let source = lines(
            r#"func Upload(w http.ResponseWriter, r *http.Request) {
	var story transport.Story
	err := json.NewDecoder(r.Body).Decode(&story)
	file, header, err := r.FormFile("attachment")
	title := r.FormValue("title")
	note := r.PostFormValue("note")
}"#,
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(
            scan.declarations,
            vec![
                ParameterDeclaration::new("story", ParameterKind::Body),
                ParameterDeclaration::new("attachment", ParameterKind::FormFile),
                ParameterDeclaration::new("title", ParameterKind::FormValue),
                ParameterDeclaration::new("note", ParameterKind::FormValue),
            ]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let source = lines(
            "func Get(w http.ResponseWriter, r *http.Request) {\n\ta := r.URL.Query().Get(\"id\")\n\tb := r.URL.Query().Get(\"id\")\n}",
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(scan.declarations.len(), 2);
    }

    #[test]
    fn test_scan_stops_at_closing_brace() {
        let source = lines(
            "func A(w http.ResponseWriter, r *http.Request) {\n\thandler := func() {\n\t\tvars[\"inner\"]\n\t}\n}\n\nfunc B(w http.ResponseWriter, r *http.Request) {\n\tvars[\"other\"]\n}",
        );

        let scan = scan_handler(&source, 1);

        assert_eq!(
            scan.declarations,
            vec![ParameterDeclaration::new("inner", ParameterKind::Path)]
        );
        assert_eq!(scan.end_line, 4);
    }

    #[test]
    fn test_unterminated_body_is_bounded() {
        let source = lines("func A(w http.ResponseWriter, r *http.Request) {\n\tvars[\"id\"]");

        let scan = scan_handler(&source, 1);

        assert_eq!(scan.end_line, 2);
        assert_eq!(scan.declarations.len(), 1);
    }

    #[test]
    fn test_scan_from_top_has_no_name() {
        let source = lines("\tx := r.FormValue(\"x\")\n}");

        let scan = scan_handler(&source, 0);

        assert_eq!(scan.name, None);
        assert_eq!(
            scan.declarations,
            vec![ParameterDeclaration::new("x", ParameterKind::FormValue)]
        );
    }

    #[test]
    fn test_scan_endpoint() {
        let source = lines(
            r#"func makeGetStoryEndpoint(s Service) endpoint.Endpoint {
	return func(ctx context.Context, request interface{}) (interface{}, error) {
		req := request.(getStoryRequest)
		if req.ID == "" {
			return nil, ErrBadRouting
		}
		return s.GetStory(ctx, req.ID)
	}
}"#,
        );

        assert_eq!(scan_endpoint(&source, 1), Some("GetStory".to_string()));
    }

    #[test]
    fn test_scan_endpoint_without_delegation() {
        let source = lines("func makeEndpoint() endpoint.Endpoint {\n\treturn nil\n}");

        assert_eq!(scan_endpoint(&source, 1), None);
    }
}
