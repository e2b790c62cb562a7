use crate::error::{Error, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Source loader for Go files.
///
/// The `SourceParser` reads a Go source file and strips every comment from it while
/// keeping the line layout intact: line `n` of the result is always line `n` of the file.
/// Downstream stages index handler bodies and type definitions by absolute line number,
/// so a block comment spanning several lines leaves empty placeholder lines behind.
///
/// # Example
///
/// ```no_run
/// use swagger_from_source::parser::SourceParser;
/// use std::path::Path;
///
/// let parsed = SourceParser::parse_file(Path::new("handlers/users.go")).unwrap();
/// println!("Loaded {} lines", parsed.lines.len());
/// ```
pub struct SourceParser;

/// A loaded Go file with comments removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Comment-free lines, right-trimmed, one entry per original line
    pub lines: Vec<String>,
}

/// Lexer state carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    BlockComment,
    RawString,
}

impl SourceParser {
    /// Reads and strips a single Go source file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.go` file
    ///
    /// # Returns
    ///
    /// The stripped lines, one per source line.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceIo` if the file cannot be opened or is not valid UTF-8.
    /// Callers treat this as non-fatal: only the routes depending on this file are lost.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Loading source file: {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| Error::SourceIo {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            lines: Self::strip_comments(&content),
        })
    }

    /// Removes `//` and `/* */` comments from Go source text, line by line.
    ///
    /// Comment markers inside interpreted strings, rune literals and raw strings are kept.
    /// A raw string or block comment may span lines; the state carries over.
    pub fn strip_comments(content: &str) -> Vec<String> {
        let mut state = LexState::Code;
        content
            .lines()
            .map(|line| {
                let (stripped, next) = Self::strip_line(line, state);
                state = next;
                stripped
            })
            .collect()
    }

    fn strip_line(line: &str, mut state: LexState) -> (String, LexState) {
        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            match state {
                LexState::BlockComment => {
                    if c == '*' && next == Some('/') {
                        state = LexState::Code;
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                LexState::RawString => {
                    out.push(c);
                    if c == '`' {
                        state = LexState::Code;
                    }
                    i += 1;
                }
                LexState::Code => match (c, next) {
                    ('/', Some('/')) => break,
                    ('/', Some('*')) => {
                        state = LexState::BlockComment;
                        i += 2;
                    }
                    ('`', _) => {
                        out.push(c);
                        state = LexState::RawString;
                        i += 1;
                    }
                    ('"', _) | ('\'', _) => {
                        i = Self::copy_quoted(&chars, i, &mut out);
                    }
                    _ => {
                        out.push(c);
                        i += 1;
                    }
                },
            }
        }

        (out.trim_end().to_string(), state)
    }

    /// Copies an interpreted string or rune literal starting at `start`, returning the
    /// index just past its closing quote (or the end of the line if unterminated).
    fn copy_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
        let quote = chars[start];
        out.push(quote);
        let mut i = start + 1;
        while i < chars.len() {
            let c = chars[i];
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                }
                i += 2;
                continue;
            }
            i += 1;
            if c == quote {
                break;
            }
        }
        i
    }
}

/// Per-run memo of loaded source files, keyed by absolute path.
///
/// Many handlers usually live in the same file and every composite type lookup re-reads
/// package files, so each file is read from disk at most once per generation run.
/// Failed reads are remembered as well.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<PathBuf, Rc<ParsedFile>>,
    failures: HashMap<PathBuf, ErrorKind>,
    disk_reads: usize,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stripped file, reading it on first use.
    pub fn load(&mut self, path: &Path) -> Result<Rc<ParsedFile>> {
        let key = Self::cache_key(path);

        if let Some(parsed) = self.files.get(&key) {
            return Ok(Rc::clone(parsed));
        }

        if let Some(kind) = self.failures.get(&key) {
            return Err(Error::SourceIo {
                path: key,
                source: std::io::Error::new(*kind, "source file previously failed to load"),
            });
        }

        self.disk_reads += 1;
        match SourceParser::parse_file(&key) {
            Ok(parsed) => {
                let parsed = Rc::new(parsed);
                self.files.insert(key, Rc::clone(&parsed));
                Ok(parsed)
            }
            Err(err) => {
                warn!("{}", err);
                if let Error::SourceIo { source, .. } = &err {
                    self.failures.insert(key, source.kind());
                }
                Err(err)
            }
        }
    }

    /// Number of times a file was actually read from disk.
    pub fn disk_reads(&self) -> usize {
        self.disk_reads
    }

    fn cache_key(path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_strip_line_comments() {
        let lines = SourceParser::strip_comments("x := 1 // the answer\n// whole line\ny := 2");

        assert_eq!(lines, vec!["x := 1", "", "y := 2"]);
    }

    #[test]
    fn test_block_comment_keeps_line_numbers() {
        let source = "package users\n/*\nfunc Old() {\n}\n*/\nfunc New() {\n}";
        let lines = SourceParser::strip_comments(source);

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "package users");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "func New() {");
        assert_eq!(lines[6], "}");
    }

    #[test]
    fn test_inline_block_comment() {
        let lines = SourceParser::strip_comments("id := /* path var */ vars[\"id\"]");

        assert_eq!(lines, vec!["id :=   vars[\"id\"]"]);
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let source = r#"u := "http://example.com" // trailing
r := '/'
s := "a \" // b""#;
        let lines = SourceParser::strip_comments(source);

        assert_eq!(lines[0], r#"u := "http://example.com""#);
        assert_eq!(lines[1], "r := '/'");
        assert_eq!(lines[2], r#"s := "a \" // b""#);
    }

    #[test]
    fn test_raw_string_spanning_lines() {
        let source = "q := `select * // not a comment\nfrom users /* still raw */`\nx := 1 // gone";
        let lines = SourceParser::strip_comments(source);

        assert_eq!(lines[0], "q := `select * // not a comment");
        assert_eq!(lines[1], "from users /* still raw */`");
        assert_eq!(lines[2], "x := 1");
    }

    #[test]
    fn test_struct_tags_survive() {
        let source = "type User struct {\n\tName string `json:\"name\"` // display name\n}";
        let lines = SourceParser::strip_comments(source);

        assert_eq!(lines[1], "\tName string `json:\"name\"`");
    }

    #[test]
    fn test_parse_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(&temp_dir, "users.go", "package users\n\n// Get\nfunc Get() {\n}\n");

        let parsed = SourceParser::parse_file(&file_path).unwrap();

        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.lines, vec!["package users", "", "", "func Get() {", "}"]);
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = SourceParser::parse_file(Path::new("/nonexistent/file.go"));

        assert!(matches!(result, Err(Error::SourceIo { .. })));
    }

    #[test]
    fn test_cache_reads_each_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(&temp_dir, "users.go", "package users\n");

        let mut cache = SourceCache::new();
        let first = cache.load(&file_path).unwrap();
        let second = cache.load(&file_path).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.disk_reads(), 1);
    }

    #[test]
    fn test_cache_remembers_failures() {
        let mut cache = SourceCache::new();
        let missing = Path::new("/nonexistent/handlers.go");

        assert!(cache.load(missing).is_err());
        assert!(cache.load(missing).is_err());
        assert_eq!(cache.disk_reads(), 1);
    }
}
