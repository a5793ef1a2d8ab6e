//! Incremental static checking.
//!
//! Checks run on their own tokio task against a read-only snapshot of the
//! sources and never hold up emission. Starting a run aborts the previous
//! one, and only the latest run may publish a report. A checker that errors
//! or panics produces [`CheckOutcome::Unavailable`] instead of failing the
//! build.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::module::{SourceModule, relative_path};
use crate::{Error, Result};

/// Read-only snapshot of the text sources handed to a checker.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    root: PathBuf,
    files: Arc<BTreeMap<PathBuf, Arc<str>>>,
}

impl SourceSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Arc::default(),
        }
    }

    /// Text modules only; binary content is skipped.
    pub fn from_modules<'a>(
        root: impl Into<PathBuf>,
        modules: impl IntoIterator<Item = &'a SourceModule>,
    ) -> Self {
        let files = modules
            .into_iter()
            .filter(|m| m.category.is_text())
            .filter_map(|m| Some((m.path.clone(), Arc::from(m.text()?))))
            .collect();
        Self {
            root: root.into(),
            files: Arc::new(files),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, text: &str) -> Self {
        Arc::make_mut(&mut self.files).insert(path.into(), Arc::from(text));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(p, t)| (p.as_path(), &**t))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn without(&self, excluded: impl Fn(&str) -> bool) -> Self {
        let files = self
            .files
            .iter()
            .filter(|(path, _)| !excluded(&relative_path(&self.root, path)))
            .map(|(path, text)| (path.clone(), Arc::clone(text)))
            .collect();
        Self {
            root: self.root.clone(),
            files: Arc::new(files),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, ": {severity}: {}", self.message)
    }
}

/// Black-box checker service.
#[async_trait]
pub trait StaticCheck: Send + Sync + fmt::Debug {
    async fn check(&self, sources: &SourceSet) -> std::result::Result<Vec<Diagnostic>, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed(Vec<Diagnostic>),
    /// The checker failed or crashed; the build is unaffected
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub generation: u64,
    pub outcome: CheckOutcome,
}

/// Handle for one started run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTicket {
    pub generation: u64,
}

/// Aborts the wrapped task when dropped, so aborting the outer task also
/// stops the checker itself.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct IncrementalChecker {
    checker: Arc<dyn StaticCheck>,
    exclude: Arc<Vec<Regex>>,
    current: Arc<Mutex<u64>>,
    inflight: Mutex<Option<JoinHandle<()>>>,
    reports: mpsc::UnboundedSender<CheckReport>,
}

impl fmt::Debug for IncrementalChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalChecker")
            .field("checker", &self.checker)
            .field("generation", &*self.current.lock())
            .finish_non_exhaustive()
    }
}

impl IncrementalChecker {
    /// `exclude` holds regexes over project-relative paths.
    pub fn new(
        checker: Arc<dyn StaticCheck>,
        exclude: &[String],
    ) -> Result<(Self, mpsc::UnboundedReceiver<CheckReport>)> {
        let exclude = exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    Error::InvalidConfig(format!("invalid check exclude '{pattern}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                checker,
                exclude: Arc::new(exclude),
                current: Arc::new(Mutex::new(0)),
                inflight: Mutex::new(None),
                reports: tx,
            },
            rx,
        ))
    }

    /// Abort any in-flight run and check `sources`. Must be called inside a
    /// tokio runtime.
    pub fn start(&self, sources: SourceSet) -> CheckTicket {
        let generation = {
            let mut current = self.current.lock();
            *current += 1;
            *current
        };
        if let Some(previous) = self.inflight.lock().take() {
            previous.abort();
        }

        let exclude = Arc::clone(&self.exclude);
        let sources = sources.without(|path| exclude.iter().any(|re| re.is_match(path)));
        let root = sources.root().to_path_buf();
        let checker = Arc::clone(&self.checker);
        let current = Arc::clone(&self.current);
        let reports = self.reports.clone();
        tracing::debug!(generation, files = sources.len(), "starting check");

        let task = tokio::spawn(async move {
            let mut inner = AbortOnDrop(tokio::spawn(async move { checker.check(&sources).await }));
            let outcome = match (&mut inner.0).await {
                Ok(Ok(diagnostics)) => CheckOutcome::Completed(
                    diagnostics
                        .into_iter()
                        .filter(|d| {
                            let path = relative_path(&root, &d.file);
                            !exclude.iter().any(|re| re.is_match(&path))
                        })
                        .collect(),
                ),
                Ok(Err(reason)) => CheckOutcome::Unavailable { reason },
                Err(err) if err.is_panic() => CheckOutcome::Unavailable {
                    reason: format!("checker panicked: {}", panic_message(err.into_panic())),
                },
                Err(_) => return,
            };

            if let CheckOutcome::Unavailable { reason } = &outcome {
                tracing::warn!(generation, reason = %reason, "type checking unavailable");
            }

            let current = current.lock();
            if *current == generation {
                let _ = reports.send(CheckReport {
                    generation,
                    outcome,
                });
            } else {
                tracing::debug!(generation, latest = *current, "dropping superseded check report");
            }
        });
        *self.inflight.lock() = Some(task);

        CheckTicket { generation }
    }

    /// Abort the in-flight run without starting another.
    pub fn cancel(&self) {
        *self.current.lock() += 1;
        if let Some(task) = self.inflight.lock().take() {
            task.abort();
        }
    }

    pub fn generation(&self) -> u64 {
        *self.current.lock()
    }
}

impl Drop for IncrementalChecker {
    fn drop(&mut self) {
        if let Some(task) = self.inflight.get_mut().take() {
            task.abort();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lexical delimiter check.
///
/// Reports unbalanced `()[]{}`, unterminated string and template literals
/// and unterminated block comments. Delimiters inside strings, comments and
/// template text are ignored; `${...}` inside templates is checked. Line
/// comments and template literals are not recognized in stylesheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimiterCheck;

#[async_trait]
impl StaticCheck for DelimiterCheck {
    async fn check(&self, sources: &SourceSet) -> std::result::Result<Vec<Diagnostic>, String> {
        let mut diagnostics = Vec::new();
        for (path, text) in sources.iter() {
            let is_css = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("css"));
            diagnostics.extend(check_delimiters(path, text, is_css));
        }
        Ok(diagnostics)
    }
}

enum Frame {
    Open { ch: char, line: u32, column: u32 },
    TemplateExpr,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl Cursor<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn position(&self) -> (u32, u32) {
        (self.line, self.column)
    }
}

fn check_delimiters(path: &Path, text: &str, is_css: bool) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let report = |out: &mut Vec<Diagnostic>, (line, column): (u32, u32), message: String| {
        out.push(Diagnostic {
            file: path.to_path_buf(),
            line: Some(line),
            column: Some(column),
            message,
            severity: Severity::Error,
        });
    };

    let mut cursor = Cursor {
        chars: text.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut frames: Vec<Frame> = Vec::new();
    let mut template_start = Vec::new();
    let mut in_template = false;

    loop {
        if in_template {
            match scan_template(&mut cursor) {
                TemplateEnd::Closed => {
                    in_template = false;
                    template_start.pop();
                }
                TemplateEnd::Expression => {
                    frames.push(Frame::TemplateExpr);
                    in_template = false;
                }
                TemplateEnd::Eof => {
                    let start = template_start.pop().unwrap_or((1, 1));
                    report(&mut out, start, "unterminated template literal".to_string());
                    return out;
                }
            }
            continue;
        }

        let position = cursor.position();
        let Some(c) = cursor.bump() else {
            break;
        };
        match c {
            '/' if cursor.peek() == Some('*') => {
                cursor.bump();
                if !skip_block_comment(&mut cursor) {
                    report(&mut out, position, "unterminated block comment".to_string());
                    return out;
                }
            }
            '/' if !is_css && cursor.peek() == Some('/') => {
                while let Some(next) = cursor.peek() {
                    if next == '\n' {
                        break;
                    }
                    cursor.bump();
                }
            }
            '\'' | '"' => {
                if !skip_string(&mut cursor, c) {
                    report(&mut out, position, "unterminated string literal".to_string());
                }
            }
            '`' if !is_css => {
                template_start.push(position);
                in_template = true;
            }
            '(' | '[' | '{' => frames.push(Frame::Open {
                ch: c,
                line: position.0,
                column: position.1,
            }),
            ')' | ']' | '}' => match frames.pop() {
                Some(Frame::TemplateExpr) if c == '}' => in_template = true,
                Some(Frame::Open { ch, .. }) if closing(ch) == c => {}
                Some(Frame::Open { ch, line, column }) => {
                    report(
                        &mut out,
                        position,
                        format!("expected '{}' to close '{ch}' from {line}:{column}, found '{c}'", closing(ch)),
                    );
                    return out;
                }
                Some(Frame::TemplateExpr) => {
                    report(&mut out, position, format!("expected '}}' to close template expression, found '{c}'"));
                    return out;
                }
                None => {
                    report(&mut out, position, format!("unexpected closing '{c}'"));
                    return out;
                }
            },
            _ => {}
        }
    }

    for frame in frames {
        match frame {
            Frame::Open { ch, line, column } => {
                report(&mut out, (line, column), format!("unclosed '{ch}'"));
            }
            Frame::TemplateExpr => {
                let start = template_start.pop().unwrap_or((1, 1));
                report(&mut out, start, "unterminated template literal".to_string());
            }
        }
    }
    out
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// False when the file ends inside the comment.
fn skip_block_comment(cursor: &mut Cursor<'_>) -> bool {
    while let Some(c) = cursor.bump() {
        if c == '*' && cursor.peek() == Some('/') {
            cursor.bump();
            return true;
        }
    }
    false
}

/// False when a newline or the end of the file comes before the closing quote.
fn skip_string(cursor: &mut Cursor<'_>, quote: char) -> bool {
    while let Some(c) = cursor.peek() {
        if c == '\n' {
            return false;
        }
        cursor.bump();
        if c == '\\' {
            cursor.bump();
        } else if c == quote {
            return true;
        }
    }
    false
}

enum TemplateEnd {
    Closed,
    Expression,
    Eof,
}

fn scan_template(cursor: &mut Cursor<'_>) -> TemplateEnd {
    while let Some(c) = cursor.bump() {
        match c {
            '\\' => {
                cursor.bump();
            }
            '`' => return TemplateEnd::Closed,
            '$' if cursor.peek() == Some('{') => {
                cursor.bump();
                return TemplateEnd::Expression;
            }
            _ => {}
        }
    }
    TemplateEnd::Eof
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn check(text: &str) -> Vec<Diagnostic> {
        check_delimiters(Path::new("/p/a.ts"), text, false)
    }

    #[test]
    fn balanced_code_is_clean() {
        let code = r#"
const s = "a ( [ {";
const t = `x ${ fn({ a: [1, 2] }) } y ${"}"}`;
/* ) ] } */
// ) ] }
function f() { return [1, (2)]; }
"#;
        assert!(check(code).is_empty(), "{:?}", check(code));
    }

    #[test]
    fn reports_positions() {
        let diags = check("fn(a,\n  b];");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, Some(2));
        assert_eq!(diags[0].column, Some(4));
        assert!(diags[0].message.contains("expected ')'"));

        let diags = check("{\n  'open\n}");
        assert_eq!(diags[0].message, "unterminated string literal");
        assert_eq!(diags[0].line, Some(2));

        let diags = check("if (x) {\n");
        assert_eq!(diags[0].message, "unclosed '{'");
        assert_eq!((diags[0].line, diags[0].column), (Some(1), Some(8)));

        assert_eq!(check("/* never")[0].message, "unterminated block comment");
        assert_eq!(check("`abc ${x}")[0].message, "unterminated template literal");
    }

    #[test]
    fn css_has_no_line_comments() {
        let diags = check_delimiters(Path::new("/p/a.css"), "a { background: url(//cdn/x.png) }", true);
        assert!(diags.is_empty());
    }

    #[derive(Debug)]
    struct Slow {
        delay: Duration,
        file: &'static str,
    }

    #[async_trait]
    impl StaticCheck for Slow {
        async fn check(&self, sources: &SourceSet) -> std::result::Result<Vec<Diagnostic>, String> {
            tokio::time::sleep(self.delay).await;
            Ok(sources
                .iter()
                .map(|(path, _)| Diagnostic {
                    file: path.to_path_buf(),
                    line: None,
                    column: None,
                    message: self.file.to_string(),
                    severity: Severity::Warning,
                })
                .collect())
        }
    }

    #[derive(Debug)]
    struct Panics;

    #[async_trait]
    impl StaticCheck for Panics {
        async fn check(&self, _sources: &SourceSet) -> std::result::Result<Vec<Diagnostic>, String> {
            panic!("checker exploded")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn last_request_wins() {
        let slow = Arc::new(Slow {
            delay: Duration::from_secs(5),
            file: "slow",
        });
        let (checker, mut reports) = IncrementalChecker::new(slow, &[]).unwrap();

        let first = checker.start(SourceSet::new("/p").with_file("/p/a.ts", "1"));
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = checker.start(SourceSet::new("/p").with_file("/p/b.ts", "2"));
        assert!(second.generation > first.generation);

        let report = reports.recv().await.unwrap();
        assert_eq!(report.generation, second.generation);
        match report.outcome {
            CheckOutcome::Completed(diags) => {
                assert_eq!(diags.len(), 1);
                assert_eq!(diags[0].file, PathBuf::from("/p/b.ts"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(reports.try_recv().is_err());
    }

    #[tokio::test]
    async fn panics_degrade_to_unavailable() {
        let (checker, mut reports) = IncrementalChecker::new(Arc::new(Panics), &[]).unwrap();
        checker.start(SourceSet::new("/p").with_file("/p/a.ts", "1"));
        let report = reports.recv().await.unwrap();
        match report.outcome {
            CheckOutcome::Unavailable { reason } => assert!(reason.contains("checker exploded")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn excluded_files_are_not_checked() {
        let (checker, mut reports) = IncrementalChecker::new(
            Arc::new(DelimiterCheck),
            &[r"\.json$".to_string(), r"(^|/)__tests__/".to_string()],
        )
        .unwrap();
        let sources = SourceSet::new("/p")
            .with_file("/p/src/__tests__/a.ts", "(((")
            .with_file("/p/src/data.json", "{")
            .with_file("/p/src/ok.ts", "f(1)");
        checker.start(sources);
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, CheckOutcome::Completed(Vec::new()));
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            file: PathBuf::from("src/a.ts"),
            line: Some(3),
            column: Some(7),
            message: "unclosed '('".into(),
            severity: Severity::Error,
        };
        assert_eq!(d.to_string(), "src/a.ts:3:7: error: unclosed '('");
    }
}
