use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    #[default]
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }

    fn from_level(level: &str) -> Self {
        match level {
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
            column,
        });
        self
    }

    /// Flat record written to `diagnostics.jsonl`.
    pub fn to_record(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("severity".into(), Value::from(self.severity.as_str()));
        obj.insert("message".into(), Value::from(self.message.clone()));
        if let Some(code) = &self.code {
            obj.insert("code".into(), Value::from(code.clone()));
        }
        if let Some(loc) = &self.location {
            obj.insert("file".into(), Value::from(loc.file.clone()));
            obj.insert("line".into(), Value::from(loc.line));
            obj.insert("column".into(), Value::from(loc.column));
        }
        Value::Object(obj)
    }
}

/// Shape tools emit on stderr, one object per line.
#[derive(Debug, Deserialize)]
struct WireDiagnostic {
    #[serde(default)]
    level: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    col: u32,
}

/// Best-effort parse of a tool's stderr. Lines that are not diagnostic
/// objects become `Info` diagnostics carrying the raw text.
pub fn parse_stderr(stderr: &str) -> Vec<Diagnostic> {
    stderr
        .trim()
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Diagnostic {
    let Ok(wire) = serde_json::from_str::<WireDiagnostic>(line) else {
        return Diagnostic::info(line);
    };
    let message = if wire.message.is_empty() {
        line.to_string()
    } else {
        wire.message
    };
    let mut diag = Diagnostic::new(Severity::from_level(&wire.level), message);
    if !wire.code.is_empty() {
        diag.code = Some(wire.code);
    }
    if !wire.file.is_empty() {
        diag = diag.at(wire.file, wire.line, wire.col);
    }
    diag
}

pub fn to_jsonl(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diag in diagnostics {
        out.push_str(&diag.to_record().to_string());
        out.push('\n');
    }
    out
}
