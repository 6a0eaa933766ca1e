//! Structured logging for simulation runs.
//!
//! Provides:
//! - [`LogEntry`]: one JSONL record with required and optional fields.
//! - [`ArtifactIndex`]: links a run's logs and reports with SHA-256 digests.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`] / [`validate_log_file`]: schema checks.

use std::io::{BufWriter, Write};
use std::path::Path;

use rlaudit_core::{TestH0Status, TestSummary};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Outcome of one trial from the audit's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The reported outcome was confirmed.
    Confirmed,
    /// The audit would escalate (budget exhausted or null accepted).
    Escalate,
    Error,
}

impl Outcome {
    #[must_use]
    pub fn from_status(status: TestH0Status) -> Self {
        if status.is_fail() {
            Self::Escalate
        } else {
            Self::Confirmed
        }
    }
}

/// Which workflow produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Unit,
    Simulation,
    Cli,
    Perf,
}

/// Test statistic family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Alpha,
    Betting,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_kind: Option<TestKind>,
    /// Strategy name, e.g. `shrink_trunc` or `adaptive_comparison`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TestH0Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvalue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_limit: Option<f64>,
    /// Wall-clock duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            scope: None,
            stream: None,
            test_kind: None,
            strategy: None,
            trial: None,
            status: None,
            outcome: None,
            sample_count: None,
            pvalue: None,
            risk_limit: None,
            duration_ms: None,
            artifact_refs: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_stream(mut self, stream: StreamKind) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Set the test family and strategy name.
    #[must_use]
    pub fn with_test(mut self, kind: TestKind, strategy: impl Into<String>) -> Self {
        self.test_kind = Some(kind);
        self.strategy = Some(strategy.into());
        self
    }

    #[must_use]
    pub fn with_trial(mut self, trial: usize) -> Self {
        self.trial = Some(trial);
        self
    }

    /// Copy status, outcome, sample count and last p-value from a summary.
    #[must_use]
    pub fn with_summary(mut self, summary: &TestSummary) -> Self {
        self.status = Some(summary.status);
        self.outcome = Some(Outcome::from_status(summary.status));
        self.sample_count = Some(summary.sample_count);
        self.pvalue = Some(summary.pvalue_last);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_risk_limit(mut self, risk_limit: f64) -> Self {
        self.risk_limit = Some(risk_limit);
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, refs: Vec<String>) -> Self {
        self.artifact_refs = Some(refs);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Artifact index for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub scope: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            scope: scope.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Add an entry with a precomputed digest.
    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        sha256: impl Into<String>,
    ) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256.into(),
            size_bytes: None,
            description: None,
        });
        self
    }

    /// Hash a file on disk and add it.
    pub fn add_file(&mut self, path: &Path, kind: impl Into<String>) -> std::io::Result<&mut Self> {
        let bytes = std::fs::read(path)?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&bytes),
            size_bytes: Some(bytes.len() as u64),
            description: None,
        });
        Ok(self)
    }

    /// Re-hash every listed file; returns the paths whose digest changed or
    /// that can no longer be read.
    #[must_use]
    pub fn verify(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .filter(|entry| {
                std::fs::read(&entry.path).map_or(true, |bytes| sha256_hex(&bytes) != entry.sha256)
            })
            .map(|entry| entry.path.clone())
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

enum Sink {
    File(BufWriter<std::fs::File>),
    Buffer(Vec<u8>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::File(w) => w.write(buf),
            Self::Buffer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::File(w) => w.flush(),
            Self::Buffer(w) => w.flush(),
        }
    }
}

/// Writes structured JSONL log entries.
pub struct LogEmitter {
    writer: Sink,
    seq: u64,
    scope: String,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, scope: &str, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            writer: Sink::File(BufWriter::new(file)),
            seq: 0,
            scope: scope.to_string(),
            run_id: run_id.to_string(),
        })
    }

    /// Create an emitter that writes to memory (for testing).
    #[must_use]
    pub fn to_buffer(scope: &str, run_id: &str) -> Self {
        Self {
            writer: Sink::Buffer(Vec::new()),
            seq: 0,
            scope: scope.to_string(),
            run_id: run_id.to_string(),
        }
    }

    /// Bytes written so far, for buffer emitters.
    #[must_use]
    pub fn buffer(&self) -> Option<&[u8]> {
        match &self.writer {
            Sink::Buffer(buf) => Some(buf),
            Sink::File(_) => None,
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.scope, self.run_id, self.seq)
    }

    /// Emit an entry with auto-generated trace_id and scope.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(&trace_id, level, event).with_scope(&self.scope);
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        Ok(entry)
    }

    /// Emit a fully-populated entry, filling in trace_id and scope if unset.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.scope.is_none() {
            entry.scope = Some(self.scope.clone());
        }
        let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];
const OUTCOMES: [&str; 3] = ["confirmed", "escalate", "error"];
const STREAMS: [&str; 4] = ["unit", "simulation", "cli", "perf"];
const TEST_KINDS: [&str; 2] = ["alpha", "betting"];

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();
    let fail = |errors: &mut Vec<LogValidationError>, field: &str, message: String| {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message,
        });
    };

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            fail(&mut errors, "<json>", format!("invalid JSON: {e}"));
            return Err(errors);
        }
    };
    let Some(obj) = value.as_object() else {
        fail(&mut errors, "<root>", "expected JSON object".to_string());
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            fail(&mut errors, field, "required field missing".to_string());
        }
    }

    let enums: [(&str, &[&str]); 4] = [
        ("level", &LEVELS),
        ("outcome", &OUTCOMES),
        ("stream", &STREAMS),
        ("test_kind", &TEST_KINDS),
    ];
    for (field, allowed) in enums {
        if let Some(v) = obj.get(field).and_then(|v| v.as_str())
            && !allowed.contains(&v)
        {
            fail(&mut errors, field, format!("invalid {field}: '{v}'"));
        }
    }

    if let Some(status) = obj.get("status").and_then(|v| v.as_str())
        && !TestH0Status::ALL.iter().any(|s| s.as_str() == status)
    {
        fail(&mut errors, "status", format!("invalid status: '{status}'"));
    }

    if let Some(pvalue) = obj.get("pvalue") {
        match pvalue.as_f64() {
            Some(p) if p >= 0.0 => {}
            _ => fail(
                &mut errors,
                "pvalue",
                format!("pvalue must be a non-negative number, got {pvalue}"),
            ),
        }
    }

    if let Some(alpha) = obj.get("risk_limit").and_then(serde_json::Value::as_f64)
        && !(alpha > 0.0 && alpha < 1.0)
    {
        fail(&mut errors, "risk_limit", format!("risk_limit {alpha} outside (0, 1)"));
    }

    // A trial result must say how it ended.
    if obj.contains_key("trial") && obj.get("event").and_then(|v| v.as_str()) == Some("trial_end")
    {
        for field in ["status", "sample_count"] {
            if !obj.contains_key(field) {
                fail(
                    &mut errors,
                    field,
                    "trial_end events must include this field".to_string(),
                );
            }
        }
    }

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        fail(
            &mut errors,
            "trace_id",
            format!("trace_id should follow <scope>::<run_id>::<seq> format, got: '{trace_id}'"),
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match serde_json::from_value::<LogEntry>(value) {
        Ok(entry) => Ok(entry),
        Err(e) => {
            fail(&mut errors, "<deserialization>", format!("failed to deserialize: {e}"));
            Err(errors)
        }
    }
}

/// Validate an entire JSONL file.
///
/// Returns the non-empty line count and every validation error found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RFC 3339 UTC timestamp with millisecond precision.
pub(crate) fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date (Hinnant's algorithm).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
