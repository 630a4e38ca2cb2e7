//! Build progress reporting.
//!
//! Reports what `policyctx build` is doing so an operator can tell a slow
//! OCR pass from a stalled one. Progress goes to **stderr** so the build
//! summary on stdout stays parseable.

use std::io::Write;

/// A single progress event for a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildProgressEvent {
    /// Walking the document root. Total unknown.
    Discovering { root: String },
    /// Extracting and chunking file `n` of `total`.
    Extracting { filename: String, n: u64, total: u64 },
    /// Embedding the accumulated chunks.
    Embedding { chunks: u64 },
    /// Writing the ledger and index.
    Saving,
}

impl BuildProgressEvent {
    fn phase(&self) -> &'static str {
        match self {
            BuildProgressEvent::Discovering { .. } => "discovering",
            BuildProgressEvent::Extracting { .. } => "extracting",
            BuildProgressEvent::Embedding { .. } => "embedding",
            BuildProgressEvent::Saving => "saving",
        }
    }
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr: "build  extracting  3 / 120  Suturing.pdf".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = human_line(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
        let _ = stderr.flush();
    }
}

fn human_line(event: &BuildProgressEvent) -> String {
    match event {
        BuildProgressEvent::Discovering { root } => format!("build  discovering  {}", root),
        BuildProgressEvent::Extracting { filename, n, total } => format!(
            "build  extracting  {} / {}  {}",
            format_number(*n),
            format_number(*total),
            filename
        ),
        BuildProgressEvent::Embedding { chunks } => {
            format!("build  embedding  {} chunks", format_number(*chunks))
        }
        BuildProgressEvent::Saving => "build  saving ledger and index".to_string(),
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        if let Ok(line) = serde_json::to_string(&json_event(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn json_event(event: &BuildProgressEvent) -> serde_json::Value {
    let mut obj = serde_json::json!({
        "event": "progress",
        "phase": event.phase(),
    });
    match event {
        BuildProgressEvent::Discovering { root } => {
            obj["root"] = serde_json::json!(root);
        }
        BuildProgressEvent::Extracting { filename, n, total } => {
            obj["filename"] = serde_json::json!(filename);
            obj["n"] = serde_json::json!(n);
            obj["total"] = serde_json::json!(total);
        }
        BuildProgressEvent::Embedding { chunks } => {
            obj["chunks"] = serde_json::json!(chunks);
        }
        BuildProgressEvent::Saving => {}
    }
    obj
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
