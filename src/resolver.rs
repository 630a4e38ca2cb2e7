//! Backfilling ledger entries for newly discovered documents.
//!
//! When the build finds a PDF with no ledger row, it asks a
//! [`MetadataResolver`] what to do. Three strategies are provided:
//!
//! - [`InteractiveResolver`] prompts an operator and blocks until answered.
//! - [`FailFastResolver`] aborts the build, naming the file.
//! - [`DeferResolver`] skips the file for this run and queues it for retry.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};
use tracing::info;

use crate::models::MetadataRecord;

/// Outcome of resolving a document with no ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Metadata supplied; it is inserted into the ledger.
    Resolved(MetadataRecord),
    /// Skip the document this run.
    Deferred,
}

pub trait MetadataResolver {
    /// Called once per unknown normalized filename, in discovery order.
    fn resolve(&mut self, filename: &str) -> Result<Resolution>;
}

/// Prompts for each field on `output`, reading answers line by line.
pub struct InteractiveResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractiveResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "   {}: ", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input closed while waiting for '{}'", prompt);
        }
        Ok(line.trim().to_string())
    }
}

impl InteractiveResolver<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> MetadataResolver for InteractiveResolver<R, W> {
    fn resolve(&mut self, filename: &str) -> Result<Resolution> {
        writeln!(self.output)?;
        writeln!(self.output, "New file: {}", filename)?;
        let record = MetadataRecord {
            filename: filename.to_string(),
            policy_number: self.ask("Policy Number (e.g. 11-010-00 or 'Unnumbered')")?,
            policy_name: self.ask("Policy Name")?,
            effective_date: self.ask("Effective Date (e.g. February 10, 2018)")?,
            review_due_date: self.ask("Review Due Date (e.g. February 2024)")?,
            document_type: self.ask("Document Type (Policy or Reference)")?,
        };
        Ok(Resolution::Resolved(record))
    }
}

pub struct FailFastResolver;

impl MetadataResolver for FailFastResolver {
    fn resolve(&mut self, filename: &str) -> Result<Resolution> {
        bail!(
            "no ledger entry for '{}'; add it to the ledger or rerun with --resolve interactive",
            filename
        )
    }
}

/// Defers every unknown file, remembering them in order.
#[derive(Debug, Default)]
pub struct DeferResolver {
    queue: Vec<String>,
}

impl DeferResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> &[String] {
        &self.queue
    }
}

impl MetadataResolver for DeferResolver {
    fn resolve(&mut self, filename: &str) -> Result<Resolution> {
        info!(filename, "deferring document with no ledger entry");
        self.queue.push(filename.to_string());
        Ok(Resolution::Deferred)
    }
}

/// Strategy names accepted by `policyctx build --resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResolveMode {
    Interactive,
    FailFast,
    Defer,
}

impl ResolveMode {
    pub fn resolver(&self) -> Box<dyn MetadataResolver> {
        match self {
            ResolveMode::Interactive => Box::new(InteractiveResolver::stdio()),
            ResolveMode::FailFast => Box::new(FailFastResolver),
            ResolveMode::Defer => Box::new(DeferResolver::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_reads_five_trimmed_answers() {
        let input = "  11-010-00 \nSuturing\nFebruary 10, 2018\n2026-02-01\n Policy\n";
        let mut output = Vec::new();
        let mut resolver = InteractiveResolver::new(input.as_bytes(), &mut output);

        let resolution = resolver.resolve("Suturing.pdf").unwrap();
        assert_eq!(
            resolution,
            Resolution::Resolved(MetadataRecord {
                filename: "Suturing.pdf".to_string(),
                policy_number: "11-010-00".to_string(),
                policy_name: "Suturing".to_string(),
                effective_date: "February 10, 2018".to_string(),
                review_due_date: "2026-02-01".to_string(),
                document_type: "Policy".to_string(),
            })
        );

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("New file: Suturing.pdf"));
        assert!(shown.contains("Document Type"));
    }

    #[test]
    fn interactive_accepts_blank_answers() {
        let mut resolver = InteractiveResolver::new("\n\n\n\n\n".as_bytes(), Vec::new());
        match resolver.resolve("x.pdf").unwrap() {
            Resolution::Resolved(r) => {
                assert_eq!(r.filename, "x.pdf");
                assert_eq!(r.policy_number, "");
            }
            Resolution::Deferred => panic!("expected a record"),
        }
    }

    #[test]
    fn interactive_errors_when_input_ends() {
        let mut resolver = InteractiveResolver::new("1\n".as_bytes(), Vec::new());
        assert!(resolver.resolve("x.pdf").is_err());
    }

    #[test]
    fn fail_fast_names_the_file() {
        let err = FailFastResolver.resolve("Missing.pdf").unwrap_err();
        assert!(err.to_string().contains("Missing.pdf"));
    }

    #[test]
    fn defer_queues_in_order() {
        let mut resolver = DeferResolver::new();
        assert_eq!(resolver.resolve("b.pdf").unwrap(), Resolution::Deferred);
        assert_eq!(resolver.resolve("a.pdf").unwrap(), Resolution::Deferred);
        assert_eq!(resolver.queued(), ["b.pdf", "a.pdf"]);
    }
}
