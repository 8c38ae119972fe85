//! Structured progress events and batch reports
//!
//! Every transformation reports through an [`EventSink`] as it goes and
//! returns an [`OperationReport`] when done. Per-unit failures are collected
//! as [`UnitError`]s rather than aborting the batch.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::DeckError;

/// The thing a batch operation works through one at a time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Slide(usize),
    Section(String),
    File(String),
    Term(String),
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Slide(n) => write!(f, "slide {n}"),
            Unit::Section(name) => write!(f, "section '{name}'"),
            Unit::File(name) => write!(f, "file '{name}'"),
            Unit::Term(term) => write!(f, "term '{term}'"),
        }
    }
}

/// A failure confined to one unit of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitError {
    pub unit: Unit,
    pub code: String,
    pub message: String,
}

impl UnitError {
    pub fn new(unit: Unit, err: &DeckError) -> Self {
        Self {
            unit,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.unit, self.code, self.message)
    }
}

/// Overall classification of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// At least one item changed and nothing failed
    Changed,
    /// Nothing failed and nothing needed changing
    NothingToDo,
    /// Some units succeeded, some failed
    PartialFailure,
    /// Every attempted unit failed
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Changed => "changed",
            Outcome::NothingToDo => "nothing to do",
            Outcome::PartialFailure => "partial failure",
            Outcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    UnitProcessed { unit: Unit, detail: String },
    UnitSkipped { unit: Unit, reason: String },
    UnitFailed { unit: Unit, code: String, message: String },
    Summary {
        operation: String,
        changed: usize,
        slides: usize,
        errors: usize,
        outcome: Outcome,
    },
}

/// Receiver of progress events
pub trait EventSink {
    fn emit(&mut self, event: EngineEvent);
}

/// Collects events in memory
impl EventSink for Vec<EngineEvent> {
    fn emit(&mut self, event: EngineEvent) {
        self.push(event);
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::UnitProcessed { unit, detail } => info!("{unit}: {detail}"),
            EngineEvent::UnitSkipped { unit, reason } => warn!("{unit} skipped: {reason}"),
            EngineEvent::UnitFailed {
                unit,
                code,
                message,
            } => warn!("{unit} failed [{code}]: {message}"),
            EngineEvent::Summary {
                operation,
                changed,
                slides,
                errors,
                outcome,
            } => info!(
                changed,
                slides,
                errors,
                "{operation}: {outcome}"
            ),
        }
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: EngineEvent) {}
}

/// Adapts a closure into a sink
pub struct FnSink<F>(pub F);

impl<F: FnMut(EngineEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: EngineEvent) {
        (self.0)(event)
    }
}

/// Counts, touched slides and collected errors of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub operation: String,
    /// Items changed (runs, shapes, slides, files... depending on the operation)
    pub changed: usize,
    /// Slide numbers touched, ascending
    pub slides: Vec<usize>,
    /// Units that completed without error
    pub succeeded: usize,
    pub errors: Vec<UnitError>,
}

impl OperationReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            changed: 0,
            slides: Vec::new(),
            succeeded: 0,
            errors: Vec::new(),
        }
    }

    /// Record `count` changes on a slide
    pub fn touch(&mut self, slide: usize, count: usize) {
        self.changed += count;
        if count > 0 {
            self.mark_slide(slide);
        }
    }

    /// Record a slide as touched, keeping the list sorted
    fn mark_slide(&mut self, slide: usize) {
        if let Err(pos) = self.slides.binary_search(&slide) {
            self.slides.insert(pos, slide);
        }
    }

    /// A unit finished; emits `UnitProcessed`
    pub fn processed(&mut self, sink: &mut dyn EventSink, unit: Unit, detail: impl Into<String>) {
        self.succeeded += 1;
        sink.emit(EngineEvent::UnitProcessed {
            unit,
            detail: detail.into(),
        });
    }

    /// A unit was left alone; emits `UnitSkipped`
    pub fn skipped(&mut self, sink: &mut dyn EventSink, unit: Unit, reason: impl Into<String>) {
        sink.emit(EngineEvent::UnitSkipped {
            unit,
            reason: reason.into(),
        });
    }

    /// A unit failed; the error is kept and `UnitFailed` emitted
    pub fn failed(&mut self, sink: &mut dyn EventSink, unit: Unit, err: &DeckError) {
        let error = UnitError::new(unit, err);
        sink.emit(EngineEvent::UnitFailed {
            unit: error.unit.clone(),
            code: error.code.clone(),
            message: error.message.clone(),
        });
        self.errors.push(error);
    }

    pub fn outcome(&self) -> Outcome {
        match (self.errors.is_empty(), self.succeeded > 0 || self.changed > 0) {
            (false, true) => Outcome::PartialFailure,
            (false, false) => Outcome::Failed,
            (true, _) if self.changed > 0 || !self.slides.is_empty() => Outcome::Changed,
            (true, _) => Outcome::NothingToDo,
        }
    }

    /// Emit the `Summary` event
    pub fn finish(&self, sink: &mut dyn EventSink) {
        sink.emit(EngineEvent::Summary {
            operation: self.operation.clone(),
            changed: self.changed,
            slides: self.slides.len(),
            errors: self.errors.len(),
            outcome: self.outcome(),
        });
    }
}
