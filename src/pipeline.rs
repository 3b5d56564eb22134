//! Pipeline plumbing: source/sink traits and the stage registry
//!
//! The calculator is one stage in a larger pipeline; these traits are the
//! seams it shares with its collaborators. Failures cross them as
//! `miette::Report` and propagate with `?` rather than being swallowed.

use std::collections::HashMap;

use crate::calculator::{Calculator, CalculatorConfig};
use crate::model::Record;

/// Downstream consumer of the record stream.
pub trait Sink {
    /// Consume one record.
    fn process(&mut self, record: Record) -> miette::Result<()>;

    /// End of stream. Flush anything buffered.
    fn complete(&mut self) -> miette::Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn process(&mut self, record: Record) -> miette::Result<()> {
        (**self).process(record)
    }

    fn complete(&mut self) -> miette::Result<()> {
        (**self).complete()
    }
}

/// Collects the stream in memory. Handy as the tail of a test pipeline.
impl Sink for Vec<Record> {
    fn process(&mut self, record: Record) -> miette::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Upstream producer: drives records into a sink in delivery order,
/// then signals end of stream.
pub trait Source {
    fn run(&mut self, sink: &mut dyn Sink) -> miette::Result<()>;
}

/// Replays a vector of records. The test double for any upstream stage.
impl Source for Vec<Record> {
    fn run(&mut self, sink: &mut dyn Sink) -> miette::Result<()> {
        for record in self.drain(..) {
            sink.process(record)?;
        }
        sink.complete()
    }
}

/// String key/value arguments for stage construction, with per-key
/// defaults resolved at lookup time.
#[derive(Debug, Clone, Default)]
pub struct StageArgs(HashMap<String, String>);

impl StageArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up `key`, falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).map_or(default, String::as_str)
    }
}

/// Builds a stage around the downstream sink it will feed.
pub type StageFactory = fn(&StageArgs, Box<dyn Sink>) -> miette::Result<Box<dyn Sink>>;

/// Built-in stages by registration name.
pub fn builtin_stages() -> HashMap<&'static str, StageFactory> {
    let mut stages: HashMap<&'static str, StageFactory> = HashMap::new();
    stages.insert("calculate-point-attribute", calculator_stage);
    stages
}

fn calculator_stage(args: &StageArgs, sink: Box<dyn Sink>) -> miette::Result<Box<dyn Sink>> {
    let config = CalculatorConfig::new(
        args.get_or("inputAttributes", ""),
        args.get_or("outputAttribute", "demoAttr"),
        args.get_or("calculation", "42"),
        args.get_or("removeAttributes", ""),
    )?;
    Ok(Box::new(Calculator::new(config, sink)))
}
