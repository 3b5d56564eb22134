//! The attribute calculator: per-point calculate/delete transform
//!
//! Configuration is validated and frozen once at stage construction; each
//! point is then transformed independently, with no cross-record state.

use std::collections::{HashMap, HashSet};

use crate::errors::ConfigError;
use crate::formula::{CompiledFormula, ExprEngine, FormulaEngine};
use crate::model::{Attribute, Point, Record};
use crate::pipeline::Sink;

/// Built-in pseudo-attributes, always bindable in formulas.
const LAT: &str = "lat";
const LON: &str = "lon";

/// Where the result goes and how to compute it.
///
/// Stored as one unit so "formula without an output name" is
/// unrepresentable.
struct Calculation {
    output: String,
    formula: Box<dyn CompiledFormula>,
}

/// Frozen per-stage configuration. Built once, immutable afterwards.
pub struct CalculatorConfig {
    /// Names bindable as formula variables: the declared input attributes
    /// plus the built-in `lat`/`lon`.
    variables: HashSet<String>,
    calculation: Option<Calculation>,
    remove_names: HashSet<String>,
}

impl std::fmt::Debug for CalculatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorConfig")
            .field("variables", &self.variables)
            .field(
                "calculation",
                &self.calculation.as_ref().map(|c| &c.output),
            )
            .field("remove_names", &self.remove_names)
            .finish()
    }
}

impl CalculatorConfig {
    /// Validate and freeze the four raw configuration strings, compiling
    /// the formula with the default engine.
    ///
    /// `input_names` and `remove_names` are comma-separated; entries are
    /// trimmed and empty entries dropped. At least one of `formula` and
    /// `remove_names` must be non-empty, and a formula requires a
    /// non-empty `output_name`.
    pub fn new(
        input_names: &str,
        output_name: &str,
        formula: &str,
        remove_names: &str,
    ) -> Result<Self, ConfigError> {
        Self::with_engine(&ExprEngine, input_names, output_name, formula, remove_names)
    }

    /// Same as [`CalculatorConfig::new`], with a caller-supplied engine.
    pub fn with_engine(
        engine: &dyn FormulaEngine,
        input_names: &str,
        output_name: &str,
        formula: &str,
        remove_names: &str,
    ) -> Result<Self, ConfigError> {
        let mut variables = split_names(input_names);
        variables.insert(LAT.to_string());
        variables.insert(LON.to_string());
        let remove_names = split_names(remove_names);
        let output_name = output_name.trim();
        let formula = formula.trim();

        if formula.is_empty() && remove_names.is_empty() {
            return Err(ConfigError::NothingToDo);
        }

        let calculation = if formula.is_empty() {
            None
        } else {
            if output_name.is_empty() {
                return Err(ConfigError::MissingOutput);
            }
            Some(Calculation {
                output: output_name.to_string(),
                formula: engine.compile(formula, &variables)?,
            })
        };

        Ok(Self {
            variables,
            calculation,
            remove_names,
        })
    }

    /// Apply the configured calculation and removals to one point.
    ///
    /// Identity, coordinates and provenance are preserved; only the
    /// attribute collection changes. Never fails per record: numeric
    /// anomalies degrade to NaN.
    pub fn transform(&self, point: Point) -> Point {
        let Point {
            id,
            coord,
            provenance,
            attributes,
        } = point;

        // Numeric snapshot of the attributes, taken before any removal so
        // a removed attribute can still feed the calculation.
        let mut values = if self.calculation.is_some() {
            numeric_snapshot(id, &attributes)
        } else {
            HashMap::new()
        };

        let mut attributes: Vec<Attribute> = attributes
            .into_iter()
            .filter(|attr| !self.marked_for_removal(&attr.name))
            .collect();

        if let Some(calc) = &self.calculation {
            // Coordinates take precedence over attributes of the same name.
            values.insert(LAT.to_string(), coord.y);
            values.insert(LON.to_string(), coord.x);

            let result = self.calculate(id, &values, calc);
            attributes.push(Attribute::new(calc.output.clone(), result.to_string()));
        }

        Point {
            id,
            coord,
            provenance,
            attributes,
        }
    }

    /// The output attribute matches case-insensitively; explicit removals
    /// match exactly. Deletion-only configurations have no output name and
    /// skip that check entirely.
    fn marked_for_removal(&self, name: &str) -> bool {
        if let Some(calc) = &self.calculation {
            if name.eq_ignore_ascii_case(&calc.output) {
                return true;
            }
        }
        self.remove_names.contains(name)
    }

    /// Bind every declared variable and evaluate. A variable with no
    /// usable value binds NaN and the formula still runs.
    fn calculate(&self, id: i64, values: &HashMap<String, f64>, calc: &Calculation) -> f64 {
        let mut bindings = HashMap::with_capacity(self.variables.len());
        for name in &self.variables {
            match values.get(name) {
                Some(value) => {
                    bindings.insert(name.clone(), *value);
                }
                None => {
                    crate::log::warn!("point {id} has no attribute called {name}");
                    bindings.insert(name.clone(), f64::NAN);
                }
            }
        }
        calc.formula.evaluate(&bindings)
    }
}

/// Split a comma-separated name list, trimming entries and dropping empty
/// ones ("" and "," both mean "no entries").
fn split_names(list: &str) -> HashSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse every attribute value as f64; unparsable values are skipped.
fn numeric_snapshot(id: i64, attributes: &[Attribute]) -> HashMap<String, f64> {
    let mut values = HashMap::with_capacity(attributes.len());
    for attr in attributes {
        match attr.value.trim().parse::<f64>() {
            Ok(value) => {
                values.insert(attr.name.clone(), value);
            }
            Err(_) => {
                crate::log::debug!(
                    "point {id}: attribute {} is not numeric, ignoring",
                    attr.name
                );
            }
        }
    }
    values
}

/// The transform stage: points go through the calculator, everything else
/// is forwarded untouched, in order.
pub struct Calculator<S> {
    config: CalculatorConfig,
    sink: S,
}

impl<S: Sink> Calculator<S> {
    pub fn new(config: CalculatorConfig, sink: S) -> Self {
        Self { config, sink }
    }

    /// The wrapped downstream sink, for collecting results after a run.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S: Sink> Sink for Calculator<S> {
    fn process(&mut self, record: Record) -> miette::Result<()> {
        match record {
            Record::Point(point) => self
                .sink
                .process(Record::Point(self.config.transform(point))),
            other => self.sink.process(other),
        }
    }

    fn complete(&mut self) -> miette::Result<()> {
        self.sink.complete()
    }
}
