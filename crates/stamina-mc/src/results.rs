//! Result reporting.

use std::io;

const HORIZONTAL_SEPARATOR: &str = "========================================";

/// The outcome of refining one property.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultInformation {
    pub property: String,
    pub p_min: f64,
    pub p_max: f64,
    pub number_states: usize,
    pub number_initial: usize,
}

impl ResultInformation {
    pub fn window(&self) -> f64 {
        self.p_max - self.p_min
    }
}

/// Write the fixed-precision results table.
pub fn write_results<W: io::Write>(result: &ResultInformation, out: &mut W) -> io::Result<()> {
    writeln!(out, "{HORIZONTAL_SEPARATOR}")?;
    writeln!(out, "RESULTS")?;
    writeln!(out, "{HORIZONTAL_SEPARATOR}")?;
    writeln!(out, "Property: {}", result.property)?;
    writeln!(out, "Probability Minimum: {:.12}", result.p_min)?;
    writeln!(out, "Probability Maximum: {:.12}", result.p_max)?;
    writeln!(out, "Window: {:.12}", result.window())?;
    writeln!(out, "{HORIZONTAL_SEPARATOR}")?;
    writeln!(
        out,
        "Model: {} states with {} initial.",
        result.number_states, result.number_initial
    )?;
    writeln!(out, "{HORIZONTAL_SEPARATOR}")
}
