//! Solver result matrices
//!
//! Reads the capacitance matrix written by the electrostatic model and
//! derives the inductance matrix, either from the vacuum capacitance
//! (`L = μ₀ε₀ C₀⁻¹`) or from the impedance of the London model.

use chipsim_core::constants::{INDUCTANCE_ANGULAR_FREQUENCY, VACUUM_PERMEABILITY, VACUUM_PERMITTIVITY};
use chipsim_core::{Error, Result, SimulationConfig};
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

/// Dense matrix as rows
pub type Matrix = Vec<Vec<f64>>;

/// Capacitance and inductance per unit length; `None` when not available
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionMatrices {
    #[serde(rename = "Cs")]
    pub cs: Option<Matrix>,
    #[serde(rename = "Ls")]
    pub ls: Option<Matrix>,
}

const VOLTAGE_RE: &str = "v_component(1) re";
const VOLTAGE_IM: &str = "v_component(1) im";
const CURRENT_RE: &str = "i_component(1) re";
const CURRENT_IM: &str = "i_component(1) im";

/// Read a file, mapping "not found" to `None`
fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a whitespace-separated numeric table
///
/// Blank lines are skipped; every row must have the same width.
pub fn parse_matrix(content: &str, file: &str) -> Result<Matrix> {
    let mut rows: Matrix = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|field| {
                field.parse::<f64>().map_err(|e| Error::Parse {
                    file: file.to_string(),
                    line: i + 1,
                    reason: format!("'{}': {}", field, e),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(Error::Parse {
                    file: file.to_string(),
                    line: i + 1,
                    reason: format!("expected {} columns, found {}", first.len(), row.len()),
                });
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Read a matrix file; `None` when the file does not exist
pub fn read_matrix(path: &Path) -> Result<Option<Matrix>> {
    read_optional(path)?
        .map(|content| parse_matrix(&content, &path.display().to_string()))
        .transpose()
}

/// Inverse of a square matrix
pub fn invert(matrix: &Matrix, source: &str) -> Result<Matrix> {
    let n = matrix.len();
    if n == 0 || matrix.iter().any(|row| row.len() != n) {
        return Err(Error::SingularMatrix(source.to_string()));
    }
    let m = DMatrix::from_row_iterator(n, n, matrix.iter().flatten().copied());
    let inverse = m
        .try_inverse()
        .ok_or_else(|| Error::SingularMatrix(source.to_string()))?;
    Ok((0..n)
        .map(|r| (0..n).map(|c| inverse[(r, c)]).collect())
        .collect())
}

fn vacuum_inductance(folder: &Path) -> Result<Option<Matrix>> {
    let path = folder.join("capacitance0.dat");
    let Some(c0) = read_matrix(&path)? else {
        return Ok(None);
    };
    let scale = VACUUM_PERMEABILITY * VACUUM_PERMITTIVITY;
    let inverse = invert(&c0, &path.display().to_string())?;
    Ok(Some(
        inverse
            .into_iter()
            .map(|row| row.into_iter().map(|v| scale * v).collect())
            .collect(),
    ))
}

/// Column names listed in a `SaveScalars` names file
pub fn result_column_names(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| line.contains("res:"))
        .filter_map(|line| line.split_once("res: "))
        .map(|(_, name)| name.trim_end().to_string())
        .collect()
}

fn column(names: &[String], name: &str, file: &str) -> Result<usize> {
    names.iter().position(|n| n == name).ok_or_else(|| Error::Parse {
        file: file.to_string(),
        line: 0,
        reason: format!("missing column '{}'", name),
    })
}

fn london_inductance(folder: &Path, angular_frequency: f64) -> Result<Option<Matrix>> {
    let data_file = folder.join("inductance.dat");
    let data_path = if data_file.is_file() {
        data_file
    } else {
        folder.join("inductance.dat.0")
    };
    let Some(data) = read_matrix(&data_path)? else {
        return Ok(None);
    };
    let names_path = folder.join("inductance.dat.names");
    let Some(names) = read_optional(&names_path)? else {
        return Ok(None);
    };
    let names = result_column_names(&names);
    let names_file = names_path.display().to_string();

    let v_re = column(&names, VOLTAGE_RE, &names_file)?;
    let v_im = column(&names, VOLTAGE_IM, &names_file)?;
    let i_re = column(&names, CURRENT_RE, &names_file)?;
    let i_im = column(&names, CURRENT_IM, &names_file)?;

    let mut inductances = Vec::with_capacity(data.len());
    for (r, row) in data.iter().enumerate() {
        let value = |c: usize| {
            row.get(c).copied().ok_or_else(|| Error::Parse {
                file: data_path.display().to_string(),
                line: r + 1,
                reason: format!("row has no column {}", c + 1),
            })
        };
        let voltage = Complex64::new(value(v_re)?, value(v_im)?);
        let current = Complex64::new(value(i_re)?, value(i_im)?);
        let impedance = voltage / current;
        inductances.push(impedance.im / angular_frequency);
    }
    Ok(Some(vec![inductances]))
}

/// Read the result matrices of a cross-section run from `folder`
///
/// Without `capacitance.dat` both matrices are `None`. Without the
/// inductance inputs only `Ls` is `None`. Malformed files and singular
/// matrices are errors.
pub fn get_cross_section_capacitance_and_inductance(
    config: &SimulationConfig,
    folder: &Path,
) -> Result<CrossSectionMatrices> {
    let Some(cs) = read_matrix(&folder.join("capacitance.dat"))? else {
        tracing::warn!("No capacitance matrix in {}", folder.display());
        return Ok(CrossSectionMatrices::default());
    };

    let ls = if config.use_london_equations() {
        london_inductance(folder, INDUCTANCE_ANGULAR_FREQUENCY)?
    } else {
        vacuum_inductance(folder)?
    };
    if ls.is_none() {
        tracing::info!("No inductance results in {}", folder.display());
    }
    Ok(CrossSectionMatrices { cs: Some(cs), ls })
}
