use csv::{ReaderBuilder, WriterBuilder};
use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};
use std::path::Path;

use crate::utils::errors::NmfError;

/// Cell contents read as a missing value
const MISSING_TOKENS: &[&str] = &["", "NA", "NaN", "nan", "?"];

/**
 * Supported on-disk layouts of a matrix. Chosen from the file extension.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixFormat {
    Npy,
    Delimited,
}

impl MatrixFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> MatrixFormat {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("npy") => MatrixFormat::Npy,
            _ => MatrixFormat::Delimited,
        }
    }
}

fn parse_cell(value: &str, row: usize, column: usize) -> Result<f64, NmfError> {
    let value = value.trim();
    if MISSING_TOKENS.contains(&value) {
        return Ok(std::f64::NAN);
    }
    value.parse::<f64>().map_err(|_| NmfError::MatrixParse {
        row,
        column,
        value: value.to_string(),
    })
}

/**
 * Reads a delimited text matrix. Empty cells, NA, NaN, nan and ? are missing values.
 *
 * @param path file to read
 * @param delimiter single byte field separator, e.g. b',' or b'\t'
 * @param has_header skip the first line
 */
pub fn read_matrix<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    has_header: bool,
) -> Result<Array2<f64>, NmfError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_header)
        .flexible(false)
        .from_path(path.as_ref())?;

    let mut values = Vec::new();
    let mut n_rows = 0;
    let mut n_columns = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        n_columns = record.len();
        for (column, cell) in record.iter().enumerate() {
            values.push(parse_cell(cell, row, column)?);
        }
        n_rows += 1;
    }

    if values.is_empty() {
        return Err(NmfError::EmptyMatrix(path.as_ref().display().to_string()));
    }
    debug!(
        "Read {} x {} matrix from {}",
        n_rows,
        n_columns,
        path.as_ref().display()
    );

    Ok(Array2::from_shape_vec((n_rows, n_columns), values)?)
}

/**
 * Writes a matrix as delimited text, one row per line. NaN is written as NaN.
 */
pub fn write_matrix<P: AsRef<Path>>(
    path: P,
    matrix: &Array2<f64>,
    delimiter: u8,
) -> Result<(), NmfError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path.as_ref())?;
    for row in matrix.rows() {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes the matrix in NumPy .npy format
pub fn write_matrix_npy<P: AsRef<Path>>(path: P, matrix: &Array2<f64>) -> Result<(), NmfError> {
    write_npy(path, matrix)?;
    Ok(())
}

/// Reads a matrix, as .npy or delimited text depending on the extension
pub fn read_matrix_auto<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    has_header: bool,
) -> Result<Array2<f64>, NmfError> {
    match MatrixFormat::from_path(&path) {
        MatrixFormat::Npy => {
            let matrix: Array2<f64> = read_npy(path.as_ref())?;
            if matrix.is_empty() {
                return Err(NmfError::EmptyMatrix(path.as_ref().display().to_string()));
            }
            Ok(matrix)
        }
        MatrixFormat::Delimited => read_matrix(path, delimiter, has_header),
    }
}

/// Writes a matrix, as .npy or delimited text depending on the extension
pub fn write_output<P: AsRef<Path>>(
    path: P,
    matrix: &Array2<f64>,
    delimiter: u8,
) -> Result<(), NmfError> {
    match MatrixFormat::from_path(&path) {
        MatrixFormat::Npy => write_matrix_npy(&path, matrix)?,
        MatrixFormat::Delimited => write_matrix(&path, matrix, delimiter)?,
    }
    info!(
        "Wrote {} x {} matrix to {}",
        matrix.nrows(),
        matrix.ncols(),
        path.as_ref().display()
    );

    Ok(())
}
