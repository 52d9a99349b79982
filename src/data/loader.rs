//! Loading recorded state/action trajectories
//!
//! Recordings are stored row-per-sample (`m × d` for states, `m` for actions)
//! either as NumPy `.npy` arrays or as headerless CSV files.

use super::types::Trajectory;
use crate::error::{Error, Result};
use csv::ReaderBuilder;
use ndarray::{Array, Array1, Array2, Dimension};
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};
use std::path::Path;
use tracing::info;

fn is_npy(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("npy"))
        .unwrap_or(false)
}

/// `Ok(None)` when the file holds a different element type
fn try_read_npy<T: ReadableElement, D: Dimension>(path: &Path) -> Result<Option<Array<T, D>>> {
    match read_npy(path) {
        Ok(arr) => Ok(Some(arr)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read a `.npy` array of float or integer dtype as `f64`
fn read_npy_f64<D: Dimension>(path: &Path) -> Result<Array<f64, D>> {
    if let Some(arr) = try_read_npy::<f64, D>(path)? {
        return Ok(arr);
    }
    if let Some(arr) = try_read_npy::<f32, D>(path)? {
        return Ok(arr.mapv(f64::from));
    }
    if let Some(arr) = try_read_npy::<i64, D>(path)? {
        return Ok(arr.mapv(|v| v as f64));
    }
    if let Some(arr) = try_read_npy::<i32, D>(path)? {
        return Ok(arr.mapv(f64::from));
    }
    Err(Error::DataLoad(format!(
        "{:?}: unsupported dtype, expected float32/64 or int32/64",
        path
    )))
}

/// Load an `m × d` sample matrix from `.npy` or CSV
pub fn load_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    if is_npy(path) {
        return read_npy_f64(path);
    }

    let mut reader = ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut values = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;

    for result in reader.records() {
        let record = result?;
        match ncols {
            None => ncols = Some(record.len()),
            Some(n) if n != record.len() => {
                return Err(Error::DataLoad(format!(
                    "{:?}: row {} has {} columns, expected {}",
                    path,
                    nrows + 1,
                    record.len(),
                    n
                )));
            }
            _ => {}
        }
        for field in record.iter() {
            let v: f64 = field.trim().parse().map_err(|_| {
                Error::DataLoad(format!("{:?}: cannot parse '{}' as a number", path, field))
            })?;
            values.push(v);
        }
        nrows += 1;
    }

    let ncols = ncols.unwrap_or(0);
    Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|e| Error::DataLoad(format!("{:?}: {}", path, e)))
}

/// Load a vector of `m` values from `.npy` or a single-column CSV
pub fn load_vector<P: AsRef<Path>>(path: P) -> Result<Array1<f64>> {
    let path = path.as_ref();
    if is_npy(path) {
        return read_npy_f64(path);
    }
    let matrix = load_matrix(path)?;
    if matrix.ncols() != 1 {
        return Err(Error::DataLoad(format!(
            "{:?}: expected a single column, found {}",
            path,
            matrix.ncols()
        )));
    }
    Ok(matrix.column(0).to_owned())
}

/// Load a recorded state/action trajectory
///
/// # Arguments
///
/// * `states_path` - `m × d` recorded states
/// * `actions_path` - `m` recorded actions (optional)
/// * `limit` - keep at most this many leading samples
/// * `dt` - sampling interval of the recording
pub fn load_trajectory<P: AsRef<Path>>(
    states_path: P,
    actions_path: Option<P>,
    limit: Option<usize>,
    dt: f64,
) -> Result<Trajectory> {
    let states = load_matrix(&states_path)?;
    let name = states_path
        .as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording")
        .to_string();

    let mut traj = Trajectory::new(states.t().to_owned(), dt, &name)?;
    if let Some(actions_path) = actions_path {
        let actions = load_vector(actions_path)?;
        traj = traj.with_actions(actions)?;
    }
    if let Some(limit) = limit {
        traj = traj.truncate(limit);
    }

    info!(
        name = traj.name(),
        dims = traj.dim(),
        samples = traj.len(),
        "loaded trajectory"
    );
    Ok(traj)
}
