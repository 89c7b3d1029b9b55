use faer::Mat;

use crate::database::{Database, DatabaseFormat, FileDatabase};
use crate::types::BasisError;
use crate::utils::from_column_major;
use crate::writer::interval_key;

/// Reads bases written by a [`BasisWriter`](crate::BasisWriter).
#[derive(Debug)]
pub struct BasisReader {
    database: Box<dyn Database>,
    num_time_intervals: usize,
    start_times: Vec<f64>,
}

impl BasisReader {
    /// Open `<base_file_name>.<ext>` in the given format.
    pub fn new(base_file_name: &str, format: DatabaseFormat) -> Result<Self, BasisError> {
        if base_file_name.is_empty() {
            return Err(BasisError::InvalidArgument(
                "base file name must not be empty".to_string(),
            ));
        }
        let mut database = FileDatabase::new(format);
        database.open(&format.file_name(base_file_name))?;
        Self::from_database(Box::new(database))
    }

    /// Read from an already opened database.
    pub fn from_database(database: Box<dyn Database>) -> Result<Self, BasisError> {
        let n = database.get_integer("num_time_intervals")?;
        let num_time_intervals = usize::try_from(n)
            .map_err(|_| BasisError::Storage(format!("invalid interval count {n}")))?;
        let start_times = (0..num_time_intervals)
            .map(|i| database.get_double(&interval_key("time", i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            database,
            num_time_intervals,
            start_times,
        })
    }

    pub fn num_time_intervals(&self) -> usize {
        self.num_time_intervals
    }

    fn check(&self, index: usize) -> Result<(), BasisError> {
        if index >= self.num_time_intervals {
            return Err(BasisError::InvalidInterval {
                index,
                count: self.num_time_intervals,
            });
        }
        Ok(())
    }

    pub fn interval_start_time(&self, index: usize) -> Result<f64, BasisError> {
        self.check(index)?;
        Ok(self.start_times[index])
    }

    /// Index of the last interval starting at or before `time`.
    pub fn interval_for_time(&self, time: f64) -> Result<usize, BasisError> {
        let after = self.start_times.partition_point(|&t| t <= time);
        if after == 0 {
            return Err(BasisError::InvalidArgument(format!(
                "no time interval starts at or before {time}"
            )));
        }
        Ok(after - 1)
    }

    fn read_matrix(&self, name: &str, index: usize) -> Result<Mat<f64>, BasisError> {
        let db = &*self.database;
        let nrows = db.get_integer(&interval_key(&format!("{name}_num_rows"), index))?;
        let ncols = db.get_integer(&interval_key(&format!("{name}_num_cols"), index))?;
        let data = db.get_double_array(&interval_key(name, index))?;
        let dims = usize::try_from(nrows).and_then(|r| usize::try_from(ncols).map(|c| (r, c)));
        let (nrows, ncols) = dims.map_err(|_| {
            BasisError::Storage(format!("invalid {name} shape {nrows} x {ncols}"))
        })?;
        from_column_major(nrows, ncols, &data)
    }

    /// Left singular vectors (n × r) of an interval.
    pub fn spatial_basis(&self, index: usize) -> Result<Mat<f64>, BasisError> {
        self.check(index)?;
        self.read_matrix("spatial_basis", index)
    }

    /// Right singular vectors (k × r), if they were written.
    pub fn temporal_basis(&self, index: usize) -> Result<Option<Mat<f64>>, BasisError> {
        self.check(index)?;
        let key = interval_key("temporal_basis_num_rows", index);
        if self.database.get_integer(&key).is_err() {
            return Ok(None);
        }
        self.read_matrix("temporal_basis", index).map(Some)
    }

    /// Singular values of an interval.
    pub fn singular_values(&self, index: usize) -> Result<Vec<f64>, BasisError> {
        self.check(index)?;
        let size = self
            .database
            .get_integer(&interval_key("singular_value_size", index))?;
        let values = self
            .database
            .get_double_array(&interval_key("singular_value", index))?;
        if usize::try_from(size).ok() != Some(values.len()) {
            return Err(BasisError::Storage(format!(
                "interval {index} records {size} singular values but stores {}",
                values.len()
            )));
        }
        Ok(values)
    }
}
