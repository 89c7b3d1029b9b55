use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::database::{Database, DatabaseFormat, FileDatabase};
use crate::generator::SvdBasisGenerator;
use crate::sampler::SvdSampler;
use crate::types::BasisError;
use crate::utils::to_column_major;

/// Key for a per-interval entry, e.g. `spatial_basis_000003`.
pub(crate) fn interval_key(name: &str, index: usize) -> String {
    format!("{name}_{index:06}")
}

/// Writes the bases of a [`SvdBasisGenerator`] to a [`Database`].
///
/// Writes are incremental: each call persists only intervals that have
/// not been written yet (or whose snapshots changed since a speculative
/// write of the open interval). Every call ends with a single flush, so a
/// reader sees either none or all of an interval's time, basis and
/// singular values.
///
/// The generator is borrowed per call, so the driver keeps ownership and
/// can continue sampling between writes.
#[derive(Debug)]
pub struct BasisWriter {
    base_file_name: String,
    format: DatabaseFormat,
    path: PathBuf,
    database: Box<dyn Database>,
    num_intervals_written: usize,
    /// Set once the store has been created; later writes reopen it.
    created: bool,
    /// Sample count of the last written interval if it was still open.
    open_samples_written: Option<usize>,
}

impl BasisWriter {
    /// Writer storing to `<base_file_name>.<ext>` in the given format.
    pub fn new(base_file_name: &str, format: DatabaseFormat) -> Result<Self, BasisError> {
        Self::with_database(base_file_name, format, Box::new(FileDatabase::new(format)))
    }

    /// Writer storing through a caller-supplied database. `format` only
    /// determines the file names.
    pub fn with_database(
        base_file_name: &str,
        format: DatabaseFormat,
        database: Box<dyn Database>,
    ) -> Result<Self, BasisError> {
        if base_file_name.is_empty() {
            return Err(BasisError::InvalidArgument(
                "base file name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            base_file_name: base_file_name.to_string(),
            format,
            path: format.file_name(base_file_name),
            database,
            num_intervals_written: 0,
            created: false,
            open_samples_written: None,
        })
    }

    /// Path of the basis store.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Number of intervals persisted so far.
    pub fn num_intervals_written(&self) -> usize {
        self.num_intervals_written
    }

    /// Persist the bases of every interval not yet written.
    ///
    /// Closed intervals are always eligible. The still-open last interval
    /// is written only when `include_open` is set; if it gains samples
    /// afterwards, the next call rewrites it.
    ///
    /// Returns the number of intervals persisted by this call.
    pub fn write_basis<S: SvdSampler>(
        &mut self,
        generator: &mut SvdBasisGenerator<S>,
        include_open: bool,
    ) -> Result<usize, BasisError> {
        let count = generator.num_intervals();
        let mut start = self.num_intervals_written;

        if let Some(samples) = self.open_samples_written {
            let last = start - 1;
            if generator.num_samples(last)? != samples {
                start = last;
            } else if generator.is_closed(last)? {
                self.open_samples_written = None;
            }
        }

        let end = match count {
            0 => 0,
            _ if include_open || generator.is_closed(count - 1)? => count,
            _ => count - 1,
        };
        if start >= end {
            debug!(path = %self.path.display(), "no new bases to write");
            return Ok(0);
        }

        if !self.database.is_open() {
            if self.created {
                self.database.open(&self.path)?;
            } else {
                self.database.create(&self.path)?;
                self.created = true;
            }
        }

        generator.refresh_bases(start..end)?;
        for index in start..end {
            let time = generator.interval_start_time(index)?;
            let basis = generator.basis(index)?;
            let db = &mut *self.database;

            db.put_double(&interval_key("time", index), time)?;

            db.put_integer(
                &interval_key("spatial_basis_num_rows", index),
                basis.u.nrows() as i64,
            )?;
            db.put_integer(
                &interval_key("spatial_basis_num_cols", index),
                basis.u.ncols() as i64,
            )?;
            db.put_double_array(&interval_key("spatial_basis", index), &to_column_major(&basis.u))?;

            db.put_integer(
                &interval_key("singular_value_size", index),
                basis.s.len() as i64,
            )?;
            db.put_double_array(&interval_key("singular_value", index), &basis.s)?;

            if let Some(v) = &basis.v {
                db.put_integer(
                    &interval_key("temporal_basis_num_rows", index),
                    v.nrows() as i64,
                )?;
                db.put_integer(
                    &interval_key("temporal_basis_num_cols", index),
                    v.ncols() as i64,
                )?;
                db.put_double_array(&interval_key("temporal_basis", index), &to_column_major(v))?;
            }
        }
        self.database.put_integer("num_time_intervals", end as i64)?;
        self.database.flush()?;

        self.num_intervals_written = end;
        self.open_samples_written = if generator.is_closed(end - 1)? {
            None
        } else {
            Some(generator.num_samples(end - 1)?)
        };

        info!(
            path = %self.path.display(),
            first = start,
            written = end - start,
            total = end,
            "wrote bases"
        );
        Ok(end - start)
    }

    /// Write the raw snapshot matrices of every interval to
    /// `<base_file_name>_snapshot.<ext>`, replacing any previous contents.
    pub fn write_snapshot<S: SvdSampler>(
        &self,
        generator: &SvdBasisGenerator<S>,
    ) -> Result<(), BasisError> {
        let path = self
            .format
            .file_name(&format!("{}_snapshot", self.base_file_name));
        let mut db = FileDatabase::new(self.format);
        db.create(&path)?;

        let count = generator.num_intervals();
        for index in 0..count {
            db.put_double(&interval_key("time", index), generator.interval_start_time(index)?)?;

            let snapshots = generator.snapshot_matrix(index)?;
            db.put_integer(
                &interval_key("snapshot_matrix_num_rows", index),
                snapshots.nrows() as i64,
            )?;
            db.put_integer(
                &interval_key("snapshot_matrix_num_cols", index),
                snapshots.ncols() as i64,
            )?;
            db.put_double_array(
                &interval_key("snapshot_matrix", index),
                &to_column_major(&snapshots),
            )?;

            if let Some(rhs) = generator.rhs_matrix(index)? {
                db.put_double_array(&interval_key("rhs_matrix", index), &to_column_major(&rhs))?;
            }
        }
        db.put_integer("num_time_intervals", count as i64)?;
        db.close()?;

        info!(path = %path.display(), intervals = count, "wrote snapshots");
        Ok(())
    }

    /// Flush and close the basis store. A later `write_basis` reopens it
    /// and keeps every interval already written.
    pub fn close(&mut self) -> Result<(), BasisError> {
        self.database.close()
    }
}

impl Drop for BasisWriter {
    fn drop(&mut self) {
        if self.database.is_open() {
            if let Err(e) = self.database.close() {
                warn!(path = %self.path.display(), error = %e, "failed to close basis store");
            }
        }
    }
}
