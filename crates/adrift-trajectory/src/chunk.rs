//! Chunk assembly and the on-disk chunk store.
//!
//! One write event produces one chunk: an Arrow record batch persisted as an
//! independently loadable parquet file named by a zero-padded sequence
//! number (`p000.parquet`, `p001.parquet`, ...). Chunks are write-once --
//! after [`ChunkStore::persist`] returns, the file is never reopened or
//! rewritten by this crate, and the sequence counter only advances for
//! chunks that persisted successfully.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::OutputError;
use adrift_particles::collection::Column;
use adrift_particles::variable::ElementType;

// ---------------------------------------------------------------------------
// Arrow conversions
// ---------------------------------------------------------------------------

/// Arrow data type corresponding to a schema element type.
pub fn arrow_type(dtype: ElementType) -> DataType {
    match dtype {
        ElementType::Float32 => DataType::Float32,
        ElementType::Float64 => DataType::Float64,
        ElementType::Int8 => DataType::Int8,
        ElementType::Int16 => DataType::Int16,
        ElementType::Int32 => DataType::Int32,
        ElementType::Int64 => DataType::Int64,
        ElementType::UInt8 => DataType::UInt8,
        ElementType::UInt16 => DataType::UInt16,
        ElementType::UInt32 => DataType::UInt32,
        ElementType::UInt64 => DataType::UInt64,
        ElementType::Bool => DataType::Boolean,
    }
}

/// Convert a dense column into a non-nullable Arrow array.
pub fn dense_array(col: &Column) -> ArrayRef {
    match col {
        Column::Float32(v) => Arc::new(Float32Array::from(v.clone())),
        Column::Float64(v) => Arc::new(Float64Array::from(v.clone())),
        Column::Int8(v) => Arc::new(Int8Array::from(v.clone())),
        Column::Int16(v) => Arc::new(Int16Array::from(v.clone())),
        Column::Int32(v) => Arc::new(Int32Array::from(v.clone())),
        Column::Int64(v) => Arc::new(Int64Array::from(v.clone())),
        Column::UInt8(v) => Arc::new(UInt8Array::from(v.clone())),
        Column::UInt16(v) => Arc::new(UInt16Array::from(v.clone())),
        Column::UInt32(v) => Arc::new(UInt32Array::from(v.clone())),
        Column::UInt64(v) => Arc::new(UInt64Array::from(v.clone())),
        Column::Bool(v) => Arc::new(BooleanArray::from(v.clone())),
    }
}

/// Spread a dense column of values over the rows where `mask` is `true`,
/// producing a nullable Arrow array of `mask.len()` rows with nulls
/// everywhere else.
///
/// # Panics
///
/// Panics if the column length does not equal the number of `true` entries
/// in `mask`.
pub fn sparse_array(col: &Column, mask: &[bool]) -> ArrayRef {
    let populated = mask.iter().filter(|&&m| m).count();
    assert_eq!(
        col.len(),
        populated,
        "sparse column has {} values for {populated} populated rows",
        col.len()
    );

    /// Walks `mask`, consuming one value per `true` entry.
    fn spread<T: Copy>(values: &[T], mask: &[bool]) -> Vec<Option<T>> {
        let mut next = values.iter();
        mask.iter()
            .map(|&m| if m { next.next().copied() } else { None })
            .collect()
    }

    match col {
        Column::Float32(v) => Arc::new(Float32Array::from(spread(v, mask))),
        Column::Float64(v) => Arc::new(Float64Array::from(spread(v, mask))),
        Column::Int8(v) => Arc::new(Int8Array::from(spread(v, mask))),
        Column::Int16(v) => Arc::new(Int16Array::from(spread(v, mask))),
        Column::Int32(v) => Arc::new(Int32Array::from(spread(v, mask))),
        Column::Int64(v) => Arc::new(Int64Array::from(spread(v, mask))),
        Column::UInt8(v) => Arc::new(UInt8Array::from(spread(v, mask))),
        Column::UInt16(v) => Arc::new(UInt16Array::from(spread(v, mask))),
        Column::UInt32(v) => Arc::new(UInt32Array::from(spread(v, mask))),
        Column::UInt64(v) => Arc::new(UInt64Array::from(spread(v, mask))),
        Column::Bool(v) => Arc::new(BooleanArray::from(spread(v, mask))),
    }
}

// ---------------------------------------------------------------------------
// ChunkDescriptor
// ---------------------------------------------------------------------------

/// Handle to one persisted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Sequence number of the chunk within its store.
    pub sequence: u64,
    /// Location of the chunk file.
    pub path: PathBuf,
    /// Number of rows the chunk holds.
    pub rows: usize,
}

// ---------------------------------------------------------------------------
// ChunkStore
// ---------------------------------------------------------------------------

/// Append-only store of sequentially numbered chunk files in one directory.
#[derive(Debug)]
pub struct ChunkStore {
    dir: PathBuf,
    next_sequence: u64,
}

impl ChunkStore {
    /// Create a store rooted at `dir`, wiping any previous contents so chunk
    /// numbering starts from zero.
    pub fn create(dir: &Path) -> Result<Self, OutputError> {
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(|source| OutputError::Io {
                path: dir.to_owned(),
                source,
            })?;
        }
        fs::create_dir_all(dir).map_err(|source| OutputError::Io {
            path: dir.to_owned(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_owned(),
            next_sequence: 0,
        })
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sequence number the next successful persist will use.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// File path for a given sequence number.
    pub fn chunk_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("p{sequence:03}.parquet"))
    }

    /// Persist `batch` as the next chunk file.
    ///
    /// The sequence counter advances only after the file is fully written
    /// and closed, so a failed persist can be retried with identical inputs
    /// and will target the same sequence number.
    pub fn persist(&mut self, batch: &RecordBatch) -> Result<ChunkDescriptor, OutputError> {
        let sequence = self.next_sequence;
        let path = self.chunk_path(sequence);

        let file = File::create(&path).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(
            |source| OutputError::Persist {
                path: path.clone(),
                source,
            },
        )?;
        writer.write(batch).map_err(|source| OutputError::Persist {
            path: path.clone(),
            source,
        })?;
        writer.close().map_err(|source| OutputError::Persist {
            path: path.clone(),
            source,
        })?;

        self.next_sequence += 1;
        tracing::debug!(sequence, rows = batch.num_rows(), path = %path.display(), "persisted trajectory chunk");

        Ok(ChunkDescriptor {
            sequence,
            path,
            rows: batch.num_rows(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn tiny_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("trajectory", DataType::Int64, false),
            Field::new("obs", DataType::UInt64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(UInt64Array::from(vec![0u64, 0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn chunk_paths_are_zero_padded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::create(&tmp.path().join("out")).unwrap();
        assert!(store.chunk_path(0).ends_with("p000.parquet"));
        assert!(store.chunk_path(42).ends_with("p042.parquet"));
        assert!(store.chunk_path(1000).ends_with("p1000.parquet"));
    }

    #[test]
    fn create_wipes_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        {
            let mut store = ChunkStore::create(&dir).unwrap();
            store.persist(&tiny_batch()).unwrap();
            assert!(dir.join("p000.parquet").exists());
        }
        let store = ChunkStore::create(&dir).unwrap();
        assert!(!dir.join("p000.parquet").exists());
        assert_eq!(store.next_sequence(), 0);
    }

    #[test]
    fn persist_assigns_sequential_names_and_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = ChunkStore::create(&tmp.path().join("out")).unwrap();

        let first = store.persist(&tiny_batch()).unwrap();
        let second = store.persist(&tiny_batch()).unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert!(second.path.ends_with("p001.parquet"));
        assert_eq!(first.rows, 2);

        // Each chunk is independently loadable.
        let file = File::open(&first.path).unwrap();
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batch = reader.next().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "trajectory");
    }

    #[test]
    fn failed_persist_leaves_sequence_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let mut store = ChunkStore::create(&dir).unwrap();
        store.persist(&tiny_batch()).unwrap();

        // Drop the directory out from under the store: File::create fails.
        fs::remove_dir_all(&dir).unwrap();
        let err = store.persist(&tiny_batch()).unwrap_err();
        assert!(matches!(err, OutputError::Io { .. }));
        assert_eq!(store.next_sequence(), 1);
    }

    #[test]
    fn dense_arrays_preserve_type_and_values() {
        let arr = dense_array(&Column::Float32(vec![1.5, 2.5]));
        assert_eq!(arr.data_type(), &DataType::Float32);
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.null_count(), 0);

        let arr = dense_array(&Column::Bool(vec![true, false, true]));
        assert_eq!(arr.data_type(), &DataType::Boolean);
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn sparse_arrays_null_unpopulated_rows() {
        let arr = sparse_array(
            &Column::Int32(vec![7, 9]),
            &[false, true, false, true, false],
        );
        assert_eq!(arr.len(), 5);
        assert_eq!(arr.null_count(), 3);
        let ints = arr.as_any().downcast_ref::<Int32Array>().unwrap();
        assert!(ints.is_null(0));
        assert_eq!(ints.value(1), 7);
        assert_eq!(ints.value(3), 9);
    }

    #[test]
    #[should_panic(expected = "sparse column has")]
    fn sparse_array_length_mismatch_panics() {
        let _ = sparse_array(&Column::Int32(vec![1]), &[true, true]);
    }

    #[test]
    fn arrow_types_cover_all_element_types() {
        assert_eq!(arrow_type(ElementType::Float64), DataType::Float64);
        assert_eq!(arrow_type(ElementType::UInt16), DataType::UInt16);
        assert_eq!(arrow_type(ElementType::Bool), DataType::Boolean);
    }
}
