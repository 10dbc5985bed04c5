//! Dataset model, missingness masks, tabular I/O and dataset sources

pub mod csv_io;
pub mod dataset;
pub mod mask;
pub mod source;

pub use self::csv_io::CsvOptions;
pub use self::dataset::{
    Column, ColumnKind, ColumnValues, Dataset, IncompleteColumn, IncompleteDataset,
    IncompleteValues,
};
pub use self::mask::MissingnessMask;
pub use self::source::{DatasetProvider, DatasetSpec, DefaultDatasetProvider, LoadedDataset};
