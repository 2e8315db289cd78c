//! Puzzle ingestion, storage and lookup

pub mod convert;
pub mod csv;
pub mod dataset;
pub mod filter;
pub mod ingest;
pub mod model;
pub mod query;

pub use convert::{convert_line, convert_uci_line, Conversion, ConversionError, MoveNotation};
pub use csv::{split_csv_line, CsvRow, MalformedRow};
pub use dataset::{read_dataset, write_dataset};
pub use filter::{is_tactical, CurationFilter, TACTICAL_MOTIFS};
pub use ingest::{IngestOptions, IngestReport, IngestStats, IngestionPipeline, PartialSolution};
pub use model::{DatasetMetadata, Difficulty, PuzzleDataset, PuzzleRecord, RatingRange};
pub use query::{PuzzleCatalog, PuzzlePage, PuzzleQuery};
