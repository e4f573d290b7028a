mod bytes;
pub mod dbf;
mod fileio;
pub mod geom;
pub mod header;
pub mod iter;
mod shapefile;
pub mod shp;
pub mod shx;

pub use dbf::{DbfField, DbfFile, DbfHeader, DbfRecord, FieldType};
pub use geom::{GeomCodec, RecordView};
pub use header::{ShpHeader, FILE_CODE, HEADER_SIZE, VERSION};
pub use iter::{DbfIterator, FeatureIterator, ShpIterator};
pub use shapefile::Shapefile;
pub use shp::ShpFile;
pub use shx::{ShxFile, ShxIter, ShxRecord};
