use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "geoshape",
    version,
    about = "Inspect and edit ESRI shapefiles (.shp/.shx/.dbf)",
    long_about = "Inspect and edit ESRI shapefiles (.shp/.shx/.dbf).\n\nNotes:\n  - PATH names the .shp file; the .shx and .dbf must sit next to it.\n  - Ids are 1-based and shared by the geometry and attribute files.\n  - `remove` is a soft delete: bytes stay on disk and are never compacted."
)]
pub(crate) struct Cli {
    /// Emit machine-readable JSON instead of human output.
    #[arg(long)]
    pub(crate) json: bool,

    #[command(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the headers, record counts and field table of a shapefile.
    Inspect {
        /// Path to the `.shp` file.
        path: String,
    },
    /// Stream features (geometry joined with attributes).
    Features {
        /// Path to the `.shp` file.
        path: String,
        /// Number of records to skip before the first one returned.
        #[arg(long, default_value_t = 0)]
        from: u64,
        /// Maximum number of records to scan.
        #[arg(long)]
        limit: Option<u64>,
        /// Keep only features whose bounding box touches `MINX,MINY,MAXX,MAXY`.
        #[arg(long, value_name = "MINX,MINY,MAXX,MAXY", allow_hyphen_values = true)]
        bbox: Option<String>,
        /// Attribute field to include (repeatable; all fields if omitted).
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Print one feature by id.
    Get {
        /// Path to the `.shp` file.
        path: String,
        /// 1-based feature id.
        #[arg(long)]
        id: u32,
        /// Attribute field to include (repeatable; all fields if omitted).
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Soft-delete a feature in both the geometry and attribute files.
    Remove {
        /// Path to the `.shp` file.
        path: String,
        /// 1-based feature id.
        #[arg(long)]
        id: u32,
    },
}
