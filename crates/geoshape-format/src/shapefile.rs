use geoshape_core::error::Error;
use geoshape_core::{Attributes, Envelope, Feature, OpenMode, QueryFilter, Shape, ShapeType};
use std::path::Path;

use crate::dbf::{DbfField, DbfFile};
use crate::fileio::{check_id, sibling_path};
use crate::iter::FeatureIterator;
use crate::shp::ShpFile;

/// A `.shp`/`.shx`/`.dbf` triple opened and closed as one unit.
#[derive(Debug)]
pub struct Shapefile {
    shp: ShpFile,
    dbf: DbfFile,
}

impl Shapefile {
    /// `path` names the `.shp` file; the other two sit next to it.
    pub fn new(path: impl AsRef<Path>, mode: OpenMode) -> Self {
        let path = path.as_ref();
        Self {
            shp: ShpFile::new(path, mode),
            dbf: DbfFile::new(sibling_path(path, "dbf"), mode),
        }
    }

    pub fn open_path(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let mut shapefile = Self::new(path, mode);
        shapefile.open()?;
        Ok(shapefile)
    }

    /// Writes an empty triple. The returned handle is writable and not opened.
    pub fn create(
        path: impl AsRef<Path>,
        shape_type: ShapeType,
        fields: &[DbfField],
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        // the dbf validates its fields, so write it first
        let dbf = DbfFile::create_empty(sibling_path(path, "dbf"), fields)?;
        let shp = ShpFile::create_empty(path, shape_type)?;
        Ok(Self { shp, dbf })
    }

    pub fn open(&mut self) -> Result<(), Error> {
        self.shp.open()?;
        if let Err(e) = self.dbf.open() {
            self.shp.close();
            return Err(e);
        }
        let (shapes, rows) = (self.shp.count()?, self.dbf.count()?);
        if shapes != rows {
            tracing::warn!(
                path = %self.shp.path().display(),
                shapes,
                rows,
                "geometry and attribute record counts differ"
            );
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.shp.close();
        self.dbf.close();
    }

    pub fn is_open(&self) -> bool {
        self.shp.is_open() && self.dbf.is_open()
    }

    pub fn shp(&self) -> &ShpFile {
        &self.shp
    }

    pub fn dbf(&self) -> &DbfFile {
        &self.dbf
    }

    pub fn count(&self) -> Result<u32, Error> {
        self.shp.count()
    }

    pub fn envelope(&self) -> Result<Envelope, Error> {
        self.shp.envelope()
    }

    pub fn shape_type(&self) -> Result<ShapeType, Error> {
        self.shp.shape_type()
    }

    pub fn fields(&self) -> Result<&[DbfField], Error> {
        self.dbf.fields()
    }

    /// Feature `id`, or `None` when it has no geometry.
    pub fn get(&self, id: u32, fields: Option<&[&str]>) -> Result<Option<Feature>, Error> {
        let Some(geometry) = self.shp.get(id)? else {
            return Ok(None);
        };
        let row = self.dbf.get(id, fields)?;
        Ok(Some(Feature::new(geometry, row.values)))
    }

    /// Joined traversal: `from`/`limit` apply to both files, `envelope` to the
    /// geometry and `fields` to the attributes.
    pub fn iterator(&self, filter: &QueryFilter) -> Result<FeatureIterator<'_>, Error> {
        Ok(FeatureIterator::new(
            self.shp.iterator(filter)?,
            self.dbf.iterator(filter)?,
        ))
    }

    /// Appends a feature to both files and returns its id.
    ///
    /// The attributes are checked before the geometry is written, so a bad
    /// row leaves both files unchanged.
    pub fn push_feature(&mut self, shape: &Shape, attributes: Attributes) -> Result<u32, Error> {
        self.dbf.check_row(&attributes)?;
        let id = self.shp.push(shape)?;
        self.dbf.push_row(attributes);
        self.dbf.flush()?;
        Ok(id)
    }

    /// Soft-deletes feature `id` in both files.
    pub fn remove_at(&mut self, id: u32) -> Result<(), Error> {
        check_id(id, self.shp.count()?)?;
        check_id(id, self.dbf.count()?)?;
        self.shp.remove_at(id)?;
        self.dbf.remove_at(id)
    }
}
