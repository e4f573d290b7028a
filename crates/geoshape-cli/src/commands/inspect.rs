use anyhow::Context;
use geoshape_core::{OpenMode, QueryFilter};
use geoshape_format::Shapefile;

use crate::types::{DbfJson, EnvelopeJson, FieldJson, InspectJson, ShpJson};

pub(crate) fn cmd_inspect(path: &str, json: bool) -> anyhow::Result<()> {
    let shapefile =
        Shapefile::open_path(path, OpenMode::Read).with_context(|| format!("open {path}"))?;
    let shp = shapefile.shp();
    let dbf = shapefile.dbf();
    let shp_header = shp.header()?;
    let dbf_header = dbf.header()?;

    let mut removed_count = 0u32;
    for slot in shp.index()?.iter()? {
        if slot.with_context(|| format!("read index of {path}"))?.is_deleted() {
            removed_count += 1;
        }
    }
    let no_fields: [&str; 0] = [];
    let mut deleted_count = 0u32;
    for row in dbf.iterator(&QueryFilter::new().with_fields(no_fields))? {
        if row.with_context(|| format!("read attributes of {path}"))?.deleted {
            deleted_count += 1;
        }
    }

    let last_update = dbf_header.last_update().map(|d| d.to_string());
    if json {
        let fields = dbf_header
            .fields()
            .iter()
            .map(|f| FieldJson {
                name: f.name.clone(),
                field_type: f.field_type.as_char().to_string(),
                length: f.length,
                decimal: f.decimal,
            })
            .collect();
        let out = InspectJson {
            path,
            shp: ShpJson {
                shape_type: shp_header.shape_type.name(),
                shape_type_code: shp_header.shape_type.code(),
                file_length_bytes: shp_header.file_length,
                record_count: shp.count()?,
                removed_count,
                envelope: EnvelopeJson::from_envelope(&shp_header.envelope),
            },
            dbf: DbfJson {
                file_type: dbf_header.file_type(),
                last_update,
                record_count: dbf_header.record_count(),
                deleted_count,
                header_length: dbf_header.header_length(),
                record_length: dbf_header.record_length(),
                fields,
            },
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Path: {path}");
    println!(
        "Shp: type={} ({}) file_len={} records={} removed={}",
        shp_header.shape_type,
        shp_header.shape_type.code(),
        shp_header.file_length,
        shp.count()?,
        removed_count
    );
    let env = &shp_header.envelope;
    if env.is_empty() {
        println!("Envelope: empty");
    } else {
        println!(
            "Envelope: minx={} miny={} maxx={} maxy={}",
            env.minx, env.miny, env.maxx, env.maxy
        );
    }
    println!(
        "Dbf: type=0x{:02x} updated={} records={} deleted={} header_len={} record_len={}",
        dbf_header.file_type(),
        last_update.as_deref().unwrap_or("unknown"),
        dbf_header.record_count(),
        deleted_count,
        dbf_header.header_length(),
        dbf_header.record_length()
    );

    let name_w = dbf_header
        .fields()
        .iter()
        .map(|f| f.name.len())
        .max()
        .unwrap_or(0)
        .max("Field".len());
    println!("{:<name_w$}  Type  Length  Decimal", "Field");
    println!("{:-<name_w$}  ----  ------  -------", "");
    for f in dbf_header.fields() {
        println!(
            "{:<name_w$}  {:<4}  {:>6}  {:>7}",
            f.name,
            f.field_type.as_char(),
            f.length,
            f.decimal
        );
    }
    Ok(())
}
