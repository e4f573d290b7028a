use anyhow::Context;
use geoshape_core::{OpenMode, QueryFilter};
use geoshape_format::Shapefile;

use crate::util::{parse_bbox, properties_line};

pub(crate) fn cmd_features(
    path: &str,
    from: u64,
    limit: Option<u64>,
    bbox: Option<&str>,
    fields: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let mut filter = QueryFilter::new().with_from(from);
    if let Some(limit) = limit {
        filter = filter.with_limit(limit);
    }
    if let Some(bbox) = bbox {
        filter = filter.with_envelope(parse_bbox(bbox)?);
    }
    if !fields.is_empty() {
        filter = filter.with_fields(fields.iter().cloned());
    }

    let shapefile =
        Shapefile::open_path(path, OpenMode::Read).with_context(|| format!("open {path}"))?;
    let features = shapefile
        .iterator(&filter)
        .with_context(|| format!("iterate {path}"))?;

    if json {
        let mut out = Vec::new();
        for feature in features {
            let feature = feature.with_context(|| format!("read feature from {path}"))?;
            out.push(feature.to_geojson());
        }
        let collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": out,
        });
        println!("{}", serde_json::to_string_pretty(&collection)?);
        return Ok(());
    }

    let mut n = 0usize;
    for feature in features {
        let feature = feature.with_context(|| format!("read feature from {path}"))?;
        let envelope = feature.geometry.envelope();
        let bounds = envelope
            .map(|e| format!("[{} {} {} {}]", e.minx, e.miny, e.maxx, e.maxy))
            .unwrap_or_else(|| "[]".to_string());
        println!(
            "{}\t{}\tpoints={}\tbbox={}\t{}",
            feature.id,
            feature.geometry.kind(),
            feature.geometry.point_count(),
            bounds,
            properties_line(&feature.properties)
        );
        n += 1;
    }
    if n == 0 {
        println!("No features.");
    }
    Ok(())
}
