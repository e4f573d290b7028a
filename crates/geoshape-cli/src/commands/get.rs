use anyhow::Context;
use geoshape_core::OpenMode;
use geoshape_format::Shapefile;

use crate::util::value_to_string;

pub(crate) fn cmd_get(path: &str, id: u32, fields: &[String], json: bool) -> anyhow::Result<()> {
    let shapefile =
        Shapefile::open_path(path, OpenMode::Read).with_context(|| format!("open {path}"))?;
    let names: Vec<&str> = fields.iter().map(String::as_str).collect();
    let projection = (!names.is_empty()).then_some(names.as_slice());

    let Some(feature) = shapefile
        .get(id, projection)
        .with_context(|| format!("read feature {id} from {path}"))?
    else {
        anyhow::bail!("feature {id} in {path} has no geometry (null shape or removed)");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&feature.to_geojson())?);
        return Ok(());
    }

    println!("Feature: id={} type={}", feature.id, feature.geometry.kind());
    for (i, part) in feature.geometry.parts().iter().enumerate() {
        let coords = part
            .iter()
            .map(|p| format!("({} {})", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  part {i}: {coords}");
    }
    for (name, value) in feature.properties.iter() {
        println!("  {name}: {}", value_to_string(value));
    }
    Ok(())
}
