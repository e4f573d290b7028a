use anyhow::Context;
use geoshape_core::OpenMode;
use geoshape_format::Shapefile;

use crate::types::RemoveJson;

pub(crate) fn cmd_remove(path: &str, id: u32, json: bool) -> anyhow::Result<()> {
    let mut shapefile =
        Shapefile::open_path(path, OpenMode::ReadWrite).with_context(|| format!("open {path}"))?;
    shapefile
        .remove_at(id)
        .with_context(|| format!("remove feature {id} from {path}"))?;
    shapefile.close();

    if json {
        let out = RemoveJson {
            path,
            id,
            removed: true,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Removed feature {id} from {path}");
    }
    Ok(())
}
