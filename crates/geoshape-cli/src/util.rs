use anyhow::Context;
use geoshape_core::{Attributes, Envelope, FieldValue};

/// Parses `MINX,MINY,MAXX,MAXY`.
pub(crate) fn parse_bbox(s: &str) -> anyhow::Result<Envelope> {
    let parts = s
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<f64>()
                .with_context(|| format!("parse bbox coordinate {p:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let [minx, miny, maxx, maxy] = parts[..] else {
        anyhow::bail!("bbox must have 4 comma-separated numbers (MINX,MINY,MAXX,MAXY), got {s:?}");
    };
    if minx > maxx || miny > maxy {
        anyhow::bail!("bbox minimum exceeds maximum: {s:?}");
    }
    Ok(Envelope::new(minx, miny, maxx, maxy))
}

pub(crate) fn value_to_string(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => "null".to_string(),
        FieldValue::Logical(b) => b.to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        FieldValue::Character(s) => format!("{s:?}"),
    }
}

pub(crate) fn properties_line(properties: &Attributes) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{k}={}", value_to_string(v)))
        .collect::<Vec<_>>()
        .join(" ")
}
