use geoshape_core::Envelope;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct InspectJson<'a> {
    pub(crate) path: &'a str,
    pub(crate) shp: ShpJson,
    pub(crate) dbf: DbfJson,
}

#[derive(Serialize)]
pub(crate) struct ShpJson {
    pub(crate) shape_type: &'static str,
    pub(crate) shape_type_code: i32,
    pub(crate) file_length_bytes: u64,
    pub(crate) record_count: u32,
    pub(crate) removed_count: u32,
    pub(crate) envelope: Option<EnvelopeJson>,
}

#[derive(Serialize)]
pub(crate) struct DbfJson {
    pub(crate) file_type: u8,
    pub(crate) last_update: Option<String>,
    pub(crate) record_count: u32,
    pub(crate) deleted_count: u32,
    pub(crate) header_length: u16,
    pub(crate) record_length: u16,
    pub(crate) fields: Vec<FieldJson>,
}

#[derive(Serialize)]
pub(crate) struct FieldJson {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) field_type: String,
    pub(crate) length: u16,
    pub(crate) decimal: u8,
}

#[derive(Serialize)]
pub(crate) struct EnvelopeJson {
    pub(crate) minx: f64,
    pub(crate) miny: f64,
    pub(crate) maxx: f64,
    pub(crate) maxy: f64,
}

impl EnvelopeJson {
    /// `None` for the empty envelope, whose infinities JSON cannot carry.
    pub(crate) fn from_envelope(envelope: &Envelope) -> Option<Self> {
        (!envelope.is_empty()).then(|| Self {
            minx: envelope.minx,
            miny: envelope.miny,
            maxx: envelope.maxx,
            maxy: envelope.maxy,
        })
    }
}

#[derive(Serialize)]
pub(crate) struct RemoveJson<'a> {
    pub(crate) path: &'a str,
    pub(crate) id: u32,
    pub(crate) removed: bool,
}
