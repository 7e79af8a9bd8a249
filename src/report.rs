use std::io::{self, Write};

use bson::{Bson, Document};
use serde_json::Value;

/// Relaxed extended JSON, the form the shell prints: plain numbers, `{"$oid": ...}` ids.
pub fn to_json(document: &Document) -> Value {
    Bson::Document(document.clone()).into_relaxed_extjson()
}

pub fn write_documents<W: Write>(out: &mut W, documents: &[Document]) -> io::Result<()> {
    let values: Vec<Value> = documents.iter().map(to_json).collect();
    let rendered = serde_json::to_string_pretty(&values).map_err(io::Error::other)?;
    writeln!(out, "{rendered}")
}

pub fn write_document<W: Write>(out: &mut W, document: &Document) -> io::Result<()> {
    let rendered = serde_json::to_string_pretty(&to_json(document)).map_err(io::Error::other)?;
    writeln!(out, "{rendered}")
}
