use crate::errors::DbError;
use crate::types::Document;
use bson::Bson;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Reads seed documents from a JSON array file or an NDJSON file (one object per line).
///
/// Values may use relaxed or canonical Extended JSON (`{"$oid": ...}`, `{"$date": ...}`).
///
/// # Errors
/// Returns `DbError::Io` when the file cannot be read and `DbError::Config`, naming the
/// file, when it is not valid JSON or a record is not a JSON object.
pub fn read_seed_file(path: &Path) -> Result<Vec<Document>, DbError> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let array_mode = {
        let head = reader.fill_buf()?;
        String::from_utf8_lossy(head).trim_start().starts_with('[')
    };
    if array_mode {
        let mut s = String::new();
        reader.read_to_string(&mut s)?;
        let val: serde_json::Value =
            serde_json::from_str(&s).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
        let arr = val
            .as_array()
            .ok_or_else(|| DbError::Config(format!("{}: expected JSON array", path.display())))?;
        return arr.iter().enumerate().map(|(i, v)| to_document(v.clone(), i + 1, path)).collect();
    }
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| DbError::Config(format!("{}:{}: {e}", path.display(), idx + 1)))?;
        out.push(to_document(v, idx + 1, path)?);
    }
    log::info!("loaded {} seed documents from {}", out.len(), path.display());
    Ok(out)
}

fn to_document(v: serde_json::Value, record: usize, path: &Path) -> Result<Document, DbError> {
    let value = Bson::try_from(v)
        .map_err(|e| DbError::Config(format!("{}: record {record}: {e}", path.display())))?;
    match value {
        Bson::Document(d) => Ok(d),
        _ => Err(DbError::Config(format!("{}: record {record} is not an object", path.display()))),
    }
}
