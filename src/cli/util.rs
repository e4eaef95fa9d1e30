use crate::errors::DbError;
use crate::query::parse_json_document;
use crate::types::Document;
use bson::Bson;

/// Accepts either a JSON sort document or the short form `-rating,title`.
pub fn parse_sort_arg(s: &str) -> Result<Document, DbError> {
    if s.trim_start().starts_with('{') {
        return parse_json_document(s);
    }
    let mut out = Document::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (dir, field) = if let Some(rest) = part.strip_prefix('-') {
            (-1, rest)
        } else if let Some(rest) = part.strip_prefix('+') {
            (1, rest)
        } else {
            (1, part)
        };
        out.insert(field, dir);
    }
    Ok(out)
}

/// Accepts either a JSON projection document or `title,imdb,-_id`.
pub fn parse_project_arg(s: &str) -> Result<Document, DbError> {
    if s.trim_start().starts_with('{') {
        return parse_json_document(s);
    }
    let mut out = Document::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('-') {
            Some(field) => out.insert(field, 0),
            None => out.insert(part, 1),
        };
    }
    Ok(out)
}

/// Relaxed Extended JSON on one line.
pub fn render_doc(doc: &Document) -> String {
    Bson::Document(doc.clone()).into_relaxed_extjson().to_string()
}

pub fn render_opt(doc: Option<&Document>) -> String {
    doc.map_or_else(|| "null".to_string(), render_doc)
}

pub fn render_array(docs: &[Document]) -> String {
    let items: Vec<Bson> = docs.iter().cloned().map(Bson::Document).collect();
    Bson::Array(items).into_relaxed_extjson().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sort_short_form() {
        assert_eq!(parse_sort_arg("-rating, title").unwrap(), doc! {"rating": -1, "title": 1});
        assert_eq!(parse_sort_arg("{\"rating\": -1}").unwrap(), doc! {"rating": -1});
        assert!(parse_sort_arg("{oops").unwrap_err().is_query());
    }

    #[test]
    fn project_short_form() {
        assert_eq!(parse_project_arg("-_id,title,imdb").unwrap(), doc! {"_id": 0, "title": 1, "imdb": 1});
    }

    #[test]
    fn rendering() {
        assert_eq!(render_opt(None), "null");
        assert_eq!(render_doc(&doc! {"title": "The Room", "n": 3}), r#"{"title":"The Room","n":3}"#);
        assert_eq!(render_array(&[]), "[]");
        assert_eq!(render_array(&[doc! {"a": 1}, doc! {"a": 2}]), r#"[{"a":1},{"a":2}]"#);
    }
}
