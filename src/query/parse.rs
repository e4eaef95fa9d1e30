use crate::errors::DbError;
use bson::{Bson, Document};

use super::eval::build_regex;
use super::types::{
    CmpOp, Filter, FindOptions, FindRequest, MAX_FILTER_DEPTH, MAX_IN_SET, MAX_PATH_DEPTH,
    MAX_SORT_FIELDS, Order, Projection, QueryPlan, SortSpec,
};

/// Parses a JSON object (relaxed or canonical Extended JSON) into a document.
///
/// # Errors
/// Returns `DbError::Query` if the text is not a JSON object.
pub fn parse_json_document(json: &str) -> Result<Document, DbError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DbError::Query(format!("invalid JSON: {e}")))?;
    match Bson::try_from(value).map_err(|e| DbError::Query(e.to_string()))? {
        Bson::Document(d) => Ok(d),
        other => Err(DbError::Query(format!("expected a JSON object, got {:?}", other.element_type()))),
    }
}

/// Converts a MongoDB-style filter document into a `Filter` tree.
///
/// # Errors
/// Returns `DbError::Query` for unknown operators, wrongly typed operands or invalid paths.
pub fn parse_filter(doc: &Document) -> Result<Filter, DbError> {
    parse_clauses(doc, 0)
}

fn parse_clauses(doc: &Document, depth: usize) -> Result<Filter, DbError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(DbError::Query("filter nested too deeply".into()));
    }
    let mut clauses = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        if key.starts_with('$') {
            let subs = logical_operands(key, value, depth)?;
            clauses.push(match key.as_str() {
                "$and" => Filter::And(subs),
                "$or" => Filter::Or(subs),
                _ => Filter::Nor(subs),
            });
            continue;
        }
        check_path(key)?;
        match value {
            Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                clauses.push(parse_operators(key, ops, depth + 1)?);
            }
            Bson::RegularExpression(_) => clauses.push(regex_filter(key, value, None)?),
            v => clauses.push(Filter::Cmp { path: key.clone(), op: CmpOp::Eq, value: v.clone() }),
        }
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn logical_operands(key: &str, value: &Bson, depth: usize) -> Result<Vec<Filter>, DbError> {
    if !matches!(key, "$and" | "$or" | "$nor") {
        return Err(DbError::Query(format!("unknown top level operator: {key}")));
    }
    let Bson::Array(items) = value else {
        return Err(DbError::Query(format!("{key} must be an array")));
    };
    if items.is_empty() {
        return Err(DbError::Query(format!("{key} must be a nonempty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_clauses(d, depth + 1),
            _ => Err(DbError::Query(format!("{key} entries must be objects"))),
        })
        .collect()
}

fn parse_operators(path: &str, ops: &Document, depth: usize) -> Result<Filter, DbError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(DbError::Query("filter nested too deeply".into()));
    }
    let options = match ops.get("$options") {
        None => None,
        Some(Bson::String(o)) => Some(o.as_str()),
        Some(_) => return Err(DbError::Query("$options needs a string".into())),
    };
    if options.is_some() && !ops.contains_key("$regex") {
        return Err(DbError::Query(format!("$options without $regex for {path}")));
    }
    let mut parts = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let cmp = |kind| Filter::Cmp { path: path.to_string(), op: kind, value: operand.clone() };
        let f = match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$ne" => cmp(CmpOp::Ne),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$in" | "$nin" => {
                let Bson::Array(values) = operand else {
                    return Err(DbError::Query(format!("{op} needs an array")));
                };
                if values.len() > MAX_IN_SET {
                    return Err(DbError::Query(format!("{op} accepts at most {MAX_IN_SET} values")));
                }
                if op.as_str() == "$in" {
                    Filter::In { path: path.to_string(), values: values.clone() }
                } else {
                    Filter::Nin { path: path.to_string(), values: values.clone() }
                }
            }
            "$regex" => regex_filter(path, operand, options)?,
            "$options" => continue,
            "$exists" => Filter::Exists { path: path.to_string(), exists: truthy(operand)? },
            "$not" => match operand {
                Bson::Document(inner) if !inner.is_empty() && inner.keys().all(|k| k.starts_with('$')) => {
                    Filter::Not(Box::new(parse_operators(path, inner, depth + 1)?))
                }
                Bson::RegularExpression(_) => Filter::Not(Box::new(regex_filter(path, operand, None)?)),
                _ => return Err(DbError::Query("$not needs an operator object".into())),
            },
            _ if op.starts_with('$') => return Err(DbError::Query(format!("unknown operator: {op}"))),
            _ => {
                return Err(DbError::Query(format!(
                    "cannot mix operators and fields in the condition for {path}"
                )));
            }
        };
        parts.push(f);
    }
    Ok(if parts.len() == 1 { parts.remove(0) } else { Filter::And(parts) })
}

fn regex_filter(path: &str, operand: &Bson, options: Option<&str>) -> Result<Filter, DbError> {
    let (pattern, inline) = match operand {
        Bson::String(p) => (p.clone(), String::new()),
        Bson::RegularExpression(r) => (r.pattern.clone(), r.options.clone()),
        _ => return Err(DbError::Query(format!("$regex for {path} needs a string"))),
    };
    let options = options.map_or(inline, str::to_string);
    build_regex(&pattern, &options)?;
    Ok(Filter::Regex { path: path.to_string(), pattern, options })
}

/// Parses a sort document such as `{ "imdb.rating": -1, "title": 1 }`.
///
/// # Errors
/// Returns `DbError::Query` when a direction is not 1 or -1 or there are too many keys.
pub fn parse_sort(doc: &Document) -> Result<Vec<SortSpec>, DbError> {
    if doc.len() > MAX_SORT_FIELDS {
        return Err(DbError::Query(format!("sort accepts at most {MAX_SORT_FIELDS} keys")));
    }
    doc.iter()
        .map(|(field, dir)| {
            check_path(field)?;
            Ok(SortSpec { field: field.clone(), order: sort_order(field, dir)? })
        })
        .collect()
}

fn sort_order(field: &str, dir: &Bson) -> Result<Order, DbError> {
    match as_number(dir) {
        Some(n) if n == 1.0 => Ok(Order::Asc),
        Some(n) if n == -1.0 => Ok(Order::Desc),
        _ => Err(DbError::Query(format!("bad sort direction for {field}: {dir}"))),
    }
}

/// Parses a projection document such as `{ "_id": 0, "title": 1, "imdb": 1 }`.
///
/// # Errors
/// Returns `DbError::Query` when inclusion and exclusion are mixed or a value is not 0/1.
pub fn parse_projection(doc: &Document) -> Result<Projection, DbError> {
    let mut include: Vec<String> = Vec::new();
    let mut exclude: Vec<String> = Vec::new();
    let mut include_id = true;
    for (field, value) in doc {
        check_path(field)?;
        let keep = truthy(value)
            .map_err(|_| DbError::Query(format!("unsupported projection value for {field}: {value}")))?;
        if field == "_id" {
            include_id = keep;
        } else if keep {
            if let Some(ex) = exclude.first() {
                return Err(DbError::Query(format!(
                    "cannot do inclusion on field {field} in exclusion projection (excludes {ex})"
                )));
            }
            include.push(field.clone());
        } else {
            if let Some(inc) = include.first() {
                return Err(DbError::Query(format!(
                    "cannot do exclusion on field {field} in inclusion projection (includes {inc})"
                )));
            }
            exclude.push(field.clone());
        }
    }
    // `{_id: 1}` alone is an inclusion projection of just the identifier.
    let id_only_inclusion = include.is_empty() && exclude.is_empty() && doc.contains_key("_id") && include_id;
    Ok(if !include.is_empty() || id_only_inclusion {
        Projection::Include { fields: include, include_id }
    } else {
        Projection::Exclude { fields: exclude, include_id }
    })
}

impl FindRequest {
    /// Checks the shape of filter, sort and projection and keeps the documents as written.
    ///
    /// Only structure is checked here: logical operators take non-empty arrays of
    /// objects, field paths are well formed, sort directions are 1 or -1 (or a `$meta`
    /// document) and plain projection flags do not mix inclusion with exclusion. Which
    /// operators exist is up to the server.
    ///
    /// # Errors
    /// Returns `DbError::Query` when one of the documents is malformed.
    pub fn new(filter: Document, opts: FindOptions) -> Result<Self, DbError> {
        check_filter_shape(&filter, 0)?;
        if let Some(sort) = &opts.sort {
            check_sort_shape(sort)?;
        }
        if let Some(projection) = &opts.projection {
            check_projection_shape(projection)?;
        }
        Ok(Self {
            filter,
            sort: opts.sort,
            projection: opts.projection,
            batch_size: opts.batch_size,
            limit: opts.limit,
            skip: opts.skip,
        })
    }
}

impl QueryPlan {
    /// Compiles a request into the operators the in-process server evaluates.
    ///
    /// # Errors
    /// Returns `DbError::Query` for operators outside that set.
    pub fn compile(req: &FindRequest) -> Result<Self, DbError> {
        Ok(Self {
            filter: parse_filter(&req.filter)?,
            sort: req.sort.as_ref().map(parse_sort).transpose()?.unwrap_or_default(),
            projection: req.projection.as_ref().map(parse_projection).transpose()?,
        })
    }
}

fn check_filter_shape(doc: &Document, depth: usize) -> Result<(), DbError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(DbError::Query("filter nested too deeply".into()));
    }
    for (key, value) in doc {
        match key.as_str() {
            "$and" | "$or" | "$nor" => {
                let Bson::Array(items) = value else {
                    return Err(DbError::Query(format!("{key} must be an array")));
                };
                if items.is_empty() {
                    return Err(DbError::Query(format!("{key} must be a nonempty array")));
                }
                for item in items {
                    let Bson::Document(d) = item else {
                        return Err(DbError::Query(format!("{key} entries must be objects")));
                    };
                    check_filter_shape(d, depth + 1)?;
                }
            }
            k if k.starts_with('$') => {}
            _ => check_path(key)?,
        }
    }
    Ok(())
}

fn check_sort_shape(doc: &Document) -> Result<(), DbError> {
    if doc.len() > MAX_SORT_FIELDS {
        return Err(DbError::Query(format!("sort accepts at most {MAX_SORT_FIELDS} keys")));
    }
    for (field, dir) in doc {
        check_path(field)?;
        if !matches!(dir, Bson::Document(_)) {
            sort_order(field, dir)?;
        }
    }
    Ok(())
}

fn check_projection_shape(doc: &Document) -> Result<(), DbError> {
    let mut include: Option<&str> = None;
    let mut exclude: Option<&str> = None;
    for (field, value) in doc {
        check_path(field)?;
        // operator projections ($slice, $elemMatch, ...) are the server's business
        let Ok(keep) = truthy(value) else { continue };
        if field == "_id" {
            continue;
        }
        match (keep, include, exclude) {
            (true, _, Some(ex)) => {
                return Err(DbError::Query(format!(
                    "cannot do inclusion on field {field} in exclusion projection (excludes {ex})"
                )));
            }
            (false, Some(inc), _) => {
                return Err(DbError::Query(format!(
                    "cannot do exclusion on field {field} in inclusion projection (includes {inc})"
                )));
            }
            (true, _, None) => include = include.or(Some(field.as_str())),
            (false, None, _) => exclude = exclude.or(Some(field.as_str())),
        }
    }
    Ok(())
}

fn check_path(path: &str) -> Result<(), DbError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(DbError::Query(format!("invalid field path: '{path}'")));
    }
    if path.split('.').count() > MAX_PATH_DEPTH {
        return Err(DbError::Query(format!("field path too deep: {path}")));
    }
    Ok(())
}

fn as_number(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn truthy(v: &Bson) -> Result<bool, DbError> {
    match v {
        Bson::Boolean(b) => Ok(*b),
        other => as_number(other)
            .map(|n| n != 0.0)
            .ok_or_else(|| DbError::Query(format!("expected a boolean or number, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn implicit_equality_and_operators() {
        let f = parse_filter(&doc! {"title": "The Room", "year": {"$gte": 2000, "$lt": 2010}}).unwrap();
        let Filter::And(parts) = f else { panic!("expected And") };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], Filter::Cmp { path: "title".into(), op: CmpOp::Eq, value: "The Room".into() });
        assert!(matches!(&parts[1], Filter::And(inner) if inner.len() == 2));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(parse_filter(&doc! {}).unwrap(), Filter::True);
    }

    #[test]
    fn embedded_document_without_operators_is_literal() {
        let f = parse_filter(&doc! {"imdb": {"rating": 3.7}}).unwrap();
        assert!(matches!(f, Filter::Cmp { op: CmpOp::Eq, value: Bson::Document(_), .. }));
    }

    #[test]
    fn rejects_malformed_filters() {
        assert!(parse_filter(&doc! {"$where": "1"}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"a": {"$bogus": 1}}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"a": {"$in": 1}}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"$or": []}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"a": {"$gt": 1, "b": 2}}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"a..b": 1}).unwrap_err().is_query());
    }

    #[test]
    fn sort_directions() {
        let s = parse_sort(&doc! {"rating": -1, "title": 1.0}).unwrap();
        assert_eq!(s[0], SortSpec { field: "rating".into(), order: Order::Desc });
        assert_eq!(s[1].order, Order::Asc);
        assert!(parse_sort(&doc! {"rating": 2}).unwrap_err().is_query());
        assert!(parse_sort(&doc! {"rating": "desc"}).unwrap_err().is_query());
    }

    #[test]
    fn projection_modes() {
        let p = parse_projection(&doc! {"_id": 0, "title": 1, "imdb": 1}).unwrap();
        assert_eq!(p, Projection::Include { fields: vec!["title".into(), "imdb".into()], include_id: false });
        let p = parse_projection(&doc! {"plot": 0}).unwrap();
        assert_eq!(p, Projection::Exclude { fields: vec!["plot".into()], include_id: true });
        let p = parse_projection(&doc! {"_id": 1}).unwrap();
        assert_eq!(p, Projection::Include { fields: vec![], include_id: true });
        assert!(parse_projection(&doc! {"title": 1, "plot": 0}).unwrap_err().is_query());
        assert!(parse_projection(&doc! {"title": "yes"}).unwrap_err().is_query());
    }

    #[test]
    fn json_documents() {
        let d = parse_json_document(r#"{"title": "The Room", "n": {"$numberInt": "3"}}"#).unwrap();
        assert_eq!(d.get_str("title").unwrap(), "The Room");
        assert_eq!(d.get_i32("n").unwrap(), 3);
        assert!(parse_json_document("[1,2]").unwrap_err().is_query());
        assert!(parse_json_document("{nope").unwrap_err().is_query());
    }

    #[test]
    fn regex_operators() {
        let f = parse_filter(&doc! {"title": {"$regex": "^the room$", "$options": "i"}}).unwrap();
        assert_eq!(f, Filter::Regex { path: "title".into(), pattern: "^the room$".into(), options: "i".into() });
        let re = bson::Regex { pattern: "^Heat".into(), options: "m".into() };
        let f = parse_filter(&doc! {"title": Bson::RegularExpression(re)}).unwrap();
        assert_eq!(f, Filter::Regex { path: "title".into(), pattern: "^Heat".into(), options: "m".into() });
        assert!(parse_filter(&doc! {"title": {"$regex": "("}}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"title": {"$options": "i"}}).unwrap_err().is_query());
        assert!(parse_filter(&doc! {"title": {"$regex": 5}}).unwrap_err().is_query());
    }

    #[test]
    fn request_keeps_server_side_operators_as_written() {
        let filter = doc! {
            "title": {"$regex": "^The", "$options": "i"},
            "genres": {"$all": ["Drama", "Romance"]},
            "awards": {"$elemMatch": {"wins": {"$gt": 1}}},
            "$or": [{"cast": {"$size": 2}}, {"year": {"$type": "int"}}],
        };
        let opts = FindOptions {
            sort: Some(doc! {"score": {"$meta": "textScore"}, "year": -1}),
            projection: Some(doc! {"comments": {"$slice": 5}, "title": 1}),
            ..FindOptions::default()
        };
        let req = FindRequest::new(filter.clone(), opts).unwrap();
        assert_eq!(req.filter, filter);
        assert_eq!(req.projection, Some(doc! {"comments": {"$slice": 5}, "title": 1}));
        assert!(QueryPlan::compile(&req).unwrap_err().is_query());
    }

    #[test]
    fn request_rejects_malformed_shapes() {
        let bad_filter = [doc! {"$and": 1}, doc! {"$or": []}, doc! {"$nor": [1]}, doc! {"a..b": 1}];
        for filter in bad_filter {
            assert!(FindRequest::new(filter, FindOptions::default()).unwrap_err().is_query());
        }
        let sort = FindOptions { sort: Some(doc! {"year": "up"}), ..FindOptions::default() };
        assert!(FindRequest::new(doc! {}, sort).unwrap_err().is_query());
        let mixed = FindOptions { projection: Some(doc! {"title": 1, "plot": 0}), ..FindOptions::default() };
        assert!(FindRequest::new(doc! {}, mixed).unwrap_err().is_query());
        let id_only = FindOptions { projection: Some(doc! {"title": 1, "_id": 0}), ..FindOptions::default() };
        assert!(FindRequest::new(doc! {}, id_only).is_ok());
    }

    #[test]
    fn compiled_plan_parses_every_part() {
        let opts = FindOptions {
            sort: Some(doc! {"year": -1}),
            projection: Some(doc! {"title": 1}),
            ..FindOptions::default()
        };
        let plan = QueryPlan::compile(&FindRequest::new(doc! {"year": 2003}, opts).unwrap()).unwrap();
        assert!(matches!(plan.filter, Filter::Cmp { op: CmpOp::Eq, .. }));
        assert_eq!(plan.sort, vec![SortSpec { field: "year".into(), order: Order::Desc }]);
        assert_eq!(plan.projection, Some(Projection::Include { fields: vec!["title".into()], include_id: true }));
    }
}
