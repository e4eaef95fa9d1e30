use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, Projection, SortSpec};
use crate::errors::DbError;

pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_empty() != *exists,
        Filter::In { path, values } => matches_any(&get_path(doc, path), values),
        Filter::Nin { path, values } => !matches_any(&get_path(doc, path), values),
        Filter::Cmp { path, op, value } => {
            let found = get_path(doc, path);
            match op {
                CmpOp::Eq => matches_eq(&found, value),
                CmpOp::Ne => !matches_eq(&found, value),
                CmpOp::Gt => ordered_match(&found, value, |o| o == Ordering::Greater),
                CmpOp::Gte => ordered_match(&found, value, |o| o != Ordering::Less),
                CmpOp::Lt => ordered_match(&found, value, |o| o == Ordering::Less),
                CmpOp::Lte => ordered_match(&found, value, |o| o != Ordering::Greater),
            }
        }
        Filter::Regex { path, pattern, options } => {
            let Ok(re) = build_regex(pattern, options) else { return false };
            let hit = |v: &Bson| matches!(v, Bson::String(s) if re.is_match(s));
            get_path(doc, path).into_iter().any(|v| match v {
                Bson::Array(items) => items.iter().any(|i| hit(i)),
                other => hit(other),
            })
        }
    }
}

/// Builds a regex from a pattern and the server's option letters.
///
/// # Errors
/// Returns `DbError::Query` for unknown options or a pattern that does not compile.
pub(crate) fn build_regex(pattern: &str, options: &str) -> Result<Regex, DbError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'u' => {}
            other => return Err(DbError::Query(format!("invalid regex option: {other}"))),
        }
    }
    builder.build().map_err(|e| DbError::Query(format!("invalid regex /{pattern}/: {e}")))
}

// A missing field equals null; an array matches when it or any element does.
fn matches_eq(found: &[&Bson], target: &Bson) -> bool {
    if found.is_empty() {
        return matches!(target, Bson::Null);
    }
    found.iter().any(|v| {
        values_equal(v, target) || matches!(v, Bson::Array(items) if items.iter().any(|i| values_equal(i, target)))
    })
}

fn matches_any(found: &[&Bson], set: &[Bson]) -> bool {
    set.iter().any(|t| matches_eq(found, t))
}

fn ordered_match(found: &[&Bson], target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |v: &Bson| same_bracket(v, target) && accept(compare_bson(v, target));
    found.iter().copied().any(|v| match v {
        Bson::Array(items) if !matches!(target, Bson::Array(_)) => items.iter().any(|i| check(i)),
        other => check(other),
    })
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

fn same_bracket(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || a.element_type() == b.element_type()
}

pub fn compare_docs(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (sort_key(a, &s.field, s.order), sort_key(b, &s.field, s.order)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

// Arrays sort by their smallest element ascending and by their largest descending.
fn sort_key<'a>(doc: &'a Document, path: &str, order: Order) -> Option<&'a Bson> {
    let keys = get_path(doc, path).into_iter().flat_map(|v| match v {
        Bson::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    });
    match order {
        Order::Asc => keys.min_by(|x, y| compare_bson(x, y)),
        Order::Desc => keys.max_by(|x, y| compare_bson(x, y)),
    }
}

/// Every value `path` reaches in `doc`. An array met before the last segment fans out
/// over its document elements; a numeric segment also selects the element at that index.
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    if path.is_empty() || path.len() > 1024 {
        return out;
    }
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() > MAX_PATH_DEPTH {
        return out;
    }
    if let Some(first) = doc.get(parts[0]) {
        collect_path(first, &parts[1..], &mut out);
    }
    out
}

fn collect_path<'a>(cur: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((part, tail)) = rest.split_first() else {
        out.push(cur);
        return;
    };
    match cur {
        Bson::Document(d) => {
            if let Some(v) = d.get(*part) {
                collect_path(v, tail, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(idx) = part.parse::<usize>()
                && let Some(v) = items.get(idx)
            {
                collect_path(v, tail, out);
            }
            for item in items {
                if let Bson::Document(d) = item
                    && let Some(v) = d.get(*part)
                {
                    collect_path(v, tail, out);
                }
            }
        }
        _ => {}
    }
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    use bson::Bson as T;
    match (a, b) {
        (T::Int32(x), T::Int32(y)) => return x.cmp(y),
        (T::Int64(x), T::Int64(y)) => return x.cmp(y),
        (T::Int32(x), T::Int64(y)) => return i64::from(*x).cmp(y),
        (T::Int64(x), T::Int32(y)) => return x.cmp(&i64::from(*y)),
        (T::Int32(x), T::Double(y)) => return cmp_int_double(i64::from(*x), *y),
        (T::Int64(x), T::Double(y)) => return cmp_int_double(*x, *y),
        (T::Double(x), T::Int32(y)) => return cmp_int_double(i64::from(*y), *x).reverse(),
        (T::Double(x), T::Int64(y)) => return cmp_int_double(*y, *x).reverse(),
        _ => {}
    }
    if is_num(a) && is_num(b) {
        return cmp_double(as_f64_num(a), as_f64_num(b));
    }
    match (a, b) {
        (T::String(x), T::String(y)) => x.cmp(y),
        (T::Boolean(x), T::Boolean(y)) => x.cmp(y),
        (T::DateTime(x), T::DateTime(y)) => x.cmp(y),
        (T::ObjectId(x), T::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (T::Array(x), T::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let o = compare_bson(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// NaN sorts below every other number and equals itself.
fn cmp_double(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Orders an integer against a double without rounding the integer.
#[allow(clippy::cast_possible_truncation)]
fn cmp_int_double(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // |whole| < 2^63, so the cast is exact
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => cmp_double(whole, f),
        other => other,
    }
}

// Cross-type ordering follows the server's comparison order.
fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 2,
        T::Symbol(_) | T::String(_) => 3,
        T::Document(_) => 4,
        T::Array(_) => 5,
        T::Binary(_) => 6,
        T::ObjectId(_) => 7,
        T::Boolean(_) => 8,
        T::DateTime(_) => 9,
        T::Timestamp(_) => 10,
        T::RegularExpression(_) => 11,
        T::DbPointer(_) => 12,
        T::JavaScriptCode(_) | T::JavaScriptCodeWithScope(_) => 13,
        T::MaxKey => 255,
    }
}

/// Applies a validated projection, returning a new document.
pub fn apply_projection(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::Include { fields, include_id } => {
            let mut out = Document::new();
            if *include_id && let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
            let paths: Vec<&str> = fields.iter().map(String::as_str).collect();
            for (k, v) in include_paths(doc, &paths) {
                if k != "_id" {
                    out.insert(k, v);
                }
            }
            out
        }
        Projection::Exclude { fields, include_id } => {
            let mut out = doc.clone();
            if !*include_id {
                out.remove("_id");
            }
            for f in fields {
                remove_path(&mut out, f);
            }
            out
        }
    }
}

fn include_paths(doc: &Document, paths: &[&str]) -> Document {
    let mut out = Document::new();
    for (k, v) in doc {
        if paths.iter().any(|p| *p == k.as_str()) {
            out.insert(k.clone(), v.clone());
            continue;
        }
        let prefix = format!("{k}.");
        let nested: Vec<&str> = paths.iter().filter_map(|p| p.strip_prefix(prefix.as_str())).collect();
        if nested.is_empty() {
            continue;
        }
        match v {
            Bson::Document(sub) => {
                let projected = include_paths(sub, &nested);
                if !projected.is_empty() {
                    out.insert(k.clone(), projected);
                }
            }
            Bson::Array(items) => {
                out.insert(k.clone(), project_array(items, &nested));
            }
            _ => {}
        }
    }
    out
}

// Document elements are projected one by one; scalar elements are dropped.
fn project_array(items: &[Bson], paths: &[&str]) -> Vec<Bson> {
    items
        .iter()
        .filter_map(|item| match item {
            Bson::Document(d) => Some(Bson::Document(include_paths(d, paths))),
            Bson::Array(inner) => Some(Bson::Array(project_array(inner, paths))),
            _ => None,
        })
        .collect()
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(sub)) => remove_path(sub, rest),
            Some(Bson::Array(items)) => {
                for item in items {
                    if let Bson::Document(sub) = item {
                        remove_path(sub, rest);
                    }
                }
            }
            _ => {}
        },
    }
}
