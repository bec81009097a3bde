//! Textual renderers: SNAPSHOT and ->JSON
//!
//! Both stream through a [`BoundedWriter`] so a pathological value (a huge
//! list, a series with millions of points, a multi-megabyte byte array) fails
//! with `BoundExceeded` instead of exhausting memory. Nothing larger than
//! [`CHUNK`] is formatted ahead of the guard.
//!
//! # Snapshot format
//!
//! - Int: `42`
//! - Float: `3.0` (always with a decimal point), `NaN`, `Infinity`
//! - Bool: `true` / `false`
//! - String: `"hello"` (with escaping)
//! - Bytes: `0x01ff`
//! - List: `[ 1 2 3 ]`, empty `[]`
//! - Series, shape, macro: one-line summaries such as `<GTS temp{room=1} 3 points>`
//!
//! # JSON format
//!
//! Scalars map to their JSON counterparts, bytes to a hex string, lists to
//! arrays. Series become `{"class", "labels", "points"}` objects, shapes
//! `{"cells": [[south, west, north, east], ...]}`. Macros cannot be rendered
//! and non-finite numbers (values, coordinates, cell bounds) are rejected
//! rather than silently turned into `null`. The JSON ceiling counts UTF-8 bytes.

use crate::bounded::{BoundedWriter, sink_error};
use crate::config::{Properties, keys};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use tempo_core::{DataPoint, GeoBox, GeoTimeSeries, Operator, Result, ScriptError, Stack, Value};

/// Default ceiling for both renderers
pub const DEFAULT_MAXCHARS: u64 = 1_000_000;

/// Largest piece formatted before it is handed to the guard
pub const CHUNK: usize = 4096;

fn limit_from(props: &Properties, key: &str) -> usize {
    usize::try_from(props.get_u64(key, DEFAULT_MAXCHARS)).unwrap_or(usize::MAX)
}

/// Render `value` in snapshot form, failing once `limit` chars are exceeded
pub fn snapshot(value: &Value, limit: usize) -> Result<String> {
    let mut out = BoundedWriter::new(String::new(), limit);
    write_snapshot(value, &mut out)?;
    Ok(out.into_inner())
}

fn write_snapshot<W: fmt::Write>(value: &Value, out: &mut BoundedWriter<W>) -> Result<()> {
    match value {
        Value::Int(n) => out.append(&n.to_string()),
        Value::Float(f) => out.append(&format_float(*f)),
        Value::Bool(b) => out.append(if *b { "true" } else { "false" }),
        Value::String(s) => write_escaped(s, out),
        Value::Bytes(b) => {
            out.append("0x")?;
            b.chunks(CHUNK / 2).try_for_each(|chunk| out.append(&hex::encode(chunk)))
        }
        Value::List(items) => {
            if items.is_empty() {
                return out.append("[]");
            }
            out.append("[")?;
            for item in items.iter() {
                out.append(" ")?;
                write_snapshot(item, out)?;
            }
            out.append(" ]")
        }
        Value::Series(gts) => write_series_summary(gts, out),
        Value::Shape(shape) => out.append(&format!("<GEOSHAPE {} cells>", shape.cells().len())),
        Value::Macro(code) => {
            out.append("<MACRO ")?;
            if let Some(name) = code.name() {
                out.append(name)?;
                out.append(" ")?;
            }
            out.append(&format!("({} instructions)>", code.len()))
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let mut s = f.to_string();
    // Keep floats distinguishable from ints
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

/// Quote and escape `s`, flushing every [`CHUNK`] bytes
fn write_escaped<W: fmt::Write>(s: &str, out: &mut BoundedWriter<W>) -> Result<()> {
    let mut buf = String::with_capacity(s.len().min(CHUNK) + 8);
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if c.is_control() => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push(c),
        }
        if buf.len() >= CHUNK {
            out.append(&buf)?;
            buf.clear();
        }
    }
    buf.push('"');
    out.append(&buf)
}

fn write_series_summary<W: fmt::Write>(
    gts: &GeoTimeSeries,
    out: &mut BoundedWriter<W>,
) -> Result<()> {
    out.append("<GTS ")?;
    out.append(gts.class())?;
    out.append("{")?;
    for (i, (key, value)) in gts.labels().iter().enumerate() {
        if i > 0 {
            out.append(",")?;
        }
        out.append(key)?;
        out.append("=")?;
        out.append(value)?;
    }
    out.append(&format!("}} {} points>", gts.len()))
}

/// Pops any value, pushes its snapshot text
pub struct Snapshot {
    name: String,
    limit: usize,
}

impl Snapshot {
    /// Ceiling read from `tempo.snapshot.maxchars`
    pub fn new(name: impl Into<String>, props: &Properties) -> Self {
        Self::with_limit(name, limit_from(props, keys::SNAPSHOT_MAXCHARS))
    }

    pub fn with_limit(name: impl Into<String>, limit: usize) -> Self {
        Self {
            name: name.into(),
            limit,
        }
    }
}

impl Operator for Snapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        stack.require(&self.name, 1)?;
        let text = snapshot(stack.peek()?, self.limit).map_err(|e| e.raised_by(&self.name))?;
        stack.pop()?;
        stack.push(text);
        Ok(())
    }
}

/// Hex digits of a byte array, formatted a chunk at a time
struct HexDisplay<'a>(&'a [u8]);

impl fmt::Display for HexDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .chunks(CHUNK / 2)
            .try_for_each(|chunk| f.write_str(&hex::encode(chunk)))
    }
}

#[derive(Serialize)]
struct SeriesJson<'a> {
    class: &'a str,
    labels: &'a BTreeMap<String, String>,
    points: PointsJson<'a>,
}

struct PointsJson<'a>(&'a [DataPoint]);

impl Serialize for PointsJson<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_seq(self.0.iter().map(PointJson::from))
    }
}

#[derive(Serialize)]
struct PointJson {
    timestamp: i64,
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lon: Option<f64>,
}

impl From<&DataPoint> for PointJson {
    fn from(p: &DataPoint) -> Self {
        Self {
            timestamp: p.timestamp,
            value: p.value,
            lat: p.location.map(|l| l.lat),
            lon: p.location.map(|l| l.lon),
        }
    }
}

struct CellsJson<'a>(&'a [GeoBox]);

impl Serialize for CellsJson<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_seq(self.0.iter().map(|c| [c.south, c.west, c.north, c.east]))
    }
}

struct Json<'a>(&'a Value);

impl Serialize for Json<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Int(n) => s.serialize_i64(*n),
            Value::Float(f) => s.serialize_f64(*f),
            Value::Bool(b) => s.serialize_bool(*b),
            Value::String(text) => s.serialize_str(text),
            Value::Bytes(bytes) => s.collect_str(&HexDisplay(bytes)),
            Value::List(items) => s.collect_seq(items.iter().map(Json)),
            Value::Series(gts) => SeriesJson {
                class: gts.class(),
                labels: gts.labels(),
                points: PointsJson(gts.points()),
            }
            .serialize(s),
            Value::Shape(shape) => {
                let mut map = s.serialize_map(Some(1))?;
                map.serialize_entry("cells", &CellsJson(shape.cells()))?;
                map.end()
            }
            Value::Macro(_) => Err(S::Error::custom("macros cannot be rendered as JSON")),
        }
    }
}

fn non_finite_point(p: &DataPoint) -> bool {
    !p.value.is_finite()
        || p
            .location
            .is_some_and(|l| !l.lat.is_finite() || !l.lon.is_finite())
}

fn non_finite_cell(c: &GeoBox) -> bool {
    [c.south, c.west, c.north, c.east]
        .iter()
        .any(|bound| !bound.is_finite())
}

/// Reject what JSON cannot represent before any output is produced
fn check_json(name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(ScriptError::value_error(
            name,
            format!("cannot represent {} in JSON.", format_float(*f)),
        )),
        Value::Series(gts) if gts.points().iter().any(non_finite_point) => Err(
            ScriptError::value_error(name, "cannot represent non-finite series points in JSON."),
        ),
        Value::Shape(shape) if shape.cells().iter().any(non_finite_cell) => Err(
            ScriptError::value_error(name, "cannot represent non-finite shape bounds in JSON."),
        ),
        Value::Macro(_) => Err(ScriptError::type_error(name, "cannot render a MACRO.")),
        Value::List(items) => items.iter().try_for_each(|item| check_json(name, item)),
        _ => Ok(()),
    }
}

fn write_json<W: io::Write>(
    name: &str,
    value: &Value,
    out: &mut BoundedWriter<W>,
) -> Result<()> {
    serde_json::to_writer(out, &Json(value)).map_err(|e| {
        if e.is_io() {
            sink_error(io::Error::from(e))
        } else {
            ScriptError::value_error(name, e.to_string())
        }
    })
}

/// Render `value` as compact JSON, failing once `limit` bytes are exceeded
pub fn to_json(name: &str, value: &Value, limit: usize) -> Result<String> {
    check_json(name, value)?;
    let mut out = BoundedWriter::new(Vec::new(), limit);
    write_json(name, value, &mut out).map_err(|e| e.raised_by(name))?;
    let bytes = out.close().map_err(sink_error)?;
    String::from_utf8(bytes).map_err(|e| ScriptError::value_error(name, e.to_string()))
}

/// Pops any value except a macro, pushes its JSON text
pub struct ToJson {
    name: String,
    limit: usize,
}

impl ToJson {
    /// Ceiling read from `tempo.json.maxchars`
    pub fn new(name: impl Into<String>, props: &Properties) -> Self {
        Self::with_limit(name, limit_from(props, keys::JSON_MAXCHARS))
    }

    pub fn with_limit(name: impl Into<String>, limit: usize) -> Self {
        Self {
            name: name.into(),
            limit,
        }
    }
}

impl Operator for ToJson {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        stack.require(&self.name, 1)?;
        let text = to_json(&self.name, stack.peek()?, self.limit)?;
        stack.pop()?;
        stack.push(text);
        Ok(())
    }
}
