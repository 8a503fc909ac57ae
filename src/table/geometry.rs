//! Geometry cells and their WKT text codec.
//!
//! Geometry values cannot be written to columnar or container artifacts
//! directly; they are encoded to WKT before any write and decoded back on
//! read.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// A geometry cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    LineString(Vec<(f64, f64)>),
    /// Exterior ring only; the cache never interprets the shape.
    Polygon(Vec<(f64, f64)>),
}

impl Geometry {
    /// Encode to WKT.
    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Point { x, y } => format!("POINT ({} {})", x, y),
            Geometry::LineString(points) => {
                format!("LINESTRING ({})", format_coords(points))
            }
            Geometry::Polygon(ring) => format!("POLYGON (({}))", format_coords(ring)),
        }
    }

    /// Decode from WKT.
    pub fn from_wkt(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(body) = strip_tag(text, "POINT") {
            let coords = parse_coords(body)?;
            match coords.as_slice() {
                [(x, y)] => Ok(Geometry::Point { x: *x, y: *y }),
                _ => bail!("POINT must contain exactly one coordinate pair: {text}"),
            }
        } else if let Some(body) = strip_tag(text, "LINESTRING") {
            Ok(Geometry::LineString(parse_coords(body)?))
        } else if let Some(body) = strip_tag(text, "POLYGON") {
            let inner = body
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| anyhow!("POLYGON ring must be parenthesized: {text}"))?;
            Ok(Geometry::Polygon(parse_coords(inner)?))
        } else {
            bail!("unrecognized WKT geometry: {text}")
        }
    }
}

/// Strip `TAG (body)` and return the body, or None if the tag does not match.
fn strip_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(tag)?.trim_start();
    rest.strip_prefix('(')?.strip_suffix(')')
}

fn format_coords(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{} {}", x, y))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_coords(body: &str) -> Result<Vec<(f64, f64)>> {
    body.split(',')
        .map(|pair| {
            let mut parts = pair.split_whitespace();
            let x = parts
                .next()
                .ok_or_else(|| anyhow!("missing x coordinate in {pair:?}"))?
                .parse::<f64>()?;
            let y = parts
                .next()
                .ok_or_else(|| anyhow!("missing y coordinate in {pair:?}"))?
                .parse::<f64>()?;
            if parts.next().is_some() {
                bail!("coordinate pair has more than two components: {pair:?}");
            }
            Ok((x, y))
        })
        .collect()
}
