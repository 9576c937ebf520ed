use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, multispace0},
    combinator::{opt, recognize},
    error::ParseError,
    multi::separated_list1,
    sequence::{delimited, pair},
    IResult, Parser,
};

use super::errors::GeometryError;

/// A 2D coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// A coordinate pair as parsed from WKT. Keeps the raw numeric literal
/// slices so callers can forward the source text without a float
/// round-trip changing the digits.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint<'a> {
    pub x: f64,
    pub y: f64,
    pub raw_x: &'a str,
    pub raw_y: &'a str,
}

/// Axis-aligned bounding box with the extrema kept as the original
/// numeric literals.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min_x: String,
    pub min_y: String,
    pub max_x: String,
    pub max_y: String,
}

fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

/// Signed decimal literal, with optional fraction and exponent.
/// Matches: 123, -123, 3.14, -.5, 6.1e3, 1E-05
fn numeric_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        pair(
            opt(char('-')),
            alt((
                recognize((digit1, char('.'), digit1)),
                recognize(pair(char('.'), digit1)),
                digit1,
            )),
        ),
        opt(recognize((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            digit1,
        ))),
    ))
    .parse(input)
}

fn coordinate_pair(input: &str) -> IResult<&str, RawPoint<'_>> {
    let (remaining, (raw_x, raw_y)) = pair(ws(numeric_literal), ws(numeric_literal)).parse(input)?;
    // numeric_literal only admits slices that f64 parses
    let x = raw_x.parse::<f64>().unwrap_or(f64::NAN);
    let y = raw_y.parse::<f64>().unwrap_or(f64::NAN);
    Ok((remaining, RawPoint { x, y, raw_x, raw_y }))
}

fn ring(input: &str) -> IResult<&str, Vec<RawPoint<'_>>> {
    delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), coordinate_pair),
        ws(char(')')),
    )
    .parse(input)
}

fn polygon_body(input: &str) -> IResult<&str, Vec<Vec<RawPoint<'_>>>> {
    let (remaining, _) = ws(tag_no_case("POLYGON")).parse(input)?;
    delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), ring),
        ws(char(')')),
    )
    .parse(remaining)
}

/// Parse a WKT POLYGON and return its exterior ring. Interior rings are
/// accepted and discarded (only the outer boundary matters for bounding
/// box extraction).
pub fn parse_wkt_polygon(input: &str) -> Result<Vec<RawPoint<'_>>, GeometryError> {
    match polygon_body(input) {
        Ok((remaining, mut rings)) => {
            if !remaining.trim().is_empty() {
                return Err(GeometryError::malformed_wkt_with_context(
                    "trailing characters after polygon",
                    remaining,
                ));
            }
            // separated_list1 guarantees at least one ring
            Ok(rings.swap_remove(0))
        }
        Err(e) => Err(GeometryError::malformed_wkt_with_context(
            format!("parse failure: {}", e),
            input,
        )),
    }
}

/// Render points as `POLYGON ((x1 y1, x2 y2, ..., x1 y1))`, closing the
/// ring by repeating the first point unless the input already closes it.
/// Fewer than 3 points is not a polygon.
pub fn points_to_wkt_polygon(points: &[Point]) -> Result<String, GeometryError> {
    if points.len() < 3 {
        return Err(GeometryError::InvalidGeometry(points.len()));
    }

    let mut body = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            body.push_str(", ");
        }
        body.push_str(&format!("{} {}", p.x, p.y));
    }

    let first = &points[0];
    let last = &points[points.len() - 1];
    if first != last {
        body.push_str(&format!(", {} {}", first.x, first.y));
    }

    Ok(format!("POLYGON (({}))", body))
}

/// Extract the bounding box of a WKT polygon's exterior ring. The
/// extrema are returned as the original numeric literals from the WKT
/// text, not re-rendered floats.
pub fn extract_bounding_box(wkt: &str) -> Result<BoundingBox, GeometryError> {
    let points = parse_wkt_polygon(wkt)?;

    let mut min_x = &points[0];
    let mut max_x = &points[0];
    let mut min_y = &points[0];
    let mut max_y = &points[0];
    for p in &points[1..] {
        if p.x < min_x.x {
            min_x = p;
        }
        if p.x > max_x.x {
            max_x = p;
        }
        if p.y < min_y.y {
            min_y = p;
        }
        if p.y > max_y.y {
            max_y = p;
        }
    }

    Ok(BoundingBox {
        min_x: min_x.raw_x.to_string(),
        min_y: min_y.raw_y.to_string(),
        max_x: max_x.raw_x.to_string(),
        max_y: max_y.raw_y.to_string(),
    })
}
