//! `.map` text reader.
//!
//! Handles the QuakeEd standard side format, Valve 220 sides and the
//! optional trailing `contents flags value` integers of Quake II maps.

use crate::errors::MapParseError;
use crate::float_types::Real;
use crate::map::texinfo::TexProjection;
use crate::map::{Entity, MapBrush, MapFile, MapSide, Q2SideInfo};
use crate::plane::Plane;
use nalgebra::Point3;

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    line: usize,
    quoted: bool,
}

fn tokenize(text: &str) -> Result<Vec<Token<'_>>, MapParseError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        // comment
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if c == b'"' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'"' {
                if bytes[end] == b'\n' {
                    return Err(MapParseError::UnterminatedString { line });
                }
                end += 1;
            }
            if end >= bytes.len() {
                return Err(MapParseError::UnterminatedString { line });
            }
            tokens.push(Token {
                text: &text[start..end],
                line,
                quoted: true,
            });
            i = end + 1;
            continue;
        }
        // single-character punctuation
        if matches!(c, b'{' | b'}' | b'(' | b')' | b'[' | b']') {
            tokens.push(Token {
                text: &text[i..i + 1],
                line,
                quoted: false,
            });
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'{' | b'}' | b'(' | b')' | b'"')
        {
            i += 1;
        }
        tokens.push(Token {
            text: &text[start..i],
            line,
            quoted: false,
        });
    }

    Ok(tokens)
}

struct Cursor<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last().copied())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self, context: &'static str) -> Result<Token<'a>, MapParseError> {
        let token = self.peek().ok_or(MapParseError::UnexpectedEof {
            line: self.line(),
            context,
        })?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, literal: &'static str, context: &'static str) -> Result<(), MapParseError> {
        let token = self.next(context)?;
        if token.text != literal || token.quoted {
            return Err(MapParseError::Expected {
                line: token.line,
                expected: literal,
                found: token.text.to_string(),
            });
        }
        Ok(())
    }

    fn is_next(&self, literal: &str) -> bool {
        self.peek().is_some_and(|t| !t.quoted && t.text == literal)
    }

    fn number(&mut self, context: &'static str) -> Result<Real, MapParseError> {
        let token = self.next(context)?;
        token.text.parse::<Real>().map_err(|_| MapParseError::BadNumber {
            line: token.line,
            token: token.text.to_string(),
        })
    }

    fn integer(&mut self, context: &'static str) -> Result<i32, MapParseError> {
        let token = self.next(context)?;
        token
            .text
            .parse::<i32>()
            .or_else(|_| token.text.parse::<Real>().map(|v| v as i32))
            .map_err(|_| MapParseError::BadNumber {
                line: token.line,
                token: token.text.to_string(),
            })
    }

    /// A bare number token follows (used for the optional Quake II fields).
    fn number_follows(&self) -> bool {
        self.peek()
            .is_some_and(|t| !t.quoted && t.text.parse::<Real>().is_ok())
    }

    fn point(&mut self) -> Result<Point3<Real>, MapParseError> {
        self.expect("(", "brush side point")?;
        let x = self.number("brush side point")?;
        let y = self.number("brush side point")?;
        let z = self.number("brush side point")?;
        self.expect(")", "brush side point")?;
        Ok(Point3::new(x, y, z))
    }

    fn valve_axis(&mut self) -> Result<[Real; 4], MapParseError> {
        self.expect("[", "texture axis")?;
        let mut axis = [0.0; 4];
        for v in axis.iter_mut() {
            *v = self.number("texture axis")?;
        }
        self.expect("]", "texture axis")?;
        Ok(axis)
    }
}

/// One brush side. A side whose points are collinear is read and then
/// dropped with a warning.
fn parse_side(cursor: &mut Cursor<'_>) -> Result<Option<MapSide>, MapParseError> {
    let line = cursor.line();
    let p0 = cursor.point()?;
    let p1 = cursor.point()?;
    let p2 = cursor.point()?;
    let plane = Plane::from_points(&p0, &p1, &p2);

    let texture = cursor.next("texture name")?.text.to_string();

    let projection = if cursor.is_next("[") {
        let s = cursor.valve_axis()?;
        let t = cursor.valve_axis()?;
        let rotate = cursor.number("texture rotation")?;
        let sx = cursor.number("texture scale")?;
        let sy = cursor.number("texture scale")?;
        TexProjection::Valve {
            axes: [s, t],
            rotate,
            scale: [sx, sy],
        }
    } else {
        let shift_x = cursor.number("texture shift")?;
        let shift_y = cursor.number("texture shift")?;
        let rotate = cursor.number("texture rotation")?;
        let sx = cursor.number("texture scale")?;
        let sy = cursor.number("texture scale")?;
        TexProjection::Standard {
            shift: [shift_x, shift_y],
            rotate,
            scale: [sx, sy],
        }
    };

    let q2 = if cursor.number_follows() {
        let contents = cursor.integer("side contents")?;
        let flags = cursor.integer("side flags")?;
        let value = cursor.integer("side value")?;
        Some(Q2SideInfo {
            contents,
            flags,
            value,
        })
    } else {
        None
    };

    let Some(plane) = plane else {
        log::warn!("line {line}: brush side points are collinear, side dropped");
        return Ok(None);
    };

    Ok(Some(MapSide {
        plane,
        texture,
        projection,
        q2,
        line,
    }))
}

fn parse_brush(cursor: &mut Cursor<'_>) -> Result<MapBrush, MapParseError> {
    let line = cursor.line();
    cursor.expect("{", "brush")?;
    let mut sides = Vec::new();
    loop {
        match cursor.peek() {
            None => {
                return Err(MapParseError::UnexpectedEof {
                    line: cursor.line(),
                    context: "brush",
                });
            },
            Some(t) if !t.quoted && t.text == "}" => {
                cursor.pos += 1;
                break;
            },
            Some(t) if !t.quoted && t.text == "(" => sides.extend(parse_side(cursor)?),
            Some(t) => {
                return Err(MapParseError::Expected {
                    line: t.line,
                    expected: "brush side or '}'",
                    found: t.text.to_string(),
                });
            },
        }
    }
    Ok(MapBrush::new(sides, line))
}

fn parse_entity(cursor: &mut Cursor<'_>) -> Result<Entity, MapParseError> {
    let line = cursor.line();
    cursor.expect("{", "entity")?;
    let mut entity = Entity {
        pairs: Vec::new(),
        brushes: Vec::new(),
        line,
    };
    loop {
        let token = cursor.peek().ok_or(MapParseError::UnexpectedEof {
            line: cursor.line(),
            context: "entity",
        })?;
        if token.quoted {
            cursor.pos += 1;
            let value = cursor.next("entity value")?;
            entity.set(token.text, value.text);
            continue;
        }
        match token.text {
            "}" => {
                cursor.pos += 1;
                return Ok(entity);
            },
            "{" => entity.brushes.push(parse_brush(cursor)?),
            other => {
                return Err(MapParseError::Expected {
                    line: token.line,
                    expected: "key, brush or '}'",
                    found: other.to_string(),
                });
            },
        }
    }
}

/// Parse a complete `.map` file.
pub fn parse_map(text: &str) -> Result<MapFile, MapParseError> {
    let mut cursor = Cursor {
        tokens: tokenize(text)?,
        pos: 0,
    };
    let mut entities = Vec::new();
    while cursor.peek().is_some() {
        entities.push(parse_entity(&mut cursor)?);
    }
    Ok(MapFile { entities })
}
