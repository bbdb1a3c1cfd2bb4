//! Praat TextGrid annotations.
//!
//! Reads both the long ("ooTextFile") and short text layouts by scanning the
//! file as a stream of numbers, quoted strings and the `<exists>` flag, the
//! same way Praat itself does. Writes the long layout.

use std::fmt::{self, Write as _};

/// Time-aligned annotation with one or more tiers.
#[derive(Clone, Debug, PartialEq)]
pub struct TextGrid {
    pub xmin: f64,
    pub xmax: f64,
    pub tiers: Vec<Tier>,
}

/// Annotation tier.
#[derive(Clone, Debug, PartialEq)]
pub enum Tier {
    Interval(IntervalTier),
    Point(PointTier),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntervalTier {
    pub name: String,
    pub xmin: f64,
    pub xmax: f64,
    pub intervals: Vec<Interval>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Interval {
    pub xmin: f64,
    pub xmax: f64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointTier {
    pub name: String,
    pub xmin: f64,
    pub xmax: f64,
    pub points: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub time: f64,
    pub mark: String,
}

impl Tier {
    pub fn name(&self) -> &str {
        match self {
            Tier::Interval(t) => &t.name,
            Tier::Point(t) => &t.name,
        }
    }
}

impl IntervalTier {
    /// Intervals with non-empty text, e.g. the spoken phones of a "phones" tier.
    pub fn labelled(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter().filter(|i| !i.text.trim().is_empty())
    }
}

impl TextGrid {
    /// Find a tier by name.
    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name() == name)
    }

    /// Find an interval tier by name.
    pub fn interval_tier(&self, name: &str) -> Option<&IntervalTier> {
        self.tiers.iter().find_map(|t| match t {
            Tier::Interval(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    /// Parse TextGrid text in either layout.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Parser::new(input).text_grid()
    }

    /// Decode raw file bytes, honoring UTF-8 and UTF-16 byte-order marks.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let text = decode_text(bytes)?;
        Self::parse(&text)
    }

    /// Whether every boundary and point time is finite.
    pub fn has_finite_times(&self) -> bool {
        let mut times = vec![self.xmin, self.xmax];
        for tier in &self.tiers {
            match tier {
                Tier::Interval(t) => {
                    times.extend([t.xmin, t.xmax]);
                    times.extend(t.intervals.iter().flat_map(|i| [i.xmin, i.xmax]));
                }
                Tier::Point(t) => {
                    times.extend([t.xmin, t.xmax]);
                    times.extend(t.points.iter().map(|p| p.time));
                }
            }
        }
        times.iter().all(|t| t.is_finite())
    }

    /// Render in the long text layout.
    pub fn to_long_format(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_long(&mut out);
        out
    }

    fn write_long(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "File type = \"ooTextFile\"")?;
        writeln!(out, "Object class = \"TextGrid\"")?;
        writeln!(out)?;
        writeln!(out, "xmin = {} ", self.xmin)?;
        writeln!(out, "xmax = {} ", self.xmax)?;

        if self.tiers.is_empty() {
            writeln!(out, "tiers? <absent> ")?;
            return Ok(());
        }

        writeln!(out, "tiers? <exists> ")?;
        writeln!(out, "size = {} ", self.tiers.len())?;
        writeln!(out, "item []: ")?;

        for (i, tier) in self.tiers.iter().enumerate() {
            writeln!(out, "    item [{}]:", i + 1)?;
            match tier {
                Tier::Interval(t) => {
                    writeln!(out, "        class = \"IntervalTier\" ")?;
                    writeln!(out, "        name = {} ", quote(&t.name))?;
                    writeln!(out, "        xmin = {} ", t.xmin)?;
                    writeln!(out, "        xmax = {} ", t.xmax)?;
                    writeln!(out, "        intervals: size = {} ", t.intervals.len())?;
                    for (j, interval) in t.intervals.iter().enumerate() {
                        writeln!(out, "        intervals [{}]:", j + 1)?;
                        writeln!(out, "            xmin = {} ", interval.xmin)?;
                        writeln!(out, "            xmax = {} ", interval.xmax)?;
                        writeln!(out, "            text = {} ", quote(&interval.text))?;
                    }
                }
                Tier::Point(t) => {
                    writeln!(out, "        class = \"TextTier\" ")?;
                    writeln!(out, "        name = {} ", quote(&t.name))?;
                    writeln!(out, "        xmin = {} ", t.xmin)?;
                    writeln!(out, "        xmax = {} ", t.xmax)?;
                    writeln!(out, "        points: size = {} ", t.points.len())?;
                    for (j, point) in t.points.iter().enumerate() {
                        writeln!(out, "        points [{}]:", j + 1)?;
                        writeln!(out, "            number = {} ", point.time)?;
                        writeln!(out, "            mark = {} ", quote(&point.mark))?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// TextGrid parse failure.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(&'static str),

    #[error("expected {expected} at byte {offset}")]
    Unexpected {
        expected: &'static str,
        offset: usize,
    },

    #[error("not a TextGrid: {0}")]
    WrongHeader(String),

    #[error("unknown tier class: {0}")]
    UnknownTierClass(String),

    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("invalid text encoding")]
    Encoding,
}

/// Escape embedded quotes by doubling them.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn decode_text(bytes: &[u8]) -> Result<String, ParseError> {
    fn utf16(bytes: &[u8], from: fn([u8; 2]) -> u16) -> Result<String, ParseError> {
        if bytes.len() % 2 != 0 {
            return Err(ParseError::Encoding);
        }
        let units: Vec<u16> = bytes.chunks_exact(2).map(|c| from([c[0], c[1]])).collect();
        String::from_utf16(&units).map_err(|_| ParseError::Encoding)
    }

    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => {
            String::from_utf8(rest.to_vec()).map_err(|_| ParseError::Encoding)
        }
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes),
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes),
        _ => String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::Encoding),
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Exists,
    Absent,
}

/// Token scanner over TextGrid text.
///
/// Labels (`xmin =`), bracketed indices (`[1]`) and `!` comments are skipped.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Ok(None);
            };

            match c {
                '"' => return self.string().map(|s| Some(Token::Text(s))),
                '<' => {
                    let end = rest.find('>').ok_or(ParseError::Unexpected {
                        expected: "closing '>'",
                        offset: self.pos,
                    })?;
                    let flag = &rest[1..end];
                    self.pos += end + 1;
                    match flag {
                        "exists" => return Ok(Some(Token::Exists)),
                        "absent" => return Ok(Some(Token::Absent)),
                        _ => continue,
                    }
                }
                '[' => {
                    let end = rest.find(']').ok_or(ParseError::Unexpected {
                        expected: "closing ']'",
                        offset: self.pos,
                    })?;
                    self.pos += end + 1;
                }
                '!' => {
                    self.pos += rest.find('\n').unwrap_or(rest.len());
                }
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                    let len = rest
                        .find(|ch: char| {
                            !(ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
                        })
                        .unwrap_or(rest.len());
                    let start = self.pos;
                    self.pos += len;
                    return match rest[..len].parse::<f64>() {
                        Ok(n) => Ok(Some(Token::Number(n))),
                        Err(_) => Err(ParseError::Unexpected {
                            expected: "number",
                            offset: start,
                        }),
                    };
                }
                c if c.is_alphabetic() || c == '_' => {
                    // Labels like `xmin`, `intervals`, `size`
                    let len = rest
                        .find(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '?'))
                        .unwrap_or(rest.len());
                    self.pos += len;
                }
                _ => self.pos += c.len_utf8(),
            }
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let rest = self.rest();
            let Some(i) = rest.find('"') else {
                return Err(ParseError::UnterminatedString(start));
            };

            out.push_str(&rest[..i]);
            self.pos += i + 1;

            if self.rest().starts_with('"') {
                out.push('"');
                self.pos += 1;
            } else {
                return Ok(out);
            }
        }
    }

    fn number(&mut self, what: &'static str) -> Result<f64, ParseError> {
        let offset = self.pos;
        match self.next_token()? {
            Some(Token::Number(n)) => Ok(n),
            Some(_) => Err(ParseError::Unexpected {
                expected: what,
                offset,
            }),
            None => Err(ParseError::UnexpectedEof(what)),
        }
    }

    fn count(&mut self, what: &'static str) -> Result<usize, ParseError> {
        let offset = self.pos;
        let n = self.number(what)?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(ParseError::Unexpected {
                expected: what,
                offset,
            });
        }
        Ok(n as usize)
    }

    fn text(&mut self, what: &'static str) -> Result<String, ParseError> {
        let offset = self.pos;
        match self.next_token()? {
            Some(Token::Text(s)) => Ok(s),
            Some(_) => Err(ParseError::Unexpected {
                expected: what,
                offset,
            }),
            None => Err(ParseError::UnexpectedEof(what)),
        }
    }

    fn text_grid(&mut self) -> Result<TextGrid, ParseError> {
        let file_type = self.text("file type")?;
        if file_type != "ooTextFile" {
            return Err(ParseError::WrongHeader(file_type));
        }
        let class = self.text("object class")?;
        if class != "TextGrid" {
            return Err(ParseError::WrongHeader(class));
        }

        let xmin = self.number("xmin")?;
        let xmax = self.number("xmax")?;

        let offset = self.pos;
        let tier_count = match self.next_token()? {
            Some(Token::Exists) => self.count("tier count")?,
            Some(Token::Absent) | None => 0,
            // Some writers omit the flag and go straight to the size
            Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            Some(_) => {
                return Err(ParseError::Unexpected {
                    expected: "tiers flag",
                    offset,
                });
            }
        };

        let tiers = (0..tier_count)
            .map(|_| self.tier())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TextGrid { xmin, xmax, tiers })
    }

    fn tier(&mut self) -> Result<Tier, ParseError> {
        let class = self.text("tier class")?;
        let name = self.text("tier name")?;
        let xmin = self.number("tier xmin")?;
        let xmax = self.number("tier xmax")?;
        let size = self.count("tier size")?;

        match class.as_str() {
            "IntervalTier" => {
                let intervals = (0..size)
                    .map(|_| {
                        Ok(Interval {
                            xmin: self.number("interval xmin")?,
                            xmax: self.number("interval xmax")?,
                            text: self.text("interval text")?,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;

                Ok(Tier::Interval(IntervalTier {
                    name,
                    xmin,
                    xmax,
                    intervals,
                }))
            }
            "TextTier" => {
                let points = (0..size)
                    .map(|_| {
                        Ok(Point {
                            time: self.number("point time")?,
                            mark: self.text("point mark")?,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;

                Ok(Tier::Point(PointTier {
                    name,
                    xmin,
                    xmax,
                    points,
                }))
            }
            _ => Err(ParseError::UnknownTierClass(class)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 1.5
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "words"
        xmin = 0
        xmax = 1.5
        intervals: size = 2
        intervals [1]:
            xmin = 0
            xmax = 0.72
            text = "hello"
        intervals [2]:
            xmin = 0.72
            xmax = 1.5
            text = ""
    item [2]:
        class = "IntervalTier"
        name = "phones"
        xmin = 0
        xmax = 1.5
        intervals: size = 3
        intervals [1]:
            xmin = 0
            xmax = 0.31
            text = "HH"
        intervals [2]:
            xmin = 0.31
            xmax = 0.72
            text = "AH0"
        intervals [3]:
            xmin = 0.72
            xmax = 1.5
            text = ""
"#;

    const SHORT: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

0
2.3
<exists>
1
"TextTier"
"bells"
0
2.3
2
0.9
"ding ""loud"""
1.7
"dong"
"#;

    #[test]
    fn parses_long_format() {
        let tg = TextGrid::parse(LONG).unwrap();

        assert_eq!(tg.xmax, 1.5);
        assert_eq!(tg.tiers.len(), 2);

        let phones = tg.interval_tier("phones").unwrap();
        let labels: Vec<&str> = phones.labelled().map(|i| i.text.as_str()).collect();
        assert_eq!(labels, ["HH", "AH0"]);
        assert_eq!(phones.intervals[1].xmin, 0.31);
    }

    #[test]
    fn parses_short_format_with_point_tier() {
        let tg = TextGrid::parse(SHORT).unwrap();

        match tg.tier("bells").unwrap() {
            Tier::Point(t) => {
                assert_eq!(t.points.len(), 2);
                assert_eq!(t.points[0].mark, "ding \"loud\"");
                assert_eq!(t.points[1].time, 1.7);
            }
            other => panic!("unexpected tier: {other:?}"),
        }
    }

    #[test]
    fn long_format_reparses_identically() {
        let tg = TextGrid::parse(SHORT).unwrap();
        let again = TextGrid::parse(&tg.to_long_format()).unwrap();
        assert_eq!(tg, again);

        let tg = TextGrid::parse(LONG).unwrap();
        let again = TextGrid::parse(&tg.to_long_format()).unwrap();
        assert_eq!(tg, again);
    }

    #[test]
    fn decodes_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in SHORT.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let tg = TextGrid::from_bytes(&bytes).unwrap();
        assert_eq!(tg.tiers.len(), 1);
    }

    #[test]
    fn rejects_truncated_input() {
        let truncated = &LONG[..LONG.find("intervals [2]").unwrap()];
        assert!(matches!(
            TextGrid::parse(truncated),
            Err(ParseError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn rejects_malformed_number() {
        let input = LONG.replacen("xmax = 1.5\n", "xmax = 1.5.3\n", 1);
        assert!(matches!(
            TextGrid::parse(&input),
            Err(ParseError::Unexpected {
                expected: "number",
                ..
            })
        ));
    }

    #[test]
    fn reports_non_finite_times() {
        let mut tg = TextGrid::parse(LONG).unwrap();
        assert!(tg.has_finite_times());

        if let Tier::Interval(t) = &mut tg.tiers[1] {
            t.intervals[2].xmax = f64::NAN;
        }
        assert!(!tg.has_finite_times());
    }

    #[test]
    fn rejects_other_praat_objects() {
        let input = "File type = \"ooTextFile\"\nObject class = \"Pitch 1\"\n";
        assert!(matches!(
            TextGrid::parse(input),
            Err(ParseError::WrongHeader(_))
        ));
    }
}
