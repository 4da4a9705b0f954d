//! HL7 v2 message parsing (panic-free, tolerant).
//!
//! Parsing rules:
//! - Never slice by raw byte offsets without `get()`; non-ASCII input must not panic.
//! - A line that cannot be a segment is recorded as malformed and skipped.
//! - Field lookups distinguish a missing segment, an empty field, and a
//!   segment that was present but malformed.

/// Separator characters, read from MSH-1/MSH-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

/// One parsed segment. `fields[n - 1]` holds field `n` (HL7 numbering).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub fields: Vec<String>,
    /// Name was valid but the rest of the line was not (e.g. wrong separator).
    pub malformed: bool,
}

/// Outcome of a field lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Field (or component) carries a value, escape sequences decoded.
    Value(String),
    /// Segment present, field missing or blank.
    Empty,
    /// No segment with that name in the message.
    SegmentAbsent,
    /// Segment present but could not be split into fields.
    Malformed,
}

impl Field {
    /// Value as a string slice; every non-value outcome reads as `""`.
    pub fn as_str(&self) -> &str {
        match self {
            Field::Value(v) => v,
            _ => "",
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Field::Value(v) => v,
            _ => String::new(),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Field::Value(_))
    }
}

/// Parsed HL7 v2 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hl7Message {
    pub separators: Separators,
    pub segments: Vec<Segment>,
    /// Lines that could not be attributed to any segment name.
    pub unparsed_lines: usize,
}

impl Hl7Message {
    /// Parse a message. Never fails; see module docs for degradation rules.
    pub fn parse(input: &str) -> Self {
        let lines: Vec<&str> = input
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let separators = lines
            .first()
            .filter(|l| l.starts_with("MSH"))
            .map(|l| read_separators(l))
            .unwrap_or_default();

        let mut segments = Vec::with_capacity(lines.len());
        let mut unparsed_lines = 0usize;

        for line in lines {
            match parse_segment(line, &separators) {
                Some(seg) => {
                    if seg.malformed {
                        tracing::debug!(segment = %seg.name, "malformed hl7 segment");
                    }
                    segments.push(seg);
                }
                None => {
                    unparsed_lines += 1;
                    tracing::debug!(line_len = line.len(), "unparsable hl7 line skipped");
                }
            }
        }

        Self {
            separators,
            segments,
            unparsed_lines,
        }
    }

    /// First segment with the given name.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Segment names in message order.
    pub fn segment_names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of segments flagged malformed plus unattributable lines.
    pub fn malformed_count(&self) -> usize {
        self.segments.iter().filter(|s| s.malformed).count() + self.unparsed_lines
    }

    /// Whole field `index` (1-based) of the first `segment`, first repetition.
    pub fn field(&self, segment: &str, index: usize) -> Field {
        match self.raw_field(segment, index) {
            // MSH-1/MSH-2 are the separators themselves; never split or decode them.
            Ok(raw) if segment == "MSH" && index <= 2 => Field::Value(raw.to_string()),
            Ok(raw) => {
                let first = raw.split(self.separators.repetition).next().unwrap_or("");
                self.value(first)
            }
            Err(outcome) => outcome,
        }
    }

    /// Component `comp` (1-based) of field `index`, first repetition.
    pub fn component(&self, segment: &str, index: usize, comp: usize) -> Field {
        if comp == 0 {
            return Field::Empty;
        }
        match self.raw_field(segment, index) {
            Ok(raw) => {
                let first = raw.split(self.separators.repetition).next().unwrap_or("");
                let part = first.split(self.separators.component).nth(comp - 1).unwrap_or("");
                self.value(part)
            }
            Err(outcome) => outcome,
        }
    }

    /// Field with all components, each decoded, joined with the component separator.
    pub fn field_joined(&self, segment: &str, index: usize, joiner: &str) -> Field {
        match self.raw_field(segment, index) {
            Ok(raw) => {
                let first = raw.split(self.separators.repetition).next().unwrap_or("");
                let parts: Vec<String> = first
                    .split(self.separators.component)
                    .map(|c| self.unescape(c))
                    .filter(|c| !c.is_empty())
                    .collect();
                if parts.is_empty() {
                    Field::Empty
                } else {
                    Field::Value(parts.join(joiner))
                }
            }
            Err(outcome) => outcome,
        }
    }

    fn raw_field(&self, segment: &str, index: usize) -> Result<&str, Field> {
        let seg = self.segment(segment).ok_or(Field::SegmentAbsent)?;
        if seg.malformed {
            return Err(Field::Malformed);
        }
        if index == 0 {
            return Err(Field::Empty);
        }
        match seg.fields.get(index - 1) {
            Some(f) if !f.trim().is_empty() => Ok(f.as_str()),
            _ => Err(Field::Empty),
        }
    }

    fn value(&self, raw: &str) -> Field {
        let v = self.unescape(raw);
        if v.trim().is_empty() {
            Field::Empty
        } else {
            Field::Value(v)
        }
    }

    /// Decode `\F\ \S\ \T\ \R\ \E\`; unknown sequences are kept verbatim.
    pub fn unescape(&self, raw: &str) -> String {
        let esc = self.separators.escape;
        if !raw.contains(esc) {
            return raw.to_string();
        }

        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(start) = rest.find(esc) {
            out.push_str(&rest[..start]);
            let after = &rest[start + esc.len_utf8()..];
            let Some(end) = after.find(esc) else {
                out.push_str(&rest[start..]);
                return out;
            };
            let code = &after[..end];
            let decoded = match code {
                "F" => Some(self.separators.field),
                "S" => Some(self.separators.component),
                "T" => Some(self.separators.subcomponent),
                "R" => Some(self.separators.repetition),
                "E" => Some(esc),
                _ => None,
            };
            match decoded {
                Some(c) => out.push(c),
                None => {
                    out.push(esc);
                    out.push_str(code);
                    out.push(esc);
                }
            }
            rest = &after[end + esc.len_utf8()..];
        }
        out.push_str(rest);
        out
    }
}

fn read_separators(msh_line: &str) -> Separators {
    let defaults = Separators::default();
    let mut chars = msh_line.chars().skip(3);
    let field = chars.next().unwrap_or(defaults.field);
    // Encoding characters end at the next field separator.
    let encoding: Vec<char> = chars.take_while(|c| *c != field).take(4).collect();
    Separators {
        field,
        component: encoding.first().copied().unwrap_or(defaults.component),
        repetition: encoding.get(1).copied().unwrap_or(defaults.repetition),
        escape: encoding.get(2).copied().unwrap_or(defaults.escape),
        subcomponent: encoding.get(3).copied().unwrap_or(defaults.subcomponent),
    }
}

fn parse_segment(line: &str, sep: &Separators) -> Option<Segment> {
    let name = line.get(0..3)?;
    if !name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return None;
    }
    let rest = &line[3..];

    if rest.is_empty() {
        return Some(Segment {
            name: name.to_string(),
            fields: Vec::new(),
            malformed: false,
        });
    }

    if !rest.starts_with(sep.field) {
        return Some(Segment {
            name: name.to_string(),
            fields: Vec::new(),
            malformed: true,
        });
    }

    let body = &rest[sep.field.len_utf8()..];
    let mut fields = Vec::new();
    if name == "MSH" {
        // MSH-1 is the field separator itself.
        fields.push(sep.field.to_string());
    }
    fields.extend(body.split(sep.field).map(str::to_string));

    Some(Segment {
        name: name.to_string(),
        fields,
        malformed: false,
    })
}
