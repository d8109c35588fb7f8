#![warn(clippy::uninlined_format_args)]

use kidex_domain::{ArcRecord, BloodType, Instance, VertexId, VertexRecord, VpraCategory};
use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{char, i64, one_of, space0, space1, u8, u32, u64},
    combinator::{all_consuming, recognize},
    multi::many1,
    sequence::delimited,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceParseError {
    #[error("Missing header line for {field}")]
    MissingHeader { field: &'static str },
    #[error("Expected {expected} vertex records but found {found}")]
    MissingVertexRecords { expected: usize, found: usize },
    #[error("Syntax error at line {line}: {detail}")]
    SyntaxError { line: usize, detail: String },
    #[error("Unknown blood type code {code} at line {line}")]
    InvalidBloodType { line: usize, code: u8 },
    #[error("Unknown vPRA category {code} at line {line}")]
    InvalidVpra { line: usize, code: u8 },
    #[error("Count at line {line} is too large")]
    CountOverflow { line: usize },
}

struct RawVertex {
    id: u32,
    is_ndd: bool,
    donor_blood: u8,
    patient_blood: u8,
    vpra: u8,
}

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace()).parse(input)
}

// "<label...> <count>", e.g. "NumPairs = 12"
fn header(input: &str) -> IResult<&str, u64> {
    (recognize(many1((word, space1))), u64)
        .map(|(_, count)| count)
        .parse(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(space0, char(','), space0).parse(input)
}

fn flag(input: &str) -> IResult<&str, bool> {
    one_of("01").map(|digit| digit == '1').parse(input)
}

// id,is_ndd,donor_blood,patient_blood,vpra
fn vertex(input: &str) -> IResult<&str, RawVertex> {
    (u32, comma, flag, comma, u8, comma, u8, comma, u8)
        .map(
            |(id, _, is_ndd, _, donor_blood, _, patient_blood, _, vpra)| RawVertex {
                id,
                is_ndd,
                donor_blood,
                patient_blood,
                vpra,
            },
        )
        .parse(input)
}

// (donor,patient),1,weight
fn arc(input: &str) -> IResult<&str, ArcRecord> {
    (
        delimited(
            (char('('), space0),
            (u32, comma, u32),
            (space0, char(')')),
        ),
        comma,
        u64,
        comma,
        i64,
    )
        .map(|((donor, _, patient), _, _, _, weight)| ArcRecord {
            donor: VertexId(donor),
            patient: VertexId(patient),
            weight,
        })
        .parse(input)
}

fn run_line<'a, T>(
    line: usize,
    content: &'a str,
    parser: impl Parser<&'a str, Output = T, Error = nom::error::Error<&'a str>>,
) -> Result<T, InstanceParseError> {
    all_consuming(parser)
        .parse(content)
        .map(|(_, value)| value)
        .map_err(|err| InstanceParseError::SyntaxError {
            line,
            detail: err.to_string(),
        })
}

fn decode_vertex(line: usize, raw: RawVertex) -> Result<VertexRecord, InstanceParseError> {
    let blood = |code: u8| {
        BloodType::try_from(code).map_err(|code| InstanceParseError::InvalidBloodType { line, code })
    };
    Ok(VertexRecord {
        id: VertexId(raw.id),
        is_ndd: raw.is_ndd,
        donor_blood_type: blood(raw.donor_blood)?,
        patient_blood_type: blood(raw.patient_blood)?,
        patient_vpra: VpraCategory::try_from(raw.vpra)
            .map_err(|code| InstanceParseError::InvalidVpra { line, code })?,
    })
}

/// Parses an instance file: three count headers (pairs, NDDs, arcs), one
/// line per vertex, then one line per arc. Blank lines are skipped.
pub fn parse_instance(input: &str) -> Result<Instance, InstanceParseError> {
    let mut lines = input
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let mut counts = [0usize; 3];
    let mut header_lines = [0usize; 3];
    for ((slot, at), field) in counts
        .iter_mut()
        .zip(header_lines.iter_mut())
        .zip(["pairs", "NDDs", "arcs"])
    {
        let Some((line, content)) = lines.next() else {
            return Err(InstanceParseError::MissingHeader { field });
        };
        *at = line;
        let count = run_line(line, content, header)?;
        *slot = usize::try_from(count).map_err(|_| InstanceParseError::CountOverflow { line })?;
    }
    let [num_pairs, num_ndds, num_arcs] = counts;

    let expected = num_pairs
        .checked_add(num_ndds)
        .ok_or(InstanceParseError::CountOverflow { line: header_lines[1] })?;
    let mut vertices = Vec::new();
    while vertices.len() < expected {
        let Some((line, content)) = lines.next() else {
            return Err(InstanceParseError::MissingVertexRecords {
                expected,
                found: vertices.len(),
            });
        };
        let raw = run_line(line, content, vertex)?;
        vertices.push(decode_vertex(line, raw)?);
    }

    let mut arcs = Vec::new();
    for (line, content) in lines {
        arcs.push(run_line(line, content, arc)?);
    }

    Ok(Instance {
        num_pairs,
        num_ndds,
        num_arcs,
        vertices,
        arcs,
    })
}
