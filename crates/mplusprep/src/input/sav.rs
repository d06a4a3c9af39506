//! SPSS system file (`.sav`) reader.
//!
//! Reads the dictionary and case data of `$FL2` files, uncompressed or
//! bytecode-compressed, in either byte order. Only raw values are kept:
//! value labels are skipped, and system-missing and user-missing numbers
//! become [`Value::Missing`].

use encoding_rs::{Encoding, WINDOWS_1252};

use crate::error::{PrepError, Result};

use super::encoding::{encoding_for_codepage, encoding_for_label};
use super::source::{DataTable, Value};

/// Width of one case data element in bytes.
const ELEMENT_LEN: usize = 8;

/// Size of the fixed file header record.
const HEADER_LEN: usize = 176;

/// Bytes of a very long string carried by each non-final segment.
const SEGMENT_USED: usize = 252;

/// Allocated width of each non-final very long string segment.
const SEGMENT_ALLOC: usize = 255;

/// Record type tags.
const REC_VARIABLE: i32 = 2;
const REC_VALUE_LABELS: i32 = 3;
const REC_VALUE_LABEL_VARS: i32 = 4;
const REC_DOCUMENT: i32 = 6;
const REC_EXTENSION: i32 = 7;
const REC_DICT_END: i32 = 999;

/// Extension record subtypes we interpret.
const EXT_INTEGER_INFO: i32 = 3;
const EXT_FLOAT_INFO: i32 = 4;
const EXT_LONG_NAMES: i32 = 13;
const EXT_VERY_LONG_STRINGS: i32 = 14;
const EXT_ENCODING: i32 = 20;

/// Bytecode compression opcodes.
const CODE_PADDING: u8 = 0;
const CODE_END: u8 = 252;
const CODE_RAW: u8 = 253;
const CODE_SPACES: u8 = 254;
const CODE_SYSMIS: u8 = 255;

/// Case data compression scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Raw 8-byte elements.
    None,
    /// Bytecode compression.
    Bytecode,
}

/// A parsed `.sav` file.
#[derive(Debug, Clone)]
pub struct SavDataset {
    /// Table with one column per variable (long names when present).
    pub table: DataTable,
    /// Encoding used for names and string data.
    pub encoding: String,
    /// Case data compression.
    pub compression: Compression,
    /// File label from the header, trimmed.
    pub file_label: String,
}

/// Parse `.sav` bytes.
pub fn parse_sav(data: &[u8]) -> Result<SavDataset> {
    if data.len() < HEADER_LEN {
        return Err(PrepError::Sav("file too small for a system file header".to_string()));
    }

    let magic = data.get(..4).unwrap_or_default();
    match magic {
        b"$FL2" => {}
        b"$FL3" => {
            return Err(PrepError::UnsupportedFormat(
                "zlib-compressed .sav (ZSAV) files".to_string(),
            ));
        }
        _ => return Err(PrepError::Sav("missing $FL2 signature".to_string())),
    }

    let big_endian = detect_byte_order(data)?;
    let mut cur = Cursor::new(data, big_endian);
    let header = parse_header(&mut cur)?;
    let dict = parse_dictionary(&mut cur, big_endian)?;

    let encoding = dict.encoding();
    let columns = build_columns(&dict, encoding)?;
    let elements_per_case = dict.variables.len();

    let sysmis = dict.sysmis.unwrap_or(-f64::MAX);
    let cases = match header.compression {
        Compression::None => read_uncompressed(&mut cur, elements_per_case, header.case_count)?,
        Compression::Bytecode => read_compressed(
            &mut cur,
            elements_per_case,
            header.case_count,
            header.bias,
            sysmis,
        )?,
    };

    let headers = columns.iter().map(|c| c.name.clone()).collect();
    let rows = cases
        .iter()
        .map(|case| {
            columns
                .iter()
                .map(|col| col.value(case, big_endian, sysmis, encoding))
                .collect()
        })
        .collect();

    tracing::debug!(
        variables = columns.len(),
        cases = cases.len(),
        encoding = encoding.name(),
        "parsed system file"
    );

    Ok(SavDataset {
        table: DataTable::new(headers, rows),
        encoding: encoding.name().to_string(),
        compression: header.compression,
        file_label: decode_trimmed(&header.file_label, encoding),
    })
}

/// The layout code at offset 64 is 2 or 3 in the file's byte order.
fn detect_byte_order(data: &[u8]) -> Result<bool> {
    let raw: [u8; 4] = data
        .get(64..68)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| PrepError::Sav("truncated header".to_string()))?;

    if matches!(i32::from_le_bytes(raw), 2 | 3) {
        Ok(false)
    } else if matches!(i32::from_be_bytes(raw), 2 | 3) {
        Ok(true)
    } else {
        Err(PrepError::Sav("unrecognized layout code".to_string()))
    }
}

/// Fields of the file header we use.
struct Header {
    compression: Compression,
    case_count: Option<usize>,
    bias: f64,
    file_label: Vec<u8>,
}

fn parse_header(cur: &mut Cursor<'_>) -> Result<Header> {
    cur.skip(4 + 60 + 4)?; // signature, product name, layout code
    let _nominal_case_size = cur.i32()?;
    let compression = match cur.i32()? {
        0 => Compression::None,
        1 => Compression::Bytecode,
        2 => {
            return Err(PrepError::UnsupportedFormat(
                "zlib-compressed .sav (ZSAV) files".to_string(),
            ));
        }
        other => return Err(PrepError::Sav(format!("unknown compression code {other}"))),
    };
    let _weight_index = cur.i32()?;
    let case_count = usize::try_from(cur.i32()?).ok();
    let bias = cur.f64()?;
    cur.skip(9 + 8)?; // creation date and time
    let file_label = cur.take(64)?.to_vec();
    cur.skip(3)?;

    Ok(Header {
        compression,
        case_count,
        bias,
        file_label,
    })
}

/// User-defined missing values of one variable.
#[derive(Debug, Clone, PartialEq)]
enum MissingSpec {
    None,
    Values(Vec<f64>),
    Range { low: f64, high: f64, extra: Option<f64> },
    Strings(Vec<Vec<u8>>),
}

impl MissingSpec {
    fn matches_number(&self, n: f64) -> bool {
        match self {
            Self::Values(values) => values.contains(&n),
            Self::Range { low, high, extra } => (*low..=*high).contains(&n) || *extra == Some(n),
            Self::None | Self::Strings(_) => false,
        }
    }

    fn matches_text(&self, text: &str, encoding: &'static Encoding) -> bool {
        match self {
            Self::Strings(values) => values
                .iter()
                .any(|raw| decode_trimmed(raw, encoding) == text),
            _ => false,
        }
    }
}

/// One variable record; each occupies one 8-byte element per case.
#[derive(Debug, Clone)]
struct RawVariable {
    /// 0 = numeric, 1..=255 = string width, -1 = string continuation.
    type_code: i32,
    short_name: Vec<u8>,
    missing: MissingSpec,
}

/// Everything read between the header and the dictionary terminator.
#[derive(Debug, Default)]
struct Dictionary {
    variables: Vec<RawVariable>,
    long_names: Option<Vec<u8>>,
    very_long_strings: Option<Vec<u8>>,
    encoding_name: Option<String>,
    character_code: Option<i32>,
    sysmis: Option<f64>,
}

impl Dictionary {
    fn encoding(&self) -> &'static Encoding {
        self.encoding_name
            .as_deref()
            .and_then(encoding_for_label)
            .or_else(|| {
                self.character_code
                    .and_then(|code| u32::try_from(code).ok())
                    .and_then(encoding_for_codepage)
            })
            .unwrap_or(WINDOWS_1252)
    }
}

fn parse_dictionary(cur: &mut Cursor<'_>, big_endian: bool) -> Result<Dictionary> {
    let mut dict = Dictionary::default();

    loop {
        match cur.i32()? {
            REC_VARIABLE => dict.variables.push(parse_variable(cur)?),
            REC_VALUE_LABELS => skip_value_labels(cur)?,
            REC_DOCUMENT => {
                let lines = cur.count()?;
                cur.skip_elements(lines, 80)?;
            }
            REC_EXTENSION => parse_extension(cur, &mut dict, big_endian)?,
            REC_DICT_END => {
                cur.i32()?;
                break;
            }
            other => return Err(PrepError::Sav(format!("unexpected record type {other}"))),
        }
    }

    if dict.variables.is_empty() {
        return Err(PrepError::EmptyData("system file defines no variables".to_string()));
    }
    Ok(dict)
}

fn parse_variable(cur: &mut Cursor<'_>) -> Result<RawVariable> {
    let type_code = cur.i32()?;
    let has_label = cur.i32()?;
    let missing_count = cur.i32()?;
    cur.skip(8)?; // print and write formats
    let short_name = cur.take(8)?.to_vec();

    if has_label == 1 {
        let len = cur.count()?;
        cur.skip(len.next_multiple_of(4))?;
    }

    if !(-3..=3).contains(&missing_count) {
        return Err(PrepError::Sav(format!(
            "invalid missing value count {missing_count}"
        )));
    }
    let mut raw_missing = Vec::new();
    for _ in 0..missing_count.unsigned_abs() {
        raw_missing.push(cur.array::<ELEMENT_LEN>()?);
    }
    let big_endian = cur.big_endian;
    let numbers: Vec<f64> = raw_missing.iter().map(|b| read_f64(*b, big_endian)).collect();

    let missing = match (type_code, missing_count) {
        (_, 0) | (..=-1, _) => MissingSpec::None,
        (1.., _) => MissingSpec::Strings(raw_missing.iter().map(|b| b.to_vec()).collect()),
        (_, 1..) => MissingSpec::Values(numbers),
        _ => match numbers.as_slice() {
            [low, high] => MissingSpec::Range {
                low: *low,
                high: *high,
                extra: None,
            },
            [low, high, extra] => MissingSpec::Range {
                low: *low,
                high: *high,
                extra: Some(*extra),
            },
            _ => MissingSpec::None,
        },
    };

    Ok(RawVariable {
        type_code,
        short_name,
        missing,
    })
}

/// Value labels are formatting metadata; skip them and their variable list.
fn skip_value_labels(cur: &mut Cursor<'_>) -> Result<()> {
    let count = cur.count()?;
    for _ in 0..count {
        cur.skip(ELEMENT_LEN)?;
        let len = usize::from(cur.u8()?);
        cur.skip((len + 1).next_multiple_of(ELEMENT_LEN) - 1)?;
    }

    if cur.i32()? != REC_VALUE_LABEL_VARS {
        return Err(PrepError::Sav(
            "value label record not followed by its variable list".to_string(),
        ));
    }
    let vars = cur.count()?;
    cur.skip_elements(vars, 4)
}

fn parse_extension(cur: &mut Cursor<'_>, dict: &mut Dictionary, big_endian: bool) -> Result<()> {
    let subtype = cur.i32()?;
    let size = cur.count()?;
    let count = cur.count()?;
    let len = size
        .checked_mul(count)
        .ok_or_else(|| PrepError::Sav("extension record too large".to_string()))?;
    let body = cur.take(len)?;

    match subtype {
        EXT_INTEGER_INFO if size == 4 && count >= 8 => {
            dict.character_code = body
                .get(28..32)
                .and_then(|b| b.try_into().ok())
                .map(|b| read_i32(b, big_endian));
        }
        EXT_FLOAT_INFO if size == 8 && count >= 1 => {
            dict.sysmis = body
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .map(|b| read_f64(b, big_endian));
        }
        EXT_LONG_NAMES => dict.long_names = Some(body.to_vec()),
        EXT_VERY_LONG_STRINGS => dict.very_long_strings = Some(body.to_vec()),
        EXT_ENCODING => {
            dict.encoding_name = Some(String::from_utf8_lossy(body).trim().to_string());
        }
        _ => tracing::trace!(subtype, len, "skipping extension record"),
    }
    Ok(())
}

/// A contiguous run of elements holding (part of) a string value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    first_element: usize,
    used_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum ColumnKind {
    Numeric { element: usize },
    Text { segments: Vec<Segment> },
}

#[derive(Debug, Clone)]
struct Column {
    short_name: String,
    name: String,
    kind: ColumnKind,
    missing: MissingSpec,
}

impl Column {
    fn value(
        &self,
        case: &[[u8; ELEMENT_LEN]],
        big_endian: bool,
        sysmis: f64,
        encoding: &'static Encoding,
    ) -> Value {
        match &self.kind {
            ColumnKind::Numeric { element } => {
                let Some(raw) = case.get(*element) else {
                    return Value::Missing;
                };
                let n = read_f64(*raw, big_endian);
                if n == sysmis || self.missing.matches_number(n) {
                    Value::Missing
                } else {
                    Value::number(n)
                }
            }
            ColumnKind::Text { segments } => {
                let mut bytes = Vec::new();
                for segment in segments {
                    let n_elements = segment.used_bytes.div_ceil(ELEMENT_LEN);
                    let chunk: Vec<u8> = case
                        .iter()
                        .skip(segment.first_element)
                        .take(n_elements)
                        .flatten()
                        .copied()
                        .collect();
                    bytes.extend(chunk.into_iter().take(segment.used_bytes));
                }
                let text = decode_trimmed(&bytes, encoding);
                if self.missing.matches_text(&text, encoding) {
                    Value::Missing
                } else {
                    Value::Text(text)
                }
            }
        }
    }
}

/// Turn variable records into columns: continuation records are folded
/// into their string, long names applied, very long string segments merged.
fn build_columns(dict: &Dictionary, encoding: &'static Encoding) -> Result<Vec<Column>> {
    let mut columns = Vec::new();

    for (element, var) in dict.variables.iter().enumerate() {
        let short_name = decode_trimmed(&var.short_name, encoding);
        let kind = match var.type_code {
            0 => ColumnKind::Numeric { element },
            width if width > 0 => ColumnKind::Text {
                segments: vec![Segment {
                    first_element: element,
                    used_bytes: usize::try_from(width).unwrap_or_default(),
                }],
            },
            _ => continue,
        };
        columns.push(Column {
            name: short_name.clone(),
            short_name,
            kind,
            missing: var.missing.clone(),
        });
    }

    if let Some(raw) = &dict.very_long_strings {
        merge_very_long_strings(&mut columns, &parse_pairs(raw, encoding))?;
    }

    if let Some(raw) = &dict.long_names {
        for (short, long) in parse_pairs(raw, encoding) {
            if let Some(col) = columns
                .iter_mut()
                .find(|c| c.short_name.eq_ignore_ascii_case(&short))
            {
                col.name = long;
            }
        }
    }

    Ok(columns)
}

/// Merge the segment columns that follow each very long string into it.
fn merge_very_long_strings(columns: &mut Vec<Column>, entries: &[(String, String)]) -> Result<()> {
    for (short, width) in entries {
        let width: usize = width
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .parse()
            .map_err(|_| PrepError::Sav(format!("invalid very long string width for {short}")))?;
        let Some(idx) = columns.iter().position(|c| c.short_name.eq_ignore_ascii_case(short))
        else {
            continue;
        };

        let n_segments = width.div_ceil(SEGMENT_USED).max(1);
        let absorbed: Vec<Column> = columns
            .drain(idx + 1..(idx + n_segments).min(columns.len()))
            .collect();
        if absorbed.len() + 1 != n_segments {
            return Err(PrepError::Sav(format!(
                "very long string {short} is missing segments"
            )));
        }

        let mut segments = Vec::with_capacity(n_segments);
        for (i, col) in std::iter::once(&columns[idx]).chain(&absorbed).enumerate() {
            let ColumnKind::Text { segments: parts } = &col.kind else {
                return Err(PrepError::Sav(format!(
                    "very long string {short} has a numeric segment"
                )));
            };
            let first_element = parts.first().map(|s| s.first_element).unwrap_or_default();
            let used_bytes = if i + 1 < n_segments {
                SEGMENT_USED
            } else {
                width - SEGMENT_USED * (n_segments - 1)
            };
            debug_assert!(used_bytes <= SEGMENT_ALLOC, "segment wider than its allocation");
            segments.push(Segment {
                first_element,
                used_bytes,
            });
        }
        columns[idx].kind = ColumnKind::Text { segments };
    }
    Ok(())
}

/// Parse `KEY=VALUE` pairs separated by tabs (or NULs).
fn parse_pairs(raw: &[u8], encoding: &'static Encoding) -> Vec<(String, String)> {
    let (text, _, _) = encoding.decode(raw);
    text.split(['\t', '\0'])
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn read_uncompressed(
    cur: &mut Cursor<'_>,
    elements_per_case: usize,
    case_count: Option<usize>,
) -> Result<Vec<Vec<[u8; ELEMENT_LEN]>>> {
    let case_len = elements_per_case * ELEMENT_LEN;
    let mut cases = Vec::new();

    while case_count.is_none_or(|n| cases.len() < n) {
        if cur.remaining() == 0 && case_count.is_none() {
            break;
        }
        if cur.remaining() < case_len {
            return Err(PrepError::Sav(format!(
                "truncated case data at case {}",
                cases.len() + 1
            )));
        }
        let case = cur
            .take(case_len)?
            .chunks_exact(ELEMENT_LEN)
            .map(|c| c.try_into().unwrap_or([0; ELEMENT_LEN]))
            .collect();
        cases.push(case);
    }

    Ok(cases)
}

fn read_compressed(
    cur: &mut Cursor<'_>,
    elements_per_case: usize,
    case_count: Option<usize>,
    bias: f64,
    sysmis: f64,
) -> Result<Vec<Vec<[u8; ELEMENT_LEN]>>> {
    let mut stream = Bytecode::new(cur, bias, sysmis);
    let mut cases = Vec::new();

    while case_count.is_none_or(|n| cases.len() < n) {
        let mut case = Vec::with_capacity(elements_per_case);
        while case.len() < elements_per_case {
            match stream.next_element()? {
                Some(element) => case.push(element),
                None if case.is_empty() => return Ok(cases),
                None => {
                    return Err(PrepError::Sav(format!(
                        "compressed data ends inside case {}",
                        cases.len() + 1
                    )));
                }
            }
        }
        cases.push(case);
    }

    Ok(cases)
}

/// Decoder for bytecode-compressed case data.
struct Bytecode<'c, 'a> {
    cur: &'c mut Cursor<'a>,
    codes: [u8; ELEMENT_LEN],
    next_code: usize,
    bias: f64,
    sysmis: f64,
    finished: bool,
}

impl<'c, 'a> Bytecode<'c, 'a> {
    fn new(cur: &'c mut Cursor<'a>, bias: f64, sysmis: f64) -> Self {
        Self {
            cur,
            codes: [0; ELEMENT_LEN],
            next_code: ELEMENT_LEN,
            bias,
            sysmis,
            finished: false,
        }
    }

    /// Next decoded 8-byte element, `None` at the end of the data.
    fn next_element(&mut self) -> Result<Option<[u8; ELEMENT_LEN]>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.next_code == ELEMENT_LEN {
                if self.cur.remaining() == 0 {
                    self.finished = true;
                    return Ok(None);
                }
                self.codes = self.cur.array()?;
                self.next_code = 0;
            }

            let code = self.codes[self.next_code];
            self.next_code += 1;

            match code {
                CODE_PADDING => {}
                CODE_END => self.finished = true,
                CODE_RAW => return self.cur.array().map(Some),
                CODE_SPACES => return Ok(Some([b' '; ELEMENT_LEN])),
                CODE_SYSMIS => return Ok(Some(self.cur.encode_f64(self.sysmis))),
                n => {
                    let value = f64::from(n) - self.bias;
                    return Ok(Some(self.cur.encode_f64(value)));
                }
            }
        }
    }
}

/// Bounds-checked reader over the file bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], big_endian: bool) -> Self {
        Self {
            data,
            pos: 0,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| PrepError::Sav(format!("unexpected end of file at offset {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn skip_elements(&mut self, count: usize, size: usize) -> Result<()> {
        let len = count
            .checked_mul(size)
            .ok_or_else(|| PrepError::Sav("record length overflow".to_string()))?;
        self.skip(len)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(read_i32(self.array()?, self.big_endian))
    }

    /// A non-negative i32 count or length.
    fn count(&mut self) -> Result<usize> {
        let n = self.i32()?;
        usize::try_from(n).map_err(|_| PrepError::Sav(format!("negative length {n}")))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(read_f64(self.array()?, self.big_endian))
    }

    fn encode_f64(&self, value: f64) -> [u8; ELEMENT_LEN] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }
}

fn read_i32(bytes: [u8; 4], big_endian: bool) -> i32 {
    if big_endian {
        i32::from_be_bytes(bytes)
    } else {
        i32::from_le_bytes(bytes)
    }
}

fn read_f64(bytes: [u8; ELEMENT_LEN], big_endian: bool) -> f64 {
    if big_endian {
        f64::from_be_bytes(bytes)
    } else {
        f64::from_le_bytes(bytes)
    }
}

/// Decode fixed-width text, dropping trailing blanks and NULs.
fn decode_trimmed(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.trim_end_matches([' ', '\0']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cell in a generated test file.
    #[derive(Clone)]
    enum Cell {
        Num(f64),
        Sysmis,
        Str(&'static str),
    }

    struct TestVar {
        name: &'static str,
        width: usize,
        missing: Vec<f64>,
    }

    fn num(name: &'static str) -> TestVar {
        TestVar {
            name,
            width: 0,
            missing: Vec::new(),
        }
    }

    fn string(name: &'static str, width: usize) -> TestVar {
        TestVar {
            name,
            width,
            missing: Vec::new(),
        }
    }

    struct Builder {
        big_endian: bool,
        compressed: bool,
        long_names: Option<&'static str>,
        out: Vec<u8>,
    }

    impl Builder {
        fn new(big_endian: bool, compressed: bool) -> Self {
            Self {
                big_endian,
                compressed,
                long_names: None,
                out: Vec::new(),
            }
        }

        fn i32(&mut self, v: i32) {
            let b = if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
            self.out.extend_from_slice(&b);
        }

        fn f64_bytes(&self, v: f64) -> [u8; 8] {
            if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
        }

        fn f64(&mut self, v: f64) {
            let b = self.f64_bytes(v);
            self.out.extend_from_slice(&b);
        }

        fn padded(&mut self, text: &str, len: usize) {
            let mut bytes = text.as_bytes().to_vec();
            bytes.resize(len, b' ');
            self.out.extend_from_slice(&bytes);
        }

        fn extension(&mut self, subtype: i32, body: &[u8]) {
            self.i32(REC_EXTENSION);
            self.i32(subtype);
            self.i32(1);
            self.i32(body.len() as i32);
            self.out.extend_from_slice(body);
        }

        fn build(mut self, vars: &[TestVar], rows: &[Vec<Cell>]) -> Vec<u8> {
            let elements: usize = vars.iter().map(|v| v.width.max(1).div_ceil(8)).sum();

            self.out.extend_from_slice(b"$FL2");
            self.padded("@(#) SPSS DATA FILE test", 60);
            self.i32(2);
            self.i32(elements as i32);
            self.i32(i32::from(self.compressed));
            self.i32(0);
            self.i32(rows.len() as i32);
            self.f64(100.0);
            self.padded("01 Jan 26", 9);
            self.padded("00:00:00", 8);
            self.padded("test file", 64);
            self.padded("", 3);

            for var in vars {
                self.i32(REC_VARIABLE);
                self.i32(var.width as i32);
                self.i32(0);
                self.i32(var.missing.len() as i32);
                self.i32(0);
                self.i32(0);
                self.padded(var.name, 8);
                for m in &var.missing {
                    self.f64(*m);
                }
                for _ in 1..var.width.max(1).div_ceil(8) {
                    self.i32(REC_VARIABLE);
                    self.i32(-1);
                    self.i32(0);
                    self.i32(0);
                    self.i32(0);
                    self.i32(0);
                    self.padded("", 8);
                }
            }

            // A value label set, which must be skipped.
            self.i32(REC_VALUE_LABELS);
            self.i32(1);
            self.f64(1.0);
            self.out.push(4);
            self.padded("Male", 7);
            self.i32(REC_VALUE_LABEL_VARS);
            self.i32(1);
            self.i32(1);

            self.extension(EXT_ENCODING, b"UTF-8");
            if let Some(names) = self.long_names {
                self.extension(EXT_LONG_NAMES, names.as_bytes());
            }
            self.i32(REC_DICT_END);
            self.i32(0);

            let mut data: Vec<(u8, Option<[u8; 8]>)> = Vec::new();
            for row in rows {
                for (var, cell) in vars.iter().zip(row) {
                    match cell {
                        Cell::Num(v) => {
                            let code = v + 100.0;
                            if v.fract() == 0.0 && (1.0..=251.0).contains(&code) {
                                data.push((code as u8, None));
                            } else {
                                data.push((CODE_RAW, Some(self.f64_bytes(*v))));
                            }
                        }
                        Cell::Sysmis => data.push((CODE_SYSMIS, Some(self.f64_bytes(-f64::MAX)))),
                        Cell::Str(s) => {
                            let mut bytes = s.as_bytes().to_vec();
                            bytes.resize(var.width.div_ceil(8) * 8, b' ');
                            for chunk in bytes.chunks(8) {
                                let chunk: [u8; 8] = chunk.try_into().unwrap();
                                if chunk == [b' '; 8] {
                                    data.push((CODE_SPACES, Some(chunk)));
                                } else {
                                    data.push((CODE_RAW, Some(chunk)));
                                }
                            }
                        }
                    }
                }
            }

            if self.compressed {
                let mut codes = Vec::new();
                let mut payload = Vec::new();
                for (code, raw) in data {
                    codes.push(code);
                    if code == CODE_RAW {
                        payload.extend_from_slice(&raw.unwrap());
                    }
                    if codes.len() == 8 {
                        self.out.append(&mut codes);
                        self.out.append(&mut payload);
                    }
                }
                codes.push(CODE_END);
                codes.resize(8, CODE_PADDING);
                self.out.append(&mut codes);
                self.out.append(&mut payload);
            } else {
                for (code, raw) in data {
                    let bytes = raw.unwrap_or_else(|| self.f64_bytes(f64::from(code) - 100.0));
                    self.out.extend_from_slice(&bytes);
                }
            }

            self.out
        }
    }

    fn sample_rows() -> Vec<Vec<Cell>> {
        vec![
            vec![Cell::Num(1.5), Cell::Sysmis, Cell::Str("alice")],
            vec![Cell::Num(2.0), Cell::Num(-9.0), Cell::Str("")],
            vec![Cell::Num(1234.25), Cell::Num(3.0), Cell::Str("bob the builder")],
        ]
    }

    fn sample_vars() -> Vec<TestVar> {
        vec![
            num("X"),
            TestVar {
                name: "M",
                width: 0,
                missing: vec![-9.0],
            },
            string("NAME", 16),
        ]
    }

    fn assert_sample(dataset: &SavDataset) {
        let table = &dataset.table;
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.get(0, 0), Some(&Value::Number(1.5)));
        assert_eq!(table.get(0, 1), Some(&Value::Missing));
        assert_eq!(table.get(0, 2), Some(&Value::Text("alice".to_string())));
        assert_eq!(table.get(1, 1), Some(&Value::Missing));
        assert_eq!(table.get(1, 2), Some(&Value::Text(String::new())));
        assert_eq!(table.get(2, 0), Some(&Value::Number(1234.25)));
        assert_eq!(table.get(2, 1), Some(&Value::Number(3.0)));
        assert_eq!(
            table.get(2, 2),
            Some(&Value::Text("bob the builder".to_string()))
        );
        assert_eq!(dataset.encoding, "UTF-8");
    }

    #[test]
    fn test_uncompressed_little_endian() {
        let bytes = Builder::new(false, false).build(&sample_vars(), &sample_rows());
        let dataset = parse_sav(&bytes).unwrap();

        assert_eq!(dataset.compression, Compression::None);
        assert_eq!(dataset.table.headers, vec!["X", "M", "NAME"]);
        assert_eq!(dataset.file_label, "test file");
        assert_sample(&dataset);
    }

    #[test]
    fn test_compressed_big_endian_with_long_names() {
        let mut builder = Builder::new(true, true);
        builder.long_names = Some("X=Predictor\tM=Mediator\tNAME=Name");
        let bytes = builder.build(&sample_vars(), &sample_rows());
        let dataset = parse_sav(&bytes).unwrap();

        assert_eq!(dataset.compression, Compression::Bytecode);
        assert_eq!(dataset.table.headers, vec!["Predictor", "Mediator", "Name"]);
        assert_sample(&dataset);
    }

    #[test]
    fn test_convert_sav_file_end_to_end() {
        use crate::{AnalysisMode, AutoConfirm, Converter, SourceFormat};

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("survey.sav");
        let bytes = Builder::new(false, false).build(&sample_vars(), &sample_rows());
        std::fs::write(&input, bytes).unwrap();

        let report = Converter::new(AutoConfirm::no())
            .convert(&input, dir.path().join("survey"), AnalysisMode::Mediation)
            .unwrap();

        assert_eq!(report.source.format, SourceFormat::StatisticalBinary);
        assert_eq!(report.source.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(report.source.row_count, 3);
        assert_eq!(report.columns, vec!["X", "M", "NAME"]);
        assert!(report.audit_file.is_none());

        // System-missing and user-missing both become the missing token
        let data = std::fs::read_to_string(&report.data_file).unwrap();
        assert_eq!(
            data,
            "1.500000 . alice\n2.000000 . .\n1234.250000 3.000000 bob_the_builder\n"
        );
        let script = std::fs::read_to_string(&report.script_file).unwrap();
        assert!(script.contains("USEVARIABLES = X M NAME;"));
    }

    #[test]
    fn test_missing_range() {
        let spec = MissingSpec::Range {
            low: 90.0,
            high: 99.0,
            extra: Some(-1.0),
        };
        assert!(spec.matches_number(95.0));
        assert!(spec.matches_number(-1.0));
        assert!(!spec.matches_number(100.0));
    }

    #[test]
    fn test_zsav_rejected() {
        let mut bytes = Builder::new(false, false).build(&sample_vars(), &sample_rows());
        bytes[..4].copy_from_slice(b"$FL3");
        assert!(matches!(
            parse_sav(&bytes),
            Err(PrepError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_not_a_system_file() {
        let bytes = vec![b'x'; 400];
        assert!(matches!(parse_sav(&bytes), Err(PrepError::Sav(_))));
        assert!(matches!(parse_sav(b"$FL2"), Err(PrepError::Sav(_))));
    }

    #[test]
    fn test_truncated_case_data() {
        let mut bytes = Builder::new(false, false).build(&sample_vars(), &sample_rows());
        bytes.truncate(bytes.len() - 5);
        assert!(matches!(parse_sav(&bytes), Err(PrepError::Sav(_))));
    }

    #[test]
    fn test_very_long_string_segments() {
        let mut columns = vec![
            Column {
                short_name: "LONG".to_string(),
                name: "LONG".to_string(),
                kind: ColumnKind::Text {
                    segments: vec![Segment {
                        first_element: 0,
                        used_bytes: 255,
                    }],
                },
                missing: MissingSpec::None,
            },
            Column {
                short_name: "LONG0".to_string(),
                name: "LONG0".to_string(),
                kind: ColumnKind::Text {
                    segments: vec![Segment {
                        first_element: 32,
                        used_bytes: 48,
                    }],
                },
                missing: MissingSpec::None,
            },
        ];
        merge_very_long_strings(&mut columns, &[("LONG".to_string(), "00300\0".to_string())])
            .unwrap();

        assert_eq!(columns.len(), 1);
        assert_eq!(
            columns[0].kind,
            ColumnKind::Text {
                segments: vec![
                    Segment {
                        first_element: 0,
                        used_bytes: 252,
                    },
                    Segment {
                        first_element: 32,
                        used_bytes: 48,
                    },
                ]
            }
        );
    }
}
