//! DATA segment decoding.
//!
//! List-mode data is a sequence of events, each event holding one value per parameter in
//! parameter order. `$DATATYPE` selects the value encoding (`F`, `D` or `I`), `$BYTEORD` the
//! byte order and `$PnB` the per-parameter width in bits. Everything is decoded to `f32`.

use super::text::{Header, Metadata, Segment};
use crate::error::{AppResult, CytoError};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::Array2;
use tracing::debug;

/// Value encoding declared by `$DATATYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Unsigned integer of `$PnB` bits.
    Integer,
}

impl DataType {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_uppercase().as_str() {
            "F" => Ok(DataType::Float),
            "D" => Ok(DataType::Double),
            "I" => Ok(DataType::Integer),
            other => Err(CytoError::Parse(format!("unsupported $DATATYPE '{other}'"))),
        }
    }
}

/// Byte order declared by `$BYTEORD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// `1,2,3,4`
    Little,
    /// `4,3,2,1`
    Big,
}

impl Endian {
    fn parse(value: &str) -> AppResult<Self> {
        let order: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        match order.as_str() {
            "1" | "1,2" | "1,2,3,4" | "1,2,3,4,5,6,7,8" => Ok(Endian::Little),
            "2,1" | "4,3,2,1" | "8,7,6,5,4,3,2,1" => Ok(Endian::Big),
            other => Err(CytoError::Parse(format!("unsupported $BYTEORD '{other}'"))),
        }
    }
}

/// Layout of one parameter within an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParamLayout {
    bytes: usize,
    mask: Option<u64>,
}

/// Everything needed to decode the DATA segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLayout {
    /// Value encoding.
    pub data_type: DataType,
    /// Byte order.
    pub endian: Endian,
    /// Number of parameters (`$PAR`).
    pub parameters: usize,
    params: Vec<ParamLayout>,
}

impl DataLayout {
    /// Derive the layout from TEXT keywords.
    pub fn from_metadata(metadata: &Metadata, parameters: usize) -> AppResult<Self> {
        if let Some(mode) = metadata.get("mode") {
            if !mode.trim().eq_ignore_ascii_case("L") {
                return Err(CytoError::Parse(format!(
                    "only list mode data is supported, found $MODE '{mode}'"
                )));
            }
        }

        let data_type = DataType::parse(metadata.get("datatype").ok_or_else(|| {
            CytoError::Parse("missing $DATATYPE keyword".to_string())
        })?)?;
        let endian = Endian::parse(metadata.get_or("byteord", "1,2,3,4"))?;

        let mut params = Vec::with_capacity(parameters);
        for n in 1..=parameters {
            let bits = metadata.get_usize(&format!("p{n}b"))?;
            let bytes = match data_type {
                DataType::Float => 4,
                DataType::Double => 8,
                DataType::Integer => {
                    let bits = bits.ok_or_else(|| {
                        CytoError::Parse(format!("missing $P{n}B for integer data"))
                    })?;
                    if !matches!(bits, 8 | 16 | 32 | 64) {
                        return Err(CytoError::Parse(format!(
                            "$P{n}B of {bits} bits is not byte aligned"
                        )));
                    }
                    bits / 8
                }
            };
            let mask = match data_type {
                DataType::Integer => integer_mask(metadata, n)?,
                _ => None,
            };
            params.push(ParamLayout { bytes, mask });
        }

        Ok(Self {
            data_type,
            endian,
            parameters,
            params,
        })
    }

    /// Bytes occupied by one event.
    pub fn event_width(&self) -> usize {
        self.params.iter().map(|p| p.bytes).sum()
    }
}

/// Bit mask derived from `$PnR` when the range is a power of two.
fn integer_mask(metadata: &Metadata, n: usize) -> AppResult<Option<u64>> {
    let Some(range) = metadata.get(&format!("p{n}r")) else {
        return Ok(None);
    };
    // Ranges are occasionally written as floats, e.g. "1024.0".
    let range = range.trim().parse::<f64>().map_err(|_| {
        CytoError::Parse(format!("$P{n}R is not a number: '{range}'"))
    })?;
    if range < 1.0 || range.fract() != 0.0 || range > u64::MAX as f64 {
        return Ok(None);
    }
    let range = range as u64;
    Ok(range.is_power_of_two().then(|| range - 1))
}

/// Resolve the DATA segment from the header, or from `$BEGINDATA`/`$ENDDATA`.
pub fn data_segment(header: &Header, metadata: &Metadata) -> AppResult<Segment> {
    if !header.data.is_empty() {
        return Ok(header.data);
    }
    let segment = Segment {
        begin: metadata.get_usize("begindata")?.unwrap_or(0),
        end: metadata.get_usize("enddata")?.unwrap_or(0),
    };
    if segment.is_empty() {
        return Err(CytoError::Parse(
            "DATA segment offsets are missing from both HEADER and TEXT".to_string(),
        ));
    }
    Ok(segment)
}

/// Number of whole events held by a DATA segment of `len` bytes.
///
/// Fails when the length does not divide into events of the layout's width.
pub fn event_count(len: usize, layout: &DataLayout) -> AppResult<usize> {
    if layout.parameters == 0 {
        if len == 0 {
            return Ok(0);
        }
        return Err(CytoError::Parse(
            "DATA segment is not empty but $PAR is 0".to_string(),
        ));
    }

    let width = layout.event_width();
    if len % width != 0 {
        return Err(CytoError::Parse(format!(
            "DATA segment length {len} is not a multiple of the {width} byte event width; \
             value count does not divide into {} channels",
            layout.parameters
        )));
    }
    Ok(len / width)
}

/// Decode the DATA bytes into a flat buffer of values in event-major order.
pub fn decode_values(bytes: &[u8], layout: &DataLayout) -> AppResult<Vec<f32>> {
    let events = event_count(bytes.len(), layout)?;
    if events == 0 {
        return Ok(Vec::new());
    }

    let width = layout.event_width();
    let mut values = Vec::with_capacity(events * layout.parameters);
    for event in bytes.chunks_exact(width) {
        let mut offset = 0;
        for param in &layout.params {
            let raw = &event[offset..offset + param.bytes];
            offset += param.bytes;
            values.push(match layout.endian {
                Endian::Little => read_value::<LittleEndian>(raw, layout.data_type, param),
                Endian::Big => read_value::<BigEndian>(raw, layout.data_type, param),
            });
        }
    }
    Ok(values)
}

fn read_value<B: ByteOrder>(raw: &[u8], data_type: DataType, param: &ParamLayout) -> f32 {
    match data_type {
        DataType::Float => B::read_f32(raw),
        DataType::Double => B::read_f64(raw) as f32,
        DataType::Integer => {
            let value = match param.bytes {
                1 => u64::from(raw[0]),
                2 => u64::from(B::read_u16(raw)),
                4 => u64::from(B::read_u32(raw)),
                _ => B::read_u64(raw),
            };
            param.mask.map_or(value, |mask| value & mask) as f32
        }
    }
}

/// Reshape a flat buffer into `(-1, channels)`.
///
/// A buffer whose length is not a multiple of `channels` is rejected rather than truncated.
pub fn reshape_events(values: Vec<f32>, channels: usize) -> AppResult<Array2<f32>> {
    if channels == 0 {
        if values.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }
        return Err(CytoError::Parse(
            "event values present but channel count is 0".to_string(),
        ));
    }
    if values.len() % channels != 0 {
        return Err(CytoError::Parse(format!(
            "{} event values cannot be reshaped into {} channels",
            values.len(),
            channels
        )));
    }
    let rows = values.len() / channels;
    debug!(events = rows, channels, "Reshaping event buffer");
    Array2::from_shape_vec((rows, channels), values)
        .map_err(|e| CytoError::Parse(format!("event reshape failed: {e}")))
}
