//! FCS file loading and compensation.
//!
//! [`FcsFile`] is the file record: acquisition metadata, the channel/marker mappings, the
//! raw event matrix and, when available, the spillover matrix. It is built once from a path
//! and mutated only by [`FcsFile::compensate`].
//!
//! Missing optional metadata never fails a load; documented defaults apply instead
//! (`"Unknown"`, `0`, `false`). Only malformed binary structure is a parse failure.
//!
//! ```no_run
//! use cytogate::fcs::FcsFile;
//!
//! let mut fcs = FcsFile::open("sample.fcs")?;
//! if fcs.spill.is_some() {
//!     fcs.compensate()?;
//! }
//! println!("{:?}", fcs.dataframe().columns());
//! # Ok::<(), cytogate::error::CytoError>(())
//! ```

pub mod channels;
pub mod compensation;
pub mod data;
pub mod spillover;
pub mod table;
pub mod text;

pub use channels::ChannelMapping;
pub use compensation::{CompensationState, DEFAULT_SCATTER_PATTERNS};
pub use spillover::SpilloverMatrix;
pub use table::EventTable;
pub use text::Metadata;

use crate::error::{AppResult, CytoError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use memmap2::Mmap;
use ndarray::Array2;
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Sentinel used for metadata that could not be recovered.
pub const UNKNOWN: &str = "Unknown";

/// Status value marking a passed cytometer setup and tracking check.
pub const QC_SUCCESS: &str = "SUCCESS";

/// Keys consulted for the QC status, in order.
const QC_STATUS_KEYS: [&str; 2] = ["cst setup status", "cst_setup_status"];

/// Trigger threshold configured on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelThreshold {
    /// Channel name as written in the file.
    pub channel: String,
    /// Threshold value as written in the file.
    pub threshold: String,
}

/// Per-channel threshold settings.
///
/// `Unknown` means the `threshold` keyword never existed, which is distinct from an empty
/// list. It serializes as the string `"Unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thresholds {
    /// Keyword absent.
    Unknown,
    /// Keyword present, parsed into (channel, value) pairs.
    Listed(Vec<ChannelThreshold>),
}

impl Thresholds {
    /// Parse the comma separated `channel,value,channel,value,...` form.
    ///
    /// Tokens are paired by position; an empty token is an empty value, not a gap.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let tokens: Vec<&str> = raw.split(',').map(str::trim).collect();
        if tokens.len() % 2 != 0 {
            return Err(CytoError::Parse(format!(
                "threshold keyword has {} tokens; expected channel/value pairs",
                tokens.len()
            )));
        }
        Ok(Thresholds::Listed(
            tokens
                .chunks_exact(2)
                .map(|pair| ChannelThreshold {
                    channel: pair[0].to_string(),
                    threshold: pair[1].to_string(),
                })
                .collect(),
        ))
    }
}

impl Serialize for Thresholds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Thresholds::Unknown => serializer.serialize_str(UNKNOWN),
            Thresholds::Listed(list) => list.serialize(serializer),
        }
    }
}

/// Acquisition timestamp, or the `"Unknown"` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionDate {
    /// Parsed from `$DATE` and `$ETIM`.
    Known(NaiveDateTime),
    /// Missing or unparsable.
    Unknown,
}

impl AcquisitionDate {
    /// Combine date and time keywords; any failure yields `Unknown`.
    pub fn parse(date: Option<&str>, time: Option<&str>) -> Self {
        let (Some(date), Some(time)) = (date, time) else {
            return AcquisitionDate::Unknown;
        };
        match (parse_date(date), parse_time(time)) {
            (Some(d), Some(t)) => AcquisitionDate::Known(NaiveDateTime::new(d, t)),
            _ => AcquisitionDate::Unknown,
        }
    }
}

impl fmt::Display for AcquisitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionDate::Known(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            AcquisitionDate::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for AcquisitionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = ["%d-%b-%Y", "%Y-%m-%d", "%m/%d/%Y", "%d-%b-%y"];
    let raw = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    // FCS 2.0 appends 1/60 s ticks as a fourth field: hh:mm:ss:tt
    let raw = match raw.match_indices(':').nth(2) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    };
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// A loaded FCS file.
#[derive(Debug, Clone)]
pub struct FcsFile {
    /// FCS version tag from the header.
    pub version: String,
    /// Embedded file name (`$FIL`).
    pub filename: String,
    /// Acquisition system (`$SYS`).
    pub sys: String,
    /// Declared event count (`$TOT`).
    pub total_events: usize,
    /// Tube name.
    pub tube_name: String,
    /// Experiment name.
    pub exp_name: String,
    /// Cytometer (`$CYT`).
    pub cytometer: String,
    /// Creating software.
    pub creator: String,
    /// Exporting user.
    pub operator: String,
    /// Channel to marker mappings in column order.
    pub fluoro_mappings: Vec<ChannelMapping>,
    /// Event matrix, rows = events, columns = channels.
    pub event_data: Array2<f32>,
    /// Per-channel trigger thresholds.
    pub threshold: Thresholds,
    /// Acquisition timestamp.
    pub processing_date: AcquisitionDate,
    /// Spillover matrix, external file taking precedence over the embedded one.
    pub spill: Option<SpilloverMatrix>,
    /// Whether the cytometer setup check passed on the day of acquisition.
    pub cst_pass: bool,
    /// Full normalized TEXT dictionary.
    pub metadata: Metadata,
    compensation: CompensationState,
}

/// Metadata-only view of a file, without the event matrix.
#[derive(Debug, Clone, Serialize)]
pub struct FcsSummary {
    /// FCS version tag.
    pub version: String,
    /// Embedded file name.
    pub filename: String,
    /// Acquisition system.
    pub sys: String,
    /// Declared event count.
    pub total_events: usize,
    /// Tube name.
    pub tube_name: String,
    /// Experiment name.
    pub exp_name: String,
    /// Cytometer.
    pub cytometer: String,
    /// Creating software.
    pub creator: String,
    /// Exporting user.
    pub operator: String,
    /// Channel mappings.
    pub fluoro_mappings: Vec<ChannelMapping>,
    /// Per-channel thresholds.
    pub threshold: Thresholds,
    /// Acquisition timestamp.
    pub processing_date: AcquisitionDate,
    /// Labels of the spillover matrix, if any.
    pub spillover_channels: Option<Vec<String>>,
    /// Setup check flag.
    pub cst_pass: bool,
    /// Shape of the event matrix, `(events, channels)`.
    pub event_shape: (usize, usize),
}

/// Fields derived from TEXT alone.
struct TextFields {
    filename: String,
    sys: String,
    total_events: usize,
    tube_name: String,
    exp_name: String,
    cytometer: String,
    creator: String,
    operator: String,
    fluoro_mappings: Vec<ChannelMapping>,
    threshold: Thresholds,
    processing_date: AcquisitionDate,
    cst_pass: bool,
}

impl TextFields {
    fn from_metadata(metadata: &Metadata) -> AppResult<Self> {
        let parameters = metadata
            .get_usize("par")?
            .ok_or_else(|| CytoError::Parse("missing $PAR keyword".to_string()))?;

        let total_events = match metadata.get("tot") {
            None => 0,
            Some(raw) => raw.trim().parse::<usize>().unwrap_or_else(|_| {
                warn!(value = raw, "Unparsable $TOT keyword, defaulting to 0");
                0
            }),
        };

        let threshold = match metadata.get("threshold") {
            Some(raw) => Thresholds::parse(raw)?,
            None => Thresholds::Unknown,
        };

        let cst_pass = QC_STATUS_KEYS
            .iter()
            .find_map(|key| metadata.get(key))
            .is_some_and(|status| status == QC_SUCCESS);

        let text = |key: &str, default: &str| metadata.get_or(key, default).to_string();
        Ok(Self {
            filename: text("fil", "Unknown_filename"),
            sys: text("sys", "Unknown_system"),
            total_events,
            tube_name: text("tube name", UNKNOWN),
            exp_name: text("experiment name", UNKNOWN),
            cytometer: text("cyt", UNKNOWN),
            creator: text("creator", UNKNOWN),
            operator: text("export user name", UNKNOWN),
            fluoro_mappings: channels::fluoro_mappings(metadata, parameters)?,
            threshold,
            processing_date: AcquisitionDate::parse(metadata.get("date"), metadata.get("etim")),
            cst_pass,
        })
    }
}

/// Embedded spillover matrix, if a spillover keyword exists.
fn embedded_spillover(metadata: &Metadata) -> AppResult<Option<SpilloverMatrix>> {
    spillover::SPILLOVER_KEYS
        .iter()
        .find_map(|key| metadata.get(key))
        .map(SpilloverMatrix::decode)
        .transpose()
}

fn map_file(path: &Path) -> AppResult<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and dropped before this call chain returns; callers
    // must not truncate the file while it is being parsed.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

impl FcsFile {
    /// Load a file using its embedded spillover matrix, if any.
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::open_with_compensation(path, None::<&Path>)
    }

    /// Load a file; an external CSV compensation matrix overrides the embedded one.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with_compensation<P: AsRef<Path>, C: AsRef<Path>>(
        path: P,
        comp_matrix: Option<C>,
    ) -> AppResult<Self> {
        let mmap = map_file(path.as_ref())?;
        let external = comp_matrix
            .map(|c| SpilloverMatrix::from_csv(c.as_ref()))
            .transpose()?;
        let fcs = Self::from_bytes(&mmap, external)?;
        info!(
            events = fcs.event_data.nrows(),
            channels = fcs.event_data.ncols(),
            spillover = fcs.spill.is_some(),
            "Loaded FCS file"
        );
        Ok(fcs)
    }

    /// Parse a file already in memory.
    pub fn from_bytes(bytes: &[u8], external_spill: Option<SpilloverMatrix>) -> AppResult<Self> {
        let (header, metadata) = text::read_header_and_text(bytes)?;
        let fields = TextFields::from_metadata(&metadata)?;
        let parameters = fields.fluoro_mappings.len();

        let layout = data::DataLayout::from_metadata(&metadata, parameters)?;
        let segment = data::data_segment(&header, &metadata)?;
        let values = data::decode_values(segment.slice(bytes, "DATA")?, &layout)?;
        let event_data = data::reshape_events(values, parameters)?;
        if event_data.nrows() != fields.total_events {
            warn!(
                declared = fields.total_events,
                decoded = event_data.nrows(),
                "Decoded event count differs from $TOT"
            );
        }

        let spill = match external_spill {
            Some(spill) => Some(spill),
            None => embedded_spillover(&metadata)?,
        };

        Ok(Self {
            version: header.version,
            filename: fields.filename,
            sys: fields.sys,
            total_events: fields.total_events,
            tube_name: fields.tube_name,
            exp_name: fields.exp_name,
            cytometer: fields.cytometer,
            creator: fields.creator,
            operator: fields.operator,
            fluoro_mappings: fields.fluoro_mappings,
            event_data,
            threshold: fields.threshold,
            processing_date: fields.processing_date,
            spill,
            cst_pass: fields.cst_pass,
            metadata,
            compensation: CompensationState::Raw,
        })
    }

    /// Read HEADER and TEXT without decoding event data.
    ///
    /// The DATA segment is still checked: its layout must be supported and its length must
    /// hold a whole number of events, so a file that [`FcsFile::open`] would reject as
    /// malformed is rejected here too.
    pub fn read_summary<P: AsRef<Path>>(path: P) -> AppResult<FcsSummary> {
        let mmap = map_file(path.as_ref())?;
        let (header, metadata) = text::read_header_and_text(&mmap)?;
        let fields = TextFields::from_metadata(&metadata)?;
        let parameters = fields.fluoro_mappings.len();

        let layout = data::DataLayout::from_metadata(&metadata, parameters)?;
        let segment = data::data_segment(&header, &metadata)?;
        let events = data::event_count(segment.slice(&mmap, "DATA")?.len(), &layout)?;

        let spill = embedded_spillover(&metadata)?;
        Ok(FcsSummary {
            version: header.version,
            filename: fields.filename,
            sys: fields.sys,
            total_events: fields.total_events,
            tube_name: fields.tube_name,
            exp_name: fields.exp_name,
            cytometer: fields.cytometer,
            creator: fields.creator,
            operator: fields.operator,
            fluoro_mappings: fields.fluoro_mappings,
            threshold: fields.threshold,
            processing_date: fields.processing_date,
            spillover_channels: spill.map(|s| s.labels().to_vec()),
            cst_pass: fields.cst_pass,
            event_shape: (events, parameters),
        })
    }

    /// Channel mappings of a file, without decoding event data.
    pub fn read_mappings<P: AsRef<Path>>(path: P) -> AppResult<Vec<ChannelMapping>> {
        Ok(Self::read_summary(path)?.fluoro_mappings)
    }

    /// Summary of this file's metadata.
    pub fn summary(&self) -> FcsSummary {
        FcsSummary {
            version: self.version.clone(),
            filename: self.filename.clone(),
            sys: self.sys.clone(),
            total_events: self.total_events,
            tube_name: self.tube_name.clone(),
            exp_name: self.exp_name.clone(),
            cytometer: self.cytometer.clone(),
            creator: self.creator.clone(),
            operator: self.operator.clone(),
            fluoro_mappings: self.fluoro_mappings.clone(),
            threshold: self.threshold.clone(),
            processing_date: self.processing_date,
            spillover_channels: self.spill.as_ref().map(|s| s.labels().to_vec()),
            cst_pass: self.cst_pass,
            event_shape: self.event_data.dim(),
        }
    }

    /// Labelled view of the event data.
    pub fn dataframe(&self) -> EventTable<'_> {
        EventTable::new(&self.fluoro_mappings, self.event_data.view())
    }

    /// Current compensation state.
    pub fn compensation_state(&self) -> CompensationState {
        self.compensation
    }

    /// Compensate the event matrix in place, excluding the default scatter/time channels.
    ///
    /// This is a one-way `Raw → Compensated` transition; a second call fails with
    /// [`CytoError::AlreadyCompensated`] and leaves the data untouched.
    pub fn compensate(&mut self) -> AppResult<()> {
        self.compensate_with(&DEFAULT_SCATTER_PATTERNS)
    }

    /// Compensate with a custom set of scatter/time channel substrings.
    pub fn compensate_with<S: AsRef<str>>(&mut self, scatter_patterns: &[S]) -> AppResult<()> {
        let spill = self.spill.as_ref().ok_or(CytoError::MissingSpillover)?;
        if self.compensation == CompensationState::Compensated {
            return Err(CytoError::AlreadyCompensated);
        }
        compensation::compensate_events(
            &mut self.event_data,
            &self.fluoro_mappings,
            spill,
            scatter_patterns,
        )?;
        self.compensation = CompensationState::Compensated;
        info!(filename = %self.filename, "Compensated event data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_parse_pairs() {
        let parsed = Thresholds::parse("FSC-A,5000, SSC-A ,200").unwrap();
        assert_eq!(
            parsed,
            Thresholds::Listed(vec![
                ChannelThreshold {
                    channel: "FSC-A".into(),
                    threshold: "5000".into()
                },
                ChannelThreshold {
                    channel: "SSC-A".into(),
                    threshold: "200".into()
                },
            ])
        );
        assert!(Thresholds::parse("FSC-A,5000,SSC-A").is_err());
    }

    #[test]
    fn thresholds_keep_empty_tokens_in_place() {
        assert_eq!(
            Thresholds::parse("FSC,,SSC,200").unwrap(),
            Thresholds::Listed(vec![
                ChannelThreshold {
                    channel: "FSC".into(),
                    threshold: "".into()
                },
                ChannelThreshold {
                    channel: "SSC".into(),
                    threshold: "200".into()
                },
            ])
        );
        // trailing comma leaves a dangling channel token
        assert!(Thresholds::parse("FSC,5000,").is_err());
        assert!(Thresholds::parse("").is_err());
    }

    #[test]
    fn unknown_thresholds_serialize_as_sentinel() {
        assert_eq!(
            serde_json::to_string(&Thresholds::Unknown).unwrap(),
            "\"Unknown\""
        );
        assert_eq!(
            serde_json::to_string(&Thresholds::Listed(vec![])).unwrap(),
            "[]"
        );
    }

    #[test]
    fn acquisition_date_parses_fcs_forms() {
        let date = AcquisitionDate::parse(Some("05-JUN-2020"), Some("14:03:27"));
        assert_eq!(date.to_string(), "2020-06-05T14:03:27");

        let date = AcquisitionDate::parse(Some("2021-01-31"), Some("08:15:00:30"));
        assert_eq!(date.to_string(), "2021-01-31T08:15:00");

        let date = AcquisitionDate::parse(Some("2021-01-31"), Some("08:15:00.5"));
        assert_eq!(date.to_string(), "2021-01-31T08:15:00.500");
    }

    #[test]
    fn acquisition_date_falls_back_to_unknown() {
        assert_eq!(AcquisitionDate::parse(None, Some("10:00:00")), AcquisitionDate::Unknown);
        assert_eq!(AcquisitionDate::parse(Some("05-JUN-2020"), None), AcquisitionDate::Unknown);
        assert_eq!(
            AcquisitionDate::parse(Some("yesterday"), Some("10:00:00")).to_string(),
            "Unknown"
        );
    }
}
