//! Shared fixtures: a minimal FCS 3.0 writer for building test files.

#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::path::{Path, PathBuf};

/// Builder for synthetic FCS files.
pub struct FcsFixture {
    pub channels: Vec<(String, Option<String>)>,
    pub events: Vec<Vec<f32>>,
    pub keywords: Vec<(String, String)>,
    pub big_endian: bool,
    /// Put DATA offsets only in $BEGINDATA/$ENDDATA, leaving zeros in the header.
    pub offsets_in_text_only: bool,
    /// Extra bytes appended to the DATA segment (to corrupt it).
    pub trailing_data: Vec<u8>,
    /// Keywords written to a supplemental TEXT segment after DATA.
    pub supplemental: Vec<(String, String)>,
}

impl FcsFixture {
    pub fn new(channels: &[(&str, Option<&str>)]) -> Self {
        Self {
            channels: channels
                .iter()
                .map(|(n, s)| (n.to_string(), s.map(str::to_string)))
                .collect(),
            events: Vec::new(),
            keywords: Vec::new(),
            big_endian: false,
            offsets_in_text_only: false,
            trailing_data: Vec::new(),
            supplemental: Vec::new(),
        }
    }

    pub fn event(mut self, values: &[f32]) -> Self {
        assert_eq!(values.len(), self.channels.len());
        self.events.push(values.to_vec());
        self
    }

    pub fn keyword(mut self, key: &str, value: &str) -> Self {
        self.keywords.push((key.to_string(), value.to_string()));
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn offsets_in_text_only(mut self) -> Self {
        self.offsets_in_text_only = true;
        self
    }

    pub fn trailing_data(mut self, bytes: &[u8]) -> Self {
        self.trailing_data = bytes.to_vec();
        self
    }

    pub fn supplemental_keyword(mut self, key: &str, value: &str) -> Self {
        self.supplemental.push((key.to_string(), value.to_string()));
        self
    }

    fn data_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for event in &self.events {
            for &value in event {
                if self.big_endian {
                    data.write_f32::<BigEndian>(value).unwrap();
                } else {
                    data.write_f32::<LittleEndian>(value).unwrap();
                }
            }
        }
        data.extend_from_slice(&self.trailing_data);
        data
    }

    fn text(&self, data: (usize, usize), stext: (usize, usize)) -> String {
        let mut pairs: Vec<(String, String)> = vec![
            ("$BEGINANALYSIS".into(), "0".into()),
            ("$ENDANALYSIS".into(), "0".into()),
            // Fixed width so the TEXT length does not depend on the offsets.
            ("$BEGINSTEXT".into(), format!("{:0>10}", stext.0)),
            ("$ENDSTEXT".into(), format!("{:0>10}", stext.1)),
            ("$BEGINDATA".into(), format!("{:0>10}", data.0)),
            ("$ENDDATA".into(), format!("{:0>10}", data.1)),
            ("$BYTEORD".into(), if self.big_endian { "4,3,2,1" } else { "1,2,3,4" }.into()),
            ("$DATATYPE".into(), "F".into()),
            ("$MODE".into(), "L".into()),
            ("$NEXTDATA".into(), "0".into()),
            ("$PAR".into(), self.channels.len().to_string()),
        ];
        for (i, (name, marker)) in self.channels.iter().enumerate() {
            let n = i + 1;
            pairs.push((format!("$P{n}N"), name.clone()));
            if let Some(marker) = marker {
                pairs.push((format!("$P{n}S"), marker.clone()));
            }
            pairs.push((format!("$P{n}B"), "32".into()));
            pairs.push((format!("$P{n}E"), "0,0".into()));
            pairs.push((format!("$P{n}R"), "262144".into()));
        }
        pairs.extend(self.keywords.iter().cloned());
        encode_text(&pairs)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let data = self.data_bytes();
        let text_begin = 58;
        let text_len = self.text((0, 0), (0, 0)).len();
        let text_end = text_begin + text_len - 1;
        let data_begin = text_end + 1;
        // Zero-length segments are written as end = begin - 1.
        let data_end = data_begin + data.len() - 1;

        let stext = if self.supplemental.is_empty() {
            String::new()
        } else {
            encode_text(&self.supplemental)
        };
        let stext_offsets = if stext.is_empty() {
            (0, 0)
        } else {
            (data_end + 1, data_end + stext.len())
        };

        let text = self.text((data_begin, data_end), stext_offsets);
        assert_eq!(text.len(), text_len);

        let (hdr_begin, hdr_end) = if self.offsets_in_text_only {
            (0, 0)
        } else {
            (data_begin, data_end)
        };
        let header = format!(
            "FCS3.0    {:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            text_begin, text_end, hdr_begin, hdr_end, 0, 0
        );
        assert_eq!(header.len(), 58);

        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(text.as_bytes());
        bytes.extend_from_slice(&data);
        bytes.extend_from_slice(stext.as_bytes());
        bytes
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).unwrap();
        path
    }
}

fn encode_text(pairs: &[(String, String)]) -> String {
    let mut text = String::from("|");
    for (k, v) in pairs {
        text.push_str(&k.replace('|', "||"));
        text.push('|');
        text.push_str(&v.replace('|', "||"));
        text.push('|');
    }
    text
}

/// Four channel fixture: two scatter, two fluorescence.
pub fn standard_fixture() -> FcsFixture {
    FcsFixture::new(&[
        ("FSC_A", None),
        ("SSC-A", None),
        ("FL1_A", Some("CD3_FITC")),
        ("FL2-A", Some("CD4")),
    ])
    .event(&[1000.0, 200.0, 110.0, 60.0])
    .event(&[1500.0, 250.0, 20.0, 102.0])
    .event(&[800.0, 90.0, 0.0, 0.0])
    .keyword("$TOT", "3")
    .keyword("$FIL", "sample1.fcs")
    .keyword("$SYS", "Windows 10")
    .keyword("$CYT", "LSRFortessa")
    .keyword("TUBE NAME", "Tube_001")
    .keyword("EXPERIMENT NAME", "Exp 42")
    .keyword("CREATOR", "BD FACSDiva Software Version 8.0.1")
    .keyword("EXPORT USER NAME", "ross")
    .keyword("$DATE", "05-JUN-2020")
    .keyword("$BTIM", "14:01:02")
    .keyword("$ETIM", "14:03:27")
    .keyword("CST SETUP STATUS", "SUCCESS")
    .keyword("THRESHOLD", "FSC,5000,SSC,200")
    .keyword("SPILL", "2,FL1-A,FL2-A,1,0.2,0.1,1")
}
