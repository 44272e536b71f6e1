//! QR label reading
//!
//! Decodes the carton QR label and records the identity it carries. A label
//! payload looks like `identifier,model_number,destination_code,some_code,serial_number`.

use image::{imageops, RgbImage};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::storage::identity_log::{IdentityRecord, IdentitySink};

/// Minimum comma-separated fields in a usable payload
pub const MIN_PAYLOAD_FIELDS: usize = 5;

/// QR symbol decoder
pub trait QrDecoder {
    /// Text of every QR symbol in the image, in detector order
    fn decode_all(&self, image: &RgbImage) -> Vec<String>;
}

/// QR decoder built on rqrr grid detection
#[derive(Debug, Default)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn decode_all(&self, image: &RgbImage) -> Vec<String> {
        let gray = imageops::grayscale(image);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32).0[0],
        );

        prepared
            .detect_grids()
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((_meta, content)) => Some(content),
                Err(e) => {
                    debug!("Skipping undecodable QR symbol: {:?}", e);
                    None
                }
            })
            .collect()
    }
}

/// Parse one payload into an identity record.
///
/// Returns `None` when the payload has fewer than [`MIN_PAYLOAD_FIELDS`] fields.
pub fn parse_payload(payload: &str) -> Option<IdentityRecord> {
    let fields: Vec<&str> = payload.trim().split(',').map(str::trim).collect();
    if fields.len() < MIN_PAYLOAD_FIELDS {
        return None;
    }

    // fields[3] is a label code the station does not track
    Some(IdentityRecord::new(fields[0], fields[1], fields[2], fields[4]))
}

/// Decode every QR label in `image` and append the new identities to `sink`.
///
/// Duplicate payloads within this one call are recorded once; nothing is
/// remembered between calls. Returns the records that were appended.
pub fn process<D, S>(decoder: &D, image: &RgbImage, sink: &mut S) -> Vec<IdentityRecord>
where
    D: QrDecoder + ?Sized,
    S: IdentitySink + ?Sized,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut appended = Vec::new();

    for raw in decoder.decode_all(image) {
        let payload = raw.trim().to_string();
        if !seen.insert(payload.clone()) {
            continue;
        }

        info!("QR Code Detected: {}", payload);

        let Some(record) = parse_payload(&payload) else {
            debug!("Dropping QR payload with fewer than {} fields", MIN_PAYLOAD_FIELDS);
            continue;
        };

        debug!(
            "Identifier: {}, Model Number: {} (Trimmed: {}), Destination Code: {}, Serial Number: {}",
            record.identifier,
            record.model_number,
            record.trimmed_model_number,
            record.destination_code,
            record.serial_number
        );

        match sink.append(&record) {
            Ok(()) => appended.push(record),
            Err(e) => warn!("Failed to record QR identity {}: {:#}", record.identifier, e),
        }
    }

    appended
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Returns one queued batch of payloads per call
    #[derive(Default)]
    pub struct ScriptedDecoder {
        pub batches: RefCell<VecDeque<Vec<String>>>,
    }

    impl ScriptedDecoder {
        pub fn new(batches: &[&[&str]]) -> Self {
            Self {
                batches: RefCell::new(
                    batches
                        .iter()
                        .map(|batch| batch.iter().map(|s| s.to_string()).collect())
                        .collect(),
                ),
            }
        }
    }

    impl QrDecoder for ScriptedDecoder {
        fn decode_all(&self, _image: &RgbImage) -> Vec<String> {
            self.batches.borrow_mut().pop_front().unwrap_or_default()
        }
    }

    /// In-memory identity sink
    #[derive(Default)]
    pub struct MemorySink {
        pub records: Vec<IdentityRecord>,
        pub fail_on: Option<String>,
    }

    impl IdentitySink for MemorySink {
        fn append(&mut self, record: &IdentityRecord) -> Result<()> {
            if self.fail_on.as_deref() == Some(record.identifier.as_str()) {
                anyhow::bail!("disk full");
            }
            self.records.push(record.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MemorySink, ScriptedDecoder};
    use super::*;

    fn frame() -> RgbImage {
        RgbImage::new(8, 8)
    }

    #[test]
    fn test_valid_payload_appends_one_record() {
        let decoder = ScriptedDecoder::new(&[&["ID1,ABCDEFG123,DST,CC,SN1"]]);
        let mut sink = MemorySink::default();

        let appended = process(&decoder, &frame(), &mut sink);

        assert_eq!(appended.len(), 1);
        assert_eq!(sink.records.len(), 1);
        let record = &sink.records[0];
        assert_eq!(record.identifier, "ID1");
        assert_eq!(record.model_number, "ABCDEFG123");
        assert_eq!(record.trimmed_model_number, "ABCDEFG");
        assert_eq!(record.destination_code, "DST");
        assert_eq!(record.serial_number, "SN1");
    }

    #[test]
    fn test_short_model_number_is_kept_whole() {
        let decoder = ScriptedDecoder::new(&[&["ID1,ABC,DST,CC,SN1"]]);
        let mut sink = MemorySink::default();

        process(&decoder, &frame(), &mut sink);
        assert_eq!(sink.records[0].trimmed_model_number, "ABC");
    }

    #[test]
    fn test_short_payloads_are_dropped() {
        let decoder = ScriptedDecoder::new(&[&["ID1,MODEL,DST,CC", "just text", ""]]);
        let mut sink = MemorySink::default();

        let appended = process(&decoder, &frame(), &mut sink);
        assert!(appended.is_empty());
        assert!(sink.records.is_empty());
    }

    #[test]
    fn test_malformed_payload_does_not_stop_batch() {
        let decoder = ScriptedDecoder::new(&[&["bad,payload", "ID2,MODEL22222,D,C,S2"]]);
        let mut sink = MemorySink::default();

        process(&decoder, &frame(), &mut sink);
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].identifier, "ID2");
    }

    #[test]
    fn test_duplicates_suppressed_within_call_only() {
        let payload = "A1,MODEL123,D1,X,S1";
        let decoder = ScriptedDecoder::new(&[&[payload, payload], &[payload]]);
        let mut sink = MemorySink::default();

        process(&decoder, &frame(), &mut sink);
        assert_eq!(sink.records.len(), 1);

        process(&decoder, &frame(), &mut sink);
        assert_eq!(sink.records.len(), 2);
    }

    #[test]
    fn test_payload_and_fields_are_trimmed() {
        let decoder = ScriptedDecoder::new(&[&["  ID1 , MODEL12345 ,DST, CC , SN1 \n", "ID1 , MODEL12345 ,DST, CC , SN1"]]);
        let mut sink = MemorySink::default();

        process(&decoder, &frame(), &mut sink);
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].model_number, "MODEL12345");
        assert_eq!(sink.records[0].serial_number, "SN1");
    }

    #[test]
    fn test_extra_fields_ignored() {
        let record = parse_payload("ID,MODEL1234,DST,CC,SN,extra,more").unwrap();
        assert_eq!(record.serial_number, "SN");
    }

    #[test]
    fn test_no_symbols_no_records() {
        let decoder = ScriptedDecoder::new(&[&[]]);
        let mut sink = MemorySink::default();

        assert!(process(&decoder, &frame(), &mut sink).is_empty());
    }

    #[test]
    fn test_sink_failure_skips_only_that_record() {
        let decoder = ScriptedDecoder::new(&[&["ID1,M1111111,D,C,S", "ID2,M2222222,D,C,S"]]);
        let mut sink = MemorySink {
            fail_on: Some("ID1".to_string()),
            ..Default::default()
        };

        let appended = process(&decoder, &frame(), &mut sink);
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].identifier, "ID2");
    }

    #[test]
    fn test_rqrr_finds_nothing_in_blank_frame() {
        let blank = RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
        assert!(RqrrDecoder.decode_all(&blank).is_empty());
    }
}
