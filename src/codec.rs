use std::collections::BTreeMap;

use crate::error::{DecodeError, StoreError};

/// One dictionary entry: a flat attribute-name -> attribute-value map
/// (translation, definition, phonetic, frequency rank, ...). No schema is
/// enforced; the importer derives the field names from the source header.
pub type Record = BTreeMap<String, String>;

/// Serialize a record into the opaque byte form stored as a value.
///
/// An empty map encodes to a valid payload that round-trips back to an
/// empty, non-null map.
pub fn encode(record: &Record) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(record).map_err(StoreError::Encode)
}

/// Deserialize stored bytes back into a record. Fails with a
/// [`DecodeError`] when the bytes are corrupt or not a record encoding.
pub fn decode(bytes: &[u8]) -> Result<Record, DecodeError> {
    bincode::deserialize(bytes).map_err(DecodeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_populated_record() {
        let mut record = Record::new();
        record.insert("translation".to_string(), "a greeting".to_string());
        record.insert("phonetic".to_string(), "h\u{259}'l\u{6f}\u{28a}".to_string());
        record.insert("frq".to_string(), "120".to_string());

        let bytes = encode(&record).unwrap();
        assert_eq!(decode(&bytes).unwrap(), record);
    }

    #[test]
    fn round_trips_the_empty_record_to_an_empty_map() {
        let bytes = encode(&Record::new()).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn rejects_foreign_bytes() {
        // A length prefix pointing far past the end of the payload.
        let garbage = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(decode(&garbage).is_err());
    }
}
