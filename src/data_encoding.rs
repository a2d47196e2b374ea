use std::fmt;
use std::fmt::Formatter;

/// Known data payload encodings.
/// ```text
/// 0   Text, UTF-8 allowed, use ASCII for maximum portability
/// 1   16-bit integer (two's complement), little endian byte order
/// 3   32-bit integer (two's complement), little endian byte order
/// 4   32-bit floats (IEEE float), little endian byte order
/// 5   64-bit floats (IEEE double), little endian byte order
/// 10  Steim-1 integer compression, big endian byte order
/// 11  Steim-2 integer compression, big endian byte order
/// 12  GEOSCOPE multiplexed 24-bit integer, legacy
/// 13  GEOSCOPE multiplexed 16-bit gain ranged, 3-bit exponent, legacy
/// 14  GEOSCOPE multiplexed 16-bit gain ranged, 4-bit exponent, legacy
/// 16  CDSN 16-bit gain ranged, legacy
/// 30  SRO 16-bit gain ranged, legacy
/// 32  DWWSSN 16-bit, legacy
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    TEXT,
    INT16,
    INT32,
    FLOAT32,
    FLOAT64,
    STEIM1,
    STEIM2,
    GEOSCOPE24,
    GEOSCOPE163,
    GEOSCOPE164,
    CDSN,
    SRO,
    DWWSSN,
    UNKNOWN(u8),
}

impl DataEncoding {
    /// Creates a DataEncoding based on the input integer
    pub fn from_int(val: u8) -> DataEncoding {
        match val {
            0 => DataEncoding::TEXT,
            1 => DataEncoding::INT16,
            3 => DataEncoding::INT32,
            4 => DataEncoding::FLOAT32,
            5 => DataEncoding::FLOAT64,
            10 => DataEncoding::STEIM1,
            11 => DataEncoding::STEIM2,
            12 => DataEncoding::GEOSCOPE24,
            13 => DataEncoding::GEOSCOPE163,
            14 => DataEncoding::GEOSCOPE164,
            16 => DataEncoding::CDSN,
            30 => DataEncoding::SRO,
            32 => DataEncoding::DWWSSN,
            _ => DataEncoding::UNKNOWN(val),
        }
    }

    /// The integer value, as a u8, of the encoding
    pub fn value(&self) -> u8 {
        match &self {
            DataEncoding::TEXT => 0,
            DataEncoding::INT16 => 1,
            DataEncoding::INT32 => 3,
            DataEncoding::FLOAT32 => 4,
            DataEncoding::FLOAT64 => 5,
            DataEncoding::STEIM1 => 10,
            DataEncoding::STEIM2 => 11,
            DataEncoding::GEOSCOPE24 => 12,
            DataEncoding::GEOSCOPE163 => 13,
            DataEncoding::GEOSCOPE164 => 14,
            DataEncoding::CDSN => 16,
            DataEncoding::SRO => 30,
            DataEncoding::DWWSSN => 32,
            DataEncoding::UNKNOWN(val) => *val,
        }
    }

    /// Size in bytes of one decoded sample.
    pub fn sample_size(&self) -> usize {
        match self.sample_type() {
            't' => 1,
            'i' | 'f' => 4,
            'd' => 8,
            _ => 0,
        }
    }

    /// The sample type tag of the decoded form: `t` text, `i` 32-bit
    /// integer, `f` 32-bit float, `d` 64-bit float.
    pub fn sample_type(&self) -> char {
        match self {
            DataEncoding::TEXT => 't',
            DataEncoding::INT16
            | DataEncoding::INT32
            | DataEncoding::STEIM1
            | DataEncoding::STEIM2
            | DataEncoding::GEOSCOPE24
            | DataEncoding::CDSN
            | DataEncoding::SRO
            | DataEncoding::DWWSSN => 'i',
            DataEncoding::FLOAT32 | DataEncoding::GEOSCOPE163 | DataEncoding::GEOSCOPE164 => 'f',
            DataEncoding::FLOAT64 => 'd',
            DataEncoding::UNKNOWN(_) => '\0',
        }
    }

    /// True for the legacy encodings that can be decoded but not produced.
    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            DataEncoding::GEOSCOPE24
                | DataEncoding::GEOSCOPE163
                | DataEncoding::GEOSCOPE164
                | DataEncoding::CDSN
                | DataEncoding::SRO
                | DataEncoding::DWWSSN
        )
    }
}

impl fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DataEncoding::TEXT => write!(f, "Text, UTF-8 allowed, use ASCII for maximum portability"),
            DataEncoding::INT16 => write!(
                f,
                "16-bit integer (two's complement), little endian byte order"
            ),
            DataEncoding::INT32 => write!(
                f,
                "32-bit integer (two's complement), little endian byte order"
            ),
            DataEncoding::FLOAT32 => {
                write!(f, "32-bit floats (IEEE float), little endian byte order")
            }
            DataEncoding::FLOAT64 => {
                write!(f, "64-bit floats (IEEE double), little endian byte order")
            }
            DataEncoding::STEIM1 => write!(f, "STEIM-1 integer compression, big endian byte order"),
            DataEncoding::STEIM2 => write!(f, "STEIM-2 integer compression, big endian byte order"),
            DataEncoding::GEOSCOPE24 => write!(f, "GEOSCOPE multiplexed 24-bit integer"),
            DataEncoding::GEOSCOPE163 => {
                write!(f, "GEOSCOPE multiplexed 16-bit gain ranged, 3-bit exponent")
            }
            DataEncoding::GEOSCOPE164 => {
                write!(f, "GEOSCOPE multiplexed 16-bit gain ranged, 4-bit exponent")
            }
            DataEncoding::CDSN => write!(f, "CDSN 16-bit gain ranged"),
            DataEncoding::SRO => write!(f, "SRO 16-bit gain ranged"),
            DataEncoding::DWWSSN => write!(f, "DWWSSN 16-bit integer"),
            DataEncoding::UNKNOWN(val) => write!(f, "Unknown encoding: {}", val),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trip() {
        for v in [0u8, 1, 3, 4, 5, 10, 11, 12, 13, 14, 16, 30, 32, 77] {
            assert_eq!(DataEncoding::from_int(v).value(), v);
        }
    }

    #[test]
    fn sample_sizes() {
        assert_eq!(DataEncoding::TEXT.sample_size(), 1);
        assert_eq!(DataEncoding::INT16.sample_size(), 4);
        assert_eq!(DataEncoding::STEIM2.sample_size(), 4);
        assert_eq!(DataEncoding::FLOAT32.sample_size(), 4);
        assert_eq!(DataEncoding::FLOAT64.sample_size(), 8);
        assert_eq!(DataEncoding::GEOSCOPE163.sample_size(), 4);
    }

    #[test]
    fn legacy_flags() {
        assert!(DataEncoding::SRO.is_legacy());
        assert!(DataEncoding::GEOSCOPE24.is_legacy());
        assert!(!DataEncoding::STEIM1.is_legacy());
    }
}
