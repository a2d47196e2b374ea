use std::string::FromUtf8Error;
use thiserror::Error;

/// Errors produced while reading, decoding, assembling or packing miniSEED.
#[derive(Error, Debug)]
pub enum MSeedError {
    #[error("IO Error")]
    IOError(#[from] std::io::Error),
    #[error("Insufficient bytes, {0} < needed {1}")]
    InsufficientBytes(usize, usize),
    #[error("Input is not miniSEED: {0}")]
    NotSeed(String),
    #[error("Length of data was incorrect: {0}")]
    WrongLength(String),
    #[error("Record length {0} out of range [{1}, {2}]")]
    OutOfRange(usize, usize, usize),
    #[error("Unknown or unsupported data encoding: `{0}`")]
    UnknownFormat(u8),
    #[error("Steim compression/decompression error: `{0}`")]
    Compression(String),
    #[error("CRC invalid for record: calc:{0:#X} header:{1:#X}")]
    CrcInvalid(u32, u32),
    #[error("Text not UTF8")]
    FromUtf8Error(#[from] FromUtf8Error),
    #[error("cannot parse extra headers")]
    JsonError(#[from] serde_json::Error),
    #[error("extra headers must be a JSON object but was `{0}`")]
    ExtraHeaderNotObject(serde_json::Value),
    #[error("extra header access: `{0}`")]
    ExtraHeader(String),
    #[error("cannot parse {1} in FDSN source identifier `{0}`")]
    SourceIdentifier(String, String),
    #[error("cannot parse time string `{0}`")]
    TimeParse(String),
    #[error("Expected {0} bytes for {1} samples as encoding type {2} but record has {3} bytes")]
    DataLength(usize, i64, u8, usize),
    #[error("miniSEED error: `{0}`")]
    Generic(String),
}

impl MSeedError {
    /// The numeric code conventionally associated with this error class.
    /// Success (0) and end-of-file (1) are non-error conditions and have no
    /// variant here.
    pub fn code(&self) -> i32 {
        match self {
            MSeedError::NotSeed(_) => -2,
            MSeedError::WrongLength(_) => -3,
            MSeedError::OutOfRange(_, _, _) => -4,
            MSeedError::UnknownFormat(_) => -5,
            MSeedError::Compression(_) => -6,
            MSeedError::CrcInvalid(_, _) => -7,
            _ => -1,
        }
    }
}

/// A specialized library `Result` type.
pub type MSResult<T> = std::result::Result<T, MSeedError>;
