use lazy_static::lazy_static;
use regex::Regex;
use std::convert::TryFrom;
use std::fmt;

use crate::mseed_error::{MSResult, MSeedError};

pub const PREFIX: &str = "FDSN:";

/// Number of underscore separators in a rendered identifier.
const SEPARATORS: usize = 5;

/// Maximum length in bytes of a source identifier within a record.
pub const MAX_SID_LENGTH: usize = 64;

lazy_static! {
    // The six codes of an FDSN URN, separated by exactly five
    // underscores. Station and location admit dashes; band and subsource
    // may be empty, the other codes may not.
    static ref SID_REGEX: Regex = Regex::new(
        r"(?x)^
            FDSN:
            (?P<net>[A-Z0-9]{1,8})_
            (?P<sta>[-A-Z0-9]{1,8})_
            (?P<loc>[-A-Z0-9]{0,8})_
            (?P<band>[A-Z0-9]*)_
            (?P<source>[A-Z0-9]+)_
            (?P<subsource>[A-Z0-9]*)$
"
    )
    .unwrap();
}

/// An FDSN source identifier parsed into its component parts.
/// See the specification at <http://docs.fdsn.org/projects/source-identifiers/en/v1.0/index.html>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub band: String,
    pub source: String,
    pub subsource: String,
}

/// The four legacy codes plus the joined three-character channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nslc {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl SourceId {
    /// Length of the identifier when rendered back into a string: the
    /// scheme prefix, the six codes, and the underscores between them.
    pub fn calc_len(&self) -> usize {
        PREFIX.len()
            + SEPARATORS
            + self.network.len()
            + self.station.len()
            + self.location.len()
            + self.band.len()
            + self.source.len()
            + self.subsource.len()
    }

    pub fn parse(id: &str) -> MSResult<SourceId> {
        if id.len() > MAX_SID_LENGTH {
            return Err(MSeedError::SourceIdentifier(
                id.to_string(),
                String::from("length"),
            ));
        }
        // every group participates whenever the anchored pattern matches
        match SID_REGEX.captures(id) {
            Some(cap) => Ok(SourceId {
                network: cap["net"].to_string(),
                station: cap["sta"].to_string(),
                location: cap["loc"].to_string(),
                band: cap["band"].to_string(),
                source: cap["source"].to_string(),
                subsource: cap["subsource"].to_string(),
            }),
            None => Err(MSeedError::SourceIdentifier(
                id.to_string(),
                String::from("format"),
            )),
        }
    }

    /// Maps to the legacy network, station, location and channel codes.
    /// Single-character band/source/subsource codes join into the classic
    /// three-character channel; anything longer keeps its underscores.
    pub fn to_nslc(&self) -> Nslc {
        let channel = if self.band.len() <= 1 && self.source.len() == 1 && self.subsource.len() <= 1
        {
            format!("{}{}{}", self.band, self.source, self.subsource)
        } else {
            format!("{}_{}_{}", self.band, self.source, self.subsource)
        };
        Nslc {
            network: self.network.clone(),
            station: self.station.clone(),
            location: self.location.clone(),
            channel,
        }
    }

    /// Builds an identifier from legacy codes. A three-character channel is
    /// split into band, source and subsource; a channel already carrying
    /// underscores passes through. ASCII spaces are trimmed from all codes.
    pub fn from_nslc(network: &str, station: &str, location: &str, channel: &str) -> MSResult<SourceId> {
        let network = network.trim_matches(' ');
        let station = station.trim_matches(' ');
        let location = location.trim_matches(' ');
        let channel = channel.trim_matches(' ');
        let (band, source, subsource) = if channel.contains('_') {
            let mut parts = channel.splitn(3, '_');
            let band = parts.next().unwrap_or("");
            let source = parts.next().unwrap_or("");
            let subsource = parts.next().unwrap_or("");
            (band.to_string(), source.to_string(), subsource.to_string())
        } else if channel.len() == 3 {
            let mut chars = channel.chars();
            (
                chars.next().unwrap().to_string(),
                chars.next().unwrap().to_string(),
                chars.next().unwrap().to_string(),
            )
        } else if channel.is_empty() {
            (String::new(), String::new(), String::new())
        } else {
            return Err(MSeedError::SourceIdentifier(
                channel.to_string(),
                String::from("channel"),
            ));
        };
        let sid = SourceId {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            band,
            source,
            subsource,
        };
        if sid.calc_len() > MAX_SID_LENGTH {
            return Err(MSeedError::SourceIdentifier(
                sid.to_string(),
                String::from("length"),
            ));
        }
        Ok(sid)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}_{}_{}_{}_{}_{}",
            PREFIX, self.network, self.station, self.location, self.band, self.source, self.subsource
        )
    }
}

impl TryFrom<&str> for SourceId {
    type Error = MSeedError;

    fn try_from(s: &str) -> MSResult<SourceId> {
        SourceId::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_components() -> MSResult<()> {
        let id = "FDSN:NZ_WEL_10_B_H_Z";
        let sid = SourceId::parse(id)?;
        assert_eq!("NZ", sid.network);
        assert_eq!("WEL", sid.station);
        assert_eq!("10", sid.location);
        assert_eq!("B", sid.band);
        assert_eq!("H", sid.source);
        assert_eq!("Z", sid.subsource);
        assert_eq!(id, sid.to_string());
        Ok(())
    }

    #[test]
    fn rendered_length_matches_calc() -> MSResult<()> {
        for id in ["FDSN:NZ_WEL_10_B_H_Z", "FDSN:XX_TEST__L_H_Z", "FDSN:XX_STA_00_GP_LS_A"] {
            let sid = SourceId::parse(id)?;
            assert_eq!(id.len(), sid.calc_len(), "{}", id);
            assert_eq!(sid.to_string().len(), sid.calc_len());
        }
        Ok(())
    }

    #[test]
    fn sid_to_nslc() -> MSResult<()> {
        let sid = SourceId::parse("FDSN:XX_TEST__L_H_Z")?;
        let nslc = sid.to_nslc();
        assert_eq!(nslc.network, "XX");
        assert_eq!(nslc.station, "TEST");
        assert_eq!(nslc.location, "");
        assert_eq!(nslc.channel, "LHZ");
        Ok(())
    }

    #[test]
    fn nslc_round_trip() -> MSResult<()> {
        let sid = SourceId::from_nslc("XX", "TEST", "", "LHZ")?;
        assert_eq!(sid.to_string(), "FDSN:XX_TEST__L_H_Z");
        assert_eq!(sid.to_string().len(), 19);
        let back = sid.to_nslc();
        assert_eq!(back.channel, "LHZ");
        assert_eq!(SourceId::from_nslc("XX", "TEST", "", "LHZ")?, sid);
        Ok(())
    }

    #[test]
    fn nslc_spaces_collapse() -> MSResult<()> {
        let sid = SourceId::from_nslc("XX", "STA ", "  ", "BHZ")?;
        assert_eq!(sid.to_string(), "FDSN:XX_STA__B_H_Z");
        Ok(())
    }

    #[test]
    fn extended_channel_passthrough() -> MSResult<()> {
        let sid = SourceId::from_nslc("XX", "STA", "00", "GP_LS_A")?;
        assert_eq!(sid.band, "GP");
        assert_eq!(sid.source, "LS");
        assert_eq!(sid.subsource, "A");
        assert_eq!(sid.to_nslc().channel, "GP_LS_A");
        Ok(())
    }

    #[test]
    fn malformed_rejected() {
        assert!(SourceId::parse("XX_TEST__L_H_Z").is_err());
        assert!(SourceId::parse("FDSN:XX_TEST").is_err());
        assert!(SourceId::parse("FDSN:XX_TEST_00_B_H").is_err());
        assert!(SourceId::parse("FDSN:").is_err());
        let oversize = format!("FDSN:{}_STA__B_H_Z", "N".repeat(64));
        assert!(SourceId::parse(&oversize).is_err());
    }
}
