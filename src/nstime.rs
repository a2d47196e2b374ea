use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::mseed_error::{MSResult, MSeedError};

/// Sentinel meaning a time could not be parsed or computed,
/// 1902-01-01T00:00:00Z in nanoseconds.
pub const NSTERROR: i64 = -2_145_916_800_000_000_000;

/// Sentinel meaning a time has intentionally not been set.
pub const NSTUNSET: i64 = NSTERROR + 1;

const NSTMODULUS: i64 = 1_000_000_000;

/// `num_days_from_ce()` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Integer epoch values of larger magnitude are taken to be nanoseconds
/// rather than seconds when parsing bare numbers.
const EPOCH_SECONDS_CEILING: i64 = 99_999_999_999;

lazy_static! {
    // YYYY[-MM-DD[Thh[:mm[:ss[.fffffffff]]]]][Z], optional trailing " (DOY)"
    static ref CALENDAR_REGEX: Regex = Regex::new(
        r"(?x)^\s*
            (\d{4})                       # year
            (?:-(\d{1,2})-(\d{1,2})       # month, day of month
              (?:[Tt\ ](\d{1,2})          # hour
                (?::(\d{1,2})             # minute
                  (?::(\d{1,2})           # second
                    (?:\.(\d{1,9}))?      # fractional seconds
            )?)?)?)?
            [Zz]?
            (?:\s*\(\d{1,3}\))?           # day-of-year parenthetical
            \s*$"
    )
    .unwrap();
    // YYYY-JJJ[Thh[:mm[:ss[.fffffffff]]]][Z], ordinal day of year
    static ref ORDINAL_REGEX: Regex = Regex::new(
        r"(?x)^\s*
            (\d{4})-(\d{1,3})
            (?:[Tt\ ](\d{1,2})
              (?::(\d{1,2})
                (?::(\d{1,2})
                  (?:\.(\d{1,9}))?
            )?)?)?
            [Zz]?\s*$"
    )
    .unwrap();
    // YYYY,JJJ[,hh[,mm[,ss[.fffffffff]]]] with ':' accepted after the hour
    static ref SEED_ORDINAL_REGEX: Regex = Regex::new(
        r"(?x)^\s*
            (\d{4}),(\d{1,3})
            (?:,(\d{1,2})
              (?:[:,](\d{1,2})
                (?:[:,](\d{1,2})
                  (?:\.(\d{1,9}))?
            )?)?)?
            [Zz]?\s*$"
    )
    .unwrap();
    static ref EPOCH_DECIMAL_REGEX: Regex =
        Regex::new(r"^\s*([-+]?)(\d+)\.(\d{1,9})\s*$").unwrap();
    static ref EPOCH_INTEGER_REGEX: Regex = Regex::new(r"^\s*([-+]?)(\d+)\s*$").unwrap();
}

/// Time formats understood by [`NsTime::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// `YYYY-MM-DDThh:mm:ss.sssssssss`
    IsoMonthDay,
    /// `YYYY-MM-DDThh:mm:ss.sssssssssZ`
    IsoMonthDayZ,
    /// `YYYY-MM-DDThh:mm:ss.sssssssss (DOY)`
    IsoMonthDayDoy,
    /// `YYYY-MM-DDThh:mm:ss.sssssssssZ (DOY)`
    IsoMonthDayDoyZ,
    /// `YYYY-MM-DD hh:mm:ss.sssssssss`
    IsoMonthDaySpace,
    /// `YYYY-MM-DD hh:mm:ss.sssssssssZ`
    IsoMonthDaySpaceZ,
    /// `YYYY,DDD,hh:mm:ss.sssssssss`
    SeedOrdinal,
    /// `ssssssssss.sssssssss`
    UnixEpoch,
    /// `nnnnnnnnnnnnnnnnnnn`
    NanosecondEpoch,
}

/// Subsecond resolution policy for [`NsTime::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubSeconds {
    /// No subseconds.
    None,
    /// Microsecond resolution.
    Micro,
    /// Nanosecond resolution.
    Nano,
    /// Microsecond resolution unless subseconds are zero.
    MicroNone,
    /// Nanosecond resolution unless subseconds are zero.
    NanoNone,
    /// Nanosecond resolution if there is sub-microsecond detail, otherwise microsecond.
    NanoMicro,
    /// As `NanoMicro`, suppressed entirely when subseconds are zero.
    NanoMicroNone,
}

/// A point in time as a count of nanoseconds since 1970-01-01T00:00:00Z.
///
/// The representable range covers roughly year 0 through mid-2262. Leap
/// seconds have no distinct representation; a leap second appears as a
/// repeat of the following second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NsTime(pub i64);

impl NsTime {
    /// The "could not parse/compute" sentinel.
    pub const ERROR: NsTime = NsTime(NSTERROR);
    /// The "not set" sentinel.
    pub const UNSET: NsTime = NsTime(NSTUNSET);

    pub fn from_nanos(ns: i64) -> NsTime {
        NsTime(ns)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    /// True unless this is one of the two sentinels.
    pub fn is_set(&self) -> bool {
        self.0 != NSTERROR && self.0 != NSTUNSET
    }

    pub fn is_error(&self) -> bool {
        self.0 == NSTERROR
    }

    pub fn is_unset(&self) -> bool {
        self.0 == NSTUNSET
    }

    /// Builds a time from broken-out fields. `second` may be 60 to express
    /// a leap second, which lands on the first second of the next minute.
    pub fn from_parts(
        year: i32,
        day_of_year: u32,
        hour: u32,
        minute: u32,
        second: u32,
        nanosecond: u32,
    ) -> MSResult<NsTime> {
        let date = NaiveDate::from_yo_opt(year, day_of_year).ok_or_else(|| {
            MSeedError::TimeParse(format!("invalid year/day {}/{}", year, day_of_year))
        })?;
        if hour > 23 || minute > 59 || second > 60 {
            return Err(MSeedError::TimeParse(format!(
                "invalid time of day {}:{}:{}",
                hour, minute, second
            )));
        }
        let days = date.num_days_from_ce() as i64 - EPOCH_DAYS_FROM_CE;
        let secs = days * 86_400 + hour as i64 * 3_600 + minute as i64 * 60 + second as i64;
        Ok(NsTime(secs * NSTMODULUS + nanosecond as i64))
    }

    pub fn from_utc(dt: DateTime<Utc>) -> NsTime {
        // chrono expresses a leap second as nanosecond >= 1_000_000_000,
        // which folds naturally into the scalar
        NsTime(dt.timestamp() * NSTMODULUS + dt.timestamp_subsec_nanos() as i64)
    }

    pub fn to_utc(&self) -> MSResult<DateTime<Utc>> {
        let (secs, frac) = self.split();
        Utc.timestamp_opt(secs, frac)
            .single()
            .ok_or_else(|| MSeedError::TimeParse(format!("out of range epoch {}", self.0)))
    }

    /// Seconds (floored) and positive subsecond nanoseconds.
    fn split(&self) -> (i64, u32) {
        (
            self.0.div_euclid(NSTMODULUS),
            self.0.rem_euclid(NSTMODULUS) as u32,
        )
    }

    /// Parses one of the textual time forms:
    /// `YYYY[-MM-DD[Thh[:mm[:ss[.f]]]]][Z]`, the ordinal-day variant
    /// `YYYY[-JJJ[...]]`, the SEED comma form `YYYY,JJJ[,hh[,mm[,ss[.f]]]]`,
    /// a decimal Unix epoch (possibly negative), or a bare integer epoch
    /// (nanoseconds when the magnitude rules out seconds).
    /// Years 1000 through 4999 are accepted for the date forms.
    pub fn parse(s: &str) -> MSResult<NsTime> {
        if let Some(cap) = CALENDAR_REGEX.captures(s) {
            let year: i32 = cap[1].parse().unwrap();
            let month: u32 = cap.get(2).map_or(1, |m| m.as_str().parse().unwrap());
            let day: u32 = cap.get(3).map_or(1, |m| m.as_str().parse().unwrap());
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| MSeedError::TimeParse(s.to_string()))?;
            return NsTime::assemble(
                s,
                year,
                date.ordinal(),
                cap.get(4),
                cap.get(5),
                cap.get(6),
                cap.get(7),
            );
        }
        if let Some(cap) = ORDINAL_REGEX.captures(s) {
            let year: i32 = cap[1].parse().unwrap();
            let doy: u32 = cap[2].parse().unwrap();
            return NsTime::assemble(s, year, doy, cap.get(3), cap.get(4), cap.get(5), cap.get(6));
        }
        if let Some(cap) = SEED_ORDINAL_REGEX.captures(s) {
            let year: i32 = cap[1].parse().unwrap();
            let doy: u32 = cap[2].parse().unwrap();
            return NsTime::assemble(s, year, doy, cap.get(3), cap.get(4), cap.get(5), cap.get(6));
        }
        if let Some(cap) = EPOCH_DECIMAL_REGEX.captures(s) {
            let negative = &cap[1] == "-";
            let secs: i64 = cap[2]
                .parse()
                .map_err(|_| MSeedError::TimeParse(s.to_string()))?;
            let ns = fraction_nanos(&cap[3]);
            let total = secs
                .checked_mul(NSTMODULUS)
                .and_then(|v| v.checked_add(ns))
                .ok_or_else(|| MSeedError::TimeParse(s.to_string()))?;
            return Ok(NsTime(if negative { -total } else { total }));
        }
        if let Some(cap) = EPOCH_INTEGER_REGEX.captures(s) {
            let negative = &cap[1] == "-";
            let value: i64 = cap[2]
                .parse()
                .map_err(|_| MSeedError::TimeParse(s.to_string()))?;
            let value = if negative { -value } else { value };
            if value.abs() > EPOCH_SECONDS_CEILING {
                return Ok(NsTime(value));
            }
            return value
                .checked_mul(NSTMODULUS)
                .map(NsTime)
                .ok_or_else(|| MSeedError::TimeParse(s.to_string()));
        }
        Err(MSeedError::TimeParse(s.to_string()))
    }

    fn assemble(
        s: &str,
        year: i32,
        doy: u32,
        hour: Option<regex::Match>,
        minute: Option<regex::Match>,
        second: Option<regex::Match>,
        frac: Option<regex::Match>,
    ) -> MSResult<NsTime> {
        if !(1000..=4999).contains(&year) {
            return Err(MSeedError::TimeParse(s.to_string()));
        }
        let hour: u32 = hour.map_or(0, |m| m.as_str().parse().unwrap());
        let minute: u32 = minute.map_or(0, |m| m.as_str().parse().unwrap());
        let second: u32 = second.map_or(0, |m| m.as_str().parse().unwrap());
        let ns = frac.map_or(0, |m| fraction_nanos(m.as_str()) as u32);
        NsTime::from_parts(year, doy, hour, minute, second, ns)
            .map_err(|_| MSeedError::TimeParse(s.to_string()))
    }

    /// Formats this time in the requested form and subsecond resolution.
    pub fn format(&self, fmt: TimeFormat, subseconds: SubSeconds) -> MSResult<String> {
        let (secs, frac) = self.split();
        let sub = subsecond_string(frac, subseconds);
        match fmt {
            TimeFormat::UnixEpoch => {
                let a = self.0.unsigned_abs();
                let (s, f) = (a / NSTMODULUS as u64, (a % NSTMODULUS as u64) as u32);
                let sign = if self.0 < 0 { "-" } else { "" };
                Ok(format!("{}{}{}", sign, s, subsecond_string(f, subseconds)))
            }
            TimeFormat::NanosecondEpoch => Ok(format!("{}", self.0)),
            _ => {
                let dt = Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| MSeedError::TimeParse(format!("out of range epoch {}", self.0)))?;
                let hms = format!(
                    "{:02}:{:02}:{:02}{}",
                    dt.hour(),
                    dt.minute(),
                    dt.second(),
                    sub
                );
                match fmt {
                    TimeFormat::SeedOrdinal => Ok(format!(
                        "{:04},{:03},{}",
                        dt.year(),
                        dt.ordinal(),
                        hms
                    )),
                    _ => {
                        let date = format!("{:04}-{:02}-{:02}", dt.year(), dt.month(), dt.day());
                        let sep = match fmt {
                            TimeFormat::IsoMonthDaySpace | TimeFormat::IsoMonthDaySpaceZ => ' ',
                            _ => 'T',
                        };
                        let zone = match fmt {
                            TimeFormat::IsoMonthDayZ
                            | TimeFormat::IsoMonthDayDoyZ
                            | TimeFormat::IsoMonthDaySpaceZ => "Z",
                            _ => "",
                        };
                        let doy = match fmt {
                            TimeFormat::IsoMonthDayDoy | TimeFormat::IsoMonthDayDoyZ => {
                                format!(" ({:03})", dt.ordinal())
                            }
                            _ => String::new(),
                        };
                        Ok(format!("{}{}{}{}{}", date, sep, hms, zone, doy))
                    }
                }
            }
        }
    }

    /// The time of the sample `offset` places after this one, given a
    /// sample rate in samples/second (negative values are seconds/sample),
    /// rounded to the nearest nanosecond.
    pub fn sample_time(&self, offset: i64, sample_rate: f64) -> NsTime {
        if !self.is_set() || sample_rate == 0.0 {
            return *self;
        }
        let period_ns = if sample_rate > 0.0 {
            NSTMODULUS as f64 / sample_rate
        } else {
            -sample_rate * NSTMODULUS as f64
        };
        NsTime(self.0 + (offset as f64 * period_ns).round() as i64)
    }
}

impl fmt::Display for NsTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_unset() {
            return write!(f, "(unset)");
        }
        match self.format(TimeFormat::IsoMonthDayZ, SubSeconds::NanoMicroNone) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "(invalid: {})", self.0),
        }
    }
}

impl Serialize for NsTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.format(TimeFormat::IsoMonthDayZ, SubSeconds::NanoMicroNone) {
            Ok(s) => serializer.serialize_str(&s),
            Err(_) => Err(serde::ser::Error::custom("unrepresentable time")),
        }
    }
}

struct NsTimeVisitor;

impl<'de> Visitor<'de> for NsTimeVisitor {
    type Value = NsTime;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a time string")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        NsTime::parse(value).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for NsTime {
    fn deserialize<D>(deserializer: D) -> Result<NsTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(NsTimeVisitor)
    }
}

/// Nanoseconds from a fractional-second digit string, e.g. `"98"` -> 980000000.
fn fraction_nanos(digits: &str) -> i64 {
    let mut ns: i64 = 0;
    for (i, c) in digits.chars().take(9).enumerate() {
        ns += (c as i64 - '0' as i64) * 10_i64.pow(8 - i as u32);
    }
    ns
}

fn subsecond_string(frac: u32, policy: SubSeconds) -> String {
    let micro = || format!(".{:06}", frac / 1_000);
    let nano = || format!(".{:09}", frac);
    match policy {
        SubSeconds::None => String::new(),
        SubSeconds::Micro => micro(),
        SubSeconds::Nano => nano(),
        SubSeconds::MicroNone => {
            if frac == 0 {
                String::new()
            } else {
                micro()
            }
        }
        SubSeconds::NanoNone => {
            if frac == 0 {
                String::new()
            } else {
                nano()
            }
        }
        SubSeconds::NanoMicro => {
            if frac % 1_000 != 0 {
                nano()
            } else {
                micro()
            }
        }
        SubSeconds::NanoMicroNone => {
            if frac % 1_000 != 0 {
                nano()
            } else if frac != 0 {
                micro()
            } else {
                String::new()
            }
        }
    }
}

/// A table of leap-second instants used to correct derived span end times.
///
/// Loading the published list is left to the caller; the table is built
/// from the leap-second occurrence times themselves.
#[derive(Debug, Clone, Default)]
pub struct LeapSecondList {
    instants: Vec<NsTime>,
}

impl LeapSecondList {
    pub fn from_instants(mut instants: Vec<NsTime>) -> LeapSecondList {
        instants.sort();
        LeapSecondList { instants }
    }

    /// The number of leap seconds falling within `[start, end)`.
    pub fn count_in(&self, start: NsTime, end: NsTime) -> u32 {
        self.instants
            .iter()
            .filter(|t| **t >= start && **t < end)
            .count() as u32
    }
}
