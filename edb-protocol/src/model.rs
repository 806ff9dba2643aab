//! Scalar domain newtypes with exact wire byte layouts.
//!
//! Each type exposes a raw `decode(buf: &[u8])` / `Encode`+`Decode` pair over
//! the shared [`crate::buffer`] cursors.

use std::convert::TryFrom;
use std::fmt;

use bytes::{Buf, BufMut};

pub use uuid::Uuid;

use snafu::IntoError;

use crate::buffer::{Decode, Encode, Input, Output};
use crate::errors::{self, DecodeError, EncodeError};

/// `datetime`: signed microseconds since `2000-01-01T00:00:00Z` (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Datetime {
    micros: i64,
}

impl Datetime {
    pub fn from_micros(micros: i64) -> Datetime {
        Datetime { micros }
    }

    pub fn to_micros(self) -> i64 {
        self.micros
    }

    pub fn decode(buf: &[u8]) -> Result<Datetime, DecodeError> {
        if buf.len() != 8 {
            return errors::Underflow.fail();
        }
        Ok(Datetime {
            micros: (&buf[..]).get_i64(),
        })
    }
}

impl Decode for Datetime {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(Datetime {
            micros: buf.pop_i64()?,
        })
    }
}

impl Encode for Datetime {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_i64(self.micros);
        Ok(())
    }
}

/// `local_datetime`: microseconds since `2000-01-01T00:00:00` local (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDatetime {
    micros: i64,
}

impl LocalDatetime {
    pub fn from_micros(micros: i64) -> LocalDatetime {
        LocalDatetime { micros }
    }
    pub fn to_micros(self) -> i64 {
        self.micros
    }
    pub fn decode(buf: &[u8]) -> Result<LocalDatetime, DecodeError> {
        if buf.len() != 8 {
            return errors::Underflow.fail();
        }
        Ok(LocalDatetime {
            micros: (&buf[..]).get_i64(),
        })
    }
}

impl Decode for LocalDatetime {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(LocalDatetime {
            micros: buf.pop_i64()?,
        })
    }
}

impl Encode for LocalDatetime {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_i64(self.micros);
        Ok(())
    }
}

/// `local_date`: days since `2000-01-01` (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDate {
    days: i32,
}

impl LocalDate {
    pub fn from_days(days: i32) -> LocalDate {
        LocalDate { days }
    }
    pub fn to_days(self) -> i32 {
        self.days
    }
    pub fn decode(buf: &[u8]) -> Result<LocalDate, DecodeError> {
        if buf.len() != 4 {
            return errors::Underflow.fail();
        }
        Ok(LocalDate {
            days: (&buf[..]).get_i32(),
        })
    }
}

impl Decode for LocalDate {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(LocalDate {
            days: buf.pop_i32()?,
        })
    }
}

impl Encode for LocalDate {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_i32(self.days);
        Ok(())
    }
}

/// `local_time`: microseconds since midnight (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime {
    micros: u64,
}

impl LocalTime {
    pub fn from_micros(micros: u64) -> LocalTime {
        LocalTime { micros }
    }
    pub fn to_micros(self) -> u64 {
        self.micros
    }
    pub fn decode(buf: &[u8]) -> Result<LocalTime, DecodeError> {
        if buf.len() != 8 {
            return errors::Underflow.fail();
        }
        Ok(LocalTime {
            micros: (&buf[..]).get_u64(),
        })
    }
}

impl Decode for LocalTime {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(LocalTime {
            micros: buf.pop_u64()?,
        })
    }
}

impl Encode for LocalTime {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_u64(self.micros);
        Ok(())
    }
}

/// Shared 16-byte `{micros:i64, days:i32, months:i32}` wire layout for
/// `duration`, `relative_duration` and `date_duration`. Each wrapper
/// enforces which fields must stay zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RawDuration {
    micros: i64,
    days: i32,
    months: i32,
}

impl RawDuration {
    fn decode(buf: &[u8]) -> Result<RawDuration, DecodeError> {
        if buf.len() != 16 {
            return errors::Underflow.fail();
        }
        let mut cur = &buf[..];
        let micros = cur.get_i64();
        let days = cur.get_i32();
        let months = cur.get_i32();
        Ok(RawDuration {
            micros,
            days,
            months,
        })
    }

    fn encode(&self, buf: &mut Output) {
        buf.put_i64(self.micros);
        buf.put_i32(self.days);
        buf.put_i32(self.months);
    }
}

/// `duration`: plain microsecond duration. `days`/`months` are always zero
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    micros: i64,
}

impl Duration {
    pub fn from_micros(micros: i64) -> Duration {
        Duration { micros }
    }
    pub fn to_micros(self) -> i64 {
        self.micros
    }
    pub fn decode(buf: &[u8]) -> Result<Duration, DecodeError> {
        let raw = RawDuration::decode(buf)?;
        if raw.days != 0 || raw.months != 0 {
            return errors::InvalidDate.fail();
        }
        Ok(Duration { micros: raw.micros })
    }
}

impl Decode for Duration {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Duration::decode(&buf.pop_slice(16)?)
    }
}

impl Encode for Duration {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        RawDuration {
            micros: self.micros,
            days: 0,
            months: 0,
        }
        .encode(buf);
        Ok(())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.micros)
    }
}

/// `cal::relative_duration`: the full 16-byte layout, `days`/`months` allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeDuration {
    pub micros: i64,
    pub days: i32,
    pub months: i32,
}

impl RelativeDuration {
    pub fn decode(buf: &[u8]) -> Result<RelativeDuration, DecodeError> {
        let raw = RawDuration::decode(buf)?;
        Ok(RelativeDuration {
            micros: raw.micros,
            days: raw.days,
            months: raw.months,
        })
    }
}

impl Decode for RelativeDuration {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        RelativeDuration::decode(&buf.pop_slice(16)?)
    }
}

impl Encode for RelativeDuration {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        RawDuration {
            micros: self.micros,
            days: self.days,
            months: self.months,
        }
        .encode(buf);
        Ok(())
    }
}

/// `cal::date_duration`: 16-byte layout, `micros` must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateDuration {
    pub days: i32,
    pub months: i32,
}

impl DateDuration {
    pub fn decode(buf: &[u8]) -> Result<DateDuration, DecodeError> {
        let raw = RawDuration::decode(buf)?;
        if raw.micros != 0 {
            return errors::InvalidDate.fail();
        }
        Ok(DateDuration {
            days: raw.days,
            months: raw.months,
        })
    }
}

impl Decode for DateDuration {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        DateDuration::decode(&buf.pop_slice(16)?)
    }
}

impl Encode for DateDuration {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        RawDuration {
            micros: 0,
            days: self.days,
            months: self.months,
        }
        .encode(buf);
        Ok(())
    }
}

/// `cfg::memory`: signed byte count (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigMemory(pub i64);

impl Decode for ConfigMemory {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(ConfigMemory(buf.pop_i64()?))
    }
}

impl Encode for ConfigMemory {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_i64(self.0);
        Ok(())
    }
}

/// Sign nibble for [`BigInt`]/[`Decimal`].
const DECIMAL_POS: u16 = 0x0000;
const DECIMAL_NEG: u16 = 0x4000;

/// Shared `{ndigits, weight, sign, dscale, digits[ndigits]}` decoding for
/// `bigint`/`decimal`.
fn decode_decimal_digits(buf: &mut Input) -> Result<(i16, bool, u16, Vec<u16>), DecodeError> {
    let ndigits = buf.pop_u16()?;
    let weight = buf.pop_i16()?;
    let sign = buf.pop_u16()?;
    let negative = match sign {
        DECIMAL_POS => false,
        DECIMAL_NEG => true,
        _ => return errors::BadSign.fail(),
    };
    let dscale = buf.pop_u16()?;
    let mut digits = Vec::with_capacity(ndigits as usize);
    for _ in 0..ndigits {
        digits.push(buf.pop_u16()?);
    }
    Ok((weight, negative, dscale, digits))
}

/// `std::bigint`. Stored as its base-10000 digit string, matching the
/// teacher's approach of not depending on a bignum crate for the default
/// build (see `with-num-bigint` feature for a richer integration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigInt {
    pub negative: bool,
    pub weight: i16,
    pub digits: Vec<u16>,
}

impl Decode for BigInt {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let (weight, negative, dscale, digits) = decode_decimal_digits(buf)?;
        if dscale != 0 {
            return errors::BadSign.fail();
        }
        Ok(BigInt {
            negative,
            weight,
            digits,
        })
    }
}

impl Encode for BigInt {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        let ndigits =
            u16::try_from(self.digits.len()).map_err(|_| errors::BigIntTooLong.build())?;
        buf.put_u16(ndigits);
        buf.put_i16(self.weight);
        buf.put_u16(if self.negative { DECIMAL_NEG } else { DECIMAL_POS });
        buf.put_u16(0); // dscale
        for d in &self.digits {
            buf.put_u16(*d);
        }
        Ok(())
    }
}

/// `std::decimal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    pub negative: bool,
    pub weight: i16,
    pub dscale: u16,
    pub digits: Vec<u16>,
}

impl Decode for Decimal {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let (weight, negative, dscale, digits) = decode_decimal_digits(buf)?;
        Ok(Decimal {
            negative,
            weight,
            dscale,
            digits,
        })
    }
}

impl Encode for Decimal {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        let ndigits =
            u16::try_from(self.digits.len()).map_err(|_| errors::DecimalTooLong.build())?;
        buf.put_u16(ndigits);
        buf.put_i16(self.weight);
        buf.put_u16(if self.negative { DECIMAL_NEG } else { DECIMAL_POS });
        buf.put_u16(self.dscale);
        for d in &self.digits {
            buf.put_u16(*d);
        }
        Ok(())
    }
}

/// `std::json`: one version byte (`0x01`) followed by UTF-8 text.
pub const JSON_VERSION: u8 = 1;

pub fn decode_json(buf: &mut Input) -> Result<String, DecodeError> {
    let version = buf.pop_u8()?;
    if version != JSON_VERSION {
        return errors::InvalidJsonFormat.fail();
    }
    let rest = buf.take_rest();
    String::from_utf8(rest.to_vec()).map_err(|e| errors::InvalidUtf8.into_error(e.utf8_error()))
}

pub fn encode_json(buf: &mut Output, text: &str) -> Result<(), EncodeError> {
    buf.put_u8(JSON_VERSION);
    buf.extend(text.as_bytes());
    Ok(())
}

#[cfg(feature = "with-chrono")]
mod chrono_conv {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    fn postgres_epoch_naive() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    impl From<Datetime> for DateTime<Utc> {
        fn from(d: Datetime) -> DateTime<Utc> {
            let naive = postgres_epoch_naive() + ChronoDuration::microseconds(d.micros);
            naive.and_utc()
        }
    }

    impl From<LocalDatetime> for NaiveDateTime {
        fn from(d: LocalDatetime) -> NaiveDateTime {
            postgres_epoch_naive() + ChronoDuration::microseconds(d.micros)
        }
    }

    impl From<LocalDate> for NaiveDate {
        fn from(d: LocalDate) -> NaiveDate {
            postgres_epoch_naive().date() + ChronoDuration::days(d.days as i64)
        }
    }

    impl From<LocalTime> for NaiveTime {
        fn from(d: LocalTime) -> NaiveTime {
            NaiveTime::from_hms_opt(0, 0, 0).unwrap()
                + ChronoDuration::microseconds(d.micros as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ProtocolVersion;
    use bytes::Bytes;

    fn roundtrip_duration(micros: i64) {
        let proto = ProtocolVersion::current();
        let mut out = Output::new(proto);
        Duration::from_micros(micros).encode(&mut out).unwrap();
        let bytes = out.send();
        assert_eq!(bytes.len(), 16);
        let mut inp = Input::new(proto, bytes);
        let d = Duration::decode(&mut inp).unwrap();
        assert_eq!(d.to_micros(), micros);
    }

    #[test]
    fn duration_roundtrip() {
        roundtrip_duration(0);
        roundtrip_duration(-1);
        // 48h45m7.6s encodes to exactly these 16 bytes.
        roundtrip_duration(48 * 3600 * 1_000_000 + 45 * 60 * 1_000_000 + 7_600_000);
    }

    #[test]
    fn duration_layout_scenario() {
        // Same duration as `duration_roundtrip`'s 48h45m7.6s case.
        let proto = ProtocolVersion::current();
        let mut out = Output::new(proto);
        let micros = 48 * 3600 * 1_000_000i64 + 45 * 60 * 1_000_000 + 7_600_000;
        Duration::from_micros(micros).encode(&mut out).unwrap();
        let bytes = out.send();
        let expected: &[u8] = &[
            0x00, 0x00, 0x00, 0x28, 0xDD, 0x11, 0x72, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ];
        assert_eq!(&bytes[..], expected);
    }

    #[test]
    fn rejects_nonzero_days_in_plain_duration() {
        let buf: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];
        assert!(Duration::decode(&buf).is_err());
    }

    #[test]
    fn config_memory_roundtrip() {
        let proto = ProtocolVersion::current();
        let mut out = Output::new(proto);
        ConfigMemory(123_456).encode(&mut out).unwrap();
        let bytes = out.send();
        let mut inp = Input::new(proto, bytes);
        assert_eq!(ConfigMemory::decode(&mut inp).unwrap(), ConfigMemory(123_456));
    }
}
