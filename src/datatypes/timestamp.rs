// ABOUTME: Strongly-typed TP-SCTS service-centre timestamp with semi-octet validation
// ABOUTME: Seven swapped-BCD octets, the last holding a signed offset in quarter hours

use crate::codec::{get_octet, swapped_bcd, CodecError, Decodable};
use std::fmt;
use std::io::Cursor;

/// Service-centre time stamp of an SMS-DELIVER.
///
/// The year is the two digits carried on the wire. `tz_quarters` is the
/// offset from UTC in quarter hours, negative west of Greenwich.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ServiceCentreTimestamp {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub tz_quarters: i8,
}

impl ServiceCentreTimestamp {
    /// UTC offset in minutes
    pub fn utc_offset_minutes(&self) -> i32 {
        i32::from(self.tz_quarters) * 15
    }
}

impl Decodable for ServiceCentreTimestamp {
    fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let year = swapped_bcd(get_octet(buf, "scts_year")?, "scts_year")?;
        let month = in_range(
            swapped_bcd(get_octet(buf, "scts_month")?, "scts_month")?,
            "scts_month",
            1,
            12,
        )?;
        let day = in_range(
            swapped_bcd(get_octet(buf, "scts_day")?, "scts_day")?,
            "scts_day",
            1,
            31,
        )?;
        let hour = in_range(
            swapped_bcd(get_octet(buf, "scts_hour")?, "scts_hour")?,
            "scts_hour",
            0,
            23,
        )?;
        let minute = in_range(
            swapped_bcd(get_octet(buf, "scts_minute")?, "scts_minute")?,
            "scts_minute",
            0,
            59,
        )?;
        let second = in_range(
            swapped_bcd(get_octet(buf, "scts_second")?, "scts_second")?,
            "scts_second",
            0,
            59,
        )?;

        // Bit 3 is the sign; the remaining bits are the swapped two-digit magnitude
        let raw = get_octet(buf, "scts_timezone")?;
        let negative = raw & 0x08 != 0;
        let magnitude = swapped_bcd(raw & !0x08, "scts_timezone")?;
        let magnitude = in_range(magnitude, "scts_timezone", 0, 79)? as i8;
        let tz_quarters = if negative { -magnitude } else { magnitude };

        Ok(ServiceCentreTimestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
            tz_quarters,
        })
    }
}

fn in_range(value: u8, field: &'static str, min: u8, max: u8) -> Result<u8, CodecError> {
    if value < min || value > max {
        return Err(CodecError::FieldValidation {
            field,
            reason: format!("{value} outside {min}..={max}"),
        });
    }
    Ok(value)
}

// Same layout the modem uses in +CMGL/+CMGR text headers: yy/MM/dd,hh:mm:ss±zz
impl fmt::Display for ServiceCentreTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tz_quarters < 0 { '-' } else { '+' };
        write!(
            f,
            "{:02}/{:02}/{:02},{:02}:{:02}:{:02}{}{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            sign,
            self.tz_quarters.unsigned_abs()
        )
    }
}
