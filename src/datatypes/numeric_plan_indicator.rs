// ABOUTME: Numbering-plan-identification field of a GSM 03.40 address (bits 3-0 of the type-of-address octet)
// ABOUTME: Values the network may send but that are not listed here decode as Unknown

use num_enum::FromPrimitive;

#[derive(FromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumericPlanIndicator {
    #[num_enum(default)]
    Unknown = 0b0000,
    Isdn = 0b0001,
    Data = 0b0011,
    Telex = 0b0100,
    ServiceCentreSpecific = 0b0101,
    ServiceCentreSpecificAlt = 0b0110,
    National = 0b1000,
    Private = 0b1001,
    Ermes = 0b1010,
    Reserved = 0b1111,
}
