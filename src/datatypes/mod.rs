mod address;
mod data_coding;
mod first_octet;
pub mod gsm7;
mod numeric_plan_indicator;
mod timestamp;
mod type_of_number;
mod user_data;

pub use address::{PhoneNumber, TypeOfAddress};
pub use data_coding::{Alphabet, DataCoding, MessageClass};
pub use first_octet::{FirstOctet, MessageType, ValidityPeriodFormat};
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use timestamp::ServiceCentreTimestamp;
pub use type_of_number::TypeOfNumber;
pub use user_data::{
    decode_ucs2, encode_ucs2, Concatenation, UserData, UserDataHeader, MAX_MESSAGE_CHARS,
    MAX_USER_DATA_SEPTETS,
};
