/*!

An enum for the states, the District of Columbia, and the inhabited territories as represented
by their FIPS state codes. Codes that are reserved or refer to uninhabited areas are not
representable; `USState::decode` rejects them.

*/

use crate::StateCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum USState {
    AL = 1,
    AK = 2,
    AZ = 4,
    AR = 5,
    CA = 6,
    CO = 8,
    CT = 9,
    DE = 10,
    DC = 11, // District of Columbia
    FL = 12,
    GA = 13,
    HI = 15,
    ID = 16,
    IL = 17,
    IN = 18,
    IA = 19,
    KS = 20,
    KY = 21,
    LA = 22,
    ME = 23,
    MD = 24,
    MA = 25,
    MI = 26,
    MN = 27,
    MS = 28,
    MO = 29,
    MT = 30,
    NE = 31,
    NV = 32,
    NH = 33,
    NJ = 34,
    NM = 35,
    NY = 36,
    NC = 37,
    ND = 38,
    OH = 39,
    OK = 40,
    OR = 41,
    PA = 42,
    RI = 44,
    SC = 45,
    SD = 46,
    TN = 47,
    TX = 48,
    UT = 49,
    VT = 50,
    VA = 51,
    WA = 53,
    WV = 54,
    WI = 55,
    WY = 56,
    AS = 60,
    GU = 66,
    MP = 69,
    PR = 72,
    VI = 78,
}

impl USState {
    /// Every representable region in ascending code order.
    pub const ALL: [USState; 56] = [
        USState::AL,
        USState::AK,
        USState::AZ,
        USState::AR,
        USState::CA,
        USState::CO,
        USState::CT,
        USState::DE,
        USState::DC,
        USState::FL,
        USState::GA,
        USState::HI,
        USState::ID,
        USState::IL,
        USState::IN,
        USState::IA,
        USState::KS,
        USState::KY,
        USState::LA,
        USState::ME,
        USState::MD,
        USState::MA,
        USState::MI,
        USState::MN,
        USState::MS,
        USState::MO,
        USState::MT,
        USState::NE,
        USState::NV,
        USState::NH,
        USState::NJ,
        USState::NM,
        USState::NY,
        USState::NC,
        USState::ND,
        USState::OH,
        USState::OK,
        USState::OR,
        USState::PA,
        USState::RI,
        USState::SC,
        USState::SD,
        USState::TN,
        USState::TX,
        USState::UT,
        USState::VT,
        USState::VA,
        USState::WA,
        USState::WV,
        USState::WI,
        USState::WY,
        USState::AS,
        USState::GU,
        USState::MP,
        USState::PR,
        USState::VI,
    ];

    /// Returns the numeric FIPS code for this state.
    pub fn encode(&self) -> StateCode {
        *self as StateCode
    }

    /// The two character, zero padded FIPS code, e.g. `"06"` for California.
    pub fn fips(&self) -> String {
        format!("{:02}", self.encode())
    }

    pub fn decode(value: StateCode) -> Option<USState> {
        Self::ALL.iter().copied().find(|state| state.encode() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            USState::AL => "AL",
            USState::AK => "AK",
            USState::AZ => "AZ",
            USState::AR => "AR",
            USState::CA => "CA",
            USState::CO => "CO",
            USState::CT => "CT",
            USState::DE => "DE",
            USState::DC => "DC",
            USState::FL => "FL",
            USState::GA => "GA",
            USState::HI => "HI",
            USState::ID => "ID",
            USState::IL => "IL",
            USState::IN => "IN",
            USState::IA => "IA",
            USState::KS => "KS",
            USState::KY => "KY",
            USState::LA => "LA",
            USState::ME => "ME",
            USState::MD => "MD",
            USState::MA => "MA",
            USState::MI => "MI",
            USState::MN => "MN",
            USState::MS => "MS",
            USState::MO => "MO",
            USState::MT => "MT",
            USState::NE => "NE",
            USState::NV => "NV",
            USState::NH => "NH",
            USState::NJ => "NJ",
            USState::NM => "NM",
            USState::NY => "NY",
            USState::NC => "NC",
            USState::ND => "ND",
            USState::OH => "OH",
            USState::OK => "OK",
            USState::OR => "OR",
            USState::PA => "PA",
            USState::RI => "RI",
            USState::SC => "SC",
            USState::SD => "SD",
            USState::TN => "TN",
            USState::TX => "TX",
            USState::UT => "UT",
            USState::VT => "VT",
            USState::VA => "VA",
            USState::WA => "WA",
            USState::WV => "WV",
            USState::WI => "WI",
            USState::WY => "WY",
            USState::AS => "AS",
            USState::GU => "GU",
            USState::MP => "MP",
            USState::PR => "PR",
            USState::VI => "VI",
        }
    }

    /// The display name used in the `location_name` column of forecast submissions.
    pub fn name(&self) -> &'static str {
        match self {
            USState::AL => "Alabama",
            USState::AK => "Alaska",
            USState::AZ => "Arizona",
            USState::AR => "Arkansas",
            USState::CA => "California",
            USState::CO => "Colorado",
            USState::CT => "Connecticut",
            USState::DE => "Delaware",
            USState::DC => "District of Columbia",
            USState::FL => "Florida",
            USState::GA => "Georgia",
            USState::HI => "Hawaii",
            USState::ID => "Idaho",
            USState::IL => "Illinois",
            USState::IN => "Indiana",
            USState::IA => "Iowa",
            USState::KS => "Kansas",
            USState::KY => "Kentucky",
            USState::LA => "Louisiana",
            USState::ME => "Maine",
            USState::MD => "Maryland",
            USState::MA => "Massachusetts",
            USState::MI => "Michigan",
            USState::MN => "Minnesota",
            USState::MS => "Mississippi",
            USState::MO => "Missouri",
            USState::MT => "Montana",
            USState::NE => "Nebraska",
            USState::NV => "Nevada",
            USState::NH => "New Hampshire",
            USState::NJ => "New Jersey",
            USState::NM => "New Mexico",
            USState::NY => "New York",
            USState::NC => "North Carolina",
            USState::ND => "North Dakota",
            USState::OH => "Ohio",
            USState::OK => "Oklahoma",
            USState::OR => "Oregon",
            USState::PA => "Pennsylvania",
            USState::RI => "Rhode Island",
            USState::SC => "South Carolina",
            USState::SD => "South Dakota",
            USState::TN => "Tennessee",
            USState::TX => "Texas",
            USState::UT => "Utah",
            USState::VT => "Vermont",
            USState::VA => "Virginia",
            USState::WA => "Washington",
            USState::WV => "West Virginia",
            USState::WI => "Wisconsin",
            USState::WY => "Wyoming",
            USState::AS => "American Samoa",
            USState::GU => "Guam",
            USState::MP => "Northern Mariana Islands",
            USState::PR => "Puerto Rico",
            USState::VI => "Virgin Islands",
        }
    }
}

impl Display for USState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// States travel through JSON as their two digit FIPS code.
impl Serialize for USState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fips())
    }
}

impl<'de> Deserialize<'de> for USState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        crate::parser::parse_state_fips(&code).map_err(serde::de::Error::custom)
    }
}
