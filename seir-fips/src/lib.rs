//! # FIPS Region Code Library
//!
//! Forecast submissions identify locations by their two digit state FIPS code, and county-level
//! model fits are keyed by the five digit state + county code. This library provides the
//! [`USState`] enum for the states, the District of Columbia, and the inhabited territories,
//! together with their postal abbreviations and display names, and a small set of parsers
//! ([`crate::parser`]) that turn textual codes into typed values.
//!
//! ```rust
//! use seir_fips::{parser::parse_region_fips, USState};
//!
//! let region = parse_region_fips("06037").unwrap();
//! assert_eq!(region.state, USState::CA);
//! assert_eq!(region.county, Some(37));
//! assert_eq!(region.state.name(), "California");
//! ```

pub mod parser;
pub mod states;

pub use parser::{FIPSParserError, RegionFips};
pub use states::USState;

/// The numeric type used for the state code fragment; `u8`
pub type StateCode = u8;
/// The numeric type used for the county code fragment; `u16`
pub type CountyCode = u16;
