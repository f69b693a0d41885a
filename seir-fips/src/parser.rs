/*!

Simple parsing utilities for parsing text representations of FIPS codes.

A region code is either a two digit state code (`"06"`) or a five digit county code made of the
state code followed by a three digit county code (`"06037"`). Partial parsers return the unparsed
remainder so they can be chained; the `parse_*_fips` functions require the whole input to be
consumed.

*/

use std::fmt::{Debug, Display};

use crate::states::USState;
use crate::{CountyCode, StateCode};

/// The FIPS parser error type.
/// The assumption is that the parsing context is so small that it isn't necessary to track source location information.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum FIPSParserError {
    InvalidDigit { found: char },
    InvalidLength { expected: u32, found: u32 },
    UnknownStateCode { value: StateCode },
    TrailingInput { remaining: usize },
}

impl Display for FIPSParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FIPSParserError::InvalidDigit { found } => write!(f, "Invalid digit: {}", found),
            FIPSParserError::InvalidLength { expected, found } => {
                write!(f, "Expected {} characters, found {}", expected, found)
            }
            FIPSParserError::UnknownStateCode { value } => {
                write!(f, "No state or territory has FIPS code {:02}", value)
            }
            FIPSParserError::TrailingInput { remaining } => {
                write!(f, "Unexpected {} trailing characters", remaining)
            }
        }
    }
}

impl Debug for FIPSParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self, f)
    }
}

impl std::error::Error for FIPSParserError {}

/// Similar to how Nom structures its results. We have:
///   `I`: The input type, i.e. `&str`
///   `O`: The output type, i.e. `u32`
///   `E`: The error type returns a tuple of the original input and the error.
/// A successful result consists of the remaining unparsed input and the parsed value.
pub type IResult<I, O, E = (I, FIPSParserError)> = Result<(I, O), E>;
pub type FIPSParseResult<'a, T> = IResult<&'a str, T>;

/// A state code with an optional county code, as used to key model fits.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct RegionFips {
    pub state: USState,
    pub county: Option<CountyCode>,
}

impl RegionFips {
    pub fn is_county(&self) -> bool {
        self.county.is_some()
    }
}

impl Display for RegionFips {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.county {
            Some(county) => write!(f, "{:02}{:03}", self.state.encode(), county),
            None => write!(f, "{:02}", self.state.encode()),
        }
    }
}

/// Parses exactly `digit_count` leading ASCII decimal digits. Upon success, returns the
/// remainder of the input after consuming the parsed digits together with their value. If
/// there is an error, the original input is returned along with the `FIPSParserError` variant
/// describing the error.
pub(crate) fn parse_decimal_digits(digit_count: u32, input: &str) -> IResult<&str, u64> {
    let mut chars = input.chars();
    let mut computed_value: u64 = 0;

    for idx in 0..digit_count {
        match chars.next() {
            Some(c) => match c.to_digit(10) {
                Some(digit) => computed_value = 10 * computed_value + digit as u64,
                None => return Err((input, FIPSParserError::InvalidDigit { found: c })),
            },
            None => {
                // Ran out of digits before we were done parsing.
                return Err((
                    input,
                    FIPSParserError::InvalidLength {
                        expected: digit_count,
                        found: idx,
                    },
                ));
            }
        }
    }

    // All consumed characters are ASCII digits, so this is a char boundary.
    let remaining = &input[digit_count as usize..];
    Ok((remaining, computed_value))
}

/// Parses the first two decimal digits of `input` into a `USState` enum variant.
pub fn parse_state_code(input: &str) -> FIPSParseResult<USState> {
    let (rest, value) = parse_decimal_digits(2, input)?;
    // Two decimal digits always fit in a `StateCode`.
    let value = value as StateCode;
    match USState::decode(value) {
        Some(state) => Ok((rest, state)),
        None => Err((input, FIPSParserError::UnknownStateCode { value })),
    }
}

/// Parses the first three digits of `input` as a FIPS county code.
pub fn parse_county_code(input: &str) -> FIPSParseResult<CountyCode> {
    parse_decimal_digits(3, input).map(|(rest, value)| (rest, value as CountyCode))
}

fn expect_end<T>(rest: &str, value: T) -> Result<T, FIPSParserError> {
    if rest.is_empty() {
        Ok(value)
    } else {
        Err(FIPSParserError::TrailingInput {
            remaining: rest.chars().count(),
        })
    }
}

/// Parses a complete two digit state code.
pub fn parse_state_fips(input: &str) -> Result<USState, FIPSParserError> {
    let (rest, state) = parse_state_code(input.trim()).map_err(|(_, e)| e)?;
    expect_end(rest, state)
}

/// Parses a complete state (2 digit) or county (5 digit) region code.
pub fn parse_region_fips(input: &str) -> Result<RegionFips, FIPSParserError> {
    let input = input.trim();
    let (rest, state) = parse_state_code(input).map_err(|(_, e)| e)?;
    if rest.is_empty() {
        return Ok(RegionFips {
            state,
            county: None,
        });
    }
    let (rest, county) = parse_county_code(rest).map_err(|(_, e)| e)?;
    expect_end(
        rest,
        RegionFips {
            state,
            county: Some(county),
        },
    )
}
