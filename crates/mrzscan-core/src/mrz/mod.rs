//! Machine readable zone decoding.

pub mod checksum;
pub mod parser;

pub use checksum::{CheckDigit, check_digit};
pub use parser::{MrzFields, MrzFormat, Sex, normalize_lines, parse_mrz, parse_mrz_with_reference};
