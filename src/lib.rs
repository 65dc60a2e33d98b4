//! Convert JSON-Lines HTTP access records into Combined Log Format lines.
//!
//! Each input line is decoded on its own by [`record::decode`] and rendered by
//! [`clf::to_combined`]; [`convert`] drives that over readers and files.

pub mod clf;
pub mod convert;
pub mod record;
pub mod zone;

pub use clf::{CLF_TIME_FORMAT, to_combined};
pub use convert::{Options, Source, Summary, convert_reader, convert_sources};
pub use record::{AccessRecord, DecodeError, Strictness, decode};
pub use zone::{Zone, ZoneParseError};
