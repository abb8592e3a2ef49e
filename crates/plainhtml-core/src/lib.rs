mod analyze;
mod convert;
mod dict;
mod entities;
mod error;
mod line;
mod links;
mod options;
mod tags;

pub use convert::TextToHtml;
pub use dict::{LinkDictionary, LinkRule, STANDARD_DICT};
pub use error::{ConvertError, Result};
pub use options::{
    Options, DEFAULT_DOCTYPE, DEFAULT_PRE_END_MARKER, DEFAULT_PRE_START_MARKER, XHTML_DOCTYPE,
};
