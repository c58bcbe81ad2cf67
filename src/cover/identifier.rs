use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier for a cover.
///
/// Defined by the cover's configuration key, i.e. [covers.identifier-here]
///
/// Also used to name the cover's persisted channel and state slots.
#[derive(Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct Identifier(pub String);

impl From<String> for Identifier {
  fn from(string: String) -> Self {
    Identifier(string)
  }
}

impl From<&str> for Identifier {
  fn from(string: &str) -> Self {
    Identifier(string.to_owned())
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
