use std::fmt::{self, Display, Formatter};

/// A single cell from a metric or histogram block.
///
/// Picard writes everything as text with no type annotations, so cells are
/// coerced on a best-effort basis: empty cells become [Null](Self::Null),
/// cells containing a '.' are tried as floats, everything else as integers,
/// and anything that fails to convert is kept verbatim as text.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl TypedValue {
    /// Coerce a raw cell into a typed value.  Never fails; malformed numeric
    /// text (e.g. "1.2.3") degrades to [Text](Self::Text).
    pub fn coerce(cell: &str) -> Self {
        if cell.is_empty() {
            Self::Null
        } else if cell.contains('.') {
            match cell.parse::<f64>() {
                Ok(x) => Self::Float(x),
                Err(_) => Self::Text(cell.to_owned()),
            }
        } else {
            match cell.parse::<i64>() {
                Ok(x) => Self::Int(x),
                Err(_) => Self::Text(cell.to_owned()),
            }
        }
    }
}

impl Display for TypedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{}", x),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            // Null renders as an empty cell
            Self::Null => Ok(()),
        }
    }
}
