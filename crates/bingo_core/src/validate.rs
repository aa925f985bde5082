//! Board configuration validation.
//!
//! Validation runs on the raw JSON value before anything typed is built, so
//! a rejected upload never reaches the session.

use crate::board::BoardConfiguration;
use derive_more::{Display, Error};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Top-level keys every configuration must carry.
const REQUIRED_FIELDS: [&str; 4] = ["boardSize", "squares", "rarityColors", "completionBonuses"];

/// Reasons a board configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ValidationError {
    /// The document is not valid JSON or has the wrong value types.
    #[display("Malformed configuration: {reason}")]
    Malformed {
        /// Parser or type error.
        reason: String,
    },
    /// A required top-level field is absent.
    #[display("Missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// The grid has no squares.
    #[display("Board must have at least one row and one column")]
    EmptyBoard,
    /// `rows * columns` does not fit in the address space.
    #[display("Board of {rows}x{columns} is too large")]
    BoardTooLarge {
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        columns: usize,
    },
    /// The square list does not fill the grid exactly.
    #[display("Board of {rows}x{columns} needs {expected} squares, found {found}")]
    SquareCountMismatch {
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        columns: usize,
        /// `rows * columns`.
        expected: usize,
        /// Length of the square list.
        found: usize,
    },
    /// A square lacks one of `name`, `rarity` or `points`.
    #[display("Square {index} is invalid: {reason}")]
    InvalidSquare {
        /// Index of the offending square.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
    /// A square references a rarity with no color entry.
    #[display("Square {index} uses rarity '{rarity}' which has no color")]
    UnknownRarity {
        /// Index of the offending square.
        index: usize,
        /// The unresolved rarity.
        rarity: String,
    },
}

impl ValidationError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    fn invalid_square(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidSquare {
            index,
            reason: reason.into(),
        }
    }
}

/// Parses and validates a configuration document.
///
/// # Errors
///
/// Returns [`ValidationError`] if the text is not JSON or fails [`validate`].
#[instrument(skip(text), fields(bytes = text.len()))]
pub fn parse(text: &str) -> Result<BoardConfiguration, ValidationError> {
    let raw: Value = serde_json::from_str(text).map_err(|e| {
        warn!(error = %e, "Configuration is not valid JSON");
        ValidationError::malformed(e.to_string())
    })?;
    validate(&raw)
}

/// Validates a raw configuration value and converts it to a typed board.
///
/// # Errors
///
/// Returns [`ValidationError`] when a required field is missing, the board
/// size is zero or overflows, the square count disagrees with the board
/// size, a square is incomplete or has negative points, or a rarity has no
/// color.
#[instrument(skip(raw))]
pub fn validate(raw: &Value) -> Result<BoardConfiguration, ValidationError> {
    let object = raw
        .as_object()
        .ok_or_else(|| ValidationError::malformed("configuration must be a JSON object"))?;

    for field in REQUIRED_FIELDS {
        if object.get(field).is_none_or(Value::is_null) {
            warn!(field, "Configuration missing required field");
            return Err(ValidationError::MissingField { field });
        }
    }

    let rows = dimension(&object["boardSize"], "rows")?;
    let columns = dimension(&object["boardSize"], "columns")?;
    if rows == 0 || columns == 0 {
        return Err(ValidationError::EmptyBoard);
    }

    let squares = object["squares"]
        .as_array()
        .ok_or_else(|| ValidationError::malformed("'squares' must be an array"))?;
    let expected = rows.checked_mul(columns).ok_or_else(|| {
        warn!(rows, columns, "Board dimensions overflow");
        ValidationError::BoardTooLarge { rows, columns }
    })?;
    if squares.len() != expected {
        warn!(expected, found = squares.len(), "Square count mismatch");
        return Err(ValidationError::SquareCountMismatch {
            rows,
            columns,
            expected,
            found: squares.len(),
        });
    }

    let colors = object["rarityColors"]
        .as_object()
        .ok_or_else(|| ValidationError::malformed("'rarityColors' must be an object"))?;

    for (index, square) in squares.iter().enumerate() {
        let rarity = check_square(index, square)?;
        let has_color = colors
            .get(rarity)
            .and_then(Value::as_str)
            .is_some_and(|color| !color.is_empty());
        if !has_color {
            warn!(index, rarity, "Square rarity has no color");
            return Err(ValidationError::UnknownRarity {
                index,
                rarity: rarity.to_string(),
            });
        }
    }

    let config: BoardConfiguration = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::malformed(e.to_string()))?;

    info!(rows, columns, exclusive = config.exclusive_squares(), "Configuration validated");
    Ok(config)
}

fn dimension(size: &Value, key: &'static str) -> Result<usize, ValidationError> {
    size.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            ValidationError::malformed(format!("'boardSize.{key}' must be a non-negative integer"))
        })
}

/// Checks one square's required fields and returns its rarity.
fn check_square(index: usize, square: &Value) -> Result<&str, ValidationError> {
    let name = square.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.is_empty() {
        return Err(ValidationError::invalid_square(index, "missing name"));
    }

    let rarity = square.get("rarity").and_then(Value::as_str).unwrap_or_default();
    if rarity.is_empty() {
        return Err(ValidationError::invalid_square(index, "missing rarity"));
    }

    match square.get("points") {
        Some(points) if points.as_i64().is_some_and(|p| p >= 0) => {}
        Some(_) => {
            return Err(ValidationError::invalid_square(
                index,
                "points must be a non-negative integer",
            ));
        }
        None => return Err(ValidationError::invalid_square(index, "missing points")),
    }

    debug!(index, name, rarity, "Square checked");
    Ok(rarity)
}
