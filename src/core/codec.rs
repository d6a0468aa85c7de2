use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub const MAX_TOKEN_LEN: usize = 64 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("token is empty")]
    Empty,

    #[error("token is longer than {MAX_TOKEN_LEN} bytes")]
    TooLong,

    #[error("{0}")]
    Syntax(String),

    #[error("unknown table \"{0}\"")]
    UnknownTable(String),

    #[error("column index {0} is out of range")]
    ColumnOutOfRange(usize),

    #[error("inconsistent state: {0}")]
    Inconsistent(&'static str),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Syntax(e.to_string())
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, CodecError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(CodecError::TooLong);
    }
    if token.trim().is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_str(token)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Pick {
        table: String,
        selected: Vec<usize>,
        note: Option<String>,
    }

    fn pick() -> Pick {
        Pick {
            table: "O'Brien \"co\"".to_string(),
            selected: vec![0, 3],
            note: None,
        }
    }

    #[test]
    fn decodes_what_it_encodes() {
        let token = encode(&pick()).unwrap();
        assert_eq!(
            token,
            r#"{"table":"O'Brien \"co\"","selected":[0,3],"note":null}"#
        );
        assert_eq!(decode::<Pick>(&token), Ok(pick()));
    }

    #[test]
    fn rejects_anything_outside_the_shape() {
        for token in [
            "__import__('os')",
            "{'table': 'orders', 'selected': [0], 'note': None}",
            r#"{"table": "orders", "selected": [0], "note": null, "extra": 1}"#,
            r#"{"table": "orders", "selected": [-1], "note": null}"#,
            r#"{"table": "orders", "selected": [0.5], "note": null}"#,
            r#"{"table": "orders", "note": null}"#,
            r#"{"table": "orders", "selected": [0], "note": null} []"#,
        ] {
            assert!(
                matches!(decode::<Pick>(token), Err(CodecError::Syntax(_))),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn bounds_token_length() {
        assert_eq!(decode::<Pick>("   "), Err(CodecError::Empty));

        let long = format!("\"{}\"", "a".repeat(MAX_TOKEN_LEN));
        assert_eq!(decode::<String>(&long), Err(CodecError::TooLong));
    }
}
