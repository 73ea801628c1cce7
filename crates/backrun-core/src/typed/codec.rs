//! ArgsCodec - conversion between typed arguments, `JobArgs` and queue entries.
//!
//! Typed arguments are expected to be tuples, which serde_json writes as JSON
//! arrays, so `(42, "abc")` becomes the argument list `[42, "abc"]`. A bare
//! value becomes a one-element list and `()` an empty one.
//!
//! `()` and `None` both serialize to `null`, so a bare `Option` cannot be told
//! apart from "no arguments" and decodes back as `Some(empty)` where that is a
//! valid value. Wrap it in a tuple instead: `(Option<T>,)` becomes `[null]`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{JobArgs, JobEnvelope};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub struct ArgsCodec;

impl ArgsCodec {
    pub fn encode_args<A: Serialize + ?Sized>(args: &A) -> Result<JobArgs, CodecError> {
        let value = serde_json::to_value(args).map_err(|source| CodecError::Encode {
            what: "job arguments",
            source,
        })?;
        Ok(match value {
            Value::Array(values) => values,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Decode an argument list into `A`.
    ///
    /// The list is tried as a whole first (tuples, `Vec`s, structs). An empty
    /// list falls back to `null` (for `()` and `Option`), a single-element
    /// list to its only element.
    pub fn decode_args<A: DeserializeOwned>(args: JobArgs) -> Result<A, CodecError> {
        let array = Value::Array(args);
        let err = match A::deserialize(&array) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => e,
        };

        let fallback = match array {
            Value::Array(values) if values.is_empty() => Some(Value::Null),
            Value::Array(mut values) if values.len() == 1 => values.pop(),
            _ => None,
        };
        if let Some(value) = fallback
            && let Ok(decoded) = A::deserialize(&value)
        {
            return Ok(decoded);
        }

        Err(CodecError::Decode {
            what: "job arguments",
            source: err,
        })
    }

    pub fn encode_envelope(envelope: &JobEnvelope) -> Result<String, CodecError> {
        serde_json::to_string(envelope).map_err(|source| CodecError::Encode {
            what: "job envelope",
            source,
        })
    }

    pub fn decode_envelope(raw: &str) -> Result<JobEnvelope, CodecError> {
        serde_json::from_str(raw).map_err(|source| CodecError::Decode {
            what: "job envelope",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn tuples_map_to_positional_args() {
        let args = ArgsCodec::encode_args(&(42u64, "abc")).unwrap();
        assert_eq!(args, vec![json!(42), json!("abc")]);

        let (n, s): (u64, String) = ArgsCodec::decode_args(args).unwrap();
        assert_eq!(n, 42);
        assert_eq!(s, "abc");
    }

    #[test]
    fn unit_is_an_empty_list() {
        let args = ArgsCodec::encode_args(&()).unwrap();
        assert!(args.is_empty());
        ArgsCodec::decode_args::<()>(args).unwrap();
    }

    #[test]
    fn bare_value_is_a_single_arg() {
        let args = ArgsCodec::encode_args(&"problem-7").unwrap();
        assert_eq!(args, vec![json!("problem-7")]);

        let id: String = ArgsCodec::decode_args(args).unwrap();
        assert_eq!(id, "problem-7");
    }

    #[test]
    fn struct_decodes_from_positional_args() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Notice {
            app: String,
            count: u32,
        }

        let notice: Notice = ArgsCodec::decode_args(vec![json!("errbit"), json!(3)]).unwrap();
        assert_eq!(
            notice,
            Notice {
                app: "errbit".into(),
                count: 3
            }
        );
    }

    #[test]
    fn optional_arg_round_trips_inside_a_tuple() {
        let args = ArgsCodec::encode_args(&(None::<Vec<u32>>,)).unwrap();
        assert_eq!(args, vec![json!(null)]);
        let (decoded,): (Option<Vec<u32>>,) = ArgsCodec::decode_args(args).unwrap();
        assert_eq!(decoded, None);

        let args = ArgsCodec::encode_args(&(Some(vec![1u32, 2]),)).unwrap();
        assert_eq!(args, vec![json!([1, 2])]);
        let (decoded,): (Option<Vec<u32>>,) = ArgsCodec::decode_args(args).unwrap();
        assert_eq!(decoded, Some(vec![1, 2]));
    }

    #[test]
    fn mismatched_args_report_decode_error() {
        let err = ArgsCodec::decode_args::<(u64, u64)>(vec![json!("x")]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }
}
