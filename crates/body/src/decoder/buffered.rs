//! Decoding of bodies which are buffered whole before parsing: JSON,
//! url-encoded forms and plain text.

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use tracing::{debug, warn};

use crate::fields::FieldNode;
use crate::protocol::{BodyError, BodyParserConfig, DecodedBody};
use crate::ensure;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reads the whole body, failing once more than `limit` bytes arrived.
pub(crate) async fn read_limited<B>(body: B, limit: u64) -> Result<Bytes, BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let limit_usize = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, limit_usize).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(limit, "request body exceed the buffering limit");
            Err(BodyError::limit_exceeded(limit))
        }
        Err(e) => Err(BodyError::io(std::io::Error::other(e))),
    }
}

pub(crate) fn decode_json(bytes: Bytes, config: &BodyParserConfig) -> Result<DecodedBody, BodyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecodedBody::empty());
    }

    let value: Value = serde_json::from_slice(&bytes).map_err(BodyError::invalid_json)?;
    match value {
        Value::Object(map) => {
            let mut tree = config.qs.field_tree();
            for (key, value) in map {
                tree.insert(&key, FieldNode::from(value))?;
            }
            Ok(DecodedBody { fields: tree.finalize(), ..DecodedBody::empty() })
        }
        root => {
            ensure!(
                !config.strict || root.is_array(),
                BodyError::invalid_json("strict mode only accepts an object or an array as json root")
            );
            debug!("json root is not an object, keep it as raw body");
            Ok(DecodedBody { raw: Some(bytes), ..DecodedBody::empty() })
        }
    }
}

pub(crate) fn decode_form(bytes: Bytes, config: &BodyParserConfig) -> Result<DecodedBody, BodyError> {
    let mut pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes).map_err(BodyError::invalid_form)?;

    let parameter_limit = config.qs.parameter_limit;
    if pairs.len() > parameter_limit {
        warn!(received = pairs.len(), limit = parameter_limit, "drop form parameters exceed the limit");
        pairs.truncate(parameter_limit);
    }

    let mut tree = config.qs.field_tree();
    for (key, value) in pairs {
        tree.add(&key, value)?;
    }

    Ok(DecodedBody { fields: tree.finalize(), ..DecodedBody::empty() })
}

pub(crate) fn decode_text(bytes: Bytes) -> DecodedBody {
    DecodedBody { raw: Some(bytes), ..DecodedBody::empty() }
}
