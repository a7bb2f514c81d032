use serde_json::{Value, json};
use std::fmt::Display;
use wirecall_core::CallResult;

/// A wrapper struct for a printable block of output.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.0)
    }
}

impl From<Value> for FormattedString {
    fn from(value: Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

/// Renders the call result, embedding the payload as JSON rather than as a string.
impl From<CallResult> for FormattedString {
    fn from(result: CallResult) -> Self {
        let payload =
            serde_json::from_str(&result.payload).unwrap_or(Value::String(result.payload));

        FormattedString::from(json!({
            "id": result.id,
            "status_code": result.status_code,
            "response_headers": result.response_headers,
            "payload": payload,
        }))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{msg}\n\n'{err}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_call_result_output() {
        let result = CallResult {
            id: "https://localhost/echo.EchoServer/SayHello".to_string(),
            status_code: 200,
            response_headers: BTreeMap::from([("x-multi".to_string(), "a, b".to_string())]),
            payload: r#"{"message":"hi"}"#.to_string(),
        };

        let FormattedString(output) = FormattedString::from(result);
        let value: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["status_code"], 200);
        assert_eq!(value["payload"]["message"], "hi");
        assert_eq!(value["response_headers"]["x-multi"], "a, b");
        assert_eq!(value["id"], "https://localhost/echo.EchoServer/SayHello");
    }
}
