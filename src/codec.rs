use thiserror::Error;

/// A typed value moving between test-case literals and candidate code.
///
/// Record fields keep their declared order because the canonical
/// serialization joins field values in that order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Seq(Vec<Value>),
    Record(Vec<(String, Value)>),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unbalanced brackets in `{0}`")]
    UnbalancedBrackets(String),
    #[error("unterminated string in `{0}`")]
    UnterminatedString(String),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

/// Parses a test-case input literal into an ordered argument list.
///
/// Top-level commas separate arguments; commas inside brackets or quotes
/// do not, so `"[2,7,11,15], 9"` yields two arguments. An entirely empty
/// literal yields an empty list; an empty segment between commas parses
/// to [`Value::Null`].
pub fn parse_arguments(input_literal: &str) -> Result<Vec<Value>, ParseError> {
    if input_literal.trim().is_empty() {
        return Ok(Vec::new());
    }

    split_top_level(input_literal)?
        .iter()
        .map(|segment| parse_value(segment))
        .collect()
}

/// Parses one literal segment into a [`Value`].
pub fn parse_value(segment: &str) -> Result<Value, ParseError> {
    let segment = segment.trim();

    if segment.is_empty() {
        return Ok(Value::Null);
    }

    if let Some(inner) = segment.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| ParseError::UnbalancedBrackets(segment.to_string()))?;
        if inner.trim().is_empty() {
            return Ok(Value::Seq(Vec::new()));
        }
        let elements = split_top_level(inner)?
            .iter()
            .map(|element| parse_value(element))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Seq(elements));
    }

    if segment.starts_with('"') || segment.starts_with('\'') {
        return parse_string(segment);
    }

    match segment {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        _ => segment
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| ParseError::InvalidNumber(segment.to_string())),
    }
}

/// Serializes a value into the canonical result form.
///
/// Sequences comma-join their elements, records comma-join field values
/// in declared order, strings are bare text and integral numbers carry
/// no fractional part. Exercise authors must write `expected_literal`
/// in exactly this form: the grader compares by text equality, not by
/// structural equality.
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => serialize_number(*n),
        Value::Text(s) => s.clone(),
        Value::Seq(elements) => elements
            .iter()
            .map(serialize_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Record(fields) => fields
            .iter()
            .map(|(_, v)| serialize_value(v))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Decodes a JSON value produced by the executor into a [`Value`].
///
/// Object key order is preserved (serde_json `preserve_order`), which is
/// what makes record serialization follow the declared field order.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => Value::Seq(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Record(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

fn serialize_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn parse_string(segment: &str) -> Result<Value, ParseError> {
    let quote = segment.chars().next().unwrap_or('"');
    let inner = &segment[1..];

    let mut out = String::new();
    let mut chars = inner.chars();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err(ParseError::UnterminatedString(segment.to_string())),
            },
            Some(c) if c == quote => {
                // The closing quote must end the segment
                if chars.next().is_some() {
                    return Err(ParseError::UnterminatedString(segment.to_string()));
                }
                return Ok(Value::Text(out));
            }
            Some(c) => out.push(c),
            None => return Err(ParseError::UnterminatedString(segment.to_string())),
        }
    }
}

/// Splits a literal on top-level commas, leaving bracketed and quoted
/// sections intact.
fn split_top_level(literal: &str) -> Result<Vec<String>, ParseError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in literal.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParseError::UnbalancedBrackets(literal.to_string()));
                }
                current.push(c);
            }
            ',' if depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedBrackets(literal.to_string()));
    }
    if quote.is_some() {
        return Err(ParseError::UnterminatedString(literal.to_string()));
    }

    segments.push(current);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_sequence_splits_as_one_argument() {
        let args = parse_arguments("[2,7,11,15], 9").unwrap();
        assert_eq!(
            args,
            vec![
                Value::Seq(vec![
                    Value::Number(2.0),
                    Value::Number(7.0),
                    Value::Number(11.0),
                    Value::Number(15.0),
                ]),
                Value::Number(9.0),
            ]
        );
    }

    #[test]
    fn test_string_arguments_strip_delimiters() {
        let args = parse_arguments(r#""hello", "C# rocks""#).unwrap();
        assert_eq!(
            args,
            vec![
                Value::Text("hello".to_string()),
                Value::Text("C# rocks".to_string()),
            ]
        );
    }

    #[test]
    fn test_quoted_empty_string_is_text_not_null() {
        assert_eq!(parse_value(r#""""#).unwrap(), Value::Text(String::new()));
        assert_eq!(parse_value("").unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_literal_is_empty_argument_list() {
        assert_eq!(parse_arguments("").unwrap(), Vec::new());
        assert_eq!(parse_arguments("   ").unwrap(), Vec::new());
    }

    #[test]
    fn test_empty_segment_between_commas_is_null() {
        let args = parse_arguments("1, , 3").unwrap();
        assert_eq!(
            args,
            vec![Value::Number(1.0), Value::Null, Value::Number(3.0)]
        );
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        assert!(matches!(
            parse_arguments("[1, 2"),
            Err(ParseError::UnbalancedBrackets(_))
        ));
        assert!(matches!(
            parse_arguments("1, 2]"),
            Err(ParseError::UnbalancedBrackets(_))
        ));
    }

    #[test]
    fn test_unterminated_quote_fails() {
        assert!(matches!(
            parse_arguments(r#""abc"#),
            Err(ParseError::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_comma_inside_quotes_does_not_split() {
        let args = parse_arguments(r#""a,b", 1"#).unwrap();
        assert_eq!(args, vec![Value::Text("a,b".to_string()), Value::Number(1.0)]);
    }

    #[test]
    fn test_scalar_round_trip() {
        for literal in ["42", "-7", "3.5", "true", "false"] {
            let value = parse_value(literal).unwrap();
            assert_eq!(serialize_value(&value), literal);
        }
    }

    #[test]
    fn test_sequence_round_trip() {
        // Canonical result form for sequences is bracketless, so the law
        // runs through parse_arguments: the literal "0,1" names the
        // elements of the returned sequence.
        let args = parse_arguments("0,1").unwrap();
        assert_eq!(serialize_value(&Value::Seq(args)), "0,1");
    }

    #[test]
    fn test_record_round_trip() {
        let record = Value::Record(vec![
            ("max".to_string(), Value::Number(8.0)),
            ("min".to_string(), Value::Number(1.0)),
        ]);
        let literal = serialize_value(&record);
        assert_eq!(literal, "8,1");
        let reparsed = parse_arguments(&literal).unwrap();
        assert_eq!(
            serialize_value(&Value::Seq(reparsed)),
            literal,
            "field values survive a parse/serialize cycle in declared order"
        );
    }

    #[test]
    fn test_integral_float_serializes_without_fraction() {
        assert_eq!(serialize_value(&Value::Number(20.0)), "20");
        assert_eq!(serialize_value(&Value::Number(28.27)), "28.27");
    }

    #[test]
    fn test_empty_sequence_serializes_empty() {
        assert_eq!(serialize_value(&Value::Seq(Vec::new())), "");
    }

    #[test]
    fn test_from_json_preserves_record_order() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"max": 8, "min": 1}"#).unwrap();
        assert_eq!(serialize_value(&from_json(&json)), "8,1");
    }
}
