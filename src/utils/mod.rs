use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::io::BufReader;
use xml::reader::{EventReader, XmlEvent};

/// Flattens the direct children of `root` into a map of element name to text.
///
/// Malformed documents stop the walk and return whatever was collected so far,
/// so a broken reply reads as missing fields rather than an error.
///
/// # Examples
///
/// ```
/// use qvr_cam_rs::utils::parse_xml_fields;
///
/// let xml = b"<QDocRoot><authPassed><![CDATA[1]]></authPassed></QDocRoot>";
/// let fields = parse_xml_fields(xml, "QDocRoot");
/// assert_eq!(fields.get("authPassed").map(String::as_str), Some("1"));
/// ```
pub fn parse_xml_fields(response: &[u8], root: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();

    let buffer = BufReader::new(response);
    let parser = EventReader::new(buffer);

    let mut depth = 0;
    let mut in_root = false;
    let mut element: Option<String> = None;
    let mut text = String::new();

    for e in parser {
        match e {
            Ok(XmlEvent::StartElement { name, .. }) => {
                depth += 1;

                if depth == 1 && name.local_name == root {
                    in_root = true;
                }

                if in_root && depth == 2 {
                    element = Some(name.local_name);
                    text.clear();
                }
            }
            Ok(XmlEvent::EndElement { .. }) => {
                if in_root && depth == 2 {
                    if let Some(name) = element.take() {
                        result.insert(name, text.trim().to_string());
                    }
                }

                depth -= 1;
            }
            Ok(XmlEvent::Characters(chars)) | Ok(XmlEvent::CData(chars)) => {
                if element.is_some() && depth == 2 {
                    text.push_str(&chars);
                }
            }
            Err(e) => {
                debug!("[utils][parse_xml_fields] Stopped at malformed XML: {e}");
                break;
            }
            _ => {}
        }
    }

    result
}

/// Loose truthiness of a JSON value: null, false, 0 and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Truthiness of an XML text field: missing, empty, numeric zero and "false" are falsy.
pub fn is_xml_truthy(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(s) if s.eq_ignore_ascii_case("false") => false,
        Some(s) => s.parse::<f64>().map_or(true, |f| f != 0.0),
    }
}

/// Integer parse that reads leading digits and ignores the rest, `"1080p"` -> 1080.
pub fn parse_leading_int(input: &str) -> Option<u32> {
    let trimmed = input.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());

    trimmed[..end].parse().ok()
}

/// Numeric view of a JSON value that may arrive as a number or a numeric string.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(is_truthy(&value))
}

/// Treats an explicit null like a missing field.
pub fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a string or a number and keeps its textual form. Null becomes "".
pub fn deserialize_string_lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

pub fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    value_as_f64(&value)
        .filter(|p| p.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(p))
        .map(|p| p as u16)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid port: {value}")))
}
