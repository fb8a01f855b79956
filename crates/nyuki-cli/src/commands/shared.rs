use serde::Serialize;
use serde::de::DeserializeOwned;

/// Parse a `snake_case` enum value using serde deserialization.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.replace('-', "_");
    let json = format!("\"{normalized}\"");
    serde_json::from_str(&json).map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

/// `--field value` sets, `--clear-field` clears, neither leaves it alone.
#[must_use]
pub fn optional_field<T: Clone>(value: Option<&T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.cloned().map(Some)
    }
}

#[derive(Serialize)]
pub struct Deleted<'a> {
    pub deleted: &'a str,
}

#[cfg(test)]
mod tests {
    use nyuki_core::enums::HiveHealth;
    use pretty_assertions::assert_eq;

    use super::{optional_field, parse_enum};

    #[test]
    fn parses_snake_case_enum() {
        let health: HiveHealth = parse_enum("critical", "health").expect("health should parse");
        assert_eq!(health, HiveHealth::Critical);
    }

    #[test]
    fn errors_on_invalid_enum() {
        let err = parse_enum::<HiveHealth>("buzzing", "health").expect_err("should fail");
        assert!(err.to_string().contains("invalid health 'buzzing'"));
    }

    #[test]
    fn optional_field_three_states() {
        let value = String::from("blue");
        assert_eq!(optional_field(Some(&value), false), Some(Some(value.clone())));
        assert_eq!(optional_field::<String>(None, true), Some(None));
        assert_eq!(optional_field::<String>(None, false), None);
    }
}
