use serde::Serialize;

use crate::cli::OutputFormat;

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Serialize)]
    struct Row {
        id: &'static str,
        total_hives: i64,
    }

    #[test]
    fn raw_is_single_line() {
        let rendered = render(
            &Row {
                id: "apy-1",
                total_hives: 2,
            },
            OutputFormat::Raw,
        )
        .unwrap();
        assert_eq!(rendered, r#"{"id":"apy-1","total_hives":2}"#);
    }

    #[test]
    fn json_is_pretty() {
        let rendered = render(
            &Row {
                id: "apy-1",
                total_hives: 2,
            },
            OutputFormat::Json,
        )
        .unwrap();
        assert!(rendered.contains("\n  \"total_hives\": 2"));
    }
}
