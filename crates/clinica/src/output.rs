//! Output formatting: JSON, compact JSON, YAML.

use std::io::{self, Write};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render any serde-serializable value in the chosen format.
pub fn render<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(render_err)?,
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(render_err)?,
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(render_err)?,
    };
    Ok(rendered.trim_end().to_owned())
}

fn render_err(e: impl std::fmt::Display) -> CliError {
    CliError::Render {
        message: e.to_string(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_each_format() {
        let data = json!({ "citas": [1, 2], "nombre": "Ana" });
        assert!(render(OutputFormat::Json, &data).unwrap().contains("\n  \"citas\""));
        assert_eq!(
            render(OutputFormat::JsonCompact, &data).unwrap(),
            r#"{"citas":[1,2],"nombre":"Ana"}"#
        );
        assert!(render(OutputFormat::Yaml, &data).unwrap().contains("nombre: Ana"));
    }
}
