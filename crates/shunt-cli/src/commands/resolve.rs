//! Implementation of the `shunt resolve` command.

use tracing::{debug, instrument};

use shunt_adapters::YamlCodec;
use shunt_core::{application::DocumentCodec, domain::Node};

use crate::{
    cli::{DocumentFormat, ResolveArgs},
    config::AppConfig,
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Execute the `shunt resolve` command.
///
/// The document is resolved with no ancestors bound, structured keys are
/// expanded, and the result goes to stdout.
#[instrument(skip_all, fields(file = %args.file.display()))]
pub fn execute(args: ResolveArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    // Surface a missing file as an I/O error before any parsing.
    std::fs::metadata(&args.file)
        .with_cli_context(|| format!("cannot read {}", args.file.display()))?;

    let service = super::build_service(&config, args.resolution);
    let root = service.resolve_document(&args.file, &[])?;
    debug!(kind = root.kind(), "document resolved");

    output.emit(&render(&root, args.format)?)?;
    Ok(())
}

fn render(root: &Node, format: DocumentFormat) -> CliResult<String> {
    match format {
        DocumentFormat::Yaml => Ok(YamlCodec::new().dump(root)?),
        DocumentFormat::Json => serde_json::to_string_pretty(root).map_err(|e| CliError::InvalidInput {
            message: format!("document cannot be represented as JSON: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        [
            ("name", Node::from("demo")),
            ("ports", Node::Sequence(vec![Node::Integer(80), Node::Integer(443)])),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn renders_json() {
        let text = render(&sample(), DocumentFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "demo");
        assert_eq!(value["ports"][1], 443);
    }

    #[test]
    fn renders_yaml() {
        let text = render(&sample(), DocumentFormat::Yaml).unwrap();
        assert!(text.contains("name: demo"));
        assert!(text.contains("- 443"));
    }
}
