//! Implementation of the `shunt materialize` command.

use std::path::PathBuf;

use serde_json::json;
use tracing::{info, instrument};

use shunt_core::application::MaterializeReport;

use crate::{
    cli::{MaterializeArgs, OutputFormat},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

/// Execute the `shunt materialize` command.
#[instrument(skip_all, fields(path = %args.path.display()))]
pub fn execute(args: MaterializeArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = super::build_service(&config, args.resolution);

    output.header(&format!("Materializing from {}...", args.path.display()))?;
    let report = service.materialize(&args.path)?;
    info!(views = report.views.len(), "materialize finished");

    if output.format() == OutputFormat::Json {
        output.emit(&report_json(&report).to_string())?;
        return Ok(());
    }

    for view in &report.views {
        output.print(&format!("  view      {}", view.display()))?;
    }
    for resource in &report.resources {
        output.print(&format!("  resource  {}", resource.display()))?;
    }
    output.success(&format!(
        "Materialized {} Shuntfile(s): {} view(s), {} resource(s)",
        report.shuntfiles.len(),
        report.views.len(),
        report.resources.len()
    ))?;
    Ok(())
}

fn report_json(report: &MaterializeReport) -> serde_json::Value {
    let paths = |items: &[PathBuf]| -> Vec<String> {
        items.iter().map(|p| p.display().to_string()).collect()
    };
    json!({
        "shuntfiles": paths(&report.shuntfiles),
        "views": paths(&report.views),
        "resources": paths(&report.resources),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_every_list() {
        let report = MaterializeReport {
            shuntfiles: vec![PathBuf::from("/p/Shuntfile")],
            views: vec![PathBuf::from("/p/README.md"), PathBuf::from("/p/src/main.rs")],
            resources: Vec::new(),
        };
        let value = report_json(&report);
        assert_eq!(value["shuntfiles"][0], "/p/Shuntfile");
        assert_eq!(value["views"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["resources"], json!([]));
    }
}
