use crate::context::Project;
use crate::output;
use colored::Colorize;
use meshform_cloud::{Reconciler, violations};
use std::path::Path;

pub fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    let project = Project::load(file)?;
    println!(
        "{} {}",
        "Validating".blue(),
        project.file.display().to_string().cyan()
    );

    let mut invalid = 0;
    for desired in &project.manifest.resources {
        let reconciler = Reconciler::for_config(desired)?;
        let found = violations(reconciler.schema(), desired, reconciler.cloud());
        if found.is_empty() {
            println!(
                "  {} {} '{}' ({})",
                "✓".green(),
                desired.family(),
                desired.name(),
                reconciler.cloud()
            );
        } else {
            output::print_violations(desired, &found);
            invalid += 1;
        }
    }

    println!();
    if invalid > 0 {
        anyhow::bail!(
            "{invalid} of {} resource(s) failed validation",
            project.manifest.len()
        );
    }
    println!(
        "{}",
        format!("✓ {} resource(s) valid", project.manifest.len())
            .green()
            .bold()
    );
    Ok(())
}
