//! Terminal rendering of plans, violations and apply results

use colored::Colorize;
use meshform_cloud::{ApplyReport, CloudError, DesiredConfig, Plan, RemoteCall, Violation};

pub fn print_plan(plan: &Plan) {
    let header = format!("{} '{}'", plan.family, plan.name);
    if !plan.has_changes {
        println!("  {} {}", header.bold(), "up to date".dimmed());
        return;
    }

    println!("  {} ({})", header.bold(), plan.summary());
    if let Some(ha) = &plan.ha {
        let mut note = format!("HA {} -> {}", ha.state, ha.secondary);
        if ha.recreate {
            note.push_str(" (recreate)");
        } else if ha.resize {
            note.push_str(" (resize)");
        }
        println!("    {}", note.cyan());
    }
    for op in &plan.operations {
        let line = match op.call {
            RemoteCall::Create => format!("+ {op}").green(),
            RemoteCall::Update => format!("~ {op}").yellow(),
            RemoteCall::Delete => format!("- {op}").red(),
        };
        println!("    {line}");
    }
}

pub fn print_violations(desired: &DesiredConfig, violations: &[Violation]) {
    println!(
        "  {} {} '{}'",
        "✗".red().bold(),
        desired.family(),
        desired.name()
    );
    for v in violations {
        println!("      {} {}", "-".red(), v);
        if !v.fields.is_empty() {
            println!("        fields: {}", v.fields.join(", ").dimmed());
        }
    }
}

pub fn print_report(plan: &Plan, report: &ApplyReport) {
    let mut line = format!(
        "  {} {} '{}': {} operation(s) in {} ms",
        "✓".green().bold(),
        plan.family,
        plan.name,
        report.committed.len(),
        report.duration_ms
    );
    if let Some(id) = &report.remote_id {
        line.push_str(&format!(" [id {id}]"));
    }
    if let Some(ha) = report.ha {
        line.push_str(&format!(" [HA {ha}]"));
    }
    println!("{line}");
}

/// Print an apply failure; partial failures list what already committed.
pub fn print_failure(plan: &Plan, error: &CloudError) {
    eprintln!(
        "  {} {} '{}': {}",
        "✗".red().bold(),
        plan.family,
        plan.name,
        error
    );
    if let CloudError::PartialReconciliation {
        committed,
        failed,
        fields,
        ha,
        source,
    } = error
    {
        for name in committed {
            eprintln!("      {} {}", "committed".green(), name);
        }
        eprintln!("      {} {}: {}", "failed".red(), failed, source);
        if !fields.is_empty() {
            eprintln!("        fields: {}", fields.join(", ").dimmed());
        }
        if let Some(ha) = ha {
            eprintln!("      HA state: {}", ha.to_string().yellow());
        }
        eprintln!(
            "      {}",
            "Nothing was rolled back; run apply again to finish.".yellow()
        );
    }
}
