use crate::context::{self, Project, Source};
use crate::output;
use colored::Colorize;
use meshform_cloud::CloudError;
use tracing::info;

pub async fn handle(project: &Project, target: Option<&str>, yes: bool) -> anyhow::Result<()> {
    let resources = project.select(target)?;
    let (client, settings) = context::connect().await?;
    let cancel = context::cancellation();

    let manager = project.state_manager(Some(&settings));
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let planned = context::plan_all(&resources, Source::Remote(&client, &cancel)).await?;

    println!();
    for p in &planned {
        output::print_plan(&p.plan);
    }
    let total: usize = planned.iter().map(|p| p.plan.operations.len()).sum();

    println!();
    if total == 0 {
        println!("{}", "No changes.".green().bold());
        lock.release().await?;
        return Ok(());
    }
    if !yes {
        println!(
            "{}",
            format!("{total} operation(s) will be sent to {}.", settings.controller_url).yellow()
        );
        println!("Pass --yes to apply them");
        lock.release().await?;
        return Ok(());
    }

    println!("{}", "Applying...".blue());
    let mut failed = 0;
    for p in planned.iter().filter(|p| p.plan.has_changes) {
        if cancel.is_cancelled() {
            break;
        }
        match p.reconciler.apply(&client, &p.plan, &cancel).await {
            Ok(report) => {
                output::print_report(&p.plan, &report);
                let outcome = (report.remote_id, report.ha);
                context::record(&mut state, &p.reconciler, &client, p.desired, outcome, &cancel)
                    .await;
            }
            Err(e) => {
                output::print_failure(&p.plan, &e);
                failed += 1;
                if let CloudError::PartialReconciliation { ha, .. } = &e {
                    // refresh what partially landed so the next plan starts from it
                    let outcome = (None, *ha);
                    context::record(&mut state, &p.reconciler, &client, p.desired, outcome, &cancel)
                        .await;
                }
            }
        }
    }

    manager.save(&state).await?;
    lock.release().await?;
    info!(resources = planned.len(), failed, "Apply finished");

    println!();
    if failed > 0 {
        anyhow::bail!("{failed} resource(s) failed to apply");
    }
    if cancel.is_cancelled() {
        anyhow::bail!("apply interrupted");
    }
    println!("{}", "✓ Apply complete".green().bold());
    Ok(())
}
