use crate::context::{self, Project};
use crate::output;
use colored::Colorize;
use meshform_cloud::{CloudType, Reconciler, catalog};

pub async fn handle(project: &Project, family: &str, name: &str, yes: bool) -> anyhow::Result<()> {
    let schema =
        catalog::family(family).ok_or_else(|| anyhow::anyhow!("unknown resource family '{family}'"))?;

    let (client, settings) = context::connect().await?;
    let cancel = context::cancellation();
    let manager = project.state_manager(Some(&settings));
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    // the snapshot's own cloud type wins once read; this only seeds decoding
    let cloud = project
        .manifest
        .get(family, name)
        .map(|d| d.cloud_type())
        .or_else(|| state.get(family, name).map(|s| s.cloud_type))
        .unwrap_or(CloudType::AWS);
    let reconciler = Reconciler::new(schema, cloud);

    let Some(observed) = reconciler.read(&client, name, &cancel).await? else {
        println!("{} '{}' does not exist on the controller", family, name);
        if state.remove(family, name).is_some() {
            manager.save(&state).await?;
        }
        lock.release().await?;
        return Ok(());
    };

    let plan = reconciler.plan_delete(&observed)?;
    println!();
    output::print_plan(&plan);
    println!();

    if !yes {
        println!(
            "{}",
            format!("Warning: {family} '{name}' will be deleted from {}.", settings.controller_url)
                .yellow()
        );
        println!("Pass --yes to delete it");
        lock.release().await?;
        return Ok(());
    }

    let result = reconciler.apply(&client, &plan, &cancel).await;
    match &result {
        Ok(report) => {
            output::print_report(&plan, report);
            state.remove(family, name);
        }
        Err(e) => output::print_failure(&plan, e),
    }
    manager.save(&state).await?;
    lock.release().await?;

    if project.manifest.contains(family, name) {
        println!(
            "{}",
            format!("Note: {family} '{name}' is still declared in {}", project.file.display())
                .yellow()
        );
    }
    result?;
    Ok(())
}
