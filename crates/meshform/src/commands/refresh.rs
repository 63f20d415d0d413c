use crate::context::{self, Project};
use colored::Colorize;
use meshform_cloud::Reconciler;

pub async fn handle(project: &Project, target: Option<&str>) -> anyhow::Result<()> {
    let resources = project.select(target)?;
    let (client, settings) = context::connect().await?;
    let cancel = context::cancellation();

    let manager = project.state_manager(Some(&settings));
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    for desired in resources {
        let reconciler = Reconciler::for_config(desired)?;
        context::record(&mut state, &reconciler, &client, desired, (None, None), &cancel).await;
        let status = if state.get(desired.family(), desired.name()).is_some() {
            "stored".green()
        } else {
            "absent".yellow()
        };
        println!("  {} '{}': {}", desired.family(), desired.name(), status);
    }

    manager.save(&state).await?;
    lock.release().await?;
    println!(
        "{} {}",
        "✓ Snapshots written to".green(),
        manager.state_dir().display()
    );
    Ok(())
}
