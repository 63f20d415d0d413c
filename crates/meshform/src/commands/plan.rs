use crate::context::{self, Project, Source};
use crate::output;
use colored::Colorize;
use meshform_config::ProviderSettings;

pub async fn handle(project: &Project, target: Option<&str>, offline: bool) -> anyhow::Result<()> {
    let resources = project.select(target)?;

    let planned = if offline {
        let settings = ProviderSettings::load().ok();
        let manager = project.state_manager(settings.as_ref());
        let state = manager.load().await?;
        println!(
            "{} {}",
            "Planning against stored snapshots in".blue(),
            manager.state_dir().display().to_string().cyan()
        );
        context::plan_all(&resources, Source::Stored(&state)).await?
    } else {
        let (client, settings) = context::connect().await?;
        println!(
            "{} {}",
            "Planning against".blue(),
            settings.controller_url.to_string().cyan()
        );
        let cancel = context::cancellation();
        context::plan_all(&resources, Source::Remote(&client, &cancel)).await?
    };

    println!();
    let mut total = 0;
    for p in &planned {
        output::print_plan(&p.plan);
        total += p.plan.operations.len();
    }

    println!();
    if total == 0 {
        println!("{}", "No changes.".green().bold());
    } else {
        println!(
            "{} operation(s) planned. Run {} to execute.",
            total.to_string().bold(),
            "meshform apply --yes".cyan()
        );
    }
    Ok(())
}
