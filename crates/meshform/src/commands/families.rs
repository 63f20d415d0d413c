use colored::Colorize;
use meshform_cloud::catalog;

pub fn handle() -> anyhow::Result<()> {
    for schema in catalog::families() {
        println!("{}", schema.family.cyan().bold());
        println!("  remote kind: {}", schema.remote_kind);
        println!("  key field:   {}", schema.key_field);
        println!("  clouds:      {}", schema.clouds);
        if let Some(ha) = &schema.ha {
            println!("  HA:          {} (suffix '{}')", ha.kind, ha.suffix);
        }
    }
    Ok(())
}
