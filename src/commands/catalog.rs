use crate::render;
use anyhow::{Context as _, Result, anyhow};
use stackgraph::{Catalog, ResourceKind};

pub fn run(kind: Option<&str>) -> Result<()> {
    let catalog = Catalog::standard();

    if let Some(name) = kind {
        let kind: ResourceKind = name.parse().map_err(|e: String| anyhow!(e))?;
        let schema = catalog
            .get(kind)
            .with_context(|| format!("{kind} is not in the catalog"))?;
        print!("{}", render::schema_text(schema));
        return Ok(());
    }

    for (i, schema) in catalog.schemas().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", render::schema_text(schema));
    }
    Ok(())
}
