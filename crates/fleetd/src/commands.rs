//! Subcommand handlers.
//!
//! Each handler prints its result as pretty JSON on stdout; logs go to stderr.

use std::io::Read;
use std::path::Path;

use anyhow::{Context as _, bail};
use fleet_core::{FleetConfig, KindSelection};
use fleet_inventory::Inventory;
use fleet_pool::{Criteria, CriteriaEvaluator, PoolAllocator};
use fleet_state::{InventoryDocument, StateStore};
use serde::Serialize;
use tracing::{info, warn};

/// Loaded configuration plus the opened state store.
pub struct Context {
    pub config: FleetConfig,
    pub store: StateStore,
}

impl Context {
    pub fn load(config_path: Option<&Path>, data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => FleetConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => FleetConfig::default(),
        };

        let db_path = config.db_path(data_dir);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = StateStore::open(&db_path)?;
        info!(path = ?db_path, "state store opened");

        Ok(Self { config, store })
    }

    fn inventory(&self) -> Inventory {
        Inventory::new(self.store.clone())
    }

    fn pool(&self) -> anyhow::Result<PoolAllocator> {
        let evaluator = CriteriaEvaluator::new().with_paths(self.config.criteria.paths.clone());
        let pool = PoolAllocator::discover(
            self.inventory(),
            self.config.pool.managed_group.as_deref(),
        )?
        .with_evaluator(evaluator);
        if self.config.pool.persist {
            Ok(pool.with_store(self.store.clone())?)
        } else {
            warn!("pool persistence disabled, reservations end with this process");
            Ok(pool)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turn `key=expr` arguments into criteria. Splits on the first `=` only.
pub fn parse_criteria(args: &[String]) -> anyhow::Result<Criteria> {
    let mut criteria = Criteria::new();
    for arg in args {
        let Some((key, expr)) = arg.split_once('=') else {
            bail!("criterion {arg:?} is not of the form key=expr");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("criterion {arg:?} has an empty key");
        }
        if criteria.insert(key.to_string(), expr.to_string()).is_some() {
            bail!("criterion {key} given more than once");
        }
    }
    Ok(criteria)
}

pub fn import(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let raw = if file == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?
    };
    let doc: InventoryDocument = serde_json::from_slice(&raw).context("parsing inventory document")?;
    if doc.is_empty() {
        warn!("inventory document is empty, nothing imported");
        return Ok(());
    }
    ctx.store.import(&doc)?;
    info!(
        nodes = doc.node.len(),
        groups = doc.group.len(),
        site = doc.site.is_some(),
        "inventory imported"
    );
    Ok(())
}

pub fn export(ctx: &Context, types: Option<&str>) -> anyhow::Result<()> {
    let selection = match types {
        Some(list) => KindSelection::parse_list(list)?,
        None => KindSelection::default(),
    };
    print_json(&ctx.store.export(&selection)?)
}

pub fn resolve(ctx: &Context, node: &str) -> anyhow::Result<()> {
    let resource = ctx.inventory().resolve_node(node)?.into_resource();
    resource.validate(Some(node))?;
    print_json(&resource)
}

pub fn status(ctx: &Context, node: &str) -> anyhow::Result<()> {
    print_json(&ctx.inventory().node_status(node)?)
}

pub async fn reserve(
    ctx: &Context,
    count: usize,
    criteria: &[String],
    owner: &str,
    instance: Option<String>,
) -> anyhow::Result<()> {
    let criteria = parse_criteria(criteria)?;
    let record = ctx
        .pool()?
        .reserve_with_instance(count, &criteria, owner, instance)
        .await?;
    print_json(&record)
}

pub async fn release(ctx: &Context, owner: &str, nodes: &[String], all: bool) -> anyhow::Result<()> {
    let pool = ctx.pool()?;
    let freed = if all {
        pool.release_all(owner).await?
    } else {
        pool.release(nodes, owner).await?;
        nodes.to_vec()
    };
    print_json(&freed)
}

pub async fn query(ctx: &Context, owner: &str) -> anyhow::Result<()> {
    print_json(&ctx.pool()?.query(owner).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn criteria_split_on_first_equals() {
        let criteria = parse_criteria(&args(&["memory=>=64", "cputype==~xeon", "arch=x86_64"])).unwrap();
        assert_eq!(criteria["memory"], ">=64");
        assert_eq!(criteria["cputype"], "=~xeon");
        assert_eq!(criteria["arch"], "x86_64");
    }

    #[test]
    fn criteria_rejects_bad_arguments() {
        assert!(parse_criteria(&args(&["memory"])).is_err());
        assert!(parse_criteria(&args(&["=64"])).is_err());
        assert!(parse_criteria(&args(&["arch=x86_64", "arch=ppc64le"])).is_err());
        assert!(parse_criteria(&[]).unwrap().is_empty());
    }

    #[test]
    fn context_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::load(None, Some(dir.path())).unwrap();
        assert!(dir.path().join(fleet_core::DB_FILE_NAME).exists());
        assert!(ctx.config.pool.persist);
    }

    #[tokio::test]
    async fn pool_honours_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("fleet.toml");
        std::fs::write(
            &config_path,
            "[pool]\nmanaged_group = \"pool\"\npersist = false\n\n[criteria.paths]\nmemory = \"hw.mem\"\n",
        )
        .unwrap();
        let ctx = Context::load(Some(&config_path), Some(dir.path())).unwrap();

        let doc: InventoryDocument = serde_json::from_value(serde_json::json!({
            "node": {
                "n1": {"groups": ["pool"], "attributes": {"hw": {"mem": "128"}}},
                "n2": {"groups": ["pool"], "attributes": {"hw": {"mem": "16"}}},
                "n3": {"groups": ["other"], "attributes": {"hw": {"mem": "512"}}}
            }
        }))
        .unwrap();
        ctx.store.import(&doc).unwrap();

        let pool = ctx.pool().unwrap();
        assert_eq!(pool.free_nodes().await.len(), 2);
        let criteria = parse_criteria(&args(&["memory=>=64"])).unwrap();
        let record = pool.reserve(1, &criteria, "ops").await.unwrap();
        assert_eq!(record.nodes, vec!["n1"]);
        assert!(ctx.store.list_reservations().unwrap().is_empty());
    }
}
