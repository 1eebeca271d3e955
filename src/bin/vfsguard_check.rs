//!
//! vfsguard_check
//! --------------
//! Loads a JSON repository snapshot into the in-memory stores and explains one
//! permission decision: prints the `CheckResult` and the user's effective
//! permissions on the resource as a single JSON document.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use vfsguard::config::EffectiveConfig;
use vfsguard::identity::RequestContext;
use vfsguard::model::{PermissionSet, ResourceFilter};
use vfsguard::roles::ProcessRoleCache;
use vfsguard::security::hooks::register_tracing_audit;
use vfsguard::store::load_snapshot;
use vfsguard::SecurityManager;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} <snapshot.json> <user> <path> <perms> [--lock] [--filter all|default|visible] [--config <repo.json>]\n\nArguments:\n  user     OU-qualified user name, e.g. town/jane\n  perms    required permission string, e.g. +r+w\n\nExamples:\n  {program} repo.json town/jane /town/site/page.jsp +w --lock\n  RUST_LOG=vfsguard=debug {program} repo.json Guest /index.html +r+v"
    );
}

struct Args {
    snapshot: String,
    user: String,
    path: String,
    required: PermissionSet,
    check_lock: bool,
    filter: ResourceFilter,
    config: Option<String>,
}

fn parse_filter(name: &str) -> Result<ResourceFilter> {
    Ok(match name {
        "all" => ResourceFilter::ALL,
        "default" => ResourceFilter::DEFAULT,
        "visible" => ResourceFilter::ONLY_VISIBLE,
        other => bail!("unknown filter '{}'", other),
    })
}

fn parse_args(argv: &[String]) -> Result<Args> {
    let mut positional: Vec<&str> = Vec::new();
    let mut check_lock = false;
    let mut filter = ResourceFilter::DEFAULT;
    let mut config = None;
    let mut it = argv.iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--lock" => check_lock = true,
            "--filter" => filter = parse_filter(it.next().ok_or_else(|| anyhow!("--filter needs a value"))?)?,
            "--config" => config = Some(it.next().ok_or_else(|| anyhow!("--config needs a file"))?.clone()),
            s if s.starts_with("--") => bail!("unknown option '{}'", s),
            s => positional.push(s),
        }
    }
    let [snapshot, user, path, perms] = positional.as_slice() else {
        bail!("expected 4 positional arguments, got {}", positional.len());
    };
    let required: PermissionSet = perms.parse().with_context(|| format!("invalid permission string '{}'", perms))?;
    Ok(Args { snapshot: snapshot.to_string(), user: user.to_string(), path: path.to_string(), required, check_lock, filter, config })
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    register_tracing_audit();

    let argv: Vec<String> = env::args().collect();
    let program = argv.first().cloned().unwrap_or_else(|| "vfsguard_check".to_string());
    let args = match parse_args(&argv[1.min(argv.len())..]) {
        Ok(a) => a,
        Err(e) => {
            print_usage(&program);
            return Err(e);
        }
    };

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
            EffectiveConfig::from_json_layers("", &text)?
        }
        None => EffectiveConfig::default(),
    };

    let loaded = load_snapshot(&args.snapshot)?;
    let user = loaded.user(&args.user)?;
    info!(target: "vfsguard::check", "loaded {} as project '{}'", args.snapshot, loaded.project.name);

    let project = loaded.project.clone();
    let repository = Arc::new(loaded.repository);
    let principals = Arc::new(loaded.principals);
    let cache = Arc::new(ProcessRoleCache::with_capacity(config.role_cache_max_entries));
    let manager = SecurityManager::new(repository.clone(), principals, config).with_role_cache(cache);

    let Some(resource) = repository.resource(&args.path) else {
        bail!("no resource at '{}' in snapshot", args.path);
    };
    let ctx = RequestContext::new(user.clone(), project).with_request_id(&uuid::Uuid::new_v4().to_string());
    let result = manager.has_permissions(&ctx, &resource, &args.required, args.check_lock, &args.filter)?;
    let effective = manager.resolver().effective_permissions(&user, &resource)?;

    let doc = serde_json::json!({
        "user": user.fqn(),
        "path": resource.root_path,
        "required": args.required.to_string(),
        "check_lock": args.check_lock,
        "effective": effective.to_string(),
        "decision": result,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
