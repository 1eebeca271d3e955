//! Snapshot round trip: a hand-written JSON repository evaluated through the library and through
//! the `vfsguard_check` binary.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::Command;
use std::sync::Arc;

use vfsguard::config::EffectiveConfig;
use vfsguard::identity::RequestContext;
use vfsguard::model::permissions::ACCESS_WRITE;
use vfsguard::model::ResourceFilter;
use vfsguard::roles::ProcessRoleCache;
use vfsguard::store::load_snapshot;
use vfsguard::{CheckResult, SecurityManager};

const TOWN: &str = r#"{
    "project": { "name": "Offline", "ou": "town" },
    "org_units": [ { "fqn": "town", "resources": ["/town/"] } ],
    "groups": [ { "name": "town/Editors" }, { "name": "town/RoleDevelopers" } ],
    "users": [
        { "name": "town/u", "groups": ["town/Editors", "town/RoleDevelopers"] },
        { "name": "town/locker", "groups": ["town/Editors", "town/RoleDevelopers"] }
    ],
    "resources": [
        { "path": "/town/" },
        { "path": "/town/site/" },
        { "path": "/town/site/page.jsp", "type": "jsp" },
        { "path": "/town/site/other.jsp", "type": "jsp" }
    ],
    "aces": [ { "path": "/town/", "principal": "group:town/Editors", "permissions": "+r+w+v", "inherit": true } ],
    "locks": [ { "path": "/town/site/other.jsp", "owner": "town/locker" } ]
}"#;

fn snapshot_file() -> Result<tempfile::NamedTempFile> {
    let mut f = tempfile::NamedTempFile::new()?;
    f.write_all(TOWN.as_bytes())?;
    Ok(f)
}

#[test]
fn snapshot_decision_through_library() -> Result<()> {
    let file = snapshot_file()?;
    let loaded = load_snapshot(file.path())?;
    let u = loaded.user("town/u")?;
    let locker = loaded.user("town/locker")?;
    let project = loaded.project.clone();
    let repo = Arc::new(loaded.repository);
    let gate = SecurityManager::new(repo.clone(), Arc::new(loaded.principals), EffectiveConfig::default())
        .with_role_cache(Arc::new(ProcessRoleCache::with_capacity(100)));

    let page = repo.resource("/town/site/page.jsp").context("page missing")?;
    let other = repo.resource("/town/site/other.jsp").context("other missing")?;
    let ctx = RequestContext::new(u, project);
    assert_eq!(gate.has_permissions(&ctx, &page, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT)?, CheckResult::NotLocked { holder: None });
    assert_eq!(gate.has_permissions(&ctx, &other, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT)?, CheckResult::NotLocked { holder: Some(locker.id) });
    let err = gate.check_permissions(&ctx, &other, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT).err().context("expected a lock violation")?;
    assert_eq!(err.to_string(), "lock violation on /town/site/other.jsp: not locked by the current user (held by town/locker)");
    Ok(())
}

fn run_check(args: &[&str]) -> Result<serde_json::Value> {
    let out = Command::new(env!("CARGO_BIN_EXE_vfsguard_check")).args(args).output()?;
    assert!(out.status.success(), "vfsguard_check failed: {}", String::from_utf8_lossy(&out.stderr));
    Ok(serde_json::from_slice(&out.stdout)?)
}

#[test]
fn check_binary_prints_decision_json() -> Result<()> {
    let file = snapshot_file()?;
    let path = file.path().to_string_lossy().to_string();

    let locked = run_check(&[path.as_str(), "town/u", "/town/site/page.jsp", "+w", "--lock"])?;
    assert_eq!(locked["decision"]["result"], "not_locked");
    assert_eq!(locked["effective"], "+r+w+v");

    let unlocked = run_check(&[path.as_str(), "town/u", "/town/site/page.jsp", "+w"])?;
    assert_eq!(unlocked["decision"]["result"], "allowed");

    let denied = run_check(&[path.as_str(), "town/u", "/town/site/page.jsp", "+c", "--filter", "all"])?;
    assert_eq!(denied["decision"]["result"], "denied");
    Ok(())
}

#[test]
fn check_binary_rejects_bad_arguments() -> Result<()> {
    let file = snapshot_file()?;
    let path = file.path().to_string_lossy().to_string();
    for args in [vec![path.as_str(), "town/u"], vec![path.as_str(), "town/nobody", "/town/", "+r"], vec![path.as_str(), "town/u", "/town/", "+q"]] {
        let out = Command::new(env!("CARGO_BIN_EXE_vfsguard_check")).args(&args).output()?;
        assert!(!out.status.success(), "{:?} should fail", args);
    }
    Ok(())
}
