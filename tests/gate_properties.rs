//! Gate integration tests: decision properties exercised through the public API with the
//! in-memory collaborators.

use anyhow::Result;
use std::sync::Arc;

use vfsguard::config::EffectiveConfig;
use vfsguard::identity::{Group, OrgUnit, RequestContext, User};
use vfsguard::model::permissions::{ACCESS_READ, ACCESS_WRITE};
use vfsguard::model::{AccessControlEntry, AceFlags, AcePrincipal, Project, Resource, ResourceFilter, ResourceState, SiblingMode};
use vfsguard::roles::{CacheEvent, ProcessRoleCache, Role, RoleKind};
use vfsguard::security::PublishList;
use vfsguard::store::{MemoryPrincipals, MemoryRepository};
use vfsguard::{CheckResult, SecurityError, SecurityManager};

struct Env {
    repo: Arc<MemoryRepository>,
    principals: Arc<MemoryPrincipals>,
    gate: SecurityManager,
}

fn env() -> Env {
    let repo = Arc::new(MemoryRepository::new());
    let principals = Arc::new(MemoryPrincipals::new());
    let gate = SecurityManager::new(repo.clone(), principals.clone(), EffectiveConfig::default())
        .with_role_cache(Arc::new(ProcessRoleCache::with_capacity(1_000)));
    Env { repo, principals, gate }
}

impl Env {
    fn grant(&self, resource: &Resource, principal: AcePrincipal, perms: &str, inherit: bool) -> Result<()> {
        let flags = if inherit { AceFlags::INHERIT } else { AceFlags::empty() };
        self.repo.add_ace(AccessControlEntry::new(resource.resource_id, principal, perms.parse()?).with_flags(flags));
        Ok(())
    }

    fn group(&self, ou: &str, name: &str) -> Group { self.principals.add_group(Group::new(ou, name)) }

    fn role_group(&self, ou: &str, kind: RoleKind) -> Group { self.principals.add_group(Group::role_group(ou, kind.group_name())) }

    fn user(&self, ou: &str, name: &str, groups: &[&Group]) -> User {
        let user = groups.iter().fold(User::new(ou, name), |u, g| u.with_group(g));
        self.principals.add_user(user)
    }

    fn root(&self) -> Resource {
        match self.repo.resource("/") {
            Some(r) => r,
            None => panic!("memory repository has no root folder"),
        }
    }
}

fn offline(user: &User, ou: &str) -> RequestContext { RequestContext::new(user.clone(), Project::offline("Offline", ou)) }

#[test]
fn denied_decision_never_passes_blocking_check() -> Result<()> {
    let e = env();
    let readers = e.group("", "Readers");
    let writers = e.group("", "Writers");
    e.grant(&e.root(), AcePrincipal::Group(readers.id), "+r+v", true)?;
    e.grant(&e.root(), AcePrincipal::Group(writers.id), "+r+w+v", true)?;
    let users = [e.user("", "reader", &[&readers]), e.user("", "writer", &[&writers]), e.user("", "nobody", &[])];
    let resources = [e.repo.add_published(Resource::file("/a.txt")), e.repo.add_published(Resource::jsp("/b.jsp")), e.repo.add_published(Resource::folder("/c/"))];
    let required = [ACCESS_READ, ACCESS_WRITE, "+r+w+c".parse()?];

    for user in &users {
        for res in &resources {
            for req in &required {
                let ctx = offline(user, "");
                let decision = e.gate.has_permissions(&ctx, res, req, false, &ResourceFilter::ALL)?;
                let blocking = e.gate.check_permissions(&ctx, res, req, false, &ResourceFilter::ALL);
                match decision {
                    CheckResult::Denied { .. } => assert!(matches!(blocking, Err(SecurityError::PermissionViolation { .. })), "{} {} {}", user.fqn(), res.root_path, req),
                    CheckResult::Allowed => assert!(blocking.is_ok()),
                    other => panic!("unexpected {:?}", other),
                }
            }
        }
    }
    Ok(())
}

#[test]
fn filtered_precedes_denied() -> Result<()> {
    let e = env();
    let nobody = e.user("", "nobody", &[]);
    let hidden = e.repo.add_resource(Resource::file("/hidden.txt").with_state(ResourceState::Deleted));
    let ctx = offline(&nobody, "");
    assert_eq!(e.gate.has_permissions(&ctx, &hidden, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT)?, CheckResult::Filtered);
    assert!(matches!(e.gate.check_permissions(&ctx, &hidden, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT), Err(SecurityError::NotFound { .. })));
    Ok(())
}

#[test]
fn role_ancestors_hold_for_enclosing_ou_only() -> Result<()> {
    let e = env();
    // Administrator is an ancestor of VfsManager, which is an ancestor of Developer
    let admins = e.role_group("x", RoleKind::Administrator);
    let devs = e.role_group("x/y", RoleKind::Developer);
    let admin = e.user("x", "admin", &[&admins]);
    let dev = e.user("x/y", "dev", &[&devs]);

    assert!(e.gate.has_role(&admin, &Role::DEVELOPER.for_org_unit(Some("x/y")))?);
    assert!(e.gate.has_role(&admin, &Role::VFS_MANAGER.for_org_unit(Some("x")))?);
    assert!(!e.gate.has_role(&admin, &Role::DEVELOPER.for_org_unit(Some("z")))?);
    assert!(!e.gate.has_role(&dev, &Role::ADMINISTRATOR.for_org_unit(Some("x/y")))?);
    assert!(!e.gate.has_role(&dev, &Role::DEVELOPER.for_org_unit(Some("x")))?);
    Ok(())
}

#[test]
fn has_role_twice_reads_memberships_once() -> Result<()> {
    let e = env();
    let eds = e.role_group("town", RoleKind::Editor);
    let jane = e.user("town", "jane", &[&eds]);
    let role = Role::WORKPLACE_USER.for_org_unit(Some("town/north"));
    let first = e.gate.has_role(&jane, &role)?;
    let reads = e.principals.membership_reads();
    let second = e.gate.has_role(&jane, &role)?;
    assert_eq!(first, second);
    assert!(first);
    assert_eq!(e.principals.membership_reads(), reads);

    e.principals.remove_user_from_group(jane.id, eds.id)?;
    e.gate.notify(CacheEvent::MembershipChanged { principal: Some(jane.id) });
    assert!(!e.gate.has_role(&jane, &role)?);
    Ok(())
}

#[test]
fn remove_siblings_deletes_once_per_resource_id() -> Result<()> {
    let e = env();
    let writers = e.group("", "Writers");
    let jane = e.user("", "jane", &[&writers]);
    e.grant(&e.root(), AcePrincipal::Group(writers.id), "+r+w+v", true)?;
    let folder = e.repo.add_published(Resource::folder("/f/"));
    let one = e.repo.add_published(Resource::file("/f/one.txt"));
    let two = e.repo.add_published(one.sibling("/f/two.txt"));
    let ctx = offline(&jane, "");
    e.gate.lock_resource(&ctx, &folder, vfsguard::model::LockKind::Exclusive)?;

    e.gate.delete_resource(&ctx, &folder, SiblingMode::RemoveSiblings)?;
    assert_eq!(e.repo.delete_calls(one.resource_id), 1);
    assert_eq!(two.resource_id, one.resource_id);
    assert_eq!(e.repo.total_delete_calls(), 2);
    Ok(())
}

#[test]
fn move_uses_pre_move_children() -> Result<()> {
    let e = env();
    let writers = e.group("", "Writers");
    let jane = e.user("", "jane", &[&writers]);
    e.grant(&e.root(), AcePrincipal::Group(writers.id), "+r+w+v", true)?;
    let a = e.repo.add_published(Resource::folder("/a/"));
    e.repo.add_published(Resource::file("/a/c"));
    let ctx = offline(&jane, "");
    e.gate.lock_resource(&ctx, &a, vfsguard::model::LockKind::Exclusive)?;

    let outcome = e.gate.move_resource(&ctx, &a, "/b/")?;
    assert_eq!(e.repo.moves(), vec![("/a/".to_string(), "/b/".to_string()), ("/a/c".to_string(), "/b/c".to_string())]);
    assert_eq!(outcome.touched, vec!["/b/", "/b/c"]);
    Ok(())
}

#[test]
fn publish_violations_are_aggregated() -> Result<()> {
    let e = env();
    let writers = e.group("", "Writers");
    let jane = e.user("", "jane", &[&writers]);
    e.grant(&e.root(), AcePrincipal::Group(writers.id), "+r+w+v", true)?;
    let one = e.repo.add_published(Resource::file("/one.txt"));
    let two = e.repo.add_published(Resource::file("/two.txt"));

    let err = match e.gate.check_publish_permissions(&offline(&jane, ""), &PublishList::direct(vec![one, two])) {
        Err(err) => err,
        Ok(()) => panic!("publish without direct publish permission succeeded"),
    };
    let SecurityError::Aggregate(inner) = &err else { panic!("expected aggregate, got {}", err) };
    assert_eq!(inner.len(), 2);
    assert!(inner.iter().all(|v| matches!(v, SecurityError::PermissionViolation { .. })));
    assert_eq!(err.to_string(), "2 security violations");
    Ok(())
}

#[test]
fn editor_with_developer_role_needs_the_lock_on_a_jsp() -> Result<()> {
    let e = env();
    e.principals.add_org_unit(OrgUnit::new("town", &["/town/"]));
    let editors = e.group("town", "Editors");
    let devs = e.role_group("town", RoleKind::Developer);
    let u = e.user("town", "u", &[&editors, &devs]);
    let town = e.repo.add_published(Resource::folder("/town/"));
    e.repo.add_published(Resource::folder("/town/site/"));
    let page = e.repo.add_published(Resource::jsp("/town/site/page.jsp"));
    e.grant(&town, AcePrincipal::Group(editors.id), "+r+w+v", true)?;

    let ctx = RequestContext::new(u.clone(), Project::offline("Offline", "town"));
    assert_eq!(e.gate.has_permissions(&ctx, &page, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT)?, CheckResult::NotLocked { holder: None });
    assert_eq!(e.gate.has_permissions(&ctx, &page, &ACCESS_WRITE, false, &ResourceFilter::DEFAULT)?, CheckResult::Allowed);

    // Same principal without the developer role cannot write the JSP at all
    let plain = e.user("town", "plain", &[&editors]);
    let plain_ctx = RequestContext::new(plain, Project::offline("Offline", "town"));
    assert!(matches!(e.gate.has_permissions(&plain_ctx, &page, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT)?, CheckResult::Denied { .. }));

    e.gate.lock_resource(&ctx, &page, vfsguard::model::LockKind::Exclusive)?;
    assert_eq!(e.gate.has_permissions(&ctx, &page, &ACCESS_WRITE, true, &ResourceFilter::DEFAULT)?, CheckResult::Allowed);
    Ok(())
}

#[test]
fn online_project_blocks_every_mutation() -> Result<()> {
    let e = env();
    let vfs = e.role_group("", RoleKind::VfsManager);
    let boss = e.user("", "boss", &[&vfs]);
    let doc = e.repo.add_published(Resource::file("/doc.txt"));
    let ctx = RequestContext::new(boss, Project::online());
    for result in [
        e.gate.lock_resource(&ctx, &doc, vfsguard::model::LockKind::Exclusive).map(|_| ()),
        e.gate.delete_resource(&ctx, &doc, SiblingMode::PreserveSiblings).map(|_| ()),
        e.gate.move_resource(&ctx, &doc, "/moved.txt").map(|_| ()),
        e.gate.check_publish_permissions(&ctx, &PublishList::project()),
    ] {
        match result {
            Err(err) => assert_eq!(err.code_str(), "state_violation"),
            Ok(()) => panic!("mutation succeeded in the online project"),
        }
    }
    assert!(e.gate.read_resource(&ctx, "/doc.txt", &ResourceFilter::DEFAULT).is_ok());
    Ok(())
}
