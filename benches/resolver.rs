use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, SamplingMode, Throughput};
use std::sync::Arc;

use vfsguard::config::EffectiveConfig;
use vfsguard::identity::{Group, RequestContext, User};
use vfsguard::model::permissions::{ACCESS_READ, ACCESS_WRITE};
use vfsguard::model::{AccessControlEntry, AceFlags, AcePrincipal, Lock, Project, Resource, ResourceFilter, SiblingMode};
use vfsguard::roles::{NoopRoleCache, ProcessRoleCache, Role, RoleKind};
use vfsguard::store::{MemoryPrincipals, MemoryRepository};
use vfsguard::{PermissionResolver, SecurityManager};

struct Tree {
    repo: Arc<MemoryRepository>,
    principals: Arc<MemoryPrincipals>,
    user: User,
    leaf: Resource,
}

/// A chain of `depth` folders with an inheritable group ACE on every level and a file at the bottom.
fn build_tree(depth: usize, fanout: usize) -> Tree {
    let repo = Arc::new(MemoryRepository::new());
    let principals = Arc::new(MemoryPrincipals::new());
    let writers = principals.add_group(Group::new("bench", "Writers"));
    let devs = principals.add_group(Group::role_group("bench", RoleKind::Developer.group_name()));
    let user = principals.add_user(User::new("bench", "user").with_group(&writers).with_group(&devs));

    let mut path = String::from("/");
    for level in 0..depth {
        path.push_str(&format!("l{}/", level));
        let folder = repo.add_published(Resource::folder(&path));
        let ace = AccessControlEntry::new(folder.resource_id, AcePrincipal::Group(writers.id), "+r+w+v".parse().expect("permission string"))
            .with_flags(AceFlags::INHERIT);
        repo.add_ace(ace);
        for f in 0..fanout {
            repo.add_published(Resource::file(&format!("{}f{}.txt", path, f)));
        }
    }
    let leaf = repo.add_published(Resource::file(&format!("{}leaf.txt", path)));
    repo.add_lock(Lock::exclusive("/l0/", user.id));
    Tree { repo, principals, user, leaf }
}

fn bench_has_permissions(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_permissions");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(30);

    for &depth in &[4usize, 16, 64] {
        let tree = build_tree(depth, 0);
        let resolver = PermissionResolver::new(tree.repo.clone(), tree.principals.clone(), EffectiveConfig::default())
            .with_role_cache(Arc::new(ProcessRoleCache::with_capacity(10_000)));
        let ctx = RequestContext::new(tree.user.clone(), Project::offline("bench", "bench"));

        group.bench_with_input(BenchmarkId::new("read", depth), &depth, |b, _| {
            b.iter(|| criterion::black_box(resolver.has_permissions(&ctx, &tree.leaf, &ACCESS_READ, false, &ResourceFilter::DEFAULT)));
        });
        group.bench_with_input(BenchmarkId::new("write_locked", depth), &depth, |b, _| {
            b.iter(|| criterion::black_box(resolver.has_permissions(&ctx, &tree.leaf, &ACCESS_WRITE, true, &ResourceFilter::ALL)));
        });
    }
    group.finish();
}

fn bench_role_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_role");
    let tree = build_tree(1, 0);
    let role = Role::DEVELOPER.for_org_unit(Some("bench/sub"));

    let cached = PermissionResolver::new(tree.repo.clone(), tree.principals.clone(), EffectiveConfig::default())
        .with_role_cache(Arc::new(ProcessRoleCache::with_capacity(10_000)));
    group.bench_function("process_cache", |b| b.iter(|| criterion::black_box(cached.has_role(&tree.user, &role))));

    let uncached = PermissionResolver::new(tree.repo.clone(), tree.principals.clone(), EffectiveConfig::default())
        .with_role_cache(Arc::new(NoopRoleCache));
    group.bench_function("no_cache", |b| b.iter(|| criterion::black_box(uncached.has_role(&tree.user, &role))));
    group.finish();
}

fn bench_delete_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_tree");
    group.sample_size(20);
    for &fanout in &[8usize, 64] {
        let depth = 4;
        group.throughput(Throughput::Elements((depth * (fanout + 1) + 1) as u64));
        group.bench_with_input(BenchmarkId::new("preserve_siblings", fanout), &fanout, |b, &fanout| {
            b.iter_batched(
                || build_tree(depth, fanout),
                |tree| {
                    let manager = SecurityManager::new(tree.repo.clone(), tree.principals.clone(), EffectiveConfig::default())
                        .with_role_cache(Arc::new(ProcessRoleCache::with_capacity(10_000)));
                    let ctx = RequestContext::new(tree.user.clone(), Project::offline("bench", "bench"));
                    let root = tree.repo.resource("/l0/");
                    if let Some(root) = root {
                        criterion::black_box(manager.delete_resource(&ctx, &root, SiblingMode::PreserveSiblings).ok());
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_has_permissions, bench_role_cache, bench_delete_tree);
criterion_main!(benches);
