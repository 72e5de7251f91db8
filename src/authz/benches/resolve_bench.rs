use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;
use uuid::Uuid;

use lattice_core::{Permission, ScopeType, UserId};
use lattice_hierarchy::TreePath;

use lattice_authz::{
    AccessGrant, AccessRequest, GrantStore, InMemoryGrantStore, InMemoryRoleStore,
    PermissionResolver, Role, RoleCatalog,
};

async fn setup(grant_count: usize) -> (PermissionResolver, UserId) {
    let roles = Arc::new(RoleCatalog::new(Arc::new(InMemoryRoleStore::new())));
    roles
        .save(Role::new("VIEWER", "Viewer").grant(Permission::CanViewAllEmployees))
        .await
        .unwrap();
    roles
        .save(
            Role::new("DEPT_MGR", "Department Manager")
                .inheriting("VIEWER")
                .grant(Permission::CanApproveLeave),
        )
        .await
        .unwrap();

    let grants = Arc::new(InMemoryGrantStore::new());
    let user = Uuid::new_v4();
    for i in 0..grant_count {
        let anchor = TreePath::from_segments(&[((i % 999) + 1) as u16]).unwrap();
        grants
            .put(
                AccessGrant::new(user, "DEPT_MGR", ScopeType::Department).scoped_to(anchor),
            )
            .await
            .unwrap();
    }

    (PermissionResolver::new(grants, roles), user)
}

fn bench_resolve(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolve");

    for grant_count in [1usize, 16, 128] {
        let (resolver, user) = rt.block_on(setup(grant_count));
        let request = AccessRequest::new(user, Permission::CanApproveLeave, ScopeType::Department)
            .on_path(TreePath::parse("001.001").unwrap());

        group.bench_function(format!("{grant_count}_grants"), |b| {
            b.to_async(&rt)
                .iter(|| async { resolver.resolve(&request).await.unwrap() });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
