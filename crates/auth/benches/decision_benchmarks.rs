use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use std::sync::Arc;

use nexus_auth::policy::{self, Request};
use nexus_auth::{
    Action, Authorizer, DecisionCache, Resource, Role, Scope, SnapshotPermissionStore, seed,
};

fn authorizer(cached: bool) -> Authorizer {
    let directory = Arc::new(seed::demo_directory());
    let store = Arc::new(SnapshotPermissionStore::new(seed::bootstrap_snapshot()));
    let authz = Authorizer::new(directory, store);
    if cached {
        authz.with_cache(DecisionCache::default())
    } else {
        authz
    }
}

/// Fast-path hit vs a request that falls through to the store.
fn bench_policy_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_evaluation");
    let store = SnapshotPermissionStore::new(seed::bootstrap_snapshot());

    let cases = [
        ("owner_override", Request::new(Role::Owner, Action::Delete, Resource::Sales, Scope::Any)),
        (
            "operational_access",
            Request::new(Role::Warehouse, Action::Read, Resource::Sales, Scope::Operation),
        ),
        (
            "stored_grant_lookup",
            Request::new(Role::Staff, Action::Edit, Resource::Material, Scope::Operation),
        ),
    ];

    for (name, req) in cases.iter() {
        group.bench_with_input(BenchmarkId::new("evaluate", name), req, |b, req| {
            b.iter(|| policy::evaluate(black_box(req), &store));
        });
    }

    group.finish();
}

fn bench_cached_vs_uncached(c: &mut Criterion) {
    let mut group = c.benchmark_group("authorizer_decide");
    let user = seed::demo_user_id(Role::Staff);

    for cached in [false, true] {
        let authz = authorizer(cached);
        authz.warm_cache();
        group.bench_function(if cached { "cached" } else { "uncached" }, |b| {
            b.iter(|| {
                authz.decide(
                    black_box(&user),
                    Action::Edit,
                    Resource::Material,
                    Scope::Operation,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_policy_evaluation, bench_cached_vs_uncached);
criterion_main!(benches);
