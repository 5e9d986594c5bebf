use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use webframe::action::Handler;
use webframe::router::Router;
use webframe::{HttpRequestMethod, Scope};

fn build_router(routes: usize) -> Router {
    let mut router = Router::new();
    for i in 0..routes {
        router
            .add(&format!("/static/{}", i), &[HttpRequestMethod::Get], Handler::func(|_: &mut Scope<'_>| "ok"))
            .unwrap();
        router
            .add(
                &format!(r"/user{}/(\d+)", i),
                &[HttpRequestMethod::Get, HttpRequestMethod::Post],
                Handler::func(|_: &mut Scope<'_>| "ok"),
            )
            .unwrap();
    }
    router
}

fn exact_match_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_exact");

    for size in [10, 100, 1000].iter() {
        let router = build_router(*size);
        let path = format!("/static/{}", size - 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &path, |b, path| {
            b.iter(|| router.find(black_box(path), HttpRequestMethod::Get));
        });
    }

    group.finish();
}

fn regex_match_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_regex");

    for size in [10, 100, 1000].iter() {
        let router = build_router(*size);
        // 最后注册的正则路由，需要完整扫描
        let path = format!("/user{}/42", size - 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &path, |b, path| {
            b.iter(|| router.find(black_box(path), HttpRequestMethod::Get));
        });
    }

    group.finish();
}

fn miss_benchmark(c: &mut Criterion) {
    let router = build_router(100);
    c.bench_function("router_miss", |b| {
        b.iter(|| router.find(black_box("/nothing/here"), HttpRequestMethod::Get));
    });
}

criterion_group!(benches, exact_match_benchmark, regex_match_benchmark, miss_benchmark);
criterion_main!(benches);
