use bencher::{ROUTES, TestCase, create_test_cases};
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::{Method, Request};
use http_body_util::Empty;
use micro_dispatch::binder::{HandlerSignature, ParamSpec};
use micro_dispatch::router::{PathPattern, Router, RouterItemBuilder, delete, get, post, put};
use micro_dispatch::{DispatchError, Dispatcher, HandlerArgs, RequestHandler, handler_fn};
use std::hint::black_box;

fn route(method: &str, handler: impl RequestHandler + 'static) -> RouterItemBuilder {
    match method {
        "POST" => post(handler),
        "PUT" => put(handler),
        "DELETE" => delete(handler),
        _ => get(handler),
    }
}

fn create_router() -> Router {
    let builder = ROUTES.iter().fold(Router::builder(), |builder, (method, pattern)| {
        let signature = if pattern.contains("{id}") {
            HandlerSignature::new().param(ParamSpec::string("id"))
        } else {
            HandlerSignature::new()
        };
        let handler = handler_fn(signature, |_args: HandlerArgs| async { Ok::<_, DispatchError>("ok") });
        builder.route(*pattern, route(method, handler))
    });
    builder.build().expect("benchmark routes are valid")
}

fn method(case: &TestCase) -> Method {
    Method::from_bytes(case.request().method().as_bytes()).expect("benchmark methods are valid")
}

fn benchmark_router_at(criterion: &mut Criterion) {
    let router = create_router();
    let mut group = criterion.benchmark_group("router_at");

    for case in create_test_cases() {
        let method = method(&case);
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| black_box(router.at(black_box(case.path()), &method).is_matched()));
        });
    }

    group.finish();
}

fn benchmark_pattern_matches(criterion: &mut Criterion) {
    let pattern = PathPattern::parse("/org/{org}/repo/{repo}/issues/{issue}").expect("pattern is valid");
    let mut group = criterion.benchmark_group("pattern_matches");

    group.bench_function("hit", |b| b.iter(|| black_box(pattern.matches(black_box("/org/rust-lang/repo/cargo/issues/1024")))));
    group.bench_function("miss", |b| b.iter(|| black_box(pattern.matches(black_box("/org/rust-lang/repo/cargo/pulls/1024")))));

    group.finish();
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime builds");
    let dispatcher = Dispatcher::builder().router(create_router()).build().expect("router is set");
    let mut group = criterion.benchmark_group("dispatch");

    for case in create_test_cases() {
        let method = method(&case);
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let request =
                    Request::builder().method(method.clone()).uri(case.path()).body(Empty::<Bytes>::new()).expect("valid request");
                black_box(runtime.block_on(dispatcher.dispatch(request)).status())
            });
        });
    }

    group.finish();
}

criterion_group!(router, benchmark_router_at, benchmark_pattern_matches, benchmark_dispatch);
criterion_main!(router);
