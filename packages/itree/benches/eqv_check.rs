use criterion::{black_box, criterion_group, criterion_main, Criterion};
use itree::{strong_eq, trigger, weak_eq, Event, Tree};

#[derive(Clone, Debug, PartialEq)]
enum Io {
    Read,
    Write(u32),
}

impl Event for Io {
    type Response = u32;

    fn responses(&self) -> Vec<u32> {
        match self {
            Io::Read => (0..8).collect(),
            Io::Write(_) => vec![0],
        }
    }
}

type T = Tree<Io, u32>;

/// A server loop: read a request, write a reply, with `slack` silent steps
/// before each reply.
fn server(slack: usize) -> T {
    Tree::fix(move |this| {
        trigger(Io::Read).bind(move |request| {
            let this = this.clone();
            Tree::effect(Io::Write(request + 1), move |_| this.clone()).delay(slack)
        })
    })
}

/// `n` reads bound left-nested, summing the responses.
fn left_nested_reads(n: usize) -> T {
    (0..n).fold(T::leaf(0), |acc, _| {
        acc.bind(|sum| trigger(Io::Read).map(move |v| (sum + v) % 2))
    })
}

fn bench_strong_server(c: &mut Criterion) {
    c.bench_function("strong_eq_server_loop", |b| {
        b.iter(|| strong_eq(black_box(&server(0)), black_box(&server(0))))
    });
}

fn bench_weak_server(c: &mut Criterion) {
    c.bench_function("weak_eq_server_loop_slack_8", |b| {
        b.iter(|| weak_eq(black_box(&server(0)), black_box(&server(8))))
    });
}

fn bench_left_nested_binds(c: &mut Criterion) {
    c.bench_function("strong_eq_left_nested_binds_3", |b| {
        b.iter(|| {
            let t = left_nested_reads(3);
            strong_eq(black_box(&t), black_box(&t))
        })
    });
}

criterion_group!(
    benches,
    bench_strong_server,
    bench_weak_server,
    bench_left_nested_binds
);
criterion_main!(benches);
