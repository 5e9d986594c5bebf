use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use webframe::request::Request;

fn simple_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test\r\n\r\n";

    c.bench_function("simple_request_parse", |b| {
        b.iter(|| {
            let _ = Request::try_from(black_box(request.as_slice()), 0).unwrap();
        });
    });
}

fn complex_request_parse_benchmark(c: &mut Criterion) {
    let request = b"GET /path/to/resource?id=123&name=test&tags=a&tags=b HTTP/1.1\r\n\
                    Host: localhost:7878\r\n\
                    User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64)\r\n\
                    Accept: text/html,application/xhtml+xml\r\n\
                    Accept-Language: en-US,en;q=0.9\r\n\
                    Accept-Encoding: gzip, deflate, br\r\n\
                    Cookie: _xsrf=abc; WEBFRAME_SESSID=0123456789\r\n\
                    Connection: keep-alive\r\n\
                    \r\n";

    c.bench_function("complex_request_parse", |b| {
        b.iter(|| {
            let _ = Request::try_from(black_box(request.as_slice()), 0).unwrap();
        });
    });
}

fn request_parse_different_methods_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse_methods");

    let requests = [
        ("GET", b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice()),
        ("HEAD", b"HEAD / HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice()),
        ("POST", b"POST / HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice()),
        ("DELETE", b"DELETE /user/1 HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice()),
    ];

    for (method, request) in requests.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(method), request, |b, request| {
            b.iter(|| {
                let _ = Request::try_from(black_box(*request), 0).unwrap();
            });
        });
    }

    group.finish();
}

fn request_parse_form_body_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse_form");

    for fields in [1, 10, 100].iter() {
        let body: Vec<String> = (0..*fields).map(|i| format!("field{}=value%20{}", i, i)).collect();
        let body = body.join("&");
        let request = format!(
            "POST /user/save HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        group.bench_with_input(BenchmarkId::from_parameter(fields), &request, |b, request| {
            b.iter(|| {
                let _ = Request::try_from(black_box(request.as_bytes()), 0).unwrap();
            });
        });
    }

    group.finish();
}

fn request_parse_multipart_benchmark(c: &mut Criterion) {
    let body = "--XYZ\r\n\
                Content-Disposition: form-data; name=\"name\"\r\n\r\n\
                alice\r\n\
                --XYZ\r\n\
                Content-Disposition: form-data; name=\"avatar\"; filename=\"a.txt\"\r\n\
                Content-Type: text/plain\r\n\r\n\
                hello world\r\n\
                --XYZ--\r\n";
    let request = format!(
        "POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary=XYZ\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    c.bench_function("multipart_request_parse", |b| {
        b.iter(|| {
            let _ = Request::try_from(black_box(request.as_bytes()), 0).unwrap();
        });
    });
}

criterion_group!(
    benches,
    simple_request_parse_benchmark,
    complex_request_parse_benchmark,
    request_parse_different_methods_benchmark,
    request_parse_form_body_benchmark,
    request_parse_multipart_benchmark
);
criterion_main!(benches);
