#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: TestRequest,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, request: TestRequest) -> Self {
        Self { name, group, request }
    }

    pub fn exact(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Exact, request)
    }

    pub fn variable(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Variable, request)
    }

    pub fn wildcard(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Wildcard, request)
    }

    pub fn miss(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Miss, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &TestRequest {
        &self.request
    }

    pub fn path(&self) -> &'static str {
        self.request().path
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestRequest {
    method: &'static str,
    path: &'static str,
}

impl TestRequest {
    pub const fn new(method: &'static str, path: &'static str) -> Self {
        Self { method, path }
    }

    pub const fn get(path: &'static str) -> Self {
        Self::new("GET", path)
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

/// Which kind of route a case is expected to hit.
#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Exact,
    Variable,
    Wildcard,
    Miss,
}

/// Route patterns registered by the benchmarks, in registration order.
pub const ROUTES: &[(&str, &str)] = &[
    ("GET", "/hello"),
    ("GET", "/getTest1"),
    ("GET", "/getTest2"),
    ("GET", "/getTest3"),
    ("POST", "/postTest1"),
    ("POST", "/postTest2"),
    ("POST", "/postTest3"),
    ("POST", "/postTest4"),
    ("GET", "/test/**"),
    ("GET", "/user/{id}"),
    ("PUT", "/user/{id}"),
    ("DELETE", "/user/{id}"),
    ("POST", "/user"),
    ("POST", "/upload"),
    ("GET", "/org/{org}/repo/{repo}/issues/{issue}"),
    ("GET", "/private/**"),
];

pub fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::exact("exact_first", TestRequest::get("/hello")),
        TestCase::exact("exact_last", TestRequest::new("POST", "/upload")),
        TestCase::variable("one_variable", TestRequest::get("/user/42")),
        TestCase::variable("three_variables", TestRequest::get("/org/rust-lang/repo/cargo/issues/1024")),
        TestCase::wildcard("multi_wildcard", TestRequest::get("/test/123/456/789")),
        TestCase::miss("not_found", TestRequest::get("/nothing/here")),
        TestCase::miss("method_not_allowed", TestRequest::new("PATCH", "/user/42")),
    ]
}
