/// A route table and the request paths looked up in it.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    table: RouteTable,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, table: RouteTable) -> Self {
        Self { name, group, table }
    }

    pub fn small(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Small, table)
    }

    pub fn normal(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Normal, table)
    }

    pub fn large(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Large, table)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }
}

/// Route patterns in `{name}` capture syntax, and paths that all resolve against them.
#[derive(Debug, Copy, Clone)]
pub struct RouteTable {
    patterns: &'static [&'static str],
    paths: &'static [&'static str],
}

impl RouteTable {
    pub const fn new(patterns: &'static [&'static str], paths: &'static [&'static str]) -> Self {
        Self { patterns, paths }
    }

    pub fn patterns(&self) -> &'static [&'static str] {
        self.patterns
    }

    pub fn paths(&self) -> &'static [&'static str] {
        self.paths
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub static FLAT: RouteTable = RouteTable::new(
    &["/health", "/users", "/orders", "/products", "/carts"],
    &["/health", "/users", "/orders", "/products", "/carts"],
);

pub static CAPTURES: RouteTable = RouteTable::new(
    &[
        "/users",
        "/users/me",
        "/users/{id}",
        "/users/{id}/orders",
        "/users/{id}/orders/{order}",
        "/users/{id}/orders/{order}/items/{item}",
        "/products/{sku}",
        "/products/{sku}/reviews",
    ],
    &[
        "/users/me",
        "/users/42",
        "/users/42/orders",
        "/users/42/orders/7",
        "/users/42/orders/7/items/3",
        "/products/ab-12/reviews",
    ],
);

pub static DEEP: RouteTable = RouteTable::new(
    &[
        "/repos/{owner}/{repo}",
        "/repos/{owner}/{repo}/issues",
        "/repos/{owner}/{repo}/issues/{number}",
        "/repos/{owner}/{repo}/issues/{number}/comments",
        "/repos/{owner}/{repo}/pulls",
        "/repos/{owner}/{repo}/pulls/{number}",
        "/repos/{owner}/{repo}/pulls/{number}/reviews",
        "/repos/{owner}/{repo}/pulls/{number}/reviews/{review}",
        "/repos/{owner}/{repo}/branches/{branch}",
        "/repos/{owner}/{repo}/branches/{branch}/protection",
        "/orgs/{org}",
        "/orgs/{org}/members",
        "/orgs/{org}/members/{user}",
        "/orgs/{org}/teams/{team}/repos/{owner}/{repo}",
    ],
    &[
        "/repos/foldright/micro-http/issues/12/comments",
        "/repos/foldright/micro-http/pulls/7/reviews/3",
        "/repos/foldright/micro-http/branches/main/protection",
        "/orgs/foldright/teams/core/repos/foldright/micro-http",
        "/orgs/foldright/members/zava",
    ],
);
