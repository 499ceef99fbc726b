//! Request routing for the inventory API

use hyper::Method;

/// Endpoint selected for a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Health,
    Metrics,
    Sites,
    SiteNames,
    Statistics,
    SyncStatus,
    TriggerSync,
    DnsStats,
    ResetDnsStats,
    ListClusters,
    CreateCluster,
    GetCluster(String),
    DeleteCluster(String),
    MethodNotAllowed,
    NotFound,
}

/// Match a method and path to a route
pub fn route(method: &Method, path: &str) -> Route {
    let path = path.trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    let by_method = |get: Route, post: Option<Route>| match (method, post) {
        (&Method::GET, _) => get,
        (&Method::POST, Some(post)) => post,
        _ => Route::MethodNotAllowed,
    };
    let post_only = |post: Route| {
        if method == Method::POST {
            post
        } else {
            Route::MethodNotAllowed
        }
    };

    match path {
        "/healthz" => by_method(Route::Health, None),
        "/metrics" => by_method(Route::Metrics, None),
        "/api/sites" => by_method(Route::Sites, None),
        "/api/sites/names" => by_method(Route::SiteNames, None),
        "/api/statistics" => by_method(Route::Statistics, None),
        "/api/vlan-sync/status" => by_method(Route::SyncStatus, None),
        "/api/vlan-sync/sync" => post_only(Route::TriggerSync),
        "/api/dns/stats" => by_method(Route::DnsStats, None),
        "/api/dns/stats/reset" => post_only(Route::ResetDnsStats),
        "/api/clusters" => by_method(Route::ListClusters, Some(Route::CreateCluster)),
        _ => match path.strip_prefix("/api/clusters/") {
            Some(id) if !id.is_empty() && !id.contains('/') => match *method {
                Method::GET => Route::GetCluster(id.to_string()),
                Method::DELETE => Route::DeleteCluster(id.to_string()),
                _ => Route::MethodNotAllowed,
            },
            _ => Route::NotFound,
        },
    }
}
