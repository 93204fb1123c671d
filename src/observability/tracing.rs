use tracing::Span;
use tracing_subscriber::EnvFilter;
use crate::config::route::Route;
use crate::types::ids::CycleId;

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub fn trace_cycle(cycle_id: &CycleId, routes: usize) -> Span {
    tracing::info_span!(
        "scrape_cycle",
        cycle_id = %cycle_id,
        routes,
    )
}

pub fn trace_route(route: &Route) -> Span {
    tracing::info_span!(
        "route",
        route_id = %route.id,
        kind = route.kind.as_str(),
    )
}
