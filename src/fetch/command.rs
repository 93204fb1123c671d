use std::process::Stdio;
use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use crate::config::route::{Route, RouteKind};
use crate::config::FetcherConfig;
use crate::decoder::request::{travel_window, SearchRequest};
use crate::error::{Error, Result};
use crate::interfaces::fetcher::{Fetcher, RawResponse};

/// Runs the external browser driver once per route and captures its stdout.
///
/// The driver receives the route on its command line:
/// `--kind <flight|train> --route <id> --origin <id> --destination <id>`, and for
/// flights additionally `--cabin <CLASS> --depart <date> --return <date> --tfs <token>`.
/// Flight output is the raw results payload; train output is a JSON fare list.
pub struct CommandFetcher {
    config: FetcherConfig,
}

impl CommandFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        CommandFetcher { config }
    }

    pub fn command_args(&self, route: &Route) -> Vec<String> {
        let mut args = self.config.args.clone();
        args.extend([
            "--kind".to_string(),
            route.kind.as_str().to_string(),
            "--route".to_string(),
            route.id.to_string(),
            "--origin".to_string(),
            route.origin_id.clone(),
            "--destination".to_string(),
            route.destination_id.clone(),
        ]);

        if route.kind == RouteKind::Flight {
            let (depart, return_date) = travel_window(Utc::now().date_naive(), self.config.week_offset);
            let request = SearchRequest::for_route(route, depart, return_date);
            args.extend([
                "--cabin".to_string(),
                route.cabin().to_string(),
                "--depart".to_string(),
                depart.to_string(),
                "--return".to_string(),
                return_date.to_string(),
                "--tfs".to_string(),
                request.to_token(),
            ]);
        }
        args
    }
}

#[async_trait]
impl Fetcher for CommandFetcher {
    async fn fetch(&self, route: &Route) -> Result<RawResponse> {
        let args = self.command_args(route);
        tracing::debug!("Running {} for route {}", self.config.program, route.id);

        let output = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Fetch(format!("failed to run {}: {}", self.config.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Fetch(format!(
                "{} exited with {} for route {}: {}",
                self.config.program,
                output.status,
                route.id,
                stderr.trim()
            )));
        }

        match route.kind {
            RouteKind::Flight => Ok(RawResponse::Bytes(output.stdout)),
            RouteKind::Train => String::from_utf8(output.stdout)
                .map(RawResponse::Text)
                .map_err(|e| Error::Fetch(format!("train output is not UTF-8: {}", e))),
        }
    }

    fn source_id(&self) -> &str {
        &self.config.source_id
    }
}
