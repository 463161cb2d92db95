//! HTTP status interface for dashboards and scrapers.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /status` | Latest [`StatusSnapshot`](speedwatch_types::StatusSnapshot) as JSON |
//! | `GET`/`POST /speedtest` | `202` when a run starts, `409` if one is already running |
//! | `GET /history` | Recorded samples, oldest first |
//! | `GET /history/download`, `/history/upload` | `[timestamp_ms, Mbps]` points for plotting |
//! | `GET /baseline` | Learned baseline, `503` until learning finishes |
//! | `GET /metrics` | Prometheus text exposition |
//! | `GET /health`, `/healthz` | `200 OK` |

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use speedwatch_types::Metric;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::data::MonitorState;
use crate::engine::{Scheduler, StopSignal, TriggerOutcome};
use crate::error::ServerError;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";
const PROMETHEUS: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Serves read-only state and the manual trigger.
#[derive(Debug, Clone)]
pub struct StatusServer {
    scheduler: Scheduler,
}

impl StatusServer {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Bind `addr` and serve until `stop` fires.
    ///
    /// Returns the bound address (useful with port 0) and the accept loop's
    /// task handle.
    pub async fn start(
        self,
        addr: SocketAddr,
        stop: StopSignal,
    ) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Status server listening");

        let handle = tokio::spawn(async move {
            loop {
                let (stream, peer) = tokio::select! {
                    _ = stop.stopped() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    },
                };
                let io = TokioIo::new(stream);
                let server = self.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let server = server.clone();
                        async move { Ok::<_, Infallible>(server.handle(req.method(), req.uri().path())) }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(%peer, error = %e, "Status connection error");
                    }
                });
            }
            info!("Status server stopped");
        });

        Ok((local_addr, handle))
    }

    /// Route one request. Must run inside a Tokio runtime since
    /// `/speedtest` spawns the measurement.
    pub fn handle(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        let publisher = self.scheduler.publisher();
        match (method, path) {
            (&Method::GET, "/status") => json_response(StatusCode::OK, &publisher.snapshot()),
            (&Method::GET | &Method::POST, "/speedtest") => match self.scheduler.trigger() {
                TriggerOutcome::Started => json_response(
                    StatusCode::ACCEPTED,
                    &json!({ "status": "Speed test started" }),
                ),
                TriggerOutcome::AlreadyRunning => json_response(
                    StatusCode::CONFLICT,
                    &json!({ "error": "Speed test is already running" }),
                ),
            },
            (&Method::GET, "/history") => json_response(StatusCode::OK, &publisher.history()),
            (&Method::GET, "/history/download") => {
                json_response(StatusCode::OK, &publisher.series(Metric::Download))
            }
            (&Method::GET, "/history/upload") => {
                json_response(StatusCode::OK, &publisher.series(Metric::Upload))
            }
            (&Method::GET, "/baseline") => match publisher.baseline() {
                Some(baseline) => json_response(StatusCode::OK, &baseline),
                None => json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({ "error": "Baseline not learned yet" }),
                ),
            },
            (&Method::GET, "/metrics") => {
                respond(StatusCode::OK, PROMETHEUS, format_prometheus(&publisher.read()))
            }
            (&Method::GET, "/health" | "/healthz") => respond(StatusCode::OK, TEXT, "OK"),
            (
                _,
                "/status" | "/speedtest" | "/history" | "/history/download" | "/history/upload"
                | "/baseline" | "/metrics",
            ) => {
                respond(StatusCode::METHOD_NOT_ALLOWED, TEXT, "Method Not Allowed")
            }
            _ => respond(StatusCode::NOT_FOUND, TEXT, "Not Found"),
        }
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, JSON, body),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            TEXT,
            format!("serialization failed: {e}"),
        ),
    }
}

/// Format the monitor state as Prometheus exposition format.
pub fn format_prometheus(state: &MonitorState) -> String {
    let mut output = String::new();

    if let Some(sample) = &state.latest_sample {
        output.push_str("# HELP speedwatch_download_mbps Latest measured download speed\n");
        output.push_str("# TYPE speedwatch_download_mbps gauge\n");
        output.push_str(&format!("speedwatch_download_mbps {}\n", sample.download));

        output.push_str("# HELP speedwatch_upload_mbps Latest measured upload speed\n");
        output.push_str("# TYPE speedwatch_upload_mbps gauge\n");
        output.push_str(&format!("speedwatch_upload_mbps {}\n", sample.upload));

        output.push_str(
            "# HELP speedwatch_last_sample_timestamp_seconds Unix time of the latest sample\n",
        );
        output.push_str("# TYPE speedwatch_last_sample_timestamp_seconds gauge\n");
        output.push_str(&format!(
            "speedwatch_last_sample_timestamp_seconds {}\n",
            sample.timestamp_ms as f64 / 1000.0
        ));
    }

    output.push_str("# HELP speedwatch_running Whether a speed test is in flight\n");
    output.push_str("# TYPE speedwatch_running gauge\n");
    output.push_str(&format!(
        "speedwatch_running {}\n",
        u8::from(state.status == speedwatch_types::Status::Running)
    ));

    output.push_str("# HELP speedwatch_runs_started_total Speed tests started\n");
    output.push_str("# TYPE speedwatch_runs_started_total counter\n");
    output.push_str(&format!("speedwatch_runs_started_total {}\n", state.runs_started));

    if let Some(baseline) = &state.baseline {
        output.push_str("# HELP speedwatch_baseline_lower_mbps Lower bound of the learned range\n");
        output.push_str("# TYPE speedwatch_baseline_lower_mbps gauge\n");
        for metric in Metric::ALL {
            output.push_str(&format!(
                "speedwatch_baseline_lower_mbps{{metric=\"{}\"}} {}\n",
                metric_label(metric),
                baseline.range(metric).lower
            ));
        }

        output.push_str("# HELP speedwatch_baseline_upper_mbps Upper bound of the learned range\n");
        output.push_str("# TYPE speedwatch_baseline_upper_mbps gauge\n");
        for metric in Metric::ALL {
            output.push_str(&format!(
                "speedwatch_baseline_upper_mbps{{metric=\"{}\"}} {}\n",
                metric_label(metric),
                baseline.range(metric).upper
            ));
        }
    }

    output
}

fn metric_label(metric: Metric) -> &'static str {
    match metric {
        Metric::Download => "download",
        Metric::Upload => "upload",
    }
}
