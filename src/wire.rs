use std::io;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;
use ulid::Ulid;

use crate::config::Catalog;
use crate::engine::{ScheduleError, Scheduler};
use crate::model::{BookingRequest, CancelKey, Reservation, ScheduleEvent};
use crate::notify::{self, NotifyHub};

/// Longest accepted request line. Anything bigger is a protocol error.
const MAX_LINE_LEN: usize = 8 * 1024;

/// Everything a connection needs to service requests.
pub struct Shell {
    pub scheduler: Arc<Scheduler>,
    pub catalog: Arc<Catalog>,
    pub notify: Arc<NotifyHub>,
}

/// One request per line, tagged by `op`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Book(BookingRequest),
    Cancel(CancelKey),
    CancelById { id: Ulid },
    Schedule,
    Mine { user: String },
    Equipment,
    Watch { equipment: String },
}

/// One reply per request line, tagged by `status`. Watchers additionally
/// receive interleaved `event` lines.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Booked {
        reservation: Reservation,
        /// Mail-compose link for the configured recipient list, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        mailto: Option<String>,
    },
    Cancelled,
    Schedule {
        rows: Vec<Reservation>,
    },
    Mine {
        rows: Vec<Reservation>,
    },
    Equipment {
        equipment: Vec<String>,
    },
    Watching {
        equipment: String,
    },
    Event {
        event: ScheduleEvent,
    },
    Error {
        code: &'static str,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        occupant: Option<String>,
    },
}

/// Service one client connection until it hangs up.
///
/// A `watch` request attaches the connection to an equipment channel;
/// broadcast events are interleaved with replies from then on, and further
/// requests stay serviceable.
pub async fn process_connection(socket: TcpStream, shell: Arc<Shell>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let mut watch: Option<broadcast::Receiver<ScheduleEvent>> = None;

    loop {
        tokio::select! {
            line = framed.next() => {
                let Some(line) = line else { break };
                let line = line.map_err(codec_err)?;
                if line.trim().is_empty() {
                    continue;
                }
                let reply = match serde_json::from_str::<Request>(&line) {
                    Ok(request) => handle_request(&shell, request, &mut watch).await,
                    Err(e) => Reply::Error {
                        code: "bad_request",
                        message: format!("unparseable request: {e}"),
                        occupant: None,
                    },
                };
                send_reply(&mut framed, &reply).await?;
            }
            event = next_event(&mut watch) => {
                match event {
                    Ok(event) => {
                        send_reply(&mut framed, &Reply::Event { event }).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "watcher lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        watch = None;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Resolve the next broadcast event, or park forever when not watching.
async fn next_event(
    watch: &mut Option<broadcast::Receiver<ScheduleEvent>>,
) -> Result<ScheduleEvent, broadcast::error::RecvError> {
    match watch {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_reply(
    framed: &mut Framed<TcpStream, LinesCodec>,
    reply: &Reply,
) -> io::Result<()> {
    let line = serde_json::to_string(reply).map_err(io::Error::other)?;
    framed.send(line).await.map_err(codec_err)
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "request line too long")
        }
        LinesCodecError::Io(e) => e,
    }
}

async fn handle_request(
    shell: &Shell,
    request: Request,
    watch: &mut Option<broadcast::Receiver<ScheduleEvent>>,
) -> Reply {
    let label = crate::observability::request_label(&request);
    let started = Instant::now();

    let reply = match request {
        Request::Book(request) => match validate_book(shell, &request) {
            Err(reply) => reply,
            Ok(()) => match shell.scheduler.book(request).await {
                Ok(reservation) => {
                    let mailto = (!shell.catalog.recipients.is_empty())
                        .then(|| notify::mailto_link(&reservation, &shell.catalog.recipients));
                    Reply::Booked { reservation, mailto }
                }
                Err(e) => error_reply(e),
            },
        },
        Request::Cancel(key) => {
            if key.user.trim().is_empty() {
                invalid("missing_user", "user must not be empty")
            } else {
                match shell.scheduler.cancel(&key).await {
                    Ok(()) => Reply::Cancelled,
                    Err(e) => error_reply(e),
                }
            }
        }
        Request::CancelById { id } => match shell.scheduler.cancel_by_id(id).await {
            Ok(_) => Reply::Cancelled,
            Err(e) => error_reply(e),
        },
        Request::Schedule => match shell.scheduler.upcoming().await {
            Ok(rows) => Reply::Schedule { rows },
            Err(e) => error_reply(e),
        },
        Request::Mine { user } => match shell.scheduler.cancellable(&user).await {
            Ok(rows) => Reply::Mine { rows },
            Err(e) => error_reply(e),
        },
        Request::Equipment => Reply::Equipment {
            equipment: shell.catalog.equipment.clone(),
        },
        Request::Watch { equipment } => {
            if !shell.catalog.has_equipment(&equipment) {
                invalid("unknown_equipment", "equipment is not in the catalog")
            } else {
                *watch = Some(shell.notify.subscribe(&equipment));
                Reply::Watching { equipment }
            }
        }
    };

    let status = if matches!(reply, Reply::Error { .. }) {
        "error"
    } else {
        "ok"
    };
    metrics::histogram!(crate::observability::REQUEST_DURATION_SECONDS, "op" => label)
        .record(started.elapsed().as_secs_f64());
    metrics::counter!(crate::observability::REQUESTS_TOTAL, "op" => label, "status" => status)
        .increment(1);
    reply
}

/// Input-surface validation: field presence, catalog membership, and the
/// minimum booking date. Runs before the engine is invoked; the engine
/// itself never sees the catalog or the roster.
fn validate_book(shell: &Shell, request: &BookingRequest) -> Result<(), Reply> {
    if request.user.trim().is_empty() {
        return Err(invalid("missing_user", "user must not be empty"));
    }
    if !shell.catalog.knows_user(&request.user) {
        return Err(invalid("unknown_user", "user is not on the team roster"));
    }
    if request.equipment.trim().is_empty() {
        return Err(invalid("missing_equipment", "equipment must not be empty"));
    }
    if !shell.catalog.has_equipment(&request.equipment) {
        return Err(invalid(
            "unknown_equipment",
            "equipment is not in the catalog",
        ));
    }
    // The legacy form's date picker refused past dates outright; the engine
    // only checks the clock for same-day starts.
    if request.date < shell.scheduler.local_today() {
        return Err(invalid("past_date", "date is in the past"));
    }
    Ok(())
}

fn invalid(code: &'static str, message: &str) -> Reply {
    Reply::Error {
        code,
        message: message.to_string(),
        occupant: None,
    }
}

fn error_reply(err: ScheduleError) -> Reply {
    let occupant = match &err {
        ScheduleError::Conflict { occupant } => Some(occupant.clone()),
        _ => None,
    };
    Reply::Error {
        code: error_code(&err),
        message: err.to_string(),
        occupant,
    }
}

/// Stable machine-readable code per engine error.
pub fn error_code(err: &ScheduleError) -> &'static str {
    match err {
        ScheduleError::InvalidWindow => "invalid_window",
        ScheduleError::PastTime => "past_time",
        ScheduleError::Conflict { .. } => "conflict",
        ScheduleError::NotFound => "not_found",
        ScheduleError::StoreUnavailable(_) => "store_unavailable",
        ScheduleError::StoreRejected(_) => "store_rejected",
    }
}
