use axum::extract::Path as UrlPath;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;

use crate::session::get_run;
use crate::web::api::ApiError;

/// Stream a run's sampling progress as server-sent events. One event
/// every 250ms; the stream closes itself once the run completes or
/// fails (the final state is always emitted first).
pub async fn progress_stream(
    UrlPath(run_id): UrlPath<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let run = get_run(&run_id).ok_or_else(|| ApiError::unknown_run(&run_id))?;

    let stream = async_stream::stream! {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            let done = run.progress.is_complete();
            yield Ok(Event::default().data(run.progress.to_json().to_string()));
            if done {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
