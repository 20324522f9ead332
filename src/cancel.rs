use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;

/// Races `operation` against `token`. Cancellation wins ties and surfaces as
/// [`ErrorKind::Cancelled`]; the losing future is dropped.
pub(crate) async fn run_cancellable<T, E, F>(
    token: &CancellationToken,
    operation: F,
) -> Result<T, ErrorKind>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ErrorKind>,
{
    tokio::select! {
        biased;

        _ = token.cancelled() => Err(ErrorKind::Cancelled),
        result = operation => result.map_err(Into::into),
    }
}
