use std::future::Future;
use std::time::Instant;
use tracing::debug;

pub trait TimedExt: Sized + Future {
    async fn timed(self, tag: &str) -> Self::Output {
        let start = Instant::now();
        let result = self.await;
        debug!("{} took {:?}", tag, start.elapsed());
        result
    }
}

impl<F: Future> TimedExt for F {}
