use std::cell::RefCell;
use std::time::Duration;

/// Host clock used by `WAIT` to schedule deferred completions
///
/// Callbacks must be invoked on the evaluator's thread.
pub trait Timer {
    /// Runs `callback` after `delay` has elapsed
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>);
}

/// Timer backed by the tokio clock
///
/// Requires a current-thread runtime with an active `LocalSet` (scheduled
/// callbacks capture non-Send interpreter state). `Interpreter::eval_async`
/// documents the expected setup.
#[derive(Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}

/// Manually driven timer for deterministic tests and host-owned clocks
///
/// Scheduled callbacks accumulate until the owner fires them.
#[derive(Default)]
pub struct ManualTimer {
    queue: RefCell<Vec<(Duration, Box<dyn FnOnce()>)>>,
}

impl ManualTimer {
    /// Creates an empty manual timer
    pub fn new() -> Self {
        ManualTimer::default()
    }

    /// Number of callbacks waiting to fire
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Fires all scheduled callbacks in schedule order
    pub fn fire_all(&self) {
        loop {
            let batch: Vec<_> = self.queue.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                return;
            }
            for (_, callback) in batch {
                callback();
            }
        }
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push((delay, callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_manual_timer_fires_in_order() {
        let timer = ManualTimer::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            timer.schedule(
                Duration::from_millis(i),
                Box::new(move || log.borrow_mut().push(i)),
            );
        }
        assert_eq!(timer.pending(), 3);
        timer.fire_all();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_manual_timer_fires_rescheduled_callbacks() {
        let timer = Rc::new(ManualTimer::new());
        let hits = Rc::new(Cell::new(0));

        let inner_timer = timer.clone();
        let inner_hits = hits.clone();
        timer.schedule(
            Duration::ZERO,
            Box::new(move || {
                inner_hits.set(inner_hits.get() + 1);
                let hits = inner_hits.clone();
                inner_timer.schedule(
                    Duration::ZERO,
                    Box::new(move || hits.set(hits.get() + 1)),
                );
            }),
        );

        timer.fire_all();
        assert_eq!(hits.get(), 2);
    }
}
