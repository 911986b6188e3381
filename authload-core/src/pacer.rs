use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Hands scheduled arrivals to a bounded pool of workers.
///
/// The scheduling loop pushes due arrivals with [`ArrivalPacer::update_due`]; workers pull
/// them with [`ArrivalPacer::claim_next`]. The loop never blocks: an arrival that would
/// push `in_flight + queued` above `max_vus` is dropped and counted instead.
#[derive(Debug)]
pub struct ArrivalPacer {
    scheduled_total: AtomicU64,
    claimed_total: AtomicU64,
    dropped_total: AtomicU64,
    in_flight: AtomicU64,

    active_vus: AtomicU64,
    pre_allocated_vus: u64,
    max_vus: u64,

    done: AtomicBool,
    notify: Notify,
}

/// Marks one claimed arrival as running; dropping it frees the slot.
#[derive(Debug)]
pub struct InFlight<'a> {
    pacer: &'a ArrivalPacer,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.pacer.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.pacer.update_active_vus();
    }
}

impl ArrivalPacer {
    pub fn new(pre_allocated_vus: u64, max_vus: u64) -> Self {
        let max_vus = max_vus.max(1);
        let pre_allocated_vus = pre_allocated_vus.clamp(1, max_vus);
        Self {
            scheduled_total: AtomicU64::new(0),
            claimed_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            active_vus: AtomicU64::new(pre_allocated_vus),
            pre_allocated_vus,
            max_vus,
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Stops dispatch. Arrivals still queued are dropped; returns how many.
    pub fn mark_done(&self) -> u64 {
        self.done.store(true, Ordering::Release);

        let mut dropped = 0;
        loop {
            let claimed = self.claimed_total.load(Ordering::Acquire);
            let scheduled = self.scheduled_total.load(Ordering::Acquire);
            if claimed >= scheduled {
                break;
            }
            if self
                .claimed_total
                .compare_exchange_weak(claimed, scheduled, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                dropped = scheduled - claimed;
                self.dropped_total.fetch_add(dropped, Ordering::Relaxed);
                break;
            }
        }

        self.notify.notify_waiters();
        dropped
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn backlog(&self) -> u64 {
        let claimed = self.claimed_total.load(Ordering::Acquire);
        self.scheduled_total
            .load(Ordering::Acquire)
            .saturating_sub(claimed)
    }

    /// Number of workers (lowest `scenario_vu` first) allowed to pick up work right now.
    pub fn active_vus(&self) -> u64 {
        self.active_vus.load(Ordering::Relaxed)
    }

    pub fn max_vus(&self) -> u64 {
        self.max_vus
    }

    /// Queues `add_due` new arrivals; returns how many were dropped for lack of capacity.
    pub fn update_due(&self, add_due: u64) -> u64 {
        if add_due == 0 || self.is_done() {
            self.update_active_vus();
            return 0;
        }

        let occupied = self.in_flight().saturating_add(self.backlog());
        let capacity = self.max_vus.saturating_sub(occupied);
        let to_add = add_due.min(capacity);
        let dropped = add_due - to_add;

        if to_add != 0 {
            self.scheduled_total.fetch_add(to_add, Ordering::AcqRel);
        }
        if dropped != 0 {
            self.dropped_total.fetch_add(dropped, Ordering::Relaxed);
        }

        self.update_active_vus();
        self.notify.notify_waiters();
        dropped
    }

    fn update_active_vus(&self) {
        // Keep enough workers eligible to cover everything running plus everything queued,
        // never fewer than the pre-allocated pool.
        let demand = self
            .in_flight()
            .saturating_add(self.backlog())
            .saturating_add(1);
        let desired = self.pre_allocated_vus.max(demand).clamp(1, self.max_vus);
        self.active_vus.store(desired, Ordering::Relaxed);
    }

    /// Waits for a queued arrival. `None` once the pacer is done.
    pub async fn claim_next(&self) -> Option<InFlight<'_>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_done() {
                return None;
            }

            let claimed = self.claimed_total.load(Ordering::Acquire);
            let scheduled = self.scheduled_total.load(Ordering::Acquire);
            if claimed < scheduled {
                if self
                    .claimed_total
                    .compare_exchange_weak(claimed, claimed + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.in_flight.fetch_add(1, Ordering::AcqRel);
                    return Some(InFlight { pacer: self });
                }
                continue;
            }

            notified.await;
        }
    }

    /// Parks worker `scenario_vu` until it falls within the active pool or the pacer is
    /// done. Both conditions are rechecked after registering for the wakeup.
    pub async fn wait_until_active(&self, scenario_vu: u64) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_done() || scenario_vu <= self.active_vus() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn claims_queued_arrivals_in_order() {
        let pacer = ArrivalPacer::new(1, 4);
        assert_eq!(pacer.update_due(2), 0);
        assert_eq!(pacer.backlog(), 2);

        let a = pacer.claim_next().await;
        assert!(a.is_some());
        assert_eq!(pacer.in_flight(), 1);
        assert_eq!(pacer.backlog(), 1);

        drop(a);
        assert_eq!(pacer.in_flight(), 0);
    }

    #[tokio::test]
    async fn drops_arrivals_beyond_pool_capacity() {
        let pacer = ArrivalPacer::new(1, 3);
        let _running = pacer.claim_next_now();
        assert_eq!(pacer.in_flight(), 1);

        // One running, room for two more.
        assert_eq!(pacer.update_due(5), 3);
        assert_eq!(pacer.backlog(), 2);
        assert_eq!(pacer.dropped_total(), 3);
        assert_eq!(pacer.active_vus(), 3);
    }

    #[tokio::test]
    async fn mark_done_drops_leftover_backlog_and_refuses_claims() {
        let pacer = ArrivalPacer::new(2, 10);
        pacer.update_due(4);
        assert_eq!(pacer.mark_done(), 4);
        assert_eq!(pacer.dropped_total(), 4);
        assert!(pacer.claim_next().await.is_none());
        assert_eq!(pacer.update_due(3), 0);
        assert_eq!(pacer.backlog(), 0);
    }

    #[tokio::test]
    async fn waiting_worker_wakes_on_new_arrival() {
        let pacer = Arc::new(ArrivalPacer::new(1, 2));
        let waiter = {
            let pacer = pacer.clone();
            tokio::spawn(async move { pacer.claim_next().await.is_some() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        pacer.update_due(1);

        let claimed = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap_or_else(|_| panic!("worker never woke"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(claimed);
    }

    #[tokio::test]
    async fn waiting_worker_wakes_on_done() {
        let pacer = Arc::new(ArrivalPacer::new(1, 2));
        let waiter = {
            let pacer = pacer.clone();
            tokio::spawn(async move { pacer.claim_next().await.is_none() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        pacer.mark_done();

        let finished = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap_or_else(|_| panic!("worker never woke"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(finished);
    }

    #[tokio::test]
    async fn parked_worker_returns_when_already_active() {
        let pacer = ArrivalPacer::new(1, 4);
        pacer.update_due(2);
        assert!(pacer.active_vus() >= 3);

        // Demand grew before the worker registered; it must not park.
        tokio::time::timeout(Duration::from_millis(200), pacer.wait_until_active(3))
            .await
            .unwrap_or_else(|_| panic!("worker parked despite being active"));
    }

    #[tokio::test]
    async fn parked_worker_wakes_when_pool_grows() {
        let pacer = Arc::new(ArrivalPacer::new(1, 4));
        let waiter = {
            let pacer = pacer.clone();
            tokio::spawn(async move { pacer.wait_until_active(2).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        pacer.update_due(1);

        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap_or_else(|_| panic!("worker never woke"))
            .unwrap_or_else(|e| panic!("{e}"));
    }

    impl ArrivalPacer {
        /// Queues and claims one arrival without awaiting.
        fn claim_next_now(&self) -> InFlight<'_> {
            self.scheduled_total.fetch_add(1, Ordering::AcqRel);
            self.claimed_total.fetch_add(1, Ordering::AcqRel);
            self.in_flight.fetch_add(1, Ordering::AcqRel);
            InFlight { pacer: self }
        }
    }
}
