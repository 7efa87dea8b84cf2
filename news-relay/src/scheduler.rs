use crate::commands::CommandContext;
use crate::pipeline::{Pipeline, RunReport};
use crate::publisher::Publisher;
use crate::state::DedupStore;
use crate::traits::{DocumentSource, Inbox, Transport};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Daily posting hours and which of them already fired today.
///
/// A trigger is due while the local hour equals it and it has not fired on
/// the current local date. Runs are awaited on the loop itself, so two runs
/// never overlap. With an inbox attached, chat commands are answered on
/// every tick between runs.
pub struct Scheduler {
    hours: BTreeSet<u32>,
    tz: Tz,
    fired: HashMap<u32, NaiveDate>,
    clock: fn() -> DateTime<Utc>,
    inbox: Option<Box<dyn Inbox>>,
}

impl Scheduler {
    pub fn new(hours: &[u32], tz: Tz) -> Self {
        Self {
            hours: hours.iter().copied().filter(|h| *h < 24).collect(),
            tz,
            fired: HashMap::new(),
            clock: Utc::now,
            inbox: None,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_inbox(mut self, inbox: Box<dyn Inbox>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn hours(&self) -> impl Iterator<Item = u32> + '_ {
        self.hours.iter().copied()
    }

    /// Check the trigger for `now` and mark it fired when due.
    pub fn due(&mut self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        let hour = local.hour();
        let today = local.date_naive();

        if !self.hours.contains(&hour) || self.fired.get(&hour) == Some(&today) {
            return false;
        }

        self.fired.insert(hour, today);
        true
    }

    /// Next instant a trigger hour starts, strictly after `now`.
    pub fn next_trigger(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let local = now.with_timezone(&self.tz);

        // Look ahead two days so DST gaps and late-evening checks still find one
        (0..=2).find_map(|offset| {
            let date = local.date_naive() + ChronoDuration::days(offset);
            self.hours.iter().find_map(|hour| {
                let naive = date.and_hms_opt(*hour, 0, 0)?;
                let candidate = self.tz.from_local_datetime(&naive).earliest()?;
                (candidate > local).then_some(candidate)
            })
        })
    }

    /// Tick until `shutdown` flips, running the pipeline whenever a trigger is due.
    pub async fn run<D: DocumentSource, T: Transport>(
        &mut self,
        pipeline: &Pipeline<D>,
        store: &mut DedupStore,
        publisher: &mut Publisher<T>,
        mut shutdown: watch::Receiver<bool>,
        tick: Duration,
    ) -> Vec<RunReport> {
        let mut reports = Vec::new();
        let mut timer = tokio::time::interval(tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Scheduler started, posting at {:?} ({})",
            self.hours.iter().collect::<Vec<_>>(),
            self.tz
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }

            let now = (self.clock)();
            if self.due(now) {
                info!("Trigger {} fired", now.with_timezone(&self.tz).format("%Y-%m-%d %H:00 %Z"));
                reports.push(pipeline.run(store, publisher, &shutdown).await);
            } else {
                debug!("Tick, nothing due");
            }

            if let Some(mut inbox) = self.inbox.take() {
                let context = CommandContext {
                    store: &*store,
                    pipeline,
                    scheduler: &*self,
                };
                context.answer_pending(inbox.as_mut(), publisher.transport(), now).await;
                self.inbox = Some(inbox);
            }
        }

        info!("Scheduler stopped after {} runs", reports.len());
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kyiv() -> Tz {
        "Europe/Kyiv".parse().unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_fires_once_per_hour_per_day() {
        let mut scheduler = Scheduler::new(&[12], kyiv());
        // 12:00 Kyiv summer time is 09:00 UTC
        assert!(!scheduler.due(utc("2026-07-01T08:59:59Z")));
        assert!(scheduler.due(utc("2026-07-01T09:00:00Z")));
        assert!(!scheduler.due(utc("2026-07-01T09:00:01Z")));
        assert!(!scheduler.due(utc("2026-07-01T09:59:59Z")));
        assert!(!scheduler.due(utc("2026-07-01T10:00:00Z")));
        assert!(scheduler.due(utc("2026-07-02T09:30:00Z")));
    }

    #[test]
    fn test_late_start_inside_trigger_hour_fires() {
        let mut scheduler = Scheduler::new(&[8, 20], Tz::UTC);
        assert!(scheduler.due(utc("2026-07-01T20:45:00Z")));
        assert!(!scheduler.due(utc("2026-07-01T21:00:00Z")));
    }

    #[test]
    fn test_out_of_range_hours_are_ignored() {
        let scheduler = Scheduler::new(&[25, 7], Tz::UTC);
        assert_eq!(scheduler.hours().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_next_trigger() {
        let scheduler = Scheduler::new(&[8, 20], Tz::UTC);
        let next = scheduler.next_trigger(utc("2026-07-01T09:15:00Z")).unwrap();
        assert_eq!(next.with_timezone(&Utc), utc("2026-07-01T20:00:00Z"));

        let next = scheduler.next_trigger(utc("2026-07-01T21:00:00Z")).unwrap();
        assert_eq!(next.with_timezone(&Utc), utc("2026-07-02T08:00:00Z"));

        assert!(Scheduler::new(&[], Tz::UTC).next_trigger(utc("2026-07-01T21:00:00Z")).is_none());
    }
}
