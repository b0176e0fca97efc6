//! Month view state and the operations that drive it.
//!
//! Every load moves the view through `Loading` into `Loaded`. A failed fetch
//! still ends in `Loaded`, with no events and a [`LoadStatus::Failed`] entry
//! so callers can tell it apart from a month that has no occasions.

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::calendar::{CalendarError, LeapRule, PersianDate, PersianMonth, to_persian_date};
use crate::catalog::{FetchError, OccasionSource, filter_by_month, sort_by_display_day};
use crate::occasion::Occasion;

pub trait Today {
    fn today(&self) -> Result<PersianDate, CalendarError>;
}

/// The current date in a timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemToday {
    tz: Tz,
}

impl SystemToday {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Today for SystemToday {
    fn today(&self) -> Result<PersianDate, CalendarError> {
        to_persian_date(Utc::now().with_timezone(&self.tz).date_naive())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedToday(pub PersianDate);

impl Today for FixedToday {
    fn today(&self) -> Result<PersianDate, CalendarError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Succeeded { count: usize },
    Failed { reason: String },
}

/// Issued by [`Controller::begin_load`]; only the newest ticket is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    pub year: i32,
    pub month: PersianMonth,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub current_year: i32,
    pub current_month: PersianMonth,
    pub events: Vec<Occasion>,
    pub phase: LoadPhase,
    pub is_leap: bool,
    pub modal: Option<Occasion>,
    pub last_load: Option<LoadStatus>,
    pub today: PersianDate,
}

impl ViewState {
    pub fn loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn modal_visible(&self) -> bool {
        self.modal.is_some()
    }

    pub fn fetch_failed(&self) -> bool {
        matches!(self.last_load, Some(LoadStatus::Failed { .. }))
    }

    pub fn display_day(&self, occasion: &Occasion) -> u32 {
        occasion.display_day(self.is_leap)
    }

    pub fn is_today(&self, occasion: &Occasion) -> bool {
        self.current_year == self.today.year
            && occasion.month == self.today.month
            && self.display_day(occasion) == self.today.day
    }

    /// First card for today, if the displayed month has one.
    pub fn today_event_index(&self) -> Option<usize> {
        self.events.iter().position(|occasion| self.is_today(occasion))
    }
}

pub struct Controller<S, T> {
    source: S,
    today: T,
    leap_rule: LeapRule,
    generation: u64,
    state: ViewState,
}

impl<S, T> Controller<S, T>
where
    S: OccasionSource,
    T: Today,
{
    /// Starts idle on today's month; nothing is fetched until [`Self::mount`].
    pub fn new(source: S, today: T, leap_rule: LeapRule) -> Result<Self, CalendarError> {
        let now = today.today()?;
        let state = ViewState {
            current_year: now.year,
            current_month: now.month,
            events: Vec::new(),
            phase: LoadPhase::Idle,
            is_leap: leap_rule.resolve(now.year),
            modal: None,
            last_load: None,
            today: now,
        };

        Ok(Self {
            source,
            today,
            leap_rule,
            generation: 0,
            state,
        })
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn mount(&mut self) {
        let (year, month) = (self.state.current_year, self.state.current_month);
        self.load_month(year, month).await;
    }

    #[instrument(skip(self, month), fields(month = %month))]
    pub async fn load_month(&mut self, year: i32, month: PersianMonth) {
        let ticket = self.begin_load(year, month);
        let result = self.source.fetch_occasions().await;
        self.finish_load(ticket, result);
    }

    pub fn begin_load(&mut self, year: i32, month: PersianMonth) -> LoadTicket {
        self.generation += 1;
        self.state.current_year = year;
        self.state.current_month = month;
        self.state.is_leap = self.leap_rule.resolve(year);
        self.state.phase = LoadPhase::Loading;
        self.state.modal = None;

        info!(
            year,
            month = %month,
            is_leap = self.state.is_leap,
            generation = self.generation,
            "loading month"
        );

        LoadTicket {
            generation: self.generation,
            year,
            month,
        }
    }

    /// Applies a fetch result. Returns `false` when a newer load superseded
    /// `ticket`, in which case the state is left untouched.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Occasion>, FetchError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                stale = ticket.generation,
                current = self.generation,
                "discarding superseded occasion load"
            );
            return false;
        }

        match result {
            Ok(all) => {
                let filtered = filter_by_month(&all, ticket.month.name());
                let events = sort_by_display_day(filtered, self.state.is_leap);
                info!(
                    total = all.len(),
                    shown = events.len(),
                    "occasions loaded"
                );
                self.state.last_load = Some(LoadStatus::Succeeded {
                    count: events.len(),
                });
                self.state.events = events;
            }
            Err(err) => {
                warn!(error = %err, "failed to load occasions; showing an empty month");
                self.state.events.clear();
                self.state.last_load = Some(LoadStatus::Failed {
                    reason: err.to_string(),
                });
            }
        }

        self.state.phase = LoadPhase::Loaded;
        true
    }

    pub async fn navigate_month(&mut self, delta: i32) {
        let (year, month) = self
            .state
            .current_month
            .shifted(self.state.current_year, delta);
        debug!(delta, year, month = %month, "navigating");
        self.load_month(year, month).await;
    }

    pub async fn jump_to_today(&mut self) -> Result<(), CalendarError> {
        let now = self.today.today()?;
        self.state.today = now;
        self.load_month(now.year, now.month).await;
        Ok(())
    }

    /// Opens the detail panel when the occasion allows it.
    pub fn select_occasion(&mut self, occasion: &Occasion) -> bool {
        if !occasion.modal_status {
            debug!(title = %occasion.short_title, "occasion has no detail panel");
            return false;
        }
        self.state.modal = Some(occasion.clone());
        true
    }

    /// Selects the occasion shown on `day`, preferring one with a detail panel.
    pub fn select_day(&mut self, day: u32) -> Option<&Occasion> {
        let on_day = |occasion: &&Occasion| self.state.display_day(occasion) == day;
        let picked = self
            .state
            .events
            .iter()
            .filter(on_day)
            .find(|occasion| occasion.modal_status)
            .or_else(|| self.state.events.iter().find(on_day))
            .cloned()?;

        if self.select_occasion(&picked) {
            self.state.modal.as_ref()
        } else {
            None
        }
    }

    pub fn dismiss_modal(&mut self) {
        self.state.modal = None;
    }
}
