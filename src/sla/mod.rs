//! First-response SLA deadline computation.
//!
//! A deadline is the policy's minute budget spent forward from the receipt
//! time. With business hours enabled, minutes only accrue inside each enabled
//! day's `[start, end)` window; the walk clips partial windows and carries the
//! remainder to the next enabled day.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::conversations::log_event;
use crate::shared::enums::EventKind;
use crate::shared::models::{BusinessHoursRow, SlaPolicy};
use crate::shared::schema::{business_hours, conversations, sla_policies};

/// One weekday entry of the persisted business-hours JSON.
/// `day_of_week` is 0..6 with Sunday = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHours {
    pub day_of_week: u8,
    pub is_enabled: bool,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessWeek {
    pub is_enabled: bool,
    pub days: Vec<DayHours>,
}

/// Walk at most a year; a schedule with no usable window falls back to
/// continuous accrual instead of spinning forever.
const MAX_WALK_DAYS: u32 = 366;

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

fn window_for(days: &[DayHours], date: NaiveDate) -> Option<(NaiveTime, NaiveTime)> {
    use chrono::Datelike;
    let weekday = date.weekday().num_days_from_sunday() as u8;
    let entry = days.iter().find(|d| d.day_of_week == weekday)?;
    if !entry.is_enabled {
        return None;
    }
    let start = parse_hhmm(&entry.start_time)?;
    let end = parse_hhmm(&entry.end_time)?;
    if start >= end {
        return None;
    }
    Some((start, end))
}

/// Due timestamp for `minutes` of SLA budget starting at `reference`.
/// Without an enabled schedule, minutes accrue continuously (24/7).
pub fn compute_due_at(
    reference: DateTime<Utc>,
    minutes: i64,
    schedule: Option<&BusinessWeek>,
) -> DateTime<Utc> {
    let continuous = reference + Duration::minutes(minutes);
    let Some(week) = schedule.filter(|w| w.is_enabled) else {
        return continuous;
    };

    let mut remaining = Duration::minutes(minutes);
    let mut cursor = reference.naive_utc();

    for _ in 0..MAX_WALK_DAYS {
        if let Some((start, end)) = window_for(&week.days, cursor.date()) {
            let window_start = cursor.date().and_time(start);
            let window_end = cursor.date().and_time(end);
            let begin = cursor.max(window_start);
            if begin < window_end {
                let available = window_end - begin;
                if available >= remaining {
                    return Utc.from_utc_datetime(&(begin + remaining));
                }
                remaining = remaining - available;
            }
        }
        let next_day = cursor.date() + Days::new(1);
        cursor = next_day.and_time(NaiveTime::MIN);
    }

    warn!("No usable business-hours window within {MAX_WALK_DAYS} days; using continuous accrual");
    continuous
}

fn load_schedule(conn: &mut PgConnection, org: Uuid) -> QueryResult<Option<BusinessWeek>> {
    let row: Option<BusinessHoursRow> = business_hours::table
        .filter(business_hours::org_id.eq(org))
        .first(conn)
        .optional()?;

    Ok(row.and_then(|row| {
        match serde_json::from_value::<Vec<DayHours>>(row.days.clone()) {
            Ok(days) => Some(BusinessWeek {
                is_enabled: row.is_enabled,
                days,
            }),
            Err(e) => {
                warn!("Invalid business-hours schedule for org {org}: {e}");
                None
            }
        }
    }))
}

/// Look up the active policy for the conversation's priority and write the
/// computed deadline. No active policy means no deadline, which is not an
/// error. Returns the deadline when one was set.
pub fn apply_first_response_sla(
    conn: &mut PgConnection,
    org: Uuid,
    conversation_id: Uuid,
    priority: &str,
    reference: DateTime<Utc>,
) -> QueryResult<Option<DateTime<Utc>>> {
    let policy: Option<SlaPolicy> = sla_policies::table
        .filter(sla_policies::org_id.eq(org))
        .filter(sla_policies::priority.eq(priority))
        .filter(sla_policies::is_active.eq(true))
        .first(conn)
        .optional()?;

    let Some(policy) = policy else {
        return Ok(None);
    };

    let schedule = load_schedule(conn, org)?;
    let due_at = compute_due_at(
        reference,
        i64::from(policy.first_response_minutes),
        schedule.as_ref(),
    );

    diesel::update(conversations::table.filter(conversations::id.eq(conversation_id)))
        .set((
            conversations::sla_first_response_due_at.eq(Some(due_at)),
            conversations::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;

    log_event(
        conn,
        org,
        conversation_id,
        EventKind::SlaApplied,
        json!({ "priority": priority, "due_at": due_at }),
        None,
    )?;

    Ok(Some(due_at))
}
