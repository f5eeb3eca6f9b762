// Daily prompt counter
// One row per user; `total` restarts at 1 on the first increment of a new calendar day

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Integer, Timestamptz, Varchar};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::usage_counters;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = usage_counters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UsageCounterRecord {
    pub user_id: String,
    pub total: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageCounter {
    pub user_id: String,
    pub total: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<UsageCounterRecord> for UsageCounter {
    fn from(record: UsageCounterRecord) -> Self {
        Self {
            user_id: record.user_id,
            total: u32::try_from(record.total).unwrap_or(0),
            updated_at: record.updated_at,
        }
    }
}

/// Half-open `[start, end)` span of one local calendar day, in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The local calendar day that contains `now`
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let date = now.date_naive();
        let start = local_midnight(&tz, date);
        let end = date
            .succ_opt()
            .map(|next| local_midnight(&tz, next))
            .unwrap_or_else(|| start + Duration::hours(24));

        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

// Midnight can be skipped or repeated around DST changes
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

#[derive(QueryableByName)]
struct TotalRow {
    #[diesel(sql_type = Integer)]
    total: i32,
}

impl UsageCounterRecord {
    pub async fn find(
        conn: &mut AsyncPgConnection,
        uid: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::usage_counters::dsl::*;

        usage_counters
            .filter(user_id.eq(uid))
            .select(UsageCounterRecord::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Create, roll over or increment in one statement.
    /// Concurrent callers serialize on the row and each sees a distinct total.
    pub async fn increment(
        conn: &mut AsyncPgConnection,
        uid: &str,
        now: DateTime<Utc>,
        day: DayWindow,
    ) -> Result<i32, diesel::result::Error> {
        let row = diesel::sql_query(
            "INSERT INTO usage_counters (user_id, total, updated_at) VALUES ($1, 1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 total = CASE \
                     WHEN usage_counters.updated_at >= $3 AND usage_counters.updated_at < $4 \
                     THEN usage_counters.total + 1 \
                     ELSE 1 \
                 END, \
                 updated_at = $2 \
             RETURNING total",
        )
        .bind::<Varchar, _>(uid)
        .bind::<Timestamptz, _>(now)
        .bind::<Timestamptz, _>(day.start)
        .bind::<Timestamptz, _>(day.end)
        .get_result::<TotalRow>(conn)
        .await?;

        Ok(row.total)
    }
}
