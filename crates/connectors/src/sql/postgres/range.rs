//! Binary wire format of `tsrange` / `tstzrange`.

use bytes::{Buf, BufMut, BytesMut};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use model::core::value::Range;
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, Type};

const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

fn pg_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn to_micros(ts: NaiveDateTime) -> Result<i64, Box<dyn Error + Sync + Send>> {
    (ts - pg_epoch())
        .num_microseconds()
        .ok_or_else(|| format!("timestamp {ts} out of range").into())
}

fn from_micros(micros: i64) -> NaiveDateTime {
    pg_epoch() + TimeDelta::microseconds(micros)
}

/// Writes `[begin, end)` in range_send layout.
pub fn encode_range(range: &Range, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    out.put_u8(RANGE_LB_INC);
    for bound in [range.begin, range.end] {
        out.put_i32(8);
        out.put_i64(to_micros(bound)?);
    }
    Ok(IsNull::No)
}

/// A decoded range. Empty and unbounded ranges have no [`Range`] form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PgRange(pub Option<Range>);

impl<'a> FromSql<'a> for PgRange {
    fn from_sql(_ty: &Type, mut raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.is_empty() {
            return Err("empty range payload".into());
        }
        let flags = raw.get_u8();
        if flags & RANGE_EMPTY != 0 || flags & (RANGE_LB_INF | RANGE_UB_INF) != 0 {
            return Ok(PgRange(None));
        }

        let mut bounds = [pg_epoch(); 2];
        for bound in bounds.iter_mut() {
            if raw.remaining() < 12 {
                return Err("truncated range bound".into());
            }
            let len = raw.get_i32();
            if len != 8 {
                return Err(format!("unexpected range bound length {len}").into());
            }
            *bound = from_micros(raw.get_i64());
        }

        Ok(PgRange(Some(Range::new(bounds[0], bounds[1]))))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::TS_RANGE | Type::TSTZ_RANGE)
    }
}
