//! Turning the create-bet form into a [`BetDraft`].

use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use uuid::Uuid;

use super::schedule::next_local_occurrence;
use super::{BetDraft, MAX_PENALTY_HOURS};

/// Naive formats accepted for the result time, read in the guild timezone.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Format of the prefilled result time.
const SUGGESTED_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Rejections shown to the user who submitted the form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("The {0} must not be empty.")]
    EmptyField(&'static str),

    #[error("Invalid timeout length: {0}")]
    InvalidPenalty(String),

    #[error("The timeout length must not be negative.")]
    NegativePenalty,

    #[error("The timeout length must be at most {max_hours} hours.")]
    PenaltyTooLong { max_hours: u32 },

    #[error("Invalid result time: {0}")]
    InvalidTime(String),

    #[error("The result time must be in the future.")]
    InPast,

    #[error("The result time must be at most {max_days} days ahead.")]
    TooFarAhead { max_days: u32 },
}

/// Raw create-bet form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BetForm {
    pub title: String,
    pub description: String,
    /// Free text, or `!<amount>` for an automated currency reward.
    pub reward_text: String,
    pub result_time_text: String,
    pub penalty_hours_text: String,
}

/// Everything besides the form needed to build a draft.
#[derive(Debug, Clone)]
pub struct DraftContext {
    pub timezone: Tz,
    pub max_days_ahead: u32,
    /// Used when the timeout field is left empty.
    pub default_penalty_hours: Decimal,
    pub host_name: String,
    pub host_avatar_url: String,
    pub ping_role_id: Option<String>,
    pub currency_text: String,
}

impl BetForm {
    /// Validate the form and build a draft with a fresh id.
    pub fn into_draft(
        self,
        ctx: &DraftContext,
        now: DateTime<Utc>,
    ) -> Result<BetDraft, DraftError> {
        let title = required(self.title, "title")?;
        let description = required(self.description, "description")?;
        let reward_text = required(self.reward_text, "reward")?;

        let penalty_hours = if self.penalty_hours_text.trim().is_empty() {
            ctx.default_penalty_hours
        } else {
            parse_penalty_hours(&self.penalty_hours_text)?
        };
        let (reward_description, currency_reward) =
            parse_reward(&reward_text, &ctx.currency_text);
        let resolution_time = parse_resolution_time(
            &self.result_time_text,
            ctx.timezone,
            now,
            ctx.max_days_ahead,
        )?;

        Ok(BetDraft {
            id: new_bet_id(),
            title,
            description,
            reward_description,
            currency_reward,
            resolution_time,
            penalty_hours,
            host_name: ctx.host_name.clone(),
            host_avatar_url: ctx.host_avatar_url.clone(),
            ping_role_id: ctx.ping_role_id.clone(),
        })
    }
}

fn required(value: String, field: &'static str) -> Result<String, DraftError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DraftError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// Fresh bet id.
pub fn new_bet_id() -> String {
    format!("bet-{}", Uuid::new_v4())
}

/// Parse timeout hours, floored to one decimal place and at most
/// [`MAX_PENALTY_HOURS`].
pub fn parse_penalty_hours(text: &str) -> Result<Decimal, DraftError> {
    let text = text.trim();
    let hours = Decimal::from_str(text)
        .or_else(|_| Decimal::from_str(&text.replace(',', ".")))
        .map_err(|_| DraftError::InvalidPenalty(text.to_string()))?;
    if hours.is_sign_negative() && !hours.is_zero() {
        return Err(DraftError::NegativePenalty);
    }
    if hours > Decimal::from(MAX_PENALTY_HOURS) {
        return Err(DraftError::PenaltyTooLong {
            max_hours: MAX_PENALTY_HOURS,
        });
    }
    Ok(hours
        .round_dp_with_strategy(1, RoundingStrategy::ToNegativeInfinity)
        .normalize())
}

/// Split reward text into display text and optional currency amount.
///
/// `!500` becomes ("500 {currency_text}", Some(500)). Only the leading
/// digits count, so `!500 each` is also 500. Text without a positive
/// amount after the `!` is kept as written with no currency reward.
pub fn parse_reward(text: &str, currency_text: &str) -> (String, Option<u64>) {
    let text = text.trim();
    let amount = text.strip_prefix('!').and_then(|rest| {
        let rest = rest.trim_start();
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest[..end].parse::<u64>().ok().filter(|amount| *amount > 0)
    });
    match amount {
        Some(amount) => (format!("{} {}", amount, currency_text), Some(amount)),
        None => (text.to_string(), None),
    }
}

/// Parse the result time and check it lies within `(now, now + max_days]`.
pub fn parse_resolution_time(
    text: &str,
    tz: Tz,
    now: DateTime<Utc>,
    max_days: u32,
) -> Result<DateTime<FixedOffset>, DraftError> {
    let text = text.trim();
    let time = match DateTime::parse_from_rfc3339(text) {
        Ok(time) => time,
        Err(_) => {
            let naive = NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .ok_or_else(|| DraftError::InvalidTime(text.to_string()))?;
            tz.from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| {
                    DraftError::InvalidTime(format!("{} does not exist in {}", text, tz))
                })?
                .fixed_offset()
        }
    };

    let utc = time.with_timezone(&Utc);
    if utc <= now {
        return Err(DraftError::InPast);
    }
    if utc > now + Duration::days(i64::from(max_days)) {
        return Err(DraftError::TooFarAhead { max_days });
    }
    Ok(time)
}

/// Prefill for the result time field: the next `hour:00` in `tz`.
pub fn suggested_result_time(hour: u32, now: DateTime<Utc>, tz: Tz) -> Option<String> {
    next_local_occurrence(hour, now, tz)
        .map(|time| time.with_timezone(&tz).format(SUGGESTED_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ctx() -> DraftContext {
        DraftContext {
            timezone: chrono_tz::Europe::Bucharest,
            max_days_ahead: 10,
            default_penalty_hours: dec!(1),
            host_name: "Host".to_string(),
            host_avatar_url: String::new(),
            ping_role_id: Some("r1".to_string()),
            currency_text: "coins".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_penalty_floored() {
        assert_eq!(parse_penalty_hours("2").unwrap(), dec!(2));
        assert_eq!(parse_penalty_hours("1.99").unwrap(), dec!(1.9));
        assert_eq!(parse_penalty_hours(" 0,55 ").unwrap(), dec!(0.5));
        assert_eq!(parse_penalty_hours("0").unwrap(), dec!(0));
        assert_eq!(parse_penalty_hours("-1"), Err(DraftError::NegativePenalty));
        assert_eq!(parse_penalty_hours("672").unwrap(), dec!(672));
        assert_eq!(
            parse_penalty_hours("10000000000"),
            Err(DraftError::PenaltyTooLong { max_hours: 672 })
        );
        assert!(matches!(
            parse_penalty_hours("soon"),
            Err(DraftError::InvalidPenalty(_))
        ));
    }

    #[test]
    fn test_reward_text() {
        assert_eq!(
            parse_reward("A cookie", "coins"),
            ("A cookie".to_string(), None)
        );
        assert_eq!(
            parse_reward("!500", "gems"),
            ("500 gems".to_string(), Some(500))
        );
        assert_eq!(
            parse_reward("!500 each", "gems"),
            ("500 gems".to_string(), Some(500))
        );
    }

    #[test]
    fn test_reward_without_positive_amount_is_free_text() {
        assert_eq!(
            parse_reward("!0", "coins"),
            ("!0".to_string(), None)
        );
        assert_eq!(
            parse_reward("!lots", "coins"),
            ("!lots".to_string(), None)
        );
        assert_eq!(
            parse_reward("!-5", "coins"),
            ("!-5".to_string(), None)
        );
    }

    #[test]
    fn test_naive_time_uses_guild_timezone() {
        let time = parse_resolution_time(
            "2024-06-02T18:00",
            chrono_tz::Europe::Bucharest,
            now(),
            10,
        )
        .unwrap();
        // Bucharest is UTC+3 in summer.
        assert_eq!(
            time.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 6, 2, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rfc3339_time_keeps_offset() {
        let time = parse_resolution_time(
            "2024-06-02T18:00:00+01:00",
            chrono_tz::Europe::Bucharest,
            now(),
            10,
        )
        .unwrap();
        assert_eq!(time.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_time_bounds() {
        let tz = chrono_tz::Europe::Bucharest;
        assert_eq!(
            parse_resolution_time("2024-05-31 10:00", tz, now(), 10),
            Err(DraftError::InPast)
        );
        assert_eq!(
            parse_resolution_time("2024-06-20 10:00", tz, now(), 10),
            Err(DraftError::TooFarAhead { max_days: 10 })
        );
        assert!(matches!(
            parse_resolution_time("tomorrow", tz, now(), 10),
            Err(DraftError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_into_draft() {
        let form = BetForm {
            title: " Derby ".to_string(),
            description: "Who wins?".to_string(),
            reward_text: "!250".to_string(),
            result_time_text: "2024-06-02 18:00".to_string(),
            penalty_hours_text: "1.5".to_string(),
        };
        let draft = form.into_draft(&ctx(), now()).unwrap();

        assert!(draft.id.starts_with("bet-"));
        assert_eq!(draft.title, "Derby");
        assert_eq!(draft.reward_description, "250 coins");
        assert_eq!(draft.currency_reward, Some(250));
        assert_eq!(draft.penalty_hours, dec!(1.5));
        assert_eq!(draft.ping_role_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_into_draft_default_penalty() {
        let form = BetForm {
            title: "Derby".to_string(),
            description: "Who wins?".to_string(),
            reward_text: "Glory".to_string(),
            result_time_text: "2024-06-02 18:00".to_string(),
            penalty_hours_text: " ".to_string(),
        };
        let draft = form.into_draft(&ctx(), now()).unwrap();
        assert_eq!(draft.penalty_hours, dec!(1));
        assert_eq!(draft.currency_reward, None);
    }

    #[test]
    fn test_into_draft_requires_title() {
        let form = BetForm {
            title: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            form.into_draft(&ctx(), now()),
            Err(DraftError::EmptyField("title"))
        );
    }

    #[test]
    fn test_suggested_result_time() {
        let tz = chrono_tz::Europe::Bucharest;
        // 12:00 UTC is 15:00 local, so 20:00 is still today.
        assert_eq!(
            suggested_result_time(20, now(), tz).as_deref(),
            Some("2024-06-01T20:00")
        );
        assert_eq!(
            suggested_result_time(9, now(), tz).as_deref(),
            Some("2024-06-02T09:00")
        );
    }

    #[test]
    fn test_bet_ids_unique() {
        assert_ne!(new_bet_id(), new_bet_id());
    }
}
